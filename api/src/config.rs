use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RPC_PORT: u16 = 50051;
pub const DEFAULT_DATA_PATH: &str = "data/glossary.json";
/// `GLOSSARY_DATA_PATH` value selecting the ephemeral store.
pub const IN_MEMORY_DATA_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File(PathBuf),
    InMemory,
}

/// Process configuration, read from the environment.
///
/// Every setting is optional; unparsable values are logged and replaced by
/// their default rather than aborting startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub rpc_port: u16,
    pub storage: StorageConfig,
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rpc_port: DEFAULT_RPC_PORT,
            storage: StorageConfig::File(PathBuf::from(DEFAULT_DATA_PATH)),
            seed_demo_data: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let storage = match lookup("GLOSSARY_DATA_PATH") {
            Some(raw) if raw.trim() == IN_MEMORY_DATA_PATH => {
                info!("GLOSSARY_DATA_PATH selects the in-memory store; data will not survive restarts.");
                StorageConfig::InMemory
            }
            Some(raw) if !raw.trim().is_empty() => StorageConfig::File(PathBuf::from(raw.trim())),
            Some(_) => {
                warn!(
                    "Empty GLOSSARY_DATA_PATH in environment variable. Using default path {}.",
                    DEFAULT_DATA_PATH
                );
                defaults.storage
            }
            None => defaults.storage,
        };

        Self {
            port: parse_or_default(&lookup, "PORT", defaults.port),
            rpc_port: parse_or_default(&lookup, "RPC_PORT", defaults.rpc_port),
            storage,
            seed_demo_data: parse_flag(&lookup, "GLOSSARY_SEED", defaults.seed_demo_data),
        }
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => match T::from_str(raw.trim()) {
            Ok(value) => {
                info!("Using {} {} from environment variable.", key, value);
                value
            }
            Err(_) => {
                warn!(
                    "Invalid {} value '{}' in environment variable. Using default {}.",
                    key, raw, default
                );
                default
            }
        },
        None => default,
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                warn!(
                    "Invalid {} value '{}' in environment variable. Using default {}.",
                    key, raw, default
                );
                default
            }
        },
        None => default,
    }
}
