mod config;
mod rest;
mod rpc;
mod seed;

use application::{ApplicationError, GlossaryService, StatsService, TermRepository};
use config::{AppConfig, StorageConfig};
use infrastructure::{
    InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore, SnapshotTermRepository,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Shared by the REST and RPC routers; both front-ends talk to the same services.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) glossary_service: Arc<GlossaryService>,
    pub(crate) stats_service: Arc<StatsService>,
}

#[derive(Error, Debug)]
enum StartupError {
    #[error("Failed to open the glossary store: {0}")]
    Application(#[from] ApplicationError),
    #[error("Failed to bind to address {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("{listener} server error: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: io::Error,
    },
}

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let config = AppConfig::from_env();
    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let state = build_state(&config)?;
    info!("Application state created.");

    if config.seed_demo_data {
        let report = state.glossary_service.seed_terms(seed::DEMO_TERMS).await?;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Demo glossary seeded."
        );
    }

    let rest_listener = bind(config.port).await?;
    let rpc_listener = bind(config.rpc_port).await?;
    let rest_app = rest::router(state.clone());
    let rpc_app = rpc::router(state);
    info!("API routes configured.");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections.");
        let _ = shutdown_tx.send(true);
    });

    let rest_server = {
        let shutdown = shutdown_rx.clone();
        async move {
            axum::serve(rest_listener, rest_app.into_make_service())
                .with_graceful_shutdown(wait_for_shutdown(shutdown))
                .await
                .map_err(|source| StartupError::Serve {
                    listener: "REST",
                    source,
                })
        }
    };
    let rpc_server = async move {
        axum::serve(rpc_listener, rpc_app.into_make_service())
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await
            .map_err(|source| StartupError::Serve {
                listener: "RPC",
                source,
            })
    };

    tokio::try_join!(rest_server, rpc_server)?;
    info!("Servers stopped.");
    Ok(())
}

/// Opens the configured store and wires both services to one repository.
fn build_state(config: &AppConfig) -> Result<AppState, ApplicationError> {
    match &config.storage {
        StorageConfig::File(path) => {
            let store = JsonFileSnapshotStore::new(path.clone());
            let data_path = store.path().to_path_buf();
            state_over(Arc::new(store), Some(data_path))
        }
        StorageConfig::InMemory => state_over(Arc::new(InMemorySnapshotStore::new()), None),
    }
}

fn state_over(
    store: Arc<dyn SnapshotStore>,
    data_path: Option<PathBuf>,
) -> Result<AppState, ApplicationError> {
    let repository: Arc<dyn TermRepository> = Arc::new(SnapshotTermRepository::open(store)?);
    info!(location = %repository.describe_store(), "Glossary store opened.");

    Ok(AppState {
        glossary_service: Arc::new(GlossaryService::new(repository.clone())),
        stats_service: Arc::new(StatsService::new(repository, data_path)),
    })
}

async fn bind(port: u16) -> Result<TcpListener, StartupError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    info!("Server listening on {}", addr);
    Ok(listener)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use infrastructure::{StoreError, TermSnapshot};

    /// Store that loads empty and refuses every write.
    struct ReadOnlyStore;

    impl SnapshotStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<TermSnapshot>, StoreError> {
            Ok(None)
        }

        fn persist(&self, _snapshot: &TermSnapshot) -> Result<(), StoreError> {
            Err(StoreError::Io(io::Error::other("read-only file system")))
        }

        fn describe(&self) -> String {
            "read-only".to_string()
        }
    }

    pub(crate) fn memory_state() -> AppState {
        build_state(&AppConfig {
            storage: StorageConfig::InMemory,
            ..AppConfig::default()
        })
        .unwrap()
    }

    pub(crate) fn failing_state() -> AppState {
        state_over(Arc::new(ReadOnlyStore), None).unwrap()
    }
}
