use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{DomainError, Term};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use sysinfo::{Disks, MemoryRefreshKind, Pid, System};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

// --- Application Errors ---

/// The four outcome classes every adapter maps onto its own wire format.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Term '{0}' not found")]
    NotFound(String),
    #[error("Term '{0}' already exists")]
    AlreadyExists(String),
    #[error("Storage failure during {context}: {source}")]
    StorageFailure {
        context: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub fn storage(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StorageFailure {
            context: context.into(),
            source: source.into(),
        }
    }
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

// --- Sorting ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Term,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "term" => Ok(Self::Term),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Ordering applied by `TermRepository::list`. Defaults to newest-created first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl TermSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Builds a sort from raw request parameters. Missing or unknown values
    /// fall back to the default instead of failing.
    pub fn from_params(sort_by: Option<&str>, order: Option<&str>) -> Self {
        let field = sort_by
            .map(|raw| {
                raw.parse().unwrap_or_else(|reason| {
                    debug!(%reason, "Falling back to default sort field");
                    SortField::default()
                })
            })
            .unwrap_or_default();
        let order = order
            .map(|raw| {
                raw.parse().unwrap_or_else(|reason| {
                    debug!(%reason, "Falling back to default sort order");
                    SortOrder::default()
                })
            })
            .unwrap_or_default();
        Self { field, order }
    }

    /// Total order over terms; ties on the sort field are broken by id in the
    /// same direction.
    pub fn compare(&self, a: &Term, b: &Term) -> Ordering {
        let ordering = match self.field {
            SortField::Term => a.term().cmp(b.term()),
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
        }
        .then_with(|| a.id().cmp(&b.id()));
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

// --- Infrastructure Interfaces (Traits) ---

/// The single authoritative gateway for reads and writes against the glossary.
///
/// Implementations serialize mutations against each other, never expose a
/// partially applied mutation to readers, and only report success once the
/// change has reached durable storage.
#[async_trait]
pub trait TermRepository: Send + Sync {
    /// All live terms in the requested order. Empty store yields an empty list.
    async fn list(&self, sort: TermSort) -> Result<Vec<Term>, ApplicationError>;
    /// The term with exactly this key, or `NotFound`.
    async fn get(&self, term: &str) -> Result<Term, ApplicationError>;
    /// Inserts a new term. `AlreadyExists` leaves the store untouched.
    async fn create(&self, term: &str, definition: &str) -> Result<Term, ApplicationError>;
    /// Replaces the definition of an existing term.
    async fn update(&self, term: &str, definition: &str) -> Result<Term, ApplicationError>;
    /// Removes exactly one term. The freed id is never handed out again.
    async fn delete(&self, term: &str) -> Result<(), ApplicationError>;
    /// Number of live terms.
    async fn count(&self) -> Result<usize, ApplicationError>;
    /// Human-readable location of the durable store.
    fn describe_store(&self) -> String;
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct CreateTermRequest {
    #[schema(example = "API")]
    pub term: String,
    #[schema(example = "Application Programming Interface")]
    pub definition: String,
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct UpdateTermRequest {
    pub definition: String,
}

/// Optional listing parameters; see [`TermSort::from_params`].
#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTermsQuery {
    /// One of `term`, `created_at` (default) or `updated_at`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub order: Option<String>,
}

impl ListTermsQuery {
    pub fn sort(&self) -> TermSort {
        TermSort::from_params(self.sort_by.as_deref(), self.order.as_deref())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct TermResponse {
    pub id: u64,
    pub term: String,
    pub definition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Term> for TermResponse {
    fn from(term: &Term) -> Self {
        Self {
            id: term.id().value(),
            term: term.term().to_string(),
            definition: term.definition().to_string(),
            created_at: term.created_at(),
            updated_at: term.updated_at(),
        }
    }
}

impl From<Term> for TermResponse {
    fn from(term: Term) -> Self {
        Self::from(&term)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

// --- Application Services (Use Cases) ---

/// Use cases shared by the REST and RPC adapters.
pub struct GlossaryService {
    repo: Arc<dyn TermRepository>,
}

impl GlossaryService {
    pub fn new(repo: Arc<dyn TermRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, query))]
    pub async fn list_terms(
        &self,
        query: &ListTermsQuery,
    ) -> Result<Vec<TermResponse>, ApplicationError> {
        let sort = query.sort();
        info!(field = ?sort.field, order = ?sort.order, "Listing terms");
        let terms = self.repo.list(sort).await?;
        debug!(count = terms.len(), "Listed terms");
        Ok(terms.into_iter().map(TermResponse::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_term(&self, term: &str) -> Result<TermResponse, ApplicationError> {
        info!("Looking up term");
        match self.repo.get(term).await {
            Ok(found) => Ok(found.into()),
            Err(e) => {
                if matches!(e, ApplicationError::NotFound(_)) {
                    info!("Term not found");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(self, request), fields(term = %request.term))]
    pub async fn create_term(
        &self,
        request: CreateTermRequest,
    ) -> Result<TermResponse, ApplicationError> {
        info!("Attempting to create term");
        let created = self
            .repo
            .create(&request.term, &request.definition)
            .await
            .inspect_err(|e| warn!("Term creation rejected: {}", e))?;
        info!(id = %created.id(), "Term created");
        Ok(created.into())
    }

    #[instrument(skip(self, request))]
    pub async fn update_term(
        &self,
        term: &str,
        request: UpdateTermRequest,
    ) -> Result<TermResponse, ApplicationError> {
        info!("Attempting to update term definition");
        let updated = self
            .repo
            .update(term, &request.definition)
            .await
            .inspect_err(|e| warn!("Term update rejected: {}", e))?;
        info!(id = %updated.id(), "Term definition updated");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_term(&self, term: &str) -> Result<MessageResponse, ApplicationError> {
        info!("Attempting to delete term");
        self.repo
            .delete(term)
            .await
            .inspect_err(|e| warn!("Term deletion rejected: {}", e))?;
        info!("Term deleted");
        Ok(MessageResponse {
            message: format!("Term '{}' deleted", term),
        })
    }

    /// Inserts each entry unless its term already exists. Any other failure
    /// stops seeding and is returned.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn seed_terms(
        &self,
        entries: &[(&str, &str)],
    ) -> Result<SeedReport, ApplicationError> {
        let mut report = SeedReport::default();
        for (term, definition) in entries {
            match self.repo.create(term, definition).await {
                Ok(_) => report.inserted += 1,
                Err(ApplicationError::AlreadyExists(_)) => {
                    debug!(term = %term, "Seed entry already present, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(term = %term, "Seeding aborted: {}", e);
                    return Err(e);
                }
            }
        }
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Seeding finished"
        );
        Ok(report)
    }
}

// --- Statistics ---

#[derive(Serialize, Debug)]
pub struct MemoryStats {
    total_bytes: u64,
    used_bytes: u64,
    available_bytes: u64,
    process_used_bytes: u64, // Memory used by this glossary process
}

#[derive(Serialize, Debug)]
pub struct DiskStats {
    disk_path: String, // Mount point holding the data file
    total_bytes: u64,
    available_bytes: u64,
}

#[derive(Serialize, Debug)]
pub struct StoreStats {
    pub total_terms: usize,
    pub location: String,
}

#[derive(Serialize, Debug)]
pub struct SystemInfo {
    os_name: String,
    os_version: String,
}

/// Response for the /stats endpoint.
#[derive(Serialize, Debug)]
pub struct StatsResponse {
    pub store: StoreStats,
    system_info: SystemInfo,
    memory: MemoryStats,
    disk: DiskStats,
}

pub struct StatsService {
    repo: Arc<dyn TermRepository>,
    data_path: Option<PathBuf>,
}

impl StatsService {
    /// `data_path` is the snapshot file; `None` for the in-memory store.
    pub fn new(repo: Arc<dyn TermRepository>, data_path: Option<PathBuf>) -> Self {
        Self { repo, data_path }
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<StatsResponse, ApplicationError> {
        info!("Gathering store and system statistics");

        let total_terms = self.repo.count().await.map_err(|e| {
            error!("Failed to count terms for stats: {}", e);
            e
        })?;
        let store = StoreStats {
            total_terms,
            location: self.repo.describe_store(),
        };
        debug!("Store stats gathered: {:?}", store);

        // Resolve the directory whose disk we report on
        let probe_dir = self
            .data_path
            .as_ref()
            .and_then(|path| path.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));
        let probe_dir = std::fs::canonicalize(&probe_dir).unwrap_or(probe_dir);

        // sysinfo calls block, keep them off the async workers
        let (system_info, memory, disk) = tokio::task::spawn_blocking(move || {
            let mut sys = System::new_all();
            sys.refresh_memory_specifics(MemoryRefreshKind::everything());
            let disks = Disks::new_with_refreshed_list();

            let current_pid = Pid::from(std::process::id() as usize);
            let memory = MemoryStats {
                total_bytes: sys.total_memory(),
                used_bytes: sys.used_memory(),
                available_bytes: sys.available_memory(),
                process_used_bytes: sys.process(current_pid).map_or(0, |p| p.memory()),
            };

            // Longest mount point that prefixes the probe directory wins
            let disk = disks
                .list()
                .iter()
                .filter(|disk| probe_dir.starts_with(disk.mount_point()))
                .max_by_key(|disk| disk.mount_point().as_os_str().len())
                .map(|disk| DiskStats {
                    disk_path: disk.mount_point().to_string_lossy().into_owned(),
                    total_bytes: disk.total_space(),
                    available_bytes: disk.available_space(),
                })
                .unwrap_or(DiskStats {
                    disk_path: "unknown".to_string(),
                    total_bytes: 0,
                    available_bytes: 0,
                });

            let system_info = SystemInfo {
                os_name: System::name().unwrap_or_else(|| "Unknown OS".to_string()),
                os_version: System::os_version().unwrap_or_else(|| "Unknown Version".to_string()),
            };
            (system_info, memory, disk)
        })
        .await
        .map_err(|e| ApplicationError::storage("system stat gathering", e))?;

        Ok(StatsResponse {
            store,
            system_info,
            memory,
            disk,
        })
    }
}
