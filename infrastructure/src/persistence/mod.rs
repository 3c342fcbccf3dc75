pub mod in_memory_store;
pub mod json_file_store;
pub mod snapshot;
pub mod term_repository;

// Re-export the store implementations and the repository built on them
pub use in_memory_store::InMemorySnapshotStore;
pub use json_file_store::JsonFileSnapshotStore;
pub use snapshot::{SnapshotStore, StoreError, TermRecord, TermSnapshot};
pub use term_repository::SnapshotTermRepository;
