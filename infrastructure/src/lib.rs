// Module declarations
pub mod persistence;

// Re-export all implementations
pub use persistence::{
    InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore, SnapshotTermRepository,
    StoreError, TermRecord, TermSnapshot,
};
