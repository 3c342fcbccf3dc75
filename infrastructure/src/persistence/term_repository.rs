use super::snapshot::{SnapshotStore, TermTable};
use application::{ApplicationError, TermRepository, TermSort};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Term, validate_definition, validate_term_key};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Term repository that keeps the whole glossary in memory and writes a full
/// snapshot to its [`SnapshotStore`] on every mutation.
///
/// Mutations run one at a time under the write lock: the change is staged on
/// a copy of the table, the copy is persisted, and only then does it replace
/// the visible table. A failed persist drops the copy, so readers never see a
/// write that did not reach the store. The whole sequence runs on a blocking
/// task, which keeps it going to completion even if the caller goes away.
pub struct SnapshotTermRepository {
    table: Arc<RwLock<TermTable>>,
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotTermRepository {
    /// Loads the store (empty if it was never written) and rebuilds the table.
    /// A snapshot that fails validation is an error, never silently replaced.
    pub fn open(store: Arc<dyn SnapshotStore>) -> Result<Self, ApplicationError> {
        let location = store.describe();
        let table = match store
            .load()
            .map_err(|e| ApplicationError::storage(format!("loading {}", location), e))?
        {
            Some(snapshot) => TermTable::from_snapshot(snapshot)
                .map_err(|e| ApplicationError::storage(format!("validating {}", location), e))?,
            None => TermTable::default(),
        };
        info!(
            store = %location,
            terms = table.len(),
            next_id = table.next_id(),
            "Term repository opened"
        );
        Ok(Self {
            table: Arc::new(RwLock::new(table)),
            store,
        })
    }

    /// Runs `change` against a staged copy of the table and commits it only
    /// if the resulting snapshot persists.
    async fn mutate<T, F>(&self, context: &'static str, change: F) -> Result<T, ApplicationError>
    where
        T: Send + 'static,
        F: FnOnce(&mut TermTable) -> Result<T, ApplicationError> + Send + 'static,
    {
        let table = Arc::clone(&self.table);
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut visible = table.blocking_write();
            let mut staged = visible.clone();
            let outcome = change(&mut staged)?;
            if let Err(e) = store.persist(&staged.to_snapshot()) {
                error!(operation = context, "Snapshot persist failed, discarding staged change: {}", e);
                return Err(ApplicationError::storage(context, e));
            }
            *visible = staged;
            Ok(outcome)
        })
        .await
        .map_err(|e| {
            error!(operation = context, "Mutation task failed: {}", e);
            ApplicationError::storage(context, e)
        })?
    }
}

#[async_trait]
impl TermRepository for SnapshotTermRepository {
    #[instrument(skip(self))]
    async fn list(&self, sort: TermSort) -> Result<Vec<Term>, ApplicationError> {
        let table = self.table.read().await;
        let mut terms: Vec<Term> = table.iter().cloned().collect();
        drop(table);
        terms.sort_by(|a, b| sort.compare(a, b));
        debug!(count = terms.len(), "Listed terms from snapshot repository");
        Ok(terms)
    }

    #[instrument(skip(self))]
    async fn get(&self, term: &str) -> Result<Term, ApplicationError> {
        self.table
            .read()
            .await
            .get(term)
            .cloned()
            .ok_or_else(|| ApplicationError::NotFound(term.to_string()))
    }

    #[instrument(skip(self, definition))]
    async fn create(&self, term: &str, definition: &str) -> Result<Term, ApplicationError> {
        validate_term_key(term)?;
        validate_definition(definition)?;
        let key = term.to_string();
        let definition = definition.to_string();
        let created = self
            .mutate("create", move |table| {
                if table.contains(&key) {
                    warn!(term = %key, "Create rejected: term already exists");
                    return Err(ApplicationError::AlreadyExists(key));
                }
                let id = table
                    .allocate_id()
                    .map_err(|e| ApplicationError::storage("create", e))?;
                let created = Term::new(id, key, definition, Utc::now())?;
                table.insert(created.clone());
                Ok(created)
            })
            .await?;
        debug!(id = %created.id(), "Term persisted");
        Ok(created)
    }

    #[instrument(skip(self, definition))]
    async fn update(&self, term: &str, definition: &str) -> Result<Term, ApplicationError> {
        validate_term_key(term)?;
        validate_definition(definition)?;
        let key = term.to_string();
        let definition = definition.to_string();
        self.mutate("update", move |table| {
            let existing = table
                .get_mut(&key)
                .ok_or_else(|| ApplicationError::NotFound(key.clone()))?;
            existing.redefine(definition, Utc::now())?;
            Ok(existing.clone())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, term: &str) -> Result<(), ApplicationError> {
        let key = term.to_string();
        let removed = self
            .mutate("delete", move |table| {
                table
                    .remove(&key)
                    .ok_or_else(|| ApplicationError::NotFound(key.clone()))
            })
            .await?;
        debug!(id = %removed.id(), "Term removed");
        Ok(())
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.table.read().await.len())
    }

    fn describe_store(&self) -> String {
        self.store.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::in_memory_store::InMemorySnapshotStore;
    use crate::persistence::json_file_store::JsonFileSnapshotStore;
    use crate::persistence::snapshot::{StoreError, TermRecord, TermSnapshot};
    use application::{SortField, SortOrder};
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Store whose writes can be switched to fail, for crash-consistency checks.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemorySnapshotStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn set_failing(&self, failing: bool) {
            self.fail_writes.store(failing, Ordering::SeqCst);
        }
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self) -> Result<Option<TermSnapshot>, StoreError> {
            self.inner.load()
        }

        fn persist(&self, snapshot: &TermSnapshot) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Io(io::Error::other("disk full")));
            }
            self.inner.persist(snapshot)
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn memory_repo() -> (SnapshotTermRepository, InMemorySnapshotStore) {
        let store = InMemorySnapshotStore::new();
        let repo = SnapshotTermRepository::open(Arc::new(store.clone())).unwrap();
        (repo, store)
    }

    fn keys(terms: &[Term]) -> Vec<&str> {
        terms.iter().map(|t| t.term()).collect()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (repo, _) = memory_repo();
        let created = repo.create("X", "d").await.unwrap();
        let fetched = repo.get("X").await.unwrap();
        assert_eq!(fetched.term(), "X");
        assert_eq!(fetched.definition(), "d");
        assert_eq!(fetched, created);
        assert_eq!(created.created_at(), created.updated_at());
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (repo, _) = memory_repo();
        assert!(repo.list(TermSort::default()).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected_and_keeps_original() {
        let (repo, _) = memory_repo();
        repo.create("X", "d1").await.unwrap();
        let second = repo.create("X", "d2").await;
        assert!(matches!(second, Err(ApplicationError::AlreadyExists(key)) if key == "X"));

        let all = repo.list(TermSort::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].definition(), "d1");
    }

    #[tokio::test]
    async fn keys_are_case_sensitive() {
        let (repo, _) = memory_repo();
        repo.create("api", "lower").await.unwrap();
        repo.create("API", "upper").await.unwrap();
        assert_eq!(repo.get("API").await.unwrap().definition(), "upper");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_fields_are_invalid_input() {
        let (repo, store) = memory_repo();
        assert!(matches!(
            repo.create("", "d").await,
            Err(ApplicationError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.create("X", "  ").await,
            Err(ApplicationError::InvalidInput(_))
        ));
        repo.create("X", "d").await.unwrap();
        assert!(matches!(
            repo.update("X", "").await,
            Err(ApplicationError::InvalidInput(_))
        ));
        assert_eq!(repo.get("X").await.unwrap().definition(), "d");
        // Only the successful create reached the store
        assert_eq!(store.load().unwrap().unwrap().next_id, 2);
    }

    #[tokio::test]
    async fn missing_terms_are_not_found_and_store_is_unchanged() {
        let (repo, store) = memory_repo();
        repo.create("present", "here").await.unwrap();
        let before = store.load().unwrap();

        assert!(matches!(
            repo.update("missing", "d").await,
            Err(ApplicationError::NotFound(key)) if key == "missing"
        ));
        assert!(matches!(
            repo.delete("missing").await,
            Err(ApplicationError::NotFound(_))
        ));
        assert!(matches!(
            repo.get("missing").await,
            Err(ApplicationError::NotFound(_))
        ));
        assert_eq!(store.load().unwrap(), before);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_refreshes_updated_at_and_keeps_created_at() {
        let (repo, _) = memory_repo();
        let created = repo.create("REST", "old").await.unwrap();
        let updated = repo.update("REST", "Representational State Transfer").await.unwrap();
        assert_eq!(updated.id(), created.id());
        assert_eq!(updated.created_at(), created.created_at());
        assert!(updated.updated_at() >= created.updated_at());
        assert!(updated.created_at() <= updated.updated_at());
        assert_eq!(
            repo.get("REST").await.unwrap().definition(),
            "Representational State Transfer"
        );
    }

    #[tokio::test]
    async fn sort_contract_holds() {
        let (repo, _) = memory_repo();
        repo.create("b", "created first").await.unwrap();
        repo.create("a", "created second").await.unwrap();

        let by_term = repo
            .list(TermSort::new(SortField::Term, SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(keys(&by_term), ["a", "b"]);

        let newest_first = repo.list(TermSort::default()).await.unwrap();
        assert_eq!(keys(&newest_first), ["a", "b"]);

        let oldest_first = repo
            .list(TermSort::new(SortField::CreatedAt, SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(keys(&oldest_first), ["b", "a"]);
    }

    #[tokio::test]
    async fn sort_by_updated_at_follows_latest_edit() {
        let (repo, _) = memory_repo();
        repo.create("first", "one").await.unwrap();
        repo.create("second", "two").await.unwrap();
        repo.update("first", "edited").await.unwrap();
        let listed = repo
            .list(TermSort::new(SortField::UpdatedAt, SortOrder::Desc))
            .await
            .unwrap();
        assert!(listed[0].updated_at() >= listed[1].updated_at());
        let first = listed.iter().find(|t| t.term() == "first").unwrap();
        assert!(first.created_at() <= first.updated_at());
        assert_eq!(first.definition(), "edited");
    }

    #[tokio::test]
    async fn repeated_list_is_identical() {
        let (repo, _) = memory_repo();
        for key in ["DNS", "TLS", "SSL", "CDN"] {
            repo.create(key, "networking").await.unwrap();
        }
        let first = repo.list(TermSort::default()).await.unwrap();
        let second = repo.list(TermSort::default()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ids_are_never_reused_even_across_restart() {
        let (repo, store) = memory_repo();
        let a = repo.create("a", "1").await.unwrap();
        let b = repo.create("b", "2").await.unwrap();
        assert!(b.id() > a.id());

        // Delete the highest id, then restart against the same store
        repo.delete("b").await.unwrap();
        drop(repo);
        let reopened = SnapshotTermRepository::open(Arc::new(store)).unwrap();
        let c = reopened.create("c", "3").await.unwrap();
        assert!(c.id() > b.id());
        let recreated = reopened.create("b", "again").await.unwrap();
        assert!(recreated.id() > c.id());
    }

    #[tokio::test]
    async fn state_survives_restart_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glossary.json");
        {
            let repo =
                SnapshotTermRepository::open(Arc::new(JsonFileSnapshotStore::new(&path))).unwrap();
            repo.create("Redis", "cache").await.unwrap();
            repo.create("Nginx", "web server").await.unwrap();
            repo.update("Redis", "In-memory data structure store").await.unwrap();
            repo.delete("Nginx").await.unwrap();
        }
        let repo =
            SnapshotTermRepository::open(Arc::new(JsonFileSnapshotStore::new(&path))).unwrap();
        let all = repo.list(TermSort::default()).await.unwrap();
        assert_eq!(keys(&all), ["Redis"]);
        assert_eq!(all[0].definition(), "In-memory data structure store");
        assert_eq!(repo.create("Kafka", "streams").await.unwrap().id().value(), 3);
        assert!(repo.describe_store().ends_with("glossary.json"));
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_create() {
        let store = Arc::new(FlakyStore::default());
        let repo = SnapshotTermRepository::open(store.clone()).unwrap();
        store.set_failing(true);

        let result = repo.create("X", "d").await;
        assert!(matches!(result, Err(ApplicationError::StorageFailure { .. })));
        assert!(matches!(
            repo.get("X").await,
            Err(ApplicationError::NotFound(_))
        ));
        assert_eq!(repo.count().await.unwrap(), 0);

        // The id consumed by the failed attempt was never committed
        store.set_failing(false);
        let created = repo.create("X", "d").await.unwrap();
        assert_eq!(created.id().value(), 1);
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_update_and_delete() {
        let store = Arc::new(FlakyStore::default());
        let repo = SnapshotTermRepository::open(store.clone()).unwrap();
        let original = repo.create("X", "d1").await.unwrap();
        store.set_failing(true);

        assert!(matches!(
            repo.update("X", "d2").await,
            Err(ApplicationError::StorageFailure { .. })
        ));
        assert!(matches!(
            repo.delete("X").await,
            Err(ApplicationError::StorageFailure { .. })
        ));
        assert_eq!(repo.get("X").await.unwrap(), original);
    }

    #[tokio::test]
    async fn exhausted_id_space_fails_create_without_wrapping() {
        let store = InMemorySnapshotStore::with_snapshot(TermSnapshot {
            next_id: u64::MAX,
            ..TermSnapshot::default()
        });
        let repo = SnapshotTermRepository::open(Arc::new(store.clone())).unwrap();

        let result = repo.create("X", "d").await;
        assert!(matches!(result, Err(ApplicationError::StorageFailure { .. })));
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(store.load().unwrap().unwrap().next_id, u64::MAX);
    }

    #[tokio::test]
    async fn snapshot_with_largest_id_fails_open() {
        let at = Utc::now();
        let store = InMemorySnapshotStore::with_snapshot(TermSnapshot {
            next_id: 1,
            terms: vec![TermRecord {
                id: u64::MAX,
                term: "Overflow".to_string(),
                definition: "last id".to_string(),
                created_at: at,
                updated_at: at,
            }],
            ..TermSnapshot::default()
        });
        let result = SnapshotTermRepository::open(Arc::new(store));
        assert!(matches!(result, Err(ApplicationError::StorageFailure { .. })));
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glossary.json");
        std::fs::write(&path, b"[]").unwrap();
        let result = SnapshotTermRepository::open(Arc::new(JsonFileSnapshotStore::new(&path)));
        assert!(matches!(result, Err(ApplicationError::StorageFailure { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_keep_terms_unique() {
        let (repo, store) = memory_repo();
        let repo = Arc::new(repo);
        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = Arc::clone(&repo);
            // Every key is attempted by two tasks
            handles.push(tokio::spawn(async move {
                repo.create(&format!("term-{}", i % 16), "racing").await
            }));
        }
        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ApplicationError::AlreadyExists(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(created, 16);
        assert_eq!(conflicts, 16);

        let all = repo.list(TermSort::default()).await.unwrap();
        let unique: HashSet<&str> = all.iter().map(|t| t.term()).collect();
        assert_eq!(unique.len(), all.len());
        let ids: HashSet<u64> = all.iter().map(|t| t.id().value()).collect();
        assert_eq!(ids.len(), all.len());
        assert_eq!(store.load().unwrap().unwrap().terms.len(), 16);
    }
}
