//! On-disk snapshot format shared by every [`SnapshotStore`].
//!
//! A snapshot is the whole glossary: every live row plus the id high-water
//! mark, so ids freed by deletes stay retired across restarts.

use chrono::{DateTime, Utc};
use domain::{Term, TermId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use thiserror::Error;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    #[error("term id space exhausted")]
    IdSpaceExhausted,
}

/// Blocking access to the durable copy of the glossary.
///
/// `persist` must either replace the previous snapshot completely or leave
/// it untouched.
pub trait SnapshotStore: Send + Sync {
    /// The last persisted snapshot, or `None` when nothing was ever written.
    fn load(&self) -> Result<Option<TermSnapshot>, StoreError>;
    fn persist(&self, snapshot: &TermSnapshot) -> Result<(), StoreError>;
    fn describe(&self) -> String;
}

/// One row of the `terms` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TermRecord {
    pub id: u64,
    pub term: String,
    pub definition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Term> for TermRecord {
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

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TermSnapshot {
    pub format_version: u32,
    /// Next id to hand out. Always greater than every id ever assigned.
    pub next_id: u64,
    pub terms: Vec<TermRecord>,
}

impl Default for TermSnapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: 1,
            terms: Vec::new(),
        }
    }
}

/// The materialized glossary: live terms keyed by their exact `term` string.
#[derive(Debug, Clone)]
pub(crate) struct TermTable {
    terms: HashMap<String, Term>,
    next_id: u64,
}

impl Default for TermTable {
    fn default() -> Self {
        Self {
            terms: HashMap::new(),
            next_id: 1,
        }
    }
}

impl TermTable {
    /// Rebuilds the table, rejecting any snapshot that breaks a row invariant.
    pub(crate) fn from_snapshot(snapshot: TermSnapshot) -> Result<Self, StoreError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormat {
                found: snapshot.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let mut terms = HashMap::with_capacity(snapshot.terms.len());
        let mut seen_ids = HashSet::with_capacity(snapshot.terms.len());
        let mut max_id = 0;
        for record in snapshot.terms {
            if record.id == 0 {
                return Err(StoreError::Corrupt(format!(
                    "term '{}' has reserved id 0",
                    record.term
                )));
            }
            if !seen_ids.insert(record.id) {
                return Err(StoreError::Corrupt(format!("duplicate id {}", record.id)));
            }
            max_id = max_id.max(record.id);
            let term = Term::restore(
                TermId::new(record.id),
                record.term,
                record.definition,
                record.created_at,
                record.updated_at,
            )
            .map_err(|e| StoreError::Corrupt(format!("row {}: {}", record.id, e)))?;
            let key = term.term().to_string();
            if terms.insert(key.clone(), term).is_some() {
                return Err(StoreError::Corrupt(format!("duplicate term '{}'", key)));
            }
        }

        let floor = max_id.checked_add(1).ok_or_else(|| {
            StoreError::Corrupt(format!("id {} leaves no room for new ids", max_id))
        })?;
        Ok(Self {
            terms,
            next_id: snapshot.next_id.max(floor).max(1),
        })
    }

    /// Rows are written in id order so successive snapshots diff cleanly.
    pub(crate) fn to_snapshot(&self) -> TermSnapshot {
        let mut records: Vec<TermRecord> = self.terms.values().map(TermRecord::from).collect();
        records.sort_by_key(|record| record.id);
        TermSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: self.next_id,
            terms: records,
        }
    }

    pub(crate) fn get(&self, term: &str) -> Option<&Term> {
        self.terms.get(term)
    }

    pub(crate) fn get_mut(&mut self, term: &str) -> Option<&mut Term> {
        self.terms.get_mut(term)
    }

    pub(crate) fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub(crate) fn insert(&mut self, term: Term) {
        self.terms.insert(term.term().to_string(), term);
    }

    pub(crate) fn remove(&mut self, term: &str) -> Option<Term> {
        self.terms.remove(term)
    }

    /// Reserves the next id. Never hands out the same id twice, so the last
    /// representable id is never issued.
    pub(crate) fn allocate_id(&mut self) -> Result<TermId, StoreError> {
        let id = TermId::new(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted)?;
        Ok(id)
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn len(&self) -> usize {
        self.terms.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }
}
