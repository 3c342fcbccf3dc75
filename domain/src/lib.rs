use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Term must not be empty")]
    EmptyTerm,
    #[error("Definition must not be empty")]
    EmptyDefinition,
    #[error("Term '{term}' has created_at {created_at} after updated_at {updated_at}")]
    TimestampOrder {
        term: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
}

// --- Term ID ---

/// Store-assigned identifier. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(u64);

impl TermId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Field validation ---

/// Whitespace-only counts as empty. The value itself is never trimmed.
pub fn validate_term_key(term: &str) -> Result<(), DomainError> {
    if term.trim().is_empty() {
        return Err(DomainError::EmptyTerm);
    }
    Ok(())
}

pub fn validate_definition(definition: &str) -> Result<(), DomainError> {
    if definition.trim().is_empty() {
        return Err(DomainError::EmptyDefinition);
    }
    Ok(())
}

// --- Term ---

/// A glossary entry: a unique keyword plus its definition.
///
/// `term` and `created_at` are fixed at construction; only the definition
/// (and with it `updated_at`) can change afterwards. Not `Deserialize`:
/// stored rows come back through [`Term::restore`].
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Term {
    id: TermId,
    term: String,
    definition: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Term {
    /// Creates a fresh term with `created_at == updated_at == now`.
    pub fn new(
        id: TermId,
        term: impl Into<String>,
        definition: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let term = term.into();
        let definition = definition.into();
        validate_term_key(&term)?;
        validate_definition(&definition)?;
        Ok(Self {
            id,
            term,
            definition,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a term from previously stored parts, re-checking every invariant.
    pub fn restore(
        id: TermId,
        term: String,
        definition: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_term_key(&term)?;
        validate_definition(&definition)?;
        if created_at > updated_at {
            return Err(DomainError::TimestampOrder {
                term,
                created_at,
                updated_at,
            });
        }
        Ok(Self {
            id,
            term,
            definition,
            created_at,
            updated_at,
        })
    }

    /// Replaces the definition and refreshes `updated_at`.
    ///
    /// A clock that went backwards never pushes `updated_at` below `created_at`.
    pub fn redefine(
        &mut self,
        definition: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let definition = definition.into();
        validate_definition(&definition)?;
        self.definition = definition;
        self.updated_at = now.max(self.created_at);
        Ok(())
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
