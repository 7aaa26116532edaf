//! Fingerprint-based duplicate classification.

use std::collections::HashSet;

use offerdb_core::{CandidateStatus, NewRawCandidate};

use crate::error::StoreError;
use crate::store::DealStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    New,
    Duplicate,
}

/// Classifies candidates against the store, keeping the first occurrence of
/// each fingerprint. Repeats within one run are caught by a local seen-set
/// before the store is consulted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `candidate`; a duplicate has its status set to
    /// `duplicate` and must not be persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the fingerprint lookup fails.
    pub async fn classify(
        &mut self,
        store: &dyn DealStore,
        candidate: &mut NewRawCandidate,
    ) -> Result<Classification, StoreError> {
        if !self.seen.insert(candidate.fingerprint.clone()) {
            mark_duplicate(candidate)?;
            return Ok(Classification::Duplicate);
        }

        if let Some(existing) = store.find_fingerprint(&candidate.fingerprint).await? {
            tracing::debug!(
                fingerprint = %candidate.fingerprint,
                existing,
                "candidate already stored"
            );
            mark_duplicate(candidate)?;
            return Ok(Classification::Duplicate);
        }

        Ok(Classification::New)
    }
}

/// Moves an unsaved candidate `new -> duplicate`.
///
/// # Errors
///
/// Returns [`StoreError::Transition`] if the candidate is no longer `new`.
pub fn mark_duplicate(candidate: &mut NewRawCandidate) -> Result<(), StoreError> {
    candidate.status = candidate.status.transition(CandidateStatus::Duplicate)?;
    Ok(())
}
