use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use offerdb_core::{
    BatchMember, BatchStatus, CandidateStatus, DealDetails, NewRawCandidate, ProcessingBatch,
    RawCandidate, Rating, SourceRecord, SourcesFile, StoredRating, StructuredDeal,
};
use uuid::Uuid;

use super::DealStore;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    sources: Vec<SourceRecord>,
    raw: BTreeMap<i64, RawCandidate>,
    fingerprints: HashMap<String, i64>,
    deals: BTreeMap<i64, StructuredDeal>,
    deal_by_raw: HashMap<i64, i64>,
    ratings: HashMap<i64, StoredRating>,
    batches: BTreeMap<i64, ProcessingBatch>,
    members: HashMap<i64, Vec<i64>>,
    last_raw_id: i64,
    last_deal_id: i64,
    last_batch_id: i64,
}

impl State {
    fn batch_mut(&mut self, batch_id: i64) -> Result<&mut ProcessingBatch, StoreError> {
        self.batches.get_mut(&batch_id).ok_or(StoreError::NotFound {
            kind: "batch",
            id: batch_id,
        })
    }

    fn raw_mut(&mut self, raw_id: i64) -> Result<&mut RawCandidate, StoreError> {
        self.raw.get_mut(&raw_id).ok_or(StoreError::NotFound {
            kind: "raw candidate",
            id: raw_id,
        })
    }
}

fn check_score(score: u8) -> Result<(), StoreError> {
    if (1..=10).contains(&score) {
        Ok(())
    } else {
        Err(StoreError::InvalidScore(score))
    }
}

/// In-process [`DealStore`] with the same uniqueness and status rules as
/// the Postgres store. Every operation takes one lock, so each is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the given sources as they are.
    #[must_use]
    pub fn with_sources(sources: Vec<SourceRecord>) -> Self {
        let store = Self::new();
        store.state().sources = sources;
        store
    }

    /// Store seeded from the registry file; ids follow file order from 1.
    #[must_use]
    pub fn from_sources_file(file: &SourcesFile) -> Self {
        let sources = file
            .sources
            .iter()
            .zip(1_i64..)
            .map(|(config, id)| SourceRecord::from_config(id, config))
            .collect();
        Self::with_sources(sources)
    }

    /// Snapshot of every raw candidate in id order.
    #[must_use]
    pub fn raw_candidates(&self) -> Vec<RawCandidate> {
        self.state().raw.values().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        Ok(self.state().sources.clone())
    }

    async fn touch_source(&self, source_id: i64) -> Result<(), StoreError> {
        let mut state = self.state();
        let source = state
            .sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or(StoreError::NotFound {
                kind: "source",
                id: source_id,
            })?;
        source.last_fetched_at = Some(Utc::now());
        Ok(())
    }

    async fn find_fingerprint(&self, fingerprint: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.state().fingerprints.get(fingerprint).copied())
    }

    async fn insert_raw_candidate(
        &self,
        candidate: &NewRawCandidate,
    ) -> Result<Option<i64>, StoreError> {
        let mut state = self.state();
        if state.fingerprints.contains_key(&candidate.fingerprint) {
            return Ok(None);
        }

        let source_name = state
            .sources
            .iter()
            .find(|s| s.id == candidate.source_id)
            .map(|s| s.name.clone())
            .ok_or(StoreError::NotFound {
                kind: "source",
                id: candidate.source_id,
            })?;

        state.last_raw_id += 1;
        let id = state.last_raw_id;
        state.fingerprints.insert(candidate.fingerprint.clone(), id);
        state.raw.insert(
            id,
            RawCandidate {
                id,
                source_id: candidate.source_id,
                source_name,
                draft: candidate.draft.clone(),
                fetched_at: candidate.fetched_at,
                fingerprint: candidate.fingerprint.clone(),
                status: CandidateStatus::New,
                error_message: None,
            },
        );
        Ok(Some(id))
    }

    async fn mark_candidate_error(&self, raw_id: i64, message: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let raw = state.raw_mut(raw_id)?;
        raw.status = raw.status.transition(CandidateStatus::Error)?;
        raw.error_message = Some(message.to_string());
        Ok(())
    }

    async fn create_batch(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Option<ProcessingBatch>, StoreError> {
        let mut state = self.state();
        let claimed: Vec<i64> = state
            .raw
            .values()
            .filter(|r| r.status == CandidateStatus::New)
            .map(|r| r.id)
            .take(limit)
            .collect();
        if claimed.is_empty() {
            return Ok(None);
        }

        for raw_id in &claimed {
            let raw = state.raw_mut(*raw_id)?;
            raw.status = raw.status.transition(CandidateStatus::Processing)?;
        }

        state.last_batch_id += 1;
        let batch = ProcessingBatch {
            id: state.last_batch_id,
            public_id: Uuid::new_v4(),
            name: name.to_string(),
            status: BatchStatus::Created,
            deals_count: i32::try_from(claimed.len()).unwrap_or(i32::MAX),
            notes: None,
            created_at: Utc::now(),
            exported_at: None,
            imported_at: None,
            completed_at: None,
        };
        state.members.insert(batch.id, claimed);
        state.batches.insert(batch.id, batch.clone());
        Ok(Some(batch))
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<ProcessingBatch>, StoreError> {
        Ok(self.state().batches.get(&batch_id).cloned())
    }

    async fn batch_members(&self, batch_id: i64) -> Result<Vec<BatchMember>, StoreError> {
        let state = self.state();
        let Some(raw_ids) = state.members.get(&batch_id) else {
            return Ok(Vec::new());
        };

        raw_ids
            .iter()
            .zip(1_i32..)
            .map(|(raw_id, position)| {
                let candidate = state.raw.get(raw_id).cloned().ok_or(StoreError::NotFound {
                    kind: "raw candidate",
                    id: *raw_id,
                })?;
                Ok(BatchMember {
                    position,
                    candidate,
                    structured_deal_id: state.deal_by_raw.get(raw_id).copied(),
                })
            })
            .collect()
    }

    async fn mark_batch_processing(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let mut state = self.state();
        let batch = state.batch_mut(batch_id)?;
        if batch.status == BatchStatus::Created {
            batch.status = BatchStatus::Processing;
        }
        Ok(batch.clone())
    }

    async fn mark_batch_exported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let mut state = self.state();
        let batch = state.batch_mut(batch_id)?;
        batch.exported_at = Some(Utc::now());
        if batch.status == BatchStatus::Created {
            batch.status = BatchStatus::Processing;
        }
        Ok(batch.clone())
    }

    async fn mark_batch_imported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let mut state = self.state();
        let batch = state.batch_mut(batch_id)?;
        batch.imported_at = Some(Utc::now());
        if batch.status == BatchStatus::Created {
            batch.status = BatchStatus::Processing;
        }
        Ok(batch.clone())
    }

    async fn refresh_batch_status(&self, batch_id: i64) -> Result<BatchStatus, StoreError> {
        let mut state = self.state();
        let statuses: Vec<CandidateStatus> = state
            .members
            .get(&batch_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.raw.get(id).map(|r| r.status))
                    .collect()
            })
            .unwrap_or_default();

        let batch = state.batch_mut(batch_id)?;
        let next = BatchStatus::from_members(batch.status, &statuses);
        if next != batch.status {
            batch.status = next;
            if next == BatchStatus::Completed {
                batch.completed_at = Some(Utc::now());
            }
        }
        Ok(next)
    }

    async fn insert_structured_deal(
        &self,
        raw_id: i64,
        details: &DealDetails,
        rating: Option<&Rating>,
    ) -> Result<i64, StoreError> {
        let mut state = self.state();
        if let Some(rating) = rating {
            check_score(rating.score)?;
        }

        let raw = state.raw_mut(raw_id)?;
        raw.status = raw.status.transition(CandidateStatus::Processed)?;
        raw.error_message = None;

        state.last_deal_id += 1;
        let deal_id = state.last_deal_id;
        let now = Utc::now();
        state.deals.insert(
            deal_id,
            StructuredDeal {
                id: deal_id,
                raw_candidate_id: raw_id,
                details: details.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        state.deal_by_raw.insert(raw_id, deal_id);

        if let Some(rating) = rating {
            state.ratings.insert(
                deal_id,
                StoredRating {
                    deal_id,
                    rating: rating.clone(),
                    rated_at: now,
                },
            );
        }
        Ok(deal_id)
    }

    async fn get_structured_deal(
        &self,
        deal_id: i64,
    ) -> Result<Option<StructuredDeal>, StoreError> {
        Ok(self.state().deals.get(&deal_id).cloned())
    }

    async fn list_structured_deals(&self) -> Result<Vec<StructuredDeal>, StoreError> {
        Ok(self.state().deals.values().cloned().collect())
    }

    async fn update_structured_deal(
        &self,
        deal_id: i64,
        details: &DealDetails,
    ) -> Result<StructuredDeal, StoreError> {
        let mut state = self.state();
        let deal = state.deals.get_mut(&deal_id).ok_or(StoreError::NotFound {
            kind: "structured deal",
            id: deal_id,
        })?;
        deal.details = details.clone();
        deal.updated_at = Utc::now();
        Ok(deal.clone())
    }

    async fn get_rating(&self, deal_id: i64) -> Result<Option<StoredRating>, StoreError> {
        Ok(self.state().ratings.get(&deal_id).cloned())
    }

    async fn upsert_rating(
        &self,
        deal_id: i64,
        rating: &Rating,
    ) -> Result<StoredRating, StoreError> {
        check_score(rating.score)?;
        if let Some(model_score) = rating.model_score {
            check_score(model_score)?;
        }

        let mut state = self.state();
        if !state.deals.contains_key(&deal_id) {
            return Err(StoreError::NotFound {
                kind: "structured deal",
                id: deal_id,
            });
        }
        let stored = StoredRating {
            deal_id,
            rating: rating.clone(),
            rated_at: Utc::now(),
        };
        state.ratings.insert(deal_id, stored.clone());
        Ok(stored)
    }
}
