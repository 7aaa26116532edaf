//! Persistence seam for the pipeline.
//!
//! [`PgStore`] is the production store; [`MemoryStore`] backs dry runs and
//! tests. Both enforce the same contract: fingerprints are unique, the
//! check-and-insert of a raw candidate is atomic, and structuring writes the
//! deal, its rating, and the `processed` status together or not at all.

mod memory;
mod postgres;

use async_trait::async_trait;
use offerdb_core::{
    BatchMember, BatchStatus, DealDetails, NewRawCandidate, ProcessingBatch, Rating,
    SourceRecord, StoredRating, StructuredDeal,
};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait DealStore: Send + Sync {
    /// Every known source, active or not.
    async fn sources(&self) -> Result<Vec<SourceRecord>, StoreError>;

    /// Records a successful run against the source.
    async fn touch_source(&self, source_id: i64) -> Result<(), StoreError>;

    /// Id of the raw candidate already holding `fingerprint`.
    async fn find_fingerprint(&self, fingerprint: &str) -> Result<Option<i64>, StoreError>;

    /// Inserts the candidate with status `new` unless its fingerprint
    /// exists. `None` means it collided and nothing was written.
    async fn insert_raw_candidate(
        &self,
        candidate: &NewRawCandidate,
    ) -> Result<Option<i64>, StoreError>;

    /// Moves a `processing` candidate to `error`.
    async fn mark_candidate_error(&self, raw_id: i64, message: &str) -> Result<(), StoreError>;

    /// Claims up to `limit` `new` candidates into a batch, moving them to
    /// `processing`. `None` when there is nothing to claim.
    async fn create_batch(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Option<ProcessingBatch>, StoreError>;

    async fn get_batch(&self, batch_id: i64) -> Result<Option<ProcessingBatch>, StoreError>;

    /// Members in position order.
    async fn batch_members(&self, batch_id: i64) -> Result<Vec<BatchMember>, StoreError>;

    /// Moves a `created` batch to `processing` when structuring starts.
    async fn mark_batch_processing(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError>;

    async fn mark_batch_exported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError>;

    async fn mark_batch_imported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError>;

    /// Recomputes the batch status from its members.
    async fn refresh_batch_status(&self, batch_id: i64) -> Result<BatchStatus, StoreError>;

    /// Writes the structured deal, its optional rating, and moves the raw
    /// candidate `processing -> processed` in one atomic step.
    async fn insert_structured_deal(
        &self,
        raw_id: i64,
        details: &DealDetails,
        rating: Option<&Rating>,
    ) -> Result<i64, StoreError>;

    async fn get_structured_deal(&self, deal_id: i64)
        -> Result<Option<StructuredDeal>, StoreError>;

    async fn list_structured_deals(&self) -> Result<Vec<StructuredDeal>, StoreError>;

    async fn update_structured_deal(
        &self,
        deal_id: i64,
        details: &DealDetails,
    ) -> Result<StructuredDeal, StoreError>;

    async fn get_rating(&self, deal_id: i64) -> Result<Option<StoredRating>, StoreError>;

    async fn upsert_rating(&self, deal_id: i64, rating: &Rating)
        -> Result<StoredRating, StoreError>;
}
