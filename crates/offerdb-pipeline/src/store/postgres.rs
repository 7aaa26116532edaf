use async_trait::async_trait;
use offerdb_core::{
    BatchMember, BatchStatus, DealDetails, NewRawCandidate, ProcessingBatch, Rating,
    SourceRecord, StoredRating, StructuredDeal,
};
use sqlx::PgPool;

use super::DealStore;
use crate::error::StoreError;

/// [`DealStore`] backed by the Postgres tables in `offerdb-db`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DealStore for PgStore {
    async fn sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        let rows = offerdb_db::list_sources(&self.pool).await?;
        rows.into_iter()
            .map(|row| row.into_record().map_err(StoreError::from))
            .collect()
    }

    async fn touch_source(&self, source_id: i64) -> Result<(), StoreError> {
        offerdb_db::touch_source_fetched(&self.pool, source_id).await?;
        Ok(())
    }

    async fn find_fingerprint(&self, fingerprint: &str) -> Result<Option<i64>, StoreError> {
        Ok(offerdb_db::find_fingerprint(&self.pool, fingerprint).await?)
    }

    async fn insert_raw_candidate(
        &self,
        candidate: &NewRawCandidate,
    ) -> Result<Option<i64>, StoreError> {
        Ok(offerdb_db::insert_raw_deal_if_new(&self.pool, candidate).await?)
    }

    async fn mark_candidate_error(&self, raw_id: i64, message: &str) -> Result<(), StoreError> {
        offerdb_db::mark_raw_deal_error(&self.pool, raw_id, message).await?;
        Ok(())
    }

    async fn create_batch(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Option<ProcessingBatch>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let row = offerdb_db::create_batch(&self.pool, name, limit, None).await?;
        Ok(row.map(offerdb_db::BatchRow::into_batch).transpose()?)
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<ProcessingBatch>, StoreError> {
        let row = offerdb_db::get_batch(&self.pool, batch_id).await?;
        Ok(row.map(offerdb_db::BatchRow::into_batch).transpose()?)
    }

    async fn batch_members(&self, batch_id: i64) -> Result<Vec<BatchMember>, StoreError> {
        let rows = offerdb_db::list_batch_members(&self.pool, batch_id).await?;
        rows.into_iter()
            .map(|row| row.into_member().map_err(StoreError::from))
            .collect()
    }

    async fn mark_batch_processing(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let row = offerdb_db::mark_batch_processing(&self.pool, batch_id).await?;
        Ok(row.into_batch()?)
    }

    async fn mark_batch_exported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let row = offerdb_db::mark_batch_exported(&self.pool, batch_id).await?;
        Ok(row.into_batch()?)
    }

    async fn mark_batch_imported(&self, batch_id: i64) -> Result<ProcessingBatch, StoreError> {
        let row = offerdb_db::mark_batch_imported(&self.pool, batch_id).await?;
        Ok(row.into_batch()?)
    }

    async fn refresh_batch_status(&self, batch_id: i64) -> Result<BatchStatus, StoreError> {
        Ok(offerdb_db::refresh_batch_status(&self.pool, batch_id).await?)
    }

    async fn insert_structured_deal(
        &self,
        raw_id: i64,
        details: &DealDetails,
        rating: Option<&Rating>,
    ) -> Result<i64, StoreError> {
        Ok(offerdb_db::insert_structured_deal(&self.pool, raw_id, details, rating).await?)
    }

    async fn get_structured_deal(
        &self,
        deal_id: i64,
    ) -> Result<Option<StructuredDeal>, StoreError> {
        let row = offerdb_db::get_structured_deal(&self.pool, deal_id).await?;
        Ok(row.map(offerdb_db::StructuredDealRow::into_deal).transpose()?)
    }

    async fn list_structured_deals(&self) -> Result<Vec<StructuredDeal>, StoreError> {
        let rows = offerdb_db::list_structured_deals(&self.pool).await?;
        rows.into_iter()
            .map(|row| row.into_deal().map_err(StoreError::from))
            .collect()
    }

    async fn update_structured_deal(
        &self,
        deal_id: i64,
        details: &DealDetails,
    ) -> Result<StructuredDeal, StoreError> {
        let row = offerdb_db::update_structured_deal(&self.pool, deal_id, details)
            .await
            .map_err(|e| match e {
                offerdb_db::DbError::NotFound => StoreError::NotFound {
                    kind: "structured deal",
                    id: deal_id,
                },
                other => StoreError::from(other),
            })?;
        Ok(row.into_deal()?)
    }

    async fn get_rating(&self, deal_id: i64) -> Result<Option<StoredRating>, StoreError> {
        let row = offerdb_db::get_rating(&self.pool, deal_id).await?;
        Ok(row.map(offerdb_db::RatingRow::into_stored).transpose()?)
    }

    async fn upsert_rating(
        &self,
        deal_id: i64,
        rating: &Rating,
    ) -> Result<StoredRating, StoreError> {
        let row = offerdb_db::upsert_rating(&self.pool, deal_id, rating).await?;
        Ok(row.into_stored()?)
    }
}
