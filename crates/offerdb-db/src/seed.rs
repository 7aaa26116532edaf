use offerdb_core::SourceConfig;
use sqlx::PgPool;

use crate::DbError;

/// Upsert the source registry into the `sources` table.
///
/// Returns the number of sources processed. All upserts run inside one
/// transaction; a failure rolls back the whole registry. Sources missing
/// from `sources` are left untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_sources(pool: &PgPool, sources: &[SourceConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for source in sources {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO sources (slug, name, url, extractor, render_mode, default_cards, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 url = EXCLUDED.url, \
                 extractor = EXCLUDED.extractor, \
                 render_mode = EXCLUDED.render_mode, \
                 default_cards = EXCLUDED.default_cards, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(&source.slug)
        .bind(&source.name)
        .bind(&source.url)
        .bind(&source.extractor)
        .bind(source.render.as_str())
        .bind(&source.default_cards)
        .bind(source.active)
        .fetch_one(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
