//! Live integration tests for offerdb-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database from the sqlx
//! test harness. They are ignored by default; run them with
//! `DATABASE_URL` set and `--ignored`.

use chrono::{NaiveDate, Utc};
use offerdb_core::{
    BatchStatus, CandidateDraft, Category, DealDetails, DiscountType, NewRawCandidate,
    QualityTier, RatedBy, Rating, RenderMode, SourceConfig,
};
use offerdb_db::{
    create_batch, find_fingerprint, get_batch, get_rating, get_raw_deal, get_source_by_slug,
    get_structured_deal, insert_raw_deal_if_new, insert_structured_deal, list_active_sources,
    list_batch_members, list_structured_deals, mark_batch_exported, mark_batch_processing,
    mark_raw_deal_error,
    refresh_batch_status, seed_sources, touch_source_fetched, update_structured_deal,
    upsert_rating, DbError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn source_config(slug: &str, active: bool) -> SourceConfig {
    SourceConfig {
        slug: slug.to_string(),
        name: format!("Bank {slug}"),
        url: format!("https://{slug}.example/offers"),
        extractor: "generic".to_string(),
        render: RenderMode::Static,
        default_cards: Some(format!("{slug} cards")),
        active,
    }
}

async fn seed_one(pool: &sqlx::PgPool, slug: &str) -> i64 {
    seed_sources(pool, &[source_config(slug, true)])
        .await
        .expect("seed_sources failed");
    get_source_by_slug(pool, slug)
        .await
        .expect("get_source_by_slug failed")
        .expect("seeded source missing")
        .id
}

fn candidate(source_id: i64, title: &str) -> NewRawCandidate {
    let draft = CandidateDraft {
        title: title.to_string(),
        merchant: Some("Nando's".to_string()),
        discount: Some("25%".to_string()),
        validity: Some("Valid until 31 March 2026".to_string()),
        category: Some(Category::Dining),
        ..CandidateDraft::default()
    };
    NewRawCandidate::from_draft(source_id, draft, Utc::now())
}

fn details(title: &str) -> DealDetails {
    DealDetails {
        merchant_name: "Nando's".to_string(),
        offer_title: title.to_string(),
        description: None,
        discount_value: Some("25%".to_string()),
        discount_type: DiscountType::Percentage,
        category: Category::Dining,
        valid_from: None,
        valid_until: NaiveDate::from_ymd_opt(2026, 3, 31),
        location: None,
        applicable_cards: None,
        terms_conditions: None,
        promo_code: None,
        source_url: None,
        is_active: true,
    }
}

fn rules_rating(score: u8) -> Rating {
    Rating {
        tier: QualityTier::from_score(score),
        score,
        reason: Some("Good discount (25%)".to_string()),
        model_score: None,
        model_reasoning: None,
        rated_by: RatedBy::Rules,
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn seed_sources_is_idempotent_and_updates_fields(pool: sqlx::PgPool) {
    let first = seed_sources(&pool, &[source_config("alpha", true), source_config("beta", false)])
        .await
        .expect("first seed failed");
    assert_eq!(first, 2);

    let mut renamed = source_config("alpha", true);
    renamed.name = "Alpha Bank".to_string();
    seed_sources(&pool, &[renamed]).await.expect("reseed failed");

    let active = list_active_sources(&pool).await.expect("list failed");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Alpha Bank");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn touch_source_fetched_stamps_timestamp(pool: sqlx::PgPool) {
    let id = seed_one(&pool, "alpha").await;
    touch_source_fetched(&pool, id).await.expect("touch failed");

    let row = get_source_by_slug(&pool, "alpha")
        .await
        .expect("get failed")
        .expect("source missing");
    assert!(row.last_fetched_at.is_some());

    let err = touch_source_fetched(&pool, 999_999)
        .await
        .expect_err("unknown source should fail");
    assert!(matches!(err, DbError::NotFound));
}

// ---------------------------------------------------------------------------
// Raw deal ingest
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn duplicate_fingerprint_is_not_inserted(pool: sqlx::PgPool) {
    let source_id = seed_one(&pool, "alpha").await;
    let first = candidate(source_id, "25% off at Nando's");

    let id = insert_raw_deal_if_new(&pool, &first)
        .await
        .expect("insert failed")
        .expect("first insert should be new");
    assert_eq!(
        find_fingerprint(&pool, &first.fingerprint).await.expect("find failed"),
        Some(id)
    );

    let again = insert_raw_deal_if_new(&pool, &candidate(source_id, "  25% OFF at nando's "))
        .await
        .expect("insert failed");
    assert!(again.is_none(), "same normalized content must collide");
}

// ---------------------------------------------------------------------------
// Batches and structuring
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn batch_lifecycle_created_to_completed(pool: sqlx::PgPool) {
    let source_id = seed_one(&pool, "alpha").await;
    for title in ["25% off at Nando's", "10% off at Jarir"] {
        insert_raw_deal_if_new(&pool, &candidate(source_id, title))
            .await
            .expect("insert failed");
    }

    let batch = create_batch(&pool, "test batch", 10, None)
        .await
        .expect("create_batch failed")
        .expect("there were new deals");
    assert_eq!(batch.status, "created");
    assert_eq!(batch.deals_count, 2);

    let members = list_batch_members(&pool, batch.id).await.expect("members failed");
    assert_eq!(members.iter().map(|m| m.position).collect::<Vec<_>>(), vec![1, 2]);
    assert!(members.iter().all(|m| m.raw.status == "processing"));

    mark_batch_exported(&pool, batch.id).await.expect("export mark failed");

    let deal_id = insert_structured_deal(
        &pool,
        members[0].raw.id,
        &details("25% off at Nando's"),
        Some(&rules_rating(8)),
    )
    .await
    .expect("structure failed");
    mark_raw_deal_error(&pool, members[1].raw.id, "missing merchant")
        .await
        .expect("mark error failed");

    let status = refresh_batch_status(&pool, batch.id).await.expect("refresh failed");
    assert_eq!(status, BatchStatus::Completed);

    let stored = get_batch(&pool, batch.id).await.expect("get failed").expect("batch missing");
    assert!(stored.completed_at.is_some());

    let members = list_batch_members(&pool, batch.id).await.expect("members failed");
    assert_eq!(members[0].structured_deal_id, Some(deal_id));
    assert_eq!(members[1].raw.error_message.as_deref(), Some("missing merchant"));

    let rating = get_rating(&pool, deal_id).await.expect("rating failed").expect("rating missing");
    assert_eq!(rating.score, 8);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn mark_batch_processing_never_reopens_completed(pool: sqlx::PgPool) {
    let source_id = seed_one(&pool, "alpha").await;
    insert_raw_deal_if_new(&pool, &candidate(source_id, "25% off at Nando's"))
        .await
        .expect("insert failed");
    let batch = create_batch(&pool, "b", 10, None)
        .await
        .expect("create_batch failed")
        .expect("there were new deals");

    let started = mark_batch_processing(&pool, batch.id).await.expect("mark failed");
    assert_eq!(started.status, "processing");

    let members = list_batch_members(&pool, batch.id).await.expect("members failed");
    mark_raw_deal_error(&pool, members[0].raw.id, "missing merchant")
        .await
        .expect("mark error failed");
    refresh_batch_status(&pool, batch.id).await.expect("refresh failed");

    let after = mark_batch_processing(&pool, batch.id).await.expect("mark failed");
    assert_eq!(after.status, "completed");
    assert!(matches!(
        mark_batch_processing(&pool, 9999).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn create_batch_returns_none_without_new_deals(pool: sqlx::PgPool) {
    let batch = create_batch(&pool, "empty", 10, None).await.expect("create failed");
    assert!(batch.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn structuring_a_new_raw_deal_is_rejected_and_rolled_back(pool: sqlx::PgPool) {
    let source_id = seed_one(&pool, "alpha").await;
    let raw_id = insert_raw_deal_if_new(&pool, &candidate(source_id, "25% off at Nando's"))
        .await
        .expect("insert failed")
        .expect("new");

    let err = insert_structured_deal(&pool, raw_id, &details("x"), None)
        .await
        .expect_err("raw deal is still new");
    assert!(matches!(
        err,
        DbError::InvalidStatusTransition {
            expected_status: "processing",
            ..
        }
    ));

    assert!(list_structured_deals(&pool).await.expect("list failed").is_empty());
    let raw = get_raw_deal(&pool, raw_id).await.expect("get failed").expect("missing");
    assert_eq!(raw.status, "new");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn rating_upsert_replaces_and_deal_update_persists(pool: sqlx::PgPool) {
    let source_id = seed_one(&pool, "alpha").await;
    insert_raw_deal_if_new(&pool, &candidate(source_id, "25% off at Nando's"))
        .await
        .expect("insert failed");
    let batch = create_batch(&pool, "b", 10, None)
        .await
        .expect("create failed")
        .expect("batch");
    let members = list_batch_members(&pool, batch.id).await.expect("members failed");
    let deal_id = insert_structured_deal(&pool, members[0].raw.id, &details("t"), None)
        .await
        .expect("structure failed");

    upsert_rating(&pool, deal_id, &rules_rating(6)).await.expect("first upsert");
    let human = Rating {
        tier: QualityTier::Bad,
        score: 2,
        reason: Some("expired".to_string()),
        model_score: None,
        model_reasoning: None,
        rated_by: RatedBy::Human,
    };
    upsert_rating(&pool, deal_id, &human).await.expect("second upsert");

    let rating = get_rating(&pool, deal_id).await.expect("get failed").expect("missing");
    assert_eq!(rating.quality_tier, "bad");
    assert_eq!(rating.rated_by, "human");

    let mut edited = details("t");
    edited.category = Category::Travel;
    update_structured_deal(&pool, deal_id, &edited).await.expect("update failed");
    let row = get_structured_deal(&pool, deal_id).await.expect("get failed").expect("missing");
    assert_eq!(row.category, "travel");
}
