//! Integration tests for the template repository.

use chrono::{DateTime, Duration, Utc};
use pagekit_db::models::template::{CreateTemplate, UpdateTemplate};
use pagekit_db::repositories::TemplateRepo;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_template(name: &str) -> CreateTemplate {
    CreateTemplate {
        user_id: 1,
        name: name.to_string(),
        description: Some("repo test".to_string()),
        entry_file: None,
        zip_content: Some("UEsFBg==".to_string()),
        zip_size: Some(22),
        original_filename: Some("site.zip".to_string()),
        preview_image: None,
    }
}

async fn backdate_extraction(pool: &PgPool, id: i64, at: DateTime<Utc>) {
    sqlx::query("UPDATE templates SET extracted_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn bootstrap_seeds_system_user(pool: PgPool) {
    pagekit_db::health_check(&pool).await.unwrap();
    let (name,): (String,) = sqlx::query_as("SELECT name FROM users WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "System");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_applies_defaults(pool: PgPool) {
    let template = TemplateRepo::create(&pool, &new_template("Landing"))
        .await
        .unwrap();

    assert_eq!(template.entry_file, "index.html");
    assert!(!template.is_extracted);
    assert!(template.extracted_at.is_none());
    assert!(template.has_zip_content());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_joins_owner_name_newest_first(pool: PgPool) {
    let first = TemplateRepo::create(&pool, &new_template("First")).await.unwrap();
    let second = TemplateRepo::create(&pool, &new_template("Second")).await.unwrap();

    let list = TemplateRepo::list_with_owner(&pool).await.unwrap();
    let ids: Vec<i64> = list.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(list[0].owner_name.as_deref(), Some("System"));
    assert!(list[0].has_zip_content);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn soft_deleted_rows_are_hidden(pool: PgPool) {
    let template = TemplateRepo::create(&pool, &new_template("Gone")).await.unwrap();

    assert!(TemplateRepo::soft_delete(&pool, template.id).await.unwrap());
    assert!(!TemplateRepo::soft_delete(&pool, template.id).await.unwrap());
    assert!(TemplateRepo::find_by_id(&pool, template.id).await.unwrap().is_none());
    assert!(TemplateRepo::list_with_owner(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_metadata_keeps_unset_fields(pool: PgPool) {
    let template = TemplateRepo::create(&pool, &new_template("Before")).await.unwrap();
    let input = UpdateTemplate {
        name: Some("After".to_string()),
        ..Default::default()
    };

    let updated = TemplateRepo::update_metadata(&pool, template.id, &input)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "After");
    assert_eq!(updated.description.as_deref(), Some("repo test"));

    let missing = TemplateRepo::update_metadata(&pool, 9_999, &input).await.unwrap();
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn extraction_flags_round_trip(pool: PgPool) {
    let template = TemplateRepo::create(&pool, &new_template("Flags")).await.unwrap();

    TemplateRepo::mark_extracted(&pool, template.id).await.unwrap();
    let row = TemplateRepo::find_by_id(&pool, template.id).await.unwrap().unwrap();
    assert!(row.is_extracted);
    assert!(row.extracted_at.is_some());

    TemplateRepo::mark_not_extracted(&pool, template.id).await.unwrap();
    let row = TemplateRepo::find_by_id(&pool, template.id).await.unwrap().unwrap();
    assert!(!row.is_extracted);
    assert!(row.extracted_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_extractions_use_strict_cutoff(pool: PgPool) {
    let old = TemplateRepo::create(&pool, &new_template("Old")).await.unwrap();
    let fresh = TemplateRepo::create(&pool, &new_template("Fresh")).await.unwrap();
    let cutoff = Utc::now() - Duration::days(30);

    for t in [&old, &fresh] {
        TemplateRepo::mark_extracted(&pool, t.id).await.unwrap();
    }
    backdate_extraction(&pool, old.id, cutoff - Duration::hours(1)).await;
    backdate_extraction(&pool, fresh.id, cutoff).await;

    let stale = TemplateRepo::list_stale_extractions(&pool, cutoff).await.unwrap();
    let ids: Vec<i64> = stale.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![old.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn set_zip_content_backfills_blob(pool: PgPool) {
    let mut input = new_template("Legacy");
    input.zip_content = None;
    input.zip_size = None;
    input.original_filename = None;
    let template = TemplateRepo::create(&pool, &input).await.unwrap();
    assert!(!template.has_zip_content());

    TemplateRepo::set_zip_content(&pool, template.id, "UEsFBg==", 22, Some("legacy.zip"))
        .await
        .unwrap();
    let row = TemplateRepo::find_by_id(&pool, template.id).await.unwrap().unwrap();
    assert!(row.has_zip_content());
    assert_eq!(row.zip_size, Some(22));
    assert_eq!(row.original_filename.as_deref(), Some("legacy.zip"));
}
