//! Integration tests for the embedded migrations and schema constraints.

use sqlx::Row;
use uuid::Uuid;

use nutriplan_db::pool::{self, TABLES};
use nutriplan_test_utils::{TestDb, create_test_profile};

#[tokio::test]
async fn migrations_create_every_table() {
    let db = TestDb::new().await;

    let counts = pool::table_counts(&db.pool)
        .await
        .expect("table_counts should succeed");
    let names: Vec<&str> = counts.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, TABLES);
    assert!(counts.iter().all(|(_, count)| *count == 0));

    db.teardown().await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = TestDb::new().await;

    // create_test_db already ran them once.
    pool::run_migrations(&db.pool)
        .await
        .expect("second run should be a no-op");

    let row = sqlx::query("SELECT COUNT(*) AS n FROM _sqlx_migrations")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    let applied: i64 = row.get("n");
    assert_eq!(applied, pool::MIGRATOR.iter().count() as i64);

    db.teardown().await;
}

#[tokio::test]
async fn completion_timestamp_must_match_flag() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;

    let plan_id: Uuid = sqlx::query_scalar(
        "INSERT INTO meal_plans (user_id, name, start_date, end_date, total_days) \
         VALUES ($1, 'p', CURRENT_DATE, CURRENT_DATE, 1) RETURNING id",
    )
    .bind(profile.id)
    .fetch_one(&db.pool)
    .await
    .unwrap();

    let result = sqlx::query(
        "INSERT INTO meal_plan_items (meal_plan_id, plan_date, meal_type, is_completed) \
         VALUES ($1, CURRENT_DATE, 'lunch', TRUE)",
    )
    .bind(plan_id)
    .execute(&db.pool)
    .await;
    assert!(result.is_err(), "completed item without timestamp must be rejected");

    db.teardown().await;
}

#[tokio::test]
async fn recipe_servings_must_be_positive() {
    let db = TestDb::new().await;

    let result = sqlx::query("INSERT INTO recipes (name, servings) VALUES ('Soup', 0)")
        .execute(&db.pool)
        .await;
    assert!(result.is_err(), "zero servings must be rejected");

    db.teardown().await;
}
