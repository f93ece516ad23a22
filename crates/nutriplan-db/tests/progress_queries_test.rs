//! Integration tests for weight and food log queries.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use nutriplan_db::models::{MealType, Mood};
use nutriplan_db::queries::food_logs::{self, NewFoodLog};
use nutriplan_db::queries::{profiles, weight_logs};
use nutriplan_test_utils::{TestDb, create_test_profile};

fn food(user_id: Uuid, name: &str, hour: u32, calories: Option<i32>) -> NewFoodLog {
    NewFoodLog {
        user_id,
        logged_at: Some(Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()),
        meal_type: MealType::Lunch,
        recipe_id: None,
        food_name: name.to_owned(),
        description: None,
        servings: 1.0,
        calories,
        protein_g: Some(10.0),
        carbs_g: None,
        fat_g: Some(2.5),
        photo_url: None,
        photo_analysis: None,
        notes: None,
        mood: Some(Mood::Good),
    }
}

#[tokio::test]
async fn weight_log_upsert_overwrites_same_day() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let first = weight_logs::upsert_weight_log(&db.pool, profile.id, 80.0, date, None)
        .await
        .unwrap();
    let second = weight_logs::upsert_weight_log(&db.pool, profile.id, 79.4, date, Some("after run"))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.weight_kg, 79.4);
    assert_eq!(second.notes.as_deref(), Some("after run"));

    let logs = weight_logs::list_weight_logs_since(&db.pool, profile.id, date)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);

    let synced = profiles::sync_current_weight(&db.pool, profile.id).await.unwrap();
    assert_eq!(synced, Some(79.4));
    let refreshed = profiles::get_profile(&db.pool, profile.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_weight_kg, Some(79.4));

    db.teardown().await;
}

#[tokio::test]
async fn weight_logs_list_ascending_and_delete_is_owner_scoped() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;
    let other = create_test_profile(&db.pool).await;
    let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

    for offset in [4, 0, 2] {
        weight_logs::upsert_weight_log(
            &db.pool,
            profile.id,
            80.0 - offset as f64,
            start + Duration::days(offset),
            None,
        )
        .await
        .unwrap();
    }

    let logs = weight_logs::list_weight_logs_since(&db.pool, profile.id, start + Duration::days(1))
        .await
        .unwrap();
    let dates: Vec<NaiveDate> = logs.iter().map(|l| l.logged_at).collect();
    assert_eq!(dates, vec![start + Duration::days(2), start + Duration::days(4)]);

    // The newest log by date wins, whatever order they were written in.
    let synced = profiles::sync_current_weight(&db.pool, profile.id).await.unwrap();
    assert_eq!(synced, Some(76.0));
    assert_eq!(profiles::sync_current_weight(&db.pool, other.id).await.unwrap(), None);

    assert!(!weight_logs::delete_weight_log(&db.pool, other.id, logs[0].id).await.unwrap());
    assert!(weight_logs::delete_weight_log(&db.pool, profile.id, logs[0].id).await.unwrap());

    db.teardown().await;
}

#[tokio::test]
async fn food_logs_window_limit_and_totals() {
    let db = TestDb::new().await;
    let profile = create_test_profile(&db.pool).await;

    food_logs::insert_food_log(&db.pool, &food(profile.id, "Oats", 8, Some(350)))
        .await
        .unwrap();
    food_logs::insert_food_log(&db.pool, &food(profile.id, "Salad", 13, None))
        .await
        .unwrap();
    food_logs::insert_food_log(&db.pool, &food(profile.id, "Pasta", 19, Some(700)))
        .await
        .unwrap();

    let from = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
    let to = from + Duration::days(1);

    let all = food_logs::list_food_logs(&db.pool, profile.id, None, 50).await.unwrap();
    let names: Vec<&str> = all.iter().map(|l| l.food_name.as_str()).collect();
    assert_eq!(names, vec!["Pasta", "Salad", "Oats"]);

    let limited = food_logs::list_food_logs(&db.pool, profile.id, Some((from, to)), 2)
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let empty = food_logs::list_food_logs(&db.pool, profile.id, Some((to, to + Duration::days(1))), 50)
        .await
        .unwrap();
    assert!(empty.is_empty());

    let totals = food_logs::intake_totals(&db.pool, profile.id, from, to).await.unwrap();
    assert_eq!(totals.calories, 1050);
    assert_eq!(totals.protein_g, 30.0);
    assert_eq!(totals.carbs_g, 0.0);
    assert_eq!(totals.fat_g, 7.5);
    assert_eq!(totals.meal_count, 3);

    let salad = all[1].id;
    assert!(food_logs::delete_food_log(&db.pool, profile.id, salad).await.unwrap());
    assert!(!food_logs::delete_food_log(&db.pool, profile.id, salad).await.unwrap());

    db.teardown().await;
}
