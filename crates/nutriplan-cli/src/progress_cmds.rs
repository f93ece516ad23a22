//! Operator CLI handlers for `nutriplan weight` and `nutriplan food`.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_core::auth::Identity;
use nutriplan_core::generator::{MealPlanGenerator, PhotoAnalysis};
use nutriplan_core::progress;

use crate::WeightCommands;

pub async fn run_weight_command(command: WeightCommands, pool: &PgPool) -> Result<()> {
    let today = Utc::now().date_naive();
    match command {
        WeightCommands::Log {
            user,
            weight_kg,
            date,
            notes,
        } => cmd_log(pool, user, weight_kg, date.unwrap_or(today), notes.as_deref()).await,
        WeightCommands::List { user, days } => cmd_list(pool, user, days, today).await,
    }
}

async fn cmd_log(
    pool: &PgPool,
    user: Uuid,
    weight_kg: f64,
    date: NaiveDate,
    notes: Option<&str>,
) -> Result<()> {
    let log = progress::weight::log_weight(pool, Identity::User(user), weight_kg, date, notes)
        .await?;
    println!("Logged {:.1} kg on {}.", log.weight_kg, log.logged_at);
    Ok(())
}

async fn cmd_list(pool: &PgPool, user: Uuid, days: Option<u32>, today: NaiveDate) -> Result<()> {
    let identity = Identity::User(user);
    let logs = progress::weight::list_weight_logs(pool, identity, days, today).await?;
    if logs.is_empty() {
        println!("No weight logged in this period.");
        return Ok(());
    }

    for log in &logs {
        match &log.notes {
            Some(notes) => println!("  {}  {:>6.1} kg  {notes}", log.logged_at, log.weight_kg),
            None => println!("  {}  {:>6.1} kg", log.logged_at, log.weight_kg),
        }
    }

    let stats = progress::weight::progress_stats(pool, identity, today).await?;
    if let Some(change) = stats.total_change_kg {
        println!();
        println!("  Change:   {change:+.1} kg");
    }
    if let Some(pct) = stats.progress_to_goal_pct {
        println!("  Progress: {pct:.0}% of the way to the target weight");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// nutriplan food analyze <photo>
// -----------------------------------------------------------------------

pub fn encode_photo(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read photo {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

pub async fn run_food_analyze(
    generator: &dyn MealPlanGenerator,
    user: Uuid,
    photo: &Path,
) -> Result<()> {
    let image = encode_photo(photo)?;
    let analysis =
        progress::food::analyze_food_photo(generator, Identity::User(user), &image).await?;
    print!("{}", render_analysis(&analysis));
    Ok(())
}

pub fn render_analysis(analysis: &PhotoAnalysis) -> String {
    let figure = |v: Option<f64>, unit: &str| v.map_or_else(|| "?".to_owned(), |v| format!("{v:.0} {unit}"));
    let mut out = format!("{} ({:?} confidence)\n", analysis.food_name, analysis.confidence);
    if !analysis.description.is_empty() {
        out.push_str(&format!("  {}\n", analysis.description));
    }
    out.push_str(&format!(
        "  Calories: {}\n",
        figure(analysis.estimated_calories, "kcal")
    ));
    out.push_str(&format!(
        "  Protein:  {}\n",
        figure(analysis.estimated_protein, "g")
    ));
    out.push_str(&format!("  Carbs:    {}\n", figure(analysis.estimated_carbs, "g")));
    out.push_str(&format!("  Fat:      {}\n", figure(analysis.estimated_fat, "g")));
    for tip in &analysis.suggestions {
        out.push_str(&format!("  - {tip}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use nutriplan_core::generator::Confidence;

    use super::*;

    #[test]
    fn photo_is_base64_encoded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plate.jpg");
        std::fs::write(&path, b"ABC").unwrap();
        assert_eq!(encode_photo(&path).unwrap(), "QUJD");
        assert!(encode_photo(&tmp.path().join("missing.jpg")).is_err());
    }

    #[test]
    fn analysis_marks_unknown_figures() {
        let analysis = PhotoAnalysis {
            food_name: "Ramen".to_owned(),
            estimated_calories: Some(640.4),
            confidence: Confidence::High,
            suggestions: vec!["Skip the broth".to_owned()],
            ..PhotoAnalysis::default()
        };
        let text = render_analysis(&analysis);
        assert!(text.starts_with("Ramen (High confidence)"));
        assert!(text.contains("Calories: 640 kcal"));
        assert!(text.contains("Fat:      ?"));
        assert!(text.contains("- Skip the broth"));
    }
}
