//! Operator CLI handlers for `nutriplan plan` subcommands.
//!
//! Implements:
//! - `nutriplan plan generate --user <id>` -- generate and save a new plan
//! - `nutriplan plan list --user <id>`     -- list a user's plans
//! - `nutriplan plan show <plan-id> --user <id>` -- show one plan with its meals

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use nutriplan_core::auth::Identity;
use nutriplan_core::plan::{
    self, GenerationOptions, GenerationSummary, MealPlanDetail, MealPlanOrchestrator,
};

use crate::PlanCommands;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan_command(
    command: PlanCommands,
    pool: &PgPool,
    orchestrator: &MealPlanOrchestrator,
) -> Result<()> {
    match command {
        PlanCommands::Generate {
            user,
            days,
            snacks,
        } => {
            let options = GenerationOptions {
                number_of_days: days,
                include_snacks: snacks,
            };
            cmd_generate(orchestrator, user, &options).await
        }
        PlanCommands::List { user } => cmd_list(pool, user).await,
        PlanCommands::Show { plan_id, user } => cmd_show(pool, user, plan_id).await,
    }
}

// -----------------------------------------------------------------------
// nutriplan plan generate
// -----------------------------------------------------------------------

async fn cmd_generate(
    orchestrator: &MealPlanOrchestrator,
    user: Uuid,
    options: &GenerationOptions,
) -> Result<()> {
    println!(
        "Generating a {}-day plan with {}...",
        options.number_of_days,
        orchestrator.generator().name()
    );
    let summary = orchestrator
        .generate_meal_plan(Identity::User(user), options, Utc::now().date_naive())
        .await?;
    print!("{}", render_summary(&summary));
    Ok(())
}

pub fn render_summary(summary: &GenerationSummary) -> String {
    let mut out = String::new();
    out.push_str(if summary.is_complete() {
        "Meal plan saved.\n\n"
    } else {
        "Meal plan saved with gaps.\n\n"
    });
    out.push_str(&format!("  Plan ID:        {}\n", summary.meal_plan_id));
    out.push_str(&format!(
        "  Meals:          {} saved of {} expected ({} generated, {} skipped)\n",
        summary.meals_saved, summary.meals_expected, summary.meals_generated, summary.meals_skipped
    ));
    match summary.shopping_list_id {
        Some(id) => out.push_str(&format!(
            "  Shopping list:  {id} ({} items, {} skipped)\n",
            summary.shopping_items_saved, summary.shopping_items_skipped
        )),
        None => out.push_str("  Shopping list:  not saved\n"),
    }
    if !summary.deactivation_ok {
        out.push_str("  Warning:        older plans may still be active\n");
    }
    out
}

// -----------------------------------------------------------------------
// nutriplan plan list
// -----------------------------------------------------------------------

async fn cmd_list(pool: &PgPool, user: Uuid) -> Result<()> {
    let plans = plan::list_meal_plans(pool, Identity::User(user)).await?;

    if plans.is_empty() {
        println!("No meal plans found. Use `nutriplan plan generate` to create one.");
        return Ok(());
    }

    let id_w = 36;
    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    let dates_w = 23;

    println!(
        "{:<id_w$}  {:<name_w$}  {:<dates_w$}  ACTIVE",
        "ID", "NAME", "DATES",
    );
    for p in &plans {
        let dates = format!("{} .. {}", p.start_date, p.end_date);
        println!(
            "{:<id_w$}  {:<name_w$}  {:<dates_w$}  {}",
            p.id,
            p.name,
            dates,
            if p.is_active { "yes" } else { "" },
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// nutriplan plan show <plan-id>
// -----------------------------------------------------------------------

async fn cmd_show(pool: &PgPool, user: Uuid, plan_id: Uuid) -> Result<()> {
    let detail = plan::get_meal_plan_detail(pool, Identity::User(user), plan_id).await?;
    print!("{}", render_detail(&detail));
    Ok(())
}

pub fn render_detail(detail: &MealPlanDetail) -> String {
    let plan = &detail.plan;
    let mut out = format!("Plan: {}\n", plan.name);
    out.push_str(&format!("  ID:        {}\n", plan.id));
    out.push_str(&format!("  Dates:     {} .. {}\n", plan.start_date, plan.end_date));
    out.push_str(&format!(
        "  Active:    {}\n",
        if plan.is_active { "yes" } else { "no" }
    ));
    if let Some(calories) = plan.avg_daily_calories {
        out.push_str(&format!("  Target:    {calories} kcal/day\n"));
    }
    if let Some(cost) = plan.estimated_total_cost {
        out.push_str(&format!("  Est. cost: {cost:.2}\n"));
    }

    let mut current_date = None;
    for meal in &detail.meals {
        let item = &meal.item;
        if current_date != Some(item.plan_date) {
            current_date = Some(item.plan_date);
            out.push_str(&format!("\n  {}\n", item.plan_date.format("%A %Y-%m-%d")));
        }
        let name = item.recipe_name.as_deref().unwrap_or("(unnamed)");
        let calories = item
            .calories
            .map(|c| format!(" - {c} kcal"))
            .unwrap_or_default();
        let check = if item.is_completed { "x" } else { " " };
        out.push_str(&format!(
            "    [{check}] {:<9} {name}{calories}\n",
            item.meal_type
        ));
    }
    out
}
