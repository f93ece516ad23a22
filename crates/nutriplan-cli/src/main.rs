mod config;
mod plan_cmds;
mod progress_cmds;
mod serve_cmd;
mod targets_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use nutriplan_core::generator::{MealPlanGenerator, OpenAiGenerator};
use nutriplan_core::nutrition::{self, BmrFormula, BodyStats};
use nutriplan_core::plan::{MealPlanOrchestrator, PgPlanStore};
use nutriplan_db::models::Gender;
use nutriplan_db::pool;

use config::NutriplanConfig;

#[derive(Parser)]
#[command(name = "nutriplan", about = "Meal planning and nutrition tracking backend")]
struct Cli {
    /// Database URL (overrides NUTRIPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a nutriplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/nutriplan")]
        db_url: String,
        /// API key for the meal plan generator
        #[arg(long)]
        api_key: Option<String>,
        /// Generator model name
        #[arg(long)]
        model: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the nutriplan database
    DbInit,
    /// Serve the JSON HTTP API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Compute daily nutrition targets from body stats (no database required)
    Targets {
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,
        /// male, female, other, prefer_not_to_say
        #[arg(long)]
        gender: Gender,
        #[arg(long)]
        height_cm: f64,
        #[arg(long)]
        weight_kg: f64,
        /// sedentary, lightly_active, moderately_active, very_active, extremely_active
        /// (unknown values count as sedentary)
        #[arg(long)]
        activity: String,
        /// lose_weight, gain_weight, build_muscle, maintain_weight, body_recomposition
        /// (unknown values count as maintain_weight)
        #[arg(long)]
        goal: String,
        /// Weekly weight change in kg
        #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
        weekly_goal_kg: f64,
        /// Formula for genders without one (overrides nutrition.unspecified_gender_formula)
        #[arg(long)]
        formula: Option<BmrFormula>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Meal plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Body weight log
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Food log helpers
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Generate a new plan and make it the active one
    Generate {
        /// User ID
        #[arg(long)]
        user: Uuid,
        /// Number of days (1-14)
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Add a snack to each day
        #[arg(long)]
        snacks: bool,
    },
    /// List a user's plans, newest first
    List {
        #[arg(long)]
        user: Uuid,
    },
    /// Show one plan with its meals
    Show {
        plan_id: Uuid,
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand)]
pub enum WeightCommands {
    /// Record a weight, replacing any entry for the same day
    Log {
        #[arg(long)]
        user: Uuid,
        weight_kg: f64,
        /// Day of the measurement (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show recent weights and progress
    List {
        #[arg(long)]
        user: Uuid,
        /// How many days back (default 30)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum FoodCommands {
    /// Estimate the nutrition of the food in a photo
    Analyze {
        /// Path to a JPEG photo
        photo: PathBuf,
        #[arg(long)]
        user: Uuid,
    },
}

/// Execute the `nutriplan init` command: write config file.
fn cmd_init(
    db_url: &str,
    api_key: Option<String>,
    model: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        generator: config::GeneratorSection {
            api_key,
            model,
            ..config::GeneratorSection::default()
        },
        ..config::ConfigFile::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if has_key {
        println!("  generator.api_key = (set)");
    } else {
        println!("  generator.api_key not set; use OPENAI_API_KEY or edit the file");
    }
    println!();
    println!("Next: run `nutriplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `nutriplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = NutriplanConfig::resolve(cli_db_url)?;

    println!("Initializing nutriplan database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("nutriplan db-init complete.");
    Ok(())
}

fn build_generator(resolved: &NutriplanConfig) -> anyhow::Result<Arc<dyn MealPlanGenerator>> {
    if resolved.generator.api_key.is_none() {
        tracing::warn!("no generator API key configured; requests will be sent without one");
    }
    Ok(Arc::new(OpenAiGenerator::new(resolved.generator.clone())?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            model,
            force,
        } => {
            cmd_init(&db_url, api_key, model, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = NutriplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let generator = build_generator(&resolved)?;
            let state = serve_cmd::AppState {
                pool: db_pool.clone(),
                orchestrator: Arc::new(MealPlanOrchestrator::new(
                    Arc::new(PgPlanStore::new(db_pool.clone())),
                    generator,
                )),
                unspecified_gender: resolved.unspecified_gender,
            };
            let bind = bind.unwrap_or(resolved.bind);
            let port = port.unwrap_or(resolved.port);
            let result = serve_cmd::run_serve(state, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Targets {
            dob,
            gender,
            height_cm,
            weight_kg,
            activity,
            goal,
            weekly_goal_kg,
            formula,
            json,
        } => {
            let formula = match formula {
                Some(f) => f,
                None => config::load_config()?
                    .and_then(|c| c.nutrition.unspecified_gender_formula)
                    .unwrap_or_default(),
            };
            let stats = BodyStats {
                date_of_birth: dob,
                gender,
                height_cm,
                weight_kg,
                activity_level: nutrition::parse_activity_level(&activity),
                primary_goal: nutrition::parse_primary_goal(&goal),
                weekly_goal_kg,
            };
            targets_cmd::run_targets(&stats, formula, json)?;
        }
        Commands::Plan { command } => {
            let resolved = NutriplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let orchestrator = MealPlanOrchestrator::new(
                Arc::new(PgPlanStore::new(db_pool.clone())),
                build_generator(&resolved)?,
            );
            let result = plan_cmds::run_plan_command(command, &db_pool, &orchestrator).await;
            db_pool.close().await;
            result?;
        }
        Commands::Weight { command } => {
            let resolved = NutriplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = progress_cmds::run_weight_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Food { command } => match command {
            FoodCommands::Analyze { photo, user } => {
                let resolved = NutriplanConfig::resolve(cli.database_url.as_deref())?;
                let generator = build_generator(&resolved)?;
                progress_cmds::run_food_analyze(generator.as_ref(), user, &photo).await?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that touch process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
