//! `nutriplan serve`: the JSON HTTP API.
//!
//! Authentication happens upstream. The verified user ID arrives in the
//! `x-user-id` header; requests without a valid one are anonymous and every
//! user-scoped operation answers 401.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use nutriplan_core::auth::Identity;
use nutriplan_core::error::ServiceError;
use nutriplan_core::generator::PhotoAnalysis;
use nutriplan_core::nutrition::{BmrFormula, NutritionTargets};
use nutriplan_core::onboarding::{
    self, BodyStatsStep, DietaryStep, GoalsStep, OnboardingDraft, OnboardingStep,
    PreferencesStep,
};
use nutriplan_core::plan::{
    self, ActivePlan, GenerationOptions, GenerationSummary, MealPlanDetail, MealPlanOrchestrator,
    ShoppingListDetail,
};
use nutriplan_core::profile;
use nutriplan_core::progress::{self, DailyIntake, FoodLogInput, ProgressStats};
use nutriplan_db::models::{
    FoodLog, MealPlan, MealPlanItem, Profile, Recipe, ShoppingList, ShoppingListItem, WeightLog,
};
use nutriplan_db::queries::profiles::ProfileUpdate;

pub const USER_ID_HEADER: &str = "x-user-id";

// ---------------------------------------------------------------------------
// State and identity
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub orchestrator: Arc<MealPlanOrchestrator>,
    pub unspecified_gender: BmrFormula,
}

/// The caller as identified by the upstream authentication layer.
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok());
        Ok(Self(Identity::from(user_id)))
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::ProfileNotFound | ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
            ServiceError::PlanPersistenceFailed(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecalculatedTargets {
    pub profile: Profile,
    pub targets: NutritionTargets,
}

#[derive(Debug, Deserialize)]
pub struct WeightLogRequest {
    pub weight_kg: f64,
    /// Defaults to today.
    #[serde(default)]
    pub logged_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    /// Base64 JPEG, optionally as a `data:` URL.
    pub image: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/profile",
            get(get_profile).post(create_profile).patch(update_profile),
        )
        .route("/api/profile/recalculate", post(recalculate_targets))
        .route("/api/onboarding", get(get_onboarding))
        .route("/api/onboarding/goals", put(put_goals))
        .route("/api/onboarding/body-stats", put(put_body_stats))
        .route("/api/onboarding/dietary", put(put_dietary))
        .route("/api/onboarding/preferences", put(put_preferences))
        .route("/api/onboarding/complete", post(complete_onboarding))
        .route("/api/meal-plans", get(list_meal_plans).post(generate_meal_plan))
        .route("/api/meal-plans/active", get(get_active_plan))
        .route("/api/meal-plans/{id}", get(get_meal_plan))
        .route("/api/meal-plan-items/{id}/toggle", post(toggle_meal_item))
        .route("/api/shopping-lists", get(list_shopping_lists))
        .route("/api/shopping-lists/{id}", get(get_shopping_list))
        .route(
            "/api/shopping-list-items/{id}/toggle",
            post(toggle_shopping_item),
        )
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/{id}", get(get_recipe))
        .route("/api/weight-logs", get(list_weight_logs).post(log_weight))
        .route("/api/weight-logs/{id}", delete(delete_weight_log))
        .route("/api/progress", get(progress_stats))
        .route("/api/food-logs", get(list_food_logs).post(create_food_log))
        .route("/api/food-logs/today", get(today_stats))
        .route("/api/food-logs/analyze-photo", post(analyze_photo))
        .route("/api/food-logs/{id}", delete(delete_food_log))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("nutriplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("nutriplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers: profile and onboarding
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_profile(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(body): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let profile = profile::create_profile(
        &state.pool,
        identity,
        body.email.as_deref(),
        body.full_name.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(State(state): State<AppState>, Caller(identity): Caller) -> ApiResult<Profile> {
    Ok(Json(profile::get_profile(&state.pool, identity).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Profile> {
    Ok(Json(
        profile::update_profile(&state.pool, identity, &update).await?,
    ))
}

async fn recalculate_targets(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<RecalculatedTargets> {
    let (profile, targets) =
        profile::recalculate_targets(&state.pool, identity, today(), state.unspecified_gender)
            .await?;
    Ok(Json(RecalculatedTargets { profile, targets }))
}

async fn get_onboarding(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<OnboardingDraft> {
    Ok(Json(onboarding::get_draft(&state.pool, identity).await?))
}

async fn save_step(state: &AppState, identity: Identity, step: OnboardingStep) -> ApiResult<OnboardingDraft> {
    Ok(Json(
        onboarding::save_step(&state.pool, identity, step, today()).await?,
    ))
}

async fn put_goals(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(step): Json<GoalsStep>,
) -> ApiResult<OnboardingDraft> {
    save_step(&state, identity, OnboardingStep::Goals(step)).await
}

async fn put_body_stats(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(step): Json<BodyStatsStep>,
) -> ApiResult<OnboardingDraft> {
    save_step(&state, identity, OnboardingStep::BodyStats(step)).await
}

async fn put_dietary(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(step): Json<DietaryStep>,
) -> ApiResult<OnboardingDraft> {
    save_step(&state, identity, OnboardingStep::Dietary(step)).await
}

async fn put_preferences(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(step): Json<PreferencesStep>,
) -> ApiResult<OnboardingDraft> {
    save_step(&state, identity, OnboardingStep::Preferences(step)).await
}

async fn complete_onboarding(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Profile> {
    Ok(Json(
        onboarding::complete_onboarding(&state.pool, identity, today(), state.unspecified_gender)
            .await?,
    ))
}

// ---------------------------------------------------------------------------
// Handlers: meal plans, shopping lists, recipes
// ---------------------------------------------------------------------------

/// Generation runs on its own task so that a client disconnect does not
/// abort it halfway through persistence.
async fn generate_meal_plan(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(options): Json<GenerationOptions>,
) -> Result<(StatusCode, Json<GenerationSummary>), AppError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let today = today();
    let summary = tokio::spawn(async move {
        orchestrator
            .generate_meal_plan(identity, &options, today)
            .await
    })
    .await
    .map_err(|e| AppError::internal(anyhow::anyhow!("generation task failed: {e}")))??;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn list_meal_plans(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Vec<MealPlan>> {
    Ok(Json(plan::list_meal_plans(&state.pool, identity).await?))
}

async fn get_active_plan(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Option<ActivePlan>> {
    Ok(Json(
        plan::get_active_plan(&state.pool, identity, today()).await?,
    ))
}

async fn get_meal_plan(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<MealPlanDetail> {
    Ok(Json(
        plan::get_meal_plan_detail(&state.pool, identity, id).await?,
    ))
}

async fn toggle_meal_item(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<MealPlanItem> {
    Ok(Json(
        progress::toggle_meal_item(&state.pool, identity, id).await?,
    ))
}

async fn list_shopping_lists(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Vec<ShoppingList>> {
    Ok(Json(plan::list_shopping_lists(&state.pool, identity).await?))
}

async fn get_shopping_list(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ShoppingListDetail> {
    Ok(Json(
        plan::get_shopping_list_detail(&state.pool, identity, id).await?,
    ))
}

async fn toggle_shopping_item(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ShoppingListItem> {
    Ok(Json(
        progress::toggle_shopping_item(&state.pool, identity, id).await?,
    ))
}

async fn list_recipes(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Vec<Recipe>> {
    Ok(Json(plan::list_recipes(&state.pool, identity).await?))
}

async fn get_recipe(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Recipe> {
    Ok(Json(plan::get_recipe(&state.pool, id).await?))
}

// ---------------------------------------------------------------------------
// Handlers: progress
// ---------------------------------------------------------------------------

async fn log_weight(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(body): Json<WeightLogRequest>,
) -> Result<(StatusCode, Json<WeightLog>), AppError> {
    let log = progress::weight::log_weight(
        &state.pool,
        identity,
        body.weight_kg,
        body.logged_on.unwrap_or_else(today),
        body.notes.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn list_weight_logs(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Vec<WeightLog>> {
    Ok(Json(
        progress::weight::list_weight_logs(&state.pool, identity, query.days, today()).await?,
    ))
}

async fn delete_weight_log(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    progress::weight::delete_weight_log(&state.pool, identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn progress_stats(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<ProgressStats> {
    Ok(Json(
        progress::weight::progress_stats(&state.pool, identity, today()).await?,
    ))
}

async fn create_food_log(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(input): Json<FoodLogInput>,
) -> Result<(StatusCode, Json<FoodLog>), AppError> {
    let log = progress::food::create_food_log(&state.pool, identity, input).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn list_food_logs(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Query(query): Query<DateQuery>,
) -> ApiResult<Vec<FoodLog>> {
    Ok(Json(
        progress::food::list_food_logs(&state.pool, identity, query.date).await?,
    ))
}

async fn delete_food_log(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    progress::food::delete_food_log(&state.pool, identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn today_stats(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<DailyIntake> {
    Ok(Json(
        progress::food::today_stats(&state.pool, identity, today()).await?,
    ))
}

async fn analyze_photo(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(body): Json<PhotoRequest>,
) -> ApiResult<PhotoAnalysis> {
    let generator = state.orchestrator.generator();
    Ok(Json(
        progress::food::analyze_food_photo(generator.as_ref(), identity, &body.image).await?,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
