//! Meal plans: request building, generator output validation, persistence,
//! and the read side.

pub mod candidate;
pub mod orchestrator;
pub mod prompt;
pub mod request;
pub mod sanitize;
pub mod service;
pub mod store;

pub use candidate::{CandidatePlan, parse_candidate_plan};
pub use orchestrator::{GenerationSummary, MealPlanOrchestrator, UserLocks};
pub use request::{GenerationOptions, GenerationRequest, MAX_PLAN_DAYS, build_request};
pub use sanitize::{MealRejection, SanitizedPlan, cost_per_serving, sanitize_plan};
pub use service::{
    ActivePlan, MealPlanDetail, PlannedMeal, ShoppingCategory, ShoppingListDetail,
    get_active_plan, get_meal_plan_detail, get_recipe, get_shopping_list_detail,
    list_meal_plans, list_recipes, list_shopping_lists,
};
pub use store::{PgPlanStore, PlanActivation, PlanStore};
