pub mod food_logs;
pub mod meal_plan_items;
pub mod meal_plans;
pub mod onboarding;
pub mod profiles;
pub mod recipes;
pub mod shopping_lists;
pub mod weight_logs;
