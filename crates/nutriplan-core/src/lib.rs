//! Domain logic for NutriPlan: nutrition targets, meal plan generation and
//! persistence, onboarding, and progress tracking.

pub mod auth;
pub mod error;
pub mod generator;
pub mod nutrition;
pub mod onboarding;
pub mod plan;
pub mod profile;
pub mod progress;

pub use auth::Identity;
pub use error::{ServiceError, ServiceResult};
