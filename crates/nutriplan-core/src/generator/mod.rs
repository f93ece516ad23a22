//! The external content generator: meal plans from a request, nutrition
//! estimates from a food photo.
//!
//! The generator is semi-trusted. Implementations only parse what comes
//! back; checking that it makes sense is the job of
//! [`crate::plan::sanitize`].

pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::candidate::{CandidatePlan, lenient};
use crate::plan::request::GenerationRequest;

pub use openai::{OpenAiConfig, OpenAiGenerator};

/// Why a call to the generator produced no usable result.
///
/// None of these are retried automatically.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generator did not answer within {0:?}")]
    Timeout(Duration),

    #[error("could not reach generator: {0}")]
    Transport(String),

    #[error("generator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generator returned an empty response")]
    EmptyResponse,

    #[error("generator response is not valid JSON for the expected shape: {0}")]
    Malformed(String),
}

/// How sure the generator is about a photo estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

/// Nutrition estimate for the food in a photo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoAnalysis {
    pub food_name: String,
    pub description: String,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_calories: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_protein: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_carbs: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_fat: Option<f64>,
    #[serde(deserialize_with = "lenient::confidence")]
    pub confidence: Confidence,
    pub suggestions: Vec<String>,
}

/// A source of meal plans and photo estimates.
///
/// Object-safe so services can hold an `Arc<dyn MealPlanGenerator>`.
#[async_trait]
pub trait MealPlanGenerator: Send + Sync {
    /// Short name for logs (e.g. "openai:gpt-4o").
    fn name(&self) -> String;

    /// Produce a candidate plan for the request.
    async fn generate_plan(
        &self,
        request: &GenerationRequest,
    ) -> Result<CandidatePlan, GenerationError>;

    /// Estimate the nutrition of the food in a base64-encoded JPEG.
    async fn analyze_food_photo(&self, image_base64: &str)
    -> Result<PhotoAnalysis, GenerationError>;
}

// Compile-time assertion: MealPlanGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn MealPlanGenerator) {}
};
