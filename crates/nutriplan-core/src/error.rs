//! Error taxonomy shared by the services in this crate.

use thiserror::Error;

use crate::generator::GenerationError;

/// Failure of a user-facing operation.
///
/// Hard failures only. Soft failures during plan persistence are logged and
/// reported through [`crate::plan::GenerationSummary`] instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No verified user identity accompanied the request.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller has no profile yet; onboarding must come first.
    #[error("profile not found; complete onboarding first")]
    ProfileNotFound,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A concurrent update won the race; the caller may re-read and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("meal plan generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The meal plan row itself could not be written. Nothing was persisted.
    #[error("failed to save meal plan: {0:#}")]
    PlanPersistenceFailed(#[source] anyhow::Error),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether repeating the same call unchanged might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Conflict(_) | Self::PlanPersistenceFailed(_) | Self::Storage(_)
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
