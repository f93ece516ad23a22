//! Caller identity as handed over by the authentication layer.

use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// The verified identity of whoever made a request, if any.
///
/// Session handling happens upstream; services only see the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    User(Uuid),
    Anonymous,
}

impl Identity {
    /// The user ID, or [`ServiceError::Unauthenticated`].
    pub fn require(self) -> ServiceResult<Uuid> {
        match self {
            Self::User(id) => Ok(id),
            Self::Anonymous => Err(ServiceError::Unauthenticated),
        }
    }
}

impl From<Option<Uuid>> for Identity {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_rejected() {
        let err = Identity::from(None).require().unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[test]
    fn user_passes_through() {
        let id = Uuid::new_v4();
        assert_eq!(Identity::from(Some(id)).require().unwrap(), id);
    }
}
