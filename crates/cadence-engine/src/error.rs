//! Error types for the engagement engine.

use cadence_core::error::CadenceError;

use crate::lifecycle::CandidateStage;

/// Failure of a single collaborator call (fetch, like, comment, generate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Action failed: {0}")]
    Transient(String),
    #[error("Action timed out after {0} seconds")]
    Timeout(u64),
    #[error("Session expired: {0}")]
    AuthExpired(String),
}

impl ActionError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ActionError::AuthExpired(_))
    }
}

/// Failure that ends an engagement run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid run configuration: {0}")]
    Configuration(String),
    #[error("Session expired: {0}")]
    AuthExpired(String),
    #[error("Storage error: {0}")]
    Storage(#[from] CadenceError),
}

/// Failure to release a fetched media handle.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("Failed to release media {path}: {reason}")]
    Release { path: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Illegal candidate lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid candidate transition: {from} -> {to}")]
pub struct LifecycleError {
    pub from: CandidateStage,
    pub to: CandidateStage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_display() {
        let err = ActionError::Transient("connection reset".to_string());
        assert_eq!(err.to_string(), "Action failed: connection reset");

        let err = ActionError::Timeout(30);
        assert_eq!(err.to_string(), "Action timed out after 30 seconds");

        let err = ActionError::AuthExpired("login_required".to_string());
        assert_eq!(err.to_string(), "Session expired: login_required");
    }

    #[test]
    fn test_auth_expired_classification() {
        assert!(ActionError::AuthExpired(String::new()).is_auth_expired());
        assert!(!ActionError::Transient(String::new()).is_auth_expired());
        assert!(!ActionError::Timeout(5).is_auth_expired());
    }

    #[test]
    fn test_run_error_from_cadence_error() {
        let storage_err = CadenceError::Storage("disk full".to_string());
        let run_err: RunError = storage_err.into();
        assert!(matches!(run_err, RunError::Storage(_)));
        assert!(run_err.to_string().contains("disk full"));
    }

    #[test]
    fn test_run_error_configuration_display() {
        let err = RunError::Configuration("at least one hashtag is required".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid run configuration: at least one hashtag is required"
        );
    }

    #[test]
    fn test_cleanup_error_display() {
        let err = CleanupError::Release {
            path: "/tmp/media/1.jpg".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to release media /tmp/media/1.jpg: busy");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CleanupError = io.into();
        assert!(matches!(err, CleanupError::Io(_)));
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError {
            from: CandidateStage::Released,
            to: CandidateStage::Gated,
        };
        assert_eq!(err.to_string(), "Invalid candidate transition: released -> gated");
    }
}
