use thiserror::Error;

use crate::sync_status::{SyncEvent, SyncStatus};

/// Failure talking to the metadata backend. Surfaced to the caller as-is:
/// no retry, no distinction between transient and permanent failures.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend returned non-JSON content ({content_type})")]
    NotJson { content_type: String },

    #[error("graphql error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("transport: {0}")]
    Transport(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl BackendError {
    /// True when the backend says the target does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 404,
            Self::GraphQl(messages) => messages.iter().any(|m| {
                let m = m.to_ascii_lowercase();
                m.contains("not found") || m.contains("does not exist")
            }),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum GovError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing id: {0}")]
    MissingId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid sync transition: {event:?} from {from}")]
    InvalidTransition { from: SyncStatus, event: SyncEvent },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error("staging: {0}")]
    Staging(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GovError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::MissingId(_) => 400,
            Self::InvalidInput(_) => 400,
            Self::InvalidTransition { .. } => 409,
            Self::Conflict(_) => 409,
            Self::Backend(_) => 502,
            Self::Staging(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_per_variant() {
        assert_eq!(GovError::NotFound("x".into()).http_status(), 404);
        assert_eq!(GovError::MissingId("x".into()).http_status(), 400);
        assert_eq!(GovError::InvalidInput("x".into()).http_status(), 400);
        assert_eq!(
            GovError::InvalidTransition {
                from: SyncStatus::RemoteOnly,
                event: SyncEvent::Pushed,
            }
            .http_status(),
            409
        );
        assert_eq!(GovError::Conflict("x".into()).http_status(), 409);
        assert_eq!(
            GovError::Backend(BackendError::Transport("down".into())).http_status(),
            502
        );
        assert_eq!(GovError::Staging("x".into()).http_status(), 500);
        assert_eq!(
            GovError::Internal(anyhow::anyhow!("boom")).http_status(),
            500
        );
    }

    #[test]
    fn display_graphql_joins_messages() {
        let e = BackendError::GraphQl(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "graphql error: a; b");
    }

    #[test]
    fn display_invalid_transition() {
        let e = GovError::InvalidTransition {
            from: SyncStatus::LocalOnly,
            event: SyncEvent::Pulled,
        };
        assert_eq!(e.to_string(), "invalid sync transition: Pulled from LOCAL_ONLY");
    }

    #[test]
    fn not_found_detection() {
        assert!(BackendError::Http {
            status: 404,
            body: String::new()
        }
        .is_not_found());
        assert!(BackendError::GraphQl(vec!["Entity urn:li:tag:x does not exist".into()])
            .is_not_found());
        assert!(!BackendError::Http {
            status: 500,
            body: String::new()
        }
        .is_not_found());
        assert!(!BackendError::NotJson {
            content_type: "text/html".into()
        }
        .is_not_found());
    }
}
