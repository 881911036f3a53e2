//! Sync status and the explicit transitions between states.
//!
//! Status only moves when a user-triggered action fires a `SyncEvent`.
//! Reconciliation computes the *observed* status separately (see `reconcile`).

use serde::{Deserialize, Serialize};

use crate::error::GovError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    LocalOnly,
    Synced,
    Modified,
    RemoteOnly,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOnly => "LOCAL_ONLY",
            Self::Synced => "SYNCED",
            Self::Modified => "MODIFIED",
            Self::RemoteOnly => "REMOTE_ONLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL_ONLY" => Some(Self::LocalOnly),
            "SYNCED" => Some(Self::Synced),
            "MODIFIED" => Some(Self::Modified),
            "REMOTE_ONLY" => Some(Self::RemoteOnly),
            _ => None,
        }
    }

    /// Apply a user-triggered event. Pairs not listed are rejected.
    pub fn apply(self, event: SyncEvent) -> Result<SyncStatus, GovError> {
        use SyncEvent::*;
        use SyncStatus::*;

        let next = match (self, event) {
            (LocalOnly, EditedLocally) => LocalOnly,
            (LocalOnly, Pushed) => Synced,
            (RemoteOnly, Pulled) => Synced,
            (Synced | Modified, EditedLocally) => Modified,
            (Synced | Modified, Pushed | Pulled | Resynced) => Synced,
            (Synced | Modified, RemoteDeleted) => LocalOnly,
            (from, event) => return Err(GovError::InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    EditedLocally,
    Pushed,
    Pulled,
    Resynced,
    RemoteDeleted,
}

#[cfg(test)]
mod tests {
    use super::SyncEvent::*;
    use super::SyncStatus::*;
    use super::*;

    #[test]
    fn local_only_push_becomes_synced() {
        assert_eq!(LocalOnly.apply(Pushed).unwrap(), Synced);
    }

    #[test]
    fn remote_only_pull_becomes_synced() {
        assert_eq!(RemoteOnly.apply(Pulled).unwrap(), Synced);
    }

    #[test]
    fn edit_marks_synced_as_modified() {
        assert_eq!(Synced.apply(EditedLocally).unwrap(), Modified);
        assert_eq!(Modified.apply(EditedLocally).unwrap(), Modified);
        assert_eq!(LocalOnly.apply(EditedLocally).unwrap(), LocalOnly);
    }

    #[test]
    fn push_pull_resync_settle_to_synced() {
        for ev in [Pushed, Pulled, Resynced] {
            assert_eq!(Modified.apply(ev).unwrap(), Synced);
            assert_eq!(Synced.apply(ev).unwrap(), Synced);
        }
    }

    #[test]
    fn remote_delete_keeps_local_copy() {
        assert_eq!(Synced.apply(RemoteDeleted).unwrap(), LocalOnly);
        assert_eq!(Modified.apply(RemoteDeleted).unwrap(), LocalOnly);
    }

    #[test]
    fn rejected_pairs() {
        for (from, ev) in [
            (LocalOnly, Pulled),
            (LocalOnly, Resynced),
            (LocalOnly, RemoteDeleted),
            (RemoteOnly, Pushed),
            (RemoteOnly, EditedLocally),
            (RemoteOnly, Resynced),
        ] {
            let err = from.apply(ev).unwrap_err();
            assert!(matches!(err, GovError::InvalidTransition { .. }), "{from} {ev:?}");
        }
    }

    #[test]
    fn serde_uses_screaming_case() {
        assert_eq!(serde_json::to_string(&LocalOnly).unwrap(), "\"LOCAL_ONLY\"");
        let s: SyncStatus = serde_json::from_str("\"REMOTE_ONLY\"").unwrap();
        assert_eq!(s, RemoteOnly);
        assert_eq!(SyncStatus::parse("modified"), Some(Modified));
        assert_eq!(SyncStatus::parse("bogus"), None);
    }
}
