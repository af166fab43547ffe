//! Session states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the terminal is doing right now.
///
/// `Idle` is both the initial state and the point every transaction
/// returns to. `AccessGranted` and `AccessDenied` are transient verdict
/// states that auto-revert to `Idle` after their display hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    EnteringId,
    EnteringPassword,
    Processing,
    AccessGranted,
    AccessDenied,
    ChangePasswordMenu,
    ChangeEnteringId,
    ChangeEnteringOldPassword,
    ChangeEnteringNewPassword,
    ChangeProcessing,
}

impl SessionState {
    /// States where an entry deadline is legitimately outstanding.
    ///
    /// A timeout event observed in any other state is stale, left over
    /// from a deadline that was cancelled after its event was already
    /// queued.
    pub fn is_entering(self) -> bool {
        matches!(
            self,
            Self::EnteringId
                | Self::EnteringPassword
                | Self::ChangeEnteringId
                | Self::ChangeEnteringOldPassword
                | Self::ChangeEnteringNewPassword
        )
    }

    /// States where key input is ignored entirely.
    pub fn ignores_keys(self) -> bool {
        matches!(
            self,
            Self::Processing | Self::ChangeProcessing | Self::AccessGranted | Self::AccessDenied
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::EnteringId => "entering_id",
            Self::EnteringPassword => "entering_password",
            Self::Processing => "processing",
            Self::AccessGranted => "access_granted",
            Self::AccessDenied => "access_denied",
            Self::ChangePasswordMenu => "change_password_menu",
            Self::ChangeEnteringId => "change_entering_id",
            Self::ChangeEnteringOldPassword => "change_entering_old_password",
            Self::ChangeEnteringNewPassword => "change_entering_new_password",
            Self::ChangeProcessing => "change_processing",
        };
        f.write_str(name)
    }
}
