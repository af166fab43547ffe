//! In-memory credential store for the doorman terminal.
//!
//! The store is a fixed-capacity table of user records seeded at startup.
//! It is the single authority for authentication, lockout enforcement and
//! PIN changes. Nothing here persists across restarts: the table lives in
//! RAM for the process lifetime, and a blocked account stays blocked until
//! the next boot.
//!
//! # Concurrency
//!
//! The store is intentionally not `Sync`-wrapped: only the session task
//! touches it, so no locking is needed. If that ever changes, wrap it at
//! the owner, not here.
//!
//! # Examples
//!
//! ```
//! use doorman_store::{AuthOutcome, CredentialStore};
//!
//! let mut store = CredentialStore::seeded();
//!
//! assert_eq!(store.authenticate("123456", "1234"), AuthOutcome::Success);
//! assert_eq!(store.authenticate("123456", "9999"), AuthOutcome::WrongPassword);
//! assert_eq!(store.authenticate("000000", "1234"), AuthOutcome::NotFound);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use doorman_core::{
    Error, Pin, Result, UserId,
    constants::{MAX_FAILED_ATTEMPTS, MAX_USERS},
};

/// Outcome of an authentication attempt.
///
/// The kinds are distinguished here even though the terminal UI may choose
/// to collapse them into a single "denied" treatment; that collapse is a
/// presentation policy, not a store concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    /// Credentials valid; the failed-attempt counter was reset.
    Success,

    /// No record with the given identifier.
    NotFound,

    /// Identifier known, PIN mismatch. The failed-attempt counter was
    /// incremented.
    WrongPassword,

    /// Account is blocked. Reported regardless of PIN correctness, and
    /// also on the attempt that crosses the lockout threshold.
    Blocked,
}

impl AuthOutcome {
    /// Returns `true` for [`AuthOutcome::Success`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::NotFound => "user not found",
            Self::WrongPassword => "wrong password",
            Self::Blocked => "user blocked",
        };
        write!(f, "{s}")
    }
}

/// A single user record.
///
/// `blocked` is monotonic: once set it is never cleared by any operation
/// in the store. There is no unblock for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// 6-digit identifier. Uniqueness is not enforced structurally;
    /// lookup is linear and the first match wins.
    pub id: UserId,

    /// 4-digit PIN.
    pub pin: Pin,

    /// Consecutive failed attempts since the last success.
    pub failed_attempts: u8,

    /// Permanent lockout flag.
    pub blocked: bool,
}

impl UserRecord {
    /// Create a fresh, unblocked record.
    #[must_use]
    pub fn new(id: UserId, pin: Pin) -> Self {
        Self {
            id,
            pin,
            failed_attempts: 0,
            blocked: false,
        }
    }
}

/// Fixed-capacity table of user records.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    users: Vec<UserRecord>,
}

impl CredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Vec::with_capacity(MAX_USERS),
        }
    }

    /// Create a store seeded with the fixed factory records.
    ///
    /// These are the same five accounts the deployed terminal ships with.
    #[must_use]
    pub fn seeded() -> Self {
        const SEED: [(&str, &str); 5] = [
            ("123456", "1234"),
            ("789012", "5678"),
            ("345678", "9012"),
            ("901234", "3456"),
            ("567890", "7890"),
        ];

        let users = SEED
            .iter()
            .map(|(id, pin)| {
                // Seed data is static and known valid.
                UserRecord::new(
                    UserId::new(id).expect("seed user id"),
                    Pin::new(pin).expect("seed pin"),
                )
            })
            .collect();

        info!(count = SEED.len(), "credential store seeded");
        Self { users }
    }

    /// Create a store from explicit records.
    ///
    /// # Errors
    /// Returns `Error::StoreFull` if more than [`MAX_USERS`] records are
    /// given.
    pub fn with_users(users: Vec<UserRecord>) -> Result<Self> {
        if users.len() > MAX_USERS {
            return Err(Error::StoreFull { capacity: MAX_USERS });
        }
        Ok(Self { users })
    }

    /// Number of records in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up a record by identifier. First match wins.
    #[must_use]
    pub fn user(&self, id: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id.as_str() == id)
    }

    fn user_mut(&mut self, id: &str) -> Option<&mut UserRecord> {
        self.users.iter_mut().find(|u| u.id.as_str() == id)
    }

    /// Authenticate entered credentials.
    ///
    /// The inputs are the raw keyed-in digit strings; a partial identifier
    /// or PIN simply fails to match. Side effects:
    ///
    /// - PIN match resets the failed-attempt counter.
    /// - PIN mismatch increments it; reaching [`MAX_FAILED_ATTEMPTS`]
    ///   blocks the account permanently and the outcome is reported as
    ///   [`AuthOutcome::Blocked`], not `WrongPassword`.
    /// - A blocked account reports `Blocked` without examining the PIN.
    pub fn authenticate(&mut self, id: &str, pin: &str) -> AuthOutcome {
        let Some(user) = self.user_mut(id) else {
            debug!(id, "authentication failed: user not found");
            return AuthOutcome::NotFound;
        };

        if user.blocked {
            debug!(id, "authentication failed: user blocked");
            return AuthOutcome::Blocked;
        }

        if user.pin.matches(pin) {
            user.failed_attempts = 0;
            info!(id, "authentication succeeded");
            return AuthOutcome::Success;
        }

        user.failed_attempts += 1;
        debug!(
            id,
            attempt = user.failed_attempts,
            limit = MAX_FAILED_ATTEMPTS,
            "authentication failed: wrong password"
        );

        if user.failed_attempts >= MAX_FAILED_ATTEMPTS {
            user.blocked = true;
            warn!(id, "user blocked permanently after repeated failures");
            return AuthOutcome::Blocked;
        }

        AuthOutcome::WrongPassword
    }

    /// Change a user's PIN.
    ///
    /// Fails (returns `false`) if the identifier is unknown, the account
    /// is blocked, the old PIN does not match, or the new PIN is not a
    /// valid 4-digit code. On success the stored PIN is overwritten; the
    /// failed-attempt counter and blocked flag are untouched.
    pub fn change_pin(&mut self, id: &str, old_pin: &str, new_pin: &str) -> bool {
        let Ok(new_pin) = Pin::new(new_pin) else {
            debug!(id, "pin change rejected: new pin malformed");
            return false;
        };

        let Some(user) = self.user_mut(id) else {
            debug!(id, "pin change rejected: user not found");
            return false;
        };

        if user.blocked {
            debug!(id, "pin change rejected: user blocked");
            return false;
        }

        if !user.pin.matches(old_pin) {
            debug!(id, "pin change rejected: old pin mismatch");
            return false;
        }

        user.pin = new_pin;
        info!(id, "pin changed");
        true
    }

    /// Iterate over the records, for diagnostics.
    pub fn status(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
