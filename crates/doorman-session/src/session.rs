//! Pure session state machine.
//!
//! Keys go in, effects come out. The machine never sleeps, spawns, or
//! sends; everything it wants done to the outside world is returned as an
//! [`Effect`] list for the runner to dispatch. That keeps the whole
//! transition table unit-testable with nothing but a seeded store.

use doorman_core::{
    Key,
    constants::{PIN_LENGTH, TIMEOUT_HOLD, USER_ID_LENGTH},
};
use doorman_panel::{DisplayMessage, LedCommand};
use doorman_store::{AuthOutcome, CredentialStore};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::{deadline::DeadlineKind, state::SessionState};

/// A side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a command to the LED panel.
    Led(LedCommand),

    /// Send a command with an explicit auto-off hold.
    LedTimed(LedCommand, Duration),

    /// Show a display message until replaced.
    Show(DisplayMessage),

    /// Show a display message for a hold, then revert to standby.
    ShowFor(DisplayMessage, Duration),

    /// Arm a deadline, replacing any outstanding one.
    Arm(DeadlineKind),

    /// Cancel the outstanding deadline, if any.
    CancelDeadline,
}

/// How authentication failures are presented.
///
/// The store always distinguishes not-found, wrong-password, and blocked;
/// this only decides how much of that reaches the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Every failure shows the same generic denial. Leaks nothing about
    /// which part of the credential was wrong.
    #[default]
    Collapsed,

    /// Name the failure kind on the display.
    Detailed,
}

impl DenialPolicy {
    fn message(self, outcome: AuthOutcome) -> DisplayMessage {
        match self {
            Self::Collapsed => DisplayMessage::Invalid,
            Self::Detailed => DisplayMessage::Custom(
                match outcome {
                    AuthOutcome::NotFound => "ID DESCONOCIDO",
                    AuthOutcome::WrongPassword => "CLAVE INCORRECTA",
                    AuthOutcome::Blocked => "USUARIO BLOQUEADO",
                    AuthOutcome::Success => "BIENVENIDO",
                }
                .to_string(),
            ),
        }
    }
}

/// The access-control session.
///
/// Owns the credential store: the session is the only execution context
/// that ever touches it, so no locking is needed.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    store: CredentialStore,
    policy: DenialPolicy,

    id_buf: String,
    pin_buf: String,
    new_pin_buf: String,
}

impl Session {
    pub fn new(store: CredentialStore, policy: DenialPolicy) -> Self {
        Self {
            state: SessionState::Idle,
            store,
            policy,
            id_buf: String::new(),
            pin_buf: String::new(),
            new_pin_buf: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// ID digits accumulated so far.
    pub fn entered_id(&self) -> &str {
        &self.id_buf
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Apply one key to the transition table.
    pub fn handle_key(&mut self, key: Key) -> Vec<Effect> {
        if self.state.ignores_keys() {
            debug!(state = %self.state, key = %key.to_char(), "key ignored");
            return Vec::new();
        }

        match self.state {
            SessionState::Idle => self.on_idle(key),
            SessionState::EnteringId => self.on_entering_id(key),
            SessionState::EnteringPassword => self.on_entering_password(key),
            SessionState::ChangePasswordMenu => self.on_change_menu(key),
            SessionState::ChangeEnteringId => self.on_change_entering_id(key),
            SessionState::ChangeEnteringOldPassword => self.on_change_old_password(key),
            SessionState::ChangeEnteringNewPassword => self.on_change_new_password(key),
            // ignores_keys() covered the rest.
            _ => Vec::new(),
        }
    }

    /// Effects for the timeout notice. The runner shows these, waits out
    /// the hold, then calls [`reset`](Self::reset).
    pub fn timeout_effects(&self) -> Vec<Effect> {
        warn!(state = %self.state, "entry deadline expired");
        vec![
            Effect::LedTimed(LedCommand::RedOn, TIMEOUT_HOLD),
            Effect::ShowFor(
                DisplayMessage::Custom("TIMEOUT".to_string()),
                TIMEOUT_HOLD,
            ),
        ]
    }

    /// Full reset: clear buffers, return to idle, announce readiness.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.id_buf.clear();
        self.pin_buf.clear();
        self.new_pin_buf.clear();
        self.state = SessionState::Idle;
        info!("session reset to idle");
        vec![
            Effect::CancelDeadline,
            Effect::Led(LedCommand::SystemReady),
            Effect::Show(DisplayMessage::Standby),
        ]
    }

    fn on_idle(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Star => {
                self.state = SessionState::ChangePasswordMenu;
                info!("password change menu opened");
                vec![Effect::Show(DisplayMessage::ChangeUserPrompt)]
            }
            Key::Digit(_) => {
                self.state = SessionState::EnteringId;
                self.id_buf.clear();
                self.id_buf.push(key.to_char());
                info!("id entry started");
                vec![
                    Effect::Led(LedCommand::ProcessStarted),
                    Effect::Show(DisplayMessage::EnterId),
                    Effect::Arm(DeadlineKind::Entry),
                ]
            }
            _ => Vec::new(),
        }
    }

    fn on_entering_id(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Digit(_) if self.id_buf.len() < USER_ID_LENGTH => {
                self.id_buf.push(key.to_char());
                Vec::new()
            }
            Key::Hash if !self.id_buf.is_empty() => {
                self.state = SessionState::EnteringPassword;
                self.pin_buf.clear();
                info!(id = %self.id_buf, "id confirmed, waiting for password");
                vec![
                    Effect::Led(LedCommand::WaitingForPassword),
                    Effect::Show(DisplayMessage::EnterPassword),
                ]
            }
            Key::Star => self.reset(),
            _ => Vec::new(),
        }
    }

    fn on_entering_password(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Digit(_) if self.pin_buf.len() < PIN_LENGTH => {
                self.pin_buf.push(key.to_char());
                Vec::new()
            }
            Key::Hash if !self.pin_buf.is_empty() => {
                self.state = SessionState::Processing;
                let mut effects = vec![
                    Effect::CancelDeadline,
                    Effect::Led(LedCommand::AmberOff),
                ];
                let outcome = self.store.authenticate(&self.id_buf, &self.pin_buf);
                if outcome.is_success() {
                    self.state = SessionState::AccessGranted;
                    info!(id = %self.id_buf, "access granted");
                    effects.extend([
                        Effect::Led(LedCommand::AccessGranted),
                        Effect::Show(DisplayMessage::Welcome),
                        Effect::Arm(DeadlineKind::Granted),
                    ]);
                } else {
                    self.state = SessionState::AccessDenied;
                    warn!(id = %self.id_buf, %outcome, "access denied");
                    effects.extend([
                        Effect::Led(LedCommand::AccessDenied),
                        Effect::Show(self.policy.message(outcome)),
                        Effect::Arm(DeadlineKind::Denied),
                    ]);
                }
                effects
            }
            Key::Star => self.reset(),
            _ => Vec::new(),
        }
    }

    fn on_change_menu(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Star => self.reset(),
            Key::Digit(_) => {
                self.state = SessionState::ChangeEnteringId;
                self.id_buf.clear();
                self.id_buf.push(key.to_char());
                info!("password change: id entry started");
                vec![
                    Effect::Led(LedCommand::ProcessStarted),
                    Effect::Show(DisplayMessage::Custom("ID Usuario:".to_string())),
                    Effect::Arm(DeadlineKind::Entry),
                ]
            }
            _ => Vec::new(),
        }
    }

    fn on_change_entering_id(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Digit(_) if self.id_buf.len() < USER_ID_LENGTH => {
                self.id_buf.push(key.to_char());
                Vec::new()
            }
            // The change flow is stricter than plain entry: a full ID is
            // required before `#` is accepted.
            Key::Hash if self.id_buf.len() == USER_ID_LENGTH => {
                self.state = SessionState::ChangeEnteringOldPassword;
                self.pin_buf.clear();
                info!(id = %self.id_buf, "password change: id confirmed");
                vec![
                    Effect::Led(LedCommand::WaitingForPassword),
                    Effect::Show(DisplayMessage::Custom("Clave Actual:".to_string())),
                ]
            }
            Key::Star => self.reset(),
            _ => Vec::new(),
        }
    }

    fn on_change_old_password(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Digit(_) if self.pin_buf.len() < PIN_LENGTH => {
                self.pin_buf.push(key.to_char());
                Vec::new()
            }
            Key::Hash if self.pin_buf.len() == PIN_LENGTH => {
                let outcome = self.store.authenticate(&self.id_buf, &self.pin_buf);
                if outcome.is_success() {
                    self.state = SessionState::ChangeEnteringNewPassword;
                    self.new_pin_buf.clear();
                    info!(id = %self.id_buf, "password change: current password verified");
                    vec![Effect::Show(DisplayMessage::Custom(
                        "Nueva Clave:".to_string(),
                    ))]
                } else {
                    self.state = SessionState::AccessDenied;
                    warn!(id = %self.id_buf, %outcome, "password change: verification failed");
                    vec![
                        Effect::Led(LedCommand::AccessDenied),
                        Effect::Show(self.change_denial(outcome, "Clave Incorrecta")),
                        Effect::Arm(DeadlineKind::Denied),
                    ]
                }
            }
            Key::Star => self.reset(),
            _ => Vec::new(),
        }
    }

    fn on_change_new_password(&mut self, key: Key) -> Vec<Effect> {
        match key {
            Key::Digit(_) if self.new_pin_buf.len() < PIN_LENGTH => {
                self.new_pin_buf.push(key.to_char());
                Vec::new()
            }
            Key::Hash if self.new_pin_buf.len() == PIN_LENGTH => {
                self.state = SessionState::ChangeProcessing;
                let mut effects = vec![
                    Effect::CancelDeadline,
                    Effect::Led(LedCommand::AmberOff),
                ];
                let changed =
                    self.store
                        .change_pin(&self.id_buf, &self.pin_buf, &self.new_pin_buf);
                if changed {
                    self.state = SessionState::AccessGranted;
                    info!(id = %self.id_buf, "password changed");
                    effects.extend([
                        Effect::Led(LedCommand::AccessGranted),
                        Effect::Show(DisplayMessage::Custom("Clave Cambiada".to_string())),
                        Effect::Arm(DeadlineKind::Granted),
                    ]);
                } else {
                    self.state = SessionState::AccessDenied;
                    warn!(id = %self.id_buf, "password change failed");
                    effects.extend([
                        Effect::Led(LedCommand::AccessDenied),
                        Effect::Show(DisplayMessage::Custom("Error Cambio".to_string())),
                        Effect::Arm(DeadlineKind::Denied),
                    ]);
                }
                effects
            }
            Key::Star => self.reset(),
            _ => Vec::new(),
        }
    }

    fn change_denial(&self, outcome: AuthOutcome, collapsed: &str) -> DisplayMessage {
        match self.policy {
            DenialPolicy::Collapsed => DisplayMessage::Custom(collapsed.to_string()),
            DenialPolicy::Detailed => self.policy.message(outcome),
        }
    }
}
