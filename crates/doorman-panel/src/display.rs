//! Character display panel task.
//!
//! Models the terminal's 2x16 panel. The session posts canned prompts or
//! short custom texts; a message may carry a hold time, after which the
//! panel reverts to standby on its own. Standby shows the fixed
//! commissioning date and a clock simulated from runtime, refreshed once
//! per second.
//!
//! Text is ASCII only, like the hardware it stands in for.

use std::sync::{Arc, Mutex};

use doorman_core::{
    Error, Result,
    constants::{DISPLAY_COLUMNS, DISPLAY_LINES, DISPLAY_QUEUE_CAPACITY, MAX_CUSTOM_TEXT, STANDBY_DATE},
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, timeout},
};
use tracing::{debug, info, warn};

/// Poll tick for the revert deadline and the standby clock.
const PANEL_TICK: Duration = Duration::from_millis(100);

/// Messages the panel can render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMessage {
    /// Date and simulated clock.
    Standby,
    EnterId,
    EnterPassword,
    Welcome,
    Invalid,
    /// Prompt for the password-change flow.
    ChangeUserPrompt,
    /// Free text, validated by [`DisplayMessage::custom`].
    Custom(String),
}

impl DisplayMessage {
    /// Build a custom message, enforcing the panel's text limits.
    ///
    /// # Errors
    ///
    /// Returns `Error::DisplayTextTooLong` past 31 characters and
    /// `Error::DisplayTextNotAscii` for anything outside printable ASCII.
    pub fn custom(text: &str) -> Result<Self> {
        if text.len() > MAX_CUSTOM_TEXT {
            return Err(Error::DisplayTextTooLong {
                len: text.len(),
                max: MAX_CUSTOM_TEXT,
            });
        }
        if !text.chars().all(|c| c.is_ascii() && (!c.is_ascii_control())) {
            return Err(Error::DisplayTextNotAscii);
        }
        Ok(Self::Custom(text.to_string()))
    }

    /// Render to panel lines. `clock` fills the standby time field.
    fn lines(&self, clock: &str) -> [String; DISPLAY_LINES] {
        let [a, b] = match self {
            Self::Standby => [STANDBY_DATE, clock],
            Self::EnterId => ["INGRESE SU ID", ""],
            Self::EnterPassword => ["INGRESE SU", "CONTRASENA"],
            Self::Welcome => ["BIENVENIDO", ""],
            Self::Invalid => ["USUARIO O CLAVE", "INVALIDOS"],
            Self::ChangeUserPrompt => ["CAMBIAR USUARIO", "NUEVA CONTRASENA"],
            Self::Custom(text) => {
                // Long custom text wraps onto the second line. The split
                // backs off to a char boundary so text that bypassed
                // [`DisplayMessage::custom`] cannot panic the panel.
                let mut cut = text.len().min(DISPLAY_COLUMNS);
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                let (head, tail) = text.split_at(cut);
                return [pad(head), pad(tail)];
            }
        };
        [pad(a), pad(b)]
    }
}

/// Pad or truncate to the panel width.
fn pad(text: &str) -> String {
    format!("{text:<width$.width$}", width = DISPLAY_COLUMNS)
}

/// A message plus an optional hold before reverting to standby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRequest {
    pub message: DisplayMessage,
    pub hold: Option<Duration>,
}

/// Observable panel contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    /// Rendered lines, each exactly the panel width.
    pub lines: [String; DISPLAY_LINES],

    /// Whether the panel is showing the standby screen.
    pub standby: bool,
}

/// The display panel task.
#[derive(Debug)]
pub struct DisplayPanel {
    rx: mpsc::Receiver<DisplayRequest>,
    state: Arc<Mutex<DisplaySnapshot>>,

    /// Epoch of the simulated clock.
    started: Instant,

    /// When to fall back to standby, if a held message is up.
    revert_at: Option<Instant>,

    last_clock_refresh: Instant,
}

/// Cloneable sender half of the display panel.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    tx: mpsc::Sender<DisplayRequest>,
    state: Arc<Mutex<DisplaySnapshot>>,
}

impl DisplayPanel {
    /// Create the panel and its handle, showing the standby screen.
    pub fn new() -> (Self, DisplayHandle) {
        let (tx, rx) = mpsc::channel(DISPLAY_QUEUE_CAPACITY);
        let started = Instant::now();
        let state = Arc::new(Mutex::new(DisplaySnapshot {
            lines: DisplayMessage::Standby.lines(&clock_text(Duration::ZERO)),
            standby: true,
        }));

        let panel = Self {
            rx,
            state: Arc::clone(&state),
            started,
            revert_at: None,
            last_clock_refresh: started,
        };
        let handle = DisplayHandle { tx, state };

        (panel, handle)
    }

    /// Run until every handle has been dropped.
    pub async fn run(mut self) {
        debug!("display panel started");
        loop {
            match timeout(PANEL_TICK, self.rx.recv()).await {
                Ok(Some(request)) => {
                    self.show(&request.message);
                    self.revert_at = request.hold.map(|d| Instant::now() + d);
                }
                Ok(None) => {
                    debug!("display queue closed, panel stopping");
                    return;
                }
                Err(_) => {}
            }
            self.tick(Instant::now());
        }
    }

    fn show(&mut self, message: &DisplayMessage) {
        let clock = clock_text(self.started.elapsed());
        let standby = *message == DisplayMessage::Standby;
        {
            let mut snap = lock(&self.state);
            snap.lines = message.lines(&clock);
            snap.standby = standby;
        }
        info!(?message, "display updated");
    }

    fn tick(&mut self, now: Instant) {
        if self.revert_at.is_some_and(|at| now >= at) {
            self.revert_at = None;
            self.show(&DisplayMessage::Standby);
            self.last_clock_refresh = now;
            return;
        }

        // Once per second the standby clock advances.
        let standby = lock(&self.state).standby;
        if standby && now.duration_since(self.last_clock_refresh) >= Duration::from_secs(1) {
            self.show(&DisplayMessage::Standby);
            self.last_clock_refresh = now;
        }
    }
}

impl DisplayHandle {
    /// Show a message until replaced.
    pub fn show(&self, message: DisplayMessage) -> Result<()> {
        self.send(DisplayRequest {
            message,
            hold: None,
        })
    }

    /// Show a message for `hold`, then revert to standby.
    pub fn show_for(&self, message: DisplayMessage, hold: Duration) -> Result<()> {
        self.send(DisplayRequest {
            message,
            hold: Some(hold),
        })
    }

    fn send(&self, request: DisplayRequest) -> Result<()> {
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(req)) => {
                warn!(message = ?req.message, "display queue full, message dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::ChannelClosed("display queue"))
            }
        }
    }

    /// Current panel contents.
    pub fn snapshot(&self) -> DisplaySnapshot {
        lock(&self.state).clone()
    }
}

/// Format the simulated wall clock, wrapping at midnight.
fn clock_text(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn lock(state: &Mutex<DisplaySnapshot>) -> std::sync::MutexGuard<'_, DisplaySnapshot> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn spawn_panel() -> DisplayHandle {
        let (panel, handle) = DisplayPanel::new();
        tokio::spawn(panel.run());
        handle
    }

    #[test]
    fn custom_message_enforces_limits() {
        assert!(DisplayMessage::custom("TIMEOUT").is_ok());
        assert!(matches!(
            DisplayMessage::custom("X".repeat(32).as_str()),
            Err(Error::DisplayTextTooLong { len: 32, max: 31 })
        ));
        assert!(matches!(
            DisplayMessage::custom("café"),
            Err(Error::DisplayTextNotAscii)
        ));
    }

    #[test]
    fn lines_are_exactly_panel_width() {
        for message in [
            DisplayMessage::Standby,
            DisplayMessage::EnterId,
            DisplayMessage::EnterPassword,
            DisplayMessage::Welcome,
            DisplayMessage::Invalid,
            DisplayMessage::ChangeUserPrompt,
            DisplayMessage::custom("TIMEOUT").unwrap(),
        ] {
            for line in message.lines("00:00:00") {
                assert_eq!(line.len(), DISPLAY_COLUMNS, "{message:?}");
            }
        }
    }

    #[test]
    fn long_custom_text_wraps_to_second_line() {
        let message = DisplayMessage::custom("CAMBIO DE CLAVE COMPLETADO").unwrap();
        let [first, second] = message.lines("00:00:00");
        assert_eq!(first, "CAMBIO DE CLAVE ");
        assert_eq!(second.trim_end(), "COMPLETADO");
    }

    #[test]
    fn custom_text_built_around_the_validator_still_renders() {
        // 15 ASCII bytes, then a two-byte char straddling column 16.
        let message = DisplayMessage::Custom(format!("{}ñX", "A".repeat(15)));
        let [first, second] = message.lines("00:00:00");
        assert_eq!(first.trim_end(), "A".repeat(15));
        assert_eq!(second.trim_end(), "ñX");
        assert_eq!(first.chars().count(), DISPLAY_COLUMNS);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_in_standby_with_date() {
        let handle = spawn_panel();
        sleep(Duration::from_millis(50)).await;

        let snap = handle.snapshot();
        assert!(snap.standby);
        assert!(snap.lines[0].starts_with(STANDBY_DATE));
    }

    #[tokio::test(start_paused = true)]
    async fn held_message_reverts_to_standby() {
        let handle = spawn_panel();

        handle
            .show_for(DisplayMessage::Invalid, Duration::from_secs(2))
            .unwrap();
        sleep(Duration::from_millis(200)).await;

        let snap = handle.snapshot();
        assert!(!snap.standby);
        assert!(snap.lines[0].starts_with("USUARIO O CLAVE"));

        sleep(Duration::from_secs(3)).await;
        assert!(handle.snapshot().standby);
    }

    #[tokio::test(start_paused = true)]
    async fn standby_clock_advances() {
        let handle = spawn_panel();
        sleep(Duration::from_millis(50)).await;
        let before = handle.snapshot().lines[1].clone();

        sleep(Duration::from_secs(5)).await;
        let after = handle.snapshot().lines[1].clone();
        assert_ne!(before, after, "clock line should move in standby");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_message_stays_up() {
        let handle = spawn_panel();

        handle.show(DisplayMessage::EnterId).unwrap();
        sleep(Duration::from_secs(10)).await;

        let snap = handle.snapshot();
        assert!(!snap.standby);
        assert!(snap.lines[0].starts_with("INGRESE SU ID"));
    }

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock_text(Duration::from_secs(0)), "00:00:00");
        assert_eq!(clock_text(Duration::from_secs(86_399)), "23:59:59");
        assert_eq!(clock_text(Duration::from_secs(86_400)), "00:00:00");
        assert_eq!(clock_text(Duration::from_secs(3_661)), "01:01:01");
    }
}
