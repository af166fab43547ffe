//! Status LED panel task.
//!
//! Three LEDs mirror the terminal state: green for granted access, red for
//! denials and timeouts, amber for system status. Commands arrive over a
//! bounded queue; composite signals carry their own hold times, and the
//! amber LED can blink at 0.5 Hz while a password is being entered.
//!
//! Timed holds are deadlines checked on the panel's poll tick so the queue
//! keeps draining while a signal is lit.

use std::sync::{Arc, Mutex};

use doorman_core::{
    Error, Result,
    constants::{BLINK_HALF_PERIOD, DENIED_LED_HOLD, GRANTED_LED_HOLD, LED_QUEUE_CAPACITY},
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, timeout},
};
use tracing::{debug, info, warn};

/// Poll tick for deadlines and blink phase while waiting on the queue.
const PANEL_TICK: Duration = Duration::from_millis(100);

/// Commands understood by the LED panel.
///
/// The first eight drive individual LEDs; the rest are the composite
/// signals the session uses, with their hold times built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedCommand {
    GreenOn,
    GreenOff,
    RedOn,
    RedOff,
    AmberOn,
    AmberOff,
    AmberBlink,
    AllOff,

    /// Green for five seconds.
    AccessGranted,

    /// Red for two seconds.
    AccessDenied,

    /// Amber steady: idle and ready.
    SystemReady,

    /// Amber off: a session is in progress.
    ProcessStarted,

    /// Amber blinking: waiting for a password.
    WaitingForPassword,
}

/// A command plus an optional explicit auto-off hold.
///
/// An explicit hold overrides the composite signal's built-in one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRequest {
    pub command: LedCommand,
    pub auto_off: Option<Duration>,
}

/// Logical mode of a single LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedMode {
    #[default]
    Off,
    On,
    Blink,
}

/// Observable state of the three LEDs.
///
/// `amber_lit` is the physical level of the amber LED, which differs from
/// its mode while blinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedSnapshot {
    pub green: bool,
    pub red: bool,
    pub amber: LedMode,
    pub amber_lit: bool,
}

/// The LED panel task. Built with [`LedPanel::new`], driven by
/// [`run`](LedPanel::run) in a spawned task.
#[derive(Debug)]
pub struct LedPanel {
    rx: mpsc::Receiver<LedRequest>,
    state: Arc<Mutex<LedSnapshot>>,

    green_off_at: Option<Instant>,
    red_off_at: Option<Instant>,
    blink_flip_at: Instant,
}

/// Cloneable sender half of the LED panel.
#[derive(Debug, Clone)]
pub struct LedHandle {
    tx: mpsc::Sender<LedRequest>,
    state: Arc<Mutex<LedSnapshot>>,
}

impl LedPanel {
    /// Create the panel and its handle. All LEDs start off.
    pub fn new() -> (Self, LedHandle) {
        let (tx, rx) = mpsc::channel(LED_QUEUE_CAPACITY);
        let state = Arc::new(Mutex::new(LedSnapshot::default()));

        let panel = Self {
            rx,
            state: Arc::clone(&state),
            green_off_at: None,
            red_off_at: None,
            blink_flip_at: Instant::now(),
        };
        let handle = LedHandle { tx, state };

        (panel, handle)
    }

    /// Run until every handle has been dropped.
    pub async fn run(mut self) {
        debug!("led panel started");
        loop {
            match timeout(PANEL_TICK, self.rx.recv()).await {
                Ok(Some(request)) => self.apply(request),
                Ok(None) => {
                    debug!("led queue closed, panel stopping");
                    return;
                }
                Err(_) => {}
            }
            self.tick(Instant::now());
        }
    }

    fn apply(&mut self, request: LedRequest) {
        let now = Instant::now();
        let mut snap = lock(&self.state);
        match request.command {
            LedCommand::GreenOn => {
                snap.green = true;
                self.green_off_at = request.auto_off.map(|d| now + d);
            }
            LedCommand::GreenOff => {
                snap.green = false;
                self.green_off_at = None;
            }
            LedCommand::RedOn => {
                snap.red = true;
                self.red_off_at = request.auto_off.map(|d| now + d);
            }
            LedCommand::RedOff => {
                snap.red = false;
                self.red_off_at = None;
            }
            LedCommand::AmberOn => {
                snap.amber = LedMode::On;
                snap.amber_lit = true;
            }
            LedCommand::AmberOff => {
                snap.amber = LedMode::Off;
                snap.amber_lit = false;
            }
            LedCommand::AmberBlink | LedCommand::WaitingForPassword => {
                snap.amber = LedMode::Blink;
                snap.amber_lit = true;
                self.blink_flip_at = now;
            }
            LedCommand::AllOff => {
                *snap = LedSnapshot::default();
                self.green_off_at = None;
                self.red_off_at = None;
            }
            LedCommand::AccessGranted => {
                snap.green = true;
                let hold = request.auto_off.unwrap_or(GRANTED_LED_HOLD);
                self.green_off_at = Some(now + hold);
            }
            LedCommand::AccessDenied => {
                snap.red = true;
                let hold = request.auto_off.unwrap_or(DENIED_LED_HOLD);
                self.red_off_at = Some(now + hold);
            }
            LedCommand::SystemReady => {
                snap.amber = LedMode::On;
                snap.amber_lit = true;
            }
            LedCommand::ProcessStarted => {
                snap.amber = LedMode::Off;
                snap.amber_lit = false;
            }
        }
        info!(command = ?request.command, "led command applied");
    }

    /// Expire timed signals and advance the blink phase.
    fn tick(&mut self, now: Instant) {
        let mut snap = lock(&self.state);

        if self.green_off_at.is_some_and(|at| now >= at) {
            snap.green = false;
            self.green_off_at = None;
            debug!("green hold expired");
        }
        if self.red_off_at.is_some_and(|at| now >= at) {
            snap.red = false;
            self.red_off_at = None;
            debug!("red hold expired");
        }
        if snap.amber == LedMode::Blink
            && now.duration_since(self.blink_flip_at) >= BLINK_HALF_PERIOD
        {
            snap.amber_lit = !snap.amber_lit;
            self.blink_flip_at = now;
        }
    }
}

impl LedHandle {
    /// Queue a command. A full queue drops the command with a warning, the
    /// way the firmware queue did; only a dead panel is an error.
    pub fn send(&self, command: LedCommand) -> Result<()> {
        self.send_timed(command, None)
    }

    /// Queue a command with an explicit auto-off hold.
    pub fn send_timed(&self, command: LedCommand, auto_off: Option<Duration>) -> Result<()> {
        match self.tx.try_send(LedRequest { command, auto_off }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(req)) => {
                warn!(command = ?req.command, "led queue full, command dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::ChannelClosed("led queue")),
        }
    }

    /// Current LED state.
    pub fn snapshot(&self) -> LedSnapshot {
        *lock(&self.state)
    }
}

fn lock(state: &Mutex<LedSnapshot>) -> std::sync::MutexGuard<'_, LedSnapshot> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn spawn_panel() -> LedHandle {
        let (panel, handle) = LedPanel::new();
        tokio::spawn(panel.run());
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn granted_signal_holds_green_for_five_seconds() {
        let handle = spawn_panel();

        handle.send(LedCommand::AccessGranted).unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(handle.snapshot().green);

        sleep(Duration::from_secs(4)).await;
        assert!(handle.snapshot().green, "still inside the hold");

        sleep(Duration::from_secs(2)).await;
        assert!(!handle.snapshot().green);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_signal_holds_red_for_two_seconds() {
        let handle = spawn_panel();

        handle.send(LedCommand::AccessDenied).unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(handle.snapshot().red);

        sleep(Duration::from_secs(3)).await;
        assert!(!handle.snapshot().red);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_password_blinks_amber() {
        let handle = spawn_panel();

        handle.send(LedCommand::WaitingForPassword).unwrap();
        sleep(Duration::from_millis(200)).await;
        let first = handle.snapshot();
        assert_eq!(first.amber, LedMode::Blink);
        assert!(first.amber_lit, "blink starts lit");

        sleep(Duration::from_millis(1200)).await;
        assert!(!handle.snapshot().amber_lit, "phase flips after a second");

        sleep(Duration::from_millis(1100)).await;
        assert!(handle.snapshot().amber_lit);
    }

    #[tokio::test(start_paused = true)]
    async fn all_off_clears_pending_holds() {
        let handle = spawn_panel();

        handle.send(LedCommand::AccessGranted).unwrap();
        handle.send(LedCommand::SystemReady).unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(handle.snapshot().green);

        handle.send(LedCommand::AllOff).unwrap();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.snapshot(), LedSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_hold_overrides_builtin() {
        let handle = spawn_panel();

        handle
            .send_timed(LedCommand::RedOn, Some(Duration::from_secs(2)))
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(handle.snapshot().red);

        sleep(Duration::from_secs(3)).await;
        assert!(!handle.snapshot().red);
    }
}
