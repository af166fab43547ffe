//! Hybrid interrupt-plus-polling keypad decoder.
//!
//! The decoder sleeps on the row-edge channel while idle, so a quiet
//! keypad costs nothing. Once an edge arrives it switches to a 5 ms polled
//! state machine: confirm the row is still active after the debounce
//! window, walk the columns one settle interval at a time until one lifts
//! the row, emit the key, then track the press until the release has been
//! stable long enough to re-arm.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use doorman_core::{
    Key, Result,
    constants::{
        COLUMN_SETTLE, DECODER_POLL, KEY_QUEUE_CAPACITY, KEYPAD_COLS, KEYPAD_ROWS,
        RELEASE_DEBOUNCE, ROW_DEBOUNCE,
    },
};
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, sleep, timeout},
};
use tracing::{debug, trace, warn};

use crate::matrix::KeypadMatrix;

/// Timing knobs for the decoder state machine.
///
/// Defaults come from the firmware values; tests shrink them when they
/// want faster scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// How long a row must stay active before scanning starts.
    pub row_debounce: Duration,

    /// Settling time after driving a column before sampling the row.
    pub column_settle: Duration,

    /// How long the row must stay released before re-arming.
    pub release_debounce: Duration,

    /// Poll tick used whenever the decoder is not idle.
    pub poll_interval: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            row_debounce: ROW_DEBOUNCE,
            column_settle: COLUMN_SETTLE,
            release_debounce: RELEASE_DEBOUNCE,
            poll_interval: DECODER_POLL,
        }
    }
}

/// Decoder state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Quiet. Waiting on a row edge, polling suspended.
    #[default]
    Idle,

    /// Row edge latched, waiting out the debounce window.
    Debounce,

    /// Driving columns high one at a time to find the pressed key.
    ColumnScan,

    /// Key identified and reported, waiting for the row to release.
    Pressed,

    /// Row released, waiting out the release debounce before re-arming.
    Released,
}

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key that was pressed.
    pub key: Key,

    /// When the column scan identified it.
    pub at: Instant,
}

/// Consumer end of the decoded key stream.
#[derive(Debug)]
pub struct KeyEvents {
    rx: mpsc::Receiver<KeyEvent>,
}

impl KeyEvents {
    /// Wait up to `wait` for the next key event.
    ///
    /// A zero `wait` is a pure poll of the queue, no yielding.
    pub async fn next(&mut self, wait: Duration) -> Option<KeyEvent> {
        if wait.is_zero() {
            return self.rx.try_recv().ok();
        }
        timeout(wait, self.rx.recv()).await.ok().flatten()
    }
}

/// Cheap observer of whether the decoder is idle.
///
/// The edge source only matters while the decoder is idle; anything that
/// wants to know whether a press would even be noticed (diagnostics, the
/// terminal status line) can ask here without touching the decoder.
#[derive(Debug, Clone)]
pub struct IdleProbe(Arc<AtomicBool>);

impl IdleProbe {
    /// Whether the decoder is currently parked waiting for a row edge.
    pub fn is_idle(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The keypad decoder task.
///
/// Owns the matrix for its whole life. Build one with
/// [`KeypadDecoder::new`] and drive it with [`run`](KeypadDecoder::run)
/// inside a spawned task.
#[derive(Debug)]
pub struct KeypadDecoder<M: KeypadMatrix> {
    matrix: M,
    config: DecoderConfig,
    state: DecoderState,

    /// Row latched by the last edge.
    detected_row: usize,

    /// Column currently driven high during a scan.
    current_column: usize,

    /// Instant of the last row level change (edge or release).
    last_change: Instant,

    /// Instant the current column was driven high.
    column_change: Instant,

    events: mpsc::Sender<KeyEvent>,
    idle: Arc<AtomicBool>,
}

impl<M: KeypadMatrix> KeypadDecoder<M> {
    /// Build a decoder over `matrix`.
    ///
    /// Returns the decoder together with the key event stream and an
    /// [`IdleProbe`].
    pub fn new(matrix: M, config: DecoderConfig) -> (Self, KeyEvents, IdleProbe) {
        let (events, rx) = mpsc::channel(KEY_QUEUE_CAPACITY);
        let idle = Arc::new(AtomicBool::new(true));

        let decoder = Self {
            matrix,
            config,
            state: DecoderState::Idle,
            detected_row: 0,
            current_column: 0,
            last_change: Instant::now(),
            column_change: Instant::now(),
            events,
            idle: Arc::clone(&idle),
        };

        (decoder, KeyEvents { rx }, IdleProbe(idle))
    }

    /// Run the decoder until the edge source disappears.
    pub async fn run(mut self) -> Result<()> {
        debug!(config = ?self.config, "keypad decoder started");
        loop {
            if self.state == DecoderState::Idle {
                let edge = self.matrix.row_edge().await?;
                if edge.row >= KEYPAD_ROWS {
                    warn!(row = edge.row, "edge on nonexistent row, ignored");
                    continue;
                }
                trace!(row = edge.row, "row edge latched");
                self.detected_row = edge.row;
                self.last_change = edge.at;
                self.set_state(DecoderState::Debounce);
            } else {
                sleep(self.config.poll_interval).await;
                self.step(Instant::now())?;
            }
        }
    }

    /// Advance the non-idle states by one poll tick.
    fn step(&mut self, now: Instant) -> Result<()> {
        match self.state {
            DecoderState::Idle => {}

            DecoderState::Debounce => {
                if now.duration_since(self.last_change) >= self.config.row_debounce {
                    if !self.matrix.read_row(self.detected_row) {
                        // Row held low through the window, start scanning.
                        self.current_column = 0;
                        self.matrix.drive_column(0, true);
                        self.column_change = now;
                        self.set_state(DecoderState::ColumnScan);
                    } else {
                        trace!(row = self.detected_row, "bounce filtered");
                        self.set_state(DecoderState::Idle);
                    }
                }
            }

            DecoderState::ColumnScan => {
                if now.duration_since(self.column_change) >= self.config.column_settle {
                    if self.matrix.read_row(self.detected_row) {
                        // This column lifted the row: contact found.
                        let key = Key::from_position(self.detected_row, self.current_column)?;
                        self.matrix.drive_column(self.current_column, false);
                        self.emit(KeyEvent { key, at: now });
                        self.set_state(DecoderState::Pressed);
                    } else {
                        self.matrix.drive_column(self.current_column, false);
                        self.current_column += 1;
                        if self.current_column < KEYPAD_COLS {
                            self.matrix.drive_column(self.current_column, true);
                            self.column_change = now;
                        } else {
                            // Ghost edge, no column claims the row.
                            trace!(row = self.detected_row, "scan found no key");
                            self.set_state(DecoderState::Idle);
                        }
                    }
                }
            }

            DecoderState::Pressed => {
                if self.matrix.read_row(self.detected_row) {
                    self.last_change = now;
                    self.set_state(DecoderState::Released);
                }
            }

            DecoderState::Released => {
                if now.duration_since(self.last_change) >= self.config.release_debounce {
                    self.set_state(DecoderState::Idle);
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, event: KeyEvent) {
        match self.events.try_send(event) {
            Ok(()) => debug!(key = %event.key.to_char(), "key decoded"),
            Err(mpsc::error::TrySendError::Full(ev)) => {
                warn!(key = %ev.key.to_char(), "key queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("key consumer gone, event discarded");
            }
        }
    }

    fn set_state(&mut self, next: DecoderState) {
        trace!(from = ?self.state, to = ?next, "decoder transition");
        self.state = next;
        if next == DecoderState::Idle {
            // Edges latched mid-scan must not replay as new presses.
            self.matrix.clear_pending_edge();
        }
        self.idle
            .store(next == DecoderState::Idle, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMatrix;

    fn spawn_decoder() -> (crate::MockMatrixHandle, KeyEvents, IdleProbe) {
        let (matrix, handle) = MockMatrix::new();
        let (decoder, events, probe) = KeypadDecoder::new(matrix, DecoderConfig::default());
        tokio::spawn(decoder.run());
        (handle, events, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn held_key_decodes_exactly_once() {
        let (handle, mut events, _probe) = spawn_decoder();

        handle.press('5').unwrap();
        let event = events.next(Duration::from_millis(500)).await.unwrap();
        assert_eq!(event.key, Key::Digit(5));

        // Holding the key must not repeat it.
        assert!(events.next(Duration::from_millis(500)).await.is_none());

        handle.release();
        assert!(events.next(Duration::from_millis(500)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn glitch_shorter_than_debounce_is_dropped() {
        let (handle, mut events, probe) = spawn_decoder();

        handle.press('9').unwrap();
        sleep(Duration::from_millis(10)).await;
        handle.release();

        assert!(events.next(Duration::from_millis(500)).await.is_none());
        assert!(probe.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn each_corner_maps_to_its_legend() {
        let (handle, mut events, _probe) = spawn_decoder();

        for (legend, expected) in [
            ('1', Key::Digit(1)),
            ('A', Key::Letter('A')),
            ('*', Key::Star),
            ('D', Key::Letter('D')),
        ] {
            handle.tap(legend, Duration::from_millis(100)).await.unwrap();
            sleep(Duration::from_millis(100)).await;
            let event = events.next(Duration::from_millis(500)).await.unwrap();
            assert_eq!(event.key, expected, "legend {legend}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn press_during_scan_does_not_replay() {
        let (handle, mut events, probe) = spawn_decoder();

        handle.press('2').unwrap();
        let event = events.next(Duration::from_millis(500)).await.unwrap();
        assert_eq!(event.key, Key::Digit(2));

        // Second press of the same key while the first is still held:
        // the latched edge must be cleared when the decoder re-arms.
        handle.press('2').unwrap();
        handle.release();
        sleep(Duration::from_millis(100)).await;

        assert!(events.next(Duration::from_millis(500)).await.is_none());
        assert!(probe.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_probe_tracks_activity() {
        let (handle, mut events, probe) = spawn_decoder();
        sleep(Duration::from_millis(10)).await;
        assert!(probe.is_idle());

        handle.press('7').unwrap();
        let _ = events.next(Duration::from_millis(500)).await.unwrap();
        assert!(!probe.is_idle(), "held key keeps the decoder busy");

        handle.release();
        sleep(Duration::from_millis(200)).await;
        assert!(probe.is_idle());
    }
}
