//! Protocol constants for the doorman access-control terminal.
//!
//! Every fixed length, timing interval and queue capacity used by the
//! terminal is defined here. The values mirror the deployed firmware, so
//! changing them changes observable terminal behavior (deadlines, debounce
//! windows, lockout policy).
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use doorman_core::constants::{ENTRY_TIMEOUT, USER_ID_LENGTH};
//!
//! assert_eq!(USER_ID_LENGTH, 6);
//! assert_eq!(ENTRY_TIMEOUT, Duration::from_secs(10));
//! ```

use std::time::Duration;

// ============================================================================
// Credentials
// ============================================================================

/// Length of a user identifier, in digits.
pub const USER_ID_LENGTH: usize = 6;

/// Length of a PIN, in digits.
pub const PIN_LENGTH: usize = 4;

/// Consecutive failed attempts before an account is blocked permanently.
pub const MAX_FAILED_ATTEMPTS: u8 = 3;

/// Capacity of the credential store. Fixed at startup; the store never
/// grows past this at runtime.
pub const MAX_USERS: usize = 10;

// ============================================================================
// Session deadlines
// ============================================================================

/// Deadline for completing an entry step once started.
pub const ENTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the granted screen is held before auto-reverting to idle.
pub const GRANTED_HOLD: Duration = Duration::from_secs(5);

/// How long the denied screen is held before auto-reverting to idle.
pub const DENIED_HOLD: Duration = Duration::from_secs(3);

/// How long the timeout notice (red LED + TIMEOUT message) is held before
/// the session resets.
pub const TIMEOUT_HOLD: Duration = Duration::from_secs(2);

// ============================================================================
// Session loop pacing
// ============================================================================

/// Bounded wait for the next key event in the session loop.
pub const SESSION_KEY_WAIT: Duration = Duration::from_millis(100);

/// Pause at the end of each session loop iteration.
pub const SESSION_LOOP_PAUSE: Duration = Duration::from_millis(50);

// ============================================================================
// Keypad matrix
// ============================================================================

/// Number of interrupt-capable row lines.
pub const KEYPAD_ROWS: usize = 4;

/// Number of polled column lines.
pub const KEYPAD_COLS: usize = 4;

/// Row debounce window after an edge fires.
pub const ROW_DEBOUNCE: Duration = Duration::from_millis(30);

/// Stabilization interval after driving a column line, before sampling
/// the active row.
pub const COLUMN_SETTLE: Duration = Duration::from_millis(1);

/// Debounce window after a key release, before re-arming edge detection.
pub const RELEASE_DEBOUNCE: Duration = Duration::from_millis(20);

/// Pause between decoder polling steps while the state machine is active.
pub const DECODER_POLL: Duration = Duration::from_millis(5);

/// Character layout of the 4x4 matrix, indexed `[row][column]`.
pub const KEYMAP: [[char; KEYPAD_COLS]; KEYPAD_ROWS] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

// ============================================================================
// Queues
// ============================================================================

/// Capacity of the decoder -> session key-event queue.
pub const KEY_QUEUE_CAPACITY: usize = 10;

/// Capacity of the session's own event inbox (timeout/reset).
pub const SESSION_QUEUE_CAPACITY: usize = 5;

/// Capacity of the LED command queue.
pub const LED_QUEUE_CAPACITY: usize = 10;

/// Capacity of the display command queue.
pub const DISPLAY_QUEUE_CAPACITY: usize = 10;

// ============================================================================
// Panels
// ============================================================================

/// Half-period of the amber blink pattern (1 s on / 1 s off).
pub const BLINK_HALF_PERIOD: Duration = Duration::from_secs(1);

/// Green hold for the access-granted LED pattern.
pub const GRANTED_LED_HOLD: Duration = Duration::from_secs(5);

/// Red hold for the access-denied LED pattern.
pub const DENIED_LED_HOLD: Duration = Duration::from_secs(2);

/// Maximum length of a custom display message.
pub const MAX_CUSTOM_TEXT: usize = 31;

/// Display geometry: character columns per line.
pub const DISPLAY_COLUMNS: usize = 16;

/// Display geometry: text lines.
pub const DISPLAY_LINES: usize = 2;

/// Fixed date shown by the standby clock. The terminal has no RTC; the
/// time of day is simulated from elapsed runtime.
pub const STANDBY_DATE: &str = "27/07/25";
