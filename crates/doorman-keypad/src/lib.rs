//! Matrix keypad acquisition for the doorman terminal.
//!
//! This crate models a 4x4 scanned keypad the way the firmware drives it:
//! row lines are inputs with pull-ups, column lines are outputs held low,
//! and a falling row edge wakes the decoder from idle. From that point the
//! decoder runs a short polled state machine (debounce, column scan, press
//! tracking, release debounce) and emits at most one [`KeyEvent`] per
//! physical press.
//!
//! The hardware seam is the [`KeypadMatrix`] trait. [`mock::MockMatrix`]
//! implements it in-process so the decoder can be exercised in tests and in
//! the interactive terminal without GPIO.

pub mod decoder;
pub mod matrix;
pub mod mock;

pub use decoder::{DecoderConfig, DecoderState, IdleProbe, KeyEvent, KeyEvents, KeypadDecoder};
pub use matrix::{KeypadMatrix, RowEdge};
pub use mock::{MockMatrix, MockMatrixHandle};
