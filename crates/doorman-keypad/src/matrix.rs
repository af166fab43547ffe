//! Electrical-level abstraction over the keypad matrix.
//!
//! The decoder never touches a concrete device. It sees four row lines it
//! can sample, four column lines it can drive, and an edge source that
//! resolves when a row falls while the matrix is otherwise quiet. All
//! methods use native `async fn` (Rust 1.90 + Edition 2024 RPITIT), so no
//! `async_trait` macro is needed.

#![allow(async_fn_in_trait)]

use doorman_core::Result;
use tokio::time::Instant;

/// A falling edge latched from a row line.
///
/// Carries the row index and the instant the edge was observed. The edge
/// source holds at most one pending edge; further edges are dropped until
/// the decoder consumes or clears the slot, mirroring an interrupt flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowEdge {
    /// Row line that fell (0-3).
    pub row: usize,

    /// When the edge was latched.
    pub at: Instant,
}

/// Contract between the keypad decoder and a matrix device.
///
/// Row lines idle high (pull-up) and read low while a key on that row is
/// pressed against a low column. Driving the pressed key's column high
/// pulls the row back up, which is how the column scan identifies the
/// column. Implementations must keep `read_row` cheap; the decoder samples
/// it on every poll tick.
pub trait KeypadMatrix: Send {
    /// Wait for the next latched row edge.
    ///
    /// Returns an error only when the edge source is gone for good, at
    /// which point the decoder shuts down.
    async fn row_edge(&mut self) -> Result<RowEdge>;

    /// Discard any edge latched while the decoder was busy scanning.
    ///
    /// Called whenever the decoder returns to idle so a press that arrived
    /// mid-scan cannot replay as a phantom edge.
    fn clear_pending_edge(&mut self);

    /// Sample a row line. `true` is the idle (pulled-up) level.
    fn read_row(&self, row: usize) -> bool;

    /// Drive a column line high or back to its resting low level.
    fn drive_column(&mut self, col: usize, high: bool);
}
