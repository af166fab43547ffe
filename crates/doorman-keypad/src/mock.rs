//! Mock keypad matrix for testing and the interactive terminal.
//!
//! Simulates the electrical behavior of a 4x4 matrix: the handle presses
//! and releases keys, the matrix side answers row samples and column
//! drives exactly as real pull-up wiring would. A press also latches a row
//! edge into a single-slot channel, standing in for the GPIO interrupt.

use std::sync::{Arc, Mutex};

use doorman_core::{
    Error, Result,
    constants::{KEYMAP, KEYPAD_COLS, KEYPAD_ROWS},
};
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, sleep},
};

use crate::matrix::{KeypadMatrix, RowEdge};

/// Shared electrical state of the simulated matrix.
#[derive(Debug, Default)]
struct MatrixState {
    /// Currently pressed key position, if any. One key at a time.
    pressed: Option<(usize, usize)>,

    /// Column drive levels. All low at rest.
    columns: [bool; KEYPAD_COLS],
}

/// Simulated keypad matrix, decoder side.
///
/// Created together with a [`MockMatrixHandle`] via [`MockMatrix::new`].
/// The matrix half is handed to the decoder; the handle half stays with
/// the test or the stdin bridge and injects presses.
#[derive(Debug)]
pub struct MockMatrix {
    edge_rx: mpsc::Receiver<RowEdge>,
    state: Arc<Mutex<MatrixState>>,
}

/// Control handle for a [`MockMatrix`].
#[derive(Debug, Clone)]
pub struct MockMatrixHandle {
    edge_tx: mpsc::Sender<RowEdge>,
    state: Arc<Mutex<MatrixState>>,
}

impl MockMatrix {
    /// Create a simulated matrix and its control handle.
    ///
    /// The edge channel has capacity one, matching an interrupt flag: a
    /// press that lands while an edge is already pending is simply not
    /// latched again.
    pub fn new() -> (Self, MockMatrixHandle) {
        let (edge_tx, edge_rx) = mpsc::channel(1);
        let state = Arc::new(Mutex::new(MatrixState::default()));

        let matrix = Self {
            edge_rx,
            state: Arc::clone(&state),
        };
        let handle = MockMatrixHandle { edge_tx, state };

        (matrix, handle)
    }
}

impl KeypadMatrix for MockMatrix {
    async fn row_edge(&mut self) -> Result<RowEdge> {
        self.edge_rx
            .recv()
            .await
            .ok_or(Error::ChannelClosed("keypad edge"))
    }

    fn clear_pending_edge(&mut self) {
        while self.edge_rx.try_recv().is_ok() {}
    }

    fn read_row(&self, row: usize) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.pressed {
            // A pressed key ties its row to its column: the row follows
            // whatever level the column is driven to.
            Some((r, c)) if r == row => state.columns[c],
            // No contact on this row, the pull-up wins.
            _ => true,
        }
    }

    fn drive_column(&mut self, col: usize, high: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if col < KEYPAD_COLS {
            state.columns[col] = high;
        }
    }
}

impl MockMatrixHandle {
    /// Press a key by its legend character.
    ///
    /// Latches a row edge unless one is already pending. The key stays
    /// pressed until [`release`](Self::release) is called.
    pub fn press(&self, key: char) -> Result<()> {
        let (row, col) = position_of(key)?;
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.pressed = Some((row, col));
        }
        // Single-slot latch, drop on full like a masked interrupt.
        let _ = self.edge_tx.try_send(RowEdge {
            row,
            at: Instant::now(),
        });
        Ok(())
    }

    /// Release whatever key is currently pressed.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pressed = None;
    }

    /// Press a key, hold it for `hold`, then release it.
    pub async fn tap(&self, key: char, hold: Duration) -> Result<()> {
        self.press(key)?;
        sleep(hold).await;
        self.release();
        Ok(())
    }
}

/// Locate a legend character on the keymap.
fn position_of(key: char) -> Result<(usize, usize)> {
    for (row, legends) in KEYMAP.iter().enumerate().take(KEYPAD_ROWS) {
        for (col, legend) in legends.iter().enumerate() {
            if *legend == key {
                return Ok((row, col));
            }
        }
    }
    Err(Error::InvalidKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_of_maps_corners() {
        assert_eq!(position_of('1').unwrap(), (0, 0));
        assert_eq!(position_of('A').unwrap(), (0, 3));
        assert_eq!(position_of('*').unwrap(), (3, 0));
        assert_eq!(position_of('D').unwrap(), (3, 3));
    }

    #[test]
    fn position_of_rejects_unknown_legend() {
        assert!(matches!(position_of('x'), Err(Error::InvalidKey('x'))));
    }

    #[tokio::test]
    async fn pressed_row_reads_low_until_its_column_is_driven() {
        let (mut matrix, handle) = MockMatrix::new();

        // Quiet matrix: every row idles high.
        for row in 0..KEYPAD_ROWS {
            assert!(matrix.read_row(row));
        }

        handle.press('5').unwrap(); // row 1, column 1
        assert!(!matrix.read_row(1));
        assert!(matrix.read_row(0));

        matrix.drive_column(0, true);
        assert!(!matrix.read_row(1), "wrong column must not lift the row");
        matrix.drive_column(0, false);

        matrix.drive_column(1, true);
        assert!(matrix.read_row(1), "own column high lifts the row");
        matrix.drive_column(1, false);

        handle.release();
        assert!(matrix.read_row(1));
    }

    #[tokio::test]
    async fn edge_latch_holds_a_single_edge() {
        let (mut matrix, handle) = MockMatrix::new();

        handle.press('7').unwrap();
        handle.release();
        handle.press('8').unwrap(); // slot already full, dropped

        let edge = matrix.row_edge().await.unwrap();
        assert_eq!(edge.row, 2);
        matrix.clear_pending_edge();

        handle.release();
        handle.press('0').unwrap();
        let edge = matrix.row_edge().await.unwrap();
        assert_eq!(edge.row, 3);
    }
}
