//! Access-control session for the doorman terminal.
//!
//! The session is the single source of truth for what the terminal is
//! doing: collecting an ID, collecting a password, showing a verdict, or
//! walking the password-change flow. It is split into three layers so the
//! protocol itself stays trivially testable:
//!
//! - [`session`]: a pure state machine. Feeding it a key returns the next
//!   state implicitly and an explicit list of [`session::Effect`]s; no
//!   timers, queues, or I/O are touched.
//! - [`deadline`]: the single outstanding deadline. Arming replaces any
//!   previous deadline and later posts exactly one event into the
//!   session's inbox.
//! - [`runner`]: the async task that polls the keypad, drains the inbox,
//!   and dispatches effects to the LED and display panels.

pub mod deadline;
pub mod runner;
pub mod session;
pub mod state;

pub use deadline::{DeadlineKind, DeadlineService, SessionEvent, SessionEventKind, SessionInbox};
pub use runner::SessionRunner;
pub use session::{DenialPolicy, Effect, Session};
pub use state::SessionState;
