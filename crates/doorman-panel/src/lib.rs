//! Signal panels for the doorman terminal.
//!
//! Two independent output collaborators, each a queue-fed task the session
//! talks to through a cloneable handle:
//!
//! - [`led`]: the three status LEDs (green, red, amber) with timed signals
//!   and a 0.5 Hz amber blink.
//! - [`display`]: a 2x16 character panel with canned prompts, a simulated
//!   standby clock, and temporary messages that revert to standby.
//!
//! Both panels keep running when their queue briefly overflows; a dropped
//! frame is logged, never fatal.

pub mod display;
pub mod led;

pub use display::{DisplayHandle, DisplayMessage, DisplayPanel, DisplayRequest, DisplaySnapshot};
pub use led::{LedCommand, LedHandle, LedMode, LedPanel, LedRequest, LedSnapshot};
