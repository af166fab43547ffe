use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Credential errors
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Invalid PIN: {0}")]
    InvalidPin(String),

    // Keypad errors
    #[error("Invalid key: {0:?}")]
    InvalidKey(char),

    #[error("Keypad row index out of range: {0}")]
    InvalidRow(usize),

    #[error("Keypad column index out of range: {0}")]
    InvalidColumn(usize),

    // Channel errors
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    // Store errors
    #[error("Credential store is full (capacity {capacity})")]
    StoreFull { capacity: usize },

    // Display errors
    #[error("Display text too long: {len} chars (max {max})")]
    DisplayTextTooLong { len: usize, max: usize },

    #[error("Display text must be ASCII")]
    DisplayTextNotAscii,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
