use crate::{
    Result,
    constants::{KEYMAP, PIN_LENGTH, USER_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// User identifier (6 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new user id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUserId` if the value is not exactly 6 ASCII
    /// digits.
    pub fn new(id: &str) -> Result<Self> {
        if id.len() != USER_ID_LENGTH || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidUserId(format!(
                "expected {USER_ID_LENGTH} digits, got {id:?}"
            )));
        }
        Ok(UserId(id.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UserId::new(s)
    }
}

/// PIN code (4 digits).
///
/// # Security
/// This type implements constant-time comparison to prevent timing attacks
/// when verifying PINs during authentication. Comparing against input of a
/// different length yields `false` without revealing where they differ.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Pin(String);

impl Pin {
    /// Create a new PIN with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPin` if the value is not exactly 4 ASCII
    /// digits.
    pub fn new(pin: &str) -> Result<Self> {
        if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPin(format!(
                "expected {PIN_LENGTH} digits"
            )));
        }
        Ok(Pin(pin.to_string()))
    }

    /// Compare this PIN against raw keyed-in digits in constant time.
    ///
    /// The input may be shorter or longer than a valid PIN (partial entry
    /// confirmed early); such input never matches.
    #[must_use]
    pub fn matches(&self, entered: &str) -> bool {
        if self.0.len() != entered.len() {
            return false;
        }
        self.0.as_bytes().ct_eq(entered.as_bytes()).into()
    }

    /// Get the PIN digits. Intended for the store's own bookkeeping, not
    /// for comparison; use [`matches`](Pin::matches) to verify input.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Constant-time comparison implementation for Pin.
impl PartialEq for Pin {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for Pin {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::str::FromStr for Pin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Pin::new(s)
    }
}

/// A key on the 4x4 matrix keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Star key (`*`). Cancels the current entry at any point.
    Star,

    /// Hash key (`#`). Confirms the current entry.
    Hash,

    /// Function key (A-D). Present on the matrix but unused by the
    /// access-control protocol.
    Letter(char),
}

impl Key {
    /// Create a digit key.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` if the digit is greater than 9.
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(Error::InvalidKey((b'0' + d.min(9)) as char));
        }
        Ok(Self::Digit(d))
    }

    /// Map a keypad character to a key.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` for characters outside the 4x4 layout.
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '0'..='9' => Ok(Self::Digit(c as u8 - b'0')),
            '*' => Ok(Self::Star),
            '#' => Ok(Self::Hash),
            'A'..='D' => Ok(Self::Letter(c)),
            _ => Err(Error::InvalidKey(c)),
        }
    }

    /// Look up the key at a matrix position.
    ///
    /// # Errors
    /// Returns `Error::InvalidRow` / `Error::InvalidColumn` when the
    /// indices fall outside the 4x4 matrix.
    pub fn from_position(row: usize, col: usize) -> Result<Self> {
        let row_keys = KEYMAP.get(row).ok_or(Error::InvalidRow(row))?;
        let c = row_keys.get(col).ok_or(Error::InvalidColumn(col))?;
        Self::from_char(*c)
    }

    /// The character this key produces.
    #[must_use]
    pub fn to_char(self) -> char {
        match self {
            Self::Digit(d) => (b'0' + d) as char,
            Self::Star => '*',
            Self::Hash => '#',
            Self::Letter(c) => c,
        }
    }

    /// Returns `true` if this key is a digit.
    #[must_use]
    pub fn is_digit(self) -> bool {
        matches!(self, Self::Digit(_))
    }

    /// Get the digit value if this is a digit key.
    #[must_use]
    pub fn as_digit(self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(d),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}
