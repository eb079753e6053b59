//! Types for RFID operations

use std::fmt;
use std::time::Duration;

use crate::frame::NackReason;

/// A tag found by an inventory round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    /// UID in display order (most significant byte first)
    pub uid: [u8; 8],
    /// Data Storage Format Identifier
    pub dsfid: u8,
}

impl InventoryItem {
    /// Build an item from the UID bytes as they appear on the wire (LSB first).
    pub fn from_wire(dsfid: u8, uid_lsb_first: [u8; 8]) -> Self {
        let mut uid = uid_lsb_first;
        uid.reverse();
        Self { uid, dsfid }
    }

    pub fn uid_hex(&self) -> String {
        to_hex_string(&self.uid)
    }
}

impl fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (DSFID {:02X})", self.uid_hex(), self.dsfid)
    }
}

/// Why an inventory round produced no usable result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The reader answered with a NACK
    Nack(NackReason),
    /// The deadline passed without a single tag record
    NoTags,
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::Nack(reason) => write!(f, "{}", reason),
            InventoryError::NoTags => f.write_str("no UID received (timeout or no tag in field)"),
        }
    }
}

/// Outcome of one inventory round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryResult {
    pub items: Vec<InventoryItem>,
    /// Tag count announced by the reader, -1 until it has been announced
    pub expected_count: i32,
    pub error: Option<InventoryError>,
}

impl Default for InventoryResult {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            expected_count: -1,
            error: None,
        }
    }
}

impl InventoryResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.items.is_empty()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Buzzer sound pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundType {
    /// One long beep, used for a successful read
    Beep,
    /// Three short beeps, used for a failed read
    TripleBeep,
    Other(u8),
}

impl SoundType {
    pub fn code(self) -> u8 {
        match self {
            SoundType::Beep => 0x00,
            SoundType::TripleBeep => 0x01,
            SoundType::Other(code) => code,
        }
    }
}

impl From<u8> for SoundType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => SoundType::Beep,
            0x01 => SoundType::TripleBeep,
            other => SoundType::Other(other),
        }
    }
}

impl fmt::Display for SoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundType::Beep => f.write_str("beep"),
            SoundType::TripleBeep => f.write_str("beep-beep-beep"),
            SoundType::Other(code) => write!(f, "type=0x{:02X}", code),
        }
    }
}

/// Addressing and timing parameters for one reader connection.
///
/// The per-byte poll timeout and the inventory quiet period are tuned to
/// the TR3 turnaround time; change them only after checking on hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Device address placed in every request frame
    pub address: u8,
    /// Timeout for a single byte poll
    pub byte_timeout: Duration,
    /// Sleep after a poll that returned no data
    pub idle_backoff: Duration,
    /// Silence after the last byte that ends an inventory with at least one tag
    pub quiet_period: Duration,
    /// Overall budget for single-response commands
    pub command_timeout: Duration,
    /// Overall budget for one inventory round
    pub inventory_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            address: 0x00,
            byte_timeout: Duration::from_millis(10),
            idle_backoff: Duration::from_millis(1),
            quiet_period: Duration::from_millis(120),
            command_timeout: Duration::from_millis(600),
            inventory_timeout: Duration::from_millis(2000),
        }
    }
}

impl ReaderConfig {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_byte_timeout(mut self, timeout: Duration) -> Self {
        self.byte_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet_period = quiet;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_inventory_timeout(mut self, timeout: Duration) -> Self {
        self.inventory_timeout = timeout;
        self
    }

    pub(crate) fn byte_timeout_ms(&self) -> u32 {
        u32::try_from(self.byte_timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Errors that can occur during RFID operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HfError {
    /// Transport layer error (UART, serial, etc.)
    #[error("transport error: {0}")]
    Transport(String),
    /// No frame arrived within the operation's budget
    #[error("timeout waiting for response")]
    Timeout,
    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Invalid response received from the reader
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The reader rejected the command
    #[error("NACK: {0}")]
    Nack(NackReason),
    /// A local precondition failed; nothing was sent to the reader
    #[error("precondition failed: {0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, HfError>;

/// Convert bytes to space separated uppercase hex, e.g. `02 00 4F`
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
