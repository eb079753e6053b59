//! HF RFID reader/writer driver (TR3 series) with support for multiple transport backends.
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use hf_rfid::{HfRfid, SerialTransport};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", 19200)?;
//! let mut rfid = HfRfid::new(transport).with_log_sink(|line: &str| println!("{}", line));
//!
//! println!("ROM version: {}", rfid.read_rom_version()?);
//!
//! let mode = rfid.read_mode()?;
//! if !mode.is_command_mode() {
//!     rfid.switch_to_command_mode(&mode.raw)?;
//! }
//!
//! let result = rfid.inventory()?;
//! for item in &result.items {
//!     println!("Found tag: {}", item);
//! }
//! ```

mod frame;
mod mode;
mod reader;
mod reassembler;
mod session;
mod trace;
mod transport;
mod types;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use frame::{
    ADDR_DEFAULT, CMD_ACK, CMD_BUZZER, CMD_INVENTORY, CMD_MODE_READ, CMD_MODE_WRITE, CMD_NACK,
    CMD_ROM_VERSION, CR, DETAIL_INVENTORY_UID, DETAIL_MODE_READ, DETAIL_ROM_VERSION, ETX, Frame,
    FrameWalk, NackReason, RSP_UID, STX, checksum, decode_nack, last_frame, verify_frame,
};
pub use mode::{ReaderMode, ReaderModePretty, ReaderModeRaw};
pub use reader::HfRfid;
pub use reassembler::StreamReassembler;
pub use session::{Session, SessionError, TaskHandle};
pub use trace::{LogSink, TraceTag, format_line};
pub use transport::RfidTransport;
pub use types::{
    HfError, InventoryError, InventoryItem, InventoryResult, ReaderConfig, Result, SoundType,
    to_hex_string,
};

#[cfg(feature = "uart-esp32")]
pub use uart::UartTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
