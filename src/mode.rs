//! Reader operating mode: raw bytes and their readable form.

/// Data section of a mode-read response, kept verbatim.
///
/// Layout: `[mode, reserved, flags, speed, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderModeRaw {
    pub bytes: Vec<u8>,
}

impl ReaderModeRaw {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// True when the four bytes every decoder relies on are present.
    pub fn is_complete(&self) -> bool {
        self.bytes.len() >= 4
    }

    pub fn mode_byte(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn flags(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }
}

/// Readable fields derived from [`ReaderModeRaw`]; all empty when the raw data is short.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderModePretty {
    pub mode: String,
    pub anticollision: String,
    pub read_behavior: String,
    pub buzzer: String,
    pub tx_data: String,
    pub baud: String,
}

const FLAG_ANTICOLLISION: u8 = 1 << 2;
const FLAG_CONTINUOUS_READ: u8 = 1 << 3;
const FLAG_BUZZER: u8 = 1 << 4;
const FLAG_TX_WITH_UID: u8 = 1 << 5;

pub const MODE_COMMAND: u8 = 0x00;

fn mode_name(mode: u8) -> String {
    let name = match mode {
        MODE_COMMAND => "command mode",
        0x01 => "auto-scan mode",
        0x02 => "trigger mode",
        0x03 => "polling mode",
        0x24 => "EAS mode",
        0x50 => "continuous inventory mode",
        0x58 => "RDLOOP mode",
        0x59 => "RDLOOP mode (running)",
        0x63 => "EPC inventory mode",
        0x64 => "EPC inventory read mode",
        other => return format!("unknown (0x{:02X})", other),
    };
    name.to_string()
}

fn baud_name(speed: u8) -> &'static str {
    match (speed >> 6) & 0b11 {
        0b00 => "19200bps",
        0b01 => "9600bps",
        0b10 => "38400bps",
        _ => "115200bps",
    }
}

fn pick(flags: u8, mask: u8, set: &str, clear: &str) -> String {
    let text = if flags & mask != 0 { set } else { clear };
    text.to_string()
}

impl ReaderModePretty {
    pub fn from_raw(raw: &ReaderModeRaw) -> Self {
        if !raw.is_complete() {
            return Self::default();
        }
        let mode = raw.bytes[0];
        let flags = raw.bytes[2];
        let speed = raw.bytes[3];

        Self {
            mode: mode_name(mode),
            anticollision: pick(flags, FLAG_ANTICOLLISION, "enabled", "disabled"),
            read_behavior: pick(flags, FLAG_CONTINUOUS_READ, "continuous read", "single read"),
            buzzer: pick(flags, FLAG_BUZZER, "on", "off"),
            tx_data: pick(flags, FLAG_TX_WITH_UID, "user data + UID", "user data only"),
            baud: baud_name(speed).to_string(),
        }
    }
}

/// A mode read: the raw bytes plus what they mean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderMode {
    pub raw: ReaderModeRaw,
    pub pretty: ReaderModePretty,
}

impl ReaderMode {
    pub fn from_raw(raw: ReaderModeRaw) -> Self {
        let pretty = ReaderModePretty::from_raw(&raw);
        Self { raw, pretty }
    }

    pub fn is_command_mode(&self) -> bool {
        self.raw.mode_byte() == Some(MODE_COMMAND)
    }
}
