use log::{debug, error, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::frame::{
    CMD_ACK, CMD_BUZZER, CMD_INVENTORY, CMD_MODE_READ, CMD_MODE_WRITE, CMD_NACK, CMD_ROM_VERSION,
    DETAIL_INVENTORY_UID, DETAIL_MODE_READ, DETAIL_ROM_VERSION, Frame, RSP_UID, decode_nack,
    last_frame,
};
use crate::mode::{MODE_COMMAND, ReaderMode, ReaderModeRaw};
use crate::reassembler::StreamReassembler;
use crate::trace::{LogSink, Tracer};
use crate::transport::RfidTransport;
use crate::types::{
    HfError, InventoryError, InventoryItem, InventoryResult, ReaderConfig, Result, SoundType,
    to_hex_string,
};

pub struct HfRfid<T: RfidTransport> {
    transport: T,
    config: ReaderConfig,
    tracer: Tracer,
}

impl<T: RfidTransport> HfRfid<T> {
    /// Inventory2 parameters: UID-only detail, then the two option bytes the reader expects
    const INVENTORY_PARAMS: [u8; 3] = [DETAIL_INVENTORY_UID, 0x40, 0x01];
    /// Mode write detail: apply to RAM only
    const MODE_TARGET_RAM: u8 = 0x00;
    /// Response-type byte sent with every buzzer request
    pub const BUZZER_RESPONSE_TYPE: u8 = 0x01;
    pub const MAX_INVENTORY_ROUNDS: u32 = 1_000_000;

    /// Create a new RFID reader instance with the given transport
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReaderConfig::default())
    }

    pub fn with_config(transport: T, config: ReaderConfig) -> Self {
        Self {
            transport,
            config,
            tracer: Tracer::default(),
        }
    }

    /// Attach the sink that receives every `send`/`recv`/`cmt` trace line.
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.tracer.set_sink(Arc::new(sink));
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Get the ROM (firmware) version, formatted `major.minor suffix` when long enough
    pub fn read_rom_version(&mut self) -> Result<String> {
        self.tracer.comment("/* read ROM version */");
        let frame = self.request(CMD_ROM_VERSION, &[DETAIL_ROM_VERSION])?;
        self.check_ack(&frame, Some(DETAIL_ROM_VERSION), "ROM version")?;

        let version = Self::parse_rom_version(&frame.payload()[1..]);
        self.tracer.comment(&format!("ROM version : {}", version));
        Ok(version)
    }

    /// Read the reader's operating mode.
    ///
    /// The returned [`ReaderMode`] is what [`HfRfid::write_mode_to_command`]
    /// needs; carry it forward rather than re-reading.
    pub fn read_mode(&mut self) -> Result<ReaderMode> {
        self.tracer.comment("/* read reader operating mode */");
        let frame = self.request(CMD_MODE_READ, &[DETAIL_MODE_READ])?;
        self.check_ack(&frame, Some(DETAIL_MODE_READ), "mode read")?;

        let mode = ReaderMode::from_raw(ReaderModeRaw::new(frame.payload()[1..].to_vec()));
        let pretty = &mode.pretty;
        for (label, value) in [
            ("operating mode", &pretty.mode),
            ("anticollision ", &pretty.anticollision),
            ("read behavior ", &pretty.read_behavior),
            ("buzzer        ", &pretty.buzzer),
            ("tx data       ", &pretty.tx_data),
            ("baud rate     ", &pretty.baud),
        ] {
            self.tracer.comment(&format!("{} : {}", label, value));
        }
        Ok(mode)
    }

    /// Put the reader into command mode, keeping the flags of `current`.
    ///
    /// `current` must come from a successful [`HfRfid::read_mode`]; a short
    /// raw mode fails with [`HfError::Precondition`] before anything is sent.
    pub fn write_mode_to_command(&mut self, current: &ReaderModeRaw) -> Result<()> {
        if !current.is_complete() {
            let msg = format!(
                "current mode data too short ({} bytes, need 4); read the mode first",
                current.bytes.len()
            );
            self.tracer.comment(&msg);
            return Err(HfError::Precondition(msg));
        }
        let flags = current.bytes[2];

        self.tracer
            .comment("/* switch to command mode (other settings unchanged) */");
        let payload = [
            Self::MODE_TARGET_RAM,
            MODE_COMMAND,
            0x00, // reserved
            flags,
            0x00, // reserved
            0x00, // polling interval MSB
            0x00, // polling interval LSB
        ];
        let frame = self.request(CMD_MODE_WRITE, &payload)?;
        self.check_ack(&frame, None, "mode write")
    }

    /// Write command mode, then read the mode back so the caller holds the new state
    pub fn switch_to_command_mode(&mut self, current: &ReaderModeRaw) -> Result<ReaderMode> {
        self.write_mode_to_command(current)?;
        self.read_mode()
    }

    /// Sound the buzzer
    pub fn buzzer(&mut self, response_type: u8, sound: SoundType) -> Result<()> {
        self.tracer.comment(&format!("/* buzzer: {} */", sound));
        let frame = self.request(CMD_BUZZER, &[response_type, sound.code()])?;
        self.check_ack(&frame, None, "buzzer")
    }

    /// One beep when tags were read, three when the round failed or found nothing
    pub fn signal_inventory_outcome(&mut self, result: &InventoryResult) -> Result<()> {
        let sound = if result.is_success() {
            SoundType::Beep
        } else {
            SoundType::TripleBeep
        };
        self.buzzer(Self::BUZZER_RESPONSE_TYPE, sound)
    }

    /// Run one UID-only inventory round with the configured budget
    pub fn inventory(&mut self) -> Result<InventoryResult> {
        self.inventory_with_timeout(self.config.inventory_timeout)
    }

    /// Run one UID-only inventory round.
    ///
    /// Collection ends when the announced tag count is reached, when the line
    /// stays quiet for [`ReaderConfig::quiet_period`] after at least one UID,
    /// or at `timeout`. A NACK ends it at once. Device-side failures land in
    /// [`InventoryResult::error`]; only transport failures are returned as `Err`.
    pub fn inventory_with_timeout(&mut self, timeout: Duration) -> Result<InventoryResult> {
        let mut result = InventoryResult::default();
        self.tracer.comment("/* Inventory2 */");

        let tx = Frame::build(self.config.address, CMD_INVENTORY, &Self::INVENTORY_PARAMS)?;
        self.send(tx.as_bytes())?;

        let deadline = deadline_after(timeout);
        let mut last_rx = Instant::now();
        let mut reassembler = StreamReassembler::new();

        'collect: while before(deadline) {
            let Some(byte) = self.poll_byte()? else {
                if self.quiet_period_elapsed(&result, last_rx) {
                    break;
                }
                continue;
            };
            last_rx = Instant::now();
            reassembler.push(byte);

            while let Some(frame) = reassembler.next_frame() {
                self.tracer.recv(frame.as_bytes());
                let payload = frame.payload();

                match frame.command() {
                    CMD_ACK if frame.detail() == Some(DETAIL_INVENTORY_UID) => {
                        if let Some(&count) = payload.get(1) {
                            result.expected_count = i32::from(count);
                            self.tracer.comment(&format!("UID count : {}", count));
                        }
                    }
                    RSP_UID if payload.len() >= 9 => {
                        let mut uid = [0u8; 8];
                        uid.copy_from_slice(&payload[1..9]);
                        let item = InventoryItem::from_wire(payload[0], uid);
                        self.tracer.comment(&format!("DSFID : {:02X}", item.dsfid));
                        self.tracer.comment(&format!("UID   : {}", item.uid_hex()));
                        result.items.push(item);
                    }
                    CMD_NACK => {
                        let reason = decode_nack(frame.as_bytes());
                        self.tracer.comment(&format!("NACK: {}", reason));
                        result.error = Some(InventoryError::Nack(reason));
                        return Ok(result);
                    }
                    other => debug!("Ignoring frame 0x{:02X} during inventory", other),
                }

                if Self::expected_count_reached(&result)
                    || self.quiet_period_elapsed(&result, last_rx)
                {
                    break 'collect;
                }
            }
        }

        if result.items.is_empty() && result.error.is_none() {
            let error = InventoryError::NoTags;
            self.tracer.comment(&error.to_string());
            result.error = Some(error);
        } else {
            self.tracer
                .comment(&format!("UIDs read : {}", result.items.len()));
        }
        Ok(result)
    }

    /// Repeat inventory `rounds` times (clamped to 1..=1,000,000), sounding the
    /// buzzer after each round and pausing `pause` between rounds.
    ///
    /// A buzzer failure is logged and does not stop the rounds.
    pub fn inventory_rounds(&mut self, rounds: u32, pause: Duration) -> Result<Vec<InventoryResult>> {
        let rounds = rounds.clamp(1, Self::MAX_INVENTORY_ROUNDS);
        let mut results = Vec::with_capacity(rounds.min(1024) as usize);

        for round in 1..=rounds {
            if rounds > 1 {
                self.tracer
                    .comment(&format!("--- inventory round {} / {} ---", round, rounds));
            }
            let result = self.inventory()?;
            match &result.error {
                Some(error) => self.tracer.comment(&format!("NACK/error: {}", error)),
                None => {
                    for (index, item) in result.items.iter().enumerate() {
                        self.tracer.comment(&format!("  [{}] {}", index, item.uid_hex()));
                    }
                }
            }
            if let Err(e) = self.signal_inventory_outcome(&result) {
                warn!("Buzzer after inventory round {} failed: {}", round, e);
            }
            results.push(result);

            if round < rounds {
                std::thread::sleep(pause);
            }
        }
        Ok(results)
    }

    /// Send `command` and collect every valid frame until `timeout`.
    ///
    /// With `stop_on_terminal`, returns as soon as an ACK or NACK frame is
    /// complete. On timeout the frames gathered so far are returned, possibly
    /// none; that is not an error here, callers decide what an empty answer means.
    pub fn transact(&mut self, command: &[u8], timeout: Duration, stop_on_terminal: bool) -> Result<Vec<u8>> {
        self.send(command)?;

        let deadline = deadline_after(timeout);
        let mut reassembler = StreamReassembler::new();
        let mut out = Vec::new();

        while before(deadline) {
            let Some(byte) = self.poll_byte()? else {
                continue;
            };
            reassembler.push(byte);

            while let Some(frame) = reassembler.next_frame() {
                self.tracer.recv(frame.as_bytes());
                out.extend_from_slice(frame.as_bytes());
                if stop_on_terminal && frame.is_terminal() {
                    return Ok(out);
                }
            }
        }

        self.tracer
            .comment("timeout: no response received within the time limit");
        Ok(out)
    }

    /// Drop whatever the device sent before now. Call once after connecting;
    /// requests themselves never flush the line.
    pub fn discard_input(&mut self) -> Result<()> {
        match self.transport.clear_input() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.transport_error("clear input", format!("{:?}", e))),
        }
    }

    /// Build, transact, and return the last frame of the answer.
    fn request(&mut self, command: u8, payload: &[u8]) -> Result<Frame> {
        let tx = Frame::build(self.config.address, command, payload)?;
        let rx = self.transact(tx.as_bytes(), self.config.command_timeout, true)?;
        if rx.is_empty() {
            return Err(HfError::Timeout);
        }
        match last_frame(&rx).and_then(Frame::parse) {
            Some(frame) => Ok(frame),
            None => {
                let msg = format!("no valid frame in response: {}", to_hex_string(&rx));
                self.tracer.comment(&msg);
                Err(HfError::InvalidResponse(msg))
            }
        }
    }

    /// NACK becomes [`HfError::Nack`]; anything but an ACK (with `detail`, if given) is invalid.
    fn check_ack(&self, frame: &Frame, detail: Option<u8>, what: &str) -> Result<()> {
        if frame.is_nack() {
            let reason = decode_nack(frame.as_bytes());
            self.tracer.comment(&format!("NACK: {}", reason));
            return Err(HfError::Nack(reason));
        }
        if !frame.is_ack() {
            let msg = format!("{}: unexpected response command 0x{:02X}", what, frame.command());
            self.tracer.comment(&msg);
            return Err(HfError::InvalidResponse(msg));
        }
        match detail {
            Some(expected) if frame.detail() != Some(expected) => {
                let msg = format!(
                    "{}: expected detail 0x{:02X}, got {:02X?}",
                    what,
                    expected,
                    frame.detail()
                );
                self.tracer.comment(&msg);
                Err(HfError::InvalidResponse(msg))
            }
            _ => Ok(()),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.tracer.send(frame);
        match self.transport.write(frame) {
            Ok(written) if written == frame.len() => Ok(()),
            Ok(written) => Err(self.transport_error(
                "send",
                format!("short write: {} of {} bytes", written, frame.len()),
            )),
            Err(e) => Err(self.transport_error("send", format!("{:?}", e))),
        }
    }

    /// Poll one byte; sleeps the idle backoff when nothing arrived.
    fn poll_byte(&mut self) -> Result<Option<u8>> {
        match self.transport.read_byte(self.config.byte_timeout_ms()) {
            Ok(Some(byte)) => Ok(Some(byte)),
            Ok(None) => {
                std::thread::sleep(self.config.idle_backoff);
                Ok(None)
            }
            Err(e) => Err(self.transport_error("receive", format!("{:?}", e))),
        }
    }

    fn transport_error(&self, action: &str, msg: String) -> HfError {
        error!("Transport {} failed: {}", action, msg);
        self.tracer.comment(&format!("{} error: {}", action, msg));
        HfError::Transport(msg)
    }

    fn expected_count_reached(result: &InventoryResult) -> bool {
        usize::try_from(result.expected_count).is_ok_and(|expected| result.items.len() >= expected)
    }

    fn quiet_period_elapsed(&self, result: &InventoryResult, last_rx: Instant) -> bool {
        !result.items.is_empty() && last_rx.elapsed() > self.config.quiet_period
    }

    /// Printable ASCII of the version data, reshaped `2034` -> `2.03 4`
    pub(crate) fn parse_rom_version(data: &[u8]) -> String {
        let ascii: String = data
            .iter()
            .filter(|b| (0x20..=0x7E).contains(*b))
            .map(|&b| b as char)
            .collect();
        if ascii.len() >= 4 {
            format!("{}.{} {}", &ascii[..1], &ascii[1..3], &ascii[3..])
        } else {
            ascii
        }
    }
}

/// `None` when `timeout` reaches past what `Instant` can hold: no deadline.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn before(deadline: Option<Instant>) -> bool {
    deadline.is_none_or(|deadline| Instant::now() < deadline)
}
