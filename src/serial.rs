//! Serial port transport for desktop using serialport crate

use crate::transport::RfidTransport;
use log::warn;
use std::io::{self, ErrorKind};
use std::time::Duration;

/// A TR3 reader on a (USB virtual) COM port, 8N1 without flow control.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn serialport::SerialPort>>,
    last_error: String,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate` and clear both directions of the port buffer.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let mut transport = Self {
            port_name: port_name.to_string(),
            baud_rate,
            port: None,
            last_error: String::new(),
        };
        transport.reopen()?;
        Ok(transport)
    }

    /// Close any existing handle and open the port again with the stored settings.
    pub fn reopen(&mut self) -> Result<(), serialport::Error> {
        self.close();
        let port = serialport::new(self.port_name.clone(), self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open()
            .inspect_err(|e| self.last_error = e.to_string())?;
        port.clear(serialport::ClearBuffer::All)
            .inspect_err(|e| self.last_error = e.to_string())?;
        self.port = Some(port);
        Ok(())
    }

    pub fn close(&mut self) {
        self.port = None;
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Text of the most recent transport failure, empty if none occurred.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Names of the serial ports present on this machine.
    pub fn available_ports() -> Result<Vec<String>, serialport::Error> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        if self.port.is_none() {
            self.last_error = "serial port is not open".into();
        }
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "serial port is not open"))
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            self.last_error = e.to_string();
        }
        result
    }
}

impl RfidTransport for SerialTransport {
    type Error = io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let result = self.port_mut().and_then(|port| {
            io::Write::write_all(port, data)?;
            io::Write::flush(port)?;
            Ok(data.len())
        });
        self.record(result)
    }

    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        let result = self.port_mut().and_then(|port| {
            port.set_timeout(Duration::from_millis(u64::from(timeout_ms)))
                .map_err(io::Error::other)?;
            let mut byte = [0u8; 1];
            match io::Read::read(port, &mut byte) {
                Ok(1) => Ok(Some(byte[0])),
                Ok(_) => Ok(None),
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
                Err(e) => Err(e),
            }
        });
        if let Err(e) = &result {
            warn!("Serial read failed on {}: {}", self.port_name, e);
        }
        self.record(result)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        let result = self.port_mut().and_then(|port| {
            port.clear(serialport::ClearBuffer::Input)
                .map_err(io::Error::other)
        });
        self.record(result)
    }
}
