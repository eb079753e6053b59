//! UART transport for ESP32 using esp-idf-svc

use crate::transport::RfidTransport;
use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};
use std::time::Duration;

/// A TR3 reader wired to an ESP32 UART (8N1).
pub struct UartTransport<'a> {
    uart: UartDriver<'a>,
}

impl<'a> UartTransport<'a> {
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        baud_rate: u32,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let config = uart::config::Config::default()
            .baudrate(baud_rate.into())
            .data_bits(uart::config::DataBits::DataBits8)
            .parity_none()
            .stop_bits(uart::config::StopBits::STOP1);
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &config,
        )?;

        uart.clear_rx()?;

        Ok(Self { uart })
    }
}

impl RfidTransport for UartTransport<'_> {
    type Error = esp_idf_svc::sys::EspError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(data)
    }

    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        let mut byte = [0u8; 1];
        let ticks = TickType::from(Duration::from_millis(u64::from(timeout_ms))).ticks();
        match self.uart.read(&mut byte, ticks)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.uart.clear_rx()
    }
}
