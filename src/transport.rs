/// Trait for RFID reader communication backends.
/// Implement this trait for different transports (UART, serial port, etc.)
///
/// Opening and closing the link belong to the backend's constructor and
/// `Drop`; the protocol engine only writes frames and polls single bytes.
pub trait RfidTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read one byte, waiting at most `timeout_ms` milliseconds.
    ///
    /// `Ok(None)` means no byte arrived in time; that is not an error.
    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;
}
