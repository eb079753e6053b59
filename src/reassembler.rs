//! Byte-stream reassembly with STX resynchronization.

use crate::frame::{Frame, HEADER_LEN, STX, frame_len};

/// Collects bytes from the wire and cuts validated frames out of them.
///
/// Leading noise is skipped up to the next STX. A candidate that fails
/// validation costs exactly its STX byte, after which scanning resumes, so a
/// corrupted frame never hides the frames behind it.
#[derive(Debug, Default, Clone)]
pub struct StreamReassembler {
    buffer: Vec<u8>,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Cut the next complete frame out of the buffer, if there is one.
    ///
    /// Call repeatedly until `None`: one pushed byte can complete more than
    /// one frame when a failed candidate had swallowed its successors.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            self.skip_to_stx();

            if self.buffer.len() < HEADER_LEN {
                return None;
            }
            let need = frame_len(self.buffer[3]);
            if self.buffer.len() < need {
                return None;
            }

            match Frame::parse(&self.buffer[..need]) {
                Some(frame) => {
                    self.buffer.drain(..need);
                    return Some(frame);
                }
                None => {
                    self.buffer.remove(0);
                }
            }
        }
    }

    /// Bytes received but not yet resolved into a frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn skip_to_stx(&mut self) {
        let start = self
            .buffer
            .iter()
            .position(|&b| b == STX)
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..start);
    }
}
