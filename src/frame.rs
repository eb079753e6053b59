//! TR3 frame encoder/validator.
//!
//! # Frame format
//!
//! ```text
//! STX(0x02) ADDR CMD LEN [payload; LEN] ETX(0x03) SUM CR(0x0D)
//! ```
//!
//! `SUM` is the low byte of the sum of every byte from `STX` through `ETX`.

use std::fmt;

use crate::types::{HfError, Result};

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const CR: u8 = 0x0D;

/// STX, address, command, length
pub const HEADER_LEN: usize = 4;
/// ETX, checksum, CR
pub const FOOTER_LEN: usize = 3;
pub const MIN_FRAME_LEN: usize = HEADER_LEN + FOOTER_LEN;
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

pub const ADDR_DEFAULT: u8 = 0x00;

pub const CMD_ACK: u8 = 0x30;
pub const CMD_NACK: u8 = 0x31;
pub const CMD_ROM_VERSION: u8 = 0x4F;
pub const DETAIL_ROM_VERSION: u8 = 0x90;
pub const CMD_MODE_READ: u8 = 0x4F;
pub const DETAIL_MODE_READ: u8 = 0x00;
pub const CMD_MODE_WRITE: u8 = 0x4E;
pub const CMD_INVENTORY: u8 = 0x78;
pub const DETAIL_INVENTORY_UID: u8 = 0xF0;
pub const RSP_UID: u8 = 0x49;
pub const CMD_BUZZER: u8 = 0x42;

/// Total frame length announced by a header whose length byte is `data_len`.
pub fn frame_len(data_len: u8) -> usize {
    HEADER_LEN + data_len as usize + FOOTER_LEN
}

/// Low byte of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Check length, terminator positions and checksum of a candidate frame.
pub fn verify_frame(frame: &[u8]) -> bool {
    if frame.len() < MIN_FRAME_LEN {
        return false;
    }
    if frame.len() != frame_len(frame[3]) {
        return false;
    }
    let etx_pos = frame.len() - FOOTER_LEN;
    if frame[etx_pos] != ETX || frame[frame.len() - 1] != CR {
        return false;
    }
    frame[frame.len() - 2] == checksum(&frame[..=etx_pos])
}

/// A well-formed frame. Only constructed by [`Frame::build`] or [`Frame::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Encode a frame; fails only when the payload exceeds 255 bytes.
    pub fn build(address: u8, command: u8, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(HfError::InvalidParameter(format!(
                "payload of {} bytes exceeds the {} byte maximum",
                payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let mut bytes = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
        bytes.extend_from_slice(&[STX, address, command, payload.len() as u8]);
        bytes.extend_from_slice(payload);
        bytes.push(ETX);
        bytes.push(checksum(&bytes));
        bytes.push(CR);
        Ok(Self { bytes })
    }

    /// Validate `bytes` as exactly one frame.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        verify_frame(bytes).then(|| Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn address(&self) -> u8 {
        self.bytes[1]
    }

    pub fn command(&self) -> u8 {
        self.bytes[2]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..self.bytes.len() - FOOTER_LEN]
    }

    /// First payload byte, the detail code for commands that carry one.
    pub fn detail(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    pub fn is_ack(&self) -> bool {
        self.command() == CMD_ACK
    }

    pub fn is_nack(&self) -> bool {
        self.command() == CMD_NACK
    }

    /// ACK or NACK: the frame that ends a single-response exchange.
    pub fn is_terminal(&self) -> bool {
        self.is_ack() || self.is_nack()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: a parsed or built frame holds at least [`MIN_FRAME_LEN`] bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Walks a concatenation of frames by their length fields.
///
/// Yields each candidate slice in order without validating it and stops at
/// the first tail too short to hold the frame its header announces.
#[derive(Debug, Clone)]
pub struct FrameWalk<'a> {
    rest: &'a [u8],
}

impl<'a> FrameWalk<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for FrameWalk<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < MIN_FRAME_LEN {
            return None;
        }
        let need = frame_len(self.rest[3]);
        if need > self.rest.len() {
            return None;
        }
        let (candidate, rest) = self.rest.split_at(need);
        self.rest = rest;
        Some(candidate)
    }
}

/// The last frame candidate in a concatenated stream.
///
/// The reader may send several frames before the one that answers the
/// request, so the final complete candidate is the answer.
pub fn last_frame(bytes: &[u8]) -> Option<&[u8]> {
    FrameWalk::new(bytes).last()
}

/// Error classification carried by a NACK frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// 0x42: the reader computed a different checksum
    ChecksumMismatch,
    /// 0x44: malformed command or parameter
    FormatError,
    Unknown(u8),
    /// The frame was not a valid NACK at all
    Invalid,
}

impl NackReason {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x42 => NackReason::ChecksumMismatch,
            0x44 => NackReason::FormatError,
            other => NackReason::Unknown(other),
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::ChecksumMismatch => f.write_str("SUM_ERROR: checksum mismatch"),
            NackReason::FormatError => f.write_str("FORMAT_ERROR: format/parameter error"),
            NackReason::Unknown(code) => write!(f, "unknown NACK error (0x{:02X})", code),
            NackReason::Invalid => f.write_str("invalid NACK"),
        }
    }
}

/// Classify the error code of a NACK frame.
pub fn decode_nack(frame: &[u8]) -> NackReason {
    if !verify_frame(frame) || frame[2] != CMD_NACK {
        return NackReason::Invalid;
    }
    // payload: [detail of the rejected command, error code]
    let payload = &frame[HEADER_LEN..frame.len() - FOOTER_LEN];
    NackReason::from_code(payload.get(1).copied().unwrap_or(0xFF))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rom_version_request() {
        let frame = Frame::build(ADDR_DEFAULT, CMD_ROM_VERSION, &[DETAIL_ROM_VERSION]).unwrap();
        // 02+00+4F+01+90+03 = 0xE5
        assert_eq!(frame.as_bytes(), &[0x02, 0x00, 0x4F, 0x01, 0x90, 0x03, 0xE5, 0x0D]);
    }

    #[test]
    fn test_build_empty_payload() {
        let frame = Frame::build(0x05, CMD_ACK, &[]).unwrap();
        assert_eq!(frame.as_bytes(), &[0x02, 0x05, 0x30, 0x00, 0x03, 0x3A, 0x0D]);
        assert!(frame.payload().is_empty());
        assert_eq!(frame.detail(), None);
    }

    #[test]
    fn test_build_then_verify_reproduces_fields() {
        for len in [0usize, 1, 7, 64, 255] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let frame = Frame::build(0xA5, 0x78, &payload).unwrap();
            assert!(verify_frame(frame.as_bytes()), "payload length {}", len);
            let parsed = Frame::parse(frame.as_bytes()).unwrap();
            assert_eq!(parsed.address(), 0xA5);
            assert_eq!(parsed.command(), 0x78);
            assert_eq!(parsed.payload(), payload.as_slice());
            assert_eq!(parsed.len(), MIN_FRAME_LEN + len);
        }
    }

    #[test]
    fn test_build_rejects_oversized_payload() {
        let payload = vec![0u8; 256];
        assert!(matches!(
            Frame::build(ADDR_DEFAULT, CMD_BUZZER, &payload),
            Err(HfError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_flipped_payload_byte_fails_validation() {
        let frame = Frame::build(ADDR_DEFAULT, CMD_BUZZER, &[0x01, 0x00]).unwrap();
        let mut bytes = frame.into_bytes();
        bytes[4] ^= 0x01;
        assert!(!verify_frame(&bytes));
    }

    #[test]
    fn test_every_single_byte_flip_is_detected() {
        let frame = Frame::build(ADDR_DEFAULT, CMD_MODE_WRITE, &[0, 0, 0, 0x1C, 0, 0, 0]).unwrap();
        for pos in 0..frame.len() {
            let mut bytes = frame.as_bytes().to_vec();
            bytes[pos] ^= 0x80;
            assert!(!verify_frame(&bytes), "flip at {} went unnoticed", pos);
        }
    }

    #[test]
    fn test_verify_rejects_structural_errors() {
        let good = Frame::build(ADDR_DEFAULT, CMD_ACK, &[0x90, b'1']).unwrap().into_bytes();

        assert!(!verify_frame(&good[..6]));
        assert!(!verify_frame(&[]));

        let mut wrong_len = good.clone();
        wrong_len[3] = 3;
        assert!(!verify_frame(&wrong_len));

        let mut no_etx = good.clone();
        no_etx[6] = 0x04;
        assert!(!verify_frame(&no_etx));

        let mut no_cr = good.clone();
        *no_cr.last_mut().unwrap() = 0x0A;
        assert!(!verify_frame(&no_cr));

        let mut bad_sum = good.clone();
        bad_sum[7] = bad_sum[7].wrapping_add(1);
        assert!(!verify_frame(&bad_sum));
    }

    #[test]
    fn test_frame_walk_and_last_frame() {
        let first = Frame::build(ADDR_DEFAULT, 0x49, &[0; 9]).unwrap();
        let second = Frame::build(ADDR_DEFAULT, CMD_ACK, &[0x90]).unwrap();
        let mut stream = first.as_bytes().to_vec();
        stream.extend_from_slice(second.as_bytes());
        stream.extend_from_slice(&[STX, 0x00, 0x30]);

        let walked: Vec<&[u8]> = FrameWalk::new(&stream).collect();
        assert_eq!(walked, vec![first.as_bytes(), second.as_bytes()]);
        assert_eq!(last_frame(&stream), Some(second.as_bytes()));
        assert_eq!(last_frame(&[]), None);
    }

    #[test]
    fn test_decode_nack_codes() {
        let frame = |code: u8| Frame::build(ADDR_DEFAULT, CMD_NACK, &[0x4E, code]).unwrap();
        assert_eq!(decode_nack(frame(0x42).as_bytes()), NackReason::ChecksumMismatch);
        assert_eq!(decode_nack(frame(0x44).as_bytes()), NackReason::FormatError);
        assert_eq!(decode_nack(frame(0x10).as_bytes()), NackReason::Unknown(0x10));
    }

    #[test]
    fn test_decode_nack_without_code_is_unknown() {
        let frame = Frame::build(ADDR_DEFAULT, CMD_NACK, &[0x4E]).unwrap();
        assert_eq!(decode_nack(frame.as_bytes()), NackReason::Unknown(0xFF));
    }

    #[test]
    fn test_decode_nack_rejects_non_nack() {
        let ack = Frame::build(ADDR_DEFAULT, CMD_ACK, &[0x4E, 0x42]).unwrap();
        assert_eq!(decode_nack(ack.as_bytes()), NackReason::Invalid);

        let mut corrupted = Frame::build(ADDR_DEFAULT, CMD_NACK, &[0x4E, 0x42]).unwrap().into_bytes();
        corrupted[6] ^= 0xFF;
        assert_eq!(decode_nack(&corrupted), NackReason::Invalid);
    }

    #[test]
    fn test_nack_messages() {
        assert!(NackReason::ChecksumMismatch.to_string().contains("checksum mismatch"));
        assert!(NackReason::FormatError.to_string().contains("format/parameter error"));
        assert!(NackReason::Unknown(0x01).to_string().contains("unknown"));
        assert_eq!(NackReason::Invalid.to_string(), "invalid NACK");
    }
}
