//! Frame types, checksum, and word-stream encoding.
//!
//! Wire format, bit-exact on both ends of the cable:
//!
//! ```text
//! W0: 0x51464D45 ("QFME")
//! W1: [31:24]=type  [23:16]=seq  [15:0]=payload length in bytes
//! W2: [15:0]=CRC-16 over (type, seq, len_lo, len_hi, payload...)
//! W3..: payload bytes packed little-endian, zero-padded to a word boundary
//! ```
//!
//! The checksum is CRC-16/CCITT-FALSE: init 0xFFFF, polynomial 0x1021,
//! MSB-first, no final xor. Field order and byte order here are the single
//! most compatibility-critical contract in the transport.

use crate::core::constants::{FRAME_MAGIC, MAX_PAYLOAD};

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Connection request from the initiator.
    Hello = 1,
    /// Responder's acceptance of a Hello.
    HelloAck = 2,
    /// Sequenced, acknowledged payload.
    Reliable = 3,
    /// Acknowledgement of a Reliable frame's sequence number.
    ReliableAck = 4,
    /// Fire-and-forget payload.
    Unreliable = 5,
    /// Idle-link refresh, no payload.
    Keepalive = 6,
    /// Hard session teardown.
    Reset = 7,
}

impl FrameType {
    /// Parse a frame type from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Hello),
            2 => Some(Self::HelloAck),
            3 => Some(Self::Reliable),
            4 => Some(Self::ReliableAck),
            5 => Some(Self::Unreliable),
            6 => Some(Self::Keepalive),
            7 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Wire byte for this frame type.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One checksum-verified frame as reassembled by the parser.
///
/// The type is kept as the raw wire byte: unknown types still checksum-verify
/// and refresh liveness, the dispatcher just has nothing to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw frame-type byte.
    pub frame_type: u8,
    /// Sequence number (meaningful for Reliable/ReliableAck only).
    pub seq: u8,
    /// Payload bytes, exactly the declared length.
    pub payload: Vec<u8>,
}

impl Frame {
    /// The known frame type, if this byte names one.
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type)
    }
}

/// Fold one byte into a running CRC-16/CCITT-FALSE value.
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ ((byte as u16) << 8);
    for _ in 0..8 {
        if crc & 0x8000 != 0 {
            crc = (crc << 1) ^ 0x1021;
        } else {
            crc <<= 1;
        }
    }
    crc
}

/// Frame checksum over `[type, seq, len_lo, len_hi, payload...]`.
pub fn crc16(frame_type: u8, seq: u8, payload: &[u8]) -> u16 {
    let len = payload.len() as u16;
    let mut crc = 0xFFFF;
    crc = crc16_update(crc, frame_type);
    crc = crc16_update(crc, seq);
    crc = crc16_update(crc, (len & 0xFF) as u8);
    crc = crc16_update(crc, (len >> 8) as u8);
    for &byte in payload {
        crc = crc16_update(crc, byte);
    }
    crc
}

/// Pack the header word: type in 31:24, seq in 23:16, length in 15:0.
pub fn header_word(frame_type: u8, seq: u8, len: usize) -> u32 {
    ((frame_type as u32) << 24) | ((seq as u32) << 16) | (len as u32 & 0xFFFF)
}

/// Pack up to four payload bytes starting at `base`, low byte first,
/// zero-padded past the end.
pub fn payload_word(payload: &[u8], base: usize) -> u32 {
    let mut word = 0u32;
    for i in 0..4 {
        if let Some(&byte) = payload.get(base + i) {
            word |= (byte as u32) << (8 * i);
        }
    }
    word
}

/// Encode a complete frame as the word sequence to push into the transmit
/// FIFO. `payload.len()` must be at most [`MAX_PAYLOAD`]; the driver checks
/// this before calling.
pub fn encode_words(frame_type: FrameType, seq: u8, payload: &[u8]) -> Vec<u32> {
    debug_assert!(payload.len() <= MAX_PAYLOAD);

    let payload_words = payload.len().div_ceil(4);
    let mut words = Vec::with_capacity(3 + payload_words);
    words.push(FRAME_MAGIC);
    words.push(header_word(frame_type.as_byte(), seq, payload.len()));
    words.push(crc16(frame_type.as_byte(), seq, payload) as u32);
    for base in (0..payload.len()).step_by(4) {
        words.push(payload_word(payload, base));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_roundtrip() {
        for t in [
            FrameType::Hello,
            FrameType::HelloAck,
            FrameType::Reliable,
            FrameType::ReliableAck,
            FrameType::Unreliable,
            FrameType::Keepalive,
            FrameType::Reset,
        ] {
            assert_eq!(FrameType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(FrameType::from_byte(0), None);
        assert_eq!(FrameType::from_byte(8), None);
        assert_eq!(FrameType::from_byte(0xFF), None);
    }

    #[test]
    fn crc_matches_ccitt_false_check_value() {
        // The standard check input for CRC-16/CCITT-FALSE.
        let mut crc = 0xFFFF;
        for &byte in b"123456789" {
            crc = crc16_update(crc, byte);
        }
        assert_eq!(crc, 0x29B1);
    }

    #[test]
    fn crc_golden_vectors() {
        assert_eq!(crc16(FrameType::Hello.as_byte(), 0, &[]), 0xF274);
        assert_eq!(crc16(FrameType::Reliable.as_byte(), 7, b"QUAKE"), 0x1E5E);
    }

    #[test]
    fn encode_golden_frame() {
        let words = encode_words(FrameType::Reliable, 7, b"QUAKE");
        assert_eq!(
            words,
            vec![0x5146_4D45, 0x0307_0005, 0x0000_1E5E, 0x4B41_5551, 0x0000_0045]
        );
    }

    #[test]
    fn encode_empty_frame_is_three_words() {
        let words = encode_words(FrameType::Keepalive, 0, &[]);
        assert_eq!(words.len(), 3);
        assert_eq!(words[0], FRAME_MAGIC);
        assert_eq!(words[1], 0x0600_0000);
    }

    #[test]
    fn partial_final_word_is_zero_padded() {
        let words = encode_words(FrameType::Unreliable, 0, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(words.len(), 4);
        assert_eq!(words[3], 0x00CC_BBAA);
    }

    #[test]
    fn crc_is_sensitive_to_every_header_field() {
        let base = crc16(3, 7, b"abc");
        assert_ne!(base, crc16(4, 7, b"abc"));
        assert_ne!(base, crc16(3, 8, b"abc"));
        assert_ne!(base, crc16(3, 7, b"abd"));
        assert_ne!(base, crc16(3, 7, b"ab"));
    }
}
