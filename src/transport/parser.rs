//! Incremental receive parser.
//!
//! Reassembles frames from the raw word stream one word at a time, tolerant
//! of desynchronization: words that do not start a frame are discarded until
//! the magic constant lines up again, and any malformed or corrupt frame
//! resets the machine back to magic hunting without touching session state.

use crate::core::constants::{FRAME_MAGIC, MAX_PAYLOAD};

use super::frame::{Frame, crc16};

/// Parser sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Discarding words until the magic constant is seen.
    WaitMagic,
    /// Next word is the type/seq/length header.
    WaitHeader,
    /// Next word carries the checksum.
    WaitCrc,
    /// Collecting payload words.
    WaitPayload,
}

/// Result of feeding one word to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Mid-frame (or mid-noise); nothing to act on.
    Incomplete,
    /// A checksum-verified frame completed with this word.
    Frame(Frame),
    /// A frame completed but failed checksum verification; it was discarded.
    ChecksumMismatch,
}

/// Word-at-a-time frame reassembler.
#[derive(Debug)]
pub struct FrameParser {
    state: State,
    frame_type: u8,
    seq: u8,
    len: u16,
    crc: u16,
    words_needed: usize,
    words_seen: usize,
    payload: Vec<u8>,
    words_consumed: u32,
    frames_accepted: u32,
    crc_failures: u32,
}

impl FrameParser {
    /// New parser, hunting for magic.
    pub fn new() -> Self {
        Self {
            state: State::WaitMagic,
            frame_type: 0,
            seq: 0,
            len: 0,
            crc: 0,
            words_needed: 0,
            words_seen: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD),
            words_consumed: 0,
            frames_accepted: 0,
            crc_failures: 0,
        }
    }

    /// Abort any in-progress frame and hunt for magic again. Diagnostic
    /// counters survive.
    pub fn reset(&mut self) {
        self.state = State::WaitMagic;
        self.frame_type = 0;
        self.seq = 0;
        self.len = 0;
        self.crc = 0;
        self.words_needed = 0;
        self.words_seen = 0;
        self.payload.clear();
    }

    /// Total words ever consumed.
    pub fn words_consumed(&self) -> u32 {
        self.words_consumed
    }

    /// Frames that completed and verified.
    pub fn frames_accepted(&self) -> u32 {
        self.frames_accepted
    }

    /// Frames discarded for checksum mismatch.
    pub fn crc_failures(&self) -> u32 {
        self.crc_failures
    }

    /// Consume one word from the receive FIFO.
    pub fn push_word(&mut self, word: u32) -> ParseOutcome {
        self.words_consumed = self.words_consumed.wrapping_add(1);

        match self.state {
            State::WaitMagic => {
                if word == FRAME_MAGIC {
                    self.state = State::WaitHeader;
                }
                ParseOutcome::Incomplete
            }

            State::WaitHeader => {
                self.frame_type = (word >> 24) as u8;
                self.seq = (word >> 16) as u8;
                self.len = (word & 0xFFFF) as u16;

                // A corrupted length would otherwise stall the parser waiting
                // for thousands of payload words.
                if self.len as usize > MAX_PAYLOAD {
                    self.reset();
                    return ParseOutcome::Incomplete;
                }

                self.words_needed = (self.len as usize).div_ceil(4);
                self.words_seen = 0;
                self.payload.clear();
                self.state = State::WaitCrc;
                ParseOutcome::Incomplete
            }

            State::WaitCrc => {
                self.crc = (word & 0xFFFF) as u16;
                if self.words_needed == 0 {
                    return self.finish();
                }
                self.state = State::WaitPayload;
                ParseOutcome::Incomplete
            }

            State::WaitPayload => {
                let base = self.words_seen * 4;
                let remaining = self.len as usize - base;
                for i in 0..remaining.min(4) {
                    self.payload.push((word >> (8 * i)) as u8);
                }

                self.words_seen += 1;
                if self.words_seen < self.words_needed {
                    return ParseOutcome::Incomplete;
                }
                self.finish()
            }
        }
    }

    /// Verify the completed frame and emit it (or a mismatch), then return
    /// to magic hunting either way.
    fn finish(&mut self) -> ParseOutcome {
        let computed = crc16(self.frame_type, self.seq, &self.payload);
        let outcome = if computed == self.crc {
            self.frames_accepted = self.frames_accepted.wrapping_add(1);
            ParseOutcome::Frame(Frame {
                frame_type: self.frame_type,
                seq: self.seq,
                payload: std::mem::take(&mut self.payload),
            })
        } else {
            self.crc_failures = self.crc_failures.wrapping_add(1);
            tracing::debug!(
                frame_type = self.frame_type,
                len = self.len,
                got = format_args!("{:04x}", self.crc),
                want = format_args!("{:04x}", computed),
                "checksum mismatch, frame dropped"
            );
            ParseOutcome::ChecksumMismatch
        };
        self.reset();
        outcome
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame::{FrameType, encode_words};

    fn feed(parser: &mut FrameParser, words: &[u32]) -> Vec<Frame> {
        let mut frames = vec![];
        for &word in words {
            if let ParseOutcome::Frame(frame) = parser.push_word(word) {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn roundtrip_various_lengths() {
        let mut parser = FrameParser::new();
        for len in [0usize, 1, 3, 4, 5, 8, 255, 8000] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            let words = encode_words(FrameType::Reliable, len as u8, &payload);

            let frames = feed(&mut parser, &words);
            assert_eq!(frames.len(), 1, "len={len}");
            assert_eq!(frames[0].kind(), Some(FrameType::Reliable));
            assert_eq!(frames[0].seq, len as u8);
            assert_eq!(frames[0].payload, payload);
        }
    }

    #[test]
    fn recovers_after_noise_words() {
        let mut parser = FrameParser::new();
        let noise = [0x0000_0000, 0xFFFF_FFFF, 0x1234_5678, 0x5146_4D44];
        for word in noise {
            assert_eq!(parser.push_word(word), ParseOutcome::Incomplete);
        }

        let frames = feed(&mut parser, &encode_words(FrameType::Hello, 0, &[]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind(), Some(FrameType::Hello));
    }

    #[test]
    fn back_to_back_frames() {
        let mut parser = FrameParser::new();
        let mut words = encode_words(FrameType::Reliable, 1, b"first");
        words.extend(encode_words(FrameType::Reliable, 2, b"second"));

        let frames = feed(&mut parser, &words);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload, b"first");
        assert_eq!(frames[1].payload, b"second");
    }

    #[test]
    fn oversized_length_aborts_to_magic_hunt() {
        let mut parser = FrameParser::new();
        parser.push_word(FRAME_MAGIC);
        // Declared length just past the limit.
        parser.push_word(
            ((FrameType::Reliable.as_byte() as u32) << 24) | (MAX_PAYLOAD as u32 + 1),
        );

        // The parser must be hunting again, not waiting for payload words.
        let frames = feed(&mut parser, &encode_words(FrameType::Keepalive, 0, &[]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind(), Some(FrameType::Keepalive));
    }

    #[test]
    fn corrupt_crc_is_counted_and_dropped() {
        let mut parser = FrameParser::new();
        let mut words = encode_words(FrameType::Reliable, 5, b"data");
        words[2] ^= 1;

        let mut mismatch_seen = false;
        for word in words {
            if parser.push_word(word) == ParseOutcome::ChecksumMismatch {
                mismatch_seen = true;
            }
        }
        assert!(mismatch_seen);
        assert_eq!(parser.crc_failures(), 1);
        assert_eq!(parser.frames_accepted(), 0);

        // And the parser still accepts the next good frame.
        let frames = feed(&mut parser, &encode_words(FrameType::Hello, 0, &[]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let original = encode_words(FrameType::Reliable, 7, b"flip");
        for word_idx in 0..original.len() {
            for bit in 0..32 {
                let mut corrupted = original.clone();
                corrupted[word_idx] ^= 1 << bit;

                let mut parser = FrameParser::new();
                for &word in &corrupted {
                    if let ParseOutcome::Frame(frame) = parser.push_word(word) {
                        panic!(
                            "bit {bit} of word {word_idx} flipped yet frame dispatched: {frame:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn zero_length_frame_completes_at_crc_word() {
        let mut parser = FrameParser::new();
        let words = encode_words(FrameType::Keepalive, 0, &[]);
        assert_eq!(parser.push_word(words[0]), ParseOutcome::Incomplete);
        assert_eq!(parser.push_word(words[1]), ParseOutcome::Incomplete);
        match parser.push_word(words[2]) {
            ParseOutcome::Frame(frame) => {
                assert_eq!(frame.kind(), Some(FrameType::Keepalive));
                assert!(frame.payload.is_empty());
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }
}
