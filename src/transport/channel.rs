//! Reliable channel: one acknowledged message in flight at a time.
//!
//! The sequence space is a wrapping `u8`. With a single outstanding message
//! the receiver only ever legitimately sees the expected number or its
//! immediate predecessor (a retransmission whose ack was lost); anything
//! else means the two ends have lost agreement and the receiver re-states
//! its last accepted number to resynchronize the sender.

use std::time::Duration;

/// The one unacknowledged outbound message.
#[derive(Debug)]
pub struct PendingMessage {
    /// Sequence number the frame was sent with.
    pub seq: u8,
    /// Payload kept for retransmission.
    pub payload: Vec<u8>,
    /// When it was last (re)transmitted.
    pub sent_at: Duration,
    /// Retransmissions so far.
    pub retries: u32,
}

/// Classification of an inbound Reliable frame's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// The expected next message: deliver and ack.
    Accept,
    /// The previous, already-delivered message (its ack was lost): re-ack
    /// without re-delivering.
    Duplicate,
    /// Lost agreement; re-state the last accepted sequence number.
    Desync {
        /// Sequence number this end last accepted.
        last_good: u8,
    },
}

/// Sequencing and retransmission state for reliable delivery.
#[derive(Debug)]
pub struct ReliableChannel {
    /// Next sequence number to assign outbound.
    tx_next_seq: u8,
    /// Next sequence number acceptable inbound.
    rx_expected_seq: u8,
    pending: Option<PendingMessage>,
}

impl ReliableChannel {
    /// Fresh channel; both sequence spaces start at zero.
    pub fn new() -> Self {
        Self {
            tx_next_seq: 0,
            rx_expected_seq: 0,
            pending: None,
        }
    }

    /// Wipe back to the fresh state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// No message in flight, so a new reliable send is allowed.
    pub fn can_send(&self) -> bool {
        self.pending.is_none()
    }

    /// The in-flight message, if any.
    pub fn pending(&self) -> Option<&PendingMessage> {
        self.pending.as_ref()
    }

    /// Sequence number the next outbound message will carry. The driver
    /// transmits first and only records the message on a successful push,
    /// so the number is needed before [`start`](Self::start) runs.
    pub fn next_seq(&self) -> u8 {
        self.tx_next_seq
    }

    /// Record a freshly transmitted message and return the sequence number
    /// it was assigned. Callers must have checked [`can_send`](Self::can_send).
    pub fn start(&mut self, payload: Vec<u8>, now: Duration) -> u8 {
        debug_assert!(self.pending.is_none());
        let seq = self.tx_next_seq;
        self.pending = Some(PendingMessage {
            seq,
            payload,
            sent_at: now,
            retries: 0,
        });
        self.tx_next_seq = self.tx_next_seq.wrapping_add(1);
        seq
    }

    /// Process an inbound ack. Returns true when it matches the pending
    /// message, which is then cleared; stale or duplicate acks are ignored.
    pub fn acknowledge(&mut self, seq: u8) -> bool {
        match &self.pending {
            Some(pending) if pending.seq == seq => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// A message is in flight and its retry interval has elapsed.
    pub fn retry_due(&self, now: Duration, interval: Duration) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| now.saturating_sub(p.sent_at) >= interval)
    }

    /// The pending message has used up its whole retry budget.
    pub fn exhausted(&self, max_retries: u32) -> bool {
        self.pending.as_ref().is_some_and(|p| p.retries >= max_retries)
    }

    /// Record a retransmission of the pending message.
    pub fn note_retry(&mut self, now: Duration) {
        if let Some(pending) = &mut self.pending {
            pending.sent_at = now;
            pending.retries += 1;
        }
    }

    /// Drop the in-flight message (the session is dying).
    pub fn abandon(&mut self) {
        self.pending = None;
    }

    /// Classify an inbound Reliable frame's sequence number.
    pub fn classify_inbound(&self, seq: u8) -> Inbound {
        let last_good = self.rx_expected_seq.wrapping_sub(1);
        if seq == self.rx_expected_seq {
            Inbound::Accept
        } else if seq == last_good {
            Inbound::Duplicate
        } else {
            Inbound::Desync { last_good }
        }
    }

    /// Advance the inbound sequence after a delivered message.
    pub fn accept_inbound(&mut self) {
        self.rx_expected_seq = self.rx_expected_seq.wrapping_add(1);
    }
}

impl Default for ReliableChannel {
    fn default() -> Self {
        Self::new()
    }
}
