//! Session lifecycle state machine.
//!
//! Tracks the one connection the cable can carry: which role this end plays,
//! what phase the connection is in, why it died if it died, and the
//! timestamps the timer sweep compares against. All times are monotonic
//! [`Clock`](crate::core::Clock) readings; the session itself never looks at
//! a clock, the driver feeds it `now`.

use std::time::Duration;

use crate::core::DeadReason;

/// Which end of the cable this node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Actively dialed out; drives the cable clock and polls the peer.
    Initiator,
    /// Accepted an inbound Hello while listening.
    Responder,
}

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No connection and none in progress.
    Down,
    /// Hello sent, waiting for HelloAck.
    Handshaking,
    /// Established; reliable and unreliable traffic flows.
    Connected,
}

/// State for the single possible session.
#[derive(Debug)]
pub struct Session {
    /// Cable role for the current attempt/connection.
    pub role: Role,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Set when the session dies; cleared only by a full reset.
    pub dead: Option<DeadReason>,
    /// When the last verified frame arrived.
    pub last_rx: Duration,
    /// When the last frame was pushed to the wire.
    pub last_tx: Duration,
    /// When the last Hello was sent (handshake pacing).
    pub last_hello: Duration,
    /// When the current handshake began.
    pub handshake_start: Duration,
}

impl Session {
    /// Fresh session: down, responder role, not dead.
    pub fn new() -> Self {
        Self {
            role: Role::Responder,
            phase: Phase::Down,
            dead: None,
            last_rx: Duration::ZERO,
            last_tx: Duration::ZERO,
            last_hello: Duration::ZERO,
            handshake_start: Duration::ZERO,
        }
    }

    /// Wipe everything back to the fresh state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Enter the initiator handshake at `now`.
    pub fn begin_handshake(&mut self, now: Duration) {
        self.role = Role::Initiator;
        self.phase = Phase::Handshaking;
        self.dead = None;
        self.handshake_start = now;
        self.last_hello = Duration::ZERO;
        self.last_rx = now;
        self.last_tx = now;
    }

    /// Mark the session established at `now` (either role).
    pub fn establish(&mut self, now: Duration) {
        self.phase = Phase::Connected;
        self.dead = None;
        self.last_rx = now;
        self.last_tx = now;
    }

    /// Kill the session. Phase drops to Down; the reason is kept for error
    /// reporting until the next reset.
    pub fn mark_dead(&mut self, reason: DeadReason) {
        self.dead = Some(reason);
        self.phase = Phase::Down;
    }

    /// Connected and not dead.
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected && self.dead.is_none()
    }

    /// Whether the session has died.
    pub fn is_dead(&self) -> bool {
        self.dead.is_some()
    }

    /// Note a verified inbound frame.
    pub fn note_rx(&mut self, now: Duration) {
        self.last_rx = now;
    }

    /// Note a completed outbound frame.
    pub fn note_tx(&mut self, now: Duration) {
        self.last_tx = now;
    }

    /// Note an outbound Hello.
    pub fn note_hello(&mut self, now: Duration) {
        self.last_hello = now;
    }

    /// Handshaking and due for another Hello.
    pub fn hello_due(&self, now: Duration, interval: Duration) -> bool {
        self.phase == Phase::Handshaking && now.saturating_sub(self.last_hello) >= interval
    }

    /// Handshaking and past the connect deadline.
    pub fn handshake_expired(&self, now: Duration, timeout: Duration) -> bool {
        self.phase == Phase::Handshaking && now.saturating_sub(self.handshake_start) >= timeout
    }

    /// Connected and idle long enough to owe the peer a Keepalive.
    pub fn keepalive_due(&self, now: Duration, interval: Duration) -> bool {
        self.phase == Phase::Connected && now.saturating_sub(self.last_tx) >= interval
    }

    /// Connected but nothing received within the peer timeout.
    pub fn peer_timed_out(&self, now: Duration, timeout: Duration) -> bool {
        self.phase == Phase::Connected && now.saturating_sub(self.last_rx) >= timeout
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
