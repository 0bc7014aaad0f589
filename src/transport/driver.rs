//! The public driver API: the surface the external network layer calls.
//!
//! All protocol state lives in one [`LinkDriver`] instance — device adapter,
//! receive parser, session, reliable channel, socket — so there is exactly
//! one owner and no shared statics. Every entry point that might need fresh
//! incoming data pumps the receive parser (bounded) before deciding
//! anything, then runs the timer sweep. Frame transmission waits for FIFO
//! space with a bounded spin that never pumps the receiver, so a send can
//! never re-enter another send; a frame that cannot be pushed in time is
//! simply reported as failed and recovered by the peer's retransmission.

use std::time::Duration;

use tracing::{debug, warn};

use crate::core::constants::{
    ACCEPTED_HOSTS, CONNECT_TIMEOUT, FRAME_HEADER_WORDS, HELLO_INTERVAL, HOST_CNAME, HOST_NAME,
    KEEPALIVE_INTERVAL, MAX_PAYLOAD, MAX_RETRIES, PEER_TIMEOUT, POLL_WORD_BUDGET, RETRY_INTERVAL,
    TX_WAIT_SPINS,
};
use crate::core::{Clock, DeadReason, LinkError};

use super::channel::{Inbound, ReliableChannel};
use super::device::{LinkBus, LinkDevice, status};
use super::frame::{Frame, FrameType, encode_words};
use super::parser::{FrameParser, ParseOutcome};
use super::session::{Phase, Role, Session};
use super::socket::{HostCache, HostEntry, LinkSocket, Message, MessageKind, SocketId};

/// Timing knobs, defaulting to the protocol constants. Wire-format values
/// are not configurable.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Deadline for an outbound connection attempt.
    pub connect_timeout: Duration,
    /// Hello retransmission interval while handshaking.
    pub hello_interval: Duration,
    /// Reliable retransmission interval while awaiting an ack.
    pub retry_interval: Duration,
    /// Idle interval before a Keepalive is owed.
    pub keepalive_interval: Duration,
    /// Silence interval after which the peer is declared gone.
    pub peer_timeout: Duration,
    /// Reliable retransmissions before the transport is declared dead.
    pub max_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            hello_interval: HELLO_INTERVAL,
            retry_interval: RETRY_INTERVAL,
            keepalive_interval: KEEPALIVE_INTERVAL,
            peer_timeout: PEER_TIMEOUT,
            max_retries: MAX_RETRIES,
        }
    }
}

/// Result of a non-erroring send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame went out.
    Sent,
    /// Back-pressure: not connected yet, a reliable message is still in
    /// flight, or no FIFO space. Try again after the next poll.
    Busy,
}

/// Receive-side diagnostic counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    /// Words consumed from the receive FIFO.
    pub rx_words: u32,
    /// Checksum-verified frames.
    pub rx_frames: u32,
    /// Frames discarded for checksum mismatch.
    pub crc_failures: u32,
}

/// Link-cable transport driver.
///
/// Single-threaded and cooperative: all protocol work happens synchronously
/// inside these calls, which the game loop invokes once or more per frame.
pub struct LinkDriver<B, C> {
    device: LinkDevice<B>,
    clock: C,
    config: LinkConfig,
    parser: FrameParser,
    session: Session,
    channel: ReliableChannel,
    socket: Option<LinkSocket>,
    next_socket_id: u32,
    hw_present: bool,
    listening: bool,
    incoming_pending: bool,
}

impl<B: LinkBus, C: Clock> LinkDriver<B, C> {
    /// Driver with default timing.
    pub fn new(bus: B, clock: C) -> Self {
        Self::with_config(bus, clock, LinkConfig::default())
    }

    /// Driver with custom timing.
    pub fn with_config(bus: B, clock: C, config: LinkConfig) -> Self {
        Self {
            device: LinkDevice::new(bus),
            clock,
            config,
            parser: FrameParser::new(),
            session: Session::new(),
            channel: ReliableChannel::new(),
            socket: None,
            next_socket_id: 0,
            hw_present: false,
            listening: false,
            incoming_pending: false,
        }
    }

    // -------------------------------------------------------------------
    // Public driver surface
    // -------------------------------------------------------------------

    /// Probe the peripheral and bring it to a clean enabled state. Until
    /// this succeeds every other call is a no-op or failure.
    pub fn init(&mut self) -> Result<(), LinkError> {
        self.hw_present = false;
        self.listening = false;
        self.socket = None;
        self.reset_protocol();

        self.device.probe()?;
        self.hw_present = true;
        debug!("link hardware present");
        Ok(())
    }

    /// Reset the peripheral and forget all protocol state.
    pub fn shutdown(&mut self) {
        if self.hw_present {
            self.device.shutdown();
        }
        self.hw_present = false;
        self.listening = false;
        self.socket = None;
        self.reset_protocol();
    }

    /// Arm or disarm acceptance of inbound Hello frames.
    pub fn listen(&mut self, enable: bool) {
        self.listening = enable;
        if enable && self.hw_present && self.session.phase == Phase::Down {
            self.device.set_role(false);
        }
        if !enable && self.session.role == Role::Responder {
            self.incoming_pending = false;
        }
    }

    /// Pump the receiver, then make sure the single synthetic cable-peer
    /// entry exists in the host cache. Idempotent across repeated polls.
    pub fn search_for_hosts(&mut self, cache: &mut HostCache, _xmit: bool) {
        self.poll();
        if !self.hw_present {
            return;
        }
        cache.ensure(HostEntry {
            name: HOST_NAME.to_owned(),
            map: String::new(),
            users: 0,
            max_users: 2,
            cname: HOST_CNAME.to_owned(),
        });
    }

    /// Begin an outbound connection without blocking: validate the host
    /// token, take the initiator role, and send the first Hello. Completion
    /// is observed via [`poll`](Self::poll) + [`is_connected`](Self::is_connected).
    pub fn start_connect(&mut self, host: &str) -> Result<SocketId, LinkError> {
        if !ACCEPTED_HOSTS.contains(&host) {
            debug!(host, "connect refused: unknown host");
            return Err(LinkError::UnknownHost(host.to_owned()));
        }
        if !self.hw_present {
            return Err(LinkError::NotInitialized);
        }
        if self.socket.is_some() {
            return Err(LinkError::AlreadyConnected);
        }

        self.reset_protocol();
        let id = self.alloc_socket("link:client");
        self.device.set_role(true);
        let now = self.clock.now();
        self.session.begin_handshake(now);

        let _ = self.send_frame(FrameType::Hello, 0, &[]);
        self.session.note_hello(self.clock.now());
        debug!(host, "handshake started");
        Ok(id)
    }

    /// Connect to the cable peer, busy-polling until established or the
    /// configured timeout elapses. On timeout the attempt is cleanly closed
    /// before returning.
    pub fn connect(&mut self, host: &str) -> Result<SocketId, LinkError> {
        let id = self.start_connect(host)?;

        let deadline = self.clock.now() + self.config.connect_timeout;
        while self.clock.now() < deadline {
            self.poll();
            if self.session.is_connected() {
                debug!("connected");
                return Ok(id);
            }
            if self.session.is_dead() {
                break;
            }
        }

        warn!(timeout = ?self.config.connect_timeout, "connect timed out");
        self.close(id);
        Err(LinkError::ConnectTimeout(self.config.connect_timeout))
    }

    /// Return the socket for an accepted inbound connection, exactly once
    /// per acceptance, while listening, connected, and alive.
    pub fn check_new_connections(&mut self) -> Option<SocketId> {
        self.poll();

        if !self.hw_present || !self.listening {
            return None;
        }
        if self.session.is_dead() || self.session.phase != Phase::Connected {
            return None;
        }
        if !self.incoming_pending {
            return None;
        }

        let can_send = self.channel.can_send();
        let socket = self.socket.as_mut()?;
        self.incoming_pending = false;
        socket.can_send = can_send;
        debug!("inbound connection handed to caller");
        Some(socket.id())
    }

    /// Dequeue the oldest delivered message, pumping the receiver first.
    /// `Ok(None)` means nothing is queued; a dead transport is an error.
    pub fn get_message(&mut self, sock: SocketId) -> Result<Option<Message>, LinkError> {
        self.validate(sock)?;
        self.poll();

        if let Some(reason) = self.session.dead {
            return Err(LinkError::TransportDead(reason));
        }
        Ok(self.socket.as_mut().and_then(LinkSocket::pop))
    }

    /// Send a reliably-delivered message. `Busy` while the session is not
    /// connected or the previous reliable message is still unacknowledged.
    pub fn send_message(&mut self, sock: SocketId, payload: &[u8]) -> Result<SendOutcome, LinkError> {
        self.validate(sock)?;
        if payload.len() > MAX_PAYLOAD {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        self.poll();
        if let Some(reason) = self.session.dead {
            return Err(LinkError::TransportDead(reason));
        }
        if self.session.phase != Phase::Connected || !self.channel.can_send() {
            return Ok(SendOutcome::Busy);
        }

        let seq = self.channel.next_seq();
        if !self.send_frame(FrameType::Reliable, seq, payload) {
            return Ok(SendOutcome::Busy);
        }

        let now = self.clock.now();
        let assigned = self.channel.start(payload.to_vec(), now);
        debug_assert_eq!(assigned, seq);
        if let Some(socket) = self.socket.as_mut() {
            socket.can_send = false;
        }
        Ok(SendOutcome::Sent)
    }

    /// Send a fire-and-forget message: no sequencing, no retransmission,
    /// dropped by the receiver if its queue is full.
    pub fn send_unreliable_message(
        &mut self,
        sock: SocketId,
        payload: &[u8],
    ) -> Result<SendOutcome, LinkError> {
        self.validate(sock)?;
        if payload.len() > MAX_PAYLOAD {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        self.poll();
        if let Some(reason) = self.session.dead {
            return Err(LinkError::TransportDead(reason));
        }
        if self.session.phase != Phase::Connected {
            return Ok(SendOutcome::Busy);
        }

        if self.send_frame(FrameType::Unreliable, 0, payload) {
            Ok(SendOutcome::Sent)
        } else {
            Ok(SendOutcome::Busy)
        }
    }

    /// Whether a reliable send would be accepted right now.
    pub fn can_send_message(&mut self, sock: SocketId) -> bool {
        if self.validate(sock).is_err() {
            return false;
        }
        self.poll();
        self.session.is_connected() && self.channel.can_send()
    }

    /// Whether an unreliable send would be accepted right now; additionally
    /// requires transmit FIFO space.
    pub fn can_send_unreliable_message(&mut self, sock: SocketId) -> bool {
        if self.validate(sock).is_err() {
            return false;
        }
        self.poll();
        if !self.session.is_connected() {
            return false;
        }
        self.device.read_status() & status::TX_FULL == 0
    }

    /// Tear down the session: best-effort Reset frame while connected, then
    /// clear all session, channel, and parser state and release the socket.
    pub fn close(&mut self, sock: SocketId) {
        if self.validate(sock).is_err() {
            return;
        }

        if self.hw_present && self.session.phase == Phase::Connected {
            let _ = self.send_frame(FrameType::Reset, 0, &[]);
        }

        // Role bits are left as-is: changing role flushes the transmit FIFO,
        // which would discard the Reset frame before it reaches the peer. The
        // next listen() or start_connect() restates them.
        self.socket = None;
        self.reset_protocol();
        debug!("closed");
    }

    /// Pump the receive parser (bounded) and run the timer sweep.
    pub fn poll(&mut self) {
        if !self.hw_present {
            return;
        }
        self.pump_rx();
        self.poll_timers();
    }

    /// Connected and alive.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Receive-side diagnostic counters.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            rx_words: self.parser.words_consumed(),
            rx_frames: self.parser.frames_accepted(),
            crc_failures: self.parser.crc_failures(),
        }
    }

    // -------------------------------------------------------------------
    // Receive path
    // -------------------------------------------------------------------

    fn pump_rx(&mut self) {
        for _ in 0..POLL_WORD_BUDGET {
            let status = self.device.read_status();
            if status & status::RX_EMPTY != 0 {
                return;
            }

            let word = self.device.pop_word();
            match self.parser.push_word(word) {
                ParseOutcome::Incomplete => {}
                ParseOutcome::Frame(frame) => self.handle_frame(frame),
                ParseOutcome::ChecksumMismatch => {
                    // Best-effort hardware resync aid.
                    if status & status::LINK_UP != 0 {
                        self.device.clear_errors();
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        self.session.note_rx(self.clock.now());

        match frame.kind() {
            Some(FrameType::Hello) => self.on_hello(),
            Some(FrameType::HelloAck) => self.on_hello_ack(),
            Some(FrameType::Reliable) => self.on_reliable(frame.seq, frame.payload),
            Some(FrameType::ReliableAck) => self.on_reliable_ack(frame.seq),
            Some(FrameType::Unreliable) => self.on_unreliable(frame.payload),
            Some(FrameType::Keepalive) => {}
            Some(FrameType::Reset) => {
                warn!("reset frame from peer");
                self.mark_dead(DeadReason::ResetReceived);
            }
            None => {
                debug!(frame_type = frame.frame_type, "ignoring unknown frame type");
            }
        }
    }

    fn on_hello(&mut self) {
        debug!(listening = self.listening, phase = ?self.session.phase, "hello received");

        if !self.listening {
            return;
        }

        // Already connected: the peer retransmitted because our previous ack
        // was lost. Hello is not covered by the reliable channel, so the ack
        // has to be idempotent.
        if self.session.phase == Phase::Connected {
            let _ = self.send_frame(FrameType::HelloAck, 0, &[]);
            return;
        }

        let now = self.clock.now();
        if self.socket.is_none() {
            self.alloc_socket("link:peer");
        }

        self.device.set_role(false);
        self.session.role = Role::Responder;
        self.session.establish(now);
        self.channel.reset();
        self.incoming_pending = true;
        if let Some(socket) = self.socket.as_mut() {
            socket.can_send = true;
            socket.last_message_at = now;
        }

        let _ = self.send_frame(FrameType::HelloAck, 0, &[]);
    }

    fn on_hello_ack(&mut self) {
        if self.socket.is_none() || self.session.role != Role::Initiator {
            return;
        }
        if self.session.phase != Phase::Handshaking {
            return;
        }

        let now = self.clock.now();
        self.session.establish(now);
        if let Some(socket) = self.socket.as_mut() {
            socket.can_send = true;
            socket.last_message_at = now;
        }
        debug!("handshake complete");
    }

    fn on_reliable(&mut self, seq: u8, payload: Vec<u8>) {
        if self.socket.is_none() || self.session.phase != Phase::Connected {
            return;
        }

        match self.channel.classify_inbound(seq) {
            Inbound::Accept => {
                let now = self.clock.now();
                let queued = self
                    .socket
                    .as_mut()
                    .is_some_and(|s| s.push(MessageKind::Reliable, payload, now));
                if !queued {
                    warn!("reliable receive queue overflow");
                    self.mark_dead(DeadReason::RxQueueOverflow);
                    return;
                }
                self.channel.accept_inbound();
                let _ = self.send_frame(FrameType::ReliableAck, seq, &[]);
            }
            Inbound::Duplicate => {
                // Our ack was lost; re-ack without re-delivering.
                let _ = self.send_frame(FrameType::ReliableAck, seq, &[]);
            }
            Inbound::Desync { last_good } => {
                debug!(seq, last_good, "sequence desync, restating last accepted");
                let _ = self.send_frame(FrameType::ReliableAck, last_good, &[]);
            }
        }
    }

    fn on_reliable_ack(&mut self, seq: u8) {
        if self.channel.acknowledge(seq) {
            if let Some(socket) = self.socket.as_mut() {
                socket.can_send = true;
            }
        }
    }

    fn on_unreliable(&mut self, payload: Vec<u8>) {
        if self.session.phase != Phase::Connected {
            return;
        }
        let now = self.clock.now();
        if let Some(socket) = self.socket.as_mut() {
            // Queue-full drops are the unreliable contract.
            let _ = socket.push(MessageKind::Unreliable, payload, now);
        }
    }

    // -------------------------------------------------------------------
    // Timers and transmission
    // -------------------------------------------------------------------

    fn poll_timers(&mut self) {
        let now = self.clock.now();

        if self.session.phase == Phase::Handshaking {
            if self.session.hello_due(now, self.config.hello_interval)
                && self.send_frame(FrameType::Hello, 0, &[])
            {
                self.session.note_hello(now);
            }
            if self.session.handshake_expired(now, self.config.connect_timeout) {
                self.mark_dead(DeadReason::HandshakeTimeout);
            }
            return;
        }

        if self.session.phase != Phase::Connected {
            return;
        }

        if self.channel.retry_due(now, self.config.retry_interval) {
            if self.channel.exhausted(self.config.max_retries) {
                warn!("reliable retry budget exhausted");
                self.mark_dead(DeadReason::MaxRetries);
                return;
            }
            if let Some(pending) = self.channel.pending() {
                let (seq, payload) = (pending.seq, pending.payload.clone());
                if self.send_frame(FrameType::Reliable, seq, &payload) {
                    self.channel.note_retry(now);
                }
            }
        }

        if self.session.keepalive_due(now, self.config.keepalive_interval) {
            let _ = self.send_frame(FrameType::Keepalive, 0, &[]);
        }

        if self.session.peer_timed_out(now, self.config.peer_timeout) {
            let stats = self.stats();
            warn!(
                silent_for = ?now.saturating_sub(self.session.last_rx),
                rx_words = stats.rx_words,
                rx_frames = stats.rx_frames,
                crc_failures = stats.crc_failures,
                "peer timeout"
            );
            self.mark_dead(DeadReason::PeerTimeout);
        }
    }

    /// Push one frame into the transmit FIFO. Waits for space with a bounded
    /// spin that never pumps the receiver; false means the frame did not go
    /// out (the peer's retransmission recovers the exchange).
    fn send_frame(&mut self, frame_type: FrameType, seq: u8, payload: &[u8]) -> bool {
        if !self.hw_present {
            return false;
        }
        debug_assert!(payload.len() <= MAX_PAYLOAD);

        let words = encode_words(frame_type, seq, payload);
        if !self.tx_wait_space(FRAME_HEADER_WORDS as u32) {
            return false;
        }
        for (index, &word) in words.iter().enumerate() {
            if index >= FRAME_HEADER_WORDS && !self.tx_wait_space(1) {
                // Aborting mid-frame leaves garbage words on the wire; the
                // peer's magic hunt discards them.
                return false;
            }
            self.device.push_word(word);
        }

        self.session.note_tx(self.clock.now());
        true
    }

    fn tx_wait_space(&mut self, words: u32) -> bool {
        for _ in 0..TX_WAIT_SPINS {
            let status = self.device.read_status();
            if status & status::TX_FULL == 0 && self.device.tx_space() >= words {
                return true;
            }
        }
        false
    }

    // -------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------

    fn reset_protocol(&mut self) {
        self.session.reset();
        self.channel.reset();
        self.parser.reset();
        self.incoming_pending = false;
    }

    fn alloc_socket(&mut self, address: &str) -> SocketId {
        self.next_socket_id = self.next_socket_id.wrapping_add(1);
        let id = SocketId(self.next_socket_id);
        self.socket = Some(LinkSocket::new(id, address));
        id
    }

    fn validate(&self, sock: SocketId) -> Result<(), LinkError> {
        match &self.socket {
            Some(socket) if socket.id() == sock => Ok(()),
            _ => Err(LinkError::BadSocket),
        }
    }

    fn mark_dead(&mut self, reason: DeadReason) {
        warn!(%reason, "transport dead");
        self.session.mark_dead(reason);
        self.channel.abandon();
        if let Some(socket) = self.socket.as_mut() {
            socket.can_send = false;
        }
    }
}
