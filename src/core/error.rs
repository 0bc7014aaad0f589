//! Error types for the link-cable transport.

use std::time::Duration;

use thiserror::Error;

/// Why a live session was torn down.
///
/// Every one of these is fatal to the current session only; the caller can
/// `close` and then `connect`/`listen` again to start over.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeadReason {
    /// No HelloAck arrived within the connect timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The pending reliable message exhausted its retry budget.
    #[error("reliable retry budget exhausted")]
    MaxRetries,

    /// Nothing was received from the peer for the peer-timeout interval.
    #[error("peer timed out")]
    PeerTimeout,

    /// The peer sent an explicit Reset frame.
    #[error("reset frame received")]
    ResetReceived,

    /// An in-order reliable payload could not be queued for the consumer.
    /// Dropping it silently would desynchronize delivery order, so the
    /// session dies instead.
    #[error("receive queue overflow")]
    RxQueueOverflow,
}

/// Errors surfaced by the driver API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The identity register did not read back the expected magic.
    #[error("link hardware not detected (id register read 0x{0:08x})")]
    HardwareAbsent(u32),

    /// The driver has not been initialized, or init failed.
    #[error("link hardware not initialized")]
    NotInitialized,

    /// `connect` was given a host token outside the accepted set.
    #[error("unknown host {0:?}")]
    UnknownHost(String),

    /// A connection attempt or session is already active.
    #[error("a connection is already active")]
    AlreadyConnected,

    /// No HelloAck within the configured deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The session died; the reason says why.
    #[error("transport dead: {0}")]
    TransportDead(DeadReason),

    /// The socket handle is stale or belongs to a previous session.
    #[error("stale socket handle")]
    BadSocket,

    /// Payload larger than one frame can carry.
    #[error("payload of {len} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge {
        /// Bytes the caller tried to send.
        len: usize,
        /// Maximum frame payload.
        max: usize,
    },
}
