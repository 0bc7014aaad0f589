//! Protocol constants for the link-cable transport.
//!
//! Wire-format values are fixed by the protocol and MUST NOT be changed;
//! both ends of the cable have to agree on them bit-for-bit. Timing values
//! are the defaults picked up by [`LinkConfig::default`](crate::transport::LinkConfig).

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Frame magic constant, word 0 of every frame ("QFME").
pub const FRAME_MAGIC: u32 = 0x5146_4D45;

/// Hardware identity register value ("LNK1"); anything else means no link
/// peripheral is present.
pub const HW_ID: u32 = 0x4C4E_4B31;

/// Maximum payload bytes in one frame (the engine's maximum message size).
pub const MAX_PAYLOAD: usize = 8000;

/// Fixed words preceding the payload: magic, header, checksum.
pub const FRAME_HEADER_WORDS: usize = 3;

// =============================================================================
// TIMING
// =============================================================================

/// Give up on an outbound connection attempt after this long without a
/// HelloAck.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Re-send Hello at this interval while handshaking.
pub const HELLO_INTERVAL: Duration = Duration::from_millis(100);

/// Re-send the pending reliable message at this interval until acked.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Send a Keepalive if nothing has been transmitted for this long.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Declare the peer gone after this long without any received frame.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(2);

/// Retransmissions of one reliable message before the transport is declared
/// dead.
pub const MAX_RETRIES: u32 = 20;

// =============================================================================
// POLLING BUDGETS
// =============================================================================

/// Words consumed from the receive FIFO per pump call. Bounds the time one
/// driver call can spend parsing even with a deep backlog queued.
pub const POLL_WORD_BUDGET: usize = 128;

/// Status-poll iterations to wait for transmit FIFO space before a send is
/// abandoned. The wait never pumps the receiver.
pub const TX_WAIT_SPINS: u32 = 500_000;

// =============================================================================
// SOCKET LIMITS
// =============================================================================

/// Cap on buffered receive-queue bytes per socket, counting each record's
/// 4-byte header and word alignment. A reliable message that would overflow
/// this kills the session; an unreliable one is dropped.
pub const RECV_QUEUE_LIMIT: usize = 8192;

/// Host cache capacity.
pub const HOST_CACHE_SIZE: usize = 8;

/// Host tokens accepted by `connect`; anything else is rejected without
/// touching hardware.
pub const ACCEPTED_HOSTS: [&str; 3] = ["link", "PocketLink", "gba-link"];

/// Display name of the synthetic host-cache entry.
pub const HOST_NAME: &str = "PocketLink";

/// Canonical name of the synthetic host-cache entry.
pub const HOST_CNAME: &str = "link";
