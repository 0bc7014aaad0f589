//! Reliable link-cable transport for the handheld's game-to-game port.
//!
//! The cable hardware moves raw 32-bit words between two devices through a
//! pair of FIFOs and guarantees nothing else: words can be dropped,
//! corrupted, or duplicated, and either end can disappear mid-session. This
//! crate layers a framed, checksummed, acknowledged transport on top, sized
//! for a two-player game session:
//!
//! - frames carry a magic word, a type/sequence/length header, and a CRC-16
//!   so the receiver can resynchronize and discard corruption
//! - a handshake establishes exactly one session between an initiator and a
//!   listening responder
//! - reliable messages are delivered in order, exactly once, with
//!   retransmission; unreliable messages are fire-and-forget
//! - keepalives and timeouts detect a vanished peer
//!
//! Everything is synchronous and single-threaded, driven by the caller's
//! poll loop; there are no background tasks and no interrupts. Hardware is
//! reached only through the [`transport::LinkBus`] trait, with two backends:
//! [`mmio`] for the real peripheral (feature `mmio`) and [`sim`] for an
//! in-memory cable used by the tests (feature `sim`, on by default).
//!
//! ```
//! use pocket_link::prelude::*;
//! use pocket_link::sim::{SimClock, link_pair};
//!
//! let (a, b) = link_pair();
//! let clock = SimClock::new();
//! let mut server = LinkDriver::new(b, clock.clone());
//! let mut client = LinkDriver::new(a, clock);
//!
//! server.init()?;
//! client.init()?;
//! server.listen(true);
//!
//! let client_sock = client.start_connect("link")?;
//! let server_sock = server.check_new_connections().expect("inbound connection");
//! client.poll();
//! assert!(client.is_connected() && server.is_connected());
//!
//! client.send_message(client_sock, b"hello")?;
//! let msg = server.get_message(server_sock)?.expect("delivered");
//! assert_eq!(msg.payload, b"hello");
//! # Ok::<(), pocket_link::LinkError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
#[cfg(feature = "mmio")]
pub mod mmio;
#[cfg(feature = "sim")]
pub mod sim;
pub mod transport;

pub use crate::core::{Clock, DeadReason, LinkError, SystemClock};

/// The driver surface most callers need.
pub mod prelude {
    pub use crate::core::{Clock, DeadReason, LinkError, SystemClock};
    pub use crate::transport::{
        HostCache, LinkBus, LinkConfig, LinkDriver, Message, MessageKind, SendOutcome, SocketId,
    };
}
