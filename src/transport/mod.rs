//! The link transport: framing, parsing, session state, and the driver.
//!
//! ```text
//!   caller (network layer)
//!        |
//!   [ LinkDriver ]  public surface: connect / listen / send / get
//!     |    |    |
//!     |    |    +-- [ Session ] + [ ReliableChannel ]   protocol state
//!     |    +------- [ FrameParser ]                     word -> Frame
//!     +------------ [ LinkDevice<B: LinkBus> ]          register file
//!                         |
//!                    MMIO or simulator
//! ```
//!
//! Everything above [`LinkBus`] is hardware-agnostic and exercised by the
//! simulator; the bus trait is the single seam the real peripheral plugs
//! into.

mod channel;
mod device;
mod driver;
mod frame;
mod parser;
mod session;
mod socket;

pub use channel::{Inbound, PendingMessage, ReliableChannel};
pub use device::{LinkBus, LinkDevice, Reg, ctrl, status};
pub use driver::{LinkConfig, LinkDriver, LinkStats, SendOutcome};
pub use frame::{Frame, FrameType, crc16, crc16_update, encode_words, header_word, payload_word};
pub use parser::{FrameParser, ParseOutcome};
pub use session::{Phase, Role, Session};
pub use socket::{HostCache, HostEntry, LinkSocket, Message, MessageKind, SocketId};
