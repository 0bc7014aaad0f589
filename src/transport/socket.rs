//! Socket receive queue, delivered messages, and the host cache.
//!
//! The socket here is the seam to the external network layer: the driver
//! enqueues verified, in-order payloads and the consumer drains them with
//! `get_message`. Queue accounting mirrors the engine's buffer: each record
//! costs a 4-byte header plus its payload, rounded up to a word boundary,
//! against a fixed byte cap.

use std::collections::VecDeque;
use std::time::Duration;

use crate::core::constants::{HOST_CACHE_SIZE, RECV_QUEUE_LIMIT};

/// Generation-counter socket handle. A handle from a closed or superseded
/// session no longer validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub(crate) u32);

/// How a message was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Arrived on the reliable channel, in order, exactly once.
    Reliable = 1,
    /// Arrived on the unreliable path.
    Unreliable = 2,
}

/// One message delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Delivery class.
    pub kind: MessageKind,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

/// Per-session socket state owned by the driver.
#[derive(Debug)]
pub struct LinkSocket {
    id: SocketId,
    /// Peer address string, e.g. `"link:client"`.
    pub address: String,
    /// Whether a reliable send would currently be accepted.
    pub can_send: bool,
    /// When the last message was queued.
    pub last_message_at: Duration,
    queue: VecDeque<Message>,
    queued_bytes: usize,
}

impl LinkSocket {
    /// New empty socket.
    pub fn new(id: SocketId, address: &str) -> Self {
        Self {
            id,
            address: address.to_owned(),
            can_send: false,
            last_message_at: Duration::ZERO,
            queue: VecDeque::new(),
            queued_bytes: 0,
        }
    }

    /// This socket's handle.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Byte cost of queueing `len` payload bytes (record header + word
    /// alignment).
    fn record_size(len: usize) -> usize {
        (len + 4).div_ceil(4) * 4
    }

    /// Queue a message for the consumer. Returns false when the byte cap
    /// would be exceeded; the caller decides whether that is fatal
    /// (reliable) or a silent drop (unreliable).
    pub fn push(&mut self, kind: MessageKind, payload: Vec<u8>, now: Duration) -> bool {
        let cost = Self::record_size(payload.len());
        if self.queued_bytes + cost > RECV_QUEUE_LIMIT {
            return false;
        }
        self.queued_bytes += cost;
        self.queue.push_back(Message { kind, payload });
        self.last_message_at = now;
        true
    }

    /// Dequeue the oldest message, if any.
    pub fn pop(&mut self) -> Option<Message> {
        let message = self.queue.pop_front()?;
        self.queued_bytes -= Self::record_size(message.payload.len());
        Some(message)
    }

    /// Number of queued messages.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// One discovered host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Display name.
    pub name: String,
    /// Current map, when known.
    pub map: String,
    /// Active players.
    pub users: u32,
    /// Player capacity.
    pub max_users: u32,
    /// Canonical connect token.
    pub cname: String,
}

/// Fixed-capacity host list the UI's server browser reads.
#[derive(Debug, Default)]
pub struct HostCache {
    entries: Vec<HostEntry>,
}

impl HostCache {
    /// New empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry unless one with the same cname already exists or the
    /// cache is full. Repeated polls therefore never duplicate the link
    /// peer's entry.
    pub fn ensure(&mut self, entry: HostEntry) {
        if self.entries.iter().any(|e| e.cname == entry.cname) {
            return;
        }
        if self.entries.len() >= HOST_CACHE_SIZE {
            return;
        }
        self.entries.push(entry);
    }

    /// The discovered hosts.
    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_and_accounting() {
        let mut socket = LinkSocket::new(SocketId(1), "link:peer");
        assert!(socket.push(MessageKind::Reliable, b"one".to_vec(), Duration::ZERO));
        assert!(socket.push(MessageKind::Unreliable, b"two".to_vec(), Duration::ZERO));
        assert_eq!(socket.queued(), 2);

        let first = socket.pop().unwrap();
        assert_eq!(first.kind, MessageKind::Reliable);
        assert_eq!(first.payload, b"one");
        let second = socket.pop().unwrap();
        assert_eq!(second.kind, MessageKind::Unreliable);
        assert!(socket.pop().is_none());
        assert_eq!(socket.queued_bytes, 0);
    }

    #[test]
    fn queue_cap_is_enforced_and_recovers() {
        let mut socket = LinkSocket::new(SocketId(1), "link:peer");
        // Each 1020-byte record costs 1024 bytes; eight fill the cap exactly.
        for _ in 0..8 {
            assert!(socket.push(MessageKind::Reliable, vec![0; 1020], Duration::ZERO));
        }
        assert!(!socket.push(MessageKind::Reliable, vec![0; 1020], Duration::ZERO));
        assert!(!socket.push(MessageKind::Reliable, vec![], Duration::ZERO));

        socket.pop();
        assert!(socket.push(MessageKind::Reliable, vec![0; 1020], Duration::ZERO));
    }

    #[test]
    fn host_cache_insert_is_idempotent() {
        let mut cache = HostCache::new();
        let entry = HostEntry {
            name: "PocketLink".into(),
            map: String::new(),
            users: 0,
            max_users: 2,
            cname: "link".into(),
        };
        cache.ensure(entry.clone());
        cache.ensure(entry.clone());
        assert_eq!(cache.entries().len(), 1);
        assert_eq!(cache.entries()[0], entry);
    }
}
