//! In-memory link peripheral and clock for deterministic tests.
//!
//! [`link_pair`] returns two bus endpoints wired back to back: words pushed
//! into one end's transmit FIFO appear in the other end's receive FIFO.
//! Endpoints are cheap clones over shared queues, so a test can keep a clone
//! of a driver's own bus to inject crafted peer traffic ([`SimBus::inject_rx`])
//! or to observe and steal what the driver transmitted ([`SimBus::drain_tx`]).
//!
//! [`SimClock`] only moves when the test calls [`advance`](SimClock::advance),
//! which makes every timer decision reproducible. Never hand it to a blocking
//! call like `connect`, which spins on the clock and would never see the
//! deadline pass.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::core::Clock;
use crate::transport::{LinkBus, Reg, ctrl, status};

/// Default FIFO depth in words for a simulated endpoint.
pub const SIM_FIFO_WORDS: usize = 4096;

/// Version word reported by the simulated peripheral.
const SIM_VERSION: u32 = 0x0001_0000;

type WordQueue = Rc<RefCell<VecDeque<u32>>>;

/// One endpoint of a simulated cable.
#[derive(Debug, Clone)]
pub struct SimBus {
    id: u32,
    rx: WordQueue,
    tx: WordQueue,
    capacity: usize,
    last_ctrl: Rc<Cell<u32>>,
}

impl SimBus {
    fn endpoint(rx: WordQueue, tx: WordQueue, capacity: usize) -> Self {
        Self {
            id: crate::core::constants::HW_ID,
            rx,
            tx,
            capacity,
            last_ctrl: Rc::new(Cell::new(0)),
        }
    }

    /// A bus whose identity register reads zero, as an empty slot does.
    pub fn absent() -> Self {
        let mut bus = Self::endpoint(
            Rc::new(RefCell::new(VecDeque::new())),
            Rc::new(RefCell::new(VecDeque::new())),
            SIM_FIFO_WORDS,
        );
        bus.id = 0;
        bus
    }

    /// Append raw words to this endpoint's receive FIFO, as if the peer had
    /// transmitted them.
    pub fn inject_rx(&self, words: &[u32]) {
        let mut rx = self.rx.borrow_mut();
        for &word in words {
            if rx.len() < self.capacity {
                rx.push_back(word);
            }
        }
    }

    /// Take every word this endpoint has transmitted. On a paired bus this
    /// doubles as loss injection: drained words never reach the peer.
    pub fn drain_tx(&self) -> Vec<u32> {
        self.tx.borrow_mut().drain(..).collect()
    }

    /// Words waiting in the receive FIFO.
    pub fn rx_len(&self) -> usize {
        self.rx.borrow().len()
    }

    /// Words waiting in the transmit FIFO.
    pub fn tx_len(&self) -> usize {
        self.tx.borrow().len()
    }

    /// The most recent CTRL write.
    pub fn last_ctrl(&self) -> u32 {
        self.last_ctrl.get()
    }
}

impl LinkBus for SimBus {
    fn read(&mut self, reg: Reg) -> u32 {
        match reg {
            Reg::Id => self.id,
            Reg::Version => SIM_VERSION,
            Reg::Status => {
                let mut bits = status::LINK_UP | status::PEER_PRESENT;
                if self.tx.borrow().len() >= self.capacity {
                    bits |= status::TX_FULL;
                }
                if self.rx.borrow().is_empty() {
                    bits |= status::RX_EMPTY;
                }
                bits
            }
            Reg::RxData => self.rx.borrow_mut().pop_front().unwrap_or(0),
            Reg::TxSpace => (self.capacity - self.tx.borrow().len()) as u32,
            Reg::RxCount => self.rx.borrow().len() as u32,
            // Write-only registers read as zero.
            Reg::Ctrl | Reg::TxData => 0,
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        match reg {
            Reg::Ctrl => {
                self.last_ctrl.set(value);
                if value & ctrl::RESET != 0 {
                    self.rx.borrow_mut().clear();
                    self.tx.borrow_mut().clear();
                    return;
                }
                if value & ctrl::FLUSH_RX != 0 {
                    self.rx.borrow_mut().clear();
                }
                if value & ctrl::FLUSH_TX != 0 {
                    self.tx.borrow_mut().clear();
                }
            }
            Reg::TxData => {
                let mut tx = self.tx.borrow_mut();
                // A full FIFO drops the word, like the hardware.
                if tx.len() < self.capacity {
                    tx.push_back(value);
                }
            }
            // Writes to read-only registers are ignored.
            _ => {}
        }
    }
}

/// Two endpoints wired back to back with the default FIFO depth.
pub fn link_pair() -> (SimBus, SimBus) {
    link_pair_with_capacity(SIM_FIFO_WORDS)
}

/// Two endpoints wired back to back with a chosen FIFO depth. Small depths
/// are useful for exercising back-pressure paths.
pub fn link_pair_with_capacity(capacity: usize) -> (SimBus, SimBus) {
    let a_to_b: WordQueue = Rc::new(RefCell::new(VecDeque::new()));
    let b_to_a: WordQueue = Rc::new(RefCell::new(VecDeque::new()));
    let a = SimBus::endpoint(b_to_a.clone(), a_to_b.clone(), capacity);
    let b = SimBus::endpoint(a_to_b, b_to_a, capacity);
    (a, b)
}

/// Manually advanced monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute reading.
    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_crosswired() {
        let (mut a, mut b) = link_pair();
        a.write(Reg::TxData, 0xAABB_CCDD);
        assert_eq!(b.read(Reg::RxCount), 1);
        assert_eq!(b.read(Reg::RxData), 0xAABB_CCDD);
        assert_eq!(b.read(Reg::RxCount), 0);
    }

    #[test]
    fn status_tracks_fifo_levels() {
        let (mut a, mut b) = link_pair_with_capacity(2);
        assert_ne!(a.read(Reg::Status) & status::RX_EMPTY, 0);
        assert_eq!(a.read(Reg::Status) & status::TX_FULL, 0);

        a.write(Reg::TxData, 1);
        a.write(Reg::TxData, 2);
        assert_ne!(a.read(Reg::Status) & status::TX_FULL, 0);
        assert_eq!(a.read(Reg::TxSpace), 0);

        // Overflowing word is dropped, not wrapped.
        a.write(Reg::TxData, 3);
        assert_eq!(b.read(Reg::RxCount), 2);
        assert_eq!(b.read(Reg::Status) & status::RX_EMPTY, 0);
    }

    #[test]
    fn flushes_target_the_right_fifo() {
        let (mut a, _b) = link_pair();
        a.write(Reg::TxData, 7);
        a.inject_rx(&[9]);

        a.write(Reg::Ctrl, ctrl::ENABLE | ctrl::FLUSH_TX);
        assert_eq!(a.tx_len(), 0);
        assert_eq!(a.rx_len(), 1);

        a.write(Reg::Ctrl, ctrl::ENABLE | ctrl::FLUSH_RX);
        assert_eq!(a.rx_len(), 0);
    }

    #[test]
    fn clones_share_queues() {
        let (bus, _peer) = link_pair();
        let handle = bus.clone();
        handle.inject_rx(&[1, 2, 3]);

        let mut bus = bus;
        assert_eq!(bus.read(Reg::RxData), 1);
        assert_eq!(handle.rx_len(), 2);
    }

    #[test]
    fn sim_clock_only_moves_when_told() {
        let clock = SimClock::new();
        let observer = clock.clone();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(50));
        assert_eq!(observer.now(), Duration::from_millis(50));

        observer.set(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }
}
