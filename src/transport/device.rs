//! Transport device adapter: the thin layer over the link peripheral's
//! register file.
//!
//! Register map (offsets from the peripheral base):
//!
//! ```text
//! +0x00 ID        RO  must read 0x4C4E4B31 ("LNK1")
//! +0x04 VERSION   RO  version/caps bitfield (read during probe, else unused)
//! +0x08 STATUS    RO  see [`status`]
//! +0x0C CTRL      WO  see [`ctrl`]
//! +0x10 TX_DATA   WO  push one 32-bit transport word
//! +0x14 RX_DATA   RO  pop one 32-bit transport word
//! +0x18 TX_SPACE  RO  free TX words (low 16 bits)
//! +0x1C RX_COUNT  RO  queued RX words (low 16 bits)
//! ```
//!
//! This contract is what the driver expects of the hardware; it has to be
//! validated against the real part, in particular the polarity of the
//! `tx_full`/`rx_empty` status bits.

use crate::core::LinkError;
use crate::core::constants::HW_ID;

/// Link peripheral registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Reg {
    /// Identity register.
    Id = 0x00,
    /// Version/capability bitfield.
    Version = 0x04,
    /// Status bits.
    Status = 0x08,
    /// Control bits.
    Ctrl = 0x0C,
    /// Transmit word push.
    TxData = 0x10,
    /// Receive word pop.
    RxData = 0x14,
    /// Free transmit words.
    TxSpace = 0x18,
    /// Queued receive words.
    RxCount = 0x1C,
}

impl Reg {
    /// Byte offset from the peripheral base.
    pub fn offset(self) -> usize {
        self as u32 as usize
    }
}

/// STATUS register bits.
pub mod status {
    /// Cable detected and clocking.
    pub const LINK_UP: u32 = 1 << 0;
    /// Peer device responding.
    pub const PEER_PRESENT: u32 = 1 << 1;
    /// Transmit FIFO has no free words.
    pub const TX_FULL: u32 = 1 << 2;
    /// Receive FIFO has no queued words.
    pub const RX_EMPTY: u32 = 1 << 3;
    /// Hardware-level CRC error latched.
    pub const RX_CRC_ERR: u32 = 1 << 4;
    /// Receive FIFO overflowed.
    pub const RX_OVERFLOW: u32 = 1 << 5;
    /// Transmit FIFO overflowed.
    pub const TX_OVERFLOW: u32 = 1 << 6;
    /// Word-clock desynchronization latched.
    pub const DESYNC: u32 = 1 << 7;
}

/// CTRL register bits. `ENABLE` and the role bits are level flags carried on
/// every write; the rest are one-shot pulses.
pub mod ctrl {
    /// Peripheral enable.
    pub const ENABLE: u32 = 1 << 0;
    /// Full peripheral reset.
    pub const RESET: u32 = 1 << 1;
    /// Clear latched error flags.
    pub const CLEAR_ERR: u32 = 1 << 2;
    /// Flush the receive FIFO.
    pub const FLUSH_RX: u32 = 1 << 3;
    /// Flush the transmit FIFO.
    pub const FLUSH_TX: u32 = 1 << 4;
    /// Drive the cable clock (initiator side).
    pub const MASTER: u32 = 1 << 5;
    /// Actively poll the peer for words (initiator side).
    pub const POLL: u32 = 1 << 6;
}

/// Raw register access. The one hardware seam in the crate: the real part
/// implements this with volatile MMIO, the simulator with shared queues.
pub trait LinkBus {
    /// Read one 32-bit register.
    fn read(&mut self, reg: Reg) -> u32;
    /// Write one 32-bit register.
    fn write(&mut self, reg: Reg, value: u32);
}

/// Typed adapter over a [`LinkBus`].
///
/// Remembers the current role bits so every control write carries
/// `ENABLE | role | pulse`, matching how the peripheral expects its level
/// flags to be restated.
#[derive(Debug)]
pub struct LinkDevice<B> {
    bus: B,
    role_bits: u32,
}

impl<B: LinkBus> LinkDevice<B> {
    /// Wrap a bus. No hardware access happens until [`probe`](Self::probe).
    pub fn new(bus: B) -> Self {
        Self { bus, role_bits: 0 }
    }

    /// Check the identity register and bring the peripheral to a clean
    /// enabled state: reset pulse, clear errors, flush both FIFOs.
    pub fn probe(&mut self) -> Result<(), LinkError> {
        let id = self.bus.read(Reg::Id);
        if id != HW_ID {
            return Err(LinkError::HardwareAbsent(id));
        }

        self.bus.write(Reg::Ctrl, ctrl::RESET);
        self.role_bits = 0;
        self.pulse(ctrl::CLEAR_ERR | ctrl::FLUSH_RX | ctrl::FLUSH_TX);
        self.pulse(ctrl::CLEAR_ERR);

        // Version is currently informational only, but reading it is part of
        // the bring-up sequence the hardware expects.
        let _ = self.bus.read(Reg::Version);
        Ok(())
    }

    /// Select the cable role. The initiator drives the clock and polls the
    /// peer; the responder passively follows. Flushes both FIFOs so stale
    /// words from the previous role cannot leak into the new session.
    pub fn set_role(&mut self, initiator: bool) {
        self.role_bits = if initiator {
            ctrl::MASTER | ctrl::POLL
        } else {
            0
        };
        self.pulse(ctrl::CLEAR_ERR | ctrl::FLUSH_RX | ctrl::FLUSH_TX);
        self.pulse(ctrl::CLEAR_ERR);
    }

    /// Write CTRL with `ENABLE | role | pulse_flags`.
    pub fn pulse(&mut self, pulse_flags: u32) {
        self.bus
            .write(Reg::Ctrl, ctrl::ENABLE | self.role_bits | pulse_flags);
    }

    /// Pulse the error-clear line.
    pub fn clear_errors(&mut self) {
        self.pulse(ctrl::CLEAR_ERR);
    }

    /// Read the status bits.
    pub fn read_status(&mut self) -> u32 {
        self.bus.read(Reg::Status)
    }

    /// Free words in the transmit FIFO.
    pub fn tx_space(&mut self) -> u32 {
        self.bus.read(Reg::TxSpace) & 0xFFFF
    }

    /// Words queued in the receive FIFO.
    pub fn rx_count(&mut self) -> u32 {
        self.bus.read(Reg::RxCount) & 0xFFFF
    }

    /// Push one word into the transmit FIFO. The caller is responsible for
    /// having checked space.
    pub fn push_word(&mut self, word: u32) {
        self.bus.write(Reg::TxData, word);
    }

    /// Pop one word from the receive FIFO. The caller is responsible for
    /// having checked `RX_EMPTY`.
    pub fn pop_word(&mut self) -> u32 {
        self.bus.read(Reg::RxData)
    }

    /// Raw reset, leaving the peripheral disabled. Used on shutdown.
    pub fn shutdown(&mut self) {
        self.bus.write(Reg::Ctrl, ctrl::RESET);
        self.role_bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every register access.
    struct TraceBus {
        id: u32,
        writes: Vec<(Reg, u32)>,
    }

    impl TraceBus {
        fn new(id: u32) -> Self {
            Self { id, writes: vec![] }
        }
    }

    impl LinkBus for TraceBus {
        fn read(&mut self, reg: Reg) -> u32 {
            match reg {
                Reg::Id => self.id,
                _ => 0,
            }
        }

        fn write(&mut self, reg: Reg, value: u32) {
            self.writes.push((reg, value));
        }
    }

    #[test]
    fn probe_rejects_wrong_id() {
        let mut dev = LinkDevice::new(TraceBus::new(0xDEAD_BEEF));
        assert_eq!(dev.probe(), Err(LinkError::HardwareAbsent(0xDEAD_BEEF)));
    }

    #[test]
    fn probe_resets_then_flushes() {
        let mut dev = LinkDevice::new(TraceBus::new(HW_ID));
        dev.probe().unwrap();

        let writes = &dev.bus.writes;
        assert_eq!(writes[0], (Reg::Ctrl, ctrl::RESET));
        assert_eq!(
            writes[1],
            (
                Reg::Ctrl,
                ctrl::ENABLE | ctrl::CLEAR_ERR | ctrl::FLUSH_RX | ctrl::FLUSH_TX
            )
        );
        assert_eq!(writes[2], (Reg::Ctrl, ctrl::ENABLE | ctrl::CLEAR_ERR));
    }

    #[test]
    fn initiator_role_is_carried_on_every_ctrl_write() {
        let mut dev = LinkDevice::new(TraceBus::new(HW_ID));
        dev.probe().unwrap();
        dev.set_role(true);
        dev.clear_errors();

        let last = *dev.bus.writes.last().unwrap();
        assert_eq!(
            last,
            (
                Reg::Ctrl,
                ctrl::ENABLE | ctrl::MASTER | ctrl::POLL | ctrl::CLEAR_ERR
            )
        );

        dev.set_role(false);
        dev.clear_errors();
        let last = *dev.bus.writes.last().unwrap();
        assert_eq!(last, (Reg::Ctrl, ctrl::ENABLE | ctrl::CLEAR_ERR));
    }
}
