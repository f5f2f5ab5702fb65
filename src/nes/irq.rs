use log::debug;
use serde::Serialize;

use super::NesTime;

/// Countdown value after reset and after the counter expires.
pub const IRQ_COUNT_RELOAD: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IrqState {
    Disabled,
    Armed(NesTime),
    Pending,
}

/// One-shot cycle countdown anchored to the frame-relative CPU clock.
///
/// Instead of decrementing every cycle, the timer stores the absolute cycle
/// it expires at and only materialises the remaining count when asked to run
/// up to some time. Expiry latches `pending` and disarms; software must
/// re-enable to arm it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqTimer {
    pub(crate) enabled: bool,
    pub(crate) pending: bool,
    pub(crate) count: u16,
    pub(crate) next_time: NesTime,
}

impl Default for IrqTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqTimer {
    pub fn new() -> Self {
        Self {
            enabled: false,
            pending: false,
            count: IRQ_COUNT_RELOAD,
            next_time: 0,
        }
    }

    pub fn state(&self) -> IrqState {
        if self.pending {
            IrqState::Pending
        } else if self.enabled {
            IrqState::Armed(self.next_time)
        } else {
            IrqState::Disabled
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Restores the latch from outside the register block.
    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    /// Remaining cycles as of the last `run_until`.
    pub fn count(&self) -> u16 {
        self.count
    }

    fn rearm(&mut self, present: NesTime) {
        if self.enabled {
            self.next_time = present + NesTime::from(self.count);
        }
    }

    /// Disabling also drops a pending IRQ; enabling leaves it latched.
    pub fn set_enabled(&mut self, enabled: bool, present: NesTime) {
        self.enabled = enabled;
        if !enabled {
            self.pending = false;
        }
        self.rearm(present);
    }

    pub fn set_count_low(&mut self, data: u8, present: NesTime) {
        self.count = (self.count & 0xFF00) | data as u16;
        self.rearm(present);
    }

    pub fn set_count_high(&mut self, data: u8, present: NesTime) {
        self.count = (self.count & 0x00FF) | ((data as u16) << 8);
        self.rearm(present);
    }

    pub fn run_until(&mut self, end_time: NesTime) {
        if !self.enabled {
            return;
        }
        if self.next_time <= end_time {
            debug!("IRQ counter expired at cycle {}", self.next_time);
            self.pending = true;
            self.enabled = false;
            self.count = IRQ_COUNT_RELOAD;
        } else {
            let remaining = (self.next_time - end_time).min(NesTime::from(IRQ_COUNT_RELOAD));
            self.count = remaining as u16;
        }
    }

    /// Advances to the frame boundary and rebases the deadline so the next
    /// frame starts at cycle zero.
    pub fn end_frame(&mut self, end_time: NesTime) {
        self.run_until(end_time);
        self.next_time = self.next_time.saturating_sub(end_time);
        if self.enabled {
            assert!(
                self.next_time >= 0,
                "IRQ deadline {} precedes the frame boundary {end_time}",
                self.next_time + end_time
            );
        }
    }

    pub fn next_irq(&self, present: NesTime) -> Option<NesTime> {
        if self.pending {
            Some(present)
        } else if self.enabled {
            Some(self.next_time)
        } else {
            None
        }
    }
}
