//! # Mega II interval timer
//!
//! Drives the one-second RTC interrupt and the quarter-second Mega II
//! interrupt.  Counters accumulate Mega II cycles (one cycle ≈ 1 µs)
//! delivered by the machine's device sync loop.

use super::irq;

pub const TIMER_1SEC_US: u32 = 1_000_000;
pub const TIMER_QSEC_US: u32 = 250_000;

pub const FLAG_1SEC_ENABLED: u32 = 0x1;
pub const FLAG_QSEC_ENABLED: u32 = 0x2;

#[derive(Default)]
pub struct Timer {
    pub irq_1sec_us: u32,
    pub irq_qtrsec_us: u32,
    pub flags: u32,
    pub irq_line: u32
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    /// Advance by `delta_us` microseconds and fold any fired interrupts
    /// into the machine IRQ line.
    pub fn sync(&mut self,delta_us: u32,mut irq_line: u32) -> u32 {
        self.irq_1sec_us += delta_us;
        self.irq_qtrsec_us += delta_us;
        while self.irq_1sec_us >= TIMER_1SEC_US {
            self.irq_1sec_us -= TIMER_1SEC_US;
            if self.flags & FLAG_1SEC_ENABLED != 0 {
                self.irq_line |= irq::TIMER_1SEC;
                irq_line |= irq::TIMER_1SEC;
            }
        }
        while self.irq_qtrsec_us >= TIMER_QSEC_US {
            self.irq_qtrsec_us -= TIMER_QSEC_US;
            if self.flags & FLAG_QSEC_ENABLED != 0 {
                self.irq_line |= irq::TIMER_QSEC;
                irq_line |= irq::TIMER_QSEC;
            }
        }
        irq_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::irq;

    #[test]
    fn qsec_fires_only_when_enabled() {
        let mut timer = Timer::new();
        let line = timer.sync(TIMER_QSEC_US,0);
        assert_eq!(line,0);
        timer.flags |= FLAG_QSEC_ENABLED;
        let line = timer.sync(TIMER_QSEC_US,0);
        assert_ne!(line & irq::TIMER_QSEC,0);
        assert_eq!(line & irq::TIMER_1SEC,0);
    }

    #[test]
    fn one_sec_accumulates() {
        let mut timer = Timer::new();
        timer.flags |= FLAG_1SEC_ENABLED;
        let mut line = 0;
        for _ in 0..9 {
            line = timer.sync(TIMER_1SEC_US / 10,line);
        }
        assert_eq!(line & irq::TIMER_1SEC,0);
        line = timer.sync(TIMER_1SEC_US / 10,line);
        assert_ne!(line & irq::TIMER_1SEC,0);
    }
}
