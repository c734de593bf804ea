//! # Clock and cycle accounting
//!
//! All components share one 64-bit monotonically increasing clock counter.
//! The counter advances by a *step* on every CPU memory cycle; the step is
//! either the fast (FPI, 2.8 MHz class) or the slow (Mega II, 1.023 MHz
//! class) constant depending on where the access lands.  The Mega II step
//! doubles as the immutable reference for converting between clock units
//! and nanoseconds.

use serde::{Serialize,Deserialize};

/// Clock units spent per CPU cycle on the fast (FPI) side
pub const CLOCKS_STEP_FAST: u32 = 1023;
/// Clock units spent per CPU cycle on the Mega II (PHI0) side
pub const CLOCKS_STEP_MEGA2: u32 = 2864;
/// Duration of one Mega II cycle in nanoseconds
pub const MEGA2_CYCLE_NS: u32 = 1023;
/// Mega II cycles per 1/60th of a second, used by the device sync loop
pub const MEGA2_CYCLES_PER_60TH: u32 = 17030;

pub const NS_PER_SECOND: u64 = 1_000_000_000;

/// The machine's time reference.  `clocks_step` is whatever the speed
/// register last selected; `clocks_step_mega2` never changes once the
/// machine is built and is the reference step for ns conversions.
#[derive(Clone,Serialize,Deserialize)]
pub struct TimeSpec {
    pub clocks_spent: u64,
    pub clocks_step: u32,
    pub clocks_step_fast: u32,
    pub clocks_step_mega2: u32
}

impl TimeSpec {
    pub fn new() -> Self {
        Self {
            clocks_spent: 0,
            clocks_step: CLOCKS_STEP_MEGA2,
            clocks_step_fast: CLOCKS_STEP_FAST,
            clocks_step_mega2: CLOCKS_STEP_MEGA2
        }
    }
    /// Convert a span of clock units to nanoseconds using the reference step
    pub fn ns_from_clocks(&self,clocks: u64) -> u64 {
        clocks * MEGA2_CYCLE_NS as u64 / self.clocks_step_mega2 as u64
    }
    /// Convert nanoseconds to clock units using the reference step
    pub fn clocks_from_ns(&self,ns: u32) -> u32 {
        (ns as u64 * self.clocks_step_mega2 as u64 / MEGA2_CYCLE_NS as u64) as u32
    }
    /// Number of whole Mega II cycles since power-on
    pub fn mega2_cycles(&self) -> u64 {
        self.clocks_spent / self.clocks_step_mega2 as u64
    }
    pub fn is_fast(&self) -> bool {
        self.clocks_step == self.clocks_step_fast
    }
}

/// Saturating countdown used by the drive and IWM timers
pub fn timer_decrement(timer_ns: u32,dt_ns: u32) -> u32 {
    timer_ns.saturating_sub(dt_ns)
}

/// Saturating count-up clamped to `timer_max_ns`
pub fn timer_increment(timer_ns: u32,timer_max_ns: u32,dt_ns: u32) -> u32 {
    timer_ns.saturating_add(dt_ns).min(timer_max_ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ns_round_trip() {
        let tspec = TimeSpec::new();
        // one mega2 step is one mega2 cycle
        assert_eq!(tspec.ns_from_clocks(CLOCKS_STEP_MEGA2 as u64),MEGA2_CYCLE_NS as u64);
        // 4us bit cell
        let clocks = tspec.clocks_from_ns(4000);
        assert_eq!(tspec.ns_from_clocks(clocks as u64),4000);
    }

    #[test]
    fn timers_saturate() {
        assert_eq!(timer_decrement(100,250),0);
        assert_eq!(timer_increment(u32::MAX-1,u32::MAX,500),u32::MAX);
        assert_eq!(timer_increment(100,1_000_000,250),350);
    }
}
