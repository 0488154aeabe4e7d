//! Leader lock and sync bit detection.
//!
//! The firmware measures alternating pulse lengths in polling-loop counts and
//! accepts a high pulse when it stays within an eighth of the previous one.
//! After enough consecutive accepted pulses the search is armed, and the
//! next pulse that breaks the margin is taken as the sync bit.

use crate::error::Result;
use crate::waveform::{TRIGGER_HIGH, TRIGGER_LOW};

/// Consecutive in-margin high pulses needed before the sync bit is accepted.
pub const LEADER_MIN_HIGH_LEVELS_FOR_SYNC: u32 = 0x14;

/// Reference high pulse length before anything has been measured.
pub const LEADER_INITIAL_HIGH_ESTIMATE: u32 = 0x28;

/// Loop count at which a capped measurement gives up.
pub const PULSE_CAP: u32 = 255;

/// Source of level-change measurements, in loop iterations.
pub trait PulseProbe {
    /// Spend `offset` cycles, then poll every `loop_delay` cycles until the
    /// TTL level crosses `trigger`. With `capped` the count stops at 255.
    fn level_change_loop(&mut self, trigger: u8, offset: i64, loop_delay: i64, capped: bool) -> Result<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    SearchingLeader,
    MeasuringPulse,
    CheckingMargin { high: u32 },
    FallbackSyncWait,
}

impl LeaderState {
    pub fn is_searching(&self) -> bool {
        matches!(self, LeaderState::SearchingLeader)
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self, LeaderState::MeasuringPulse)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LeaderState::FallbackSyncWait)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue(LeaderState),
    Synchronized,
}

/// An accepted pulse must be within `reference >> 3` of the reference.
pub fn within_margin(reference: u32, high: u32) -> bool {
    reference.abs_diff(high) <= reference >> 3
}

#[derive(Debug, Clone)]
pub struct LeaderSearch {
    state: LeaderState,
    last_high: u32,
    reference: u32,
    delay: i64,
    remaining: u32,
    armed: bool,
}

impl LeaderSearch {
    pub fn new() -> Self {
        Self {
            state: LeaderState::SearchingLeader,
            last_high: LEADER_INITIAL_HIGH_ESTIMATE,
            reference: LEADER_INITIAL_HIGH_ESTIMATE,
            delay: 0,
            remaining: LEADER_MIN_HIGH_LEVELS_FOR_SYNC,
            armed: false,
        }
    }

    pub fn state(&self) -> LeaderState {
        self.state
    }

    /// True once the required run of in-margin pulses has been seen.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Cycles that will be spent before the next measurement.
    pub fn pending_delay(&self) -> i64 {
        self.delay
    }

    /// Drive the state machine until the sync bit has been consumed.
    pub fn run<P: PulseProbe>(&mut self, probe: &mut P) -> Result<()> {
        loop {
            match self.step(probe)? {
                Transition::Continue(state) => self.state = state,
                Transition::Synchronized => return Ok(()),
            }
        }
    }

    pub fn step<P: PulseProbe>(&mut self, probe: &mut P) -> Result<Transition> {
        match self.state {
            LeaderState::SearchingLeader => {
                self.reference = self.last_high;
                self.delay += 26;
                self.last_high = probe.level_change_loop(TRIGGER_LOW, self.delay, 29, false)?;
                self.delay = 22;
                self.remaining = LEADER_MIN_HIGH_LEVELS_FOR_SYNC;
                self.armed = false;
                Ok(Transition::Continue(LeaderState::MeasuringPulse))
            }
            LeaderState::MeasuringPulse => {
                let low = probe.level_change_loop(TRIGGER_HIGH, self.delay + 33, 32, true)?;
                if low >= PULSE_CAP {
                    self.delay = 25;
                    return Ok(Transition::Continue(LeaderState::SearchingLeader));
                }
                let high = probe.level_change_loop(TRIGGER_LOW, 39, 32, true)?;
                self.last_high = high;
                if high >= PULSE_CAP {
                    self.delay = 25;
                    return Ok(Transition::Continue(LeaderState::SearchingLeader));
                }
                Ok(Transition::Continue(LeaderState::CheckingMargin { high }))
            }
            LeaderState::CheckingMargin { high } => Ok(Transition::Continue(self.check_margin(high))),
            LeaderState::FallbackSyncWait => {
                probe.level_change_loop(TRIGGER_HIGH, self.delay, 17, false)?;
                probe.level_change_loop(TRIGGER_LOW, 17, 17, false)?;
                Ok(Transition::Synchronized)
            }
        }
    }

    /// Compare a measured high pulse with the previous one and pick the next state.
    pub fn check_margin(&mut self, high: u32) -> LeaderState {
        self.delay = 72 + if self.reference > high { 9 } else { 0 };
        let in_margin = within_margin(self.reference, high);
        self.reference = high;
        self.remaining = self.remaining.saturating_sub(1);

        if in_margin {
            if self.remaining != 0 {
                self.delay += 15;
            } else {
                self.armed = true;
                self.remaining = 1;
                self.delay += 30;
            }
            LeaderState::MeasuringPulse
        } else if self.remaining != 0 {
            self.delay += 15;
            LeaderState::SearchingLeader
        } else {
            self.delay += 26;
            LeaderState::FallbackSyncWait
        }
    }
}

impl Default for LeaderSearch {
    fn default() -> Self {
        Self::new()
    }
}
