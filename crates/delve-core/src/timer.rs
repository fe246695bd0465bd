//! Countdown timers advanced explicitly by the elapsed time of each tick.
//!
//! A timer never calls back into its owner. `advance` reports how many
//! times it fired during the step and the owner decides what that means.
//! Cancelling a timer is dropping it.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    period: Fixed64,
    remaining: Fixed64,
    repeating: bool,
    finished: bool,
}

impl Countdown {
    /// A timer that fires every `period`, indefinitely.
    pub fn repeating(period: Fixed64) -> Self {
        Self {
            period,
            remaining: period,
            repeating: true,
            finished: false,
        }
    }

    /// A timer that fires once after `delay`.
    pub fn once(delay: Fixed64) -> Self {
        Self {
            period: delay,
            remaining: delay,
            repeating: false,
            finished: false,
        }
    }

    /// Advance by `dt` and return the number of firings in this step.
    ///
    /// One-shot timers fire at most once. A repeating timer with a
    /// non-positive period never fires.
    pub fn advance(&mut self, dt: Fixed64) -> u32 {
        if self.finished || dt <= Fixed64::ZERO {
            return 0;
        }
        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining > Fixed64::ZERO {
            return 0;
        }
        if !self.repeating {
            self.finished = true;
            self.remaining = Fixed64::ZERO;
            return 1;
        }
        if self.period <= Fixed64::ZERO {
            self.finished = true;
            return 0;
        }
        let mut fired = 0;
        while self.remaining <= Fixed64::ZERO {
            fired += 1;
            self.remaining += self.period;
        }
        fired
    }

    pub fn period(&self) -> Fixed64 {
        self.period
    }

    pub fn remaining(&self) -> Fixed64 {
        self.remaining
    }

    /// Fraction of the current period already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> Fixed64 {
        if self.period <= Fixed64::ZERO {
            return Fixed64::ONE;
        }
        let elapsed = self.period - self.remaining;
        (elapsed / self.period).clamp(Fixed64::ZERO, Fixed64::ONE)
    }

    /// True once a one-shot timer has fired.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
