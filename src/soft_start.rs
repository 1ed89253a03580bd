//! Soft-start ramp for the compensator's output limit.
//!
//! During power-up the effective output ceiling rises linearly from zero to
//! the configured maximum over a fixed number of switching periods, limiting
//! inrush stress. A power-down direction mirrors the ramp for controlled
//! shutdown.

use crate::error::ConfigError;
use crate::iq::Iq15;

/// Which way the limit ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampDirection {
    /// Limit rises from zero to the configured maximum.
    PowerUp,
    /// Limit falls from the configured maximum to zero.
    PowerDown,
}

/// Ramp state for the per-period output limit.
///
/// The limit is accumulated in a 32.16 representation of its Q15 bit
/// pattern so per-period increments smaller than one count still complete
/// the ramp in exactly the configured number of periods.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftStart {
    target: Iq15,
    limit: Iq15,
    acc: i64,
    increment: i64,
    periods: u32,
    count: u32,
    complete: bool,
}

impl SoftStart {
    /// An already-completed ramp pinned at `target`; `update` is a no-op.
    pub fn inert(target: Iq15) -> Self {
        Self {
            target,
            limit: target,
            acc: i64::from(target.to_bits()) << 16,
            increment: 0,
            periods: 0,
            count: 0,
            complete: true,
        }
    }

    /// Start a ramp lasting `ramp_ms`, updated once per `period_ns`.
    ///
    /// A ramp shorter than one switching period completes immediately.
    /// A zero `period_ns` is rejected; every valid `CycleTiming` has a
    /// nonzero period.
    pub fn arm(
        &mut self,
        ramp_ms: u32,
        period_ns: u32,
        direction: RampDirection,
    ) -> Result<(), ConfigError> {
        if period_ns == 0 {
            return Err(ConfigError::TimingBudget);
        }
        let periods = (u64::from(ramp_ms) * 1_000_000 / u64::from(period_ns)) as u32;
        let span = i64::from(self.target.to_bits()) << 16;

        self.count = 0;
        self.periods = periods;
        if periods == 0 {
            self.complete = true;
            self.limit = match direction {
                RampDirection::PowerUp => self.target,
                RampDirection::PowerDown => Iq15::ZERO,
            };
            self.acc = i64::from(self.limit.to_bits()) << 16;
            return Ok(());
        }

        self.complete = false;
        match direction {
            RampDirection::PowerUp => {
                self.acc = 0;
                self.increment = span / i64::from(periods);
            }
            RampDirection::PowerDown => {
                self.acc = span;
                self.increment = -(span / i64::from(periods));
            }
        }
        self.limit = Iq15::from_bits((self.acc >> 16) as i32);
        Ok(())
    }

    /// Advance the ramp by one switching period.
    ///
    /// Must be called exactly once per period while the loop runs; once the
    /// ramp completes further calls are no-ops.
    pub fn update(&mut self) {
        if self.complete {
            return;
        }
        self.count += 1;
        if self.count >= self.periods {
            self.complete = true;
            self.limit = if self.increment >= 0 {
                self.target
            } else {
                Iq15::ZERO
            };
            self.acc = i64::from(self.limit.to_bits()) << 16;
        } else {
            self.acc += self.increment;
            self.limit = Iq15::from_bits((self.acc >> 16) as i32);
        }
    }

    /// Current output ceiling.
    pub fn limit(&self) -> Iq15 {
        self.limit
    }

    /// Whether the ramp has reached its end value.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Periods elapsed since the ramp was armed.
    pub fn elapsed_periods(&self) -> u32 {
        self.count
    }

    /// Total periods the ramp spans.
    pub fn total_periods(&self) -> u32 {
        self.periods
    }
}
