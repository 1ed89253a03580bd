//! Fixed-point pole-zero compensator.
//!
//! Implements the recurrence
//!
//! ```text
//! u(n) = a1*u(n-1) + .. + aN*u(n-N) + b0*e(n) + b1*e(n-1) + .. + bN*e(n-N)
//! y(n) = clamp(k * u(n), min, effective_max)
//! ```
//!
//! generic over the order `N`, with the two orders used in switch-mode
//! supplies exposed as [`Compensator2p2z`] and [`Compensator3p3z`].
//!
//! The update is pipelined: everything that does not depend on the current
//! sample (the contraction over the coefficient histories) is computed at
//! the end of the previous call, so after a sample arrives only the error
//! subtraction, one multiply, the gain stage and the clamp stand between
//! sample-ready and the threshold write. That is what lets the compute step
//! meet its per-period deadline.
//!
//! Formats follow the reference IQ-math pipeline: errors in Q31,
//! coefficients in Q26, output history in Q24, gain in Q23, output in Q15.
//! Intermediate products are exact in 64 bits; the high-word extraction and
//! the Q25 -> Q24 / Q18 -> Q24 shifts truncate toward negative infinity.
//! Saturation against `min`/`max` happens exactly once, at the gain stage.

use crate::error::ConfigError;
use crate::iq::{self, Iq15, Iq23, Iq24, Iq26, Iq31};
use crate::soft_start::{RampDirection, SoftStart};

/// Validated, immutable compensator configuration.
#[derive(Debug, Clone)]
pub struct CompensatorConfig<const ORDER: usize> {
    reference: Iq15,
    a: [Iq26; ORDER],
    b0: Iq26,
    b: [Iq26; ORDER],
    k: Iq23,
    min: Iq15,
    max: Iq15,
}

/// Two-pole two-zero configuration.
pub type CompensatorConfig2p2z = CompensatorConfig<2>;
/// Three-pole three-zero configuration.
pub type CompensatorConfig3p3z = CompensatorConfig<3>;

impl<const ORDER: usize> CompensatorConfig<ORDER> {
    /// Validate a coefficient set.
    ///
    /// `a` holds the pole coefficients `a1..aN`, `b0` and `b` the zero
    /// coefficients `b0` and `b1..bN`. Coefficients must fit Q26
    /// (`[-32, 32)`), the gain must fit Q23, and `reference`, `min`, `max`
    /// must lie in the unit Q15 range with `min <= max`.
    pub fn new(
        reference: Iq15,
        a: [f64; ORDER],
        b0: f64,
        b: [f64; ORDER],
        k: f64,
        min: Iq15,
        max: Iq15,
    ) -> Result<Self, ConfigError> {
        if reference < Iq15::ZERO || reference >= Iq15::ONE {
            return Err(ConfigError::ReferenceOutOfRange);
        }
        if min < Iq15::ZERO || min > max || max >= Iq15::ONE {
            return Err(ConfigError::OutputBounds);
        }

        let mut a_q = [Iq26::ZERO; ORDER];
        let mut b_q = [Iq26::ZERO; ORDER];
        for (dst, src) in a_q.iter_mut().zip(a) {
            *dst = coefficient(src)?;
        }
        for (dst, src) in b_q.iter_mut().zip(b) {
            *dst = coefficient(src)?;
        }

        Ok(Self {
            reference,
            a: a_q,
            b0: coefficient(b0)?,
            b: b_q,
            k: Iq23::checked_from_num(k).ok_or(ConfigError::GainOutOfRange)?,
            min,
            max,
        })
    }

    /// Reference setpoint, Q15 counts.
    pub fn reference(&self) -> Iq15 {
        self.reference
    }

    /// Lower output bound.
    pub fn min(&self) -> Iq15 {
        self.min
    }

    /// Upper output bound, before any soft-start limiting.
    pub fn max(&self) -> Iq15 {
        self.max
    }
}

fn coefficient(value: f64) -> Result<Iq26, ConfigError> {
    Iq26::checked_from_num(value).ok_or(ConfigError::CoefficientOutOfRange)
}

/// Pole-zero compensator with soft-start limiting.
///
/// Created once at startup; [`update`](Self::update) then runs exactly once
/// per switching period for the life of the loop. Constructing a new
/// instance from the same configuration reproduces bit-identical output
/// sequences.
#[derive(Debug, Clone)]
pub struct Compensator<const ORDER: usize> {
    config: CompensatorConfig<ORDER>,
    /// e(n-1), e(n-2), ..
    e_hist: [Iq31; ORDER],
    /// u(n-1), u(n-2), ..
    u_hist: [Iq24; ORDER],
    /// Q24 contraction over the coefficient histories, carried to the next
    /// call.
    pre: i64,
    output: Iq15,
    soft_start: SoftStart,
}

/// Two-pole two-zero compensator.
pub type Compensator2p2z = Compensator<2>;
/// Three-pole three-zero compensator.
pub type Compensator3p3z = Compensator<3>;

impl<const ORDER: usize> Compensator<ORDER> {
    /// Build a compensator with zeroed recurrence history and an inert
    /// soft-start pinned at `max`.
    pub fn new(config: CompensatorConfig<ORDER>) -> Self {
        let soft_start = SoftStart::inert(config.max);
        Self {
            config,
            e_hist: [Iq31::ZERO; ORDER],
            u_hist: [Iq24::ZERO; ORDER],
            pre: 0,
            output: Iq15::ZERO,
            soft_start,
        }
    }

    /// Arm the soft-start ramp; the effective output ceiling then follows
    /// it for `ramp_ms`, one step per `period_ns`. `period_ns` must be
    /// nonzero.
    pub fn configure_soft_start(
        &mut self,
        ramp_ms: u32,
        period_ns: u32,
        direction: RampDirection,
    ) -> Result<(), ConfigError> {
        self.soft_start.arm(ramp_ms, period_ns, direction)
    }

    /// Advance the soft-start ramp by one period.
    ///
    /// The orchestrator calls this once per period, after the compute and
    /// actuate steps.
    pub fn soft_start_update(&mut self) {
        self.soft_start.update();
    }

    /// Run one recurrence step. Must be called exactly once per switching
    /// period, after `feedback` has been captured for this period.
    pub fn update(&mut self, feedback: Iq15) -> Iq15 {
        // e(n), widened from the Q15 difference into Q31.
        let diff = self.config.reference.to_bits() - feedback.to_bits();
        let e0 = Iq31::from_bits(iq::narrow(i64::from(diff) << 16));

        // u(n) = pre + b0*e(n). Q26*Q31 keeps Q25 in the high word; one
        // arithmetic shift lands it in Q24 next to the carried contraction.
        let b0_term = iq::mac_high(0, self.config.b0.to_bits(), e0.to_bits()) >> 1;
        let u0 = Iq24::from_bits(iq::narrow(self.pre + b0_term));

        // y(n) = k*u(n) in Q15, clamped once. Upper bound first, lower
        // bound second, so min wins if the soft-start limit is below it.
        let y = iq::mac_high(0, self.config.k.to_bits(), u0.to_bits());
        let ceiling = self.config.max.min(self.soft_start.limit());
        let bounded = y
            .min(i64::from(ceiling.to_bits()))
            .max(i64::from(self.config.min.to_bits()));
        self.output = Iq15::from_bits(bounded as i32);

        // Shift histories, oldest dropped.
        self.e_hist.rotate_right(1);
        self.e_hist[0] = e0;
        self.u_hist.rotate_right(1);
        self.u_hist[0] = u0;

        // Contract the coefficient-history terms for the next call; after
        // the next sample arrives only the b0 product remains to be done.
        let mut zeros = 0i64; // Q25
        let mut poles = 0i64; // Q18
        for i in 0..ORDER {
            zeros = iq::mac_high(zeros, self.config.b[i].to_bits(), self.e_hist[i].to_bits());
            poles = iq::mac_high(poles, self.config.a[i].to_bits(), self.u_hist[i].to_bits());
        }
        self.pre = (zeros >> 1) + (poles << 6);

        self.output
    }

    /// Output of the most recent update, Q15 counts.
    pub fn output(&self) -> Iq15 {
        self.output
    }

    /// The active configuration.
    pub fn config(&self) -> &CompensatorConfig<ORDER> {
        &self.config
    }

    /// Soft-start ramp state.
    pub fn soft_start(&self) -> &SoftStart {
        &self.soft_start
    }
}
