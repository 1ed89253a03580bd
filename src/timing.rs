//! Per-period timing budget for the control loop.
//!
//! The whole sample, compute, actuate, ramp pipeline must fit inside one
//! switching period with margin; overruns are not detectable at runtime and
//! are excluded here by construction instead.

use crate::error::ConfigError;

/// Timing layout of one switching period.
///
/// Offsets are in nanoseconds from the period edge (the rising edge of the
/// power switch). Sampling is triggered `sample_lead_ns` *before* the next
/// edge so the feedback is captured after the switching transient settles
/// and the compute step finishes just before actuation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleTiming {
    period_ns: u32,
    sample_lead_ns: u32,
    compute_deadline_ns: u32,
    ramp_start_ns: u32,
    ramp_deadline_ns: u32,
}

impl CycleTiming {
    /// Validate a timing layout.
    ///
    /// Requires the sample trigger inside the period, a nonempty ramp
    /// window ending inside the period, and
    /// `compute_deadline + ramp_window <= period`.
    pub fn new(
        period_ns: u32,
        sample_lead_ns: u32,
        compute_deadline_ns: u32,
        ramp_start_ns: u32,
        ramp_deadline_ns: u32,
    ) -> Result<Self, ConfigError> {
        // Widened so an extreme compute deadline cannot wrap the sum past
        // the period it is being checked against.
        let pipeline =
            u64::from(compute_deadline_ns) + u64::from(ramp_deadline_ns - ramp_start_ns);
        if period_ns == 0
            || sample_lead_ns >= period_ns
            || ramp_start_ns >= ramp_deadline_ns
            || ramp_deadline_ns > period_ns
            || pipeline > u64::from(period_ns)
        {
            return Err(ConfigError::TimingBudget);
        }
        Ok(Self {
            period_ns,
            sample_lead_ns,
            compute_deadline_ns,
            ramp_start_ns,
            ramp_deadline_ns,
        })
    }

    /// The reference 200 kHz buck layout: 5 us period, sampling triggered
    /// 2.45 us before the period edge (the measured sample-to-actuate
    /// latency, conversion included), 1 us compute budget after
    /// sample-ready, slope ramp over the first 4 us with 1 us of margin.
    pub fn buck_200khz() -> Self {
        Self {
            period_ns: 5000,
            sample_lead_ns: 2450,
            compute_deadline_ns: 1000,
            ramp_start_ns: 0,
            ramp_deadline_ns: 4000,
        }
    }

    /// Switching period length.
    pub fn period_ns(&self) -> u32 {
        self.period_ns
    }

    /// How long before the period edge sampling starts.
    pub fn sample_lead_ns(&self) -> u32 {
        self.sample_lead_ns
    }

    /// Latest allowed completion of the compute step, measured from the
    /// sample trigger.
    pub fn compute_deadline_ns(&self) -> u32 {
        self.compute_deadline_ns
    }

    /// Offset of the sample trigger from the period edge; this is also the
    /// pulse width of the trigger channel.
    pub fn sample_trigger_ns(&self) -> u32 {
        self.period_ns - self.sample_lead_ns
    }

    /// Length of the slope-ramp window.
    pub fn ramp_window_ns(&self) -> u32 {
        self.ramp_deadline_ns - self.ramp_start_ns
    }

    /// Offset of the slope-ramp window start from the period edge.
    pub fn ramp_start_ns(&self) -> u32 {
        self.ramp_start_ns
    }
}
