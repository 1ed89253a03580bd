use thiserror::Error;

/// Configuration rejected at initialization.
///
/// None of these can occur once the loop is running; the hot path has no
/// error branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A filter coefficient does not fit the Q26 format.
    #[error("filter coefficient outside the Q26 range [-32, 32)")]
    CoefficientOutOfRange,
    /// The loop gain does not fit the Q23 format.
    #[error("loop gain outside the Q23 range [-256, 256)")]
    GainOutOfRange,
    /// The reference setpoint is outside the unit Q15 range.
    #[error("reference outside [0, 1)")]
    ReferenceOutOfRange,
    /// Output bounds are inverted or outside the unit Q15 range.
    #[error("output bounds must satisfy 0 <= min <= max < 1")]
    OutputBounds,
    /// The slope ramp is not a falling ramp with a positive step count.
    #[error("slope ramp must fall by a nonzero amount over at least one step")]
    SlopeShape,
    /// The sample/compute/ramp pipeline does not fit the switching period.
    #[error("cycle timing budget exceeds the switching period")]
    TimingBudget,
    /// The slope ramp does not complete inside its timing window.
    #[error("slope ramp overruns its window")]
    RampWindow,
}
