//! Slope-compensation ramp generator.
//!
//! Peak current-mode control above 50 % duty needs a falling ramp
//! subtracted from the current-demand threshold during each switching
//! period. The generator starts from the value the compensator wrote for
//! the period and applies a fixed number of fixed-size decrements, each at
//! a fixed sub-period interval. Its whole execution must fit inside the
//! ramp window of the cycle timing; that budget is validated when the
//! orchestrator is built, never at runtime.

use crate::error::ConfigError;
use crate::hal::ThresholdActuator;
use crate::iq::Iq15;

/// Fixed falling ramp applied to the comparator threshold once per period.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlopeRamp {
    delta: Iq15,
    steps: u16,
    step_interval_ns: u32,
}

impl SlopeRamp {
    /// `delta` is applied `steps` times, one step every `step_interval_ns`.
    ///
    /// `delta` must be negative: slope compensation only ever lowers the
    /// threshold.
    pub fn new(delta: Iq15, steps: u16, step_interval_ns: u32) -> Result<Self, ConfigError> {
        if delta >= Iq15::ZERO || steps == 0 || step_interval_ns == 0 {
            return Err(ConfigError::SlopeShape);
        }
        Ok(Self {
            delta,
            steps,
            step_interval_ns,
        })
    }

    /// Total execution time of the ramp.
    pub fn duration_ns(&self) -> u32 {
        u32::from(self.steps) * self.step_interval_ns
    }

    /// Per-step decrement.
    pub fn delta(&self) -> Iq15 {
        self.delta
    }

    /// Number of decrements per period.
    pub fn steps(&self) -> u16 {
        self.steps
    }

    /// Run one period's worth of decrements, starting from `initial`.
    ///
    /// `initial` was already written to the actuator by the compensator, so
    /// the comparator sees `steps + 1` threshold values per period counting
    /// that initial write.
    pub fn run<T: ThresholdActuator>(&self, initial: Iq15, actuator: &mut T) {
        let mut value = initial;
        for _ in 0..self.steps {
            value = value.saturating_add(self.delta);
            actuator.set_threshold(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingDac {
        writes: Vec<i32>,
    }

    impl ThresholdActuator for RecordingDac {
        fn set_threshold(&mut self, value: Iq15) {
            self.writes.push(value.to_bits());
        }

        fn bind_trip(&mut self, _channel: crate::hal::PwmChannel) {}
    }

    #[test]
    fn canonical_ramp_sequence() {
        // One count down per step, 80 steps at 50 ns: the reference slope
        // task configuration.
        let ramp = SlopeRamp::new(Iq15::from_bits(-1), 80, 50).unwrap();
        let mut dac = RecordingDac { writes: vec![700] };

        ramp.run(Iq15::from_bits(700), &mut dac);

        // steps + 1 values including the compensator's initial write.
        assert_eq!(dac.writes.len(), 81);
        let expected: Vec<i32> = (0..=80).map(|i| 700 - i).collect();
        assert_eq!(dac.writes, expected);
    }

    #[test]
    fn canonical_ramp_fits_its_window() {
        let ramp = SlopeRamp::new(Iq15::from_bits(-1), 80, 50).unwrap();
        // 4 us of ramp inside a 5 us period leaves 1 us of margin.
        assert_eq!(ramp.duration_ns(), 4000);
    }

    #[test]
    fn rejects_non_falling_ramps() {
        assert_eq!(
            SlopeRamp::new(Iq15::ZERO, 80, 50),
            Err(ConfigError::SlopeShape)
        );
        assert_eq!(
            SlopeRamp::new(Iq15::from_bits(1), 80, 50),
            Err(ConfigError::SlopeShape)
        );
        assert_eq!(
            SlopeRamp::new(Iq15::from_bits(-1), 0, 50),
            Err(ConfigError::SlopeShape)
        );
        assert_eq!(
            SlopeRamp::new(Iq15::from_bits(-1), 80, 0),
            Err(ConfigError::SlopeShape)
        );
    }
}
