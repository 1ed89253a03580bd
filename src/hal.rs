//! Peripheral collaborator traits.
//!
//! The control loop never touches registers; each peripheral class it needs
//! is a small trait, implemented against real hardware by the platform and
//! against recording mocks in tests. Callback registration on the hardware
//! side becomes event-method dispatch on the orchestrator: the platform's
//! run-to-completion interrupt handlers forward their events to
//! [`CycleOrchestrator`](crate::orchestrator::CycleOrchestrator).

use crate::iq::Iq15;

/// What starts an analog conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerSource {
    /// The falling edge of the pulse output's B channel.
    PwmDutyB,
    /// Manually triggered.
    Software,
}

/// Timebase counting mode of the pulse output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountMode {
    Up,
    UpDown,
}

/// Output channel of the pulse generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmChannel {
    /// Drives the power switch.
    A,
    /// Drives the sample trigger.
    B,
}

/// How a trip event acts on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TripMode {
    /// Re-arms every period: cycle-by-cycle current limiting.
    CycleByCycle,
    /// Latches until cleared.
    OneShot,
}

/// Interrupt sources the orchestrator installs handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqSource {
    /// Period edge; starts the slope-compensation ramp.
    PeriodStart,
    /// Sample trigger fired, conversion in flight.
    SampleTrigger,
    /// Conversion complete, feedback readable.
    SampleReady,
}

/// Relative urgency of an installed handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqPriority {
    Normal,
    /// Must be able to preempt `Normal` handlers; the slope ramp's window
    /// is far tighter than the compute budget.
    High,
}

/// Analog feedback sampler.
///
/// One conversion in flight at a time; the sample-ready event fires exactly
/// once per triggered conversion.
pub trait AnalogSampler {
    /// Bind a channel to a conversion trigger.
    fn configure(&mut self, channel: u8, trigger: TriggerSource);
    /// Raw counts of the most recent completed conversion.
    fn read_latest(&mut self) -> i32;
}

/// Pulse generator driving the power switch and the sample trigger.
///
/// Duty writes follow shadow-register semantics: they take effect at the
/// next period edge unless the implementation documents otherwise.
pub trait PulseOutput {
    fn configure(&mut self, period_ns: u32, mode: CountMode);
    fn set_duty_a(&mut self, on_ns: u32);
    fn set_duty_b(&mut self, on_ns: u32);
    /// Generate a period event at `phase_offset_ns` into every period.
    fn enable_period_event(&mut self, phase_offset_ns: u32);
    /// Route a trip source to `channel` with blanking applied for
    /// `blanking_ns` after the channel rises.
    fn configure_trip(&mut self, channel: PwmChannel, mode: TripMode, blanking_ns: u32);
}

/// Comparator threshold, typically a DAC feeding the current comparator.
///
/// Threshold writes become visible to the bound trip comparator within a
/// bounded latency documented by the implementation.
pub trait ThresholdActuator {
    fn set_threshold(&mut self, value: Iq15);
    /// Feed the comparator's output into the given pulse channel's trip.
    fn bind_trip(&mut self, channel: PwmChannel);
}

/// Test-point pin for timing instrumentation; functionally inert.
pub trait DigitalPin {
    fn set(&mut self);
    fn clear(&mut self);
}

/// Interrupt dispatch for the two periodic handlers.
pub trait InterruptController {
    fn enable_global(&mut self, enabled: bool);
    fn register(&mut self, source: IrqSource, priority: IrqPriority);
    fn acknowledge(&mut self, source: IrqSource);
}

/// A pin wired to nothing, for builds without a test point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPin;

impl DigitalPin for NoopPin {
    fn set(&mut self) {}
    fn clear(&mut self) {}
}
