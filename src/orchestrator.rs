//! Per-period orchestration of the control loop.
//!
//! One switching period, in hardware order:
//!
//! ```text
//!  period edge                                        next edge
//!  |  slope ramp decrements (window)  |    .          |
//!  |          sample trigger ---------^--> convert    |
//!  |                    sample ready --> compute -->  | actuate
//! ```
//!
//! The orchestrator is driven by three events forwarded from the platform's
//! interrupt handlers. It owns the peripheral set and is the only path to
//! the comparator threshold, so the ordering invariant (the compensator's
//! threshold write strictly precedes the ramp generator's first decrement
//! of that value) holds by construction rather than by synchronization.
//!
//! Events arriving out of order are programming defects in the platform
//! glue, checked with `debug_assert` only; the hot path has no error
//! branches.

use crate::compensator::Compensator;
use crate::error::ConfigError;
use crate::hal::{
    AnalogSampler, CountMode, DigitalPin, InterruptController, IrqPriority, IrqSource, PulseOutput,
    PwmChannel, ThresholdActuator, TriggerSource, TripMode,
};
use crate::iq::Iq15;
use crate::slope::SlopeRamp;
use crate::timing::CycleTiming;

/// Leading-edge blanking applied to the comparator trip, masking the
/// turn-on current spike.
const BLANKING_NS: u32 = 420;

/// Failsafe cap on the switch duty: if the comparator never trips, the
/// pulse still resets at 60 % rather than staying high.
const FAILSAFE_DUTY_PCT: u32 = 60;

/// The one owned peripheral set; no ambient globals.
#[derive(Debug)]
pub struct Peripherals<A, P, T, D, I> {
    pub sampler: A,
    pub pwm: P,
    pub comparator: T,
    pub test_pin: D,
    pub irq: I,
}

/// Where the loop is inside the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    /// Not yet commissioned.
    Idle,
    /// Waiting for the sample trigger.
    Armed,
    /// Conversion in flight.
    SampleInFlight,
    /// Between sample-ready and the threshold write.
    ComputeAndActuate,
}

/// Ties sampling, compensation, actuation and slope ramping into one
/// repeating deadline.
#[derive(Debug)]
pub struct CycleOrchestrator<A, P, T, D, I, const ORDER: usize> {
    parts: Peripherals<A, P, T, D, I>,
    compensator: Compensator<ORDER>,
    slope: SlopeRamp,
    timing: CycleTiming,
    state: CycleState,
}

impl<A, P, T, D, I, const ORDER: usize> CycleOrchestrator<A, P, T, D, I, ORDER>
where
    A: AnalogSampler,
    P: PulseOutput,
    T: ThresholdActuator,
    D: DigitalPin,
    I: InterruptController,
{
    /// Cross-validates the slope ramp against the timing's ramp window.
    pub fn new(
        parts: Peripherals<A, P, T, D, I>,
        compensator: Compensator<ORDER>,
        slope: SlopeRamp,
        timing: CycleTiming,
    ) -> Result<Self, ConfigError> {
        if slope.duration_ns() > timing.ramp_window_ns() {
            return Err(ConfigError::RampWindow);
        }
        Ok(Self {
            parts,
            compensator,
            slope,
            timing,
            state: CycleState::Idle,
        })
    }

    /// One-time hardware bring-up, mirroring the converter's power-on
    /// sequence. Ends with interrupts live and the loop armed.
    pub fn commission(&mut self, feedback_channel: u8) {
        debug_assert_eq!(self.state, CycleState::Idle);
        let period = self.timing.period_ns();

        self.parts.pwm.configure(period, CountMode::Up);
        self.parts.pwm.set_duty_a(period * FAILSAFE_DUTY_PCT / 100);
        self.parts.pwm.set_duty_b(self.timing.sample_trigger_ns());
        self.parts
            .pwm
            .configure_trip(PwmChannel::A, TripMode::CycleByCycle, BLANKING_NS);
        self.parts
            .pwm
            .enable_period_event(self.timing.ramp_start_ns());

        self.parts
            .sampler
            .configure(feedback_channel, TriggerSource::PwmDutyB);
        self.parts.comparator.bind_trip(PwmChannel::A);

        // The ramp handler must be able to preempt the compute handler;
        // its window is far tighter.
        self.parts.irq.register(IrqSource::PeriodStart, IrqPriority::High);
        self.parts
            .irq
            .register(IrqSource::SampleTrigger, IrqPriority::Normal);
        self.parts
            .irq
            .register(IrqSource::SampleReady, IrqPriority::Normal);
        self.parts.irq.enable_global(true);

        self.state = CycleState::Armed;
    }

    /// The sample trigger fired; a conversion is now in flight.
    pub fn on_sample_trigger(&mut self) {
        debug_assert_eq!(self.state, CycleState::Armed);
        self.parts.irq.acknowledge(IrqSource::SampleTrigger);
        self.state = CycleState::SampleInFlight;
    }

    /// Conversion complete: read feedback, run the compensator, write the
    /// new threshold, advance the soft-start ramp.
    ///
    /// Everything here must finish within the compute deadline; the body is
    /// straight-line bounded-time code.
    pub fn on_sample_ready(&mut self) {
        debug_assert_eq!(self.state, CycleState::SampleInFlight);
        self.state = CycleState::ComputeAndActuate;

        self.parts.test_pin.set();
        self.parts.irq.acknowledge(IrqSource::SampleReady);

        let feedback = Iq15::from_bits(self.parts.sampler.read_latest());
        let demand = self.compensator.update(feedback);
        self.parts.comparator.set_threshold(demand);

        self.parts.test_pin.clear();
        self.compensator.soft_start_update();
        self.state = CycleState::Armed;
    }

    /// Period edge: run the slope-compensation ramp from the threshold the
    /// compensator wrote at the end of the previous period.
    pub fn on_ramp_trigger(&mut self) {
        debug_assert_eq!(self.state, CycleState::Armed);
        self.parts.irq.acknowledge(IrqSource::PeriodStart);
        self.slope
            .run(self.compensator.output(), &mut self.parts.comparator);
    }

    /// Current position in the cycle.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// The compensator, for inspection.
    pub fn compensator(&self) -> &Compensator<ORDER> {
        &self.compensator
    }

    /// The compensator, for reconfiguration between periods (soft-start
    /// re-arming for controlled shutdown).
    pub fn compensator_mut(&mut self) -> &mut Compensator<ORDER> {
        &mut self.compensator
    }

    /// The validated timing layout.
    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    /// Tear down, returning the peripheral set.
    pub fn release(self) -> Peripherals<A, P, T, D, I> {
        self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compensator::CompensatorConfig;
    use crate::soft_start::RampDirection;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        PwmConfigured { period_ns: u32 },
        DutyA(u32),
        DutyB(u32),
        TripConfigured { channel: PwmChannel, blanking_ns: u32 },
        PeriodEventEnabled(u32),
        SamplerConfigured { channel: u8 },
        SampleRead,
        Threshold(i32),
        TripBound(PwmChannel),
        PinSet,
        PinClear,
        IrqRegistered(IrqSource, IrqPriority),
        IrqAck(IrqSource),
        GlobalIrq(bool),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct MockSampler {
        log: Log,
        value: Rc<RefCell<i32>>,
    }

    impl AnalogSampler for MockSampler {
        fn configure(&mut self, channel: u8, _trigger: TriggerSource) {
            self.log
                .borrow_mut()
                .push(Event::SamplerConfigured { channel });
        }

        fn read_latest(&mut self) -> i32 {
            self.log.borrow_mut().push(Event::SampleRead);
            *self.value.borrow()
        }
    }

    struct MockPwm {
        log: Log,
    }

    impl PulseOutput for MockPwm {
        fn configure(&mut self, period_ns: u32, _mode: CountMode) {
            self.log
                .borrow_mut()
                .push(Event::PwmConfigured { period_ns });
        }

        fn set_duty_a(&mut self, on_ns: u32) {
            self.log.borrow_mut().push(Event::DutyA(on_ns));
        }

        fn set_duty_b(&mut self, on_ns: u32) {
            self.log.borrow_mut().push(Event::DutyB(on_ns));
        }

        fn enable_period_event(&mut self, phase_offset_ns: u32) {
            self.log
                .borrow_mut()
                .push(Event::PeriodEventEnabled(phase_offset_ns));
        }

        fn configure_trip(&mut self, channel: PwmChannel, _mode: TripMode, blanking_ns: u32) {
            self.log.borrow_mut().push(Event::TripConfigured {
                channel,
                blanking_ns,
            });
        }
    }

    struct MockComparator {
        log: Log,
    }

    impl ThresholdActuator for MockComparator {
        fn set_threshold(&mut self, value: Iq15) {
            self.log.borrow_mut().push(Event::Threshold(value.to_bits()));
        }

        fn bind_trip(&mut self, channel: PwmChannel) {
            self.log.borrow_mut().push(Event::TripBound(channel));
        }
    }

    struct MockPin {
        log: Log,
    }

    impl DigitalPin for MockPin {
        fn set(&mut self) {
            self.log.borrow_mut().push(Event::PinSet);
        }

        fn clear(&mut self) {
            self.log.borrow_mut().push(Event::PinClear);
        }
    }

    struct MockIrq {
        log: Log,
    }

    impl InterruptController for MockIrq {
        fn enable_global(&mut self, enabled: bool) {
            self.log.borrow_mut().push(Event::GlobalIrq(enabled));
        }

        fn register(&mut self, source: IrqSource, priority: IrqPriority) {
            self.log
                .borrow_mut()
                .push(Event::IrqRegistered(source, priority));
        }

        fn acknowledge(&mut self, source: IrqSource) {
            self.log.borrow_mut().push(Event::IrqAck(source));
        }
    }

    type MockLoop =
        CycleOrchestrator<MockSampler, MockPwm, MockComparator, MockPin, MockIrq, 2>;

    fn build() -> (MockLoop, Log, Rc<RefCell<i32>>) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let adc = Rc::new(RefCell::new(0i32));
        let parts = Peripherals {
            sampler: MockSampler {
                log: log.clone(),
                value: adc.clone(),
            },
            pwm: MockPwm { log: log.clone() },
            comparator: MockComparator { log: log.clone() },
            test_pin: MockPin { log: log.clone() },
            irq: MockIrq { log: log.clone() },
        };

        let config = CompensatorConfig::new(
            Iq15::from_bits(2048),
            [1.69020338, -0.69020338],
            3.22868006,
            [0.29060216, -2.93807791],
            0.5,
            Iq15::ZERO,
            Iq15::from_bits(1023),
        )
        .unwrap();
        let compensator = Compensator::new(config);
        let slope = SlopeRamp::new(Iq15::from_bits(-1), 80, 50).unwrap();
        let timing = CycleTiming::buck_200khz();

        let looper = CycleOrchestrator::new(parts, compensator, slope, timing).unwrap();
        (looper, log, adc)
    }

    /// Drive one full period's events, feeding `feedback` counts.
    fn run_period(looper: &mut MockLoop, adc: &Rc<RefCell<i32>>, feedback: i32) {
        *adc.borrow_mut() = feedback;
        looper.on_ramp_trigger();
        looper.on_sample_trigger();
        looper.on_sample_ready();
    }

    #[test]
    fn slope_must_fit_the_ramp_window() {
        let (looper, _, _) = build();
        let parts = looper.release();
        // 100 steps at 50 ns is 5000 ns, over the 4000 ns window.
        let slope = SlopeRamp::new(Iq15::from_bits(-1), 100, 50).unwrap();
        let config = CompensatorConfig::new(
            Iq15::from_bits(2048),
            [1.69020338, -0.69020338],
            3.22868006,
            [0.29060216, -2.93807791],
            0.5,
            Iq15::ZERO,
            Iq15::from_bits(1023),
        )
        .unwrap();
        let result = CycleOrchestrator::new(
            parts,
            Compensator::new(config),
            slope,
            CycleTiming::buck_200khz(),
        );
        assert!(matches!(result, Err(ConfigError::RampWindow)));
    }

    #[test]
    fn commissioning_sequence() {
        let (mut looper, log, _) = build();
        assert_eq!(looper.state(), CycleState::Idle);
        looper.commission(2);
        assert_eq!(looper.state(), CycleState::Armed);

        let log = log.borrow();
        assert_eq!(log[0], Event::PwmConfigured { period_ns: 5000 });
        assert!(log.contains(&Event::DutyA(3000))); // 60 % failsafe cap
        assert!(log.contains(&Event::DutyB(2550))); // sample trigger edge
        assert!(log.contains(&Event::TripConfigured {
            channel: PwmChannel::A,
            blanking_ns: 420,
        }));
        assert!(log.contains(&Event::SamplerConfigured { channel: 2 }));
        assert!(log.contains(&Event::TripBound(PwmChannel::A)));
        assert!(log.contains(&Event::IrqRegistered(
            IrqSource::PeriodStart,
            IrqPriority::High
        )));
        assert!(log.contains(&Event::IrqRegistered(
            IrqSource::SampleReady,
            IrqPriority::Normal
        )));
        // Interrupts go live last.
        assert_eq!(log.last(), Some(&Event::GlobalIrq(true)));
    }

    #[test]
    fn per_period_event_ordering() {
        let (mut looper, log, adc) = build();
        looper.commission(2);

        // Prime one period so the compensator has written a threshold.
        run_period(&mut looper, &adc, 0);
        let initial = looper.compensator().output().to_bits();
        assert!(initial > 0);

        log.borrow_mut().clear();
        run_period(&mut looper, &adc, 0);

        let log = log.borrow();
        // Ramp first: steps decrements from the previous threshold.
        assert_eq!(log[0], Event::IrqAck(IrqSource::PeriodStart));
        for (i, event) in log[1..81].iter().enumerate() {
            assert_eq!(*event, Event::Threshold(initial - 1 - i as i32));
        }
        // Then the compute path, in strict order.
        let tail = &log[81..];
        assert_eq!(
            tail,
            &[
                Event::IrqAck(IrqSource::SampleTrigger),
                Event::PinSet,
                Event::IrqAck(IrqSource::SampleReady),
                Event::SampleRead,
                Event::Threshold(looper.compensator().output().to_bits()),
                Event::PinClear,
            ]
        );
    }

    #[test]
    fn soft_start_advances_once_per_period() {
        let (mut looper, _, adc) = build();
        looper
            .compensator_mut()
            .configure_soft_start(1, 5000, RampDirection::PowerUp)
            .unwrap();
        looper.commission(2);

        let total = looper.compensator().soft_start().total_periods();
        for _ in 0..total {
            run_period(&mut looper, &adc, 0);
        }
        assert!(looper.compensator().soft_start().is_complete());
        assert_eq!(
            looper.compensator().soft_start().elapsed_periods(),
            total
        );
    }

    #[test]
    fn loop_converges_and_returns_to_armed() {
        let (mut looper, _, adc) = build();
        looper.commission(2);

        // Feedback held at the reference: the loop settles and every period
        // ends re-armed.
        for _ in 0..200 {
            run_period(&mut looper, &adc, 2048);
            assert_eq!(looper.state(), CycleState::Armed);
            let out = looper.compensator().output();
            assert!(out >= Iq15::ZERO);
            assert!(out <= Iq15::from_bits(1023));
        }
    }
}
