//! Per-tick composition of the sequencer, escalator, reset and executor.
//!
//! [`RigController`] is the single owner of all mutable control state. The
//! firmware control task and the emulator both sample their inputs, call
//! [`RigController::tick`] once per pass, and act on the returned
//! [`TickReport`]. Nothing in here blocks; every wait is a deadline checked on
//! a later tick.

use core::num::NonZeroUsize;
use core::ops::Add;
use core::time::Duration;

use crate::actuation::ActuationPort;
use crate::config::{ConfigError, RigConfig};
use crate::cycle::{CycleStep, MAX_CYCLE_STEPS, strap_cycle};
use crate::escalation::{EscalationAction, TimeoutEscalator};
use crate::executor::CycleExecutor;
use crate::faults::{FaultCounterStore, FaultCounts, FaultStoreError};
use crate::indicator::FaultIndicator;
use crate::reset::{ResetProgress, ResetSequence, ResetStage};
use crate::sequencer::{ControlMode, RunMode, StepSequencer};
use crate::telemetry::{
    DiagnosticsSink, FaultTelemetry, ResetTelemetry, TelemetryEventKind, TelemetryPayload,
};

/// Monotonic instant usable by every control component.
pub trait ControlInstant: Copy + Ord + Add<Duration, Output = Self> {}

impl<T> ControlInstant for T where T: Copy + Ord + Add<Duration, Output = T> {}

/// Inputs sampled at the start of a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickInputs {
    /// A debounced start/stop request was drained this tick.
    pub start_stop: bool,
    /// Live level of the auto/step mode switch.
    pub auto_mode: bool,
    /// Live level of the strap presence sensor.
    pub material_present: bool,
    /// Rising edge of the progress (right end) switch seen this tick.
    pub progress: bool,
}

impl TickInputs {
    /// Inputs for a tick with strap loaded and nothing else happening.
    pub const fn idle(auto_mode: bool) -> Self {
        Self {
            start_stop: false,
            auto_mode,
            material_present: true,
            progress: false,
        }
    }

    #[must_use]
    pub const fn with_start_stop(mut self) -> Self {
        self.start_stop = true;
        self
    }

    #[must_use]
    pub const fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    #[must_use]
    pub const fn with_material(mut self, present: bool) -> Self {
        self.material_present = present;
        self
    }
}

/// What happened during a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport<I> {
    /// Step the sequencer switched to, if it advanced.
    pub step_switched: Option<usize>,
    pub escalation: Option<EscalationAction<I>>,
    pub reset: ResetProgress,
    /// Fault lamp level to drive.
    pub indicator: bool,
    pub run_mode: RunMode,
    pub current_step: usize,
}

/// Point-in-time view of the controller for status displays.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub current_step: usize,
    pub step_name: &'static str,
    pub run_mode: RunMode,
    pub control_mode: ControlMode,
    pub reset_stage: ResetStage,
    pub resume_after_reset: bool,
    pub strike_count: u8,
    pub strike_limit: u8,
    pub cooldown_pending: bool,
    pub indicator_active: bool,
}

/// Strap rig controller.
pub struct RigController<I, P, S, D> {
    config: RigConfig,
    steps: &'static [CycleStep],
    sequencer: StepSequencer,
    escalator: TimeoutEscalator<I>,
    reset: ResetSequence,
    executor: CycleExecutor<'static>,
    indicator: FaultIndicator<I>,
    port: P,
    store: S,
    sink: D,
}

impl<I, P, S, D> RigController<I, P, S, D>
where
    I: ControlInstant,
    P: ActuationPort<I>,
    S: FaultCounterStore,
    D: DiagnosticsSink<I>,
{
    /// Builds a controller for the standard strap cycle.
    ///
    /// # Errors
    ///
    /// Fails when `config` does not validate.
    pub fn new(config: RigConfig, port: P, store: S, sink: D) -> Result<Self, ConfigError> {
        Self::with_steps(config, strap_cycle(), port, store, sink)
    }

    /// Builds a controller for an arbitrary cycle table.
    ///
    /// # Errors
    ///
    /// Fails when `config` does not validate or `steps` is empty or longer
    /// than [`MAX_CYCLE_STEPS`].
    pub fn with_steps(
        config: RigConfig,
        steps: &'static [CycleStep],
        port: P,
        store: S,
        sink: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let step_count = NonZeroUsize::new(steps.len()).ok_or(ConfigError::EmptyCycle)?;
        if steps.len() > MAX_CYCLE_STEPS {
            return Err(ConfigError::CycleTooLong { steps: steps.len() });
        }

        Ok(Self {
            config,
            steps,
            sequencer: StepSequencer::new(step_count),
            escalator: TimeoutEscalator::new(config.escalation),
            reset: ResetSequence::new(config.recovery_actuator, config.recovery_stroke),
            executor: CycleExecutor::new(steps, config.cooling_time),
            indicator: FaultIndicator::new(config.blink_interval),
            port,
            store,
            sink,
        })
    }

    /// Runs one control pass.
    pub fn tick(&mut self, inputs: TickInputs, now: I) -> TickReport<I> {
        if inputs.start_stop {
            self.handle_start_stop(now);
        }

        let mode = ControlMode::from_switch(inputs.auto_mode);
        if mode != self.sequencer.control_mode() {
            self.sequencer.set_control_mode(mode);
            self.emit(TelemetryEventKind::ModeChanged, TelemetryPayload::Mode(mode), now);
        }

        if !inputs.material_present {
            self.handle_missing_material(now);
        }

        let armed =
            self.sequencer.is_running() && self.sequencer.is_auto() && !self.sequencer.reset_mode();
        let escalation = self.escalator.poll(armed, inputs.progress, now);
        if let Some(action) = escalation {
            self.apply_escalation(action, now);
        }

        let reset = if self.reset.is_active() {
            self.poll_reset(now)
        } else {
            if self.sequencer.is_running() {
                self.executor.poll(&mut self.sequencer, &mut self.port, now);
            }
            ResetProgress::Idle
        };

        let step_switched = self.sequencer.step_switch_happened().then(|| {
            let index = self.sequencer.current_step();
            if let Some(step) = self.steps.get(index) {
                self.sink.step_switched(step, now);
            }
            if !self.sequencer.is_auto() {
                self.sequencer.set_running(false);
                self.emit(TelemetryEventKind::RunStopped, TelemetryPayload::none(), now);
            }
            index
        });

        TickReport {
            step_switched,
            escalation,
            reset,
            indicator: self.indicator.poll(now),
            run_mode: self.sequencer.run_mode(),
            current_step: self.sequencer.current_step(),
        }
    }

    /// Snapshot of the persistent fault counters.
    pub fn fault_counts(&self) -> FaultCounts {
        self.store.read_all()
    }

    /// Maintenance operation that zeroes every fault counter.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure.
    pub fn clear_faults(&mut self) -> Result<(), FaultStoreError> {
        self.store.clear_all()
    }

    pub fn status(&self) -> StatusSnapshot {
        let current_step = self.sequencer.current_step();
        StatusSnapshot {
            current_step,
            step_name: crate::cycle::step_name(self.steps, current_step),
            run_mode: self.sequencer.run_mode(),
            control_mode: self.sequencer.control_mode(),
            reset_stage: self.reset.stage(),
            resume_after_reset: self.sequencer.resume_after_reset(),
            strike_count: self.escalator.strike_count(),
            strike_limit: self.config.escalation.strike_limit,
            cooldown_pending: self.escalator.pending_delayed_reset(),
            indicator_active: self.indicator.is_active(),
        }
    }

    fn handle_start_stop(&mut self, now: I) {
        // An in-flight reset always finishes; the request only flips whether
        // the machine resumes afterwards.
        if self.sequencer.reset_mode() {
            let resume = !self.sequencer.resume_after_reset();
            self.sequencer.set_resume_after_reset(resume);
            return;
        }

        // Pressing start during a cooldown hold skips the rest of the wait.
        if self.escalator.cancel_cooldown() {
            self.indicator.clear();
            self.request_reset(true, now);
            return;
        }

        self.sequencer.toggle_running();
        if self.sequencer.is_running() {
            self.indicator.clear();
            self.emit(TelemetryEventKind::RunStarted, TelemetryPayload::none(), now);
        } else {
            self.emit(TelemetryEventKind::RunStopped, TelemetryPayload::none(), now);
        }
    }

    fn handle_missing_material(&mut self, now: I) {
        if self.sequencer.reset_mode() {
            if self.sequencer.resume_after_reset() {
                self.sequencer.set_resume_after_reset(false);
                self.indicator.activate(now);
                self.emit(TelemetryEventKind::MaterialMissing, TelemetryPayload::none(), now);
            }
            return;
        }
        if !self.sequencer.is_running() {
            return;
        }

        self.sequencer.set_running(false);
        self.port.de_energize_all();
        self.indicator.activate(now);
        self.emit(TelemetryEventKind::MaterialMissing, TelemetryPayload::none(), now);
    }

    fn apply_escalation(&mut self, action: EscalationAction<I>, now: I) {
        match action {
            EscalationAction::ResetAndResume { strike } => {
                self.record_fault(strike, now);
                self.request_reset(true, now);
            }
            EscalationAction::HoldForCooldown { strike, .. } => {
                self.record_fault(strike, now);
                self.sequencer.set_running(false);
                self.port.de_energize_all();
                self.indicator.activate(now);
                self.emit(TelemetryEventKind::CooldownStarted, TelemetryPayload::none(), now);
            }
            EscalationAction::CooldownElapsed => {
                self.emit(TelemetryEventKind::CooldownElapsed, TelemetryPayload::none(), now);
                self.request_reset(true, now);
            }
            EscalationAction::Shutdown { strike } => {
                self.record_fault(strike, now);
                self.port.de_energize_all();
                self.sequencer.set_running(false);
                self.sequencer.jump_to(0);
                self.indicator.activate(now);
                self.emit(TelemetryEventKind::Shutdown, TelemetryPayload::none(), now);
            }
            EscalationAction::Forgiven { .. } => {
                self.emit(TelemetryEventKind::StrikesForgiven, TelemetryPayload::none(), now);
            }
        }
    }

    fn record_fault(&mut self, strike: u8, now: I) {
        let index = self.sequencer.current_step();
        let occurrences = match self.store.increment(index) {
            Ok(count) => Some(count),
            Err(_) => {
                self.emit(TelemetryEventKind::FaultStoreError, TelemetryPayload::none(), now);
                None
            }
        };
        if let Some(step) = self.steps.get(index) {
            self.sink.fault(FaultTelemetry::timeout(step, occurrences, strike), now);
        }
    }

    fn request_reset(&mut self, resume: bool, now: I) {
        if self.reset.request(&mut self.sequencer, resume) {
            self.emit(
                TelemetryEventKind::ResetRequested,
                TelemetryPayload::Reset(ResetTelemetry::new(self.reset.stage(), resume)),
                now,
            );
        }
    }

    fn poll_reset(&mut self, now: I) -> ResetProgress {
        let before = self.reset.stage();
        let progress = self.reset.poll(&mut self.sequencer, &mut self.port, now);
        match progress {
            ResetProgress::InProgress(stage) if stage != before => {
                let resume = self.sequencer.resume_after_reset();
                self.emit(
                    TelemetryEventKind::ResetStageChanged,
                    TelemetryPayload::Reset(ResetTelemetry::new(stage, resume)),
                    now,
                );
            }
            ResetProgress::Completed { resumed } => {
                self.emit(
                    TelemetryEventKind::ResetCompleted,
                    TelemetryPayload::Reset(ResetTelemetry::new(ResetStage::Idle, resumed)),
                    now,
                );
            }
            ResetProgress::Idle | ResetProgress::InProgress(_) => {}
        }
        progress
    }

    fn emit(&mut self, event: TelemetryEventKind, payload: TelemetryPayload, now: I) {
        self.sink.emit(event, payload, now);
    }
}

impl<I, P, S, D> RigController<I, P, S, D> {
    pub const fn config(&self) -> &RigConfig {
        &self.config
    }

    pub const fn steps(&self) -> &'static [CycleStep] {
        self.steps
    }

    pub const fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub const fn escalator(&self) -> &TimeoutEscalator<I> {
        &self.escalator
    }

    pub const fn reset(&self) -> &ResetSequence {
        &self.reset
    }

    pub const fn indicator(&self) -> &FaultIndicator<I> {
        &self.indicator
    }

    pub const fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn sink(&self) -> &D {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::{NoopActuatorOutputs, TimedActuationPort};
    use crate::faults::RamFaultCounters;
    use crate::telemetry::{TelemetryInstant, TelemetryRecorder};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    impl TelemetryInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    type TestController = RigController<
        MockInstant,
        TimedActuationPort<NoopActuatorOutputs, MockInstant>,
        RamFaultCounters,
        TelemetryRecorder<MockInstant>,
    >;

    fn controller(config: RigConfig) -> TestController {
        RigController::new(
            config,
            TimedActuationPort::new(NoopActuatorOutputs::new()),
            RamFaultCounters::new(strap_cycle().len()),
            TelemetryRecorder::new(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_configuration_and_tables() {
        let port = TimedActuationPort::<_, MockInstant>::new(NoopActuatorOutputs::new());
        let result = RigController::new(
            RigConfig::standard().with_strike_limit(0),
            port,
            RamFaultCounters::new(9),
            TelemetryRecorder::<MockInstant>::new(),
        );
        assert!(matches!(result, Err(ConfigError::ZeroStrikeLimit)));

        let port = TimedActuationPort::<_, MockInstant>::new(NoopActuatorOutputs::new());
        let result = RigController::with_steps(
            RigConfig::standard(),
            &[],
            port,
            RamFaultCounters::new(0),
            TelemetryRecorder::<MockInstant>::new(),
        );
        assert!(matches!(result, Err(ConfigError::EmptyCycle)));
    }

    #[test]
    fn start_request_runs_and_second_request_stops() {
        let mut rig = controller(RigConfig::standard());
        let report = rig.tick(TickInputs::idle(true).with_start_stop(), MockInstant(0));
        assert_eq!(report.run_mode, RunMode::Running);

        let report = rig.tick(TickInputs::idle(true).with_start_stop(), MockInstant(10));
        assert_eq!(report.run_mode, RunMode::Stopped);
        assert_eq!(
            rig.sink().latest().map(|record| record.event),
            Some(TelemetryEventKind::RunStopped)
        );
    }

    #[test]
    fn step_mode_halts_after_each_switch() {
        let mut rig = controller(RigConfig::standard());
        rig.tick(TickInputs::idle(false).with_start_stop(), MockInstant(0));

        let mut now = 10;
        let switched = loop {
            let report = rig.tick(TickInputs::idle(false), MockInstant(now));
            if let Some(step) = report.step_switched {
                assert_eq!(report.run_mode, RunMode::Stopped);
                break step;
            }
            assert_eq!(report.run_mode, RunMode::Running);
            now += 10;
            assert!(now < 10_000, "clamp step never finished");
        };
        assert_eq!(switched, 1);

        // Stays parked on step 1 until the operator presses start again.
        let report = rig.tick(TickInputs::idle(false), MockInstant(now + 5_000));
        assert_eq!(report.current_step, 1);
        assert_eq!(report.step_switched, None);
    }

    #[test]
    fn status_reflects_controller_state() {
        let mut rig = controller(RigConfig::standard());
        rig.tick(TickInputs::idle(true).with_start_stop(), MockInstant(0));
        let status = rig.status();
        assert_eq!(status.current_step, 0);
        assert_eq!(status.step_name, "CLAMP STRAP");
        assert_eq!(status.run_mode, RunMode::Running);
        assert_eq!(status.control_mode, ControlMode::Auto);
        assert_eq!(status.reset_stage, ResetStage::Idle);
        assert_eq!(status.strike_limit, 3);
        assert!(!status.indicator_active);
    }
}
