//! Bench harness shared by the scenario tests.
//!
//! `Bench` wires a [`RigController`] to a jammable actuation port, RAM fault
//! counters and a telemetry ring, and steps a 10 ms mock clock the way the
//! firmware control task does.

#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use controller_core::actuation::{ActuationPort, ActuatorOutputs, TimedActuationPort};
use controller_core::config::RigConfig;
use controller_core::controller::{RigController, TickInputs, TickReport};
use controller_core::cycle::{ACTUATOR_COUNT, ActuatorId, ActuatorState, strap_cycle};
use controller_core::faults::RamFaultCounters;
use controller_core::latch::StartStopLatch;
use controller_core::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};

pub const TICK: Duration = Duration::from_millis(10);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub fn millis(value: u64) -> Self {
        Self(value)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }
}

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

/// Valve bank that remembers the last level of every output.
#[derive(Debug, Default)]
pub struct ValveBank {
    pub energised: [bool; ACTUATOR_COUNT],
    pub releases: usize,
}

impl ActuatorOutputs for ValveBank {
    fn apply(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.energised[actuator.as_index()] = state.is_energised();
    }

    fn release_all(&mut self) {
        self.energised = [false; ACTUATOR_COUNT];
        self.releases += 1;
    }
}

/// Timed port whose motions can be stalled to simulate a jam.
pub struct BenchPort {
    inner: TimedActuationPort<ValveBank, MockInstant>,
    pub jammed: Option<ActuatorId>,
    pub drives: usize,
}

impl BenchPort {
    pub fn new() -> Self {
        Self {
            inner: TimedActuationPort::new(ValveBank::default()),
            jammed: None,
            drives: 0,
        }
    }

    pub fn valves(&self) -> &ValveBank {
        self.inner.outputs()
    }

    pub fn any_energised(&self) -> bool {
        self.valves().energised.iter().any(|&level| level)
    }
}

impl ActuationPort<MockInstant> for BenchPort {
    fn drive(
        &mut self,
        actuator: ActuatorId,
        target: ActuatorState,
        max_duration: Duration,
        hold: Duration,
        now: MockInstant,
    ) -> bool {
        self.drives += 1;
        let done = self.inner.drive(actuator, target, max_duration, hold, now);
        done && self.jammed != Some(actuator)
    }

    fn set_immediate(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.inner.set_immediate(actuator, state);
    }

    fn de_energize_all(&mut self) {
        self.inner.de_energize_all();
    }
}

pub type BenchRig =
    RigController<MockInstant, BenchPort, RamFaultCounters, TelemetryRecorder<MockInstant, 512>>;

pub struct Bench {
    pub rig: BenchRig,
    pub latch: StartStopLatch,
    pub now: MockInstant,
    pub auto: bool,
    pub material: bool,
    /// Pulse the end switch whenever the sled-forward step completes.
    pub auto_progress: bool,
    progress_pending: bool,
}

impl Bench {
    pub fn new(config: RigConfig) -> Self {
        let rig = RigController::new(
            config,
            BenchPort::new(),
            RamFaultCounters::new(strap_cycle().len()),
            TelemetryRecorder::new(),
        )
        .expect("bench config must be valid");

        Self {
            latch: StartStopLatch::new(config.start_stop_debounce),
            rig,
            now: MockInstant::default(),
            auto: true,
            material: true,
            auto_progress: true,
            progress_pending: false,
        }
    }

    pub fn standard() -> Self {
        Self::new(RigConfig::standard())
    }

    /// Presses the start/stop button at the current time.
    pub fn press(&mut self) -> bool {
        let now_ms = u32::try_from(self.now.as_millis()).unwrap();
        self.latch.signal(now_ms)
    }

    /// Pulses the end switch on the next tick.
    pub fn pulse_progress(&mut self) {
        self.progress_pending = true;
    }

    pub fn jam(&mut self, actuator: Option<ActuatorId>) {
        self.rig.port_mut().jammed = actuator;
    }

    /// Runs one tick and advances the clock.
    pub fn tick(&mut self) -> TickReport<MockInstant> {
        let inputs = TickInputs {
            start_stop: self.latch.take(),
            auto_mode: self.auto,
            material_present: self.material,
            progress: core::mem::take(&mut self.progress_pending),
        };
        let report = self.rig.tick(inputs, self.now);
        if self.auto_progress && report.step_switched == Some(8) {
            self.progress_pending = true;
        }
        self.now = self.now + TICK;
        report
    }

    /// Ticks until `done` accepts a report, panicking after `limit`.
    pub fn run_until<F>(&mut self, limit: Duration, mut done: F) -> TickReport<MockInstant>
    where
        F: FnMut(&TickReport<MockInstant>, &BenchRig) -> bool,
    {
        let deadline = self.now + limit;
        while self.now < deadline {
            let report = self.tick();
            if done(&report, &self.rig) {
                return report;
            }
        }
        panic!("condition not reached within {limit:?}");
    }

    /// Ticks for `duration`, returning every report.
    pub fn run_for(&mut self, duration: Duration) -> Vec<TickReport<MockInstant>> {
        let deadline = self.now + duration;
        let mut reports = Vec::new();
        while self.now < deadline {
            reports.push(self.tick());
        }
        reports
    }

    pub fn events(&self) -> Vec<TelemetryEventKind> {
        self.rig
            .sink()
            .oldest_first()
            .map(|record| record.event)
            .collect()
    }

    pub fn fault_count(&self, step: usize) -> u16 {
        self.rig.fault_counts().get(step).unwrap_or_default()
    }
}
