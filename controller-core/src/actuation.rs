//! Actuator abstractions shared between firmware and host targets.
//!
//! [`ActuatorOutputs`] is the thin pin-level seam each target implements.
//! [`TimedActuationPort`] layers the polled, timed-stroke contract the cycle
//! executor and reset sequence rely on over any output implementation.

use core::ops::Add;
use core::time::Duration;

use crate::cycle::{ACTUATOR_COUNT, ALL_ACTUATORS, ActuatorId, ActuatorState};

/// Polled actuation contract consumed by the control loop.
///
/// `drive` is called once per tick with the same arguments until it reports
/// completion. Repeated calls for an in-flight motion never restart it; the
/// completion is reported once, after which the next call starts a new motion.
pub trait ActuationPort<I> {
    /// Drives `actuator` toward `target` for `max_duration`, then holds for
    /// `hold`. Returns `true` on the tick the operation completes.
    fn drive(
        &mut self,
        actuator: ActuatorId,
        target: ActuatorState,
        max_duration: Duration,
        hold: Duration,
        now: I,
    ) -> bool;

    /// Applies `state` immediately without waiting for completion.
    fn set_immediate(&mut self, actuator: ActuatorId, state: ActuatorState);

    /// Returns every actuator to its neutral, retracted state.
    fn de_energize_all(&mut self) {
        for line in ALL_ACTUATORS {
            self.set_immediate(line.id, ActuatorState::Retracted);
        }
    }
}

/// Abstraction over the physical valve drivers.
pub trait ActuatorOutputs {
    /// Energises or releases the valve for `actuator`.
    fn apply(&mut self, actuator: ActuatorId, state: ActuatorState);

    /// Releases every valve.
    fn release_all(&mut self);
}

/// Output driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuatorOutputs;

impl NoopActuatorOutputs {
    /// Creates a new no-op output driver.
    pub const fn new() -> Self {
        Self
    }
}

impl ActuatorOutputs for NoopActuatorOutputs {
    fn apply(&mut self, _: ActuatorId, _: ActuatorState) {}

    fn release_all(&mut self) {}
}

/// In-flight motion tracked per actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Motion<I> {
    target: ActuatorState,
    done_at: I,
}

/// Actuation port that completes strokes on elapsed time.
///
/// The rig's cylinders have no position feedback, so a stroke counts as done
/// once its travel budget plus hold has elapsed since the valve switched.
pub struct TimedActuationPort<O, I> {
    outputs: O,
    motions: [Option<Motion<I>>; ACTUATOR_COUNT],
    levels: [ActuatorState; ACTUATOR_COUNT],
}

impl<O, I> TimedActuationPort<O, I>
where
    O: ActuatorOutputs,
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Wraps `outputs`, releasing every valve so the port starts from a known state.
    pub fn new(mut outputs: O) -> Self {
        outputs.release_all();
        Self {
            outputs,
            motions: [None; ACTUATOR_COUNT],
            levels: [ActuatorState::Retracted; ACTUATOR_COUNT],
        }
    }

    /// Returns the last commanded state for `actuator`.
    pub fn level(&self, actuator: ActuatorId) -> ActuatorState {
        self.levels[actuator.as_index()]
    }

    /// Returns `true` while a motion is in flight for `actuator`.
    pub fn is_moving(&self, actuator: ActuatorId) -> bool {
        self.motions[actuator.as_index()].is_some()
    }

    /// Accesses the wrapped output driver.
    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Mutably accesses the wrapped output driver.
    pub fn outputs_mut(&mut self) -> &mut O {
        &mut self.outputs
    }

    fn command(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.levels[actuator.as_index()] = state;
        self.outputs.apply(actuator, state);
    }
}

impl<O, I> ActuationPort<I> for TimedActuationPort<O, I>
where
    O: ActuatorOutputs,
    I: Copy + Ord + Add<Duration, Output = I>,
{
    fn drive(
        &mut self,
        actuator: ActuatorId,
        target: ActuatorState,
        max_duration: Duration,
        hold: Duration,
        now: I,
    ) -> bool {
        let slot = actuator.as_index();
        match self.motions[slot] {
            Some(motion) if motion.target == target => {
                if now >= motion.done_at {
                    self.motions[slot] = None;
                    true
                } else {
                    false
                }
            }
            _ => {
                self.command(actuator, target);
                let done_at = now + max_duration + hold;
                if now >= done_at {
                    self.motions[slot] = None;
                    true
                } else {
                    self.motions[slot] = Some(Motion { target, done_at });
                    false
                }
            }
        }
    }

    fn set_immediate(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.motions[actuator.as_index()] = None;
        self.command(actuator, state);
    }

    fn de_energize_all(&mut self) {
        self.motions = [None; ACTUATOR_COUNT];
        self.levels = [ActuatorState::Retracted; ACTUATOR_COUNT];
        self.outputs.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingOutputs {
        energised: [bool; ACTUATOR_COUNT],
        applies: usize,
        releases: usize,
    }

    impl ActuatorOutputs for RecordingOutputs {
        fn apply(&mut self, actuator: ActuatorId, state: ActuatorState) {
            self.energised[actuator.as_index()] = state.is_energised();
            self.applies += 1;
        }

        fn release_all(&mut self) {
            self.energised = [false; ACTUATOR_COUNT];
            self.releases += 1;
        }
    }

    const EXTEND: ActuatorState = ActuatorState::Extended;
    const RETRACT: ActuatorState = ActuatorState::Retracted;

    /// Polls one hold-free motion at `at` milliseconds.
    fn drive<O: ActuatorOutputs>(
        port: &mut TimedActuationPort<O, MockInstant>,
        actuator: ActuatorId,
        target: ActuatorState,
        stroke: Duration,
        at: u64,
    ) -> bool {
        port.drive(actuator, target, stroke, Duration::ZERO, MockInstant(at))
    }

    #[test]
    fn drive_completes_after_stroke_and_hold() {
        let mut port = TimedActuationPort::new(RecordingOutputs::default());
        let clamp = ActuatorId::Clamp;
        let stroke = Duration::from_millis(400);
        let hold = Duration::from_millis(100);

        assert!(!port.drive(clamp, EXTEND, stroke, hold, MockInstant(0)));
        assert!(port.outputs().energised[clamp.as_index()]);
        assert!(port.is_moving(clamp));

        assert!(!port.drive(clamp, EXTEND, stroke, hold, MockInstant(499)));
        assert!(port.drive(clamp, EXTEND, stroke, hold, MockInstant(500)));
        assert!(!port.is_moving(clamp));
        assert_eq!(port.outputs().applies, 1, "polling must not re-apply the valve");
    }

    #[test]
    fn completion_is_reported_once_per_motion() {
        let mut port = TimedActuationPort::new(RecordingOutputs::default());
        let welder = ActuatorId::Welder;
        let stroke = Duration::from_millis(10);

        assert!(!drive(&mut port, welder, EXTEND, stroke, 0));
        assert!(drive(&mut port, welder, EXTEND, stroke, 10));
        // Same target again begins a fresh timed motion.
        assert!(!drive(&mut port, welder, EXTEND, stroke, 11));
        assert!(drive(&mut port, welder, EXTEND, stroke, 21));
    }

    #[test]
    fn zero_length_motion_completes_immediately() {
        let mut port = TimedActuationPort::new(NoopActuatorOutputs::new());
        assert!(drive(&mut port, ActuatorId::Sled, RETRACT, Duration::ZERO, 7));
        assert!(!port.is_moving(ActuatorId::Sled));
    }

    #[test]
    fn retargeting_restarts_the_motion() {
        let mut port = TimedActuationPort::new(RecordingOutputs::default());
        let sled = ActuatorId::Sled;
        let stroke = Duration::from_millis(100);

        drive(&mut port, sled, EXTEND, stroke, 0);
        assert!(!drive(&mut port, sled, RETRACT, stroke, 50));
        assert_eq!(port.level(sled), RETRACT);
        assert!(!drive(&mut port, sled, RETRACT, stroke, 149));
        assert!(drive(&mut port, sled, RETRACT, stroke, 150));
    }

    #[test]
    fn de_energize_all_cancels_motions() {
        let mut port = TimedActuationPort::new(RecordingOutputs::default());
        let stroke = Duration::from_millis(100);

        drive(&mut port, ActuatorId::Clamp, EXTEND, stroke, 0);
        drive(&mut port, ActuatorId::Tensioner, EXTEND, stroke, 0);
        port.de_energize_all();

        assert!(!port.is_moving(ActuatorId::Clamp));
        assert!(!port.is_moving(ActuatorId::Tensioner));
        assert_eq!(port.level(ActuatorId::Clamp), ActuatorState::Retracted);
        assert_eq!(port.outputs().energised, [false; ACTUATOR_COUNT]);
        // Construction releases once, de-energize once more.
        assert_eq!(port.outputs().releases, 2);
    }
}
