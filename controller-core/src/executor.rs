//! Maps the sequencer's current step onto actuation port calls.

use core::ops::Add;
use core::time::Duration;

use crate::actuation::ActuationPort;
use crate::cycle::CycleStep;
use crate::sequencer::StepSequencer;

/// Drives one step per tick and advances the sequencer once it completes.
#[derive(Copy, Clone, Debug)]
pub struct CycleExecutor<'a> {
    steps: &'a [CycleStep],
    cooling_time: Duration,
}

impl<'a> CycleExecutor<'a> {
    pub const fn new(steps: &'a [CycleStep], cooling_time: Duration) -> Self {
        Self {
            steps,
            cooling_time,
        }
    }

    pub const fn steps(&self) -> &'a [CycleStep] {
        self.steps
    }

    pub const fn cooling_time(&self) -> Duration {
        self.cooling_time
    }

    /// Returns the step the sequencer currently points at.
    pub fn current(&self, sequencer: &StepSequencer) -> Option<&'a CycleStep> {
        self.steps.get(sequencer.current_step())
    }

    /// Polls the current step's actuation. Returns `true` when the step
    /// completed and the sequencer advanced.
    pub fn poll<P, I>(&self, sequencer: &mut StepSequencer, port: &mut P, now: I) -> bool
    where
        P: ActuationPort<I>,
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        let Some(step) = self.steps.get(sequencer.current_step()) else {
            return false;
        };
        let action = step.action;
        let done = port.drive(
            action.actuator,
            action.target,
            action.max_duration,
            action.hold.resolve(self.cooling_time),
            now,
        );
        if done {
            sequencer.advance();
        }
        done
    }
}
