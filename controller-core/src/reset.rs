//! Multi-tick recovery procedure.
//!
//! A reset de-energizes every actuator, runs one full recovery stroke on a
//! designated actuator so the mechanism starts from a known position, then
//! re-arms the sequencer at step 0. Each stage spans one or more ticks; nothing
//! here waits in place.

use core::ops::Add;
use core::time::Duration;

use crate::actuation::ActuationPort;
use crate::cycle::{ActuatorId, ActuatorState};
use crate::sequencer::StepSequencer;

/// Half of the recovery stroke currently being driven.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StrokePhase {
    Extend,
    Return,
}

/// Current stage of the reset procedure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetStage {
    /// No reset in progress.
    Idle,
    /// Release every valve on the next poll.
    DeEnergize,
    /// Drive the recovery actuator; no timeout applies here.
    RecoveryStroke(StrokePhase),
    /// Return control to the sequencer at step 0.
    Rearm,
}

impl ResetStage {
    pub const fn is_active(self) -> bool {
        !matches!(self, ResetStage::Idle)
    }

    pub const fn label(self) -> &'static str {
        match self {
            ResetStage::Idle => "idle",
            ResetStage::DeEnergize => "de-energize",
            ResetStage::RecoveryStroke(StrokePhase::Extend) => "recovery extend",
            ResetStage::RecoveryStroke(StrokePhase::Return) => "recovery return",
            ResetStage::Rearm => "rearm",
        }
    }
}

/// Outcome of a single [`ResetSequence::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetProgress {
    Idle,
    InProgress(ResetStage),
    Completed { resumed: bool },
}

/// Re-entrant reset state machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResetSequence {
    stage: ResetStage,
    actuator: ActuatorId,
    stroke: Duration,
}

impl ResetSequence {
    /// Creates an idle reset that strokes `actuator` for up to `stroke` each way.
    pub const fn new(actuator: ActuatorId, stroke: Duration) -> Self {
        Self {
            stage: ResetStage::Idle,
            actuator,
            stroke,
        }
    }

    pub const fn stage(&self) -> ResetStage {
        self.stage
    }

    pub const fn is_active(&self) -> bool {
        self.stage.is_active()
    }

    pub const fn recovery_actuator(&self) -> ActuatorId {
        self.actuator
    }

    /// Starts a reset, stopping the sequencer first.
    ///
    /// Returns `false` without touching anything when a reset is already
    /// running; an in-flight reset always runs to completion.
    pub fn request(&mut self, sequencer: &mut StepSequencer, resume: bool) -> bool {
        if self.stage.is_active() {
            return false;
        }
        sequencer.enter_reset(resume);
        self.stage = ResetStage::DeEnergize;
        true
    }

    /// Advances the procedure by at most one stage.
    pub fn poll<P, I>(
        &mut self,
        sequencer: &mut StepSequencer,
        port: &mut P,
        now: I,
    ) -> ResetProgress
    where
        P: ActuationPort<I>,
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        match self.stage {
            ResetStage::Idle => return ResetProgress::Idle,
            ResetStage::DeEnergize => {
                port.de_energize_all();
                self.stage = ResetStage::RecoveryStroke(StrokePhase::Extend);
            }
            ResetStage::RecoveryStroke(StrokePhase::Extend) => {
                if self.drive_stroke(port, ActuatorState::Extended, now) {
                    self.stage = ResetStage::RecoveryStroke(StrokePhase::Return);
                }
            }
            ResetStage::RecoveryStroke(StrokePhase::Return) => {
                if self.drive_stroke(port, ActuatorState::Retracted, now) {
                    self.stage = ResetStage::Rearm;
                }
            }
            ResetStage::Rearm => {
                sequencer.finish_reset();
                self.stage = ResetStage::Idle;
                return ResetProgress::Completed {
                    resumed: sequencer.is_running(),
                };
            }
        }
        ResetProgress::InProgress(self.stage)
    }

    fn drive_stroke<P, I>(&self, port: &mut P, target: ActuatorState, now: I) -> bool
    where
        P: ActuationPort<I>,
    {
        port.drive(self.actuator, target, self.stroke, Duration::ZERO, now)
    }
}
