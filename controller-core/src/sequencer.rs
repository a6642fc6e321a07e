//! Step sequencing state machine.
//!
//! [`StepSequencer`] is the single owner of "where are we in the cycle and is
//! the machine allowed to move". It performs pure state transitions; pausing
//! after a step in step mode is left to the caller so display and logging can
//! observe the switch before the halt.

use core::num::NonZeroUsize;

/// Whether the machine is allowed to move.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunMode {
    Stopped,
    Running,
}

/// Operator-selected control mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlMode {
    /// Halt after every step advance.
    Step,
    /// Run the cycle continuously.
    Auto,
}

impl ControlMode {
    /// Maps the live mode switch level onto a control mode.
    pub const fn from_switch(auto_selected: bool) -> Self {
        if auto_selected {
            ControlMode::Auto
        } else {
            ControlMode::Step
        }
    }
}

/// Mutable sequencing record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequencerState {
    pub current_step: usize,
    pub previous_step: usize,
    pub run_mode: RunMode,
    pub control_mode: ControlMode,
    pub reset_mode: bool,
    pub resume_after_reset: bool,
}

impl SequencerState {
    const fn initial() -> Self {
        Self {
            current_step: 0,
            previous_step: 0,
            run_mode: RunMode::Stopped,
            control_mode: ControlMode::Step,
            reset_mode: false,
            resume_after_reset: false,
        }
    }
}

/// Cyclic step sequencer with run/control/reset flags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepSequencer {
    state: SequencerState,
    step_count: NonZeroUsize,
    step_switched: bool,
}

impl StepSequencer {
    /// Creates a stopped sequencer at step 0 in step mode.
    pub const fn new(step_count: NonZeroUsize) -> Self {
        Self {
            state: SequencerState::initial(),
            step_count,
            step_switched: false,
        }
    }

    /// Returns a copy of the current state.
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    pub const fn step_count(&self) -> usize {
        self.step_count.get()
    }

    pub const fn current_step(&self) -> usize {
        self.state.current_step
    }

    pub const fn previous_step(&self) -> usize {
        self.state.previous_step
    }

    pub const fn run_mode(&self) -> RunMode {
        self.state.run_mode
    }

    pub const fn control_mode(&self) -> ControlMode {
        self.state.control_mode
    }

    pub const fn is_running(&self) -> bool {
        matches!(self.state.run_mode, RunMode::Running)
    }

    pub const fn is_auto(&self) -> bool {
        matches!(self.state.control_mode, ControlMode::Auto)
    }

    pub const fn reset_mode(&self) -> bool {
        self.state.reset_mode
    }

    pub const fn resume_after_reset(&self) -> bool {
        self.state.resume_after_reset
    }

    /// Moves to the next step, wrapping after the last one, and latches the
    /// step-switch flag.
    pub fn advance(&mut self) {
        self.state.previous_step = self.state.current_step;
        self.state.current_step = (self.state.current_step + 1) % self.step_count.get();
        self.step_switched = true;
    }

    /// Forces the current step without touching the step-switch flag.
    ///
    /// Returns `false` and leaves the state untouched when `index` is out of range.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.step_count.get() {
            return false;
        }
        self.state.current_step = index;
        true
    }

    pub fn set_running(&mut self, running: bool) {
        self.state.run_mode = if running {
            RunMode::Running
        } else {
            RunMode::Stopped
        };
    }

    /// Flips the run mode. Debouncing is the caller's job.
    pub fn toggle_running(&mut self) {
        let running = self.is_running();
        self.set_running(!running);
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.state.control_mode = mode;
    }

    /// Returns `true` exactly once per [`advance`](Self::advance).
    pub fn step_switch_happened(&mut self) -> bool {
        core::mem::take(&mut self.step_switched)
    }

    pub fn set_reset_mode(&mut self, resetting: bool) {
        self.state.reset_mode = resetting;
    }

    pub fn set_resume_after_reset(&mut self, resume: bool) {
        self.state.resume_after_reset = resume;
    }

    /// Stops the machine and enters reset mode.
    pub fn enter_reset(&mut self, resume: bool) {
        self.set_running(false);
        self.state.resume_after_reset = resume;
        self.state.reset_mode = true;
    }

    /// Leaves reset mode at step 0, resuming if a resume was requested.
    pub fn finish_reset(&mut self) {
        self.jump_to(0);
        self.state.reset_mode = false;
        if self.state.resume_after_reset {
            self.set_running(true);
        }
    }
}
