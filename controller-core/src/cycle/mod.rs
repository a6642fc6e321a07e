//! Strap cycle data structures shared by firmware and host targets.
//!
//! The rig runs one fixed, linear cycle of named steps. Every step maps to a
//! single actuator motion that the cycle executor polls until the actuation
//! port reports completion. Everything in this module is `no_std` friendly and
//! `const` so the same table compiles into the STM32 firmware and the host
//! emulator without runtime construction.

use core::time::Duration;

/// Upper bound on the number of steps any cycle table may hold.
pub const MAX_CYCLE_STEPS: usize = 16;

/// Number of pneumatic actuators wired to the rig.
pub const ACTUATOR_COUNT: usize = 4;

/// Identifier for the pneumatic actuators driven by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorId {
    Clamp,
    Tensioner,
    Welder,
    Sled,
}

impl ActuatorId {
    /// Deterministic index for lookups into [`ALL_ACTUATORS`].
    pub const fn as_index(self) -> usize {
        match self {
            ActuatorId::Clamp => 0,
            ActuatorId::Tensioner => 1,
            ActuatorId::Welder => 2,
            ActuatorId::Sled => 3,
        }
    }

    /// Attempts to construct an [`ActuatorId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ActuatorId::Clamp),
            1 => Some(ActuatorId::Tensioner),
            2 => Some(ActuatorId::Welder),
            3 => Some(ActuatorId::Sled),
            _ => None,
        }
    }
}

impl core::fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(actuator_by_id(*self).name)
    }
}

/// Position an actuator is driven toward.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorState {
    /// Valve energised, cylinder extended.
    Extended,
    /// Valve de-energised, cylinder at its spring-return rest position.
    Retracted,
}

impl ActuatorState {
    /// Returns `true` when the valve output must be energised.
    pub const fn is_energised(self) -> bool {
        matches!(self, ActuatorState::Extended)
    }
}

/// Metadata describing how an actuator valve is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorLine {
    pub id: ActuatorId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    pub valve_output: &'static str,
}

impl ActuatorLine {
    pub const fn new(
        id: ActuatorId,
        name: &'static str,
        mcu_pin: &'static str,
        valve_output: &'static str,
    ) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            valve_output,
        }
    }
}

/// Compile-time catalog of every actuator line.
pub const ALL_ACTUATORS: [ActuatorLine; ACTUATOR_COUNT] = [
    ActuatorLine::new(ActuatorId::Clamp, "CLAMP", "PB3", "Y1"),
    ActuatorLine::new(ActuatorId::Tensioner, "TENSIONER", "PB4", "Y2"),
    ActuatorLine::new(ActuatorId::Welder, "WELDER", "PB5", "Y3"),
    ActuatorLine::new(ActuatorId::Sled, "SLED", "PB6", "Y4"),
];

/// Retrieve actuator metadata by identifier.
pub const fn actuator_by_id(id: ActuatorId) -> ActuatorLine {
    ALL_ACTUATORS[id.as_index()]
}

/// How long an actuator stays at its target once the stroke completes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepHold {
    /// Fixed dwell baked into the cycle table.
    Fixed(Duration),
    /// Dwell taken from the configured weld cooling time.
    CoolingTime,
}

impl StepHold {
    /// Resolves the hold against the configured cooling time.
    pub const fn resolve(self, cooling_time: Duration) -> Duration {
        match self {
            StepHold::Fixed(hold) => hold,
            StepHold::CoolingTime => cooling_time,
        }
    }
}

/// Single actuator motion performed by a cycle step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepAction {
    pub actuator: ActuatorId,
    pub target: ActuatorState,
    pub max_duration: Duration,
    pub hold: StepHold,
}

impl StepAction {
    pub const fn new(
        actuator: ActuatorId,
        target: ActuatorState,
        max_duration: Duration,
        hold: StepHold,
    ) -> Self {
        Self {
            actuator,
            target,
            max_duration,
            hold,
        }
    }
}

/// Ordered entry of the strap cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleStep {
    pub index: usize,
    pub name: &'static str,
    pub action: StepAction,
}

impl CycleStep {
    pub const fn new(index: usize, name: &'static str, action: StepAction) -> Self {
        Self {
            index,
            name,
            action,
        }
    }
}

/// Stroke time for the strap clamp.
pub const CLAMP_STROKE: Duration = Duration::from_millis(400);
/// Stroke time for the tensioning cylinder.
pub const TENSION_STROKE: Duration = Duration::from_millis(1_500);
/// Tension is held this long before the weld head drops.
pub const TENSION_SETTLE: Duration = Duration::from_millis(200);
/// Stroke time for the weld head.
pub const WELDER_STROKE: Duration = Duration::from_millis(600);
/// Friction weld duration once the head is down.
pub const WELD_TIME: Duration = Duration::from_millis(800);
/// Stroke time for releasing tension.
pub const TENSION_RELEASE_STROKE: Duration = Duration::from_millis(800);
/// Stroke time for the strap feed sled in either direction.
pub const SLED_STROKE: Duration = Duration::from_millis(1_200);

/// Ordered steps that make up one strap cycle.
pub const CYCLE_STEPS: [CycleStep; 9] = [
    CycleStep::new(
        0,
        "CLAMP STRAP",
        StepAction::new(
            ActuatorId::Clamp,
            ActuatorState::Extended,
            CLAMP_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
    CycleStep::new(
        1,
        "TENSION STRAP",
        StepAction::new(
            ActuatorId::Tensioner,
            ActuatorState::Extended,
            TENSION_STROKE,
            StepHold::Fixed(TENSION_SETTLE),
        ),
    ),
    CycleStep::new(
        2,
        "WELD",
        StepAction::new(
            ActuatorId::Welder,
            ActuatorState::Extended,
            WELDER_STROKE,
            StepHold::Fixed(WELD_TIME),
        ),
    ),
    // The head stays down while the weld cools; no further travel.
    CycleStep::new(
        3,
        "COOL WELD",
        StepAction::new(
            ActuatorId::Welder,
            ActuatorState::Extended,
            Duration::ZERO,
            StepHold::CoolingTime,
        ),
    ),
    CycleStep::new(
        4,
        "LIFT WELDER",
        StepAction::new(
            ActuatorId::Welder,
            ActuatorState::Retracted,
            WELDER_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
    CycleStep::new(
        5,
        "RELEASE TENSION",
        StepAction::new(
            ActuatorId::Tensioner,
            ActuatorState::Retracted,
            TENSION_RELEASE_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
    CycleStep::new(
        6,
        "OPEN CLAMP",
        StepAction::new(
            ActuatorId::Clamp,
            ActuatorState::Retracted,
            CLAMP_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
    // Feeding the strap forward trips the right end switch.
    CycleStep::new(
        7,
        "SLED FORWARD",
        StepAction::new(
            ActuatorId::Sled,
            ActuatorState::Extended,
            SLED_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
    CycleStep::new(
        8,
        "SLED RETURN",
        StepAction::new(
            ActuatorId::Sled,
            ActuatorState::Retracted,
            SLED_STROKE,
            StepHold::Fixed(Duration::ZERO),
        ),
    ),
];

/// Returns the rig's strap cycle.
pub const fn strap_cycle() -> &'static [CycleStep] {
    &CYCLE_STEPS
}

/// Looks up a step by index.
pub fn step_by_index(steps: &[CycleStep], index: usize) -> Option<&CycleStep> {
    steps.get(index)
}

/// Returns the display name for a step, or `"?"` when the index is unknown.
pub fn step_name(steps: &[CycleStep], index: usize) -> &'static str {
    step_by_index(steps, index).map_or("?", |step| step.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_lookup_returns_expected_metadata() {
        let sled = actuator_by_id(ActuatorId::Sled);
        assert_eq!(sled.name, "SLED");
        assert_eq!(sled.mcu_pin, "PB6");
        assert_eq!(sled.valve_output, "Y4");

        for (index, line) in ALL_ACTUATORS.iter().enumerate() {
            assert_eq!(line.id.as_index(), index);
            assert_eq!(ActuatorId::from_index(index), Some(line.id));
        }
        assert_eq!(ActuatorId::from_index(ACTUATOR_COUNT), None);
    }

    #[test]
    fn cycle_table_is_indexed_by_position() {
        let steps = strap_cycle();
        assert_eq!(steps.len(), 9);
        assert!(steps.len() <= MAX_CYCLE_STEPS);

        for (position, step) in steps.iter().enumerate() {
            assert_eq!(step.index, position, "step {} is out of order", step.name);
        }
    }

    #[test]
    fn every_extension_is_undone_within_the_cycle() {
        for line in ALL_ACTUATORS {
            let last = CYCLE_STEPS
                .iter()
                .rev()
                .find(|step| step.action.actuator == line.id)
                .expect("actuator unused in cycle");
            assert_eq!(
                last.action.target,
                ActuatorState::Retracted,
                "{} must end the cycle retracted",
                line.name
            );
        }
    }

    #[test]
    fn cooling_step_resolves_configured_hold() {
        let cool = &CYCLE_STEPS[3];
        assert_eq!(cool.name, "COOL WELD");
        assert_eq!(cool.action.max_duration, Duration::ZERO);
        assert_eq!(
            cool.action.hold.resolve(Duration::from_millis(1_750)),
            Duration::from_millis(1_750)
        );
        assert_eq!(
            CYCLE_STEPS[2].action.hold.resolve(Duration::from_secs(9)),
            WELD_TIME
        );
    }

    #[test]
    fn step_name_tolerates_unknown_index() {
        assert_eq!(step_name(strap_cycle(), 2), "WELD");
        assert_eq!(step_name(strap_cycle(), 42), "?");
        assert!(step_by_index(strap_cycle(), 9).is_none());
    }
}
