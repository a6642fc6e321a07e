//! Hardware bindings between the rig's GPIO and `controller-core`.
//!
//! Pin map (STM32G0B1KE):
//!
//! | Signal              | Pin  | Direction | Active |
//! |---------------------|------|-----------|--------|
//! | Clamp valve         | PB3  | output    | high   |
//! | Tensioner valve     | PB4  | output    | high   |
//! | Welder valve        | PB5  | output    | high   |
//! | Sled valve          | PB6  | output    | high   |
//! | Fault lamp          | PB7  | output    | high   |
//! | Start/stop button   | PA0  | EXTI0     | low    |
//! | Auto/step switch    | PA1  | input     | low    |
//! | Strap presence      | PA4  | input     | low    |
//! | Right end switch    | PA5  | input     | low    |

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::ops::Add;
use core::time::Duration;

use controller_core::config::RigConfig;
use controller_core::latch::StartStopLatch;
use controller_core::telemetry::TelemetryInstant;
use embassy_time::{Duration as EmbassyDuration, Instant as EmbassyInstant};

/// Configuration the rig boots with.
pub const RIG_CONFIG: RigConfig = RigConfig::standard();

/// Start/stop requests handed from the button task to the control task.
pub static START_STOP: StartStopLatch = StartStopLatch::new(RIG_CONFIG.start_stop_debounce);

/// Monotonic firmware instant used throughout the control loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(EmbassyInstant);

impl FirmwareInstant {
    pub const fn into_embassy(self) -> EmbassyInstant {
        self.0
    }

    /// Reads the embassy time driver.
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(EmbassyInstant::now())
    }

    /// Milliseconds since boot on a wrapping 32-bit clock, as the start/stop
    /// latch expects.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn wrapping_millis(self) -> u32 {
        self.0.as_millis() as u32
    }
}

impl From<EmbassyInstant> for FirmwareInstant {
    fn from(instant: EmbassyInstant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let sum = self
            .0
            .checked_add(EmbassyDuration::from_micros(micros))
            .unwrap_or(EmbassyInstant::MAX);
        Self(sum)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0
            .checked_duration_since(earlier.0)
            .map_or(Duration::ZERO, |elapsed| Duration::from_micros(elapsed.as_micros()))
    }
}

/// Converts a core duration into an embassy duration, saturating.
pub fn to_embassy(duration: Duration) -> EmbassyDuration {
    EmbassyDuration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

#[cfg(target_os = "none")]
pub use hardware::{HardwareOutputs, SwitchInputs};

#[cfg(target_os = "none")]
mod hardware {
    use controller_core::actuation::ActuatorOutputs;
    use controller_core::cycle::{ActuatorId, ActuatorState};
    use embassy_stm32::gpio::{Input, Output};

    /// Valve drivers for the four pneumatic actuators.
    pub struct HardwareOutputs<'d> {
        clamp: Output<'d>,
        tensioner: Output<'d>,
        welder: Output<'d>,
        sled: Output<'d>,
    }

    impl<'d> HardwareOutputs<'d> {
        pub fn new(
            clamp: Output<'d>,
            tensioner: Output<'d>,
            welder: Output<'d>,
            sled: Output<'d>,
        ) -> Self {
            Self {
                clamp,
                tensioner,
                welder,
                sled,
            }
        }

        fn output_mut(&mut self, actuator: ActuatorId) -> &mut Output<'d> {
            match actuator {
                ActuatorId::Clamp => &mut self.clamp,
                ActuatorId::Tensioner => &mut self.tensioner,
                ActuatorId::Welder => &mut self.welder,
                ActuatorId::Sled => &mut self.sled,
            }
        }
    }

    impl ActuatorOutputs for HardwareOutputs<'_> {
        fn apply(&mut self, actuator: ActuatorId, state: ActuatorState) {
            let output = self.output_mut(actuator);
            if state.is_energised() {
                output.set_high();
            } else {
                output.set_low();
            }
        }

        fn release_all(&mut self) {
            self.clamp.set_low();
            self.tensioner.set_low();
            self.welder.set_low();
            self.sled.set_low();
        }
    }

    /// Level-sampled operator and machine switches (all active low).
    pub struct SwitchInputs<'d> {
        pub auto_mode: Input<'d>,
        pub material: Input<'d>,
        pub end_switch: Input<'d>,
    }

    impl SwitchInputs<'_> {
        pub fn auto_selected(&self) -> bool {
            self.auto_mode.is_low()
        }

        pub fn material_present(&self) -> bool {
            self.material.is_low()
        }

        pub fn end_switch_closed(&self) -> bool {
            self.end_switch.is_low()
        }
    }
}
