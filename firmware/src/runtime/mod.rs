use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::wdg::IndependentWatchdog;
use static_cell::StaticCell;

use controller_core::actuation::TimedActuationPort;
use controller_core::controller::RigController;
use controller_core::cycle::strap_cycle;
use controller_core::faults::RamFaultCounters;

use crate::rig::{FirmwareInstant, HardwareOutputs, RIG_CONFIG, SwitchInputs};
use crate::telemetry::{FirmwareRecorder, LoggingSink};

mod button_task;
mod control_task;
mod heartbeat_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Watchdog period; several control ticks must be missed before it bites.
const WATCHDOG_TIMEOUT_US: u32 = 500_000;

static TELEMETRY: StaticCell<FirmwareRecorder> = StaticCell::new();

pub(super) type FirmwareRig = RigController<
    FirmwareInstant,
    TimedActuationPort<HardwareOutputs<'static>, FirmwareInstant>,
    RamFaultCounters,
    LoggingSink,
>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PB3,
        PB4,
        PB5,
        PB6,
        PB7,
        EXTI0,
        IWDG,
        ..
    } = hal::init(hal::Config::default());

    let outputs = HardwareOutputs::new(
        Output::new(PB3, Level::Low, Speed::Low),
        Output::new(PB4, Level::Low, Speed::Low),
        Output::new(PB5, Level::Low, Speed::Low),
        Output::new(PB6, Level::Low, Speed::Low),
    );
    let lamp = Output::new(PB7, Level::Low, Speed::Low);
    let switches = SwitchInputs {
        auto_mode: Input::new(PA1, Pull::Up),
        material: Input::new(PA4, Pull::Up),
        end_switch: Input::new(PA5, Pull::Up),
    };
    let button = ExtiInput::new(PA0, EXTI0, Pull::Up);

    let config = RIG_CONFIG;
    let sink = LoggingSink::new(TELEMETRY.init(FirmwareRecorder::new()));
    let rig: FirmwareRig = RigController::new(
        config,
        TimedActuationPort::new(outputs),
        RamFaultCounters::new(strap_cycle().len()),
        sink,
    )
    .expect("standard rig configuration must validate");

    let mut watchdog = IndependentWatchdog::new(IWDG, WATCHDOG_TIMEOUT_US);
    watchdog.unleash();

    defmt::info!(
        "strap rig controller up, tick={}ms",
        u64::try_from(config.tick_interval.as_millis()).unwrap_or(u64::MAX)
    );

    spawner
        .spawn(button_task::run(button))
        .expect("failed to spawn start/stop button task");
    spawner
        .spawn(control_task::run(rig, switches, lamp, watchdog))
        .expect("failed to spawn control task");
    spawner
        .spawn(heartbeat_task::run())
        .expect("failed to spawn heartbeat task");

    core::future::pending::<()>().await;
}
