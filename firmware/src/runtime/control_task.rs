use embassy_stm32::gpio::{Level, Output};
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::Ticker;

use controller_core::controller::TickInputs;
use controller_core::latch::RisingEdge;

use super::FirmwareRig;
use crate::rig::{FirmwareInstant, START_STOP, SwitchInputs, to_embassy};
use crate::status;

/// Single cooperative control loop: sample, tick, drive the lamp, pet the dog.
#[embassy_executor::task]
pub async fn run(
    mut rig: FirmwareRig,
    switches: SwitchInputs<'static>,
    mut lamp: Output<'static>,
    mut watchdog: IndependentWatchdog<'static>,
) -> ! {
    let mut ticker = Ticker::every(to_embassy(rig.config().tick_interval));
    let mut end_switch = RisingEdge::new(switches.end_switch_closed());

    loop {
        let now = FirmwareInstant::now();
        let inputs = TickInputs {
            start_stop: START_STOP.take(),
            auto_mode: switches.auto_selected(),
            material_present: switches.material_present(),
            progress: end_switch.update(switches.end_switch_closed()),
        };

        let report = rig.tick(inputs, now);
        lamp.set_level(Level::from(report.indicator));
        status::publish(&rig.status(), now.wrapping_millis());

        watchdog.pet();
        ticker.next().await;
    }
}
