use embassy_stm32::exti::ExtiInput;

use crate::rig::{FirmwareInstant, START_STOP};

/// Feeds start/stop presses into the latch; debouncing happens there.
#[embassy_executor::task]
pub async fn run(mut button: ExtiInput<'static>) -> ! {
    loop {
        button.wait_for_falling_edge().await;
        if !START_STOP.signal(FirmwareInstant::now().wrapping_millis()) {
            defmt::trace!("start/stop bounce ignored");
        }
    }
}
