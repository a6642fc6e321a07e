use controller_core::console::status::StatusFormatter;
use embassy_time::{Duration, Ticker};

use crate::rig::FirmwareInstant;
use crate::status;

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);
/// A control loop silent for this long is about to be reset by the watchdog.
const STALL_WARN_MS: u32 = 250;

#[embassy_executor::task]
pub async fn run() -> ! {
    let mut ticker = Ticker::every(HEARTBEAT_PERIOD);
    loop {
        ticker.next().await;
        let now_ms = FirmwareInstant::now().wrapping_millis();

        if let Some(silent_ms) = status::millis_since_tick(now_ms)
            && silent_ms > STALL_WARN_MS
        {
            defmt::warn!("control loop silent for {}ms", silent_ms);
        }

        match status::snapshot() {
            Some(snapshot) => defmt::info!(
                "status {}",
                defmt::Display2Format(&StatusFormatter::new(&snapshot))
            ),
            None => defmt::info!("status: control loop not started"),
        }
    }
}
