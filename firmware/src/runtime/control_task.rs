use cortex_m::peripheral::SCB;
use embassy_time::{Duration, Ticker, Timer};
use radio_core::indicator::IndicatorDriver;

use super::{INDICATOR, Radio, SharedOutput};
use crate::clock::{FirmwareInstant, to_embassy};
use crate::hw::board::Potentiometers;
use crate::telemetry;

/// Time for the RTT host to drain the restart log before reset.
const RESTART_LOG_GRACE: Duration = Duration::from_millis(20);

/// Samples the pots and polls the control loop once per control tick.
#[embassy_executor::task]
pub async fn run(
    mut radio: Radio,
    mut pots: Potentiometers<'static>,
    mut output: SharedOutput,
) -> ! {
    let mut driver = IndicatorDriver::new(&INDICATOR, radio.config().palette);
    let mut ticker = Ticker::every(to_embassy(radio.config().timing.control_tick));

    loop {
        let now = FirmwareInstant::now();
        let input = pots.sample(&radio.config().stations, radio.config().volume);
        let report = radio.poll(now, input, &mut driver, &mut output);
        telemetry::log_report(now, &report);

        if let Some(reason) = report.restart {
            telemetry::log_restart(now, reason);
            Timer::after(RESTART_LOG_GRACE).await;
            SCB::sys_reset();
        }

        ticker.next().await;
    }
}
