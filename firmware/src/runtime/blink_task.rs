use core::time::Duration;

use embassy_time::Ticker;
use radio_core::indicator::BlinkToggle;

use super::{INDICATOR, SharedOutput};
use crate::clock::to_embassy;

/// Flips lit channels every half-period while the rendered status blinks.
#[embassy_executor::task]
pub async fn run(mut output: SharedOutput, period: Duration) -> ! {
    let mut toggle = BlinkToggle::new();
    let mut ticker = Ticker::every(to_embassy(period));
    loop {
        ticker.next().await;
        toggle.on_tick(&INDICATOR, &mut output);
    }
}
