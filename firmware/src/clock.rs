#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Monotonic instant handed to `radio-core`.
//!
//! The core is generic over an instant that adds `core::time::Duration`; the
//! embassy clock adds its own tick-based `Duration`, so this wrapper bridges
//! the two.

use core::ops::Add;

use embassy_time::{Duration, Instant};
use radio_core::telemetry::TelemetryInstant;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        Self(self.0.checked_add(to_embassy(rhs)).unwrap_or(Instant::MAX))
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}

/// Converts a core duration into embassy ticks, saturating on overflow.
pub fn to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}
