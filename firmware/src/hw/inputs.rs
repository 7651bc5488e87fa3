#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Potentiometer scaling.
//!
//! Both pots are read through the 12-bit ADC. The channel pot is split into
//! twelve zones and each station count assigns zones to stations; stations at
//! either end of the travel get fewer zones because the end stops make them
//! easy to find.

use radio_core::config::{MAX_STATIONS, VolumeRange};
use radio_core::playback::InputSnapshot;

pub const ADC_FULL_SCALE: u16 = 4_095;
pub const CHANNEL_ZONES: usize = 12;

/// Station index per zone, one row per active station count.
const CHANNEL_MAP: [[u8; CHANNEL_ZONES]; MAX_STATIONS] = [
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1],
    [0, 0, 0, 1, 1, 1, 1, 1, 1, 2, 2, 2],
    [0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3],
];

/// Integer linear rescale of `value` from `0..=ADC_FULL_SCALE` onto
/// `low..=high`, truncating toward `low`.
fn rescale(value: u16, low: u32, high: u32) -> u32 {
    let value = u32::from(value.min(ADC_FULL_SCALE));
    value * (high - low) / u32::from(ADC_FULL_SCALE) + low
}

/// Zone under the channel pot wiper.
#[must_use]
pub fn channel_zone(raw: u16) -> usize {
    let last = u32::try_from(CHANNEL_ZONES - 1).unwrap_or(u32::MAX);
    usize::try_from(rescale(raw, 0, last)).unwrap_or(CHANNEL_ZONES - 1)
}

/// Station selected by the channel pot for the given active count.
#[must_use]
pub fn channel_from_adc(raw: u16, active_count: usize) -> usize {
    let row = active_count.clamp(1, MAX_STATIONS) - 1;
    usize::from(CHANNEL_MAP[row][channel_zone(raw)])
}

/// Volume selected by the volume pot.
#[must_use]
pub fn volume_from_adc(raw: u16, range: VolumeRange) -> u8 {
    let volume = rescale(raw, u32::from(range.min()), u32::from(range.max()));
    u8::try_from(volume).unwrap_or(range.max())
}

/// Converts one pair of pot readings into a control loop input.
#[must_use]
pub fn snapshot(
    channel_raw: u16,
    volume_raw: u16,
    active_count: usize,
    range: VolumeRange,
) -> InputSnapshot {
    InputSnapshot::new(
        channel_from_adc(channel_raw, active_count),
        volume_from_adc(volume_raw, range),
    )
}
