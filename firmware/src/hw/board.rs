//! STM32G0 peripherals behind the `radio-core` collaborator traits.
//!
//! Pin map: PA0 channel pot, PA1 volume pot, PA4/PA5/PA6 red/green/blue LED
//! (common anode, so active-low), PA7 amplifier shutdown (high enables).

use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::ADC1;
use radio_core::config::{StationTable, VolumeRange};
use radio_core::indicator::{IndicatorOutput, LedChannel};
use radio_core::network::NetworkLink;
use radio_core::playback::{AudioClient, InputSnapshot};

use super::inputs;

/// Status LED bank.
pub struct LedBank<'d> {
    red: Output<'d>,
    green: Output<'d>,
    blue: Output<'d>,
}

impl<'d> LedBank<'d> {
    /// Pins must start high so the bank powers up dark.
    pub fn new(red: Output<'d>, green: Output<'d>, blue: Output<'d>) -> Self {
        Self { red, green, blue }
    }
}

impl IndicatorOutput for LedBank<'_> {
    fn write(&mut self, channel: LedChannel, lit: bool) {
        let pin = match channel {
            LedChannel::Red => &mut self.red,
            LedChannel::Green => &mut self.green,
            LedChannel::Blue => &mut self.blue,
        };
        if lit {
            pin.set_low();
        } else {
            pin.set_high();
        }
    }
}

/// Channel and volume potentiometers sharing ADC1.
pub struct Potentiometers<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
    volume: AnyAdcChannel<ADC1>,
}

impl<'d> Potentiometers<'d> {
    pub fn new(
        adc: Adc<'d, ADC1>,
        channel: impl AdcChannel<ADC1>,
        volume: impl AdcChannel<ADC1>,
    ) -> Self {
        Self {
            adc,
            channel: channel.degrade_adc(),
            volume: volume.degrade_adc(),
        }
    }

    /// Reads both pots and scales them for the current station table.
    pub fn sample(&mut self, stations: &StationTable, range: VolumeRange) -> InputSnapshot {
        let channel_raw = self.adc.blocking_read(&mut self.channel);
        let volume_raw = self.adc.blocking_read(&mut self.volume);
        inputs::snapshot(channel_raw, volume_raw, stations.active_count(), range)
    }
}

/// Amplifier enable line with no stream decoder behind it yet.
///
/// Connects are refused, so playback stays in its connecting phase and
/// retries once per reconnect backoff. The reconnect watchdog never arms
/// because nothing was ever live.
// TODO: forward connect/stop/volume to the I2S decoder once its driver exists.
pub struct BoardAudio<'d> {
    amplifier: Output<'d>,
}

impl<'d> BoardAudio<'d> {
    pub fn new(amplifier: Output<'d>) -> Self {
        Self { amplifier }
    }
}

impl AudioClient for BoardAudio<'_> {
    fn connect(&mut self, _url: &str) -> bool {
        false
    }

    fn stop(&mut self) {}

    fn set_volume(&mut self, _volume: u8) {}

    fn is_live(&self) -> bool {
        false
    }

    fn buffered_bytes(&self) -> usize {
        0
    }

    fn elapsed_play_time(&self) -> u32 {
        0
    }

    fn set_power(&mut self, on: bool) {
        if on {
            self.amplifier.set_high();
        } else {
            self.amplifier.set_low();
        }
    }
}

/// Link used until the network co-processor is wired up; always associated.
// TODO: replace with the co-processor driver's association state.
pub struct UnmanagedLink;

impl NetworkLink for UnmanagedLink {
    fn is_connected(&self) -> bool {
        true
    }

    fn reconnect(&mut self) {}
}
