#![no_std]

// Control core for the internet radio appliance.
//
// The crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Collaborators (audio client, network link, config
// source, indicator pins) are traits implemented by the firmware and the
// emulator.

pub mod config;
pub mod console;
pub mod control;
pub mod indicator;
pub mod network;
pub mod playback;
pub mod status;
pub mod telemetry;
