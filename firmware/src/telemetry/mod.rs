#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Log sink for control loop reports.
//!
//! The control loop keeps its own telemetry ring; this module mirrors every
//! reported event to defmt on the target and to stdout on a host build.

use radio_core::control::{FatalRestart, PollReport};
use radio_core::telemetry::TelemetryEventKind;

use crate::clock::FirmwareInstant;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Restarts are errors, other faults are warnings.
#[must_use]
pub fn level_of(event: &TelemetryEventKind) -> LogLevel {
    match event {
        TelemetryEventKind::FatalRestart(_) => LogLevel::Error,
        event if event.is_fault() => LogLevel::Warn,
        _ => LogLevel::Info,
    }
}

/// Logs every event in a poll report, stamped with the poll time.
pub fn log_report(now: FirmwareInstant, report: &PollReport) {
    let timestamp_ms = now.as_millis();
    for event in &report.events {
        emit_event(level_of(event), timestamp_ms, event);
    }
}

/// Logged right before the reset so the reason survives on the RTT console.
pub fn log_restart(now: FirmwareInstant, reason: FatalRestart) {
    emit_restart(now.as_millis(), reason);
}

#[cfg(target_os = "none")]
fn emit_event(level: LogLevel, timestamp_ms: u64, event: &TelemetryEventKind) {
    let event = defmt::Display2Format(event);
    match level {
        LogLevel::Info => defmt::info!("telemetry:radio t={}ms {}", timestamp_ms, event),
        LogLevel::Warn => defmt::warn!("telemetry:radio t={}ms {}", timestamp_ms, event),
        LogLevel::Error => defmt::error!("telemetry:radio t={}ms {}", timestamp_ms, event),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(level: LogLevel, timestamp_ms: u64, event: &TelemetryEventKind) {
    println!("telemetry:radio {level:?} t={timestamp_ms}ms {event}");
}

#[cfg(target_os = "none")]
fn emit_restart(timestamp_ms: u64, reason: FatalRestart) {
    defmt::error!(
        "restarting t={}ms reason={}",
        timestamp_ms,
        defmt::Display2Format(&reason)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_restart(timestamp_ms: u64, reason: FatalRestart) {
    println!("restarting t={timestamp_ms}ms reason={reason}");
}
