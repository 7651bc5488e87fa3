//! Telemetry event catalog and the in-memory history ring.
//!
//! Events are small `Copy` values so the control loop can hand them to the
//! firmware logger and the emulator transcript without allocation. The ring
//! keeps the most recent [`TELEMETRY_RING_CAPACITY`] records for the console
//! `status` view.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::config::ConfigError;
use crate::control::{ConfigFetchError, FatalRestart};
use crate::playback::PhaseTransition;
use crate::status::StatusCode;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Discriminated telemetry events emitted by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    StatusChanged {
        from: Option<StatusCode>,
        to: Option<StatusCode>,
    },
    PhaseChanged(PhaseTransition),
    ChannelChanged(usize),
    StreamConnect {
        channel: usize,
        accepted: bool,
    },
    StreamStop,
    AmplifierPower(bool),
    VolumeApplied(u8),
    LampTestComplete,
    NetworkSetupComplete,
    NetworkLost,
    NetworkRestored,
    ConfigFetched,
    ConfigUnchanged,
    ConfigFetchFailed(ConfigFetchError),
    ConfigRejected(ConfigError),
    FatalRestart(FatalRestart),
}

impl TelemetryEventKind {
    /// Warnings and worse are logged at a higher level by the firmware.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            TelemetryEventKind::NetworkLost
                | TelemetryEventKind::ConfigFetchFailed(_)
                | TelemetryEventKind::ConfigRejected(_)
                | TelemetryEventKind::FatalRestart(_)
        )
    }
}

struct StatusLabel(Option<StatusCode>);

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => code.fmt(f),
            None => f.write_str("off"),
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::StatusChanged { from, to } => {
                write!(f, "status {} -> {}", StatusLabel(*from), StatusLabel(*to))
            }
            TelemetryEventKind::PhaseChanged(transition) => {
                write!(f, "phase {} -> {}", transition.from, transition.to)
            }
            TelemetryEventKind::ChannelChanged(channel) => write!(f, "channel {channel}"),
            TelemetryEventKind::StreamConnect { channel, accepted } => {
                let verdict = if *accepted { "accepted" } else { "refused" };
                write!(f, "connect channel {channel} {verdict}")
            }
            TelemetryEventKind::StreamStop => f.write_str("stream stop"),
            TelemetryEventKind::AmplifierPower(on) => {
                write!(f, "amplifier {}", if *on { "on" } else { "off" })
            }
            TelemetryEventKind::VolumeApplied(volume) => write!(f, "volume {volume}"),
            TelemetryEventKind::LampTestComplete => f.write_str("lamp test complete"),
            TelemetryEventKind::NetworkSetupComplete => f.write_str("network associated"),
            TelemetryEventKind::NetworkLost => f.write_str("network lost"),
            TelemetryEventKind::NetworkRestored => f.write_str("network restored"),
            TelemetryEventKind::ConfigFetched => f.write_str("config applied"),
            TelemetryEventKind::ConfigUnchanged => f.write_str("remote config disabled"),
            TelemetryEventKind::ConfigFetchFailed(error) => {
                write!(f, "config fetch failed: {error}")
            }
            TelemetryEventKind::ConfigRejected(error) => write!(f, "config rejected: {error}"),
            TelemetryEventKind::FatalRestart(reason) => write!(f, "restart: {reason}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Time between the most recent record and `now`.
    pub fn since_latest(&self, now: TInstant) -> Option<Duration> {
        self.latest()
            .map(|record| now.saturating_duration_since(record.timestamp))
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
