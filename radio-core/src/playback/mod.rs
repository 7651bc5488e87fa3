//! Playback and stream connection state machine.
//!
//! [`ConnectionStateMachine::tick`] is the only place playback state moves.
//! It runs one ordered pass per control tick: channel change, liveness
//! regression, stop, confirmed playback, connect/retry, reconnect watchdog.
//! Later steps assume the earlier ones already ran, so a liveness sample taken
//! before a retune is never credited to the new channel.

use core::{fmt, ops::Add, time::Duration};

use heapless::Vec;

use crate::config::{StationTable, TimingConfig};
use crate::control::FatalRestart;
use crate::status::{Severity, StatusRegister, catalog};

pub mod liveness;

pub use liveness::{LivenessPolicy, PlaybackProgress, ReportedLiveness};

/// Streaming audio collaborator. Every call must return promptly.
pub trait AudioClient {
    /// Starts streaming `url`. `true` only means the request was accepted;
    /// liveness is judged separately.
    fn connect(&mut self, url: &str) -> bool;

    fn stop(&mut self);

    fn set_volume(&mut self, volume: u8);

    fn is_live(&self) -> bool;

    fn buffered_bytes(&self) -> usize;

    /// Seconds of audio played since the last connect.
    fn elapsed_play_time(&self) -> u32;

    /// Amplifier enable line. Defaults to a no-op for outputs without one.
    fn set_power(&mut self, _enabled: bool) {}
}

/// Playback phases. `Playing` is the only phase with an established
/// connection and `Reconnecting` the only one recovering from a stall, so the
/// two can never hold at once.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaybackPhase {
    Idle,
    Connecting,
    Playing,
    Reconnecting,
    Disconnected,
}

impl PlaybackPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Connecting => "connecting",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Reconnecting => "reconnecting",
            PlaybackPhase::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs sampled at the start of a tick, already in engineering units.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InputSnapshot {
    pub channel: usize,
    pub volume: u8,
}

impl InputSnapshot {
    #[must_use]
    pub const fn new(channel: usize, volume: u8) -> Self {
        Self { channel, volume }
    }

    /// Any non-zero volume requests playback.
    #[must_use]
    pub const fn play_requested(self) -> bool {
        self.volume > 0
    }
}

/// Commands issued to the audio collaborator during a tick, in call order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AudioCommand {
    Stop,
    PowerUp,
    PowerDown,
    Connect { channel: usize, accepted: bool },
    SetVolume(u8),
}

/// Phase change observed during a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseTransition {
    pub from: PlaybackPhase,
    pub to: PlaybackPhase,
}

/// Everything a tick did, for logging and tests.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlaybackReport {
    pub commands: Vec<AudioCommand, 6>,
    pub transitions: Vec<PhaseTransition, 2>,
    pub channel_changed: Option<usize>,
    pub restart: Option<FatalRestart>,
}

impl PlaybackReport {
    fn command(&mut self, command: AudioCommand) {
        // Capacity covers the longest tick (stop, power, connect, volume).
        let _ = self.commands.push(command);
    }

    /// Number of times `command` was issued.
    #[must_use]
    pub fn count(&self, command: AudioCommand) -> usize {
        self.commands.iter().filter(|issued| **issued == command).count()
    }

    /// Number of connect attempts issued.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.commands
            .iter()
            .filter(|issued| matches!(issued, AudioCommand::Connect { .. }))
            .count()
    }
}

/// Playback writes stop at Warning so network errors in the Error slot stay
/// visible underneath routine playback changes.
pub const PLAYBACK_FLOOR: Severity = Severity::Warning;

/// Owns playback state and drives the audio collaborator.
pub struct ConnectionStateMachine<TInstant, L = ReportedLiveness> {
    phase: PlaybackPhase,
    channel: usize,
    applied_volume: Option<u8>,
    amplifier_on: bool,
    last_good_liveness: Option<TInstant>,
    last_attempt: Option<TInstant>,
    retry_immediately: bool,
    watchdog_fired: bool,
    reconnect_backoff: Duration,
    reconnect_ceiling: Duration,
    liveness: L,
}

impl<TInstant> ConnectionStateMachine<TInstant, ReportedLiveness>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    /// Creates a machine that trusts the collaborator's liveness report.
    #[must_use]
    pub fn new(timing: &TimingConfig) -> Self {
        Self::with_liveness(timing, ReportedLiveness)
    }
}

impl<TInstant, L> ConnectionStateMachine<TInstant, L>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
    L: LivenessPolicy<TInstant>,
{
    #[must_use]
    pub fn with_liveness(timing: &TimingConfig, liveness: L) -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            channel: 0,
            applied_volume: None,
            amplifier_on: false,
            last_good_liveness: None,
            last_attempt: None,
            retry_immediately: false,
            watchdog_fired: false,
            reconnect_backoff: timing.reconnect_backoff,
            reconnect_ceiling: timing.reconnect_ceiling,
            liveness,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    #[must_use]
    pub const fn channel(&self) -> usize {
        self.channel
    }

    #[must_use]
    pub fn connection_established(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    #[must_use]
    pub fn reconnecting(&self) -> bool {
        self.phase == PlaybackPhase::Reconnecting
    }

    #[must_use]
    pub const fn last_good_liveness(&self) -> Option<TInstant> {
        self.last_good_liveness
    }

    #[must_use]
    pub const fn last_reconnect_attempt(&self) -> Option<TInstant> {
        self.last_attempt
    }

    /// Runs one control tick.
    pub fn tick<A: AudioClient>(
        &mut self,
        now: TInstant,
        input: InputSnapshot,
        stations: &StationTable,
        audio: &mut A,
        register: &mut StatusRegister,
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        let channel = stations.clamp_channel(input.channel);

        // 1. Retune pre-empts everything else this tick. The connect waits for
        // the next tick, but the old station's status must not outlive it.
        if channel != self.channel {
            self.channel = channel;
            audio.stop();
            report.command(AudioCommand::Stop);
            report.channel_changed = Some(channel);
            self.liveness.reset();
            self.watchdog_fired = false;
            self.enter(PlaybackPhase::Idle, &mut report);
            if input.play_requested() {
                register.set(catalog::INITIAL_CONNECTING);
            } else {
                register.set_forced(catalog::IDLE, PLAYBACK_FLOOR);
            }
            return report;
        }

        // 2. Liveness regression. Sampled once; every later step reuses it.
        let live = self.liveness.sample(audio, now);
        if input.play_requested() && self.phase == PlaybackPhase::Playing && !live {
            self.retry_immediately = true;
            self.enter(PlaybackPhase::Reconnecting, &mut report);
        }

        // 3. Stop.
        if !input.play_requested() {
            let active = matches!(
                self.phase,
                PlaybackPhase::Connecting | PlaybackPhase::Playing | PlaybackPhase::Reconnecting
            );
            if active || live {
                audio.stop();
                report.command(AudioCommand::Stop);
                self.power(audio, false, &mut report);
                self.liveness.reset();
                self.applied_volume = None;
                self.watchdog_fired = false;
                self.enter(PlaybackPhase::Disconnected, &mut report);
            }
            register.set_forced(catalog::IDLE, PLAYBACK_FLOOR);
            return report;
        }

        if self.applied_volume != Some(input.volume) {
            audio.set_volume(input.volume);
            report.command(AudioCommand::SetVolume(input.volume));
            self.applied_volume = Some(input.volume);
        }

        // 4. Confirmed playback.
        if live {
            self.retry_immediately = false;
            self.watchdog_fired = false;
            self.last_good_liveness = Some(now);
            self.enter(PlaybackPhase::Playing, &mut report);
            let status = if audio.buffered_bytes() > 0 {
                catalog::PLAYING
            } else {
                catalog::BUFFERING
            };
            register.set_forced(status, PLAYBACK_FLOOR);
            return report;
        }

        // 5. Requested but not live: connect or retry.
        let status = if self.phase == PlaybackPhase::Reconnecting {
            catalog::RECONNECTING
        } else {
            catalog::INITIAL_CONNECTING
        };
        register.set(status);

        let due = match self.phase {
            PlaybackPhase::Idle | PlaybackPhase::Disconnected => true,
            PlaybackPhase::Reconnecting => self.retry_immediately || self.backoff_elapsed(now),
            PlaybackPhase::Connecting | PlaybackPhase::Playing => self.backoff_elapsed(now),
        };
        if due {
            self.attempt(now, stations, audio, &mut report);
        }

        // 6. Reconnect watchdog.
        if self.phase == PlaybackPhase::Reconnecting
            && !self.watchdog_fired
            && self.watchdog_expired(now)
        {
            self.watchdog_fired = true;
            register.set(catalog::STREAM_RECONNECT_TIMEOUT);
            report.restart = Some(FatalRestart::StreamReconnectTimeout);
        }

        report
    }

    fn attempt<A: AudioClient>(
        &mut self,
        now: TInstant,
        stations: &StationTable,
        audio: &mut A,
        report: &mut PlaybackReport,
    ) {
        audio.stop();
        report.command(AudioCommand::Stop);
        self.power(audio, true, report);
        self.liveness.reset();

        let url = stations.url(self.channel).unwrap_or_default();
        let accepted = audio.connect(url);
        report.command(AudioCommand::Connect {
            channel: self.channel,
            accepted,
        });
        self.last_attempt = Some(now);
        self.retry_immediately = false;

        if matches!(self.phase, PlaybackPhase::Idle | PlaybackPhase::Disconnected) {
            self.enter(PlaybackPhase::Connecting, report);
        }
    }

    fn power<A: AudioClient>(&mut self, audio: &mut A, enabled: bool, report: &mut PlaybackReport) {
        if self.amplifier_on == enabled {
            return;
        }
        self.amplifier_on = enabled;
        audio.set_power(enabled);
        report.command(if enabled {
            AudioCommand::PowerUp
        } else {
            AudioCommand::PowerDown
        });
    }

    fn backoff_elapsed(&self, now: TInstant) -> bool {
        self.last_attempt
            .is_none_or(|attempt| now >= attempt + self.reconnect_backoff)
    }

    fn watchdog_expired(&self, now: TInstant) -> bool {
        self.last_good_liveness
            .is_some_and(|good| now >= good + self.reconnect_ceiling)
    }

    fn enter(&mut self, next: PlaybackPhase, report: &mut PlaybackReport) {
        if self.phase == next {
            return;
        }
        let _ = report.transitions.push(PhaseTransition {
            from: self.phase,
            to: next,
        });
        self.phase = next;
    }
}
