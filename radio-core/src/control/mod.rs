//! Root control loop: boot sequence, network monitor, playback and rendering.
//!
//! The host calls [`ControlLoop::poll`] once per control tick with freshly
//! sampled inputs. Each poll runs to completion; nothing inside blocks. A
//! [`FatalRestart`] in the returned report asks the host to restart the
//! appliance, and the loop itself never restarts anything.

use core::{fmt, ops::Add, time::Duration};

use heapless::Vec;

use crate::config::{RadioConfig, RemoteConfig, StationTable};
use crate::indicator::{IndicatorDriver, IndicatorOutput, LAMP_TEST_SEQUENCE};
use crate::network::{NetworkLink, NetworkMonitor, NetworkReport};
use crate::playback::{
    AudioClient, AudioCommand, ConnectionStateMachine, InputSnapshot, LivenessPolicy,
    PlaybackReport, ReportedLiveness,
};
use crate::status::{StatusRegister, catalog};
use crate::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};

/// Unrecoverable conditions that end in a restart.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FatalRestart {
    /// Stream stayed down past the reconnect ceiling.
    StreamReconnectTimeout,
    /// Network association stayed down past the disconnect ceiling.
    NetworkLost,
    /// Network was never associated within the setup ceiling at boot.
    NetworkSetupTimeout,
}

impl fmt::Display for FatalRestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FatalRestart::StreamReconnectTimeout => "stream reconnect timeout",
            FatalRestart::NetworkLost => "network lost",
            FatalRestart::NetworkSetupTimeout => "network setup timeout",
        })
    }
}

/// Reasons a remote configuration fetch can fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigFetchError {
    Unreachable,
    HttpStatus(u16),
    Malformed,
}

impl fmt::Display for ConfigFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFetchError::Unreachable => f.write_str("server unreachable"),
            ConfigFetchError::HttpStatus(code) => write!(f, "http status {code}"),
            ConfigFetchError::Malformed => f.write_str("malformed document"),
        }
    }
}

/// Remote configuration collaborator.
pub trait ConfigSource {
    /// Fetches a snapshot. `Ok(None)` means remote configuration is disabled.
    fn fetch(&mut self) -> Result<Option<RemoteConfig>, ConfigFetchError>;
}

/// Config source for appliances without remote configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoRemoteConfig;

impl ConfigSource for NoRemoteConfig {
    fn fetch(&mut self) -> Result<Option<RemoteConfig>, ConfigFetchError> {
        Ok(None)
    }
}

/// Boot progress. Playback and the network monitor only run once `Running`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootPhase<TInstant> {
    LampTest { step: usize, until: TInstant },
    AwaitingNetwork { since: TInstant },
    ConfigNotice { until: TInstant },
    Running,
}

/// Maximum number of events reported from one poll.
pub const MAX_POLL_EVENTS: usize = 16;

/// What a poll did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PollReport {
    pub events: Vec<TelemetryEventKind, MAX_POLL_EVENTS>,
    pub restart: Option<FatalRestart>,
}

/// Owns the register, the playback and network state, and the collaborators.
pub struct ControlLoop<TInstant, A, N, C = NoRemoteConfig, L = ReportedLiveness>
where
    TInstant: Copy,
{
    config: RadioConfig,
    register: StatusRegister,
    playback: ConnectionStateMachine<TInstant, L>,
    network: NetworkMonitor<TInstant>,
    boot: BootPhase<TInstant>,
    lamp_shown: Option<usize>,
    setup_restart_signalled: bool,
    last_config_fetch: Option<TInstant>,
    /// The retrieval status was shown last tick; fetch on this one.
    background_fetch_pending: bool,
    telemetry: TelemetryRecorder<TInstant>,
    audio: A,
    link: N,
    source: C,
}

impl<TInstant, A, N, C> ControlLoop<TInstant, A, N, C, ReportedLiveness>
where
    TInstant: TelemetryInstant + Ord + Add<Duration, Output = TInstant>,
    A: AudioClient,
    N: NetworkLink,
    C: ConfigSource,
{
    /// Creates a loop that starts its boot sequence at `now`.
    #[must_use]
    pub fn new(config: RadioConfig, audio: A, link: N, source: C, now: TInstant) -> Self {
        Self::with_liveness(config, audio, link, source, ReportedLiveness, now)
    }
}

impl<TInstant, A, N, C, L> ControlLoop<TInstant, A, N, C, L>
where
    TInstant: TelemetryInstant + Ord + Add<Duration, Output = TInstant>,
    A: AudioClient,
    N: NetworkLink,
    C: ConfigSource,
    L: LivenessPolicy<TInstant>,
{
    #[must_use]
    pub fn with_liveness(
        config: RadioConfig,
        audio: A,
        link: N,
        source: C,
        liveness: L,
        now: TInstant,
    ) -> Self {
        let playback = ConnectionStateMachine::with_liveness(&config.timing, liveness);
        let network = NetworkMonitor::new(&config.timing, now);
        let mut register = StatusRegister::new();
        register.set(catalog::INITIALIZING);
        Self {
            boot: BootPhase::LampTest {
                step: 0,
                until: now + config.timing.lamp_test_step,
            },
            config,
            register,
            playback,
            network,
            lamp_shown: None,
            setup_restart_signalled: false,
            last_config_fetch: None,
            background_fetch_pending: false,
            telemetry: TelemetryRecorder::new(),
            audio,
            link,
            source,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Station edits take effect on the next tick.
    pub fn stations_mut(&mut self) -> &mut StationTable {
        &mut self.config.stations
    }

    #[must_use]
    pub const fn register(&self) -> &StatusRegister {
        &self.register
    }

    #[must_use]
    pub const fn playback(&self) -> &ConnectionStateMachine<TInstant, L> {
        &self.playback
    }

    #[must_use]
    pub const fn network(&self) -> &NetworkMonitor<TInstant> {
        &self.network
    }

    #[must_use]
    pub const fn boot_phase(&self) -> BootPhase<TInstant> {
        self.boot
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.boot == BootPhase::Running
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<TInstant> {
        &self.telemetry
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn link(&self) -> &N {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut N {
        &mut self.link
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut C {
        &mut self.source
    }

    /// Runs one control tick and renders the resulting status.
    pub fn poll<O: IndicatorOutput>(
        &mut self,
        now: TInstant,
        input: InputSnapshot,
        driver: &mut IndicatorDriver<'_>,
        output: &mut O,
    ) -> PollReport {
        let mut report = PollReport::default();
        let before = self.register.active();

        match self.boot {
            BootPhase::LampTest { step, until } => {
                self.lamp_test(now, step, until, driver, output, &mut report);
                if matches!(self.boot, BootPhase::LampTest { .. }) {
                    return report;
                }
            }
            BootPhase::AwaitingNetwork { since } => self.await_network(now, since, &mut report),
            BootPhase::ConfigNotice { until } => {
                if now >= until {
                    self.register.clear_code(catalog::CONFIG_FETCH_FAILED);
                    self.boot = BootPhase::Running;
                }
            }
            BootPhase::Running => self.run(now, input, &mut report),
        }

        let after = self.register.active();
        if before != after {
            self.emit(
                TelemetryEventKind::StatusChanged {
                    from: before,
                    to: after,
                },
                now,
                &mut report,
            );
        }
        driver.render(after, output);
        report
    }

    fn lamp_test<O: IndicatorOutput>(
        &mut self,
        now: TInstant,
        step: usize,
        until: TInstant,
        driver: &mut IndicatorDriver<'_>,
        output: &mut O,
        report: &mut PollReport,
    ) {
        let (step, until) = if now >= until {
            (step + 1, until + self.config.timing.lamp_test_step)
        } else {
            (step, until)
        };

        match LAMP_TEST_SEQUENCE.get(step) {
            Some(level) => {
                if self.lamp_shown != Some(step) {
                    driver.show_level(Some(*level), output);
                    self.lamp_shown = Some(step);
                }
                self.boot = BootPhase::LampTest { step, until };
            }
            None => {
                driver.show_level(None, output);
                self.emit(TelemetryEventKind::LampTestComplete, now, report);
                self.boot = BootPhase::AwaitingNetwork { since: now };
                self.await_network(now, now, report);
            }
        }
    }

    fn await_network(&mut self, now: TInstant, since: TInstant, report: &mut PollReport) {
        if !self.link.is_connected() {
            self.register.set(catalog::NETWORK_SETUP);
            if !self.setup_restart_signalled && now >= since + self.config.timing.network_setup_ceiling
            {
                self.setup_restart_signalled = true;
                self.restart(FatalRestart::NetworkSetupTimeout, now, report);
            }
            return;
        }

        self.register.clear_code(catalog::NETWORK_SETUP);
        self.register.clear_code(catalog::INITIALIZING);
        self.emit(TelemetryEventKind::NetworkSetupComplete, now, report);
        self.network = NetworkMonitor::new(&self.config.timing, now);

        if self.refresh_config(now, report) {
            self.boot = BootPhase::Running;
        } else {
            self.register.set(catalog::CONFIG_FETCH_FAILED);
            self.boot = BootPhase::ConfigNotice {
                until: now + self.config.timing.config_notice,
            };
        }
    }

    fn run(&mut self, now: TInstant, input: InputSnapshot, report: &mut PollReport) {
        let network = self.network.poll(now, &mut self.link, &mut self.register);
        self.note_network(network, now, report);

        let playback = self.playback.tick(
            now,
            input,
            &self.config.stations,
            &mut self.audio,
            &mut self.register,
        );
        self.note_playback(&playback, now, report);

        // The fetch blocks, so its status is rendered one tick ahead of it.
        if self.background_fetch_pending {
            self.background_fetch_pending = false;
            if input.play_requested() {
                self.register.clear_code(catalog::BACKGROUND_CONFIG_RETRIEVAL);
            } else {
                self.refresh_config(now, report);
            }
        } else if !input.play_requested() && self.background_fetch_due(now) {
            self.register.set(catalog::BACKGROUND_CONFIG_RETRIEVAL);
            self.background_fetch_pending = true;
        }
    }

    fn background_fetch_due(&self, now: TInstant) -> bool {
        let Some(interval) = self.config.timing.background_config_interval else {
            return false;
        };
        self.last_config_fetch
            .is_none_or(|last| now >= last + interval)
    }

    /// Fetches and applies remote configuration. Returns `false` on a failed
    /// fetch; a rejected snapshot keeps the stored stations and counts as
    /// fetched.
    fn refresh_config(&mut self, now: TInstant, report: &mut PollReport) -> bool {
        self.last_config_fetch = Some(now);
        match self.source.fetch() {
            Ok(Some(remote)) => {
                match self.config.apply_remote(&remote) {
                    Ok(()) => self.emit(TelemetryEventKind::ConfigFetched, now, report),
                    Err(error) => self.emit(TelemetryEventKind::ConfigRejected(error), now, report),
                }
                true
            }
            Ok(None) => {
                self.emit(TelemetryEventKind::ConfigUnchanged, now, report);
                true
            }
            Err(error) => {
                self.emit(TelemetryEventKind::ConfigFetchFailed(error), now, report);
                false
            }
        }
    }

    fn note_network(&mut self, network: NetworkReport, now: TInstant, report: &mut PollReport) {
        if network.lost {
            self.emit(TelemetryEventKind::NetworkLost, now, report);
        }
        if network.restored {
            self.emit(TelemetryEventKind::NetworkRestored, now, report);
        }
        if let Some(reason) = network.restart {
            self.restart(reason, now, report);
        }
    }

    fn note_playback(&mut self, playback: &PlaybackReport, now: TInstant, report: &mut PollReport) {
        if let Some(channel) = playback.channel_changed {
            self.emit(TelemetryEventKind::ChannelChanged(channel), now, report);
        }
        for command in &playback.commands {
            let event = match *command {
                AudioCommand::Stop => TelemetryEventKind::StreamStop,
                AudioCommand::PowerUp => TelemetryEventKind::AmplifierPower(true),
                AudioCommand::PowerDown => TelemetryEventKind::AmplifierPower(false),
                AudioCommand::Connect { channel, accepted } => {
                    TelemetryEventKind::StreamConnect { channel, accepted }
                }
                AudioCommand::SetVolume(volume) => TelemetryEventKind::VolumeApplied(volume),
            };
            self.emit(event, now, report);
        }
        for transition in &playback.transitions {
            self.emit(TelemetryEventKind::PhaseChanged(*transition), now, report);
        }
        if let Some(reason) = playback.restart {
            self.restart(reason, now, report);
        }
    }

    fn restart(&mut self, reason: FatalRestart, now: TInstant, report: &mut PollReport) {
        self.emit(TelemetryEventKind::FatalRestart(reason), now, report);
        if report.restart.is_none() {
            report.restart = Some(reason);
        }
    }

    fn emit(&mut self, event: TelemetryEventKind, now: TInstant, report: &mut PollReport) {
        self.telemetry.record(event, now);
        // The ring keeps everything; the per-poll list may drop overflow.
        let _ = report.events.push(event);
    }
}
