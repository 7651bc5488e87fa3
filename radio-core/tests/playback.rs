use core::ops::Add;
use core::time::Duration;

use radio_core::config::{StationTable, TimingConfig};
use radio_core::control::FatalRestart;
use radio_core::playback::{
    AudioClient, AudioCommand, ConnectionStateMachine, InputSnapshot, LivenessPolicy,
    PlaybackPhase, PlaybackProgress, PlaybackReport, ReportedLiveness,
};
use radio_core::status::{Severity, StatusRegister, catalog};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
struct MockInstant(u64);

impl MockInstant {
    fn micros(value: u64) -> Self {
        Self(value)
    }

    fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

#[derive(Debug, Default)]
struct MockAudio {
    live: bool,
    buffered: usize,
    elapsed: u32,
    connects: Vec<String>,
    stops: usize,
    /// Keeps reporting live across stop and connect, like a wedged decoder.
    latched_live: bool,
}

impl AudioClient for MockAudio {
    fn connect(&mut self, url: &str) -> bool {
        self.connects.push(url.to_owned());
        true
    }

    fn stop(&mut self) {
        self.stops += 1;
        if !self.latched_live {
            self.live = false;
        }
    }

    fn set_volume(&mut self, _volume: u8) {}

    fn is_live(&self) -> bool {
        self.live
    }

    fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    fn elapsed_play_time(&self) -> u32 {
        self.elapsed
    }
}

const TICK: Duration = Duration::from_millis(50);

struct Rig<L = ReportedLiveness> {
    machine: ConnectionStateMachine<MockInstant, L>,
    register: StatusRegister,
    audio: MockAudio,
    stations: StationTable,
    now: MockInstant,
    timing: TimingConfig,
}

impl Rig<ReportedLiveness> {
    fn new() -> Self {
        Self::with_liveness(ReportedLiveness)
    }
}

impl<L: LivenessPolicy<MockInstant>> Rig<L> {
    fn with_liveness(liveness: L) -> Self {
        let timing = TimingConfig::default();
        let mut stations = StationTable::new();
        stations.set_active_count(3).unwrap();
        for index in 0..3 {
            stations
                .set_url(index, &format!("http://radio.example/{index}"))
                .unwrap();
        }
        Self {
            machine: ConnectionStateMachine::with_liveness(&timing, liveness),
            register: StatusRegister::new(),
            audio: MockAudio::default(),
            stations,
            now: MockInstant::micros(0),
            timing,
        }
    }

    fn tick(&mut self, channel: usize, volume: u8) -> PlaybackReport {
        let report = self.machine.tick(
            self.now,
            InputSnapshot::new(channel, volume),
            &self.stations,
            &mut self.audio,
            &mut self.register,
        );
        self.now = self.now + TICK;
        report
    }

    /// Connects channel 0 and confirms audible playback.
    fn start_playing(&mut self) {
        self.tick(0, 10);
        self.audio.live = true;
        self.audio.buffered = 4_096;
        self.tick(0, 10);
        assert_eq!(self.machine.phase(), PlaybackPhase::Playing);
    }
}

#[test]
fn channel_change_resets_connection_within_the_tick() {
    let mut rig = Rig::new();
    rig.start_playing();
    let stops = rig.audio.stops;

    let report = rig.tick(2, 10);

    assert_eq!(report.channel_changed, Some(2));
    assert_eq!(rig.audio.stops, stops + 1);
    assert_eq!(report.connects(), 0, "retune ends the tick");
    assert!(!rig.machine.connection_established());
    assert!(!rig.machine.reconnecting());
    assert_eq!(rig.machine.phase(), PlaybackPhase::Idle);
    assert_eq!(
        rig.register.active(),
        Some(catalog::INITIAL_CONNECTING),
        "the old station's status is replaced on the retune tick"
    );

    let next = rig.tick(2, 10);
    assert_eq!(next.connects(), 1);
    assert_eq!(rig.audio.connects.last().unwrap(), "http://radio.example/2");
}

#[test]
fn channel_change_while_reconnecting_leaves_reconnecting() {
    let mut rig = Rig::new();
    rig.start_playing();
    rig.audio.live = false;
    rig.tick(0, 10);
    assert!(rig.machine.reconnecting());

    rig.tick(1, 10);
    assert!(!rig.machine.reconnecting());
    assert!(!rig.machine.connection_established());
}

#[test]
fn stale_liveness_is_not_credited_to_new_channel() {
    let mut rig = Rig::new();
    rig.start_playing();
    rig.audio.live = true;

    let report = rig.tick(1, 10);

    assert_eq!(report.channel_changed, Some(1));
    assert_ne!(rig.machine.phase(), PlaybackPhase::Playing);
    assert_eq!(rig.machine.last_good_liveness(), Some(MockInstant::micros(50_000)));
}

#[test]
fn volume_to_zero_stops_and_keeps_network_error_visible() {
    let mut rig = Rig::new();
    rig.start_playing();
    assert_eq!(rig.register.active(), Some(catalog::PLAYING));
    rig.register.set(catalog::NETWORK_LOST);
    let stops = rig.audio.stops;

    let report = rig.tick(0, 0);

    assert_eq!(rig.audio.stops, stops + 1);
    assert_eq!(report.count(AudioCommand::Stop), 1);
    assert_eq!(report.count(AudioCommand::PowerDown), 1);
    assert_eq!(rig.register.slot(Severity::Info), Some(catalog::IDLE));
    assert_eq!(rig.register.slot(Severity::Success), None);
    assert_eq!(rig.register.active(), Some(catalog::NETWORK_LOST));

    rig.register.clear(Severity::Error);
    assert_eq!(rig.register.active(), Some(catalog::IDLE));
    assert!(!catalog::IDLE.is_blinking());
}

#[test]
fn volume_to_zero_from_reconnecting_stops_once() {
    let mut rig = Rig::new();
    rig.start_playing();
    rig.audio.live = false;
    rig.tick(0, 10);
    assert!(rig.machine.reconnecting());

    let report = rig.tick(0, 0);
    assert_eq!(report.count(AudioCommand::Stop), 1);
    assert_eq!(rig.machine.phase(), PlaybackPhase::Disconnected);
    assert_eq!(rig.register.active(), Some(catalog::IDLE));

    let quiet = rig.tick(0, 0);
    assert!(quiet.commands.is_empty());
}

#[test]
fn stall_reconnects_immediately_with_blinking_warning() {
    let mut rig = Rig::new();
    rig.start_playing();
    let connects = rig.audio.connects.len();
    rig.audio.live = false;

    let report = rig.tick(0, 10);

    assert!(rig.machine.reconnecting());
    assert_eq!(report.connects(), 1, "first reconnect attempt is immediate");
    assert_eq!(rig.audio.connects.len(), connects + 1);

    let active = rig.register.active().unwrap();
    assert_eq!(active, catalog::RECONNECTING);
    assert_eq!(active.level(), Severity::Warning);
    assert!(active.is_blinking());
}

#[test]
fn reconnect_attempts_respect_backoff() {
    let mut rig = Rig::new();
    rig.start_playing();
    rig.audio.live = false;

    let mut attempts = Vec::new();
    for _ in 0..(60_000 / 50) {
        let at = rig.now;
        let report = rig.tick(0, 10);
        if report.connects() > 0 {
            attempts.push(at);
        }
    }

    assert!(attempts.len() > 2);
    for pair in attempts.windows(2) {
        let gap = pair[1].as_millis() - pair[0].as_millis();
        assert!(gap >= 5_000, "attempts {gap} ms apart");
    }
}

#[test]
fn watchdog_fires_once_by_the_ceiling() {
    let mut rig = Rig::new();
    rig.start_playing();
    let last_good = rig.machine.last_good_liveness().unwrap();
    rig.audio.live = false;

    let deadline = last_good + rig.timing.reconnect_ceiling;
    let mut restarts = Vec::new();
    while rig.now <= deadline + Duration::from_secs(30) {
        let at = rig.now;
        if let Some(reason) = rig.tick(0, 10).restart {
            restarts.push((at, reason));
        }
    }

    assert_eq!(restarts.len(), 1);
    let (at, reason) = restarts[0];
    assert_eq!(reason, FatalRestart::StreamReconnectTimeout);
    assert!(at >= deadline);
    assert!(at <= deadline + TICK);
    assert_eq!(rig.register.active(), Some(catalog::STREAM_RECONNECT_TIMEOUT));
}

#[test]
fn recovery_before_ceiling_never_restarts() {
    let mut rig = Rig::new();
    rig.start_playing();
    rig.audio.live = false;

    for _ in 0..(60_000 / 50) {
        assert!(rig.tick(0, 10).restart.is_none());
    }
    rig.audio.live = true;
    rig.tick(0, 10);
    assert_eq!(rig.machine.phase(), PlaybackPhase::Playing);
    assert_eq!(rig.register.active(), Some(catalog::PLAYING));
}

#[test]
fn progress_policy_flags_stuck_play_time() {
    let mut rig = Rig::with_liveness(PlaybackProgress::<MockInstant>::new(Duration::from_secs(2)));
    rig.tick(0, 10);
    rig.audio.live = true;
    rig.audio.buffered = 1_024;
    rig.audio.elapsed = 1;
    rig.tick(0, 10);
    assert_eq!(rig.machine.phase(), PlaybackPhase::Connecting, "first sample is a baseline");
    rig.audio.elapsed = 2;
    rig.tick(0, 10);
    assert_eq!(rig.machine.phase(), PlaybackPhase::Playing);

    for _ in 0..(1_900 / 50) {
        rig.tick(0, 10);
    }
    assert_eq!(rig.machine.phase(), PlaybackPhase::Playing);

    let mut stalled = false;
    for _ in 0..4 {
        rig.tick(0, 10);
        stalled |= rig.machine.reconnecting();
    }
    assert!(stalled, "frozen play time must count as a stall");
}

#[test]
fn frozen_play_time_on_a_live_decoder_still_restarts_once() {
    let mut rig = Rig::with_liveness(PlaybackProgress::<MockInstant>::new(Duration::from_secs(2)));
    rig.audio.latched_live = true;
    rig.audio.live = true;
    rig.audio.buffered = 1_024;

    for elapsed in 0..10 {
        rig.audio.elapsed = elapsed;
        rig.tick(0, 10);
        if rig.machine.phase() == PlaybackPhase::Playing {
            break;
        }
    }
    assert_eq!(rig.machine.phase(), PlaybackPhase::Playing);

    let mut attempts = Vec::new();
    let mut restarts = Vec::new();
    let until = rig.now + rig.timing.reconnect_ceiling + Duration::from_secs(60);
    while rig.now < until {
        let at = rig.now;
        let report = rig.tick(0, 10);
        if report.connects() > 0 {
            attempts.push(at);
        }
        if let Some(reason) = report.restart {
            restarts.push((at, reason));
        }
    }

    assert_ne!(rig.machine.phase(), PlaybackPhase::Playing);
    let last_good = rig.machine.last_good_liveness().unwrap();
    let deadline = last_good + rig.timing.reconnect_ceiling;
    assert_eq!(restarts.len(), 1);
    let (at, reason) = restarts[0];
    assert_eq!(reason, FatalRestart::StreamReconnectTimeout);
    assert!(at >= deadline);
    assert!(at <= deadline + TICK);

    assert!(attempts.len() > 2);
    let backoff = u64::try_from(rig.timing.reconnect_backoff.as_millis()).unwrap();
    for pair in attempts.windows(2) {
        let gap = pair[1].as_millis() - pair[0].as_millis();
        assert!(gap >= backoff, "attempts {gap} ms apart");
    }
}
