use core::ops::Add;
use core::time::Duration;

use radio_core::config::{RadioConfig, RemoteConfig};
use radio_core::control::{
    BootPhase, ConfigFetchError, ConfigSource, ControlLoop, FatalRestart, PollReport,
};
use radio_core::indicator::{IndicatorDriver, IndicatorOutput, IndicatorState, LedChannel};
use radio_core::network::NetworkLink;
use radio_core::playback::{AudioClient, InputSnapshot, PlaybackPhase};
use radio_core::status::{Severity, catalog};
use radio_core::telemetry::{TelemetryEventKind, TelemetryInstant};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
struct MockInstant(u64);

impl MockInstant {
    fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Debug, Default)]
struct MockAudio {
    live: bool,
    buffered: usize,
    connects: usize,
    stops: usize,
}

impl AudioClient for MockAudio {
    fn connect(&mut self, _url: &str) -> bool {
        self.connects += 1;
        true
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.live = false;
    }

    fn set_volume(&mut self, _volume: u8) {}

    fn is_live(&self) -> bool {
        self.live
    }

    fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    fn elapsed_play_time(&self) -> u32 {
        0
    }
}

#[derive(Debug, Default)]
struct MockLink {
    up: bool,
    reconnects: usize,
}

impl NetworkLink for MockLink {
    fn is_connected(&self) -> bool {
        self.up
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
    }
}

#[derive(Debug)]
struct MockSource {
    response: Result<Option<RemoteConfig>, ConfigFetchError>,
    fetches: usize,
}

impl ConfigSource for MockSource {
    fn fetch(&mut self) -> Result<Option<RemoteConfig>, ConfigFetchError> {
        self.fetches += 1;
        self.response.clone()
    }
}

#[derive(Debug, Default)]
struct MockLeds {
    levels: [bool; 3],
}

impl MockLeds {
    fn lit(&self) -> [bool; 3] {
        self.levels
    }
}

impl IndicatorOutput for MockLeds {
    fn write(&mut self, channel: LedChannel, lit: bool) {
        let index = match channel {
            LedChannel::Red => 0,
            LedChannel::Green => 1,
            LedChannel::Blue => 2,
        };
        self.levels[index] = lit;
    }
}

const TICK: Duration = Duration::from_millis(50);
const RED: [bool; 3] = [true, false, false];
const YELLOW: [bool; 3] = [true, true, false];
const GREEN: [bool; 3] = [false, true, false];
const BLUE: [bool; 3] = [false, false, true];

type Radio = ControlLoop<MockInstant, MockAudio, MockLink, MockSource>;

struct Rig {
    radio: Radio,
    state: &'static IndicatorState,
    driver: IndicatorDriver<'static>,
    leds: MockLeds,
    now: MockInstant,
    input: InputSnapshot,
}

impl Rig {
    fn new(link_up: bool, response: Result<Option<RemoteConfig>, ConfigFetchError>) -> Self {
        let mut config = RadioConfig::default();
        config.stations.set_active_count(2).unwrap();
        config.stations.set_url(0, "http://radio.example/0").unwrap();
        config.stations.set_url(1, "http://radio.example/1").unwrap();

        let state: &'static IndicatorState = Box::leak(Box::new(IndicatorState::new()));
        let driver = IndicatorDriver::new(state, config.palette);
        let radio = ControlLoop::new(
            config,
            MockAudio::default(),
            MockLink {
                up: link_up,
                reconnects: 0,
            },
            MockSource {
                response,
                fetches: 0,
            },
            MockInstant::millis(0),
        );
        Self {
            radio,
            state,
            driver,
            leds: MockLeds::default(),
            now: MockInstant::millis(0),
            input: InputSnapshot::default(),
        }
    }

    fn poll(&mut self) -> PollReport {
        let report = self
            .radio
            .poll(self.now, self.input, &mut self.driver, &mut self.leds);
        self.now = self.now + TICK;
        report
    }

    /// Polls every tick for `span`, collecting every report.
    fn run_for(&mut self, span: Duration) -> Vec<PollReport> {
        let until = self.now + span;
        let mut reports = Vec::new();
        while self.now < until {
            reports.push(self.poll());
        }
        reports
    }

    fn boot(&mut self) {
        self.run_for(Duration::from_secs(1) + TICK);
        assert!(self.radio.is_running(), "boot should finish: {:?}", self.radio.boot_phase());
    }
}

fn restarts(reports: &[PollReport]) -> Vec<FatalRestart> {
    reports.iter().filter_map(|report| report.restart).collect()
}

fn saw(reports: &[PollReport], wanted: TelemetryEventKind) -> bool {
    reports
        .iter()
        .any(|report| report.events.iter().any(|event| *event == wanted))
}

#[test]
fn lamp_test_cycles_levels_before_network_setup() {
    let mut rig = Rig::new(false, Ok(None));

    let mut seen = Vec::new();
    for _ in 0..25 {
        rig.poll();
        if seen.last() != Some(&rig.leds.lit()) {
            seen.push(rig.leds.lit());
        }
    }

    assert_eq!(seen[..4], [RED, YELLOW, GREEN, BLUE]);
    assert_eq!(
        rig.radio.register().active(),
        Some(catalog::NETWORK_SETUP),
        "network setup takes over after the lamp test"
    );
    assert!(rig.state.is_armed());
}

#[test]
fn network_setup_timeout_requests_one_restart() {
    let mut rig = Rig::new(false, Ok(None));
    let reports = rig.run_for(Duration::from_secs(15 * 60 + 30));

    assert_eq!(restarts(&reports), [FatalRestart::NetworkSetupTimeout]);
    assert!(matches!(
        rig.radio.boot_phase(),
        BootPhase::AwaitingNetwork { .. }
    ));
}

#[test]
fn failed_config_fetch_shows_notice_then_runs() {
    let mut rig = Rig::new(true, Err(ConfigFetchError::HttpStatus(503)));
    let reports = rig.run_for(Duration::from_secs(1) + TICK);

    assert!(saw(
        &reports,
        TelemetryEventKind::ConfigFetchFailed(ConfigFetchError::HttpStatus(503))
    ));
    assert_eq!(rig.radio.register().active(), Some(catalog::CONFIG_FETCH_FAILED));
    assert_eq!(rig.leds.lit(), YELLOW);

    rig.run_for(Duration::from_secs(5));
    assert!(!rig.radio.is_running());

    rig.run_for(Duration::from_secs(1) + TICK);
    assert!(rig.radio.is_running());
    assert_eq!(rig.radio.register().slot(Severity::Warning), None);
}

#[test]
fn remote_stations_apply_at_boot() {
    let mut remote = RemoteConfig::default();
    for index in 0..3 {
        remote
            .push_station(&format!("http://remote.example/{index}"))
            .unwrap();
    }
    remote.station_count = Some(3);
    let mut rig = Rig::new(true, Ok(Some(remote)));

    rig.boot();

    assert_eq!(rig.radio.config().stations.active_count(), 3);
    assert_eq!(
        rig.radio.config().stations.url(2),
        Some("http://remote.example/2")
    );
}

#[test]
fn playback_runs_while_network_is_down() {
    let mut rig = Rig::new(true, Ok(None));
    rig.boot();

    rig.input = InputSnapshot::new(0, 8);
    rig.poll();
    rig.radio.audio_mut().live = true;
    rig.radio.audio_mut().buffered = 512;
    rig.poll();
    assert_eq!(rig.radio.playback().phase(), PlaybackPhase::Playing);
    assert_eq!(rig.leds.lit(), GREEN);

    rig.radio.link_mut().up = false;
    let reports = rig.run_for(Duration::from_secs(2));
    assert!(saw(&reports, TelemetryEventKind::NetworkLost));
    assert_eq!(rig.radio.register().active(), Some(catalog::NETWORK_LOST));
    assert_eq!(rig.leds.lit(), RED);
    assert!(rig.radio.link().reconnects >= 1);

    rig.input = InputSnapshot::new(1, 8);
    let reports = rig.run_for(TICK);
    assert!(saw(&reports, TelemetryEventKind::ChannelChanged(1)));
    assert_eq!(rig.radio.playback().channel(), 1);

    rig.radio.link_mut().up = true;
    let reports = rig.run_for(Duration::from_secs(2));
    assert!(saw(&reports, TelemetryEventKind::NetworkRestored));
    assert_ne!(rig.radio.register().active_level(), Some(Severity::Error));
}

#[test]
fn long_network_outage_requests_restart() {
    let mut rig = Rig::new(true, Ok(None));
    rig.boot();
    rig.radio.link_mut().up = false;

    let reports = rig.run_for(Duration::from_secs(5 * 60 + 5));
    assert_eq!(restarts(&reports), [FatalRestart::NetworkLost]);
}

#[test]
fn idle_radio_refreshes_config_in_background() {
    let mut remote = RemoteConfig::default();
    remote.push_station("http://remote.example/0").unwrap();
    remote.background_interval = Some(Duration::from_secs(60));
    let mut rig = Rig::new(true, Ok(Some(remote)));
    rig.boot();
    assert_eq!(rig.radio.source_mut().fetches, 1);

    rig.run_for(Duration::from_secs(61));
    assert_eq!(rig.radio.source_mut().fetches, 2);

    rig.input = InputSnapshot::new(0, 5);
    rig.run_for(Duration::from_secs(120));
    assert_eq!(
        rig.radio.source_mut().fetches,
        2,
        "no background fetch while playing"
    );
}

#[test]
fn status_changes_are_recorded_in_telemetry() {
    let mut rig = Rig::new(true, Ok(None));
    rig.boot();
    rig.input = InputSnapshot::new(0, 5);
    rig.poll();

    let latest_status = rig
        .radio
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEventKind::StatusChanged { to, .. } => Some(to),
            _ => None,
        })
        .last();
    assert_eq!(latest_status, Some(Some(catalog::INITIAL_CONNECTING)));
    assert_eq!(rig.radio.audio().connects, 1);
    assert_eq!(rig.leds.lit(), YELLOW);
}

#[test]
fn background_retrieval_status_is_shown_before_the_fetch() {
    let mut remote = RemoteConfig::default();
    remote.push_station("http://remote.example/0").unwrap();
    remote.background_interval = Some(Duration::from_secs(60));
    let mut rig = Rig::new(true, Ok(Some(remote)));
    rig.boot();

    let mut polls = 0;
    while rig.radio.register().active() != Some(catalog::BACKGROUND_CONFIG_RETRIEVAL) {
        rig.poll();
        polls += 1;
        assert!(polls < 2_000, "retrieval status never shown");
    }
    assert_eq!(rig.radio.source().fetches, 1, "status goes up before the fetch");

    rig.poll();
    assert_eq!(rig.radio.source().fetches, 2);
    assert_eq!(rig.radio.register().active(), Some(catalog::IDLE));
}
