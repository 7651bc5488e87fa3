use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::time::Duration;

use radio_core::config::{ConfigError, RadioConfig, RemoteConfig};
use radio_core::console::{COMMANDS, ConsoleCommand, ConsoleParser};
use radio_core::control::{BootPhase, ConfigFetchError, ConfigSource, ControlLoop};
use radio_core::indicator::{
    BlinkToggle, IndicatorDriver, IndicatorOutput, IndicatorState, LedChannel,
};
use radio_core::network::NetworkLink;
use radio_core::playback::{AudioClient, InputSnapshot};
use radio_core::status::{Severity, StatusRegister};
use radio_core::telemetry::TelemetryInstant;

const RECENT_EVENTS: usize = 8;
const DEFAULT_BUFFER_BYTES: usize = 4_096;

pub const DEFAULT_STATIONS: [&str; 2] = [
    "http://stream.example.net/jazz",
    "http://stream.example.net/news",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Playback,
    Outage,
    ConfigFailure,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-interactive.log",
            TranscriptProfile::Playback => "transcripts/emulator-playback.log",
            TranscriptProfile::Outage => "transcripts/emulator-outage.log",
            TranscriptProfile::ConfigFailure => "transcripts/emulator-config-failure.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Radio emulator interactive transcript",
            TranscriptProfile::Playback => "Radio emulator playback transcript",
            TranscriptProfile::Outage => "Radio emulator outage and restart transcript",
            TranscriptProfile::ConfigFailure => "Radio emulator config failure transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("playback") {
            Ok(Self::Playback)
        } else if tag.eq_ignore_ascii_case("outage") {
            Ok(Self::Outage)
        } else if tag.eq_ignore_ascii_case("config-failure") {
            Ok(Self::ConfigFailure)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Simulated monotonic clock, counted from power-on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub const POWER_ON: Self = Self(Duration::ZERO);
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms", self.0.as_millis())
    }
}

/// Decoder stand-in. A connected stream is live while `stream_up` holds.
#[derive(Debug)]
pub struct SimAudio {
    stream_up: bool,
    url: Option<String>,
    buffered: usize,
    elapsed_ms: u32,
    volume: Option<u8>,
    powered: bool,
    connects: usize,
}

impl SimAudio {
    /// Fresh decoder after a reboot; the world outside keeps its state.
    fn carry_over(&self) -> Self {
        Self {
            stream_up: self.stream_up,
            buffered: self.buffered,
            ..Self::default()
        }
    }

    fn advance(&mut self, step: Duration) {
        if self.is_live() {
            let step = u32::try_from(step.as_millis()).unwrap_or(u32::MAX);
            self.elapsed_ms = self.elapsed_ms.saturating_add(step);
        }
    }
}

impl Default for SimAudio {
    fn default() -> Self {
        Self {
            stream_up: true,
            url: None,
            buffered: DEFAULT_BUFFER_BYTES,
            elapsed_ms: 0,
            volume: None,
            powered: false,
            connects: 0,
        }
    }
}

impl AudioClient for SimAudio {
    fn connect(&mut self, url: &str) -> bool {
        self.connects += 1;
        self.url = Some(url.to_owned());
        true
    }

    fn stop(&mut self) {
        self.url = None;
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = Some(volume);
    }

    fn is_live(&self) -> bool {
        self.stream_up && self.url.is_some()
    }

    fn buffered_bytes(&self) -> usize {
        if self.is_live() { self.buffered } else { 0 }
    }

    fn elapsed_play_time(&self) -> u32 {
        self.elapsed_ms
    }

    fn set_power(&mut self, on: bool) {
        self.powered = on;
    }
}

/// Network association stand-in. Reconnect requests are counted only.
#[derive(Debug)]
pub struct SimNetwork {
    up: bool,
    reconnects: usize,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self {
            up: true,
            reconnects: 0,
        }
    }
}

impl NetworkLink for SimNetwork {
    fn is_connected(&self) -> bool {
        self.up
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
    }
}

#[derive(Debug)]
pub struct SimConfigSource {
    reachable: bool,
    snapshot: Option<RemoteConfig>,
    fetches: usize,
}

impl SimConfigSource {
    fn carry_over(&self) -> Self {
        Self {
            reachable: self.reachable,
            snapshot: self.snapshot.clone(),
            fetches: 0,
        }
    }
}

impl Default for SimConfigSource {
    fn default() -> Self {
        Self {
            reachable: true,
            snapshot: None,
            fetches: 0,
        }
    }
}

impl ConfigSource for SimConfigSource {
    fn fetch(&mut self) -> Result<Option<RemoteConfig>, ConfigFetchError> {
        self.fetches += 1;
        if self.reachable {
            Ok(self.snapshot.clone())
        } else {
            Err(ConfigFetchError::Unreachable)
        }
    }
}

/// Three-channel LED bank, remembered as plain booleans.
#[derive(Debug, Default)]
pub struct SimLeds {
    lit: [bool; 3],
}

impl SimLeds {
    pub fn color(&self) -> &'static str {
        match self.lit {
            [false, false, false] => "off",
            [true, false, false] => "red",
            [false, true, false] => "green",
            [false, false, true] => "blue",
            [true, true, false] => "yellow",
            _ => "mixed",
        }
    }
}

impl IndicatorOutput for SimLeds {
    fn write(&mut self, channel: LedChannel, lit: bool) {
        let index = match channel {
            LedChannel::Red => 0,
            LedChannel::Green => 1,
            LedChannel::Blue => 2,
        };
        self.lit[index] = lit;
    }
}

type Radio = ControlLoop<SimInstant, SimAudio, SimNetwork, SimConfigSource>;

pub struct Session<'a> {
    radio: Radio,
    state: &'a IndicatorState,
    driver: IndicatorDriver<'a>,
    blink: BlinkToggle,
    leds: SimLeds,
    now: SimInstant,
    next_blink: SimInstant,
    channel: usize,
    volume: u8,
    restarts: usize,
    transcript: Option<TranscriptLogger>,
}

impl<'a> Session<'a> {
    pub fn new(profile: TranscriptProfile, state: &'a IndicatorState) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        Self::build(state, Some(transcript))
    }

    /// Session that keeps no transcript file.
    pub fn detached(state: &'a IndicatorState) -> io::Result<Self> {
        Self::build(state, None)
    }

    fn build(state: &'a IndicatorState, transcript: Option<TranscriptLogger>) -> io::Result<Self> {
        let config = default_config().map_err(|err| io::Error::other(err.to_string()))?;
        let driver = IndicatorDriver::new(state, config.palette);
        let radio = ControlLoop::new(
            config,
            SimAudio::default(),
            SimNetwork::default(),
            SimConfigSource::default(),
            SimInstant::POWER_ON,
        );
        Ok(Self {
            radio,
            state,
            driver,
            blink: BlinkToggle::new(),
            leds: SimLeds::default(),
            now: SimInstant::POWER_ON,
            next_blink: SimInstant::POWER_ON,
            channel: 0,
            volume: 0,
            restarts: 0,
            transcript,
        })
    }

    /// Snapshot the simulated config server hands out from now on.
    pub fn serve_remote(&mut self, remote: RemoteConfig) {
        self.radio.source_mut().snapshot = Some(remote);
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.log(TranscriptRole::Host, trimmed)?;
        let lines = match ConsoleParser::parse(trimmed) {
            Ok(command) => self.apply(command),
            Err(err) => vec![format!("ERR {err}")],
        };
        for line in &lines {
            self.log(TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn apply(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        match command {
            ConsoleCommand::Volume(raw) => {
                let volume = self.radio.config().volume.clamp(raw);
                self.volume = volume;
                if volume == raw {
                    vec![format!("OK volume {volume}")]
                } else {
                    vec![format!("OK volume {volume} (clamped from {raw})")]
                }
            }
            ConsoleCommand::Channel(channel) => {
                self.channel = channel;
                vec![format!("OK channel {channel}")]
            }
            ConsoleCommand::Wifi(link) => {
                self.radio.link_mut().up = link.is_up();
                vec![format!("OK wifi {link}")]
            }
            ConsoleCommand::Stream(link) => {
                self.radio.audio_mut().stream_up = link.is_up();
                vec![format!("OK stream {link}")]
            }
            ConsoleCommand::Config(link) => {
                self.radio.source_mut().reachable = link.is_up();
                vec![format!("OK config {link}")]
            }
            ConsoleCommand::Buffer(bytes) => {
                self.radio.audio_mut().buffered = bytes;
                vec![format!("OK buffer {bytes}")]
            }
            ConsoleCommand::Advance(span) => self.advance(span),
            ConsoleCommand::Station { index, url } => {
                match self.radio.stations_mut().set_url(index, url) {
                    Ok(()) => vec![format!("OK station {index} {url}")],
                    Err(err) => vec![format!("ERR {err}")],
                }
            }
            ConsoleCommand::Stations(count) => {
                match self.radio.stations_mut().set_active_count(count) {
                    Ok(()) => vec![format!("OK stations {count}")],
                    Err(err) => vec![format!("ERR {err}")],
                }
            }
            ConsoleCommand::Status => self.status_lines(),
            ConsoleCommand::Help(topic) => help_lines(topic),
        }
    }

    /// Steps the control loop one tick at a time and narrates every event.
    fn advance(&mut self, span: Duration) -> Vec<String> {
        let until = self.now + span;
        let tick = self.radio.config().timing.control_tick;
        let mut lines = Vec::new();

        while self.now < until {
            let input = InputSnapshot::new(self.channel, self.volume);
            let report = self
                .radio
                .poll(self.now, input, &mut self.driver, &mut self.leds);
            for event in &report.events {
                lines.push(format!("{} {event}", self.now));
            }
            self.radio.audio_mut().advance(tick);
            self.drive_blink();

            if report.restart.is_some() {
                self.reboot();
                lines.push(format!("{} rebooted (#{})", self.now, self.restarts));
            }
            self.now = self.now + tick;
        }

        lines.push(format!("OK {} led {}", self.now, self.led_label()));
        lines
    }

    fn drive_blink(&mut self) {
        let period = self.radio.config().timing.blink_period;
        while self.next_blink <= self.now {
            self.blink.on_tick(self.state, &mut self.leds);
            self.next_blink = self.next_blink + period;
        }
    }

    /// Simulated power cycle. Stored configuration and the outside world
    /// survive; everything the loop owns starts over.
    fn reboot(&mut self) {
        let config = self.radio.config().clone();
        let audio = self.radio.audio().carry_over();
        let link = SimNetwork {
            up: self.radio.link().up,
            reconnects: 0,
        };
        let source = self.radio.source_mut().carry_over();

        self.driver = IndicatorDriver::new(self.state, config.palette);
        self.radio = ControlLoop::new(config, audio, link, source, self.now);
        self.blink = BlinkToggle::new();
        self.restarts += 1;
    }

    fn led_label(&self) -> String {
        if self.state.is_armed() {
            format!("{} (blinking)", self.leds.color())
        } else {
            self.leds.color().to_string()
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let register = self.radio.register();
        let active = register
            .active()
            .map_or_else(|| "off".to_string(), |code| code.to_string());
        let playback = self.radio.playback();
        let link = self.radio.link();
        let audio = self.radio.audio();

        let source = self.radio.source();
        let mut lines = vec![
            format!(
                "time {} boot {}",
                self.now,
                boot_label(self.radio.boot_phase())
            ),
            format!("status {active} led {}", self.led_label()),
            format!("slots {}", slots_line(register)),
            format!(
                "playback {} channel {} volume {} selector {} stations {}",
                playback.phase(),
                playback.channel(),
                self.volume,
                self.channel,
                self.radio.config().stations.active_count(),
            ),
            format!(
                "stream {} connects {} amplifier {} decoder-volume {} buffered {}",
                audio.url.as_deref().unwrap_or("-"),
                audio.connects,
                if audio.powered { "on" } else { "off" },
                audio
                    .volume
                    .map_or_else(|| "-".to_string(), |volume| volume.to_string()),
                audio.buffered_bytes(),
            ),
            format!(
                "network {} reconnects {} restarts {}",
                if link.up { "up" } else { "down" },
                link.reconnects,
                self.restarts,
            ),
            format!(
                "config-server {} fetches {}",
                if source.reachable { "up" } else { "down" },
                source.fetches,
            ),
            "recent events:".to_string(),
        ];

        let telemetry = self.radio.telemetry();
        let skip = telemetry.len().saturating_sub(RECENT_EVENTS);
        for record in telemetry.oldest_first().skip(skip) {
            lines.push(format!(
                "  #{} {} {}",
                record.id, record.timestamp, record.event
            ));
        }
        lines
    }

    fn log(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(self.now, role, line),
            None => Ok(()),
        }
    }
}

fn default_config() -> Result<RadioConfig, ConfigError> {
    let mut config = RadioConfig::default();
    for (index, url) in DEFAULT_STATIONS.into_iter().enumerate() {
        config.stations.set_url(index, url)?;
    }
    config.stations.set_active_count(DEFAULT_STATIONS.len())?;
    Ok(config)
}

fn boot_label(phase: BootPhase<SimInstant>) -> String {
    match phase {
        BootPhase::LampTest { step, .. } => format!("lamp-test step {}", step + 1),
        BootPhase::AwaitingNetwork { since } => format!("awaiting-network since {since}"),
        BootPhase::ConfigNotice { until } => format!("config-notice until {until}"),
        BootPhase::Running => "running".to_string(),
    }
}

fn slots_line(register: &StatusRegister) -> String {
    Severity::ALL
        .iter()
        .map(|level| match register.slot(*level) {
            Some(code) => format!("{level}={code}"),
            None => format!("{level}=-"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match COMMANDS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(target))
        {
            Some((_, usage, summary)) => vec![format!("{usage}  - {summary}")],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            for (_, usage, summary) in COMMANDS {
                lines.push(format!("  {usage:<24} {summary}"));
            }
            lines.push(format!("  {:<24} {}", "exit | quit", "leave the emulator"));
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

fn topic_list() -> String {
    COMMANDS
        .iter()
        .map(|(name, _, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>8} ms] {} {}",
            at.0.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
