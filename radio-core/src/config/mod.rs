//! Runtime configuration snapshot consumed by the control loop.
//!
//! Stations, timing constants, volume range and indicator colors. Values are
//! validated on edit so the control loop can read them without checks.

use core::{fmt, time::Duration};

use heapless::{String, Vec};

use crate::indicator::IndicatorPalette;

/// Maximum number of stations the selector can address.
pub const MAX_STATIONS: usize = 4;

/// Longest accepted stream URL, in bytes.
pub const MAX_URL_LEN: usize = 256;

/// Stored stream URL.
pub type StationUrl = String<MAX_URL_LEN>;

/// Rejections raised while editing configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Station slot outside `0..MAX_STATIONS`.
    StationIndex(usize),
    /// Active station count outside `1..=MAX_STATIONS`.
    StationCount(usize),
    /// URL longer than [`MAX_URL_LEN`].
    UrlTooLong(usize),
    /// Volume bounds inverted.
    VolumeRange { min: u8, max: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::StationIndex(index) => {
                write!(f, "station index {index} outside 0..{MAX_STATIONS}")
            }
            ConfigError::StationCount(count) => {
                write!(f, "station count {count} outside 1..={MAX_STATIONS}")
            }
            ConfigError::UrlTooLong(len) => {
                write!(f, "url is {len} bytes, limit is {MAX_URL_LEN}")
            }
            ConfigError::VolumeRange { min, max } => {
                write!(f, "volume range {min}..={max} is inverted")
            }
        }
    }
}

/// Ordered stream URLs plus the number the selector currently exposes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StationTable {
    urls: [StationUrl; MAX_STATIONS],
    active_count: usize,
}

impl StationTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            urls: [
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ],
            active_count: 1,
        }
    }

    /// Number of stations reachable through the selector, `1..=MAX_STATIONS`.
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn set_active_count(&mut self, count: usize) -> Result<(), ConfigError> {
        if !(1..=MAX_STATIONS).contains(&count) {
            return Err(ConfigError::StationCount(count));
        }
        self.active_count = count;
        Ok(())
    }

    pub fn set_url(&mut self, index: usize, url: &str) -> Result<(), ConfigError> {
        let slot = self
            .urls
            .get_mut(index)
            .ok_or(ConfigError::StationIndex(index))?;
        *slot = to_url(url)?;
        Ok(())
    }

    /// URL stored for `index`, regardless of the active count.
    #[must_use]
    pub fn url(&self, index: usize) -> Option<&str> {
        self.urls.get(index).map(String::as_str)
    }

    /// Maps a sampled selector position onto an active station. Positions past
    /// the active count land on the last active station.
    #[must_use]
    pub fn clamp_channel(&self, channel: usize) -> usize {
        channel.min(self.active_count - 1)
    }

    /// Replaces stations from a remote snapshot. Nothing changes unless every
    /// value validates.
    pub fn apply(&mut self, remote: &RemoteConfig) -> Result<(), ConfigError> {
        let count = remote.station_count.unwrap_or(self.active_count);
        if !(1..=MAX_STATIONS).contains(&count) {
            return Err(ConfigError::StationCount(count));
        }
        if remote.stations.len() > MAX_STATIONS {
            return Err(ConfigError::StationCount(remote.stations.len()));
        }

        let mut urls = self.urls.clone();
        for (slot, url) in urls.iter_mut().zip(remote.stations.iter()) {
            slot.clone_from(url);
        }
        self.urls = urls;
        self.active_count = count;
        Ok(())
    }
}

impl Default for StationTable {
    fn default() -> Self {
        Self::new()
    }
}

fn to_url(url: &str) -> Result<StationUrl, ConfigError> {
    StationUrl::try_from(url).map_err(|_| ConfigError::UrlTooLong(url.len()))
}

/// Snapshot delivered by a remote configuration fetch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteConfig {
    pub stations: Vec<StationUrl, MAX_STATIONS>,
    pub station_count: Option<usize>,
    /// Background refresh interval; `Some(Duration::ZERO)` disables it.
    pub background_interval: Option<Duration>,
}

impl RemoteConfig {
    /// Appends a station URL, validating its length.
    pub fn push_station(&mut self, url: &str) -> Result<(), ConfigError> {
        let url = to_url(url)?;
        self.stations
            .push(url)
            .map_err(|_| ConfigError::StationCount(MAX_STATIONS + 1))
    }
}

/// Volume bounds in engineering units; zero means stop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VolumeRange {
    min: u8,
    max: u8,
}

impl VolumeRange {
    pub const DEFAULT: VolumeRange = VolumeRange { min: 0, max: 21 };

    pub const fn new(min: u8, max: u8) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::VolumeRange { min, max });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub const fn min(self) -> u8 {
        self.min
    }

    #[must_use]
    pub const fn max(self) -> u8 {
        self.max
    }

    #[must_use]
    pub fn clamp(self, volume: u8) -> u8 {
        volume.clamp(self.min, self.max)
    }
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Cadences and ceilings used by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConfig {
    /// Playback state machine period.
    pub control_tick: Duration,
    /// Network association check period.
    pub network_check_interval: Duration,
    /// Minimum spacing between stream connect attempts.
    pub reconnect_backoff: Duration,
    /// Time without liveness while reconnecting before a restart.
    pub reconnect_ceiling: Duration,
    /// Time without association after boot before a restart.
    pub network_disconnect_ceiling: Duration,
    /// Time without association during boot before a restart.
    pub network_setup_ceiling: Duration,
    /// Blink half-period.
    pub blink_period: Duration,
    /// How long the config-fetch failure notice stays up at boot.
    pub config_notice: Duration,
    /// Per-level hold during the boot lamp test.
    pub lamp_test_step: Duration,
    /// Background config refresh while idle; `None` disables it.
    pub background_config_interval: Option<Duration>,
}

impl TimingConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            control_tick: Duration::from_millis(50),
            network_check_interval: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(5),
            reconnect_ceiling: Duration::from_secs(5 * 60),
            network_disconnect_ceiling: Duration::from_secs(5 * 60),
            network_setup_ceiling: Duration::from_secs(15 * 60),
            blink_period: Duration::from_millis(600),
            config_notice: Duration::from_secs(6),
            lamp_test_step: Duration::from_millis(250),
            background_config_interval: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete configuration snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RadioConfig {
    pub timing: TimingConfig,
    pub stations: StationTable,
    pub volume: VolumeRange,
    pub palette: IndicatorPalette,
}

impl RadioConfig {
    /// Folds a remote snapshot into this configuration.
    pub fn apply_remote(&mut self, remote: &RemoteConfig) -> Result<(), ConfigError> {
        self.stations.apply(remote)?;
        if let Some(interval) = remote.background_interval {
            self.timing.background_config_interval =
                (!interval.is_zero()).then_some(interval);
        }
        Ok(())
    }
}
