use std::io;
use std::time::Duration;

use radio_core::config::RemoteConfig;
use radio_core::indicator::IndicatorState;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Playback)?;
    record_profile(TranscriptProfile::Outage)?;
    record_profile(TranscriptProfile::ConfigFailure)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let state = IndicatorState::new();
    let mut session = Session::new(profile, &state)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Playback => {
            session.serve_remote(remote_stations()?);
            &[
                "advance 1100ms",
                "status",
                "volume 8",
                "advance 500ms",
                "channel 2",
                "advance 500ms",
                "buffer 0",
                "advance 200ms",
                "buffer 4096",
                "volume 0",
                "advance 200ms",
                "status",
            ]
        }
        TranscriptProfile::Outage => &[
            "advance 1100ms",
            "volume 12",
            "advance 500ms",
            "stream down",
            "advance 12s",
            "stream up",
            "advance 6s",
            "wifi down",
            "advance 3s",
            "status",
            "wifi up",
            "advance 2s",
            "stream down",
            "advance 5m",
            "advance 2s",
            "status",
        ],
        TranscriptProfile::ConfigFailure => &[
            "config down",
            "advance 1100ms",
            "status",
            "advance 6s",
            "volume 3",
            "advance 500ms",
            "status",
        ],
        TranscriptProfile::Interactive => &["help"],
    };

    for command in script {
        session.handle_command(command)?;
    }
    Ok(())
}

fn remote_stations() -> io::Result<RemoteConfig> {
    let mut remote = RemoteConfig::default();
    for url in [
        "http://stream.example.net/jazz",
        "http://stream.example.net/news",
        "http://stream.example.net/classical",
    ] {
        remote
            .push_station(url)
            .map_err(|err| io::Error::other(err.to_string()))?;
    }
    remote.station_count = Some(3);
    remote.background_interval = Some(Duration::from_secs(10 * 60));
    Ok(remote)
}
