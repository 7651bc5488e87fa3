//! Named status codes emitted by the radio.
//!
//! Slot ownership: playback writes Info, Success and Warning; the network
//! monitor and boot sequence write Error. The config notice borrows the
//! Warning slot during boot only, before playback starts.

use super::{Severity, StatusCode};

/// Volume at zero, nothing to do.
pub const IDLE: StatusCode = StatusCode::steady(Severity::Info, 1);
/// Background configuration refresh in flight while idle.
pub const BACKGROUND_CONFIG_RETRIEVAL: StatusCode = StatusCode::steady(Severity::Info, 2);
/// Boot has not finished yet.
pub const INITIALIZING: StatusCode = StatusCode::steady(Severity::Info, 3);
/// Stream connected but the decoder buffer is still empty.
pub const BUFFERING: StatusCode = StatusCode::blinking(Severity::Info, 1);
/// Audible playback.
pub const PLAYING: StatusCode = StatusCode::steady(Severity::Success, 1);
/// First connection to the selected station is being attempted.
pub const INITIAL_CONNECTING: StatusCode = StatusCode::steady(Severity::Warning, 2);
/// Remote configuration could not be fetched; stored stations are used.
pub const CONFIG_FETCH_FAILED: StatusCode = StatusCode::blinking(Severity::Warning, 0);
/// A previously live stream stalled and is being re-established.
pub const RECONNECTING: StatusCode = StatusCode::blinking(Severity::Warning, 1);
/// Network association dropped after boot.
pub const NETWORK_LOST: StatusCode = StatusCode::steady(Severity::Error, 0);
/// Reconnect watchdog expired; a restart has been requested.
pub const STREAM_RECONNECT_TIMEOUT: StatusCode = StatusCode::steady(Severity::Error, 2);
/// Waiting for network provisioning at boot.
pub const NETWORK_SETUP: StatusCode = StatusCode::blinking(Severity::Error, 0);

const NAMED: [(StatusCode, &str); 11] = [
    (IDLE, "idle"),
    (BACKGROUND_CONFIG_RETRIEVAL, "background-config"),
    (INITIALIZING, "initializing"),
    (BUFFERING, "buffering"),
    (PLAYING, "playing"),
    (INITIAL_CONNECTING, "connecting"),
    (CONFIG_FETCH_FAILED, "config-fetch-failed"),
    (RECONNECTING, "reconnecting"),
    (NETWORK_LOST, "network-lost"),
    (STREAM_RECONNECT_TIMEOUT, "reconnect-timeout"),
    (NETWORK_SETUP, "network-setup"),
];

/// Returns the short name of a catalogued code.
#[must_use]
pub fn name_of(status: StatusCode) -> Option<&'static str> {
    NAMED
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, name)| *name)
}
