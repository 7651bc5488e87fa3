//! Network association monitor.
//!
//! Runs on its own cadence, independent of the playback tick. A lost link
//! shows [`catalog::NETWORK_LOST`] in the Error slot and re-issues a reconnect
//! on every check; playback keeps ticking meanwhile so channel and volume
//! changes are already applied when the link returns.

use core::{ops::Add, time::Duration};

use crate::config::TimingConfig;
use crate::control::FatalRestart;
use crate::status::{StatusRegister, catalog};

/// Network association collaborator. Both calls are idempotent and cheap.
pub trait NetworkLink {
    fn is_connected(&self) -> bool;

    /// Fire-and-forget reassociation request.
    fn reconnect(&mut self);
}

/// Outcome of one monitor poll.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct NetworkReport {
    pub checked: bool,
    pub lost: bool,
    pub restored: bool,
    pub reconnect_issued: bool,
    pub restart: Option<FatalRestart>,
}

pub struct NetworkMonitor<TInstant> {
    interval: Duration,
    disconnect_ceiling: Duration,
    next_check: TInstant,
    last_connected: TInstant,
    connected: bool,
    restart_signalled: bool,
}

impl<TInstant> NetworkMonitor<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    /// Starts monitoring a link known to be associated at `now`.
    #[must_use]
    pub fn new(timing: &TimingConfig, now: TInstant) -> Self {
        Self {
            interval: timing.network_check_interval,
            disconnect_ceiling: timing.network_disconnect_ceiling,
            next_check: now,
            last_connected: now,
            connected: true,
            restart_signalled: false,
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub const fn last_connected(&self) -> TInstant {
        self.last_connected
    }

    /// Checks the link if the check interval has elapsed.
    pub fn poll<N: NetworkLink>(
        &mut self,
        now: TInstant,
        link: &mut N,
        register: &mut StatusRegister,
    ) -> NetworkReport {
        let mut report = NetworkReport::default();
        if now < self.next_check {
            return report;
        }
        self.next_check = now + self.interval;
        report.checked = true;

        if link.is_connected() {
            self.last_connected = now;
            self.restart_signalled = false;
            if !self.connected {
                self.connected = true;
                report.restored = true;
            }
            register.clear_code(catalog::NETWORK_LOST);
            return report;
        }

        if self.connected {
            self.connected = false;
            report.lost = true;
        }
        register.set(catalog::NETWORK_LOST);

        if !self.restart_signalled && now >= self.last_connected + self.disconnect_ceiling {
            self.restart_signalled = true;
            report.restart = Some(FatalRestart::NetworkLost);
        }

        link.reconnect();
        report.reconnect_issued = true;
        report
    }
}
