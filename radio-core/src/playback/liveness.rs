//! Stream liveness policies.
//!
//! The audio collaborator's own `is_live` flag is the baseline signal. Some
//! decoders keep reporting "running" on a stalled socket, so the progress
//! policy additionally requires elapsed play time to keep moving.

use core::{ops::Add, time::Duration};

use super::AudioClient;

/// Decides whether the stream is delivering audio. Sampled once per tick.
pub trait LivenessPolicy<TInstant> {
    fn sample<A: AudioClient>(&mut self, audio: &A, now: TInstant) -> bool;

    /// Forgets history; called whenever the stream is stopped or retuned.
    fn reset(&mut self);
}

/// Trusts the collaborator's report.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReportedLiveness;

impl<TInstant> LivenessPolicy<TInstant> for ReportedLiveness {
    fn sample<A: AudioClient>(&mut self, audio: &A, _now: TInstant) -> bool {
        audio.is_live()
    }

    fn reset(&mut self) {}
}

/// Live only while elapsed play time advances within `stall_window`.
///
/// After a reset the first sample only records a baseline; the stream counts
/// as live once play time moves past it. An empty buffer is treated as still
/// filling and defers to the reported flag, since play time cannot advance
/// before the first frame decodes.
#[derive(Copy, Clone, Debug)]
pub struct PlaybackProgress<TInstant> {
    stall_window: Duration,
    last_elapsed: Option<u32>,
    last_advance: Option<TInstant>,
}

impl<TInstant> PlaybackProgress<TInstant> {
    #[must_use]
    pub const fn new(stall_window: Duration) -> Self {
        Self {
            stall_window,
            last_elapsed: None,
            last_advance: None,
        }
    }
}

impl<TInstant> LivenessPolicy<TInstant> for PlaybackProgress<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    fn sample<A: AudioClient>(&mut self, audio: &A, now: TInstant) -> bool {
        if !audio.is_live() {
            LivenessPolicy::<TInstant>::reset(self);
            return false;
        }
        if audio.buffered_bytes() == 0 {
            return true;
        }

        let elapsed = audio.elapsed_play_time();
        match self.last_elapsed {
            None => {
                self.last_elapsed = Some(elapsed);
                false
            }
            Some(previous) if previous != elapsed => {
                self.last_elapsed = Some(elapsed);
                self.last_advance = Some(now);
                true
            }
            // `last_advance` stays empty until play time moves off the baseline.
            Some(_) => self
                .last_advance
                .is_some_and(|since| now < since + self.stall_window),
        }
    }

    fn reset(&mut self) {
        self.last_elapsed = None;
        self.last_advance = None;
    }
}
