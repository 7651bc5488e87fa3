//! Tri-color indicator rendering and the blink toggle.
//!
//! The control loop renders the active status through [`IndicatorDriver`].
//! Blinking is delegated to [`BlinkToggle`], which runs from an independent
//! timer and only sees the lock-free flags published in [`IndicatorState`].
//! Every flag is a single atomic word; the driver disarms the toggle before
//! rewriting the channel set and re-arms it last, so the timer never observes
//! a half-applied pattern.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::status::{Severity, StatusCode};

/// Physical color channels of the indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedChannel {
    Red,
    Green,
    Blue,
}

impl LedChannel {
    pub const ALL: [LedChannel; 3] = [LedChannel::Red, LedChannel::Green, LedChannel::Blue];

    const fn index(self) -> usize {
        match self {
            LedChannel::Red => 0,
            LedChannel::Green => 1,
            LedChannel::Blue => 2,
        }
    }
}

/// Lit/unlit state for each channel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Rgb {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(false, false, false);
    pub const RED: Rgb = Rgb::new(true, false, false);
    pub const GREEN: Rgb = Rgb::new(false, true, false);
    pub const BLUE: Rgb = Rgb::new(false, false, true);
    pub const YELLOW: Rgb = Rgb::new(true, true, false);

    #[must_use]
    pub const fn new(red: bool, green: bool, blue: bool) -> Self {
        Self { red, green, blue }
    }

    #[must_use]
    pub const fn channel(self, channel: LedChannel) -> bool {
        match channel {
            LedChannel::Red => self.red,
            LedChannel::Green => self.green,
            LedChannel::Blue => self.blue,
        }
    }

    #[must_use]
    pub const fn is_off(self) -> bool {
        !self.red && !self.green && !self.blue
    }
}

/// Color assigned to each severity level. Unset renders as [`Rgb::OFF`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorPalette {
    pub info: Rgb,
    pub success: Rgb,
    pub warning: Rgb,
    pub error: Rgb,
}

impl IndicatorPalette {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            info: Rgb::BLUE,
            success: Rgb::GREEN,
            warning: Rgb::YELLOW,
            error: Rgb::RED,
        }
    }

    /// Pattern for a level.
    #[must_use]
    pub const fn pattern(&self, level: Severity) -> Rgb {
        match level {
            Severity::Info => self.info,
            Severity::Success => self.success,
            Severity::Warning => self.warning,
            Severity::Error => self.error,
        }
    }

    /// Pattern for an active status, or off when nothing is set.
    #[must_use]
    pub fn pattern_for(&self, active: Option<StatusCode>) -> Rgb {
        active.map_or(Rgb::OFF, |status| self.pattern(status.level()))
    }
}

impl Default for IndicatorPalette {
    fn default() -> Self {
        Self::new()
    }
}

/// Levels shown in order by the boot lamp test.
pub const LAMP_TEST_SEQUENCE: [Severity; 4] = [
    Severity::Error,
    Severity::Warning,
    Severity::Success,
    Severity::Info,
];

/// Sink for physical channel writes. Implementations own any active-low
/// inversion.
pub trait IndicatorOutput {
    fn write(&mut self, channel: LedChannel, lit: bool);

    fn write_pattern(&mut self, pattern: Rgb) {
        for channel in LedChannel::ALL {
            self.write(channel, pattern.channel(channel));
        }
    }
}

impl<T: IndicatorOutput + ?Sized> IndicatorOutput for &mut T {
    fn write(&mut self, channel: LedChannel, lit: bool) {
        (**self).write(channel, lit);
    }
}

/// Flags shared between the control loop and the blink timer.
pub struct IndicatorState {
    lit: [AtomicBool; 3],
    armed: AtomicBool,
    epoch: AtomicU8,
}

impl IndicatorState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lit: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
            armed: AtomicBool::new(false),
            epoch: AtomicU8::new(0),
        }
    }

    /// Whether the toggle is currently allowed to run.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Channel set the toggle inverts while armed.
    pub fn lit(&self, channel: LedChannel) -> bool {
        self.lit[channel.index()].load(Ordering::Relaxed)
    }

    fn epoch(&self) -> u8 {
        self.epoch.load(Ordering::Relaxed)
    }

    // Single producer: the control loop. Load + store keeps this to plain
    // word accesses on cores without compare-and-swap.
    fn stage(&self, pattern: Rgb) {
        self.armed.store(false, Ordering::Release);
        for channel in LedChannel::ALL {
            self.lit[channel.index()].store(pattern.channel(channel), Ordering::Relaxed);
        }
        let next = self.epoch.load(Ordering::Relaxed).wrapping_add(1);
        self.epoch.store(next, Ordering::Relaxed);
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the active status onto the output and publishes blink flags.
pub struct IndicatorDriver<'a> {
    state: &'a IndicatorState,
    palette: IndicatorPalette,
    rendered: Option<Option<StatusCode>>,
}

impl<'a> IndicatorDriver<'a> {
    #[must_use]
    pub const fn new(state: &'a IndicatorState, palette: IndicatorPalette) -> Self {
        Self {
            state,
            palette,
            rendered: None,
        }
    }

    #[must_use]
    pub const fn palette(&self) -> &IndicatorPalette {
        &self.palette
    }

    /// Status most recently rendered, `None` before the first render.
    #[must_use]
    pub const fn rendered(&self) -> Option<Option<StatusCode>> {
        self.rendered
    }

    /// Renders `active` unless it is already on the output. Returns whether
    /// the output was rewritten.
    pub fn render<O: IndicatorOutput>(&mut self, active: Option<StatusCode>, output: &mut O) -> bool {
        if self.rendered == Some(active) {
            return false;
        }
        let pattern = self.palette.pattern_for(active);
        let blinking = active.is_some_and(StatusCode::is_blinking);

        self.state.stage(pattern);
        output.write_pattern(pattern);
        if blinking && !pattern.is_off() {
            self.state.arm();
        }
        self.rendered = Some(active);
        true
    }

    /// Shows a fixed level pattern, bypassing the register. Used by the boot
    /// lamp test; the next [`render`](Self::render) always rewrites.
    pub fn show_level<O: IndicatorOutput>(&mut self, level: Option<Severity>, output: &mut O) {
        let pattern = level.map_or(Rgb::OFF, |level| self.palette.pattern(level));
        self.state.stage(pattern);
        output.write_pattern(pattern);
        self.rendered = None;
    }
}

/// Periodic blink toggle, driven from the timer context.
///
/// Holds its own phase; a new pattern published by the driver restarts the
/// cycle with the channels lit.
#[derive(Debug)]
pub struct BlinkToggle {
    lit_phase: bool,
    epoch: u8,
}

impl BlinkToggle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lit_phase: true,
            epoch: 0,
        }
    }

    /// Runs one timer period. Only touches `output` while armed.
    pub fn on_tick<O: IndicatorOutput>(&mut self, state: &IndicatorState, output: &mut O) {
        let epoch = state.epoch();
        if epoch != self.epoch {
            self.epoch = epoch;
            self.lit_phase = true;
        }
        if !state.is_armed() {
            return;
        }

        self.lit_phase = !self.lit_phase;
        for channel in LedChannel::ALL {
            if state.lit(channel) {
                output.write(channel, self.lit_phase);
            }
        }
    }
}

impl Default for BlinkToggle {
    fn default() -> Self {
        Self::new()
    }
}
