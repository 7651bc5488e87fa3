//! Prioritized status register shared by the playback and network monitors.
//!
//! Each severity level owns exactly one slot. The register exposes the single
//! highest-priority occupied slot as the active status; everything below it is
//! retained but not rendered. Writers report whether the active status moved so
//! the indicator only re-renders on real changes.

use core::fmt;

pub mod catalog;

/// Number of severity levels (and therefore slots) held by the register.
pub const SEVERITY_LEVELS: usize = 4;

/// Largest ordinal accepted within one blink class of a level.
pub const MAX_ORDINAL: u8 = 49;

/// First legacy code value (within a level) that selects the blinking class.
pub const BLINK_CODE_OFFSET: u8 = MAX_ORDINAL + 1;

/// Severity ladder in ascending priority.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// All levels, lowest priority first.
    pub const ALL: [Severity; SEVERITY_LEVELS] = [
        Severity::Info,
        Severity::Success,
        Severity::Warning,
        Severity::Error,
    ];

    /// Returns the slot index backing this level.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Severity::Info => 0,
            Severity::Success => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
        }
    }

    /// Resolves a slot index back into a level.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Severity::Info),
            1 => Some(Severity::Success),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Error),
            _ => None,
        }
    }

    /// Returns the lowercase label used by logs and the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tagged status value: which level it occupies, whether it blinks, and a
/// per-class ordinal that tells codes on the same level apart.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StatusCode {
    level: Severity,
    blinking: bool,
    ordinal: u8,
}

impl StatusCode {
    /// Builds a steady code. Panics on an ordinal above [`MAX_ORDINAL`].
    #[must_use]
    pub const fn steady(level: Severity, ordinal: u8) -> Self {
        assert!(ordinal <= MAX_ORDINAL, "status ordinal out of range");
        Self {
            level,
            blinking: false,
            ordinal,
        }
    }

    /// Builds a blinking code. Panics on an ordinal above [`MAX_ORDINAL`].
    #[must_use]
    pub const fn blinking(level: Severity, ordinal: u8) -> Self {
        assert!(ordinal <= MAX_ORDINAL, "status ordinal out of range");
        Self {
            level,
            blinking: true,
            ordinal,
        }
    }

    /// Checked constructor for values arriving from outside the crate.
    #[must_use]
    pub const fn new(level: Severity, blinking: bool, ordinal: u8) -> Option<Self> {
        if ordinal > MAX_ORDINAL {
            return None;
        }
        Some(Self {
            level,
            blinking,
            ordinal,
        })
    }

    /// Decodes a level-local code in `0..=99`; values from
    /// [`BLINK_CODE_OFFSET`] upward select the blinking class.
    #[must_use]
    pub const fn from_level_code(level: Severity, code: u8) -> Option<Self> {
        if code > BLINK_CODE_OFFSET + MAX_ORDINAL {
            None
        } else if code >= BLINK_CODE_OFFSET {
            Some(Self::blinking(level, code - BLINK_CODE_OFFSET))
        } else {
            Some(Self::steady(level, code))
        }
    }

    /// Decodes the flat `level * 100 + code` numbering used in logs.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        let Some(level) = Severity::from_index((raw / 100) as usize) else {
            return None;
        };
        #[allow(clippy::cast_possible_truncation)]
        let code = (raw % 100) as u8;
        Self::from_level_code(level, code)
    }

    /// Level-local code in `0..=99`.
    #[must_use]
    pub const fn level_code(self) -> u8 {
        if self.blinking {
            self.ordinal + BLINK_CODE_OFFSET
        } else {
            self.ordinal
        }
    }

    /// Flat `level * 100 + code` numbering.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_raw(self) -> u16 {
        self.level.index() as u16 * 100 + self.level_code() as u16
    }

    #[must_use]
    pub const fn level(self) -> Severity {
        self.level
    }

    #[must_use]
    pub const fn is_blinking(self) -> bool {
        self.blinking
    }

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self.ordinal
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match catalog::name_of(*self) {
            Some(name) => write!(f, "{name} ({:03})", self.to_raw()),
            None => write!(f, "{} ({:03})", self.level, self.to_raw()),
        }
    }
}

/// Four-slot status register. The active status is always the occupied slot
/// with the highest level, or nothing when every slot is empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusRegister {
    slots: [Option<StatusCode>; SEVERITY_LEVELS],
    active: Option<StatusCode>,
}

impl StatusRegister {
    /// Creates a register with every slot empty (indicator off).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; SEVERITY_LEVELS],
            active: None,
        }
    }

    /// Currently displayed status, if any slot is occupied.
    #[must_use]
    pub const fn active(&self) -> Option<StatusCode> {
        self.active
    }

    /// Level of the currently displayed status.
    #[must_use]
    pub fn active_level(&self) -> Option<Severity> {
        self.active.map(StatusCode::level)
    }

    /// Contents of a single slot.
    #[must_use]
    pub const fn slot(&self, level: Severity) -> Option<StatusCode> {
        self.slots[level.index()]
    }

    /// Stores `status` in its level's slot. Writing the value a slot already
    /// holds is a no-op. Returns whether the active status changed.
    pub fn set(&mut self, status: StatusCode) -> bool {
        let slot = &mut self.slots[status.level.index()];
        if *slot == Some(status) {
            return false;
        }
        *slot = Some(status);
        self.recompute()
    }

    /// Stores `status` after clearing every slot strictly above its level up
    /// to and including `floor`. Slots above `floor` are left untouched, which
    /// keeps higher-severity conditions owned by other writers visible.
    pub fn set_forced(&mut self, status: StatusCode, floor: Severity) -> bool {
        let before = self.active;
        for level in Severity::ALL {
            if level > status.level && level <= floor {
                self.slots[level.index()] = None;
            }
        }
        self.slots[status.level.index()] = Some(status);
        self.recompute();
        before != self.active
    }

    /// Empties one slot. Returns whether the active status changed.
    pub fn clear(&mut self, level: Severity) -> bool {
        let slot = &mut self.slots[level.index()];
        if slot.is_none() {
            return false;
        }
        *slot = None;
        self.recompute()
    }

    /// Empties a slot only while it still holds `status`; a different code
    /// written there since is left alone.
    pub fn clear_code(&mut self, status: StatusCode) -> bool {
        if self.slots[status.level.index()] == Some(status) {
            self.clear(status.level)
        } else {
            false
        }
    }

    /// Empties every slot from `level` down to [`Severity::Info`].
    pub fn clear_all_up_to(&mut self, level: Severity) -> bool {
        let before = self.active;
        for slot in &mut self.slots[..=level.index()] {
            *slot = None;
        }
        self.recompute();
        before != self.active
    }

    fn recompute(&mut self) -> bool {
        let next = self.slots.iter().rev().find_map(|slot| *slot);
        let changed = next != self.active;
        self.active = next;
        changed
    }
}
