//! # Guitar String Table
//!
//! The six strings of a guitar in standard tuning, low to high. The table is
//! fixed at compile time and never mutated; every other module refers to a
//! string through its [`StringId`].

use std::fmt;

/// Identifies one of the six strings by its pitch label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StringId {
    E2,
    A2,
    D3,
    G3,
    B3,
    E4,
}

/// Static record pairing a string's label, pitch and reference frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct StringDefinition {
    pub id: StringId,
    /// Human readable label (e.g., "E (Lowest)")
    pub name: &'static str,
    /// Pitch class and octave (e.g., "E2")
    pub note: &'static str,
    /// Reference frequency in Hz
    pub frequency: f32,
}

/// Standard tuning, ordered low to high.
pub static GUITAR_STRINGS: [StringDefinition; 6] = [
    StringDefinition { id: StringId::E2, name: "E (Lowest)", note: "E2", frequency: 82.41 },
    StringDefinition { id: StringId::A2, name: "A", note: "A2", frequency: 110.00 },
    StringDefinition { id: StringId::D3, name: "D", note: "D3", frequency: 146.83 },
    StringDefinition { id: StringId::G3, name: "G", note: "G3", frequency: 196.00 },
    StringDefinition { id: StringId::B3, name: "B", note: "B3", frequency: 246.94 },
    StringDefinition { id: StringId::E4, name: "E (Highest)", note: "E4", frequency: 329.63 },
];

impl StringId {
    /// All strings, low to high.
    pub const ALL: [StringId; 6] = [
        StringId::E2,
        StringId::A2,
        StringId::D3,
        StringId::G3,
        StringId::B3,
        StringId::E4,
    ];

    /// Position in the table (0 for the low E).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks up the static definition. Cannot fail: the set is closed.
    pub fn definition(self) -> &'static StringDefinition {
        &GUITAR_STRINGS[self.index()]
    }

    /// Finds a string by its 1-based position, low to high. Used for the
    /// number-key shortcuts.
    pub fn from_position(position: usize) -> Option<StringId> {
        position
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().note)
    }
}

impl StringDefinition {
    /// Accessible description of the control that plays this string.
    pub fn aria_label(&self) -> String {
        format!("Play {} string, note {}", self.name, self.note)
    }

    /// Status line shown while this string is sounding.
    pub fn playing_message(&self) -> String {
        format!("Playing {} ({:.2} Hz)", self.note, self.frequency)
    }
}
