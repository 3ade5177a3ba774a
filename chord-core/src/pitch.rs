//! # Pitch Class Module
//!
//! Octave-invariant note names and the frequency-to-pitch-class mapping used
//! by the frame analyzer. Pitch classes are indexed by semitone distance from
//! A, so the label table starts at "A" exactly like an equal-tempered scale
//! anchored on concert pitch.

use std::fmt;
use std::str::FromStr;

use crate::error::ChordError;

/// Concert pitch (A4) in Hz.
pub const CONCERT_A: f32 = 440.0;

/// Note names in semitone order starting from A.
pub const PITCH_CLASS_LABELS: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// One of the twelve octave-equivalent note classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    A,
    ASharp,
    B,
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
}

impl PitchClass {
    /// All pitch classes in label-table order.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
    ];

    /// Position in the label table (0 = A).
    pub fn index(self) -> usize {
        self as usize
    }

    /// The note name, e.g. "C#".
    pub fn label(self) -> &'static str {
        PITCH_CLASS_LABELS[self.index()]
    }

    /// Pitch class reached by moving `semitones` away from A, in either direction.
    pub fn from_semitone_offset(semitones: i32) -> PitchClass {
        Self::ALL[semitones.rem_euclid(12) as usize]
    }

    /// This pitch class transposed up by `semitones`.
    pub fn transpose(self, semitones: i32) -> PitchClass {
        Self::from_semitone_offset(self.index() as i32 + semitones)
    }

    /// Maps a frequency to its nearest equal-tempered pitch class.
    ///
    /// No range check is applied here; the analyzer gates frequencies before
    /// mapping. Returns `None` for non-positive or non-finite input.
    pub fn from_frequency(freq: f32) -> Option<PitchClass> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }
        let semitones = 12.0 * (freq as f64 / CONCERT_A as f64).log2();
        // Ties round up.
        let rounded = (semitones + 0.5).floor() as i32;
        Some(Self::from_semitone_offset(rounded))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PitchClass {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PITCH_CLASS_LABELS
            .iter()
            .position(|label| *label == s)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| ChordError::ParseChord(s.to_string()))
    }
}

/// A deduplicated, unordered set of pitch classes stored as a 12-bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PitchClassSet {
    mask: u16,
}

impl PitchClassSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pitch class; returns false if it was already present.
    pub fn insert(&mut self, pc: PitchClass) -> bool {
        let bit = 1 << pc.index();
        let fresh = self.mask & bit == 0;
        self.mask |= bit;
        fresh
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.mask & (1 << pc.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Number of pitch classes present in both sets.
    pub fn intersection_len(&self, other: &PitchClassSet) -> usize {
        (self.mask & other.mask).count_ones() as usize
    }

    /// Members in label-table order.
    pub fn iter(&self) -> impl Iterator<Item = PitchClass> + '_ {
        PitchClass::ALL.into_iter().filter(|pc| self.contains(*pc))
    }
}

impl FromIterator<PitchClass> for PitchClassSet {
    fn from_iter<I: IntoIterator<Item = PitchClass>>(iter: I) -> Self {
        let mut set = PitchClassSet::new();
        for pc in iter {
            set.insert(pc);
        }
        set
    }
}

impl fmt::Display for PitchClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(PitchClass::label).collect();
        write!(f, "{{{}}}", labels.join(", "))
    }
}
