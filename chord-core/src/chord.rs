//! # Chord Matching Module
//!
//! Major and minor triad templates and the matcher that scores a detected
//! pitch-class set against them.
//!
//! Templates are scanned in a fixed order (C, D, E, F, G, A, B, then Cm .. Bm)
//! and only a strictly larger overlap replaces the current best, so ambiguous
//! input always resolves to the earliest template in that list.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ChordError;
use crate::pitch::{PitchClass, PitchClassSet};

/// Symbol used when no template matches.
pub const UNKNOWN_CHORD: &str = "Unknown";

/// Triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Major,
    Minor,
}

/// A plain major or minor triad, e.g. "C" or "Am".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Chord {
    pub root: PitchClass,
    pub quality: Quality,
}

impl Chord {
    pub const fn major(root: PitchClass) -> Self {
        Self { root, quality: Quality::Major }
    }

    pub const fn minor(root: PitchClass) -> Self {
        Self { root, quality: Quality::Minor }
    }

    /// Root, third and fifth.
    pub fn pitch_classes(&self) -> PitchClassSet {
        let third = match self.quality {
            Quality::Major => 4,
            Quality::Minor => 3,
        };
        [self.root, self.root.transpose(third), self.root.transpose(7)]
            .into_iter()
            .collect()
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quality {
            Quality::Major => write!(f, "{}", self.root),
            Quality::Minor => write!(f, "{}m", self.root),
        }
    }
}

impl FromStr for Chord {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, quality) = match s.strip_suffix('m') {
            Some(root) => (root, Quality::Minor),
            None => (s, Quality::Major),
        };
        let root = root
            .parse::<PitchClass>()
            .map_err(|_| ChordError::ParseChord(s.to_string()))?;
        Ok(Chord { root, quality })
    }
}

impl From<Chord> for String {
    fn from(chord: Chord) -> Self {
        chord.to_string()
    }
}

impl TryFrom<String> for Chord {
    type Error = ChordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Renders a matcher result, using "Unknown" for no match.
pub fn chord_symbol(chord: Option<Chord>) -> String {
    chord.map_or_else(|| UNKNOWN_CHORD.to_string(), |c| c.to_string())
}

/// A chord together with the pitch classes it is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordTemplate {
    pub chord: Chord,
    pub notes: PitchClassSet,
}

/// The 14 triad templates in matching order.
static TEMPLATES: Lazy<Vec<ChordTemplate>> = Lazy::new(|| {
    use PitchClass::*;
    const ROOTS: [PitchClass; 7] = [C, D, E, F, G, A, B];

    let majors = ROOTS.iter().map(|&root| Chord::major(root));
    let minors = ROOTS.iter().map(|&root| Chord::minor(root));
    majors
        .chain(minors)
        .map(|chord| ChordTemplate {
            chord,
            notes: chord.pitch_classes(),
        })
        .collect()
});

/// Template matcher for detected pitch-class sets.
#[derive(Debug, Clone)]
pub struct ChordMatcher {
    min_overlap: usize,
}

impl Default for ChordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChordMatcher {
    pub fn new() -> Self {
        Self { min_overlap: 2 }
    }

    /// The templates in the order they are scored.
    pub fn templates(&self) -> &'static [ChordTemplate] {
        &TEMPLATES
    }

    /// Template notes for `chord`, or an empty set for chords without a template.
    pub fn chord_notes(&self, chord: &Chord) -> PitchClassSet {
        self.templates()
            .iter()
            .find(|t| t.chord == *chord)
            .map(|t| t.notes)
            .unwrap_or_default()
    }

    /// Best matching chord for `detected`, or `None` ("Unknown").
    ///
    /// Fewer than two detected pitch classes never match. Otherwise the
    /// template with the largest overlap wins, provided the overlap is at
    /// least two; ties go to the earlier template.
    pub fn identify(&self, detected: &PitchClassSet) -> Option<Chord> {
        if detected.len() < self.min_overlap {
            return None;
        }

        let mut best: Option<(Chord, usize)> = None;
        for template in self.templates() {
            let overlap = detected.intersection_len(&template.notes);
            if overlap < self.min_overlap {
                continue;
            }
            if best.is_none_or(|(_, best_overlap)| overlap > best_overlap) {
                best = Some((template.chord, overlap));
            }
        }
        best.map(|(chord, _)| chord)
    }
}
