//! # Progression Module
//!
//! Debounces noisy per-frame chord guesses into a stable progression.
//!
//! A guess has to repeat for `threshold` consecutive frames before it is
//! confirmed. After a confirmation the counter restarts while the candidate
//! stays, so holding a chord re-confirms it every `threshold` frames; those
//! repeats are dropped because the progression never stores the same chord
//! twice in a row. An "Unknown" frame forgets the candidate entirely.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chord::Chord;

/// Ordered chord history without adjacent duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progression {
    chords: Vec<Chord>,
}

impl Progression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chord` unless it equals the last entry. Returns true if appended.
    pub fn push_dedup(&mut self, chord: Chord) -> bool {
        if self.chords.last() == Some(&chord) {
            return false;
        }
        self.chords.push(chord);
        true
    }

    pub fn last(&self) -> Option<Chord> {
        self.chords.last().copied()
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chord> {
        self.chords.iter()
    }

    pub fn as_slice(&self) -> &[Chord] {
        &self.chords
    }

    pub fn clear(&mut self) {
        self.chords.clear();
    }
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chord) in self.chords.iter().enumerate() {
            if i > 0 {
                f.write_str(" → ")?;
            }
            write!(f, "{chord}")?;
        }
        Ok(())
    }
}

/// What a single observation did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Nothing confirmed this frame.
    Pending,
    /// A chord was confirmed and appended.
    Appended(Chord),
    /// A chord was confirmed but equalled the last entry.
    Repeated(Chord),
}

/// Debounce state machine that owns the progression it feeds.
#[derive(Debug, Clone)]
pub struct ProgressionTracker {
    candidate: Option<Chord>,
    count: u32,
    threshold: u32,
    progression: Progression,
}

impl ProgressionTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            candidate: None,
            count: 0,
            threshold,
            progression: Progression::new(),
        }
    }

    /// Feeds one per-frame guess; `None` means "Unknown".
    pub fn observe(&mut self, guess: Option<Chord>) -> Observation {
        let Some(chord) = guess else {
            self.candidate = None;
            self.count = 0;
            return Observation::Pending;
        };

        if self.candidate != Some(chord) {
            self.candidate = Some(chord);
            self.count = 1;
            return Observation::Pending;
        }

        self.count += 1;
        if self.count < self.threshold {
            return Observation::Pending;
        }

        self.count = 0;
        if self.progression.push_dedup(chord) {
            info!("Detected: {} (progression: {})", chord, self.progression);
            Observation::Appended(chord)
        } else {
            debug!("Re-confirmed {}, already last in progression", chord);
            Observation::Repeated(chord)
        }
    }

    pub fn candidate(&self) -> Option<Chord> {
        self.candidate
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    /// Empties the progression and forgets the candidate.
    pub fn clear(&mut self) {
        self.progression.clear();
        self.candidate = None;
        self.count = 0;
    }
}

impl Default for ProgressionTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchClass;

    const C: Chord = Chord::major(PitchClass::C);
    const G: Chord = Chord::major(PitchClass::G);
    const AM: Chord = Chord::minor(PitchClass::A);

    fn feed(tracker: &mut ProgressionTracker, guesses: &[Option<Chord>]) -> usize {
        guesses
            .iter()
            .filter(|&&g| matches!(tracker.observe(g), Observation::Appended(_)))
            .count()
    }

    #[test]
    fn two_frames_then_change_emits_nothing() {
        let mut tracker = ProgressionTracker::new(3);
        assert_eq!(feed(&mut tracker, &[Some(C), Some(C), Some(G)]), 0);
        assert!(tracker.progression().is_empty());
        assert_eq!(tracker.candidate(), Some(G));
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn three_frames_emit_exactly_once() {
        let mut tracker = ProgressionTracker::new(3);
        assert_eq!(tracker.observe(Some(C)), Observation::Pending);
        assert_eq!(tracker.observe(Some(C)), Observation::Pending);
        assert_eq!(tracker.observe(Some(C)), Observation::Appended(C));
        assert_eq!(tracker.progression().as_slice(), &[C]);
        // Counter restarts but the candidate is kept.
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.candidate(), Some(C));
    }

    #[test]
    fn holding_a_chord_never_duplicates() {
        let mut tracker = ProgressionTracker::new(3);
        let held = vec![Some(C); 10];
        assert_eq!(feed(&mut tracker, &held), 1);
        assert_eq!(tracker.progression().len(), 1);
    }

    #[test]
    fn reconfirmation_is_reported_as_repeat() {
        let mut tracker = ProgressionTracker::new(3);
        feed(&mut tracker, &[Some(C); 3]);
        tracker.observe(Some(C));
        tracker.observe(Some(C));
        assert_eq!(tracker.observe(Some(C)), Observation::Repeated(C));
    }

    #[test]
    fn unknown_resets_the_run() {
        let mut tracker = ProgressionTracker::new(3);
        assert_eq!(feed(&mut tracker, &[Some(C), Some(C), None, Some(C), Some(C)]), 0);
        assert_eq!(tracker.count(), 2);
        tracker.observe(None);
        assert_eq!(tracker.candidate(), None);
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn progression_has_no_adjacent_duplicates() {
        let mut tracker = ProgressionTracker::new(3);
        let script = [
            C, C, C, C, C, C, G, G, G, C, C, C, C, C, C, AM, AM, G, AM, AM, AM, AM, AM, AM,
        ];
        for chord in script {
            tracker.observe(Some(chord));
        }
        let chords = tracker.progression().as_slice();
        assert_eq!(chords, &[C, G, C, AM]);
        assert!(chords.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn same_chord_after_interruption_is_not_duplicated() {
        let mut tracker = ProgressionTracker::new(3);
        feed(&mut tracker, &[Some(C), Some(C), Some(C), None, Some(C), Some(C), Some(C)]);
        assert_eq!(tracker.progression().as_slice(), &[C]);
    }

    #[test]
    fn clear_resets_progression_and_counter() {
        let mut tracker = ProgressionTracker::new(3);
        assert_eq!(feed(&mut tracker, &[Some(C); 3]), 1);
        tracker.clear();
        assert!(tracker.progression().is_empty());
        assert_eq!(feed(&mut tracker, &[Some(C); 2]), 0);
        assert!(tracker.progression().is_empty());
        assert_eq!(feed(&mut tracker, &[Some(C)]), 1);
    }

    #[test]
    fn progression_displays_with_arrows() {
        let mut progression = Progression::new();
        progression.push_dedup(C);
        progression.push_dedup(G);
        progression.push_dedup(G);
        progression.push_dedup(AM);
        assert_eq!(progression.to_string(), "C → G → Am");
    }

    #[test]
    fn progression_serializes_as_symbols() {
        let mut progression = Progression::new();
        progression.push_dedup(C);
        progression.push_dedup(AM);
        let json = serde_json::to_string(&progression).unwrap();
        assert_eq!(json, r#"["C","Am"]"#);
    }
}
