//! # Tune Model
//!
//! The structured output of a parse: a [`Tune`] made of [`Section`]s, each
//! holding the notes of one written pass and, separately, the repeat-unrolled
//! notes used to drive playback and highlighting.
//!
//! ```text
//! Tune
//!   ├── id, title, key, time_signature, default_tempo, abc
//!   └── Vec<Section>
//!         ├── name, start_measure, end_measure, repeat
//!         ├── notes: Vec<Note>            (section-relative timing)
//!         └── playback_notes: Option<Vec<Note>>  (repeats unrolled)
//! ```
//!
//! All types serialize to JSON with the field names shown above.

use serde::{Deserialize, Serialize};

/// A single note with pitch, duration and timing.
///
/// `start_time` is measured in quarter-note beats from the start of the owning
/// section (or of the tune, for the single "Full" section produced when no
/// sections were detected).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: String,   // e.g. "D4", "F#4", "Bb3"
    pub duration: f64,   // in beats
    pub start_time: f64, // in beats from section start
}

impl Note {
    pub fn new(pitch: impl Into<String>, duration: f64, start_time: f64) -> Self {
        Self {
            pitch: pitch.into(),
            duration,
            start_time,
        }
    }

    /// Beat at which this note stops sounding
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

fn default_repeat() -> u32 {
    1
}

/// A section of a tune (A part, B part, ...).
///
/// `start_measure`/`end_measure` are the detected, unexpanded measure numbers.
/// They are for display only; timing lives in the notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start_measure: u32,
    pub end_measure: u32,
    pub notes: Vec<Note>,
    /// Number of times the section is played (1 = no repeat)
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Notes with repeats unrolled; `None` until the playback expander has run
    #[serde(default)]
    pub playback_notes: Option<Vec<Note>>,
}

impl Section {
    /// Section with no playback expansion yet
    pub fn new(
        name: impl Into<String>,
        start_measure: u32,
        end_measure: u32,
        notes: Vec<Note>,
        repeat: u32,
    ) -> Self {
        Self {
            name: name.into(),
            start_measure,
            end_measure,
            notes,
            repeat,
            playback_notes: None,
        }
    }

    /// Length of one pass in beats: the latest note end, or 0 for an empty section
    pub fn duration(&self) -> f64 {
        self.notes.iter().map(Note::end_time).fold(0.0, f64::max)
    }
}

/// Complete tune data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tune {
    pub id: String,
    pub title: String,
    pub key: String,            // "D", "A minor"
    pub time_signature: String, // "6/8"
    pub default_tempo: u32,     // BPM
    pub abc: String,
    pub sections: Vec<Section>,
}

impl Tune {
    /// List-view projection of this tune
    pub fn summary(&self) -> TuneSummary {
        TuneSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            key: self.key.clone(),
        }
    }

    /// Total number of (non-repeated) notes across all sections
    pub fn note_count(&self) -> usize {
        self.sections.iter().map(|s| s.notes.len()).sum()
    }
}

/// Summary info for tune lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneSummary {
    pub id: String,
    pub title: String,
    pub key: String,
}
