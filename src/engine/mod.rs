//! # Notation Engine
//!
//! Reads ABC text into a flat, time-ordered list of note events.
//!
//! ## Purpose
//! Everything downstream (section assignment, playback expansion) works on
//! [`NoteEvent`]s, never on ABC syntax. The [`NotationEngine`] trait is the seam:
//! [`AbcEngine`] is the built-in implementation, and callers can plug in any
//! other reader that produces the same events.
//!
//! ## Pipeline
//! ```text
//! ABC text → lexer → tokens → parser → bars → expand → Vec<NoteEvent>
//! ```
//!
//! ## Timing
//! - `start_time` and `duration` are in quarter-note beats
//! - repeats are played out by default ([`RepeatMode::Expanded`])
//! - `measure` is the written bar number, starting at [`FIRST_MEASURE`] for
//!   the first bar (the pickup bar when the tune opens with an anacrusis).
//!   Every barline except `|:` starts a new number, which is how the section
//!   detector counts measures, so written measure N of a section boundary is
//!   engine measure `N - 1 + FIRST_MEASURE`.
//!
//! ## Example
//! ```rust
//! use fiddle::engine::{AbcEngine, NotationEngine};
//!
//! let score = AbcEngine::new()
//!     .parse("X:1\nM:2/4\nL:1/8\nK:G\n|:GA Bc:|\n")
//!     .unwrap();
//! assert_eq!(score.notes.len(), 8);
//! assert_eq!(score.notes[4].start_time, 2.0);
//! assert_eq!(score.key.as_deref(), Some("G"));
//! assert_eq!(score.time_signature.as_deref(), Some("2/4"));
//! ```

pub mod ast;
pub mod expand;
pub mod lexer;
pub mod parser;


use crate::config::EngineConfig;
use crate::error::FiddleError;
use serde::{Deserialize, Serialize};

/// Measure number of the first written bar
pub const FIRST_MEASURE: u32 = 0;

/// One sounding note on the expanded timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: String,   // "F#4"
    pub duration: f64,   // beats, > 0
    pub start_time: f64, // absolute beats, non-decreasing
    pub measure: u32,    // written bar number
}

/// Everything an engine reports about a tune
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineScore {
    pub notes: Vec<NoteEvent>,
    pub key: Option<String>,            // "D", "A minor"
    pub time_signature: Option<String>, // "6/8"
    pub tempo: Option<u32>,             // BPM
}

/// How repeats are laid out on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Repeats and first/second endings played out
    #[default]
    Expanded,
    /// Bars in written order, each once
    Written,
}

/// Reads ABC text into note events plus best-effort metadata.
///
/// A failed read is a [`FiddleError::ParseError`]; a tune with no notes is not
/// an error.
pub trait NotationEngine: Send + Sync {
    fn parse(&self, abc: &str) -> Result<EngineScore, FiddleError>;
}

/// Built-in ABC reader for the common folk-tune subset of the notation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbcEngine {
    repeats: RepeatMode,
}

impl AbcEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repeat_mode(repeats: RepeatMode) -> Self {
        Self { repeats }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_repeat_mode(config.repeats)
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeats
    }
}

impl NotationEngine for AbcEngine {
    fn parse(&self, abc: &str) -> Result<EngineScore, FiddleError> {
        let tune = parser::parse(abc)?;
        let notes = expand::timeline(&tune.bars, self.repeats)?;
        log::debug!(
            "engine read {} bars, {} note events ({:?})",
            tune.bars.len(),
            notes.len(),
            self.repeats
        );

        Ok(EngineScore {
            notes,
            key: tune.header.key.map(|k| k.display_name()),
            time_signature: tune.header.meter.map(|m| m.ratio_string()),
            tempo: tune.header.tempo,
        })
    }
}
