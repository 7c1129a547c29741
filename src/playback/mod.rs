//! # Playback Module
//!
//! Unroll section repeats into a flat note list for playback and highlighting.
//!
//! ## Purpose
//! A section with `repeat: 2` is written once but played twice. This module
//! builds `playback_notes`, the notes of every pass laid end to end, so that a
//! player never has to interpret repeat logic itself.
//!
//! ## Pickup Splicing
//! When a section's first note starts after beat 0, the front of the section
//! is treated as a pickup. The pickup is played on the first pass only: later
//! passes start at the first full beat, and their timing is pulled back by
//! the skipped amount so there is no gap.
//!
//! This check is independent of the section detector's
//! `next_has_pickup` flag, and its threshold is set through
//! [`PlaybackConfig::first_full_beat`](crate::config::PlaybackConfig).
//!
//! ## Example
//! ```rust
//! use fiddle::playback::expand;
//! use fiddle::{Note, Section};
//!
//! let section = Section::new(
//!     "A",
//!     1,
//!     1,
//!     vec![Note::new("D4", 1.0, 0.0), Note::new("E4", 1.0, 1.0)],
//!     2,
//! );
//! let expanded = expand(&section);
//! let playback = expanded.playback_notes.unwrap();
//!
//! assert_eq!(playback.len(), 4);
//! assert_eq!(playback[2].start_time, 2.0);
//! ```

mod expander;

#[cfg(test)]
mod tests;

pub use expander::{expand, expand_all, expand_with, first_full_beat, has_leading_pickup};
