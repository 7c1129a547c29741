//! # Note-to-Section Assignment
//!
//! Reconciles two views of the same tune:
//! - the engine's **expanded** timeline, where repeats are played out and
//!   a repeated bar shows up under its measure number more than once
//! - the detector's **unexpanded** section boundaries, which count each
//!   written bar once
//!
//! ## Steps
//! 1. Build a [`Timeline`]: the earliest start beat of every measure number,
//!    the total length, and whether the tune opens with a pickup bar.
//! 2. Turn every boundary between sections into a cut beat ([`beat_ranges`]).
//! 3. Hand each note to the section whose half-open beat range holds its start
//!    time, then make times section-relative.
//!
//! ## Measure offset
//! The engine counts written measures the way the detector does (every
//! barline but `|:` starts a new one) but starts from
//! [`FIRST_MEASURE`](crate::engine::FIRST_MEASURE) instead of 1. Boundary
//! measure N is therefore engine measure `N + measure_offset`, whether or not
//! the tune opens with a pickup bar.
//!
//! ## Pickups between sections
//! When a section is flagged `next_has_pickup`, the bar written right after
//! its closing marker holds the next section's pickup. The cut is placed at
//! that bar, so the pickup opens the next section instead of trailing this one.

use crate::engine::{NoteEvent, FIRST_MEASURE};
use crate::section::SectionBoundary;
use crate::tune::{Note, Section};
use std::collections::BTreeMap;

/// Quarter-note beats in one bar of `N/D`; 4.0 when the signature does not parse
pub fn beats_per_measure(time_signature: &str) -> f64 {
    let parsed = time_signature.split_once('/').and_then(|(num, den)| {
        let num = num.trim().parse::<f64>().ok()?;
        let den = den.trim().parse::<f64>().ok()?;
        (den > 0.0).then(|| num * 4.0 / den)
    });
    parsed.unwrap_or(4.0)
}

/// Measure lookup over the expanded note timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// Earliest start beat of each measure number across all its occurrences
    pub measure_starts: BTreeMap<u32, f64>,
    /// End of the last sounding note
    pub total_beats: f64,
    /// The tune opens with a bar shorter than a full measure
    pub has_pickup: bool,
    /// Add to a boundary measure number to get the engine's number
    pub measure_offset: i64,
}

impl Timeline {
    pub fn build(notes: &[NoteEvent], time_signature: &str) -> Self {
        let mut measure_starts: BTreeMap<u32, f64> = BTreeMap::new();
        for note in notes {
            measure_starts
                .entry(note.measure)
                .and_modify(|start| *start = start.min(note.start_time))
                .or_insert(note.start_time);
        }

        let total_beats = notes
            .iter()
            .map(|n| n.start_time + n.duration)
            .fold(0.0, f64::max);

        let has_pickup = match (measure_starts.get(&0), measure_starts.get(&1)) {
            (Some(first), Some(second)) => second - first < beats_per_measure(time_signature),
            _ => false,
        };

        Self {
            measure_starts,
            total_beats,
            has_pickup,
            measure_offset: FIRST_MEASURE as i64 - 1,
        }
    }

    /// Engine measure holding the written content of a boundary measure
    pub fn engine_measure(&self, boundary_measure: u32) -> i64 {
        boundary_measure as i64 + self.measure_offset
    }

    /// Start beat of an engine measure, if any note sounds in it
    pub fn measure_start(&self, measure: i64) -> Option<f64> {
        let measure = u32::try_from(measure).ok()?;
        self.measure_starts.get(&measure).copied()
    }

    /// Start of the first measure in `order` that has a note
    fn first_sounding(&self, order: [i64; 3]) -> Option<f64> {
        order.into_iter().find_map(|m| self.measure_start(m))
    }
}

/// Half-open beat range `[start, end)` owned by one section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatRange {
    pub start: f64,
    pub end: f64,
    /// The end was estimated by dividing the tune evenly
    pub approximate: bool,
}

impl BeatRange {
    pub fn contains(&self, beat: f64) -> bool {
        self.start <= beat && beat < self.end
    }
}

/// Beat ranges for each boundary, contiguous from 0 to the end of the tune.
///
/// A cut that would land before the previous one is clamped to it, so a
/// range can be empty but never overlaps its neighbour.
pub fn beat_ranges(timeline: &Timeline, boundaries: &[SectionBoundary]) -> Vec<BeatRange> {
    let count = boundaries.len();
    let mut ranges: Vec<BeatRange> = Vec::with_capacity(count);

    for (i, boundary) in boundaries.iter().enumerate() {
        let start = ranges.last().map_or(0.0, |r| r.end);

        let (end, approximate) = match boundaries.get(i + 1) {
            None => (timeline.total_beats, false),
            Some(next) => {
                let first = timeline.engine_measure(next.start_measure);
                let order = if boundary.next_has_pickup {
                    // The next section's first written bar is its pickup and
                    // its first full bar follows. A silent pickup bar cuts at
                    // the full bar rather than inside this section.
                    [first, first + 1, first - 1]
                } else {
                    [first, first - 1, first + 1]
                };
                match timeline.first_sounding(order) {
                    Some(beat) => (beat, false),
                    None => {
                        let estimate = timeline.total_beats * (i + 1) as f64 / count as f64;
                        log::warn!(
                            "no notes near measure {} for section {}, estimating cut at beat {}",
                            first,
                            boundary.name,
                            estimate
                        );
                        (estimate, true)
                    }
                }
            }
        };

        ranges.push(BeatRange {
            start,
            end: end.max(start),
            approximate,
        });
    }

    ranges
}

/// Assign notes to sections with section-relative timing.
///
/// Every note lands in exactly one section. `playback_notes` is left empty.
pub fn assign(
    notes: &[NoteEvent],
    boundaries: &[SectionBoundary],
    time_signature: &str,
) -> Vec<Section> {
    if boundaries.is_empty() {
        let end_measure = notes.iter().map(|n| n.measure).max().unwrap_or(1);
        let notes = notes
            .iter()
            .map(|n| Note::new(n.pitch.clone(), n.duration, n.start_time))
            .collect();
        return vec![Section::new("Full", 1, end_measure, notes, 1)];
    }

    if notes.is_empty() {
        return boundaries
            .iter()
            .map(|b| Section::new(b.name.clone(), b.start_measure, b.end_measure, vec![], b.repeat))
            .collect();
    }

    let mut sorted: Vec<&NoteEvent> = notes.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let timeline = Timeline::build(notes, time_signature);
    let ranges = beat_ranges(&timeline, boundaries);
    log::debug!(
        "{} measures over {} beats, tune pickup: {}",
        timeline.measure_starts.len(),
        timeline.total_beats,
        timeline.has_pickup
    );

    let mut buckets: Vec<Vec<&NoteEvent>> = vec![Vec::new(); boundaries.len()];
    let last = boundaries.len() - 1;
    for note in sorted {
        let index = ranges
            .iter()
            .position(|r| note.start_time < r.end)
            .unwrap_or(last);
        buckets[index].push(note);
    }

    boundaries
        .iter()
        .zip(buckets)
        .map(|(boundary, bucket)| {
            let origin = bucket
                .iter()
                .map(|n| n.start_time)
                .fold(f64::INFINITY, f64::min);
            let notes = bucket
                .into_iter()
                .map(|n| Note::new(n.pitch.clone(), n.duration, n.start_time - origin))
                .collect();
            Section::new(
                boundary.name.clone(),
                boundary.start_measure,
                boundary.end_measure,
                notes,
                boundary.repeat,
            )
        })
        .collect()
}
