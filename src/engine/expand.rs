//! Repeat expansion and timing.
//!
//! Walks the written bars in play order and lays their notes out on a single
//! absolute timeline. Durations are summed as exact rationals and only turned
//! into `f64` beats when an event is emitted.

use super::ast::{checked_add, Bar, Element};
use super::{NoteEvent, RepeatMode};
use crate::error::FiddleError;
use num_rational::Rational64;

/// Build the sequence of bar indices in the order they are played.
///
/// In [`RepeatMode::Expanded`] repeated passages are played twice:
/// - `|:` marks where a repeat returns to; a `:|` with no `|:` before it
///   returns to the start of the tune or to the bar after the previous repeat
/// - bars marked as first ending are only played on the first pass, second
///   ending bars only on the second
/// - a bar without an ending after the second-ending bars closes the repeat
fn play_order(bars: &[Bar], mode: RepeatMode) -> Vec<usize> {
    if mode == RepeatMode::Written {
        return (0..bars.len()).collect();
    }

    let mut order = Vec::new();
    let mut pass: u8 = 1;
    let mut start = 0;
    let mut jump_from: Option<usize> = None;
    let mut i = 0;

    while i < bars.len() {
        let bar = &bars[i];

        // Past the repeated region on the second pass: back to normal playing
        if pass == 2 && bar.ending.is_none() && jump_from.is_some_and(|j| i > j) {
            pass = 1;
            start = i;
            jump_from = None;
        }

        if pass == 1 && bar.repeat_start {
            start = i;
        }

        // Endings beyond the second are played on the last pass
        if let Some(ending) = bar.ending {
            if ending.min(2) != pass {
                i += 1;
                continue;
            }
        }

        order.push(i);

        if bar.repeat_end {
            if pass == 1 {
                pass = 2;
                jump_from = Some(i);
                i = start;
                continue;
            }
            pass = 1;
            start = i + 1;
            jump_from = None;
        }
        i += 1;
    }

    order
}

fn to_beats(value: Rational64) -> f64 {
    *value.numer() as f64 / *value.denom() as f64
}

/// Lay the bars out as note events in play order.
///
/// Rests advance time but produce no event. Every event keeps the written
/// measure number of its bar, so a repeated bar shows up under the same
/// number more than once.
///
/// Fails with a [`FiddleError::ParseError`] at the offending bar when the
/// played-out time no longer fits an exact 64-bit fraction.
pub fn timeline(bars: &[Bar], mode: RepeatMode) -> Result<Vec<NoteEvent>, FiddleError> {
    let mut events = Vec::new();
    let mut offset = Rational64::from_integer(0);

    for index in play_order(bars, mode) {
        let bar = &bars[index];
        for element in &bar.elements {
            if let Element::Note { pitch, duration } = element {
                events.push(NoteEvent {
                    pitch: pitch.to_string(),
                    duration: to_beats(*duration),
                    start_time: to_beats(offset),
                    measure: bar.number,
                });
            }
            offset = checked_add(offset, element.duration()).ok_or_else(|| {
                FiddleError::ParseError {
                    line: bar.line,
                    column: bar.column,
                    message: "Note lengths too fine or too long to time exactly".to_string(),
                }
            })?;
        }
    }

    Ok(events)
}
