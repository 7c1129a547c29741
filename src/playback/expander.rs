use crate::config::PlaybackConfig;
use crate::tune::{Note, Section};

/// The first recorded note starts after beat 0
pub fn has_leading_pickup(notes: &[Note]) -> bool {
    notes.first().is_some_and(|n| n.start_time > 0.0)
}

/// Earliest start at or after `threshold`, or 0 when no note gets that far
pub fn first_full_beat(notes: &[Note], threshold: f64) -> f64 {
    notes
        .iter()
        .map(|n| n.start_time)
        .filter(|&start| start >= threshold)
        .fold(None, |min: Option<f64>, start| {
            Some(min.map_or(start, |m| m.min(start)))
        })
        .unwrap_or(0.0)
}

/// Expand a section with the default settings
pub fn expand(section: &Section) -> Section {
    expand_with(section, &PlaybackConfig::default())
}

/// Fill `playback_notes` with every pass of the section laid end to end.
///
/// Passes after the first skip the notes before the first full beat when the
/// section opens with a pickup.
pub fn expand_with(section: &Section, config: &PlaybackConfig) -> Section {
    let mut expanded = section.clone();

    if section.repeat <= 1 || section.notes.is_empty() {
        expanded.playback_notes = Some(section.notes.clone());
        return expanded;
    }

    let duration = section.duration();
    let has_pickup = has_leading_pickup(&section.notes);
    let skip = if has_pickup {
        first_full_beat(&section.notes, config.first_full_beat)
    } else {
        0.0
    };

    let mut playback = Vec::with_capacity(section.notes.len() * section.repeat as usize);
    let mut offset = 0.0;

    for pass in 0..section.repeat {
        let skip_beats = if pass > 0 { skip } else { 0.0 };

        for note in &section.notes {
            if note.start_time < skip_beats {
                continue;
            }
            playback.push(Note::new(
                note.pitch.clone(),
                note.duration,
                offset + note.start_time - skip_beats,
            ));
        }

        offset += duration - skip_beats;
    }

    expanded.playback_notes = Some(playback);
    expanded
}

/// Expand every section of a tune
pub fn expand_all(sections: Vec<Section>, config: &PlaybackConfig) -> Vec<Section> {
    sections
        .into_iter()
        .map(|section| expand_with(&section, config))
        .collect()
}
