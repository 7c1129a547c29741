use super::*;
use crate::config::PlaybackConfig;
use crate::tune::{Note, Section};

fn starts(notes: &[Note]) -> Vec<f64> {
    notes.iter().map(|n| n.start_time).collect()
}

#[test]
fn test_playback_single_pass_is_identity() {
    let section = Section::new("A", 1, 1, vec![Note::new("D4", 1.0, 0.0)], 1);
    let expanded = expand(&section);
    assert_eq!(expanded.playback_notes, Some(section.notes.clone()));
    assert_eq!(expanded.notes, section.notes);
}

#[test]
fn test_playback_empty_section() {
    let section = Section::new("B", 5, 8, vec![], 2);
    let expanded = expand(&section);
    assert_eq!(expanded.playback_notes, Some(vec![]));
}

#[test]
fn test_playback_repeat_without_pickup() {
    let section = Section::new(
        "A",
        1,
        1,
        vec![
            Note::new("D4", 1.0, 0.0),
            Note::new("F#4", 1.0, 1.0),
            Note::new("A4", 2.0, 2.0),
        ],
        2,
    );
    let playback = expand(&section).playback_notes.unwrap();

    assert_eq!(playback.len(), 6);
    assert_eq!(starts(&playback), vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0]);
    assert_eq!(playback[3].pitch, "D4");
}

#[test]
fn test_playback_repeat_skips_pickup() {
    // Pickup at 0.5, full beat at 1.0, section lasts 2 beats
    let section = Section::new(
        "A",
        1,
        1,
        vec![Note::new("C#5", 0.5, 0.5), Note::new("D5", 1.0, 1.0)],
        2,
    );
    let playback = expand(&section).playback_notes.unwrap();

    // Second pass drops the pickup and is pulled back by the skipped beat
    assert_eq!(playback.len(), 3);
    assert_eq!(playback[2].pitch, "D5");
    assert_eq!(starts(&playback), vec![0.5, 1.0, 2.0]);
}

#[test]
fn test_playback_three_passes_with_pickup() {
    let section = Section::new(
        "A",
        1,
        1,
        vec![
            Note::new("A4", 1.0, 1.0),
            Note::new("D5", 1.0, 2.0),
            Note::new("E5", 1.0, 3.0),
        ],
        3,
    );
    let playback = expand(&section).playback_notes.unwrap();

    // skip = 1.0 (first start >= 1.0); duration = 4.0
    assert_eq!(playback.len(), 9);
    assert_eq!(starts(&playback)[3..6], [4.0, 5.0, 6.0]);
    assert_eq!(starts(&playback)[6..9], [7.0, 8.0, 9.0]);
}

#[test]
fn test_playback_pickup_threshold_is_configurable() {
    let section = Section::new(
        "A",
        1,
        1,
        vec![
            Note::new("A4", 0.5, 0.5),
            Note::new("B4", 0.5, 1.0),
            Note::new("D5", 1.0, 1.5),
        ],
        2,
    );
    let config = PlaybackConfig {
        first_full_beat: 1.5,
    };
    let playback = expand_with(&section, &config).playback_notes.unwrap();

    assert_eq!(playback.len(), 4);
    assert_eq!(playback[3].pitch, "D5");
    // offset after first pass = 2.5; 2.5 + 1.5 - 1.5
    assert_eq!(playback[3].start_time, 2.5);
}

#[test]
fn test_playback_is_pure() {
    let section = Section::new(
        "A",
        1,
        2,
        vec![Note::new("G4", 0.5, 0.5), Note::new("B4", 1.5, 1.0)],
        2,
    );
    assert_eq!(expand(&section), expand(&section));
    assert!(section.playback_notes.is_none());
}

#[test]
fn test_first_full_beat() {
    let notes = vec![
        Note::new("A4", 0.5, 0.5),
        Note::new("B4", 0.5, 1.5),
        Note::new("C5", 0.5, 1.0),
    ];
    assert_eq!(first_full_beat(&notes, 1.0), 1.0);
    assert_eq!(first_full_beat(&notes, 2.0), 0.0);
}

#[test]
fn test_has_leading_pickup() {
    assert!(!has_leading_pickup(&[]));
    assert!(!has_leading_pickup(&[Note::new("D4", 1.0, 0.0)]));
    assert!(has_leading_pickup(&[Note::new("D4", 1.0, 0.25)]));
}

#[test]
fn test_expand_all() {
    let sections = vec![
        Section::new("A", 1, 1, vec![Note::new("D4", 1.0, 0.0)], 2),
        Section::new("B", 2, 2, vec![Note::new("E4", 1.0, 0.0)], 1),
    ];
    let expanded = expand_all(sections, &PlaybackConfig::default());
    assert_eq!(expanded[0].playback_notes.as_ref().unwrap().len(), 2);
    assert_eq!(expanded[1].playback_notes.as_ref().unwrap().len(), 1);
}
