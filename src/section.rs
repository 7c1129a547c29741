//! # Section Detection
//!
//! Infers the written structure of a tune (A part, B part, ...) straight from
//! the ABC text, independently of the notation engine.
//!
//! ## Strategies
//! Tried in priority order; the first one that yields sections wins:
//! 1. **Part markers** - two or more inline `[P:X]` labels. Each starts a
//!    section of a fixed nominal length.
//! 2. **Repeat markers** - `|: ... :|` structure. Every closing marker ends a
//!    section.
//! 3. **Half split** - no structure found, so the tune is cut in two.
//!
//! Measure numbers are 1-based and count written bars, so a repeated part is
//! counted once.
//!
//! ## Example
//! ```rust
//! use fiddle::section::detect_sections;
//!
//! let abc = "X:1\nK:D\n|:DEFG|ABcd:|\n|:efga|bagf:|\n";
//! let sections = detect_sections(abc);
//! assert_eq!(sections.len(), 2);
//! assert_eq!(sections[0].name, "A");
//! assert_eq!((sections[0].start_measure, sections[0].end_measure), (1, 2));
//! assert_eq!(sections[1].name, "B");
//! assert_eq!((sections[1].start_measure, sections[1].end_measure), (3, 4));
//! ```

use crate::config::SectionConfig;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref HEADER_LINE: Regex = Regex::new(r"^[A-Za-z]:($|[^|:])").unwrap();
    static ref PART_MARKER: Regex = Regex::new(r"\[P:([A-Za-z])\]").unwrap();
    static ref REPEAT_TOKEN: Regex = Regex::new(r":\|\|?:|::|\|\|?:|:\|\|?|\|\||\|").unwrap();
    static ref ANNOTATION: Regex = Regex::new(r#""[^"]*"|![^!]*!"#).unwrap();
    static ref NOTE_OR_REST: Regex = Regex::new(r"[A-Ga-gzxZX]").unwrap();
}

/// A detected section in unexpanded measure numbering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBoundary {
    pub name: String,
    pub start_measure: u32, // 1-based, inclusive
    pub end_measure: u32,   // inclusive
    pub repeat: u32,
    /// The following section opens with pickup notes written after this
    /// section's closing marker
    #[serde(default)]
    pub next_has_pickup: bool,
}

impl SectionBoundary {
    pub fn new(name: impl Into<String>, start_measure: u32, end_measure: u32, repeat: u32) -> Self {
        Self {
            name: name.into(),
            start_measure,
            end_measure,
            repeat,
            next_has_pickup: false,
        }
    }
}

/// Which strategy produced a set of boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStrategy {
    PartMarkers,
    RepeatMarkers,
    /// Low confidence; the split has no musical basis
    HalfSplit,
}

/// Detect sections with the default settings
pub fn detect_sections(abc: &str) -> Vec<SectionBoundary> {
    detect_sections_with(abc, &SectionConfig::default())
}

/// Detect sections with explicit settings
pub fn detect_sections_with(abc: &str, config: &SectionConfig) -> Vec<SectionBoundary> {
    detect_sections_detailed(abc, config).0
}

/// Detect sections and report which strategy was used
pub fn detect_sections_detailed(
    abc: &str,
    config: &SectionConfig,
) -> (Vec<SectionBoundary>, DetectionStrategy) {
    let parts = sections_from_part_markers(abc, config);
    if !parts.is_empty() {
        log::debug!("{} sections from part markers", parts.len());
        return (parts, DetectionStrategy::PartMarkers);
    }

    let music = music_text(abc);

    let repeats = sections_from_repeats(&music, config);
    if !repeats.is_empty() {
        log::debug!("{} sections from repeat markers", repeats.len());
        return (repeats, DetectionStrategy::RepeatMarkers);
    }

    log::debug!("no structure markers found, splitting tune in half");
    (
        sections_from_half_split(&music, config),
        DetectionStrategy::HalfSplit,
    )
}

/// The music lines of a tune joined into one stream.
///
/// Header fields (`T:`, `K:`, ...) and `%` comment lines are dropped; the
/// remaining lines are trimmed and joined with single spaces.
pub fn music_text(abc: &str) -> String {
    abc.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('%') && !HEADER_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordinal section names: A, B, then C1, C2, ...
pub fn section_name(ordinal: usize) -> String {
    match ordinal {
        0 | 1 => "A".to_string(),
        2 => "B".to_string(),
        n => format!("C{}", n - 2),
    }
}

/// Sections from inline `[P:X]` labels.
///
/// Needs at least two labels. Every section gets the nominal part length;
/// the real length of each part is not measured.
pub fn sections_from_part_markers(abc: &str, config: &SectionConfig) -> Vec<SectionBoundary> {
    let names: Vec<&str> = PART_MARKER
        .captures_iter(abc)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if names.len() < 2 {
        return Vec::new();
    }

    let length = config.part_length.max(1);
    let mut sections: Vec<SectionBoundary> = Vec::with_capacity(names.len());
    for name in names {
        let start = sections.last().map_or(1, |s| s.end_measure + 1);
        sections.push(SectionBoundary::new(
            name,
            start,
            start + length - 1,
            config.part_repeat,
        ));
    }
    sections
}

/// Tokens of the music stream for the repeat walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatToken<'a> {
    Start,    // |: or ||:
    End,      // :| or :||
    EndStart, // :|: :||: or ::
    Bar,      // | or ||
    Content(&'a str),
}

fn repeat_tokens(music: &str) -> Vec<RepeatToken<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for m in REPEAT_TOKEN.find_iter(music) {
        let content = music[last..m.start()].trim();
        if !content.is_empty() {
            tokens.push(RepeatToken::Content(content));
        }
        tokens.push(match m.as_str() {
            "|:" | "||:" => RepeatToken::Start,
            ":|" | ":||" => RepeatToken::End,
            ":|:" | ":||:" | "::" => RepeatToken::EndStart,
            _ => RepeatToken::Bar,
        });
        last = m.end();
    }
    let tail = music[last..].trim();
    if !tail.is_empty() {
        tokens.push(RepeatToken::Content(tail));
    }
    tokens
}

/// Whether text between a closing marker and the next barline is a pickup:
/// it must hold a note or rest, and must not be an ending number (`:|2`).
fn is_pickup_content(content: &str) -> bool {
    let stripped = ANNOTATION.replace_all(content, "");
    let stripped = stripped.trim_start();
    let is_ending = stripped.starts_with(|c: char| c.is_ascii_digit())
        || (stripped.starts_with('[') && stripped[1..].starts_with(|c: char| c.is_ascii_digit()));
    !is_ending && NOTE_OR_REST.is_match(stripped)
}

/// Sections from `|: ... :|` structure.
///
/// Walks the barline tokens left to right with a running measure counter.
/// Each closing marker closes `[section start, current measure]`. A `|:`
/// after a closed section does not move the start pointer again, so the
/// sections stay contiguous. Returns nothing when there is no closing marker.
///
/// `next_has_pickup` is only looked for after an end-then-start marker
/// (`:|:`, `:||:`, `::`), where a shared bar can open the next part. Text after
/// a plain `:|` is the tail of the tune or an ending, not a pickup.
pub fn sections_from_repeats(music: &str, config: &SectionConfig) -> Vec<SectionBoundary> {
    let tokens = repeat_tokens(music);
    let mut sections = Vec::new();
    let mut current_measure: u32 = 1;
    let mut section_start: u32 = 1;
    let mut just_ended = false;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            RepeatToken::Start => {
                if !just_ended {
                    section_start = current_measure;
                }
                just_ended = false;
            }
            RepeatToken::End | RepeatToken::EndStart => {
                let next_has_pickup = match (token, tokens.get(i + 1)) {
                    (RepeatToken::EndStart, Some(RepeatToken::Content(content))) => {
                        is_pickup_content(content)
                    }
                    _ => false,
                };
                sections.push(SectionBoundary {
                    name: section_name(sections.len() + 1),
                    start_measure: section_start,
                    end_measure: current_measure,
                    repeat: config.repeat_count,
                    next_has_pickup,
                });
                current_measure += 1;
                section_start = current_measure;
                just_ended = true;
            }
            RepeatToken::Bar => current_measure += 1,
            RepeatToken::Content(_) => {}
        }
    }

    sections
}

/// Last-resort split of the tune into two halves by barline count
pub fn sections_from_half_split(music: &str, config: &SectionConfig) -> Vec<SectionBoundary> {
    let barlines = music.matches('|').count() as u32;
    let total = barlines.max(config.fallback_min_measures);
    let mid = total / 2;

    vec![
        SectionBoundary::new("A", 1, mid, 1),
        SectionBoundary::new("B", mid + 1, total, 1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> SectionConfig {
        SectionConfig::default()
    }

    #[test]
    fn test_section_names() {
        assert_eq!(section_name(1), "A");
        assert_eq!(section_name(2), "B");
        assert_eq!(section_name(3), "C1");
        assert_eq!(section_name(5), "C3");
    }

    #[test]
    fn test_music_text_strips_headers_and_comments() {
        let abc = "X:1\nT:Title\n% a comment\nM:4/4\nK:D\n  DEFG|ABcd|  \n\nA:|efg|\n";
        assert_eq!(music_text(abc), "DEFG|ABcd| A:|efg|");
    }

    #[test]
    fn test_part_markers() {
        let abc = "X:1\nK:G\n[P:A] GABc|d2d2|\n[P:B] g2g2|fedc|\n";
        let (sections, strategy) = detect_sections_detailed(abc, &defaults());
        assert_eq!(strategy, DetectionStrategy::PartMarkers);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], SectionBoundary::new("A", 1, 4, 2));
        assert_eq!(sections[1], SectionBoundary::new("B", 5, 8, 2));
    }

    #[test]
    fn test_single_part_marker_is_ignored() {
        let abc = "K:G\n[P:A] GABc|d2d2:|\n";
        assert!(sections_from_part_markers(abc, &defaults()).is_empty());
        let (_, strategy) = detect_sections_detailed(abc, &defaults());
        assert_eq!(strategy, DetectionStrategy::RepeatMarkers);
    }

    #[test]
    fn test_part_length_is_configurable() {
        let config = SectionConfig {
            part_length: 8,
            ..SectionConfig::default()
        };
        let sections = detect_sections_with("[P:A] A|\n[P:B] B|\n[P:A] A|\n", &config);
        let ranges: Vec<(u32, u32)> = sections
            .iter()
            .map(|s| (s.start_measure, s.end_measure))
            .collect();
        assert_eq!(ranges, vec![(1, 8), (9, 16), (17, 24)]);
        assert_eq!(sections[2].name, "A");
    }

    #[test]
    fn test_two_repeated_parts() {
        let music = "|:DEFG|ABcd|efge|d4:| |:fgaf|gefd|edcB|A4:|";
        let sections = sections_from_repeats(music, &defaults());
        assert_eq!(sections.len(), 2);
        assert_eq!((sections[0].start_measure, sections[0].end_measure), (1, 4));
        assert_eq!((sections[1].start_measure, sections[1].end_measure), (5, 8));
        assert!(sections.iter().all(|s| s.repeat == 2));
        assert!(!sections[0].next_has_pickup);
    }

    #[test]
    fn test_shared_bar_pickup() {
        let music = "|:DEFG|ABcd:|:fg|abag|fedc:|";
        let sections = sections_from_repeats(music, &defaults());
        assert_eq!(sections.len(), 2);
        assert!(sections[0].next_has_pickup);
        assert!(!sections[1].next_has_pickup);
        assert_eq!((sections[1].start_measure, sections[1].end_measure), (3, 5));
    }

    #[test]
    fn test_plain_repeat_end_never_flags_pickup() {
        // Only end-then-start markers open a shared bar
        let music = "|:DEFG|ABcd:|fg|abag|fedc:|";
        let sections = sections_from_repeats(music, &defaults());
        assert_eq!(sections.len(), 2);
        assert!(!sections[0].next_has_pickup);
        assert_eq!(sections[1].start_measure, 3);
    }

    #[test]
    fn test_chord_symbol_alone_is_not_a_pickup() {
        // A bare chord symbol or decoration after `:|:` holds no notes
        let music = "|:DEFG|ABcd:|:\"G\" !segno!|abag|fedc:|";
        let sections = sections_from_repeats(music, &defaults());
        assert!(!sections[0].next_has_pickup);
    }

    #[test]
    fn test_barline_variants_count_like_the_engine() {
        // `||:` starts a repeat, `:||` ends one, `::` does both
        let music = "DEFG||:ABcd:||efga::bagf:|";
        let sections = sections_from_repeats(music, &defaults());
        let ranges: Vec<(u32, u32)> = sections
            .iter()
            .map(|s| (s.start_measure, s.end_measure))
            .collect();
        assert_eq!(ranges, vec![(1, 1), (2, 2), (3, 3)]);
        assert!(sections[1].next_has_pickup);
    }

    #[test]
    fn test_end_start_marker_with_pickup() {
        let music = "|:DEFG|ABcd:|:\"D\"fg|abag|fedc:|";
        let sections = sections_from_repeats(music, &defaults());
        assert_eq!(sections.len(), 2);
        assert!(sections[0].next_has_pickup);
    }

    #[test]
    fn test_ending_number_is_not_a_pickup() {
        let music = "|:GABc|1 d4:|2 g4||";
        let sections = sections_from_repeats(music, &defaults());
        assert_eq!(sections.len(), 1);
        assert!(!sections[0].next_has_pickup);
    }

    #[test]
    fn test_more_than_two_sections() {
        let music = "|:AB:|:cd:|:ef:|:ga:|";
        let names: Vec<String> = sections_from_repeats(music, &defaults())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C1", "C2"]);
    }

    #[test]
    fn test_repeat_sections_are_contiguous() {
        let music = "D|:DEFG|ABcd:|e2f2|g4||:abag|fedc:|";
        let sections = sections_from_repeats(music, &defaults());
        for pair in sections.windows(2) {
            assert_eq!(pair[1].start_measure, pair[0].end_measure + 1);
        }
    }

    #[test]
    fn test_no_closing_marker_falls_through() {
        assert!(sections_from_repeats("|:DEFG|ABcd|", &defaults()).is_empty());
    }

    #[test]
    fn test_half_split_minimum() {
        let sections = detect_sections("ABCDEFGH");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], SectionBoundary::new("A", 1, 4, 1));
        assert_eq!(sections[1], SectionBoundary::new("B", 5, 8, 1));
    }

    #[test]
    fn test_half_split_counts_barlines() {
        let music = "A|B|c|d|e|f|g|a|b|c'|";
        let sections = sections_from_half_split(music, &defaults());
        assert_eq!(sections[0].end_measure, 5);
        assert_eq!(sections[1].start_measure, 6);
        assert_eq!(sections[1].end_measure, 10);
    }

    #[test]
    fn test_empty_input() {
        let (sections, strategy) = detect_sections_detailed("", &defaults());
        assert_eq!(strategy, DetectionStrategy::HalfSplit);
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|s| s.end_measure >= s.start_measure));
    }
}
