//! # Parser Module
//!
//! Turns the lexer's token stream into a flat list of bars.
//!
//! ## Purpose
//! The parser is the second stage of the engine. It resolves everything that
//! depends on context so later stages only see plain pitches and exact
//! durations:
//! - header and inline fields (`T:`, `M:`, `L:`, `K:`, `Q:`)
//! - key signature and bar-scoped accidentals
//! - note lengths against the unit note length (`L:` or the ABC default)
//! - broken rhythm (`>`, `<`), tuplets (`(3`, `(3:2:3`) and chords
//! - measure rests (`Z4`)
//! - barlines, repeat marks and first/second endings
//!
//! Bars keep their written order; playing repeats out happens in `expand`.
//!
//! Every duration is checked as it is built: a note length too fine or too
//! long to time exactly is a located parse error, never an overflow.
//!
//! ## Example
//! ```rust
//! use fiddle::engine::parser::parse;
//!
//! let tune = parse("X:1\nT:Example\nM:4/4\nL:1/8\nK:D\n|:DEFG A2d2:|\n").unwrap();
//! assert_eq!(tune.header.title, Some("Example".to_string()));
//! assert_eq!(tune.bars.len(), 1);
//! assert!(tune.bars[0].repeat_start);
//! assert!(tune.bars[0].repeat_end);
//! assert_eq!(tune.bars[0].elements.len(), 6);
//! ```

use crate::engine::ast::*;
use crate::engine::lexer::{Barline, Lexer, LocatedToken, Token};
use crate::engine::FIRST_MEASURE;
use crate::error::FiddleError;
use num_rational::Rational64;
use std::collections::HashMap;

/// Remaining notes of an open tuplet
struct TupletContext {
    ratio: Rational64,
    remaining: u32,
}

/// Parser state
pub struct Parser {
    tokens: Vec<LocatedToken>,
    position: usize,
    header: TuneHeader,
    key: KeySignature,
    meter: Option<Meter>,
    unit_length: Option<Rational64>,
    bars: Vec<Bar>,
    elements: Vec<Element>,
    measure: u32,
    bar_location: (usize, usize),
    elapsed: Rational64,
    pending_repeat_start: bool,
    current_ending: Option<u8>,
    bar_accidentals: HashMap<(NoteName, i32), i8>,
    broken_next: Option<Rational64>,
    tuplet: Option<TupletContext>,
}

impl Parser {
    pub fn new(tokens: Vec<LocatedToken>) -> Self {
        Self {
            tokens,
            position: 0,
            header: TuneHeader::default(),
            key: KeySignature::default(),
            meter: None,
            unit_length: None,
            bars: Vec::new(),
            elements: Vec::new(),
            measure: FIRST_MEASURE,
            bar_location: (1, 1),
            elapsed: Rational64::from_integer(0),
            pending_repeat_start: false,
            current_ending: None,
            bar_accidentals: HashMap::new(),
            broken_next: None,
            tuplet: None,
        }
    }

    fn current(&self) -> Option<&LocatedToken> {
        self.tokens.get(self.position)
    }

    fn current_token(&self) -> Option<Token> {
        self.current().map(|t| t.token.clone())
    }

    fn advance(&mut self) -> Option<&LocatedToken> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    /// Location of the current token, or of the last one at end of input
    fn location(&self) -> (usize, usize) {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1))
    }

    fn error_here(&self, message: impl Into<String>) -> FiddleError {
        let (line, column) = self.location();
        FiddleError::ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn overflow_error(&self) -> FiddleError {
        self.error_here("Note length out of range")
    }

    /// Remember where the open bar starts
    fn mark_bar_start(&mut self) {
        if self.elements.is_empty() {
            self.bar_location = self.location();
        }
    }

    /// Parse all tokens into bars
    pub fn parse_tune(mut self) -> Result<ParsedTune, FiddleError> {
        while let Some(token) = self.current_token() {
            if matches!(
                token,
                Token::Note(_)
                    | Token::Sharp
                    | Token::DoubleSharp
                    | Token::Flat
                    | Token::DoubleFlat
                    | Token::Natural
                    | Token::Rest
                    | Token::MeasureRest
                    | Token::ChordStart
            ) {
                self.mark_bar_start();
            }
            match token {
                Token::Field(name, value) => {
                    self.advance();
                    self.apply_field(name, &value);
                }
                Token::Note(_)
                | Token::Sharp
                | Token::DoubleSharp
                | Token::Flat
                | Token::DoubleFlat
                | Token::Natural => {
                    let note = self.parse_note()?;
                    self.push_element(note)?;
                }
                Token::Rest => {
                    self.advance();
                    let length = self.parse_length()?;
                    let duration = self.beats(length)?;
                    self.push_element(Element::Rest { duration })?;
                }
                Token::MeasureRest => {
                    self.advance();
                    let count = match self.current_token() {
                        Some(Token::Number(n)) => {
                            self.advance();
                            n.max(1)
                        }
                        _ => 1,
                    };
                    self.push_measure_rests(count)?;
                }
                Token::ChordStart => {
                    let chord = self.parse_chord()?;
                    self.push_element(chord)?;
                }
                Token::BrokenRight(n) => {
                    self.advance();
                    self.apply_broken_rhythm(n, true)?;
                }
                Token::BrokenLeft(n) => {
                    self.advance();
                    self.apply_broken_rhythm(n, false)?;
                }
                Token::Tuplet { p, q, r } => {
                    self.start_tuplet(p, q, r)?;
                    self.advance();
                }
                Token::Barline(barline) => {
                    self.advance();
                    self.close_bar(Some(barline))?;
                }
                Token::Ending(n) => {
                    self.advance();
                    self.current_ending = Some(n);
                }
                // Ties keep both notes; slurs are phrasing only
                Token::Tie
                | Token::SlurStart
                | Token::SlurEnd
                | Token::Whitespace
                | Token::Newline => {
                    self.advance();
                }
                Token::ChordEnd => return Err(self.error_here("Unexpected ']' outside a chord")),
                Token::Number(_) | Token::Slash => {
                    return Err(self.error_here("Note length without a note"))
                }
                Token::OctaveUp | Token::OctaveDown => {
                    return Err(self.error_here("Octave mark without a note"))
                }
            }
        }

        self.close_bar(None)?;

        Ok(ParsedTune {
            header: self.header,
            bars: self.bars,
        })
    }

    /// Header fields are first-wins for metadata; every field also updates the
    /// running state used for the notes that follow it.
    fn apply_field(&mut self, name: char, value: &str) {
        match name {
            'T' => {
                if self.header.title.is_none() && !value.is_empty() {
                    self.header.title = Some(value.to_string());
                }
            }
            'M' => {
                self.meter = Meter::parse(value);
                if self.header.meter.is_none() {
                    self.header.meter = self.meter;
                }
            }
            'L' => {
                if let Some(length) = parse_unit_length(value) {
                    self.unit_length = Some(length);
                    self.header.unit_length.get_or_insert(length);
                }
            }
            'K' => {
                if let Some(key) = KeySignature::parse(value) {
                    self.key = key;
                    self.header.key.get_or_insert(key);
                }
            }
            'Q' => {
                if self.header.tempo.is_none() {
                    self.header.tempo = parse_tempo(value);
                }
            }
            _ => {}
        }
    }

    /// Unit note length as a fraction of a whole note
    fn unit_length(&self) -> Rational64 {
        self.unit_length
            .unwrap_or_else(|| self.meter.unwrap_or_default().default_unit_length())
    }

    /// Convert a length multiplier into quarter-note beats
    fn beats(&self, multiplier: Rational64) -> Result<Rational64, FiddleError> {
        checked_mul(self.unit_length(), multiplier)
            .and_then(|whole| checked_mul(whole, Rational64::from_integer(4)))
            .ok_or_else(|| self.overflow_error())
    }

    /// Parse an optional length suffix: `2`, `/`, `//`, `3/2`, `/4`
    fn parse_length(&mut self) -> Result<Rational64, FiddleError> {
        let mut numerator: i64 = 1;
        if let Some(Token::Number(n)) = self.current_token() {
            if n == 0 {
                return Err(self.error_here("Note length must be positive"));
            }
            numerator = n as i64;
            self.advance();
        }

        let mut denominator: i64 = 1;
        while let Some(Token::Slash) = self.current_token() {
            self.advance();
            match self.current_token() {
                Some(Token::Number(n)) => {
                    if n == 0 {
                        return Err(self.error_here("Note length must be positive"));
                    }
                    denominator = denominator
                        .checked_mul(n as i64)
                        .ok_or_else(|| self.overflow_error())?;
                    self.advance();
                }
                _ => {
                    denominator = denominator
                        .checked_mul(2)
                        .ok_or_else(|| self.overflow_error())?
                }
            }
        }

        Ok(Rational64::new(numerator, denominator))
    }

    /// Parse accidental, letter, octave marks and length
    fn parse_note(&mut self) -> Result<Element, FiddleError> {
        let accidental = match self.current_token() {
            Some(Token::Sharp) => Some(Accidental::Sharp),
            Some(Token::DoubleSharp) => Some(Accidental::DoubleSharp),
            Some(Token::Flat) => Some(Accidental::Flat),
            Some(Token::DoubleFlat) => Some(Accidental::DoubleFlat),
            Some(Token::Natural) => Some(Accidental::Natural),
            _ => None,
        };
        if accidental.is_some() {
            self.advance();
        }

        let letter = match self.current_token() {
            Some(Token::Note(c)) => c,
            _ => return Err(self.error_here("Expected a note after accidental")),
        };
        let name = NoteName::from_char(letter)
            .ok_or_else(|| self.error_here(format!("Invalid note letter '{}'", letter)))?;
        self.advance();

        let mut octave = if letter.is_ascii_uppercase() { 4 } else { 5 };
        loop {
            match self.current_token() {
                Some(Token::OctaveUp) => octave += 1,
                Some(Token::OctaveDown) => octave -= 1,
                _ => break,
            }
            self.advance();
        }

        // An explicit accidental holds for the same pitch until the next barline
        let alter = match accidental {
            Some(accidental) => {
                let alter = accidental.alter();
                self.bar_accidentals.insert((name, octave), alter);
                alter
            }
            None => match self.bar_accidentals.get(&(name, octave)) {
                Some(&alter) => alter,
                None => self.key.accidental_for_note(name),
            },
        };

        let length = self.parse_length()?;
        Ok(Element::Note {
            pitch: Pitch {
                name,
                alter,
                octave,
            },
            duration: self.beats(length)?,
        })
    }

    /// `[CEG]2`: the first note is the melody note, the chord length multiplies it
    fn parse_chord(&mut self) -> Result<Element, FiddleError> {
        let (line, column) = self.location();
        self.advance(); // [

        let mut melody: Option<Element> = None;
        loop {
            match self.current_token() {
                Some(Token::ChordEnd) => {
                    self.advance();
                    break;
                }
                Some(Token::Note(_))
                | Some(Token::Sharp)
                | Some(Token::DoubleSharp)
                | Some(Token::Flat)
                | Some(Token::DoubleFlat)
                | Some(Token::Natural) => {
                    let note = self.parse_note()?;
                    melody.get_or_insert(note);
                }
                Some(Token::Tie) | Some(Token::Whitespace) => {
                    self.advance();
                }
                _ => {
                    return Err(FiddleError::ParseError {
                        line,
                        column,
                        message: "Unterminated chord".to_string(),
                    })
                }
            }
        }

        let length = self.parse_length()?;
        let mut chord = melody.ok_or(FiddleError::ParseError {
            line,
            column,
            message: "Empty chord".to_string(),
        })?;
        chord
            .scale_duration(length)
            .ok_or_else(|| self.overflow_error())?;
        Ok(chord)
    }

    /// Add an element to the open bar, applying pending broken rhythm and tuplets
    fn push_element(&mut self, mut element: Element) -> Result<(), FiddleError> {
        if let Some(factor) = self.broken_next.take() {
            element
                .scale_duration(factor)
                .ok_or_else(|| self.overflow_error())?;
        }
        if let Some(ratio) = self.tuplet.as_ref().map(|t| t.ratio) {
            element
                .scale_duration(ratio)
                .ok_or_else(|| self.overflow_error())?;
            if let Some(tuplet) = self.tuplet.as_mut() {
                tuplet.remaining -= 1;
                if tuplet.remaining == 0 {
                    self.tuplet = None;
                }
            }
        }
        self.elements.push(element);
        Ok(())
    }

    /// `>` lengthens the previous element and shortens the next; `<` the reverse
    fn apply_broken_rhythm(&mut self, count: u8, dotted_first: bool) -> Result<(), FiddleError> {
        let short = Rational64::new(1, 1i64 << count.clamp(1, 3));
        let long = Rational64::from_integer(2) - short;
        let (previous, next) = if dotted_first {
            (long, short)
        } else {
            (short, long)
        };
        let scaled = match self.elements.last_mut() {
            Some(last) => last.scale_duration(previous).is_some(),
            None => return Ok(()),
        };
        if !scaled {
            return Err(self.overflow_error());
        }
        self.broken_next = Some(next);
        Ok(())
    }

    fn start_tuplet(&mut self, p: u32, q: Option<u32>, r: Option<u32>) -> Result<(), FiddleError> {
        if p < 2 {
            return Err(self.error_here(format!("Invalid tuplet ({}", p)));
        }
        let compound = self.meter.is_some_and(|m| m.is_compound());
        let q = q.unwrap_or(match p {
            3 | 6 => 2,
            2 | 4 | 8 => 3,
            _ if compound => 3,
            _ => 2,
        });
        if q == 0 {
            return Err(self.error_here("Invalid tuplet ratio"));
        }
        let remaining = r.unwrap_or(p);
        self.tuplet = (remaining > 0).then(|| TupletContext {
            ratio: Rational64::new(q as i64, p as i64),
            remaining,
        });
        Ok(())
    }

    /// `Z4`: four bars of rest, each a full bar of the current meter.
    ///
    /// The rest bars are written once, so they share one measure number.
    fn push_measure_rests(&mut self, count: u32) -> Result<(), FiddleError> {
        let bar_length = self.meter.unwrap_or_default().bar_length();
        for i in 0..count {
            if i > 0 {
                self.store_bar(false)?;
            }
            self.elements.push(Element::Rest {
                duration: bar_length,
            });
        }
        Ok(())
    }

    /// Move the open elements into a new bar.
    ///
    /// Bars left empty by adjacent barlines (`:||:`, `| |`, a leading `|:`) are
    /// folded away: a repeat end moves to the previous bar, a repeat start
    /// waits for the next bar with content.
    ///
    /// The running total of written time must leave room for every bar to be
    /// played twice, so that playing repeats out can always be timed exactly.
    fn store_bar(&mut self, ends_repeat: bool) -> Result<(), FiddleError> {
        let elements = std::mem::take(&mut self.elements);
        let (line, column) = self.bar_location;

        let mut elapsed = self.elapsed;
        for element in &elements {
            elapsed = checked_add(elapsed, element.duration())
                .filter(|&total| checked_add(total, total).is_some())
                .ok_or_else(|| FiddleError::ParseError {
                    line,
                    column,
                    message: "Note lengths too fine or too long to time exactly".to_string(),
                })?;
        }
        self.elapsed = elapsed;

        if !elements.is_empty() {
            self.bars.push(Bar {
                number: self.measure,
                elements,
                repeat_start: self.pending_repeat_start,
                repeat_end: ends_repeat,
                ending: self.current_ending,
                line,
                column,
            });
            self.pending_repeat_start = false;
        } else if ends_repeat {
            if let Some(previous) = self.bars.last_mut() {
                previous.repeat_end = true;
            }
        }
        Ok(())
    }

    /// Finish the open bar at a barline (or at end of input)
    fn close_bar(&mut self, barline: Option<Barline>) -> Result<(), FiddleError> {
        self.store_bar(barline.is_some_and(|b| b.ends_repeat()))?;

        if let Some(barline) = barline {
            if barline.advances_measure() {
                self.measure += 1;
            }
            if barline.starts_repeat() {
                self.pending_repeat_start = true;
            }
            if barline.closes_ending() {
                self.current_ending = None;
            }
        }
        self.bar_accidentals.clear();
        Ok(())
    }
}

/// Lex and parse ABC text into bars
pub fn parse(source: &str) -> Result<ParsedTune, FiddleError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize()?;
    Parser::new(tokens).parse_tune()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats(element: &Element) -> f64 {
        let d = element.duration();
        *d.numer() as f64 / *d.denom() as f64
    }

    fn pitches(bar: &Bar) -> Vec<String> {
        bar.elements
            .iter()
            .filter_map(|e| match e {
                Element::Note { pitch, .. } => Some(pitch.to_string()),
                Element::Rest { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_header() {
        let tune = parse("X:1\nT:Drowsy Maggie\nT:alt title\nM:4/4\nL:1/8\nQ:1/4=180\nK:Edor\nE2BE dEBE|\n")
            .unwrap();
        assert_eq!(tune.header.title, Some("Drowsy Maggie".to_string()));
        assert_eq!(tune.header.meter.unwrap().ratio_string(), "4/4");
        assert_eq!(tune.header.tempo, Some(180));
        assert_eq!(tune.header.key.unwrap().display_name(), "E");
    }

    #[test]
    fn test_key_signature_applies() {
        let tune = parse("K:D\nDEFG ABcd|\n").unwrap();
        assert_eq!(
            pitches(&tune.bars[0]),
            vec!["D4", "E4", "F#4", "G4", "A4", "B4", "C#5", "D5"]
        );
    }

    #[test]
    fn test_bar_accidentals_reset_at_barline() {
        let tune = parse("K:C\n^F F =F F | F2 _B,2|\n").unwrap();
        assert_eq!(pitches(&tune.bars[0]), vec!["F#4", "F#4", "F4", "F4"]);
        assert_eq!(pitches(&tune.bars[1]), vec!["F4", "Bb3"]);
    }

    #[test]
    fn test_octaves() {
        let tune = parse("K:C\nC, C c c'|\n").unwrap();
        assert_eq!(pitches(&tune.bars[0]), vec!["C3", "C4", "C5", "C6"]);
    }

    #[test]
    fn test_lengths_with_unit_eighth() {
        let tune = parse("M:4/4\nL:1/8\nK:C\nA A2 A/ A3/2 A// A/4|\n").unwrap();
        let lengths: Vec<f64> = tune.bars[0].elements.iter().map(beats).collect();
        assert_eq!(lengths, vec![0.5, 1.0, 0.25, 0.75, 0.125, 0.125]);
    }

    #[test]
    fn test_default_unit_length_follows_meter() {
        let reel = parse("M:4/4\nK:D\nA|\n").unwrap();
        assert_eq!(beats(&reel.bars[0].elements[0]), 0.5);

        let polka = parse("M:2/4\nK:D\nA|\n").unwrap();
        assert_eq!(beats(&polka.bars[0].elements[0]), 0.25);
    }

    #[test]
    fn test_broken_rhythm() {
        let tune = parse("L:1/8\nK:C\nA>B c<d e>>f|\n").unwrap();
        let lengths: Vec<f64> = tune.bars[0].elements.iter().map(beats).collect();
        assert_eq!(lengths, vec![0.75, 0.25, 0.25, 0.75, 0.875, 0.125]);
    }

    #[test]
    fn test_triplet() {
        let tune = parse("L:1/8\nK:C\n(3ABc d|\n").unwrap();
        let lengths: Vec<f64> = tune.bars[0].elements.iter().map(beats).collect();
        let third = 1.0 / 3.0;
        assert!((lengths[0] - third).abs() < 1e-9);
        assert!((lengths[2] - third).abs() < 1e-9);
        assert_eq!(lengths[3], 0.5);
        assert_eq!(tune.bars[0].duration(), Rational64::new(3, 2));
    }

    #[test]
    fn test_chord_melody_note() {
        let tune = parse("L:1/8\nK:G\n[DGB]2 [B,D]|\n").unwrap();
        assert_eq!(pitches(&tune.bars[0]), vec!["D4", "B3"]);
        assert_eq!(beats(&tune.bars[0].elements[0]), 1.0);
    }

    #[test]
    fn test_unterminated_chord() {
        let result = parse("K:G\n[DGB|\n");
        assert!(matches!(result, Err(FiddleError::ParseError { line: 2, column: 1, .. })));
    }

    #[test]
    fn test_measure_rests() {
        let tune = parse("M:3/4\nK:C\nZ2|ABc|\n").unwrap();
        assert_eq!(tune.bars.len(), 3);
        assert_eq!(tune.bars[0].duration(), Rational64::from_integer(3));
        assert_eq!(tune.bars[1].duration(), Rational64::from_integer(3));
        // Written once, so both rest bars are measure 0
        assert_eq!(tune.bars[1].number, 0);
        assert_eq!(tune.bars[2].number, 1);
    }

    #[test]
    fn test_repeat_flags_fold_empty_bars() {
        let tune = parse("K:D\n|:AB:||:cd:|\n").unwrap();
        assert_eq!(tune.bars.len(), 2);
        assert!(tune.bars[0].repeat_start && tune.bars[0].repeat_end);
        assert!(tune.bars[1].repeat_start && tune.bars[1].repeat_end);
    }

    #[test]
    fn test_endings() {
        let tune = parse("K:D\n|:AB|cd|1 ef:|2 ga||AB|\n").unwrap();
        let endings: Vec<Option<u8>> = tune.bars.iter().map(|b| b.ending).collect();
        assert_eq!(endings, vec![None, None, Some(1), Some(2), None]);
        assert!(tune.bars[2].repeat_end);
        assert!(!tune.bars[3].repeat_end);
    }

    #[test]
    fn test_measure_numbers_start_at_zero() {
        let tune = parse("K:G\nD|GAB|c2d|\n").unwrap();
        let numbers: Vec<u32> = tune.bars.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn test_repeat_start_does_not_start_a_measure() {
        let tune = parse("K:G\nD|:GAB|c2d:|\n").unwrap();
        let numbers: Vec<u32> = tune.bars.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![0, 0, 1]);

        let tune = parse("K:G\n|:GA|Bc:|:de|fg:|\n").unwrap();
        let numbers: Vec<u32> = tune.bars.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_bars_still_count() {
        let tune = parse("K:G\n|GA| |Bc||\n").unwrap();
        let numbers: Vec<u32> = tune.bars.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_bar_location() {
        let tune = parse("K:G\nGA|\n  Bc|\n").unwrap();
        assert_eq!((tune.bars[0].line, tune.bars[0].column), (2, 1));
        assert_eq!((tune.bars[1].line, tune.bars[1].column), (3, 3));
    }

    #[test]
    fn test_extreme_lengths_are_errors() {
        let result = parse("K:C\nA/4294967291 B/4294967279|\n");
        match result {
            Err(FiddleError::ParseError { line, column, .. }) => assert_eq!((line, column), (2, 1)),
            other => panic!("Expected ParseError, got {:?}", other),
        }

        let result = parse("L:1/8\nK:C\nA4294967295/4294967295/4294967295/4294967295|\n");
        assert!(matches!(result, Err(FiddleError::ParseError { line: 3, .. })));
    }

    #[test]
    fn test_inline_key_change() {
        let tune = parse("K:G\nF2|[K:F]B2|\n").unwrap();
        assert_eq!(pitches(&tune.bars[0]), vec!["F#4"]);
        assert_eq!(pitches(&tune.bars[1]), vec!["Bb4"]);
        assert_eq!(tune.header.key.unwrap().display_name(), "G");
    }

    #[test]
    fn test_stray_length_is_an_error() {
        assert!(parse("K:C\nA |2 B|\n").is_ok());
        assert!(parse("K:C\nA / B|\n").is_err());
    }
}
