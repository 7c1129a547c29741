//! Abstract syntax tree for the folk-tune subset of ABC.
//!
//! The parser turns tokens into a flat list of [`Bar`]s plus a [`TuneHeader`].
//! Key signatures and bar accidentals are already resolved into each
//! [`Pitch`], and every duration is an exact rational number of quarter-note
//! beats.

use num_rational::{Ratio, Rational64};
use std::fmt;

/// Exact product, or `None` when it does not fit in 64 bits
pub fn checked_mul(a: Rational64, b: Rational64) -> Option<Rational64> {
    narrow(widen(a) * widen(b))
}

/// Exact sum, or `None` when it does not fit in 64 bits
pub fn checked_add(a: Rational64, b: Rational64) -> Option<Rational64> {
    narrow(widen(a) + widen(b))
}

// Products and sums of two 64-bit ratios always fit in 128 bits
fn widen(value: Rational64) -> Ratio<i128> {
    Ratio::new_raw(*value.numer() as i128, *value.denom() as i128)
}

fn narrow(value: Ratio<i128>) -> Option<Rational64> {
    let numer = i64::try_from(*value.numer()).ok()?;
    let denom = i64::try_from(*value.denom()).ok()?;
    Some(Rational64::new_raw(numer, denom))
}

/// Note letter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Parse a note letter (case-insensitive)
    pub fn from_char(c: char) -> Option<NoteName> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }

    /// Position on the circle of fifths relative to C
    fn fifths(&self) -> i32 {
        match self {
            NoteName::F => -1,
            NoteName::C => 0,
            NoteName::G => 1,
            NoteName::D => 2,
            NoteName::A => 3,
            NoteName::E => 4,
            NoteName::B => 5,
        }
    }
}

/// Written accidentals (`^^ ^ = _ __`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    DoubleSharp,
    Sharp,
    Natural,
    Flat,
    DoubleFlat,
}

impl Accidental {
    /// Semitone alteration this accidental applies
    pub fn alter(&self) -> i8 {
        match self {
            Accidental::DoubleSharp => 2,
            Accidental::Sharp => 1,
            Accidental::Natural => 0,
            Accidental::Flat => -1,
            Accidental::DoubleFlat => -2,
        }
    }
}

/// Modes accepted in the `K:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    /// Parse a mode name. Only the first three letters are significant, so
    /// `Dor`, `dorian` and `DORIAN` all match; a lone `m` means minor.
    pub fn parse(s: &str) -> Option<Mode> {
        let s = s.to_lowercase();
        if s.is_empty() {
            return Some(Mode::Major);
        }
        if s == "m" {
            return Some(Mode::Minor);
        }
        let prefix: String = s.chars().take(3).collect();
        match prefix.as_str() {
            "maj" => Some(Mode::Major),
            "min" => Some(Mode::Minor),
            "ion" => Some(Mode::Ionian),
            "dor" => Some(Mode::Dorian),
            "phr" => Some(Mode::Phrygian),
            "lyd" => Some(Mode::Lydian),
            "mix" => Some(Mode::Mixolydian),
            "aeo" => Some(Mode::Aeolian),
            "loc" => Some(Mode::Locrian),
            _ => None,
        }
    }

    /// Shift from the major key on the same tonic, in fifths
    fn fifths_offset(&self) -> i32 {
        match self {
            Mode::Lydian => 1,
            Mode::Major | Mode::Ionian => 0,
            Mode::Mixolydian => -1,
            Mode::Dorian => -2,
            Mode::Minor | Mode::Aeolian => -3,
            Mode::Phrygian => -4,
            Mode::Locrian => -5,
        }
    }

    pub fn is_minor(&self) -> bool {
        matches!(self, Mode::Minor | Mode::Aeolian)
    }
}

const SHARP_ORDER: [NoteName; 7] = [
    NoteName::F,
    NoteName::C,
    NoteName::G,
    NoteName::D,
    NoteName::A,
    NoteName::E,
    NoteName::B,
];

const FLAT_ORDER: [NoteName; 7] = [
    NoteName::B,
    NoteName::E,
    NoteName::A,
    NoteName::D,
    NoteName::G,
    NoteName::C,
    NoteName::F,
];

/// A resolved key signature: tonic, mode and the resulting number of
/// sharps (positive) or flats (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignature {
    pub tonic: NoteName,
    pub tonic_alter: i8,
    pub mode: Mode,
    pub fifths: i32,
}

impl Default for KeySignature {
    fn default() -> Self {
        Self::new(NoteName::C, 0, Mode::Major)
    }
}

impl KeySignature {
    pub fn new(tonic: NoteName, tonic_alter: i8, mode: Mode) -> Self {
        let fifths = tonic.fifths() + 7 * tonic_alter as i32 + mode.fifths_offset();
        Self {
            tonic,
            tonic_alter,
            mode,
            fifths: fifths.clamp(-7, 7),
        }
    }

    /// Parse the value of a `K:` field, e.g. `D`, `Ador`, `F#m`, `Bb major`.
    ///
    /// Returns `None` when the value does not start with a tonic (`K:none`,
    /// `K:HP`, clef-only fields).
    pub fn parse(value: &str) -> Option<KeySignature> {
        let mut chars = value.trim().chars().peekable();
        let tonic = NoteName::from_char(*chars.peek()?)?;
        if !chars.next()?.is_ascii_uppercase() {
            return None;
        }

        let tonic_alter = match chars.peek() {
            Some('#') => {
                chars.next();
                1
            }
            Some('b') => {
                chars.next();
                -1
            }
            _ => 0,
        };

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let word: String = chars.take_while(|c| c.is_ascii_alphabetic()).collect();
        // Anything that is not a mode (clef=..., transpose=...) leaves major
        let mode = Mode::parse(&word).unwrap_or_default();

        Some(KeySignature::new(tonic, tonic_alter, mode))
    }

    /// Alteration the signature applies to a note letter
    pub fn accidental_for_note(&self, name: NoteName) -> i8 {
        let count = self.fifths.unsigned_abs() as usize;
        if self.fifths > 0 && SHARP_ORDER[..count].contains(&name) {
            1
        } else if self.fifths < 0 && FLAT_ORDER[..count].contains(&name) {
            -1
        } else {
            0
        }
    }

    /// Human-readable key: `"D"`, `"Bb"`, `"A minor"`
    pub fn display_name(&self) -> String {
        let mut name = String::new();
        name.push(self.tonic.as_char());
        name.push_str(alter_symbol(self.tonic_alter));
        if self.mode.is_minor() {
            name.push_str(" minor");
        }
        name
    }
}

/// Time signature from the `M:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meter {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Meter {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl Meter {
    /// Parse `N/D`, `C`, `C|` or an additive numerator such as `2+3/8`.
    /// Returns `None` for free meter (`none`) and unreadable values.
    pub fn parse(value: &str) -> Option<Meter> {
        let value = value.trim();
        match value {
            "C" => {
                return Some(Meter {
                    numerator: 4,
                    denominator: 4,
                })
            }
            "C|" => {
                return Some(Meter {
                    numerator: 2,
                    denominator: 2,
                })
            }
            _ => {}
        }

        let (num, den) = value.split_once('/')?;
        let numerator = num.split('+').try_fold(0u32, |total, part| {
            total.checked_add(part.trim().parse::<u32>().ok()?)
        })?;
        let denominator = den.trim().parse::<u32>().ok()?;
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Meter {
            numerator,
            denominator,
        })
    }

    /// Length of one full bar in quarter-note beats
    pub fn bar_length(&self) -> Rational64 {
        Rational64::new(self.numerator as i64 * 4, self.denominator as i64)
    }

    /// Compound meters (6/8, 9/8, 12/8) group beats in threes
    pub fn is_compound(&self) -> bool {
        self.numerator % 3 == 0 && self.numerator > 3
    }

    /// The signature as written: `"6/8"`
    pub fn ratio_string(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }

    /// ABC default unit note length: 1/16 below 3/4, otherwise 1/8
    pub fn default_unit_length(&self) -> Rational64 {
        let ratio = Rational64::new(self.numerator as i64, self.denominator as i64);
        if ratio < Rational64::new(3, 4) {
            Rational64::new(1, 16)
        } else {
            Rational64::new(1, 8)
        }
    }
}

/// Parse an `L:` value such as `1/8` into a fraction of a whole note
pub fn parse_unit_length(value: &str) -> Option<Rational64> {
    let value = value.trim();
    let (num, den) = match value.split_once('/') {
        Some((num, den)) => (num.trim().parse::<i64>().ok()?, den.trim().parse::<i64>().ok()?),
        None => (value.parse::<i64>().ok()?, 1),
    };
    if num <= 0 || den <= 0 {
        return None;
    }
    Some(Rational64::new(num, den))
}

/// Parse a `Q:` value into beats per minute.
///
/// Accepts `120`, `1/4=120` and `"Allegro" 3/8=80`; quoted text is ignored.
pub fn parse_tempo(value: &str) -> Option<u32> {
    let mut unquoted = String::new();
    let mut in_quote = false;
    for c in value.chars() {
        if c == '"' {
            in_quote = !in_quote;
        } else if !in_quote {
            unquoted.push(c);
        }
    }

    let digits = match unquoted.split_once('=') {
        Some((_, bpm)) => bpm.trim(),
        None => unquoted.trim(),
    };
    let bpm: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    bpm.parse::<u32>().ok().filter(|&bpm| bpm > 0)
}

fn alter_symbol(alter: i8) -> &'static str {
    match alter {
        2 => "##",
        1 => "#",
        -1 => "b",
        -2 => "bb",
        _ => "",
    }
}

/// A sounding pitch in scientific octave numbering (ABC `C` is C4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    pub name: NoteName,
    pub alter: i8,
    pub octave: i32,
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.name.as_char(),
            alter_symbol(self.alter),
            self.octave
        )
    }
}

/// An element inside a bar
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A note (or the melody note of a chord)
    Note { pitch: Pitch, duration: Rational64 },
    /// A rest; still occupies time
    Rest { duration: Rational64 },
}

impl Element {
    pub fn duration(&self) -> Rational64 {
        match self {
            Element::Note { duration, .. } | Element::Rest { duration } => *duration,
        }
    }

    /// Multiply the duration in place; `None` (and no change) on overflow
    pub(crate) fn scale_duration(&mut self, factor: Rational64) -> Option<()> {
        match self {
            Element::Note { duration, .. } | Element::Rest { duration } => {
                *duration = checked_mul(*duration, factor)?;
            }
        }
        Some(())
    }
}

/// One written bar
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bar {
    /// Written measure number. The first bar is 0, and every barline except
    /// `|:` starts a new number, so a bar closed by `|:` shares its number
    /// with the bar after it.
    pub number: u32,
    pub elements: Vec<Element>,
    pub repeat_start: bool,
    pub repeat_end: bool,
    /// First/second ending this bar belongs to
    pub ending: Option<u8>,
    /// Source position of the bar's first element
    pub line: usize,
    pub column: usize,
}

impl Bar {
    pub fn duration(&self) -> Rational64 {
        self.elements
            .iter()
            .map(Element::duration)
            .fold(Rational64::from_integer(0), |acc, d| acc + d)
    }
}

/// Header information collected while parsing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TuneHeader {
    pub title: Option<String>,
    pub meter: Option<Meter>,
    pub unit_length: Option<Rational64>,
    pub key: Option<KeySignature>,
    pub tempo: Option<u32>,
}

/// Parser output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTune {
    pub header: TuneHeader,
    pub bars: Vec<Bar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse(""), Some(Mode::Major));
        assert_eq!(Mode::parse("m"), Some(Mode::Minor));
        assert_eq!(Mode::parse("Dorian"), Some(Mode::Dorian));
        assert_eq!(Mode::parse("mix"), Some(Mode::Mixolydian));
        assert_eq!(Mode::parse("clef"), None);
    }

    #[test]
    fn test_key_fifths() {
        assert_eq!(KeySignature::parse("D").unwrap().fifths, 2);
        assert_eq!(KeySignature::parse("Bb").unwrap().fifths, -2);
        assert_eq!(KeySignature::parse("F#m").unwrap().fifths, 3);
        assert_eq!(KeySignature::parse("Ador").unwrap().fifths, 1);
        assert_eq!(KeySignature::parse("A mixolydian").unwrap().fifths, 2);
        assert_eq!(KeySignature::parse("Em").unwrap().fifths, 1);
    }

    #[test]
    fn test_key_without_tonic() {
        assert!(KeySignature::parse("none").is_none());
        assert!(KeySignature::parse("").is_none());
    }

    #[test]
    fn test_key_accidentals() {
        let d = KeySignature::parse("D").unwrap();
        assert_eq!(d.accidental_for_note(NoteName::F), 1);
        assert_eq!(d.accidental_for_note(NoteName::C), 1);
        assert_eq!(d.accidental_for_note(NoteName::G), 0);

        let f = KeySignature::parse("F").unwrap();
        assert_eq!(f.accidental_for_note(NoteName::B), -1);
        assert_eq!(f.accidental_for_note(NoteName::E), 0);
    }

    #[test]
    fn test_key_display_name() {
        assert_eq!(KeySignature::parse("D").unwrap().display_name(), "D");
        assert_eq!(KeySignature::parse("Am").unwrap().display_name(), "A minor");
        assert_eq!(KeySignature::parse("Bb").unwrap().display_name(), "Bb");
        assert_eq!(KeySignature::parse("Edor").unwrap().display_name(), "E");
    }

    #[test]
    fn test_meter_parse() {
        assert_eq!(Meter::parse("6/8").unwrap().ratio_string(), "6/8");
        assert_eq!(Meter::parse("C").unwrap().ratio_string(), "4/4");
        assert_eq!(Meter::parse("C|").unwrap().ratio_string(), "2/2");
        assert_eq!(Meter::parse("2+3/8").unwrap().ratio_string(), "5/8");
        assert!(Meter::parse("none").is_none());
        assert!(Meter::parse("4294967295+1/4").is_none());
    }

    #[test]
    fn test_checked_arithmetic() {
        let third = Rational64::new(1, 3);
        assert_eq!(checked_add(third, third), Some(Rational64::new(2, 3)));
        assert_eq!(checked_mul(third, Rational64::from_integer(3)), Some(Rational64::from_integer(1)));

        let tiny = Rational64::new(1, 4_294_967_291);
        let tinier = Rational64::new(1, 4_294_967_279);
        assert_eq!(checked_mul(tiny, tinier), None);
        assert_eq!(checked_add(Rational64::new(1, i64::MAX), Rational64::new(1, i64::MAX - 1)), None);
    }

    #[test]
    fn test_meter_lengths() {
        let jig = Meter::parse("6/8").unwrap();
        assert_eq!(jig.bar_length(), Rational64::from_integer(3));
        assert!(jig.is_compound());
        assert_eq!(jig.default_unit_length(), Rational64::new(1, 8));

        let polka = Meter::parse("2/4").unwrap();
        assert_eq!(polka.bar_length(), Rational64::from_integer(2));
        assert_eq!(polka.default_unit_length(), Rational64::new(1, 16));
    }

    #[test]
    fn test_parse_tempo() {
        assert_eq!(parse_tempo("120"), Some(120));
        assert_eq!(parse_tempo("1/4=100"), Some(100));
        assert_eq!(parse_tempo("\"Allegro\" 3/8=80"), Some(80));
        assert_eq!(parse_tempo("\"Slowly\""), None);
    }

    #[test]
    fn test_pitch_display() {
        let pitch = Pitch {
            name: NoteName::B,
            alter: -1,
            octave: 3,
        };
        assert_eq!(pitch.to_string(), "Bb3");
        let pitch = Pitch {
            name: NoteName::F,
            alter: 1,
            octave: 4,
        };
        assert_eq!(pitch.to_string(), "F#4");
    }
}
