use crate::error::FiddleError;

/// Barline kinds that matter for structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barline {
    Single,      // |
    Double,      // ||
    ThinThick,   // |]
    ThickThin,   // [|
    RepeatStart, // |:
    RepeatEnd,   // :|
    RepeatBoth,  // :: or :|:
}

impl Barline {
    pub fn ends_repeat(&self) -> bool {
        matches!(self, Barline::RepeatEnd | Barline::RepeatBoth)
    }

    pub fn starts_repeat(&self) -> bool {
        matches!(self, Barline::RepeatStart | Barline::RepeatBoth)
    }

    /// Whether the bar after this barline gets a new measure number.
    ///
    /// A repeat start only marks where a repeat returns to; the text on both
    /// sides of it counts as one written measure.
    pub fn advances_measure(&self) -> bool {
        !matches!(self, Barline::RepeatStart)
    }

    /// Whether this barline closes a run of first/second ending bars
    pub fn closes_ending(&self) -> bool {
        !matches!(self, Barline::Single)
    }
}

/// Token types for the ABC body
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Pitch
    Note(char),  // A-G, a-g
    Sharp,       // ^
    DoubleSharp, // ^^
    Flat,        // _
    DoubleFlat,  // __
    Natural,     // =
    OctaveUp,    // '
    OctaveDown,  // ,

    // Rests
    Rest,        // z x
    MeasureRest, // Z X

    // Lengths and rhythm
    Number(u32),
    Slash,          // /
    BrokenRight(u8), // > >> >>>
    BrokenLeft(u8),  // < << <<<
    Tie,            // -
    Tuplet {
        p: u32,
        q: Option<u32>,
        r: Option<u32>,
    }, // (3  (3:2:3

    // Grouping
    SlurStart,  // (
    SlurEnd,    // )
    ChordStart, // [
    ChordEnd,   // ]

    // Structure
    Barline(Barline),
    Ending(u8),         // [1  |1  :|2
    Field(char, String), // T:Title  or inline [K:G]
    Newline,
    Whitespace,
}

/// A token with its position in the source
#[derive(Debug, Clone)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for tokenizing ABC source
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            position: 0,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// `X:` at the start of a line (but not `A:|`, which is a note and a barline)
    fn check_field_line(&self) -> bool {
        if self.column != 1 {
            return false;
        }
        let mut chars = self.remaining().chars();
        matches!(
            (chars.next(), chars.next(), chars.next()),
            (Some(c), Some(':'), next) if c.is_ascii_alphabetic() && next != Some('|') && next != Some(':')
        )
    }

    /// `[K:...]` style inline field
    fn check_inline_field(&self) -> bool {
        let mut chars = self.remaining().chars();
        matches!(
            (chars.next(), chars.next(), chars.next()),
            (Some('['), Some(c), Some(':')) if c.is_ascii_alphabetic()
        )
    }

    fn read_number(&mut self) -> u32 {
        let mut value: u32 = 0;
        while let Some(&c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    value = value.saturating_mul(10).saturating_add(d);
                    self.advance();
                }
                None => break,
            }
        }
        value
    }

    fn peek_is_digit(&mut self) -> bool {
        self.peek().is_some_and(|c| c.is_ascii_digit())
    }

    /// Consume up to and including `close`. Fails at end of input, or at a
    /// newline when the group must stay on one line.
    fn skip_group(
        &mut self,
        close: char,
        single_line: bool,
        what: &str,
        line: usize,
        column: usize,
    ) -> Result<String, FiddleError> {
        let mut content = String::new();
        loop {
            match self.peek() {
                Some(&c) if c == close => {
                    self.advance();
                    return Ok(content);
                }
                Some(&'\n') if single_line => break,
                Some(&c) => {
                    content.push(c);
                    self.advance();
                }
                None => break,
            }
        }
        Err(FiddleError::ParseError {
            line,
            column,
            message: format!("Unterminated {}", what),
        })
    }

    fn skip_to_line_end(&mut self) -> String {
        let mut content = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            content.push(c);
            self.advance();
        }
        content
    }

    pub fn tokenize(&mut self) -> Result<Vec<LocatedToken>, FiddleError> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.peek() {
            let line = self.line;
            let column = self.column;

            // Header-style field lines
            if self.check_field_line() {
                let name = c;
                self.advance(); // letter
                self.advance(); // :
                let value = self.skip_to_line_end();
                tokens.push(LocatedToken {
                    token: Token::Field(name, value.trim().to_string()),
                    line,
                    column,
                });
                continue;
            }

            if self.check_inline_field() {
                self.advance(); // [
                let name = self.advance().unwrap_or(' ');
                self.advance(); // :
                let value = self.skip_group(']', true, "inline field", line, column)?;
                tokens.push(LocatedToken {
                    token: Token::Field(name, value.trim().to_string()),
                    line,
                    column,
                });
                continue;
            }

            let token = match c {
                // Comments and stylesheet directives run to end of line
                '%' => {
                    self.skip_to_line_end();
                    continue;
                }
                // Line continuation, beam breaks, spacers
                '\\' | '`' | 'y' => {
                    self.advance();
                    continue;
                }
                '"' => {
                    self.advance();
                    self.skip_group('"', true, "chord symbol", line, column)?;
                    continue;
                }
                '!' => {
                    self.advance();
                    self.skip_group('!', true, "decoration", line, column)?;
                    continue;
                }
                '+' => {
                    self.advance();
                    self.skip_group('+', true, "decoration", line, column)?;
                    continue;
                }
                '{' => {
                    self.advance();
                    self.skip_group('}', false, "grace notes", line, column)?;
                    continue;
                }
                // Decoration shorthands
                '.' | '~' | 'H' | 'L' | 'M' | 'O' | 'P' | 'S' | 'T' | 'u' | 'v' => {
                    self.advance();
                    continue;
                }
                'A'..='G' | 'a'..='g' => {
                    self.advance();
                    Token::Note(c)
                }
                'z' | 'x' => {
                    self.advance();
                    Token::Rest
                }
                'Z' | 'X' => {
                    self.advance();
                    Token::MeasureRest
                }
                '^' => {
                    self.advance();
                    if let Some(&'^') = self.peek() {
                        self.advance();
                        Token::DoubleSharp
                    } else {
                        Token::Sharp
                    }
                }
                '_' => {
                    self.advance();
                    if let Some(&'_') = self.peek() {
                        self.advance();
                        Token::DoubleFlat
                    } else {
                        Token::Flat
                    }
                }
                '=' => {
                    self.advance();
                    Token::Natural
                }
                '\'' => {
                    self.advance();
                    Token::OctaveUp
                }
                ',' => {
                    self.advance();
                    Token::OctaveDown
                }
                '0'..='9' => Token::Number(self.read_number()),
                '/' => {
                    self.advance();
                    Token::Slash
                }
                '>' | '<' => {
                    let mut count: u8 = 0;
                    while let Some(&next) = self.peek() {
                        if next != c {
                            break;
                        }
                        self.advance();
                        count = count.saturating_add(1);
                    }
                    if c == '>' {
                        Token::BrokenRight(count)
                    } else {
                        Token::BrokenLeft(count)
                    }
                }
                '-' => {
                    self.advance();
                    Token::Tie
                }
                '(' => {
                    self.advance();
                    if self.peek_is_digit() {
                        self.lex_tuplet()
                    } else {
                        Token::SlurStart
                    }
                }
                ')' => {
                    self.advance();
                    Token::SlurEnd
                }
                '[' => {
                    self.advance();
                    match self.peek() {
                        Some(&'|') => {
                            self.advance();
                            Token::Barline(Barline::ThickThin)
                        }
                        Some(d) if d.is_ascii_digit() => Token::Ending(self.read_number() as u8),
                        _ => Token::ChordStart,
                    }
                }
                ']' => {
                    self.advance();
                    Token::ChordEnd
                }
                '|' => {
                    self.advance();
                    let barline = match self.peek() {
                        Some(&'|') => {
                            self.advance();
                            if let Some(&':') = self.peek() {
                                self.advance();
                                Barline::RepeatStart
                            } else {
                                Barline::Double
                            }
                        }
                        Some(&']') => {
                            self.advance();
                            Barline::ThinThick
                        }
                        Some(&':') => {
                            self.advance();
                            Barline::RepeatStart
                        }
                        _ => Barline::Single,
                    };
                    self.push_barline(&mut tokens, barline, line, column);
                    continue;
                }
                ':' => {
                    self.advance();
                    let barline = self.lex_colon_barline(line, column)?;
                    self.push_barline(&mut tokens, barline, line, column);
                    continue;
                }
                '\n' => {
                    self.advance();
                    Token::Newline
                }
                ' ' | '\t' | '\r' => {
                    self.advance();
                    Token::Whitespace
                }
                _ => {
                    return Err(FiddleError::ParseError {
                        line,
                        column,
                        message: format!("Unexpected character '{}'", c),
                    });
                }
            };

            tokens.push(LocatedToken {
                token,
                line,
                column,
            });
        }

        Ok(tokens)
    }

    /// After `(` with a digit: `(p`, `(p:q`, `(p:q:r`, `(p::r`
    fn lex_tuplet(&mut self) -> Token {
        let p = self.read_number();
        let mut q = None;
        let mut r = None;
        if let Some(&':') = self.peek() {
            self.advance();
            if self.peek_is_digit() {
                q = Some(self.read_number());
            }
            if let Some(&':') = self.peek() {
                self.advance();
                if self.peek_is_digit() {
                    r = Some(self.read_number());
                }
            }
        }
        Token::Tuplet { p, q, r }
    }

    /// After a leading `:`: `::`, `:|`, `:||`, `:|]`, `:|:`, `:||:`
    fn lex_colon_barline(&mut self, line: usize, column: usize) -> Result<Barline, FiddleError> {
        match self.peek() {
            Some(&':') => {
                self.advance();
                Ok(Barline::RepeatBoth)
            }
            Some(&'|') => {
                self.advance();
                match self.peek() {
                    Some(&'|') | Some(&']') => {
                        self.advance();
                    }
                    _ => {}
                }
                if let Some(&':') = self.peek() {
                    self.advance();
                    Ok(Barline::RepeatBoth)
                } else {
                    Ok(Barline::RepeatEnd)
                }
            }
            _ => Err(FiddleError::ParseError {
                line,
                column,
                message: "Unexpected ':'. Did you mean ':|' for repeat end?".to_string(),
            }),
        }
    }

    /// Push a barline and any ending number written directly after it (`|1`, `:|2`)
    fn push_barline(
        &mut self,
        tokens: &mut Vec<LocatedToken>,
        barline: Barline,
        line: usize,
        column: usize,
    ) {
        tokens.push(LocatedToken {
            token: Token::Barline(barline),
            line,
            column,
        });
        if self.peek_is_digit() {
            let ending_column = self.column;
            let number = self.read_number();
            tokens.push(LocatedToken {
                token: Token::Ending(number.min(u8::MAX as u32) as u8),
                line,
                column: ending_column,
            });
        }
    }
}
