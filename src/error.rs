//! # Error Types
//!
//! This module defines all error types for the fiddle library.
//!
//! Only two stages can fail: reading the ABC text in the notation engine, and
//! loading configuration or input files. The section detector, the assigner and
//! the playback expander are total over their inputs and never return errors.
//!
//! ## Error Types
//! - `ParseError` - Lexer/parser errors with line and column information
//! - `ConfigError` - Invalid YAML configuration
//! - `Io` - An input file could not be read
//!
//! ## Usage
//! ```rust
//! use fiddle::{parse_abc, FiddleError};
//!
//! match parse_abc("X:1\nK:D\n|:DEF \"G:|\n", "broken") {
//!     Ok(tune) => println!("{} sections", tune.sections.len()),
//!     Err(FiddleError::ParseError { line, column, message }) => {
//!         eprintln!("Parse error at {}:{}: {}", line, column, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FiddleError {
    /// Parse error with location information.
    ///
    /// Occurs when the notation engine cannot read the ABC body. A failed parse
    /// yields no tune at all; there is no partial output.
    ///
    /// # Example
    /// ```
    /// # use fiddle::FiddleError;
    /// let err = FiddleError::ParseError {
    ///     line: 7,
    ///     column: 12,
    ///     message: "Unterminated chord symbol".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 7, column 12: Unterminated chord symbol");
    /// ```
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Invalid configuration.
    ///
    /// Occurs when a YAML config file is malformed or holds out-of-range values.
    ///
    /// # Example
    /// ```
    /// # use fiddle::FiddleError;
    /// let err = FiddleError::ConfigError("part-length must be at least 1".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: part-length must be at least 1");
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// An input file could not be read.
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
