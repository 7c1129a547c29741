//! # Public API
//!
//! Entry points that run the whole pipeline and return a [`Tune`].
//!
//! ## Parse Functions
//!
//! - [`parse_abc()`] - Built-in engine, default settings (recommended)
//! - [`parse_abc_with()`] - Any [`NotationEngine`] and a custom [`ParseConfig`]
//! - [`parse_abc_file()`] - Read a `.abc` file; the file stem becomes the id
//! - [`parse_abc_file_with()`] - A file, with any engine and settings
//!
//! ## Typical Usage
//!
//! ```rust
//! use fiddle::parse_abc;
//!
//! let abc = "X:1\nT:Test Tune\nM:4/4\nL:1/8\nK:D\n|:D2F2 A2d2|F2A2 d2e2:|\n|:f2f2 f2e2|d2B2 A2D2:|\n";
//!
//! let tune = parse_abc(abc, "test-tune")?;
//! assert_eq!(tune.title, "Test Tune");
//! assert_eq!(tune.sections.len(), 2);
//! # Ok::<(), fiddle::FiddleError>(())
//! ```
//!
//! ## Custom Settings
//!
//! ```rust
//! use fiddle::{parse_abc_with, AbcEngine, ParseConfig};
//!
//! let config = ParseConfig::from_yaml_str("playback:\n  first-full-beat: 0.5\n")?;
//! let engine = AbcEngine::from_config(&config.engine);
//! let tune = parse_abc_with("K:G\n|:GABc:|\n", "short", &engine, &config)?;
//! assert_eq!(tune.sections[0].repeat, 2);
//! # Ok::<(), fiddle::FiddleError>(())
//! ```

use crate::assign::assign;
use crate::config::ParseConfig;
use crate::engine::{AbcEngine, NotationEngine};
use crate::error::FiddleError;
use crate::metadata;
use crate::playback::expand_all;
use crate::section::detect_sections_detailed;
use crate::tune::Tune;
use std::fs;
use std::path::Path;

/// Parse ABC text into a structured tune.
///
/// # Pipeline
/// 1. Read notes with the built-in engine (repeats expanded)
/// 2. Resolve title, key, meter and tempo
/// 3. Detect sections from the raw text
/// 4. Assign notes to sections
/// 5. Unroll repeats into playback notes
///
/// # Errors
/// Returns [`FiddleError::ParseError`] if the engine cannot read the ABC.
pub fn parse_abc(abc: &str, id: &str) -> Result<Tune, FiddleError> {
    parse_abc_with(abc, id, &AbcEngine::new(), &ParseConfig::default())
}

/// Parse with a specific engine and settings.
///
/// The engine's repeat mode is the engine's own business; pass
/// `AbcEngine::from_config(&config.engine)` to honour the config file.
pub fn parse_abc_with(
    abc: &str,
    id: &str,
    engine: &dyn NotationEngine,
    config: &ParseConfig,
) -> Result<Tune, FiddleError> {
    let score = engine.parse(abc)?;
    let meta = metadata::extract(abc, Some(&score));

    let (boundaries, strategy) = detect_sections_detailed(abc, &config.sections);
    log::debug!(
        "{}: {} note events, {} sections ({:?})",
        id,
        score.notes.len(),
        boundaries.len(),
        strategy
    );

    let sections = assign(&score.notes, &boundaries, &meta.time_signature);
    let sections = expand_all(sections, &config.playback);

    Ok(Tune {
        id: id.to_string(),
        title: meta.title,
        key: meta.key,
        time_signature: meta.time_signature,
        default_tempo: meta.tempo,
        abc: abc.to_string(),
        sections,
    })
}

/// Parse an ABC file. The tune id is the file name without its extension.
///
/// # Errors
/// Returns [`FiddleError::Io`] if the file cannot be read, or
/// [`FiddleError::ParseError`] if its contents cannot be parsed.
pub fn parse_abc_file(path: impl AsRef<Path>) -> Result<Tune, FiddleError> {
    parse_abc_file_with(path, &AbcEngine::new(), &ParseConfig::default())
}

/// Parse an ABC file with a specific engine and settings.
///
/// # Errors
/// Same as [`parse_abc_file()`].
pub fn parse_abc_file_with(
    path: impl AsRef<Path>,
    engine: &dyn NotationEngine,
    config: &ParseConfig,
) -> Result<Tune, FiddleError> {
    let path = path.as_ref();
    let abc = fs::read_to_string(path).map_err(|source| FiddleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_abc_with(&abc, &id, engine, config)
}
