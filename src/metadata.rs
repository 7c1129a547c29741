//! # Tune Metadata
//!
//! Title, key, time signature and tempo, each resolved from an ordered list
//! of strategies. The first strategy that returns a value wins; when none do,
//! a fixed default is used. Missing metadata is never an error.
//!
//! | Field          | Strategies                            | Default     |
//! |----------------|---------------------------------------|-------------|
//! | title          | `T:` header                           | "Untitled"  |
//! | key            | engine key, `K:` header               | "C"         |
//! | time signature | engine meter, `M:` header             | "4/4"       |
//! | tempo          | engine tempo, first number in `Q:`    | 120         |

use crate::engine::EngineScore;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TITLE_FIELD: Regex = Regex::new(r"(?m)^T:\s*(.+)$").unwrap();
    static ref KEY_FIELD: Regex = Regex::new(r"(?m)^K:\s*(\w+)").unwrap();
    static ref METER_FIELD: Regex = Regex::new(r"(?m)^M:\s*(\S+)").unwrap();
    static ref TEMPO_FIELD: Regex = Regex::new(r"(?m)^Q:\s*.*?(\d+)").unwrap();
}

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_KEY: &str = "C";
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";
pub const DEFAULT_TEMPO: u32 = 120;

/// Inputs available to the strategies
#[derive(Debug, Clone, Copy)]
pub struct MetadataSource<'a> {
    pub abc: &'a str,
    pub engine: Option<&'a EngineScore>,
}

/// One way of finding a field
pub type Strategy<T> = fn(&MetadataSource) -> Option<T>;

fn header_capture(re: &Regex, abc: &str) -> Option<String> {
    re.captures(abc)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn title_from_header(source: &MetadataSource) -> Option<String> {
    header_capture(&TITLE_FIELD, source.abc)
}

fn key_from_engine(source: &MetadataSource) -> Option<String> {
    source.engine.and_then(|score| score.key.clone())
}

fn key_from_header(source: &MetadataSource) -> Option<String> {
    header_capture(&KEY_FIELD, source.abc)
}

fn time_from_engine(source: &MetadataSource) -> Option<String> {
    source.engine.and_then(|score| score.time_signature.clone())
}

fn time_from_header(source: &MetadataSource) -> Option<String> {
    header_capture(&METER_FIELD, source.abc)
}

fn tempo_from_engine(source: &MetadataSource) -> Option<u32> {
    source.engine.and_then(|score| score.tempo).filter(|&t| t > 0)
}

fn tempo_from_header(source: &MetadataSource) -> Option<u32> {
    header_capture(&TEMPO_FIELD, source.abc)
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|&t| t > 0)
}

pub const TITLE_STRATEGIES: &[Strategy<String>] = &[title_from_header];
pub const KEY_STRATEGIES: &[Strategy<String>] = &[key_from_engine, key_from_header];
pub const TIME_SIGNATURE_STRATEGIES: &[Strategy<String>] = &[time_from_engine, time_from_header];
pub const TEMPO_STRATEGIES: &[Strategy<u32>] = &[tempo_from_engine, tempo_from_header];

/// Run strategies in order and return the first hit
pub fn resolve<T>(strategies: &[Strategy<T>], source: &MetadataSource) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(source))
}

/// Resolved metadata of one tune
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneMetadata {
    pub title: String,
    pub key: String,
    pub time_signature: String,
    pub tempo: u32,
}

/// Resolve every field, falling back to the defaults
pub fn extract(abc: &str, engine: Option<&EngineScore>) -> TuneMetadata {
    let source = MetadataSource { abc, engine };
    TuneMetadata {
        title: resolve(TITLE_STRATEGIES, &source).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        key: resolve(KEY_STRATEGIES, &source).unwrap_or_else(|| DEFAULT_KEY.to_string()),
        time_signature: resolve(TIME_SIGNATURE_STRATEGIES, &source)
            .unwrap_or_else(|| DEFAULT_TIME_SIGNATURE.to_string()),
        tempo: resolve(TEMPO_STRATEGIES, &source).unwrap_or(DEFAULT_TEMPO),
    }
}
