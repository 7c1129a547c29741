//! # Configuration
//!
//! Every tunable constant of the heuristics lives here. All fields are
//! optional in YAML; anything missing keeps its default.
//!
//! ```yaml
//! sections:
//!   part-length: 4
//!   part-repeat: 2
//!   repeat-count: 2
//!   fallback-min-measures: 8
//! playback:
//!   first-full-beat: 1.0
//! engine:
//!   repeats: expanded   # or "written"
//! ```
//!
//! The section detector's pickup flag and the playback expander's pickup
//! threshold are independent settings.

use crate::engine::RepeatMode;
use crate::error::FiddleError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level parse configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParseConfig {
    pub sections: SectionConfig,
    pub playback: PlaybackConfig,
    pub engine: EngineConfig,
}

/// Section detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SectionConfig {
    /// Nominal measures per `[P:X]` section
    pub part_length: u32,
    /// Repeat count given to `[P:X]` sections
    pub part_repeat: u32,
    /// Repeat count given to `|: ... :|` sections
    pub repeat_count: u32,
    /// Minimum measure total used by the half-split fallback
    pub fallback_min_measures: u32,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            part_length: 4,
            part_repeat: 2,
            repeat_count: 2,
            fallback_min_measures: 8,
        }
    }
}

/// Playback expander settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlaybackConfig {
    /// Notes starting before the first note at or after this beat are treated
    /// as a pickup and dropped from repeated passes
    pub first_full_beat: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            first_full_beat: 1.0,
        }
    }
}

/// Notation engine settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub repeats: RepeatMode,
}

impl ParseConfig {
    /// Parse configuration from YAML text. Empty text gives the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, FiddleError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ParseConfig =
            serde_yaml::from_str(content).map_err(|e| FiddleError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, FiddleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| FiddleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<(), FiddleError> {
        let sections = &self.sections;
        if sections.part_length == 0 {
            return Err(FiddleError::ConfigError(
                "part-length must be at least 1".to_string(),
            ));
        }
        if sections.part_repeat == 0 || sections.repeat_count == 0 {
            return Err(FiddleError::ConfigError(
                "repeat counts must be at least 1".to_string(),
            ));
        }
        if sections.fallback_min_measures < 2 {
            return Err(FiddleError::ConfigError(
                "fallback-min-measures must be at least 2".to_string(),
            ));
        }
        let beat = self.playback.first_full_beat;
        if !beat.is_finite() || beat < 0.0 {
            return Err(FiddleError::ConfigError(format!(
                "first-full-beat must be a non-negative number, got {}",
                beat
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ParseConfig::default();
        assert_eq!(config.sections.part_length, 4);
        assert_eq!(config.sections.part_repeat, 2);
        assert_eq!(config.sections.repeat_count, 2);
        assert_eq!(config.sections.fallback_min_measures, 8);
        assert_eq!(config.playback.first_full_beat, 1.0);
        assert_eq!(config.engine.repeats, RepeatMode::Expanded);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ParseConfig::from_yaml_str("").unwrap(), ParseConfig::default());
        assert_eq!(ParseConfig::from_yaml_str("  \n").unwrap(), ParseConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
sections:
  part-length: 8
engine:
  repeats: written
"#;
        let config = ParseConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.sections.part_length, 8);
        assert_eq!(config.sections.part_repeat, 2);
        assert_eq!(config.playback.first_full_beat, 1.0);
        assert_eq!(config.engine.repeats, RepeatMode::Written);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ParseConfig::from_yaml_str("sections: [1, 2");
        assert!(matches!(result, Err(FiddleError::ConfigError(_))));
    }

    #[test]
    fn test_unknown_repeat_mode() {
        let result = ParseConfig::from_yaml_str("engine:\n  repeats: sideways\n");
        assert!(matches!(result, Err(FiddleError::ConfigError(_))));
    }

    #[test]
    fn test_zero_part_length_rejected() {
        let result = ParseConfig::from_yaml_str("sections:\n  part-length: 0\n");
        match result {
            Err(FiddleError::ConfigError(message)) => assert!(message.contains("part-length")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_first_full_beat_rejected() {
        let result = ParseConfig::from_yaml_str("playback:\n  first-full-beat: -1.0\n");
        assert!(matches!(result, Err(FiddleError::ConfigError(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "playback:\n  first-full-beat: 0.5").unwrap();
        let config = ParseConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.playback.first_full_beat, 0.5);
    }

    #[test]
    fn test_missing_file() {
        let result = ParseConfig::from_yaml_file("/definitely/not/here.yaml");
        assert!(matches!(result, Err(FiddleError::Io { .. })));
    }
}
