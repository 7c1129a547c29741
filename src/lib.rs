pub mod api;
pub mod assign;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod playback;
pub mod section;
pub mod tune;

pub use api::{parse_abc, parse_abc_file, parse_abc_file_with, parse_abc_with};
pub use config::{EngineConfig, ParseConfig, PlaybackConfig, SectionConfig};
pub use engine::{AbcEngine, EngineScore, NotationEngine, NoteEvent, RepeatMode};
pub use error::*;
pub use section::{detect_sections, detect_sections_with, DetectionStrategy, SectionBoundary};
pub use tune::{Note, Section, Tune, TuneSummary};
