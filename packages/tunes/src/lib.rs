//! Traditional public-domain fiddle tunes, embedded at build time.
//!
//! Every `tunes/*.abc` file becomes one entry keyed by its file stem.

include!(concat!(env!("OUT_DIR"), "/tunes.rs"));

/// An embedded tune with its id and ABC source
#[derive(Debug, Clone)]
pub struct EmbeddedTune {
    pub id: &'static str,
    pub abc: &'static str,
}

/// Get all embedded tunes, sorted by id
pub fn all_tunes() -> Vec<EmbeddedTune> {
    TUNES
        .iter()
        .map(|&(id, abc)| EmbeddedTune { id, abc })
        .collect()
}

/// Get a tune by id
pub fn get_tune(id: &str) -> Option<EmbeddedTune> {
    TUNES
        .iter()
        .find(|(tune_id, _)| *tune_id == id)
        .map(|&(id, abc)| EmbeddedTune { id, abc })
}

/// List all tune ids
pub fn list_tunes() -> Vec<&'static str> {
    TUNES.iter().map(|(id, _)| *id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_is_embedded() {
        assert!(!TUNES.is_empty());
        assert!(list_tunes().contains(&"arkansas_traveler"));
    }

    #[test]
    fn test_get_tune_by_id() {
        let tune = get_tune("rights_of_man").unwrap();
        assert!(tune.abc.contains("T:The Rights of Man"));
        assert!(get_tune("no_such_tune").is_none());
    }
}
