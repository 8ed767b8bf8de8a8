//! Engine configuration.

use {
    crate::DictionaryId,
    serde::{Deserialize, Serialize},
};

/// Tuning knobs for the lookup pipeline and the database.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How many characters after the tapped offset are scanned for
    /// headwords. Must cover the longest plausible headword.
    pub max_scan_len: usize,
    /// Dictionaries whose meanings are shown first, in this order, when an
    /// entry has meanings from several dictionaries. Dictionaries not listed
    /// here come afterwards, sorted by identifier.
    pub source_priority: Vec<DictionaryId>,
    /// Case-insensitive substrings of a dictionary's title or identifier which
    /// mark it as a proper-name dictionary, for dictionaries imported without
    /// an explicit flag.
    pub proper_name_markers: Vec<String>,
    /// Size of the database connection pool.
    pub max_db_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_scan_len: 30,
            source_priority: Vec::new(),
            proper_name_markers: vec!["jmnedict".into()],
            max_db_connections: 8,
        }
    }
}

impl Config {
    /// Checks a title or identifier against [`Config::proper_name_markers`].
    #[must_use]
    pub fn has_proper_name_marker(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.proper_name_markers
            .iter()
            .any(|marker| text.contains(&marker.to_lowercase()))
    }
}
