#![doc = include_str!("../README.md")]

pub mod config;
mod db;
pub mod deinflect;
pub mod dictionary;
pub mod import;
pub mod lang;
pub mod lookup;
pub mod markup;
pub mod normalize;
pub mod picker;
pub mod rank;
pub mod resolve;
pub mod sentence;
pub mod store;
pub mod tap;

use {
    anyhow::{Context, Result},
    arc_swap::ArcSwap,
    config::Config,
    deinflect::Deinflector,
    derive_more::{Deref, Display},
    dictionary::Dictionaries,
    import::Imports,
    serde::{Deserialize, Serialize},
    sqlx::{Pool, Sqlite},
    std::{path::Path, sync::Arc},
};

/// Handle to an opened dictionary database and the lookup pipeline built on
/// top of it.
///
/// This is cheap to clone; all clones share the same connection pool and
/// dictionary snapshot.
#[derive(derive_more::Debug, Clone, Deref)]
pub struct Engine(Arc<Inner>);

#[doc(hidden)]
#[derive(derive_more::Debug)]
pub struct Inner {
    config: Config,
    dictionaries: ArcSwap<Dictionaries>,
    imports: Imports,
    #[debug(skip)]
    deinflector: Box<dyn Deinflector>,
    db: Pool<Sqlite>,
}

/// [`indexmap::IndexMap`] using the crate-wide hasher.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, foldhash::fast::RandomState>;
/// [`indexmap::IndexSet`] using the crate-wide hasher.
pub type IndexSet<T> = indexmap::IndexSet<T, foldhash::fast::RandomState>;

impl Engine {
    /// Opens (or creates) the dictionary database at `db_path`.
    ///
    /// # Errors
    ///
    /// Errors if the database file cannot be opened or its schema cannot be
    /// set up. An unreadable store is fatal here rather than at lookup time.
    pub async fn new(
        db_path: impl AsRef<Path>,
        config: Config,
        deinflector: impl Deinflector + 'static,
    ) -> Result<Self> {
        let db = db::setup(db_path.as_ref(), config.max_db_connections).await?;
        let dictionaries = Dictionaries::fetch(&db)
            .await
            .context("failed to fetch initial dictionaries")?;
        Ok(Self(Arc::new(Inner {
            config,
            dictionaries: ArcSwap::from_pointee(dictionaries),
            imports: Imports::new(),
            deinflector: Box::new(deinflector),
            db,
        })))
    }

    /// Configuration this engine was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Stable identifier of one imported dictionary.
///
/// This is the value stored in the `dictionary` column of every row the
/// dictionary owns, and stays the same across re-imports of the same source.
#[derive(
    Debug, Display, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DictionaryId(pub String);

impl DictionaryId {
    /// Creates an identifier from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DictionaryId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Metadata row for an imported dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryInfo {
    /// Source identifier, referenced by every row of this dictionary.
    pub id: DictionaryId,
    /// Human-readable title.
    pub title: String,
    /// Arbitrary revision string.
    pub revision: String,
    /// Format version of the dictionary data.
    pub version: Option<i64>,
    /// Who authored the dictionary.
    pub author: Option<String>,
    /// Homepage URL.
    pub url: Option<String>,
    /// Describes the content of this dictionary.
    pub description: Option<String>,
    /// Licensing and attribution text.
    pub attribution: Option<String>,
    /// Language code of the headwords.
    pub source_language: Option<String>,
    /// Language code of the definitions.
    pub target_language: Option<String>,
    /// When the dictionary was imported, as written by the database.
    pub created_at: Option<String>,
    /// Whether this dictionary only contains proper names (people, places).
    ///
    /// Entries found only in such dictionaries are ranked after everything
    /// else.
    pub is_proper_name: bool,
}

impl DictionaryInfo {
    /// Creates metadata with only an identifier and title.
    #[must_use]
    pub fn new(id: impl Into<DictionaryId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

impl From<String> for DictionaryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Single headword row of a dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermEntry {
    /// Headword, as written.
    pub expression: String,
    /// Phonetic reading. May equal [`TermEntry::expression`] for kana words.
    pub reading: String,
    /// Tag codes attached to this term.
    pub term_tags: Vec<String>,
    /// Dictionary-native ranking; higher is more relevant.
    pub score: i64,
    /// Rule codes (e.g. verb class) consumed by deinflection.
    pub rules: Vec<String>,
    /// Glosses, in dictionary order.
    pub definitions: Vec<String>,
    /// Dictionary-native entry number.
    pub sequence: Option<i64>,
    /// Dictionary-native popularity marker.
    pub popularity: Option<String>,
    /// Source dictionary.
    pub dictionary: DictionaryId,
}

impl TermEntry {
    /// Whether this row violates the "expression and reading are never both
    /// empty" invariant and must not be stored.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.expression.trim().is_empty() && self.reading.trim().is_empty()
    }
}

/// Human-readable metadata for a tag code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tag code, as referenced from [`TermEntry::term_tags`].
    pub name: String,
    /// Category, e.g. `partOfSpeech`.
    pub category: String,
    /// Display priority; lower comes first.
    pub order: i64,
    /// Description shown to the user.
    pub notes: String,
    /// Score adjustment carried by the tag.
    pub score: i64,
    /// Source dictionary.
    pub dictionary: DictionaryId,
}

/// Auxiliary per-expression data, such as frequency or pitch accent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMetaEntry {
    /// Expression this data belongs to.
    pub expression: String,
    /// Kind of data, see [`meta_mode`].
    pub mode: String,
    /// Opaque payload, usually JSON.
    pub data: String,
    /// Source dictionary.
    pub dictionary: DictionaryId,
}

/// Well-known [`TermMetaEntry::mode`] values.
pub mod meta_mode {
    /// Frequency information.
    pub const FREQUENCY: &str = "freq";
    /// Pitch accent information.
    pub const PITCH: &str = "pitch";
    /// IPA transcriptions.
    pub const PHONETIC: &str = "ipa";
}
