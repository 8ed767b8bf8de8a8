//! Merging per-dictionary entries into one ranked list.
//!
//! The match engine returns one entry per stored row. The same word usually
//! appears in several dictionaries, so entries sharing a `(term, reading)`
//! are folded into one, keeping each dictionary's meanings as a separate
//! [`MeaningGroup`], and the result is ordered so that the most likely
//! reading of the tapped text comes first.

use {
    crate::{DictionaryId, Engine, IndexMap, IndexSet, TagEntry, lang::jpn},
    serde::{Deserialize, Serialize},
    std::cmp::Reverse,
    tracing::trace,
};

/// Where a [`DictionaryEntry`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntrySource {
    /// Single dictionary.
    Dictionary(DictionaryId),
    /// Several dictionaries contributed; see [`DictionaryEntry::groups`].
    Merged,
}

/// Meanings contributed by one dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeaningGroup {
    /// Contributing dictionary.
    pub source: DictionaryId,
    /// Its glosses, in dictionary order.
    pub meanings: Vec<String>,
}

/// Entry shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    /// Identifier, unique within one lookup.
    pub id: usize,
    /// Headword.
    pub term: String,
    /// Reading of the headword; may be empty or equal to the headword.
    pub reading: String,
    /// Every meaning, flattened in source display order.
    pub meanings: Vec<String>,
    /// Resolved metadata for [`DictionaryEntry::term_tags`].
    pub meaning_tags: Vec<TagEntry>,
    /// Raw tag codes.
    pub term_tags: Vec<String>,
    /// Dictionary-native score.
    pub score: i64,
    /// Contributing dictionary.
    pub source: EntrySource,
    /// Frequency metadata payload, if any dictionary has one.
    pub frequency: Option<String>,
    /// Pitch accent payload, passed through untouched.
    pub pitch_accents: Option<String>,
    /// Meanings per contributing dictionary, in source display order.
    pub groups: Vec<MeaningGroup>,
}

impl Default for EntrySource {
    fn default() -> Self {
        Self::Dictionary(DictionaryId::default())
    }
}

impl DictionaryEntry {
    /// Length used for ordering entries, in characters.
    ///
    /// This is the reading length when the entry has a distinct reading, the
    /// term length for kana-only terms, and 0 for kanji terms with no
    /// reading. Zero-length entries always sort last.
    #[must_use]
    pub fn effective_reading_len(&self) -> usize {
        if !self.reading.is_empty() && self.reading != self.term {
            self.reading.chars().count()
        } else if !jpn::contains_kanji(&self.term) {
            self.term.chars().count()
        } else {
            0
        }
    }

    /// Whether this entry counts as having a reading when ordering: it has a
    /// reading distinct from its term, or its term has no kanji and so is
    /// its own reading.
    #[must_use]
    pub fn has_reading(&self) -> bool {
        (!self.reading.is_empty() && self.reading != self.term)
            || !jpn::contains_kanji(&self.term)
    }

    /// Dictionaries this entry draws from, in display order.
    pub fn sources(&self) -> impl Iterator<Item = &DictionaryId> {
        self.groups.iter().map(|group| &group.source)
    }
}

/// Matched span of text with the entries found for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryMatch {
    /// Text that matched, as it appears in the source text.
    pub word: String,
    /// One entry per stored row.
    pub entries: Vec<DictionaryEntry>,
}

/// Orders and merges lookup results.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    source_priority: Vec<DictionaryId>,
    proper_names: IndexSet<DictionaryId>,
}

impl Ranker {
    /// Creates a ranker.
    ///
    /// `source_priority` lists the dictionaries whose meanings are shown
    /// first, in order. Entries found only in `proper_names` dictionaries
    /// are pushed behind the rest.
    #[must_use]
    pub fn new(
        source_priority: impl IntoIterator<Item = DictionaryId>,
        proper_names: impl IntoIterator<Item = DictionaryId>,
    ) -> Self {
        Self {
            source_priority: source_priority.into_iter().collect(),
            proper_names: proper_names.into_iter().collect(),
        }
    }

    fn is_proper_name(&self, id: &DictionaryId) -> bool {
        self.proper_names.contains(id)
    }

    /// Position of `id` when ordering sources: configured priority first,
    /// then alphabetical.
    fn source_key<'a>(&self, id: &'a DictionaryId) -> (usize, &'a str) {
        let priority = self
            .source_priority
            .iter()
            .position(|prioritized| prioritized == id)
            .unwrap_or(self.source_priority.len());
        (priority, id.as_str())
    }

    /// Folds entries sharing a `(term, reading)` and orders the result.
    ///
    /// Within one source, only the first entry for a `(term, reading)` is
    /// kept. Entries are ordered by:
    /// 1. [`DictionaryEntry::effective_reading_len`], longest first, with
    ///    zero always last
    /// 2. entries with a reading (see [`DictionaryEntry::has_reading`])
    ///    before entries without
    /// 3. entries only found in proper-name dictionaries last
    /// 4. the order they were first seen in
    ///
    /// Resulting entries are numbered from 0 in final order.
    #[must_use]
    pub fn merge_and_rank(&self, matches: &[DictionaryMatch]) -> Vec<DictionaryEntry> {
        let mut buckets = IndexMap::<(&str, &str), IndexMap<&DictionaryId, &DictionaryEntry>>::default();
        for entry in matches.iter().flat_map(|m| &m.entries) {
            let bucket = buckets
                .entry((entry.term.as_str(), entry.reading.as_str()))
                .or_default();
            for source in entry_sources(entry) {
                if bucket.contains_key(source) {
                    trace!(
                        "Dropping duplicate ({:?}, {:?}) from {source}",
                        entry.term, entry.reading
                    );
                    continue;
                }
                bucket.insert(source, entry);
            }
        }

        let mut merged = buckets
            .into_values()
            .filter(|bucket| !bucket.is_empty())
            .map(|bucket| self.merge(bucket))
            .collect::<Vec<_>>();
        merged.sort_by_key(|entry| {
            let len = entry.effective_reading_len();
            (
                len == 0,
                Reverse(len),
                !entry.has_reading(),
                entry.sources().all(|source| self.is_proper_name(source)),
            )
        });
        for (id, entry) in merged.iter_mut().enumerate() {
            entry.id = id;
        }
        merged
    }

    fn merge(&self, mut bucket: IndexMap<&DictionaryId, &DictionaryEntry>) -> DictionaryEntry {
        bucket.sort_by(|a, _, b, _| self.source_key(a).cmp(&self.source_key(b)));

        let mut merged = DictionaryEntry::default();
        let mut meaning_tags = IndexSet::<&TagEntry>::default();
        let mut term_tags = IndexSet::<&str>::default();
        for (i, (&source, &entry)) in bucket.iter().enumerate() {
            if i == 0 {
                merged.term.clone_from(&entry.term);
                merged.reading.clone_from(&entry.reading);
                merged.score = entry.score;
            }
            merged.score = merged.score.max(entry.score);
            if merged.frequency.is_none() {
                merged.frequency.clone_from(&entry.frequency);
            }
            if merged.pitch_accents.is_none() {
                merged.pitch_accents.clone_from(&entry.pitch_accents);
            }
            meaning_tags.extend(&entry.meaning_tags);
            term_tags.extend(entry.term_tags.iter().map(String::as_str));

            let meanings = group_meanings(entry, source);
            merged.meanings.extend(meanings.iter().cloned());
            merged.groups.push(MeaningGroup {
                source: source.clone(),
                meanings,
            });
        }
        merged.meaning_tags = meaning_tags.into_iter().cloned().collect();
        merged.term_tags = term_tags.into_iter().map(ToOwned::to_owned).collect();
        merged.source = match bucket.keys().next() {
            Some(&source) if bucket.len() == 1 => EntrySource::Dictionary(source.clone()),
            _ => EntrySource::Merged,
        };
        merged
    }
}

/// Sources of an entry, which may itself already be merged.
fn entry_sources(entry: &DictionaryEntry) -> Vec<&DictionaryId> {
    if entry.groups.is_empty() {
        match &entry.source {
            EntrySource::Dictionary(source) => vec![source],
            EntrySource::Merged => Vec::new(),
        }
    } else {
        entry.sources().collect()
    }
}

fn group_meanings(entry: &DictionaryEntry, source: &DictionaryId) -> Vec<String> {
    entry
        .groups
        .iter()
        .find(|group| &group.source == source)
        .map_or_else(|| entry.meanings.clone(), |group| group.meanings.clone())
}

impl Engine {
    /// Ranker using the configured source priority and the current set of
    /// proper-name dictionaries.
    #[must_use]
    pub fn ranker(&self) -> Ranker {
        let dictionaries = self.dictionaries();
        Ranker::new(
            self.config.source_priority.iter().cloned(),
            dictionaries
                .keys()
                .filter(|id| dictionaries.is_proper_name(id, &self.config))
                .cloned(),
        )
    }
}
