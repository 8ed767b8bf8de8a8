//! [Yomitan] dictionary archive import.
//!
//! An archive is a zip holding `index.json` plus any number of
//! `term_bank_N.json`, `tag_bank_N.json` and `term_meta_bank_N.json` files,
//! each a JSON array of rows. Banks are parsed in parallel, each from its own
//! reader over the archive bytes.
//!
//! [Yomitan]: https://github.com/yomidevs/yomitan

mod schema;

use {
    super::{ImportError, ImportReport},
    crate::{DictionaryId, DictionaryInfo, Engine, IndexSet, TagEntry, TermEntry, TermMetaEntry},
    anyhow::{Context, Result},
    bytes::Bytes,
    rayon::prelude::*,
    regex::Regex,
    schema::{Glossary, GlossaryContent, Index, TagBank, TermBank, TermMetaBank},
    serde::de::DeserializeOwned,
    serde_json::Value,
    std::{
        io::{Cursor, Read, Seek},
        sync::LazyLock,
    },
    tracing::debug,
    zip::ZipArchive,
};

const INDEX_PATH: &str = "index.json";

/// Rows of a parsed archive, ready for [`Engine::import_dictionary`].
#[derive(Debug, Clone, Default)]
pub struct YomitanDictionary {
    /// Dictionary metadata from `index.json`.
    pub info: DictionaryInfo,
    /// Every term, in bank order.
    pub terms: Vec<TermEntry>,
    /// Every tag, in bank order.
    pub tags: Vec<TagEntry>,
    /// Every term metadata row, in bank order.
    pub meta: Vec<TermMetaEntry>,
}

impl Engine {
    /// Parses a Yomitan archive and imports it, replacing any dictionary
    /// with the same source id.
    ///
    /// The source id is derived from the index title, so re-importing a newer
    /// revision of the same dictionary overwrites the old one. Dictionaries
    /// whose title carries a proper-name marker are flagged as such.
    ///
    /// # Errors
    ///
    /// Errors with [`ImportError::Parse`] if the archive is malformed, or any
    /// error from [`Engine::import_dictionary`].
    pub async fn import_yomitan(&self, archive: Bytes) -> Result<ImportReport, ImportError> {
        let mut dictionary = blocking::unblock(move || parse_blocking(&archive))
            .await
            .map_err(ImportError::Parse)?;
        let info = &mut dictionary.info;
        info.is_proper_name = self.config.has_proper_name_marker(&info.title)
            || self.config.has_proper_name_marker(info.id.as_str());
        debug!(
            "Parsed {:?}: {} terms, {} tags, {} meta",
            info.id,
            dictionary.terms.len(),
            dictionary.tags.len(),
            dictionary.meta.len()
        );

        self.import_dictionary(
            &dictionary.info,
            &dictionary.terms,
            &dictionary.tags,
            &dictionary.meta,
        )
        .await
    }
}

/// Parses a whole archive held in memory.
///
/// # Errors
///
/// Errors if the archive is not a zip, has no `index.json`, or if any bank
/// fails to parse.
pub fn parse_blocking(archive: &[u8]) -> Result<YomitanDictionary> {
    static TAG_BANK_PATTERN: LazyLock<Regex> = LazyLock::new(|| bank_pattern("tag_bank"));
    static TERM_BANK_PATTERN: LazyLock<Regex> = LazyLock::new(|| bank_pattern("term_bank"));
    static TERM_META_BANK_PATTERN: LazyLock<Regex> =
        LazyLock::new(|| bank_pattern("term_meta_bank"));

    let mut zip = open(archive)?;
    let index = parse_from::<Index>(&mut zip, INDEX_PATH)?;
    let id = source_id(&index.title);

    let file_names = zip.file_names().collect::<Vec<_>>();
    let tag_banks = bank_names(&file_names, &TAG_BANK_PATTERN);
    let term_banks = bank_names(&file_names, &TERM_BANK_PATTERN);
    let term_meta_banks = bank_names(&file_names, &TERM_META_BANK_PATTERN);
    debug!(
        "{INDEX_PATH} parsed, {} tag banks, {} term banks, {} term meta banks",
        tag_banks.len(),
        term_banks.len(),
        term_meta_banks.len()
    );

    let (tags, (terms, meta)) = rayon::join(
        || {
            parse_banks(archive, &tag_banks, |bank: TagBank| {
                bank.0.into_iter().map(|tag| to_tag(tag, &id)).collect()
            })
        },
        || {
            rayon::join(
                || {
                    parse_banks(archive, &term_banks, |bank: TermBank| {
                        bank.0.into_iter().map(|term| to_term(term, &id)).collect()
                    })
                },
                || {
                    parse_banks(archive, &term_meta_banks, |bank: TermMetaBank| {
                        bank.0.into_iter().map(|meta| to_meta(meta, &id)).collect()
                    })
                },
            )
        },
    );

    Ok(YomitanDictionary {
        info: to_info(index, id),
        terms: terms?,
        tags: tags?,
        meta: meta?,
    })
}

fn bank_pattern(kind: &str) -> Regex {
    Regex::new(&format!("^{kind}_([0-9]+)\\.json$")).expect("should be valid regex")
}

/// Names matching `pattern`, ordered by bank number.
fn bank_names(file_names: &[&str], pattern: &Regex) -> Vec<String> {
    let mut banks = file_names
        .iter()
        .filter_map(|name| {
            let number = pattern.captures(name)?.get(1)?.as_str().parse::<u64>().ok()?;
            Some((number, (*name).to_owned()))
        })
        .collect::<Vec<_>>();
    banks.sort_unstable();
    banks.into_iter().map(|(_, name)| name).collect()
}

fn open(archive: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(archive)).context("failed to read as zip archive")
}

fn parse_from<T: DeserializeOwned>(archive: &mut ZipArchive<impl Read + Seek>, name: &str) -> Result<T> {
    let file = archive
        .by_name(name)
        .with_context(|| format!("failed to open {name:?}"))?;
    serde_json::from_reader::<_, T>(file).with_context(|| format!("failed to parse {name:?}"))
}

fn parse_banks<B, T>(
    archive: &[u8],
    names: &[String],
    convert: impl Fn(B) -> Vec<T> + Send + Sync,
) -> Result<Vec<T>>
where
    B: DeserializeOwned,
    T: Send,
{
    let banks = names
        .par_iter()
        .map(|name| {
            let mut zip = open(archive)?;
            let bank = parse_from::<B>(&mut zip, name)?;
            Ok(convert(bank))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(banks.into_iter().flatten().collect())
}

/// Lowercase title, with every run of non-alphanumeric characters turned
/// into a single `-`.
fn source_id(title: &str) -> DictionaryId {
    let mut id = String::new();
    for word in title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        if !id.is_empty() {
            id.push('-');
        }
        id.extend(word.chars().flat_map(char::to_lowercase));
    }
    DictionaryId(id)
}

fn to_info(index: Index, id: DictionaryId) -> DictionaryInfo {
    DictionaryInfo {
        id,
        title: index.title,
        revision: index.revision,
        version: index.format,
        author: index.author,
        url: index.url,
        description: index.description,
        attribution: index.attribution,
        source_language: index.source_language,
        target_language: index.target_language,
        created_at: None,
        is_proper_name: false,
    }
}

fn to_tag(raw: schema::Tag, id: &DictionaryId) -> TagEntry {
    TagEntry {
        name: raw.name,
        category: raw.category,
        order: raw.order,
        notes: raw.notes,
        score: raw.score,
        dictionary: id.clone(),
    }
}

fn to_term(raw: schema::Term, id: &DictionaryId) -> TermEntry {
    let term_tags = raw
        .definition_tags
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .chain(raw.term_tags.split_whitespace())
        .map(ToOwned::to_owned)
        .collect::<IndexSet<_>>();
    TermEntry {
        expression: raw.expression,
        reading: raw.reading,
        term_tags: term_tags.into_iter().collect(),
        score: raw.score,
        rules: raw.rules.split_whitespace().map(ToOwned::to_owned).collect(),
        definitions: raw.glossary.into_iter().flat_map(to_glosses).collect(),
        sequence: Some(raw.sequence),
        popularity: None,
        dictionary: id.clone(),
    }
}

fn to_meta(raw: schema::TermMeta, id: &DictionaryId) -> TermMetaEntry {
    TermMetaEntry {
        expression: raw.expression,
        mode: raw.mode,
        data: raw.data.to_string(),
        dictionary: id.clone(),
    }
}

/// Plain-text lines of a glossary item.
fn to_glosses(raw: Glossary) -> Vec<String> {
    let text = match raw {
        Glossary::String(text) | Glossary::Content(GlossaryContent::Text { text }) => text,
        Glossary::Content(GlossaryContent::StructuredContent { content }) => {
            let mut text = String::new();
            push_structured(&content, &mut text);
            text
        }
        Glossary::Content(GlossaryContent::Image {}) | Glossary::Other(_) => return Vec::new(),
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

const STRUCTURED_BLOCK_TAGS: &[&str] = &[
    "div", "li", "ol", "ul", "p", "table", "tr", "details", "summary",
];

// serde_json caps nesting depth, so recursion here is bounded
fn push_structured(content: &Value, out: &mut String) {
    match content {
        Value::String(text) => out.push_str(text),
        Value::Array(items) => {
            for item in items {
                push_structured(item, out);
            }
        }
        Value::Object(element) => {
            let tag = element.get("tag").and_then(Value::as_str).unwrap_or_default();
            match tag {
                "rt" | "rp" | "img" => {}
                "br" => out.push('\n'),
                _ => {
                    let block = STRUCTURED_BLOCK_TAGS.contains(&tag);
                    if block && !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    if let Some(content) = element.get("content") {
                        push_structured(content, out);
                    }
                    if block {
                        out.push('\n');
                    }
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
