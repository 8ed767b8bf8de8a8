//! Yomitan dictionary archive schema.
//!
//! See [`dictionary-data.d.ts`](https://github.com/yomidevs/yomitan/blob/master/types/ext/dictionary-data.d.ts).

use {
    derive_more::Deref,
    serde::{Deserialize, de::IgnoredAny},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    #[serde(alias = "version")]
    pub format: Option<i64>,
    pub title: String,
    pub revision: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub attribution: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Deref)]
pub struct TagBank(pub Vec<Tag>);

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub name: String,
    pub category: String,
    pub order: i64,
    pub notes: String,
    pub score: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Deref)]
pub struct TermBank(pub Vec<Term>);

#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    pub expression: String,
    pub reading: String,
    pub definition_tags: Option<String>,
    pub rules: String,
    pub score: i64,
    pub glossary: Vec<Glossary>,
    pub sequence: i64,
    pub term_tags: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Glossary {
    String(String),
    Content(GlossaryContent),
    /// Deinflection hints (`[uninflected, [rules]]`) and anything newer than
    /// this schema.
    Other(IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum GlossaryContent {
    Text { text: String },
    Image {},
    StructuredContent { content: serde_json::Value },
}

#[derive(Debug, Clone, Default, Deserialize, Deref)]
pub struct TermMetaBank(pub Vec<TermMeta>);

#[derive(Debug, Clone, Deserialize)]
pub struct TermMeta {
    pub expression: String,
    pub mode: String,
    pub data: serde_json::Value,
}
