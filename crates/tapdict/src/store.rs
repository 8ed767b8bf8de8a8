//! Read queries against imported dictionaries.

use {
    crate::{
        DictionaryId, Engine, TagEntry, TermEntry, TermMetaEntry,
        db::{split_codes, split_definitions},
    },
    anyhow::{Context, Result},
    futures::TryStreamExt,
    sqlx::{QueryBuilder, Row, Sqlite, sqlite::SqliteRow},
    tracing::trace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Expression,
    Reading,
}

impl Column {
    const fn name(self) -> &'static str {
        match self {
            Self::Expression => "expression",
            Self::Reading => "reading",
        }
    }
}

impl Engine {
    /// Every term whose expression is a prefix of the first `max_len`
    /// characters of `text`, from the given sources.
    ///
    /// Longer expressions come first, then higher scores. Rows that tie on
    /// both keep their import order.
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    pub async fn lookup_by_expression_prefix(
        &self,
        text: &str,
        max_len: usize,
        sources: &[DictionaryId],
    ) -> Result<Vec<TermEntry>> {
        self.lookup_by_prefix(Column::Expression, text, max_len, sources)
            .await
            .context("failed to look up by expression")
    }

    /// Same as [`Engine::lookup_by_expression_prefix`], but matches readings.
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    pub async fn lookup_by_reading_prefix(
        &self,
        text: &str,
        max_len: usize,
        sources: &[DictionaryId],
    ) -> Result<Vec<TermEntry>> {
        self.lookup_by_prefix(Column::Reading, text, max_len, sources)
            .await
            .context("failed to look up by reading")
    }

    async fn lookup_by_prefix(
        &self,
        column: Column,
        text: &str,
        max_len: usize,
        sources: &[DictionaryId],
    ) -> Result<Vec<TermEntry>> {
        let prefixes = prefixes(text, max_len);
        if prefixes.is_empty() || sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT expression, reading, term_tags, score, rules, definitions, sequence,
                popularity, dictionary
            FROM terms
            WHERE ",
        );
        qb.push(column.name()).push(" IN (");
        let mut separated = qb.separated(", ");
        for prefix in prefixes {
            separated.push_bind(prefix);
        }
        qb.push(") AND dictionary IN (");
        let mut separated = qb.separated(", ");
        for source in sources {
            separated.push_bind(source.as_str());
        }
        qb.push(") ORDER BY id");

        let mut terms = qb
            .build()
            .fetch(&self.db)
            .map_err(anyhow::Error::from)
            .and_then(|row| async move { term_from_row(&row) })
            .try_collect::<Vec<_>>()
            .await?;
        trace!("{} rows match {column:?} prefixes of {text:?}", terms.len());

        let matched = |term: &TermEntry| match column {
            Column::Expression => term.expression.chars().count(),
            Column::Reading => term.reading.chars().count(),
        };
        terms.sort_by(|a, b| matched(b).cmp(&matched(a)).then(b.score.cmp(&a.score)));
        Ok(terms)
    }

    /// Metadata rows of the given mode attached to exactly `expression`.
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    pub async fn lookup_meta(&self, expression: &str, mode: &str) -> Result<Vec<TermMetaEntry>> {
        sqlx::query(
            "SELECT expression, mode, data, dictionary
            FROM term_meta
            WHERE expression = $1 AND mode = $2
            ORDER BY id",
        )
        .bind(expression)
        .bind(mode)
        .fetch(&self.db)
        .map_err(anyhow::Error::from)
        .and_then(|row| async move {
            Ok(TermMetaEntry {
                expression: row.try_get("expression")?,
                mode: row.try_get("mode")?,
                data: row.try_get("data")?,
                dictionary: DictionaryId(row.try_get("dictionary")?),
            })
        })
        .try_collect()
        .await
        .with_context(|| format!("failed to look up {mode} meta for {expression:?}"))
    }

    /// Tags of `dictionary` with any of the given names, in display order.
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    pub async fn lookup_tags(
        &self,
        dictionary: &DictionaryId,
        names: &[String],
    ) -> Result<Vec<TagEntry>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT name, category, order_num, notes, score, dictionary
            FROM tags
            WHERE dictionary = ",
        );
        qb.push_bind(dictionary.as_str()).push(" AND name IN (");
        let mut separated = qb.separated(", ");
        for name in names {
            separated.push_bind(name.as_str());
        }
        qb.push(") ORDER BY order_num, name");

        qb.build()
            .fetch(&self.db)
            .map_err(anyhow::Error::from)
            .and_then(|row| async move {
                Ok(TagEntry {
                    name: row.try_get("name")?,
                    category: row.try_get("category")?,
                    order: row.try_get("order_num")?,
                    notes: row
                        .try_get::<Option<String>, _>("notes")?
                        .unwrap_or_default(),
                    score: row.try_get("score")?,
                    dictionary: DictionaryId(row.try_get("dictionary")?),
                })
            })
            .try_collect()
            .await
            .with_context(|| format!("failed to look up tags of {dictionary:?}"))
    }
}

/// Prefixes of `text` of 1 up to `max_len` characters, shortest first.
fn prefixes(text: &str, max_len: usize) -> Vec<&str> {
    text.char_indices()
        .map(|(i, c)| &text[..i + c.len_utf8()])
        .take(max_len)
        .collect()
}

fn term_from_row(row: &SqliteRow) -> Result<TermEntry> {
    let score = row.try_get::<Option<String>, _>("score")?;
    Ok(TermEntry {
        expression: row.try_get("expression")?,
        reading: row.try_get("reading")?,
        term_tags: split_codes(row.try_get::<Option<&str>, _>("term_tags")?),
        score: score
            .as_deref()
            .map(str::trim)
            .and_then(|score| score.parse().ok())
            .unwrap_or_default(),
        rules: split_codes(row.try_get::<Option<&str>, _>("rules")?),
        definitions: split_definitions(row.try_get("definitions")?),
        sequence: row.try_get("sequence")?,
        popularity: row.try_get("popularity")?,
        dictionary: DictionaryId(row.try_get("dictionary")?),
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            DictionaryInfo,
            import::tests::{engine, term},
            meta_mode,
        },
    };

    #[test]
    fn prefixes_by_char() {
        assert_eq!(vec!["行", "行く", "行くよ"], prefixes("行くよ", 30));
        assert_eq!(vec!["行", "行く"], prefixes("行くよ", 2));
        assert!(prefixes("", 30).is_empty());
    }

    async fn with_terms(engine: &Engine, id: &str, terms: &[TermEntry]) {
        engine
            .import_dictionary(&DictionaryInfo::new(id, id), terms, &[], &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn longest_then_highest_score() {
        let (_dir, engine) = engine().await;
        with_terms(
            &engine,
            "jmdict",
            &[
                term("行", "ぎょう", 1, &["line"]),
                term("行く", "いく", 5, &["to go"]),
                term("行", "こう", 3, &["going"]),
                term("行くよ", "いくよ", 0, &["let's go"]),
                term("行方", "ゆくえ", 9, &["whereabouts"]),
            ],
        )
        .await;

        let found = engine
            .lookup_by_expression_prefix("行くよね", 30, &["jmdict".into()])
            .await
            .unwrap()
            .into_iter()
            .map(|term| (term.expression, term.reading))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                ("行くよ".to_owned(), "いくよ".to_owned()),
                ("行く".to_owned(), "いく".to_owned()),
                ("行".to_owned(), "こう".to_owned()),
                ("行".to_owned(), "ぎょう".to_owned()),
            ],
            found
        );

        let found = engine
            .lookup_by_expression_prefix("行くよね", 1, &["jmdict".into()])
            .await
            .unwrap();
        assert_eq!(2, found.len());
    }

    #[tokio::test]
    async fn only_enabled_sources() {
        let (_dir, engine) = engine().await;
        with_terms(&engine, "a", &[term("猫", "ねこ", 0, &["cat"])]).await;
        with_terms(&engine, "b", &[term("猫", "ねこ", 0, &["feline"])]).await;

        let found = engine
            .lookup_by_expression_prefix("猫", 30, &["b".into()])
            .await
            .unwrap();
        assert_eq!(1, found.len());
        assert_eq!(vec!["feline".to_owned()], found[0].definitions);

        let found = engine
            .lookup_by_expression_prefix("猫", 30, &[])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn reading_prefix_and_round_trip() {
        let (_dir, engine) = engine().await;
        let stored = TermEntry {
            term_tags: vec!["P".into(), "ichi1".into()],
            rules: vec!["v5k-s".into()],
            sequence: Some(1_578_850),
            popularity: Some("common".into()),
            ..term("行く", "いく", -2, &["to go", "to move"])
        };
        with_terms(&engine, "jmdict", std::slice::from_ref(&stored)).await;

        let found = engine
            .lookup_by_reading_prefix("いくつ", 30, &["jmdict".into()])
            .await
            .unwrap();
        assert_eq!(
            vec![TermEntry {
                dictionary: "jmdict".into(),
                ..stored
            }],
            found
        );
    }

    #[tokio::test]
    async fn meta_and_tags() {
        let (_dir, engine) = engine().await;
        let tag = |name: &str, order| TagEntry {
            name: name.into(),
            category: "partOfSpeech".into(),
            order,
            notes: format!("{name} notes"),
            score: 0,
            dictionary: "jmdict".into(),
        };
        let meta = |mode: &str, data: &str| TermMetaEntry {
            expression: "行く".into(),
            mode: mode.into(),
            data: data.into(),
            dictionary: "jmdict".into(),
        };
        engine
            .import_dictionary(
                &DictionaryInfo::new("jmdict", "JMdict"),
                &[term("行く", "いく", 0, &["to go"])],
                &[tag("vi", 2), tag("v5k-s", 1), tag("n", 0)],
                &[meta(meta_mode::FREQUENCY, "12"), meta(meta_mode::PITCH, "{}")],
            )
            .await
            .unwrap();

        let found = engine
            .lookup_meta("行く", meta_mode::FREQUENCY)
            .await
            .unwrap();
        assert_eq!(vec![meta(meta_mode::FREQUENCY, "12")], found);
        assert!(engine.lookup_meta("来る", meta_mode::FREQUENCY).await.unwrap().is_empty());

        let found = engine
            .lookup_tags(&"jmdict".into(), &["vi".into(), "v5k-s".into()])
            .await
            .unwrap();
        assert_eq!(vec![tag("v5k-s", 1), tag("vi", 2)], found);
        assert!(engine.lookup_tags(&"jmdict".into(), &[]).await.unwrap().is_empty());
    }
}
