//! Writing dictionaries into the store.
//!
//! Every import runs inside one transaction: readers keep seeing the previous
//! contents of the dictionary until it commits, and a failed import leaves no
//! trace.

mod insert;
pub mod yomitan;

use {
    crate::{DictionaryInfo, Engine, TagEntry, TermEntry, TermMetaEntry},
    anyhow::Context,
    derive_more::{Display, Error},
    insert::Insert,
    serde::{Deserialize, Serialize},
    sqlx::{Sqlite, Transaction},
    tokio::sync::{Mutex, MutexGuard},
    tracing::{debug, info, warn},
};

/// Serializes writers, so that only one import or removal touches the store
/// at a time.
#[derive(Debug, Default)]
pub struct Imports {
    insert_lock: Mutex<()>,
}

impl Imports {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        debug!("Waiting for insert lock");
        let guard = self.insert_lock.lock().await;
        debug!("Insert lock acquired");
        guard
    }
}

/// Failed to import a dictionary.
///
/// The store is left exactly as it was before the import started.
#[derive(Debug, Display, Error)]
pub enum ImportError {
    /// Dictionary has an empty source identifier.
    #[display("dictionary has no source id")]
    NoSourceId,
    /// Dictionary was parsed, but had no entries to insert.
    #[display("no entries to insert")]
    NoEntries,
    /// Dictionary data could not be read.
    #[display("failed to parse dictionary: {_0:#}")]
    Parse(anyhow::Error),
    /// Database could not be written.
    #[display("failed to write dictionary: {_0:#}")]
    Storage(anyhow::Error),
}

/// Counts of rows written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Term rows written.
    pub terms_inserted: usize,
    /// Term rows dropped because both expression and reading were empty.
    pub terms_skipped: usize,
    /// Tag rows written.
    pub tags_inserted: usize,
    /// Term metadata rows written.
    pub meta_inserted: usize,
}

impl Engine {
    /// Creates or replaces a dictionary and all of its rows.
    ///
    /// Every row is written under `info.id`, whatever its own `dictionary`
    /// field says. Any rows previously stored under that id are removed in
    /// the same transaction. Malformed terms are skipped and counted in
    /// [`ImportReport::terms_skipped`].
    ///
    /// # Errors
    ///
    /// Errors if `info.id` is empty, if there is nothing to insert, or if the
    /// database could not be written. In every case nothing is changed.
    ///
    /// Once the import is committed it is reported as a success, even if
    /// [`Engine::dictionaries`] could not be refreshed afterwards; the
    /// snapshot then catches up on the next successful write.
    pub async fn import_dictionary(
        &self,
        info: &DictionaryInfo,
        terms: &[TermEntry],
        tags: &[TagEntry],
        meta: &[TermMetaEntry],
    ) -> Result<ImportReport, ImportError> {
        if info.id.trim().is_empty() {
            return Err(ImportError::NoSourceId);
        }
        let terms_skipped = terms.iter().filter(|term| term.is_malformed()).count();
        if terms.len() == terms_skipped && meta.is_empty() {
            debug!("{:?} has no entries to insert", info.id);
            return Err(ImportError::NoEntries);
        }
        if terms_skipped > 0 {
            warn!(
                "Skipping {terms_skipped} terms with no expression or reading in {:?}",
                info.id
            );
        }

        let _lock = self.imports.lock().await;
        let mut tx = self
            .db
            .begin()
            .await
            .context("failed to begin transaction")
            .map_err(ImportError::Storage)?;
        let report = write_dictionary(&mut tx, info, terms, tags, meta)
            .await
            .map_err(ImportError::Storage)?;
        tx.commit()
            .await
            .context("failed to commit transaction")
            .map_err(ImportError::Storage)?;
        info!(
            "Imported {:?} ({}): {} terms, {} skipped, {} tags, {} meta",
            info.id,
            info.title,
            report.terms_inserted,
            terms_skipped,
            report.tags_inserted,
            report.meta_inserted
        );

        if let Err(err) = self.sync_dictionaries().await {
            warn!("{:?} was imported, but the dictionary list is stale: {err:?}", info.id);
        }
        Ok(ImportReport {
            terms_skipped,
            ..report
        })
    }
}

async fn write_dictionary(
    tx: &mut Transaction<'_, Sqlite>,
    info: &DictionaryInfo,
    terms: &[TermEntry],
    tags: &[TagEntry],
    meta: &[TermMetaEntry],
) -> anyhow::Result<ImportReport> {
    let source = &info.id;
    for table in ["terms", "tags", "term_meta", "dictionary_info"] {
        let key = if table == "dictionary_info" {
            "id"
        } else {
            "dictionary"
        };
        let removed = sqlx::query(&format!("DELETE FROM {table} WHERE {key} = $1"))
            .bind(source.as_str())
            .execute(&mut **tx)
            .await
            .with_context(|| format!("failed to clear old {table} rows"))?
            .rows_affected();
        if removed > 0 {
            debug!("Replacing {removed} old {table} rows of {source:?}");
        }
    }

    sqlx::query(
        "INSERT INTO dictionary_info (id, title, revision, version, author, url, description,
            attribution, source_language, target_language, is_proper_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(source.as_str())
    .bind(&info.title)
    .bind(&info.revision)
    .bind(info.version)
    .bind(&info.author)
    .bind(&info.url)
    .bind(&info.description)
    .bind(&info.attribution)
    .bind(&info.source_language)
    .bind(&info.target_language)
    .bind(info.is_proper_name)
    .execute(&mut **tx)
    .await
    .context("failed to insert dictionary info")?;

    let mut term_rows = Insert::<TermEntry>::new();
    for term in terms.iter().filter(|term| !term.is_malformed()) {
        term_rows
            .insert(tx, source, term)
            .await
            .with_context(|| {
                format!(
                    "failed to insert term ({:?}, {:?})",
                    term.expression, term.reading
                )
            })?;
    }
    term_rows.flush(tx).await.context("failed to flush terms")?;

    let mut tag_rows = Insert::<TagEntry>::new();
    for tag in tags {
        tag_rows
            .insert(tx, source, tag)
            .await
            .with_context(|| format!("failed to insert tag {:?}", tag.name))?;
    }
    tag_rows.flush(tx).await.context("failed to flush tags")?;

    let mut meta_rows = Insert::<TermMetaEntry>::new();
    for entry in meta {
        meta_rows
            .insert(tx, source, entry)
            .await
            .with_context(|| format!("failed to insert meta for {:?}", entry.expression))?;
    }
    meta_rows.flush(tx).await.context("failed to flush term meta")?;

    Ok(ImportReport {
        terms_inserted: term_rows.rows(),
        terms_skipped: 0,
        tags_inserted: tag_rows.rows(),
        meta_inserted: meta_rows.rows(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        crate::{DictionaryId, config::Config, deinflect::Identity},
        tempfile::TempDir,
    };

    pub async fn engine() -> (TempDir, Engine) {
        engine_with(Config::default()).await
    }

    pub async fn engine_with(config: Config) -> (TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path().join("tapdict.db"), config, Identity)
            .await
            .unwrap();
        (dir, engine)
    }

    pub fn term(expression: &str, reading: &str, score: i64, glosses: &[&str]) -> TermEntry {
        TermEntry {
            expression: expression.into(),
            reading: reading.into(),
            score,
            definitions: glosses.iter().map(|&gloss| gloss.to_owned()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn skips_malformed_terms() {
        let (_dir, engine) = engine().await;
        let mut terms = (0..1000)
            .map(|i| term(&format!("語{i}"), "ご", 0, &["word"]))
            .collect::<Vec<_>>();
        terms[500] = term("", " ", 0, &["broken"]);

        let report = engine
            .import_dictionary(&DictionaryInfo::new("jmdict", "JMdict"), &terms, &[], &[])
            .await
            .unwrap();
        assert_eq!(999, report.terms_inserted);
        assert_eq!(1, report.terms_skipped);

        let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM terms")
            .fetch_one(&engine.db)
            .await
            .unwrap();
        assert_eq!(999, stored);
    }

    #[tokio::test]
    async fn flushes_across_bind_limit() {
        let (_dir, engine) = engine().await;
        // 9 binds per term, so this takes several statements
        let terms = (0..10_000)
            .map(|i| term(&format!("語{i}"), "ご", i, &["word"]))
            .collect::<Vec<_>>();
        let report = engine
            .import_dictionary(&DictionaryInfo::new("big", "Big"), &terms, &[], &[])
            .await
            .unwrap();
        assert_eq!(10_000, report.terms_inserted);
    }

    #[tokio::test]
    async fn reimport_overwrites() {
        let (_dir, engine) = engine().await;
        let info = DictionaryInfo::new("jmdict", "JMdict");
        engine
            .import_dictionary(&info, &[term("行く", "いく", 0, &["to go"])], &[], &[])
            .await
            .unwrap();
        let info = DictionaryInfo {
            revision: "2".into(),
            ..info
        };
        engine
            .import_dictionary(
                &info,
                &[
                    term("来る", "くる", 0, &["to come"]),
                    term("見る", "みる", 0, &["to see"]),
                ],
                &[],
                &[],
            )
            .await
            .unwrap();

        let expressions = sqlx::query_scalar::<_, String>(
            "SELECT expression FROM terms WHERE dictionary = 'jmdict' ORDER BY expression",
        )
        .fetch_all(&engine.db)
        .await
        .unwrap();
        assert_eq!(vec!["来る".to_owned(), "見る".to_owned()], expressions);

        let dicts = engine.dictionaries();
        assert_eq!(1, dicts.len());
        assert_eq!("2", dicts[&DictionaryId::from("jmdict")].revision);
    }

    #[tokio::test]
    async fn failed_import_changes_nothing() {
        let (_dir, engine) = engine().await;
        let info = DictionaryInfo::new("jmdict", "JMdict");
        engine
            .import_dictionary(&info, &[term("行く", "いく", 0, &["to go"])], &[], &[])
            .await
            .unwrap();

        let result = engine
            .import_dictionary(&info, &[term("", "", 0, &[])], &[], &[])
            .await;
        assert!(matches!(result, Err(ImportError::NoEntries)));
        let result = engine
            .import_dictionary(&DictionaryInfo::new(" ", "Nameless"), &[], &[], &[])
            .await;
        assert!(matches!(result, Err(ImportError::NoSourceId)));

        let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM terms")
            .fetch_one(&engine.db)
            .await
            .unwrap();
        assert_eq!(1, stored);
    }

    async fn count(engine: &Engine, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&engine.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_dictionary() {
        let (_dir, engine) = engine().await;
        let info = DictionaryInfo {
            revision: "1".into(),
            ..DictionaryInfo::new("jmdict", "JMdict")
        };
        engine
            .import_dictionary(&info, &[term("行く", "いく", 0, &["to go"])], &[], &[])
            .await
            .unwrap();
        let before = engine.dictionaries();

        sqlx::raw_sql(
            "CREATE TRIGGER reject_terms BEFORE INSERT ON terms
            BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&engine.db)
        .await
        .unwrap();
        let result = engine
            .import_dictionary(
                &DictionaryInfo {
                    revision: "2".into(),
                    ..info.clone()
                },
                &[term("来る", "くる", 0, &["to come"])],
                &[],
                &[],
            )
            .await;
        assert!(matches!(result, Err(ImportError::Storage(_))));

        let expressions = sqlx::query_scalar::<_, String>("SELECT expression FROM terms")
            .fetch_all(&engine.db)
            .await
            .unwrap();
        assert_eq!(vec!["行く".to_owned()], expressions);
        let revision = sqlx::query_scalar::<_, String>(
            "SELECT revision FROM dictionary_info WHERE id = 'jmdict'",
        )
        .fetch_one(&engine.db)
        .await
        .unwrap();
        assert_eq!("1", revision);
        assert_eq!(1, count(&engine, "dictionary_info").await);

        let after = engine.dictionaries();
        assert_eq!(
            before.values().collect::<Vec<_>>(),
            after.values().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn committed_import_survives_stale_snapshot() {
        let (_dir, engine) = engine().await;
        // a row the snapshot can't decode, written by the import itself
        sqlx::raw_sql(
            "CREATE TRIGGER broken_info AFTER INSERT ON dictionary_info
            WHEN NEW.id != 'broken'
            BEGIN
                INSERT INTO dictionary_info (id, title, revision, version)
                VALUES ('broken', 'Broken', '', 'not a number');
            END",
        )
        .execute(&engine.db)
        .await
        .unwrap();

        let report = engine
            .import_dictionary(
                &DictionaryInfo::new("jmdict", "JMdict"),
                &[term("行く", "いく", 0, &["to go"])],
                &[],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(1, report.terms_inserted);
        assert_eq!(1, count(&engine, "terms").await);
        assert!(engine.dictionaries().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_every_row() {
        let (_dir, engine) = engine().await;
        let info = DictionaryInfo::new("jmdict", "JMdict");
        let tags = [TagEntry {
            name: "v5k-s".into(),
            category: "partOfSpeech".into(),
            ..Default::default()
        }];
        let meta = [TermMetaEntry {
            expression: "行く".into(),
            mode: crate::meta_mode::FREQUENCY.into(),
            data: "12".into(),
            ..Default::default()
        }];
        engine
            .import_dictionary(&info, &[term("行く", "いく", 0, &["to go"])], &tags, &meta)
            .await
            .unwrap();

        engine.remove_dictionary(&info.id).await.unwrap();
        assert!(engine.dictionaries().is_empty());
        for table in ["terms", "tags", "term_meta", "dictionary_info"] {
            let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&engine.db)
                .await
                .unwrap();
            assert_eq!(0, count, "{table} should be empty");
        }

        assert!(engine.remove_dictionary(&info.id).await.is_err());
    }
}
