//! Imported dictionary bookkeeping.

use {
    crate::{DictionaryId, DictionaryInfo, Engine, IndexMap, config::Config},
    anyhow::{Context, Result, bail},
    derive_more::{Deref, Display, Error},
    futures::TryStreamExt,
    sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow},
    std::sync::Arc,
    tracing::info,
};

/// Snapshot of every imported dictionary, ordered by identifier.
#[derive(Debug, Default, Deref)]
pub struct Dictionaries(pub IndexMap<DictionaryId, Arc<DictionaryInfo>>);

/// No dictionary exists with the given identifier.
#[derive(Debug, Clone, Display, Error)]
#[display("dictionary not found")]
pub struct NotFound;

impl Dictionaries {
    pub(super) async fn fetch(db: &Pool<Sqlite>) -> Result<Self> {
        let dictionaries = sqlx::query(
            "SELECT id, title, revision, version, author, url, description, attribution,
                source_language, target_language, created_at, is_proper_name
            FROM dictionary_info
            ORDER BY id",
        )
        .fetch(db)
        .map_err(anyhow::Error::from)
        .and_then(|row| async move { from_row(&row) })
        .map_ok(|dict| (dict.id.clone(), Arc::new(dict)))
        .try_collect::<IndexMap<_, _>>()
        .await
        .context("failed to fetch dictionaries")?;
        Ok(Self(dictionaries))
    }

    /// Whether every entry of `id` should be treated as a proper name.
    ///
    /// Uses the explicit flag first, then falls back to looking for one of
    /// [`Config::proper_name_markers`] in the title or identifier. Unknown
    /// dictionaries are only matched by identifier.
    #[must_use]
    pub fn is_proper_name(&self, id: &DictionaryId, config: &Config) -> bool {
        match self.get(id) {
            Some(dict) => {
                dict.is_proper_name
                    || config.has_proper_name_marker(&dict.title)
                    || config.has_proper_name_marker(dict.id.as_str())
            }
            None => config.has_proper_name_marker(id.as_str()),
        }
    }
}

fn from_row(row: &SqliteRow) -> Result<DictionaryInfo> {
    Ok(DictionaryInfo {
        id: DictionaryId(row.try_get("id")?),
        title: row.try_get("title")?,
        revision: row.try_get("revision")?,
        version: row.try_get("version")?,
        author: row.try_get("author")?,
        url: row.try_get("url")?,
        description: row.try_get("description")?,
        attribution: row.try_get("attribution")?,
        source_language: row.try_get("source_language")?,
        target_language: row.try_get("target_language")?,
        created_at: row.try_get("created_at")?,
        is_proper_name: row.try_get("is_proper_name")?,
    })
}

impl Engine {
    /// Current snapshot of imported dictionaries.
    #[must_use]
    pub fn dictionaries(&self) -> Arc<Dictionaries> {
        self.dictionaries.load().clone()
    }

    pub(crate) async fn sync_dictionaries(&self) -> Result<()> {
        let dictionaries = Dictionaries::fetch(&self.db)
            .await
            .context("failed to sync dictionaries")?;
        self.dictionaries.store(Arc::new(dictionaries));
        Ok(())
    }

    /// Deletes a dictionary and every row it owns, atomically.
    ///
    /// # Errors
    ///
    /// Errors with [`NotFound`] if no such dictionary exists, or if the
    /// database could not be written.
    pub async fn remove_dictionary(&self, id: &DictionaryId) -> Result<()> {
        let _lock = self.imports.lock().await;
        let mut tx = self.db.begin().await.context("failed to begin transaction")?;
        let removed = sqlx::query("DELETE FROM dictionary_info WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .context("failed to delete dictionary info")?
            .rows_affected();
        if removed == 0 {
            bail!(NotFound);
        }
        for table in ["terms", "tags", "term_meta"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE dictionary = $1"))
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to delete {table} rows"))?;
        }
        tx.commit().await.context("failed to commit transaction")?;
        info!("Removed dictionary {id}");

        self.sync_dictionaries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionaries(infos: impl IntoIterator<Item = DictionaryInfo>) -> Dictionaries {
        Dictionaries(
            infos
                .into_iter()
                .map(|info| (info.id.clone(), Arc::new(info)))
                .collect(),
        )
    }

    #[test]
    fn proper_name_flag_and_marker() {
        let config = Config::default();
        let dicts = dictionaries([
            DictionaryInfo::new("jmdict", "JMdict"),
            DictionaryInfo::new("imported_1", "JMnedict (2024)"),
            DictionaryInfo {
                is_proper_name: true,
                ..DictionaryInfo::new("names", "Place names")
            },
        ]);

        assert!(!dicts.is_proper_name(&"jmdict".into(), &config));
        assert!(dicts.is_proper_name(&"imported_1".into(), &config));
        assert!(dicts.is_proper_name(&"names".into(), &config));
        assert!(dicts.is_proper_name(&"jmnedict".into(), &config));
        assert!(!dicts.is_proper_name(&"unknown".into(), &config));
    }
}
