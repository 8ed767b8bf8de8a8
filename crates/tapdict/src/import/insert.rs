//! Batched row insertion.
//!
//! One `INSERT` per row means one database round-trip per row, which makes
//! importing a large dictionary take minutes. [`Insert`] instead keeps
//! appending `VALUES` tuples to a single statement, and only executes it once
//! the next row would push it past [`BIND_LIMIT`] bound parameters.

use {
    crate::{
        DictionaryId, TagEntry, TermEntry, TermMetaEntry,
        db::{join_codes, join_definitions},
    },
    anyhow::{Context, Result},
    sqlx::{QueryBuilder, Sqlite, Transaction, query_builder::Separated},
    std::marker::PhantomData,
};

/// SQLite bind parameter count limit.
const BIND_LIMIT: usize = 32766;

pub struct Insert<T> {
    qb: QueryBuilder<'static, Sqlite>,
    binds: usize,
    rows: usize,
    _phantom: PhantomData<T>,
}

impl<T> Insert<T> {
    fn with_prefix(prefix: &str) -> Self {
        Self {
            qb: QueryBuilder::new(prefix),
            binds: 0,
            rows: 0,
            _phantom: PhantomData,
        }
    }

    /// Rows added so far, flushed or not.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub async fn flush(&mut self, tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
        if self.binds == 0 {
            return Ok(());
        }

        self.qb
            .build()
            .execute(&mut **tx)
            .await
            .context("failed to insert")?;
        self.qb.reset();
        self.binds = 0;
        Ok(())
    }

    async fn do_insert<const N: usize>(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        f: impl FnOnce(Separated<'_, '_, Sqlite, &str>),
    ) -> Result<()> {
        if self.binds + N >= BIND_LIMIT {
            self.flush(tx).await.context(
                "failed to flush (error may be related to a previous insert, not the current one)",
            )?;
        }
        if self.binds > 0 {
            self.qb.push(", ");
        }
        self.binds += N;
        self.rows += 1;
        self.qb.push("(");

        f(self.qb.separated(", "));

        self.qb.push(")");
        Ok(())
    }
}

impl Insert<TermEntry> {
    pub fn new() -> Self {
        Self::with_prefix(
            "INSERT INTO terms (expression, reading, term_tags, score, rules, definitions,
                sequence, popularity, dictionary)
            VALUES ",
        )
    }

    pub async fn insert(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        source: &DictionaryId,
        term: &TermEntry,
    ) -> Result<()> {
        let term_tags = join_codes(&term.term_tags);
        let rules = join_codes(&term.rules);
        let definitions = join_definitions(&term.definitions);
        let source = source.0.clone();
        self.do_insert::<9>(tx, |mut qb| {
            qb.push_bind(term.expression.clone());
            qb.push_bind(term.reading.clone());
            qb.push_bind(term_tags);
            qb.push_bind(term.score.to_string());
            qb.push_bind(rules);
            qb.push_bind(definitions);
            qb.push_bind(term.sequence);
            qb.push_bind(term.popularity.clone());
            qb.push_bind(source);
        })
        .await
    }
}

impl Insert<TagEntry> {
    pub fn new() -> Self {
        Self::with_prefix(
            "INSERT INTO tags (name, category, order_num, notes, score, dictionary)
            VALUES ",
        )
    }

    pub async fn insert(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        source: &DictionaryId,
        tag: &TagEntry,
    ) -> Result<()> {
        let source = source.0.clone();
        self.do_insert::<6>(tx, |mut qb| {
            qb.push_bind(tag.name.clone());
            qb.push_bind(tag.category.clone());
            qb.push_bind(tag.order);
            qb.push_bind(tag.notes.clone());
            qb.push_bind(tag.score);
            qb.push_bind(source);
        })
        .await
    }
}

impl Insert<TermMetaEntry> {
    pub fn new() -> Self {
        Self::with_prefix(
            "INSERT INTO term_meta (expression, mode, data, dictionary)
            VALUES ",
        )
    }

    pub async fn insert(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        source: &DictionaryId,
        meta: &TermMetaEntry,
    ) -> Result<()> {
        let source = source.0.clone();
        self.do_insert::<4>(tx, |mut qb| {
            qb.push_bind(meta.expression.clone());
            qb.push_bind(meta.mode.clone());
            qb.push_bind(meta.data.clone());
            qb.push_bind(source);
        })
        .await
    }
}
