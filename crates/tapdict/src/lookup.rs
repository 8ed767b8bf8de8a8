//! Finding dictionary entries for the text after a tapped character.

use {
    crate::{
        DictionaryId, Engine, IndexMap, IndexSet, TermEntry, TermMetaEntry,
        deinflect::Deinflection,
        lang::jpn,
        meta_mode,
        rank::{DictionaryEntry, DictionaryMatch, EntrySource, MeaningGroup},
    },
    anyhow::{Context, Result},
    std::cmp::Reverse,
    tracing::{debug, trace},
};

type MetaCache = IndexMap<(String, &'static str), Vec<TermMetaEntry>>;

impl Engine {
    /// Looks up every dictionary entry starting at character `offset` of
    /// `text`, then merges and ranks them.
    ///
    /// Deinflected forms come from the engine's [`Deinflector`].
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    ///
    /// [`Deinflector`]: crate::deinflect::Deinflector
    pub async fn lookup(
        &self,
        text: &str,
        offset: usize,
        sources: &[DictionaryId],
    ) -> Result<Vec<DictionaryEntry>> {
        let window = self.scan_window(text, offset);
        let deinflections = self.deinflector.deinflect(&window);
        let matches = self
            .find_matches(text, offset, sources, &deinflections)
            .await?;
        Ok(self.ranker().merge_and_rank(&matches))
    }

    fn scan_window(&self, text: &str, offset: usize) -> String {
        text.chars()
            .skip(offset)
            .take(self.config.max_scan_len)
            .collect()
    }

    /// Finds entries for every prefix of the text at `offset`, grouped by the
    /// matched span, longest span first.
    ///
    /// At most [`Config::max_scan_len`] characters are scanned. If the text
    /// starts with kana, readings are matched as well as headwords. Entries
    /// for `deinflections` are added after all literal matches, skipping rows
    /// which already matched literally.
    ///
    /// Each entry carries one source and one meaning group; merging across
    /// dictionaries is left to the [`Ranker`].
    ///
    /// # Errors
    ///
    /// Errors if the database could not be read.
    ///
    /// [`Config::max_scan_len`]: crate::config::Config::max_scan_len
    /// [`Ranker`]: crate::rank::Ranker
    pub async fn find_matches(
        &self,
        text: &str,
        offset: usize,
        sources: &[DictionaryId],
        deinflections: &[Deinflection],
    ) -> Result<Vec<DictionaryMatch>> {
        let max_len = self.config.max_scan_len;
        let window = self.scan_window(text, offset);
        if window.is_empty() || sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = self
            .lookup_by_expression_prefix(&window, max_len, sources)
            .await?
            .into_iter()
            .map(|term| (prefix(&window, term.expression.chars().count()), term))
            .collect::<Vec<_>>();
        if window.starts_with(jpn::is_kana) {
            let hiragana = jpn::kana_to_hiragana(&window);
            for term in self
                .lookup_by_reading_prefix(&hiragana, max_len, sources)
                .await?
            {
                hits.push((prefix(&window, term.reading.chars().count()), term));
            }
        }
        hits.sort_by_key(|(word, _)| Reverse(word.chars().count()));

        let mut seen = IndexSet::<TermEntry>::default();
        let mut words = IndexMap::<String, Vec<TermEntry>>::default();
        for (word, term) in hits {
            if seen.insert(term.clone()) {
                words.entry(word).or_default().push(term);
            }
        }

        for deinflection in deinflections {
            let surface = prefix(&window, deinflection.scan_len);
            if deinflection.lemma.is_empty() || deinflection.lemma == surface {
                continue;
            }
            let lemma_len = deinflection.lemma.chars().count();
            let terms = self
                .lookup_by_expression_prefix(&deinflection.lemma, lemma_len, sources)
                .await
                .with_context(|| format!("failed to look up lemma {:?}", deinflection.lemma))?;
            for term in terms
                .into_iter()
                .filter(|term| term.expression == deinflection.lemma)
            {
                if seen.insert(term.clone()) {
                    trace!("{surface:?} deinflects to {:?}", term.expression);
                    words.entry(surface.clone()).or_default().push(term);
                }
            }
        }

        let mut meta = MetaCache::default();
        let mut next_id = 0;
        let mut matches = Vec::with_capacity(words.len());
        for (word, terms) in words {
            let mut entries = Vec::with_capacity(terms.len());
            for term in terms {
                entries.push(self.to_entry(next_id, term, sources, &mut meta).await?);
                next_id += 1;
            }
            matches.push(DictionaryMatch { word, entries });
        }
        debug!(
            "{} entries in {} matches for {window:?}",
            next_id,
            matches.len()
        );
        Ok(matches)
    }

    async fn to_entry(
        &self,
        id: usize,
        term: TermEntry,
        sources: &[DictionaryId],
        meta: &mut MetaCache,
    ) -> Result<DictionaryEntry> {
        let meaning_tags = self.lookup_tags(&term.dictionary, &term.term_tags).await?;
        let frequency = pick_meta(
            self.cached_meta(meta, &term.expression, meta_mode::FREQUENCY)
                .await?,
            &term,
            sources,
        );
        let pitch_accents = pick_meta(
            self.cached_meta(meta, &term.expression, meta_mode::PITCH)
                .await?,
            &term,
            sources,
        );

        Ok(DictionaryEntry {
            id,
            term: term.expression,
            reading: term.reading,
            meanings: term.definitions.clone(),
            meaning_tags,
            term_tags: term.term_tags,
            score: term.score,
            source: EntrySource::Dictionary(term.dictionary.clone()),
            frequency,
            pitch_accents,
            groups: vec![MeaningGroup {
                source: term.dictionary,
                meanings: term.definitions,
            }],
        })
    }

    async fn cached_meta<'c>(
        &self,
        cache: &'c mut MetaCache,
        expression: &str,
        mode: &'static str,
    ) -> Result<&'c [TermMetaEntry]> {
        let key = (expression.to_owned(), mode);
        if !cache.contains_key(&key) {
            let rows = self.lookup_meta(expression, mode).await?;
            cache.insert(key.clone(), rows);
        }
        Ok(cache.get(&key).map(Vec::as_slice).unwrap_or_default())
    }
}

/// First `len` characters of `text`.
fn prefix(text: &str, len: usize) -> String {
    text.chars().take(len).collect()
}

/// Payload from the term's own dictionary if it has one, otherwise from the
/// first enabled dictionary that does.
fn pick_meta(rows: &[TermMetaEntry], term: &TermEntry, sources: &[DictionaryId]) -> Option<String> {
    let enabled = rows.iter().filter(|row| sources.contains(&row.dictionary));
    enabled
        .clone()
        .find(|row| row.dictionary == term.dictionary)
        .or_else(|| enabled.clone().next())
        .map(|row| row.data.clone())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            DictionaryInfo, TagEntry,
            config::Config,
            import::tests::{engine, term},
        },
    };

    fn words(matches: &[DictionaryMatch]) -> Vec<(&str, Vec<&str>)> {
        matches
            .iter()
            .map(|m| {
                (
                    m.word.as_str(),
                    m.entries.iter().map(|e| e.term.as_str()).collect(),
                )
            })
            .collect()
    }

    async fn jmdict(engine: &Engine) -> Vec<DictionaryId> {
        engine
            .import_dictionary(
                &DictionaryInfo::new("jmdict", "JMdict"),
                &[
                    TermEntry {
                        term_tags: vec!["v5k-s".into()],
                        ..term("行く", "いく", 0, &["to go"])
                    },
                    term("行", "ぎょう", 0, &["line"]),
                    term("行方", "ゆくえ", 0, &["whereabouts"]),
                    term("いく", "", 0, &["(kana) to go"]),
                ],
                &[TagEntry {
                    name: "v5k-s".into(),
                    category: "partOfSpeech".into(),
                    notes: "Godan verb - Iku/Yuku special class".into(),
                    ..Default::default()
                }],
                &[TermMetaEntry {
                    expression: "行く".into(),
                    mode: meta_mode::FREQUENCY.into(),
                    data: "42".into(),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();
        vec!["jmdict".into()]
    }

    #[tokio::test]
    async fn longest_word_first() {
        let (_dir, engine) = engine().await;
        let sources = jmdict(&engine).await;
        let matches = engine
            .find_matches("彼は行くよ", 2, &sources, &[])
            .await
            .unwrap();
        assert_eq!(vec![("行く", vec!["行く"]), ("行", vec!["行"])], words(&matches));

        let iku = &matches[0].entries[0];
        assert_eq!(Some("42".to_owned()), iku.frequency);
        assert_eq!("v5k-s", iku.meaning_tags[0].name);
        assert_eq!(EntrySource::Dictionary("jmdict".into()), iku.source);
        assert_eq!(1, matches[1].entries[0].id);
    }

    #[tokio::test]
    async fn kana_matches_readings() {
        let (_dir, engine) = engine().await;
        let sources = jmdict(&engine).await;
        let matches = engine.find_matches("いくよ", 0, &sources, &[]).await.unwrap();
        assert_eq!(vec![("いく", vec!["いく", "行く"])], words(&matches));

        let matches = engine.find_matches("イクよ", 0, &sources, &[]).await.unwrap();
        assert_eq!(vec![("イク", vec!["行く"])], words(&matches));
    }

    #[tokio::test]
    async fn deinflections_after_literal() {
        let (_dir, engine) = engine().await;
        let sources = jmdict(&engine).await;
        let matches = engine
            .find_matches(
                "行った",
                0,
                &sources,
                &[Deinflection::new("行く", 3), Deinflection::new("行った", 3)],
            )
            .await
            .unwrap();
        assert_eq!(
            vec![("行", vec!["行"]), ("行った", vec!["行く"])],
            words(&matches)
        );
    }

    #[tokio::test]
    async fn nothing_found() {
        let (_dir, engine) = engine().await;
        let sources = jmdict(&engine).await;
        assert!(engine.find_matches("猫", 0, &sources, &[]).await.unwrap().is_empty());
        assert!(engine.find_matches("行く", 5, &sources, &[]).await.unwrap().is_empty());
        assert!(engine.find_matches("行く", 0, &[], &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_len_is_configured() {
        let (_dir, engine) = crate::import::tests::engine_with(Config {
            max_scan_len: 1,
            ..Default::default()
        })
        .await;
        let sources = jmdict(&engine).await;
        let matches = engine.find_matches("行く", 0, &sources, &[]).await.unwrap();
        assert_eq!(vec![("行", vec!["行"])], words(&matches));
    }

    #[tokio::test]
    async fn lookup_with_deinflector() {
        let dir = tempfile::tempdir().unwrap();
        let deinflector = |text: &str| {
            if text.starts_with("行った") {
                vec![Deinflection::new("行く", 3)]
            } else {
                Vec::new()
            }
        };
        let engine = Engine::new(dir.path().join("tapdict.db"), Config::default(), deinflector)
            .await
            .unwrap();
        let sources = jmdict(&engine).await;

        let entries = engine.lookup("行ったよ", 0, &sources).await.unwrap();
        let found = entries
            .iter()
            .map(|e| (e.term.as_str(), e.reading.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(vec![("行", "ぎょう"), ("行く", "いく")], found);
    }
}
