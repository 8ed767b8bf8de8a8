//! From a tap on rendered markup to ranked dictionary entries.
//!
//! The host first turns a tap into a [`TapEvent`] with
//! [`Engine::tap_event`], which only needs the markup and its layout. The
//! event is plain data, so it can cross a process or FFI boundary before
//! being handed to [`Engine::lookup_tap`].

use {
    crate::{
        DictionaryId, Engine,
        markup::Document,
        picker::{CharacterPick, pick_characters},
        rank::DictionaryEntry,
        resolve::{Layout, Resolution, Tap, resolve},
        sentence::{extract_sentence, sentence_at},
    },
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

/// What the user tapped, in terms of the clean text of its block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapEvent {
    /// Clean text from the tapped character onwards, up to the scan length.
    pub text: String,
    /// Ruby reading over the tapped character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    /// Sentence containing the tapped character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrounding_text: Option<String>,
    /// Offset of the tapped character in [`TapEvent::full_text`], in
    /// characters.
    pub absolute_offset: usize,
    /// Clean text of the whole block.
    pub full_text: String,
}

impl TapEvent {
    /// Builds the event for a resolved tap, taking up to `scan_len`
    /// characters as [`TapEvent::text`].
    #[must_use]
    pub fn from_resolution(resolution: &Resolution, scan_len: usize) -> Self {
        Self {
            text: resolution.selected(scan_len),
            reading: resolution.reading.clone(),
            surrounding_text: sentence_at(resolution.clean_text(), resolution.offset)
                .map(ToOwned::to_owned),
            absolute_offset: resolution.offset,
            full_text: resolution.clean_text().to_owned(),
        }
    }
}

/// Everything the display layer needs for one tap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOutput {
    /// Ranked entries, best first.
    pub entries: Vec<DictionaryEntry>,
    /// Sentence the tap landed in.
    pub sentence: String,
    /// Characters around the tapped one.
    pub characters: CharacterPick,
}

impl Engine {
    /// Resolves a tap on `doc` and describes it as a [`TapEvent`].
    #[must_use]
    pub fn tap_event(&self, doc: &Document, tap: Tap, layout: &impl Layout) -> TapEvent {
        let resolution = resolve(doc, tap, layout);
        debug!(
            "Tap resolved to offset {} of {:?}",
            resolution.offset,
            resolution.clean_text()
        );
        TapEvent::from_resolution(&resolution, self.config.max_scan_len)
    }

    /// Looks up the entries for a tap in the given dictionaries.
    ///
    /// This never fails: if the store can't be read, the error is logged and
    /// no entries are returned.
    pub async fn lookup_tap(&self, event: &TapEvent, sources: &[DictionaryId]) -> LookupOutput {
        let sentence = event.surrounding_text.clone().unwrap_or_else(|| {
            extract_sentence(&event.full_text, event.absolute_offset, &event.text).to_owned()
        });
        let characters = pick_characters(&event.full_text, event.absolute_offset);
        let entries = match self
            .lookup(&event.full_text, event.absolute_offset, sources)
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to look up {:?}: {err:?}", event.text);
                Vec::new()
            }
        };
        LookupOutput {
            entries,
            sentence,
            characters,
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            DictionaryInfo,
            import::tests::{engine, term},
            resolve::NoLayout,
        },
    };

    const MARKUP: &str = "<p>今日は<ruby>晴<rt>は</rt></ruby>れです。明日は雨でしょう。</p>";

    fn tap_on_hare(engine: &Engine) -> TapEvent {
        let doc = Document::parse(MARKUP).unwrap();
        let node = doc
            .descendants(doc.root())
            .find(|&id| doc.text(id) == Some("晴"))
            .unwrap();
        engine.tap_event(&doc, Tap::Position { node, offset: 0 }, &NoLayout)
    }

    #[tokio::test]
    async fn event_from_markup() {
        let (_dir, engine) = engine().await;
        let event = tap_on_hare(&engine);
        assert_eq!(
            TapEvent {
                text: "晴れです。明日は雨でしょう。".into(),
                reading: Some("は".into()),
                surrounding_text: Some("今日は晴れです。".into()),
                absolute_offset: 3,
                full_text: "今日は晴れです。明日は雨でしょう。".into(),
            },
            event
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(3, json["absoluteOffset"]);
        assert_eq!("今日は晴れです。", json["surroundingText"]);
        assert_eq!("今日は晴れです。明日は雨でしょう。", json["fullText"]);
    }

    #[tokio::test]
    async fn lookup_from_tap() {
        let (_dir, engine) = engine().await;
        engine
            .import_dictionary(
                &DictionaryInfo::new("jmdict", "JMdict"),
                &[
                    term("晴れ", "はれ", 0, &["clear weather"]),
                    term("晴", "せい", 0, &["fine weather"]),
                ],
                &[],
                &[],
            )
            .await
            .unwrap();
        let event = tap_on_hare(&engine);
        let output = engine.lookup_tap(&event, &["jmdict".into()]).await;

        assert_eq!("今日は晴れです。", output.sentence);
        let found = output
            .entries
            .iter()
            .map(|e| e.term.as_str())
            .collect::<Vec<_>>();
        assert_eq!(vec!["晴れ", "晴"], found);
        assert_eq!(
            "日は晴れで",
            output.characters.iter().map(|p| p.character).collect::<String>()
        );
    }

    #[tokio::test]
    async fn storage_failure_is_empty() {
        let (_dir, engine) = engine().await;
        let event = tap_on_hare(&engine);
        engine.db.close().await;

        let output = engine.lookup_tap(&event, &["jmdict".into()]).await;
        assert!(output.entries.is_empty());
        assert_eq!("今日は晴れです。", output.sentence);
    }

    #[tokio::test]
    async fn event_without_context() {
        let (_dir, engine) = engine().await;
        let event = TapEvent {
            text: "猫".into(),
            absolute_offset: 10,
            full_text: "猫".into(),
            ..Default::default()
        };
        let output = engine.lookup_tap(&event, &[]).await;
        assert_eq!(LookupOutput {
            sentence: "猫".into(),
            ..Default::default()
        }, output);
    }
}
