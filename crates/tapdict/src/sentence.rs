//! Sentence context around a tapped character.

/// Characters which end a sentence.
pub const SENTENCE_ENDERS: &[char] = &['。', '！', '？', '!', '?'];

fn is_ender(c: char) -> bool {
    SENTENCE_ENDERS.contains(&c)
}

/// Sentence of `text` containing character `offset`, trimmed, or [`None`]
/// if `offset` is past the end of `text`.
///
/// The sentence runs from just after the previous ender up to and including
/// the next ender at or after `offset`. Text without enders is one sentence.
///
/// ```
/// # use tapdict::sentence::sentence_at;
/// let text = "今日は晴れです。明日は雨でしょう。";
/// assert_eq!(Some("今日は晴れです。"), sentence_at(text, 0));
/// assert_eq!(Some("明日は雨でしょう。"), sentence_at(text, 8));
/// assert_eq!(None, sentence_at(text, 100));
/// ```
#[must_use]
pub fn sentence_at(text: &str, offset: usize) -> Option<&str> {
    let chars = text.char_indices().collect::<Vec<_>>();
    if offset >= chars.len() {
        return None;
    }

    let start = chars[..offset]
        .iter()
        .rposition(|&(_, c)| is_ender(c))
        .map_or(0, |ender| chars[ender + 1].0);
    let end = chars[offset..]
        .iter()
        .find(|&&(_, c)| is_ender(c))
        .map_or(text.len(), |&(i, c)| i + c.len_utf8());
    Some(text[start..end].trim())
}

/// Like [`sentence_at`], but falls back to `selected` (usually the text the
/// user tapped) when `offset` is out of bounds.
#[must_use]
pub fn extract_sentence<'a>(text: &'a str, offset: usize, selected: &'a str) -> &'a str {
    sentence_at(text, offset).unwrap_or(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "今日は晴れです。明日は雨でしょう。";

    #[test]
    fn first_sentence() {
        assert_eq!("今日は晴れです。", extract_sentence(TEXT, 0, "今日"));
        // the ender belongs to the sentence it ends
        assert_eq!("今日は晴れです。", extract_sentence(TEXT, 7, "。"));
    }

    #[test]
    fn last_sentence_without_ender() {
        let text = "本当？ うん、そうだよ";
        assert_eq!("うん、そうだよ", extract_sentence(text, 5, "ん"));
        assert_eq!("本当？", extract_sentence(text, 1, "当"));
    }

    #[test]
    fn no_enders() {
        assert_eq!("ただの文章", extract_sentence("  ただの文章 ", 3, "の"));
    }

    #[test]
    fn out_of_bounds_uses_selection() {
        assert_eq!("晴れ", extract_sentence(TEXT, 17, "晴れ"));
        assert_eq!("x", extract_sentence("", 0, "x"));
    }

    #[test]
    fn sentence_contains_offset() {
        let text = "Is it? Yes! 本当に。はい";
        for (offset, c) in text.chars().enumerate() {
            let sentence = extract_sentence(text, offset, "");
            if !c.is_whitespace() {
                assert!(sentence.contains(c), "{sentence:?} should contain {c:?}");
            }
            assert!(
                SENTENCE_ENDERS
                    .iter()
                    .all(|&ender| !sentence.trim_end_matches(ender).contains(ender)),
                "{sentence:?} spans more than one sentence"
            );
        }
    }
}
