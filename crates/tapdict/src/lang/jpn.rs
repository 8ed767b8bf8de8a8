//! Japanese script classification.

/// Checks if the given character is hiragana.
///
/// # Examples
///
/// ```
/// # use tapdict::lang::jpn::is_hiragana;
/// assert!(is_hiragana('あ'));
/// assert!(is_hiragana('ん'));
/// assert!(!is_hiragana('ア'));
/// assert!(!is_hiragana('A'));
/// ```
#[must_use]
pub fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Checks if the given character is katakana, including the prolonged sound
/// mark `ー`.
///
/// # Examples
///
/// ```
/// # use tapdict::lang::jpn::is_katakana;
/// assert!(is_katakana('ア'));
/// assert!(is_katakana('ー'));
/// assert!(!is_katakana('あ'));
/// assert!(!is_katakana('A'));
/// ```
#[must_use]
pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c) || ('\u{31F0}'..='\u{31FF}').contains(&c)
}

/// Checks if the given character is either hiragana or katakana.
#[must_use]
pub fn is_kana(c: char) -> bool {
    is_hiragana(c) || is_katakana(c)
}

/// Checks if the given character is a CJK ideograph (kanji): the unified
/// ideographs with every extension block, the compatibility ideographs, and
/// the iteration mark `々`.
///
/// # Examples
///
/// ```
/// # use tapdict::lang::jpn::is_kanji;
/// assert!(is_kanji('漢'));
/// assert!(is_kanji('々'));
/// assert!(is_kanji('𠮟'));
/// assert!(is_kanji('\u{2F800}'));
/// assert!(!is_kanji('か'));
/// assert!(!is_kanji('。'));
/// ```
#[must_use]
pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{F900}'..='\u{FAFF}').contains(&c)
        // extensions B to H, with the compatibility supplement in between
        || ('\u{20000}'..='\u{323AF}').contains(&c)
        || c == '々'
}

/// Whether any character of `s` is kanji.
#[must_use]
pub fn contains_kanji(s: &str) -> bool {
    s.chars().any(is_kanji)
}

/// Converts katakana characters to hiragana characters.
///
/// Characters that are not katakana, or have no hiragana counterpart, are
/// left unchanged.
///
/// # Examples
///
/// ```
/// # use tapdict::lang::jpn::kana_to_hiragana;
/// assert_eq!(kana_to_hiragana("カタカナ"), "かたかな");
/// assert_eq!(kana_to_hiragana("ひらがな"), "ひらがな");
/// assert_eq!(kana_to_hiragana("ミックス文字"), "みっくす文字");
/// ```
#[must_use]
pub fn kana_to_hiragana(s: &str) -> String {
    s.chars()
        .map(|c| {
            if ('\u{30A1}'..='\u{30F6}').contains(&c) {
                let offset = c as u32 - 0x30A0;
                char::from_u32(0x3040 + offset).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanji_detection() {
        assert!(contains_kanji("行く"));
        assert!(contains_kanji("人々"));
        assert!(contains_kanji("𠮟る"));
        assert!(!contains_kanji("いく"));
        assert!(!contains_kanji("コーヒー"));
        assert!(!contains_kanji(""));
    }

    #[test]
    fn long_vowel_mark_is_left_alone() {
        assert_eq!(kana_to_hiragana("コーヒー"), "こーひー");
    }
}
