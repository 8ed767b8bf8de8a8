//! Characters around the tapped one, so the user can move the lookup start.

use serde::{Deserialize, Serialize};

/// How many characters are picked on each side of the tapped one.
pub const PICK_RADIUS: usize = 2;

/// Character of the clean text and where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedChar {
    /// Clean-text offset, in characters.
    pub offset: usize,
    /// The character itself.
    pub character: char,
}

/// Output of [`pick_characters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterPick {
    /// Up to [`PICK_RADIUS`] characters before the tapped one, in order.
    pub before: Vec<PickedChar>,
    /// Tapped character, or [`None`] if the offset was out of bounds.
    pub current: Option<PickedChar>,
    /// Up to [`PICK_RADIUS`] characters after the tapped one, in order.
    pub after: Vec<PickedChar>,
}

impl CharacterPick {
    /// Every picked character, in text order.
    pub fn iter(&self) -> impl Iterator<Item = PickedChar> + '_ {
        self.before
            .iter()
            .chain(&self.current)
            .chain(&self.after)
            .copied()
    }
}

/// Picks the character at `offset` and its neighbours.
///
/// An out-of-bounds offset picks nothing.
#[must_use]
pub fn pick_characters(text: &str, offset: usize) -> CharacterPick {
    let first = offset.saturating_sub(PICK_RADIUS);
    let mut pick = CharacterPick::default();
    for (i, character) in text.chars().enumerate().skip(first) {
        let picked = PickedChar {
            offset: i,
            character,
        };
        match i.cmp(&offset) {
            std::cmp::Ordering::Less => pick.before.push(picked),
            std::cmp::Ordering::Equal => pick.current = Some(picked),
            std::cmp::Ordering::Greater if i <= offset + PICK_RADIUS => pick.after.push(picked),
            std::cmp::Ordering::Greater => break,
        }
    }
    if pick.current.is_none() {
        return CharacterPick::default();
    }
    pick
}
