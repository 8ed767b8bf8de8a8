//! Maps a tap to an offset in the clean text of its block.
//!
//! The host renders the markup and knows where every character ended up on
//! screen; this module only asks it questions through [`Layout`]. A tap on
//! base text maps straight through the [`CleanTextOffsetMap`]. A tap on a
//! ruby reading is redirected to the base character it annotates by
//! [`resolve_ruby_tap`].
//!
//! [`CleanTextOffsetMap`]: crate::normalize::CleanTextOffsetMap

use {
    crate::{
        markup::{Document, NodeId},
        normalize::{NormalizedBlock, RubyUnit, normalize},
    },
    tracing::debug,
};

/// Position on screen, in the host's coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    /// Horizontal coordinate, growing rightwards.
    pub x: f64,
    /// Vertical coordinate, growing downwards.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Rect {
    /// Creates a box from its top-left corner and size.
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether `point` lies inside this box, edges included.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }

    /// How far along this box `point` lies, from 0 to 1, on the inline axis
    /// of the text: left to right for horizontal text, top to bottom for
    /// vertical text.
    #[must_use]
    pub fn fraction_along(&self, point: Point, vertical: bool) -> f64 {
        let (pos, start, extent) = if vertical {
            (point.y, self.top, self.height)
        } else {
            (point.x, self.left, self.width)
        };
        if extent <= 0.0 {
            return 0.0;
        }
        ((pos - start) / extent).clamp(0.0, 1.0)
    }
}

/// Geometry of the rendered markup, provided by the host.
pub trait Layout {
    /// Text run and character index under `point`, as reported by the host's
    /// point-to-range facility.
    ///
    /// Like a text caret, this may return the index *after* the character
    /// when the point is in that character's trailing half.
    fn position_at(&self, point: Point) -> Option<(NodeId, usize)>;

    /// Box of character `index` of text run `node`.
    fn char_rect(&self, node: NodeId, index: usize) -> Option<Rect>;

    /// Box of an element, e.g. a whole `ruby`.
    fn node_rect(&self, node: NodeId) -> Option<Rect>;

    /// Whether `block` is laid out in vertical writing mode.
    fn is_vertical(&self, block: NodeId) -> bool {
        _ = block;
        false
    }
}

/// [`Layout`] for hosts which only ever report node positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl Layout for NoLayout {
    fn position_at(&self, _: Point) -> Option<(NodeId, usize)> {
        None
    }

    fn char_rect(&self, _: NodeId, _: usize) -> Option<Rect> {
        None
    }

    fn node_rect(&self, _: NodeId) -> Option<Rect> {
        None
    }
}

/// Where the user tapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tap {
    /// Screen coordinate, resolved through [`Layout::position_at`].
    Point(Point),
    /// Position the host already resolved.
    Position {
        /// Text run (or element) containing the position.
        node: NodeId,
        /// Character index within `node`.
        offset: usize,
    },
}

/// Result of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Normalized block containing the tap.
    pub normalized: NormalizedBlock,
    /// Character offset into the clean text.
    pub offset: usize,
    /// Ruby reading annotating the character at [`Resolution::offset`].
    pub reading: Option<String>,
}

impl Resolution {
    /// Clean text of the enclosing block.
    #[must_use]
    pub fn clean_text(&self) -> &str {
        &self.normalized.clean_text
    }

    /// Up to `max_len` characters of clean text starting at the offset.
    #[must_use]
    pub fn selected(&self, max_len: usize) -> String {
        self.clean_text()
            .chars()
            .skip(self.offset)
            .take(max_len)
            .collect()
    }
}

/// Resolves a tap to an offset in the clean text of its enclosing block.
///
/// This never fails: if the tap can't be placed on any text run, the result
/// points at the start of the enclosing block, and if that block has no clean
/// text at all, the tapped node is used as its own block.
#[must_use]
pub fn resolve(doc: &Document, tap: Tap, layout: &impl Layout) -> Resolution {
    let (node, inner, point) = match tap {
        Tap::Point(point) => {
            let Some((node, caret)) = layout.position_at(point) else {
                debug!("Tap at {point:?} is not over any text, using start of document");
                return at_block_start(normalize(doc, doc.root()));
            };
            (node, prefer_preceding(layout, node, caret, point), Some(point))
        }
        Tap::Position { node, offset } => (node, offset, None),
    };

    let block = doc
        .ancestors(node)
        .find(|&id| doc.is_block(id))
        .unwrap_or(node);
    let normalized = normalize(doc, block);
    if normalized.map.is_empty() {
        debug!("Block {block:?} has no clean text, using tapped node as its own block");
        return at_block_start(normalize(doc, node));
    }

    let offset = if let Some(span) = normalized.map.span_of(node) {
        span.start + inner.min(span.len - 1)
    } else if let Some((unit, reading_index)) = normalized.reading_of(doc, node) {
        resolve_ruby_tap(
            unit,
            &RubyTap {
                reading_index: Some(reading_index),
                inner_offset: inner,
                point,
                unit_rect: layout.node_rect(unit.element),
                vertical: layout.is_vertical(block),
            },
        )
    } else if let Some(unit) = normalized.ruby_containing(doc, node) {
        // `rp` fallback text or an `rtc` container
        resolve_ruby_tap(
            unit,
            &RubyTap {
                reading_index: None,
                inner_offset: inner,
                point,
                unit_rect: layout.node_rect(unit.element),
                vertical: layout.is_vertical(block),
            },
        )
    } else if let Some(start) = first_offset_below(doc, &normalized, node, inner) {
        start
    } else {
        debug!("Tapped node {node:?} has no clean text, using start of block");
        0
    };

    let reading = normalized
        .ruby_at(offset)
        .and_then(|unit| unit.reading_at(offset));
    Resolution {
        normalized,
        offset,
        reading,
    }
}

fn at_block_start(normalized: NormalizedBlock) -> Resolution {
    let reading = normalized.ruby_at(0).and_then(|unit| unit.reading_at(0));
    Resolution {
        normalized,
        offset: 0,
        reading,
    }
}

/// Picks the character *before* the caret when its box also contains the
/// point.
///
/// Carets snap to the nearest character boundary, so tapping the right half
/// of a character yields the index after it. For lookup, the tapped character
/// itself is wanted.
fn prefer_preceding(layout: &impl Layout, node: NodeId, caret: usize, point: Point) -> usize {
    let Some(preceding) = caret.checked_sub(1) else {
        return caret;
    };
    if layout
        .char_rect(node, preceding)
        .is_some_and(|rect| rect.contains(point))
    {
        preceding
    } else {
        caret
    }
}

/// Element positions count children, like a DOM range inside an element.
fn first_offset_below(
    doc: &Document,
    normalized: &NormalizedBlock,
    node: NodeId,
    child_index: usize,
) -> Option<usize> {
    let children = doc.children(node);
    let start_at = children.get(child_index).copied().unwrap_or(node);
    doc.descendants(start_at)
        .chain(doc.descendants(node))
        .find_map(|descendant| normalized.map.offset_of(descendant))
}

/// Inputs for redirecting a tap on ruby annotation text to its base text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubyTap {
    /// Index of the tapped reading within the unit, if a reading was tapped.
    pub reading_index: Option<usize>,
    /// Character index within the tapped reading.
    pub inner_offset: usize,
    /// Screen position of the tap, if known.
    pub point: Option<Point>,
    /// Box of the whole ruby unit, if known.
    pub unit_rect: Option<Rect>,
    /// Whether the text runs top to bottom.
    pub vertical: bool,
}

/// Maps a tap on a ruby unit's annotation to a clean-text offset inside its
/// base text.
///
/// Explicit `<rb>`/`<rt>` pairs are matched by index first; if that isn't
/// possible, the tap's position across the unit decides.
#[must_use]
pub fn resolve_ruby_tap(unit: &RubyUnit, tap: &RubyTap) -> usize {
    indexed_ruby_tap(unit, tap).unwrap_or_else(|| geometric_ruby_tap(unit, tap))
}

/// N-th reading annotates the n-th base.
///
/// Only applies to explicit pairs, and fails when there are more readings
/// than bases.
fn indexed_ruby_tap(unit: &RubyUnit, tap: &RubyTap) -> Option<usize> {
    if !unit.explicit {
        return None;
    }
    let reading_index = tap.reading_index?;
    let base = unit.bases.get(reading_index)?;
    let reading_len = unit.readings.get(reading_index)?.text.chars().count();
    let base_len = base.len();
    if base_len == 0 {
        return None;
    }
    let inner_offset = tap.inner_offset.min(reading_len.saturating_sub(1));
    let within = (inner_offset * base_len)
        .checked_div(reading_len)
        .unwrap_or(0)
        .min(base_len - 1);
    Some(base.start + within)
}

/// Fraction of the way across the unit maps onto the base characters.
///
/// Uses the tap's screen position when both it and the unit's box are
/// known, otherwise the tapped character's position across all readings.
fn geometric_ruby_tap(unit: &RubyUnit, tap: &RubyTap) -> usize {
    let base_offsets = unit.bases.iter().cloned().flatten().collect::<Vec<_>>();
    let Some(&last) = base_offsets.last() else {
        return unit.range.start;
    };

    let fraction = match (tap.point, tap.unit_rect) {
        (Some(point), Some(rect)) => rect.fraction_along(point, tap.vertical),
        _ => reading_fraction(unit, tap),
    };
    let index = (fraction * base_offsets.len() as f64).floor() as usize;
    base_offsets.get(index).copied().unwrap_or(last)
}

fn reading_fraction(unit: &RubyUnit, tap: &RubyTap) -> f64 {
    let lens = unit
        .readings
        .iter()
        .map(|reading| reading.text.chars().count())
        .collect::<Vec<_>>();
    let total = lens.iter().sum::<usize>();
    let Some(reading_index) = tap.reading_index.filter(|_| total > 0) else {
        return 0.0;
    };
    let before = lens.iter().take(reading_index).sum::<usize>();
    let within = tap
        .inner_offset
        .min(lens.get(reading_index).copied().unwrap_or(0).saturating_sub(1));
    ((before + within) as f64 + 0.5) / total as f64
}
