//! Strips ruby readings from a block of markup.
//!
//! The text a reader sees as a sentence is the base text only: in
//! `<ruby>漢字<rt>かんじ</rt></ruby>です` the readable text is `漢字です`, and
//! all offsets handed to the rest of the pipeline point into that "clean"
//! text. [`normalize`] produces the clean text together with a
//! [`CleanTextOffsetMap`] relating it back to the text runs of the markup, and
//! a list of every [`RubyUnit`] so that taps on a reading can be redirected to
//! the base text it annotates.

use {
    crate::markup::{Document, NodeId, NodeKind},
    std::ops::Range,
};

/// Contiguous range of clean text contributed by one text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of the first character, in characters.
    pub start: usize,
    /// Length in characters.
    pub len: usize,
    /// Text run this range was taken from.
    pub node: NodeId,
}

impl Span {
    /// One past the last character of this span.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Maps clean-text offsets to text runs and back.
///
/// Spans are in document order, contiguous, non-overlapping and together
/// cover the clean text exactly once. Reading runs have no span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanTextOffsetMap {
    spans: Vec<Span>,
}

impl CleanTextOffsetMap {
    /// All spans in document order.
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Length of the clean text, in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.last().map_or(0, Span::end)
    }

    /// Whether the clean text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span contributed by `node`, if it contributed any text.
    #[must_use]
    pub fn span_of(&self, node: NodeId) -> Option<&Span> {
        self.spans.iter().find(|span| span.node == node)
    }

    /// Clean-text offset at which `node`'s text starts.
    #[must_use]
    pub fn offset_of(&self, node: NodeId) -> Option<usize> {
        self.span_of(node).map(|span| span.start)
    }

    /// Text run and character index within it for a clean-text offset.
    #[must_use]
    pub fn locate(&self, offset: usize) -> Option<(NodeId, usize)> {
        let index = self.spans.partition_point(|span| span.end() <= offset);
        let span = self.spans.get(index)?;
        Some((span.node, offset - span.start))
    }

    fn push(&mut self, node: NodeId, len: usize) {
        let start = self.len();
        self.spans.push(Span { start, len, node });
    }
}

/// Reading annotation (`<rt>`) belonging to a [`RubyUnit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRun {
    /// The `rt` element.
    pub element: NodeId,
    /// Its text.
    pub text: String,
}

/// One `<ruby>` element after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyUnit {
    /// The `ruby` element.
    pub element: NodeId,
    /// Clean-text range of everything inside the element.
    pub range: Range<usize>,
    /// Clean-text ranges of the base sub-units, in order.
    ///
    /// With explicit `<rb>` markup there is one range per `rb`. Without it the
    /// whole base text is a single range.
    pub bases: Vec<Range<usize>>,
    /// Reading annotations, in order.
    pub readings: Vec<ReadingRun>,
    /// Whether the bases came from explicit `<rb>` elements.
    pub explicit: bool,
}

impl RubyUnit {
    /// Number of base characters across all base sub-units.
    #[must_use]
    pub fn base_len(&self) -> usize {
        self.bases.iter().map(ExactSizeIterator::len).sum()
    }

    /// Reading annotating the base character at clean offset `offset`.
    ///
    /// With explicit pairs this is the reading at the same index as the base
    /// containing `offset`; otherwise every reading of the unit, joined.
    #[must_use]
    pub fn reading_at(&self, offset: usize) -> Option<String> {
        if self.explicit {
            let index = self.bases.iter().position(|base| base.contains(&offset))?;
            if let Some(reading) = self.readings.get(index) {
                return Some(reading.text.clone()).filter(|text| !text.is_empty());
            }
        }
        let joined = self
            .readings
            .iter()
            .map(|reading| reading.text.as_str())
            .collect::<String>();
        Some(joined).filter(|text| !text.is_empty())
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBlock {
    /// Node the block was built from.
    pub block: NodeId,
    /// Block text with every reading annotation removed.
    pub clean_text: String,
    /// Offset map for [`NormalizedBlock::clean_text`].
    pub map: CleanTextOffsetMap,
    /// Ruby units found in the block, in document order of their start.
    pub rubies: Vec<RubyUnit>,
}

impl NormalizedBlock {
    /// Innermost ruby unit whose base text contains `offset`.
    #[must_use]
    pub fn ruby_at(&self, offset: usize) -> Option<&RubyUnit> {
        self.rubies
            .iter()
            .rev()
            .filter(|unit| unit.bases.iter().any(|base| base.contains(&offset)))
            .min_by_key(|unit| unit.range.len())
    }

    /// Ruby unit and reading index which `node` (a reading text run or
    /// element) belongs to.
    #[must_use]
    pub fn reading_of(&self, doc: &Document, node: NodeId) -> Option<(&RubyUnit, usize)> {
        doc.ancestors(node).find_map(|ancestor| {
            self.rubies.iter().find_map(|unit| {
                unit.readings
                    .iter()
                    .position(|reading| reading.element == ancestor)
                    .map(|index| (unit, index))
            })
        })
    }

    /// Ruby unit whose `rp` fallback or `rtc` container holds `node`.
    #[must_use]
    pub fn ruby_containing(&self, doc: &Document, node: NodeId) -> Option<&RubyUnit> {
        doc.ancestors(node)
            .find_map(|ancestor| self.rubies.iter().find(|unit| unit.element == ancestor))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    /// Index into the ruby unit list of the innermost enclosing `ruby`.
    ruby: Option<usize>,
    /// `(ruby, reading)` indices when inside an `rt`.
    reading: Option<(usize, usize)>,
    /// Inside `rt`, `rtc` or `rp`: text here is not part of the clean text.
    excluded: bool,
}

#[derive(Debug)]
enum Visit {
    Enter(NodeId, Context),
    ExitRuby(usize),
    ExitBase(usize, usize),
}

/// Builds the clean text and offset map for the subtree rooted at `block`.
///
/// Traversal is depth-first in document order using an explicit stack.
#[must_use]
pub fn normalize(doc: &Document, block: NodeId) -> NormalizedBlock {
    let mut clean_text = String::new();
    let mut map = CleanTextOffsetMap::default();
    let mut rubies = Vec::<RubyUnit>::new();

    let mut stack = vec![Visit::Enter(block, Context::default())];
    while let Some(visit) = stack.pop() {
        let (node, mut ctx) = match visit {
            Visit::Enter(node, ctx) => (node, ctx),
            Visit::ExitRuby(unit_index) => {
                let end = map.len();
                let unit = &mut rubies[unit_index];
                unit.range.end = end;
                if !unit.explicit && !unit.range.is_empty() {
                    unit.bases = vec![unit.range.clone()];
                }
                continue;
            }
            Visit::ExitBase(unit_index, base_index) => {
                rubies[unit_index].bases[base_index].end = map.len();
                continue;
            }
        };
        let Some(entry) = doc.get(node) else {
            continue;
        };

        match &entry.kind {
            NodeKind::Text(text) => {
                if ctx.excluded {
                    if let Some((unit_index, reading_index)) = ctx.reading {
                        rubies[unit_index].readings[reading_index]
                            .text
                            .push_str(text);
                    }
                } else if !text.is_empty() {
                    map.push(node, text.chars().count());
                    clean_text.push_str(text);
                }
                continue;
            }
            NodeKind::Element { tag, .. } => match tag.as_str() {
                "ruby" if !ctx.excluded => {
                    let start = map.len();
                    rubies.push(RubyUnit {
                        element: node,
                        range: start..start,
                        bases: Vec::new(),
                        readings: Vec::new(),
                        explicit: false,
                    });
                    let unit_index = rubies.len() - 1;
                    ctx.ruby = Some(unit_index);
                    stack.push(Visit::ExitRuby(unit_index));
                }
                "rb" if !ctx.excluded => {
                    if let Some(unit_index) = ctx.ruby {
                        let start = map.len();
                        let unit = &mut rubies[unit_index];
                        unit.explicit = true;
                        unit.bases.push(start..start);
                        stack.push(Visit::ExitBase(unit_index, unit.bases.len() - 1));
                    }
                }
                "rt" => {
                    ctx.excluded = true;
                    ctx.reading = ctx.ruby.map(|unit_index| {
                        let unit = &mut rubies[unit_index];
                        unit.readings.push(ReadingRun {
                            element: node,
                            text: String::new(),
                        });
                        (unit_index, unit.readings.len() - 1)
                    });
                }
                "rtc" => {
                    ctx.excluded = true;
                }
                "rp" => {
                    ctx.excluded = true;
                    ctx.reading = None;
                }
                _ => {}
            },
        }

        stack.extend(
            entry
                .children
                .iter()
                .rev()
                .map(|&child| Visit::Enter(child, ctx)),
        );
    }

    NormalizedBlock {
        block,
        clean_text,
        map,
        rubies,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::markup::DocumentBuilder};

    fn normalized(markup: &str) -> (Document, NormalizedBlock) {
        let doc = Document::parse(markup).unwrap();
        let block = normalize(&doc, doc.root());
        (doc, block)
    }

    fn assert_covers(block: &NormalizedBlock) {
        let mut expected_start = 0;
        for span in block.map.spans() {
            assert_eq!(expected_start, span.start, "spans must be contiguous");
            assert!(span.len > 0);
            expected_start = span.end();
        }
        assert_eq!(block.clean_text.chars().count(), block.map.len());
    }

    #[test]
    fn simple_ruby() {
        let (doc, block) = normalized("<ruby>漢字<rt>かんじ</rt></ruby>です");
        assert_eq!("漢字です", block.clean_text);
        assert_covers(&block);

        let spans = block.map.spans();
        assert_eq!(2, spans.len());
        assert_eq!(Some("漢字"), doc.text(spans[0].node));
        assert_eq!(Some("です"), doc.text(spans[1].node));
        assert_eq!(Some(2), block.map.offset_of(spans[1].node));

        let unit = &block.rubies[0];
        assert_eq!(0..2, unit.range);
        assert_eq!(vec![0..2], unit.bases);
        assert!(!unit.explicit);
        assert_eq!(Some("かんじ".into()), unit.reading_at(1));
    }

    #[test]
    fn explicit_bases_with_fallback_parens() {
        let (_, block) = normalized(
            "<p>今日<ruby><rb>東</rb><rp>(</rp><rt>とう</rt><rp>)</rp>\
             <rb>京</rb><rp>(</rp><rt>きょう</rt><rp>)</rp></ruby>へ</p>",
        );
        assert_eq!("今日東京へ", block.clean_text);
        assert_covers(&block);

        let unit = &block.rubies[0];
        assert!(unit.explicit);
        assert_eq!(vec![2..3, 3..4], unit.bases);
        assert_eq!(
            vec!["とう", "きょう"],
            unit.readings
                .iter()
                .map(|reading| reading.text.as_str())
                .collect::<Vec<_>>()
        );
        assert_eq!(Some("きょう".into()), unit.reading_at(3));
        assert_eq!(Some(unit), block.ruby_at(2));
        assert_eq!(None, block.ruby_at(4));
    }

    #[test]
    fn implicit_juxtaposition_is_one_base() {
        let (_, block) = normalized("<ruby>漢<rt>かん</rt>字<rt>じ</rt></ruby>");
        assert_eq!("漢字", block.clean_text);
        let unit = &block.rubies[0];
        assert_eq!(vec![0..2], unit.bases);
        assert_eq!(2, unit.readings.len());
        assert_eq!(Some("かんじ".into()), unit.reading_at(0));
    }

    #[test]
    fn rtc_readings_are_excluded() {
        let (_, block) = normalized(
            "<ruby><rb>旧</rb><rb>字</rb><rb>体</rb>\
             <rtc><rt>きゅう</rt><rt>じ</rt><rt>たい</rt></rtc>\
             <rtc><rt>Old character form</rt></rtc></ruby>",
        );
        assert_eq!("旧字体", block.clean_text);
        assert_eq!(4, block.rubies[0].readings.len());
        assert_eq!(Some("じ".into()), block.rubies[0].reading_at(1));
    }

    #[test]
    fn nested_ruby() {
        let (_, block) = normalized(
            "<ruby><ruby>東<rt>とう</rt>南<rt>なん</rt></ruby><rt>tōnan</rt></ruby>の風",
        );
        assert_eq!("東南の風", block.clean_text);
        assert_covers(&block);
        assert_eq!(2, block.rubies.len());
        // the inner unit is the tighter match
        assert_eq!(Some("とうなん".into()), block.ruby_at(0).unwrap().reading_at(0));
    }

    #[test]
    fn offsets_are_monotonic() {
        let (doc, block) = normalized(
            "<p>彼は<ruby>学校<rt>がっこう</rt></ruby>へ<em>行<ruby>く<rt>x</rt></ruby></em>。</p>",
        );
        assert_eq!("彼は学校へ行く。", block.clean_text);
        assert_covers(&block);
        for pair in block.map.spans().windows(2) {
            let len = doc.text(pair[0].node).unwrap().chars().count();
            assert!(pair[0].start + len <= pair[1].start);
            assert!(pair[0].node < pair[1].node);
        }
    }

    #[test]
    fn locate_round_trips() {
        let (doc, block) = normalized("<ruby>漢字<rt>かんじ</rt></ruby>です");
        let (node, inner) = block.map.locate(3).unwrap();
        assert_eq!(Some("です"), doc.text(node));
        assert_eq!(1, inner);
        assert_eq!(None, block.map.locate(4));
    }

    #[test]
    fn structured_runs() {
        let mut builder = DocumentBuilder::new();
        builder.open("ruby", []);
        builder.text("振");
        builder.open("rt", []);
        builder.text("ふ");
        builder.close("rt");
        builder.close("ruby");
        builder.text("り仮名");
        let doc = builder.finish();

        let block = normalize(&doc, doc.root());
        assert_eq!("振り仮名", block.clean_text);
        assert_covers(&block);
    }

    #[test]
    fn text_node_as_block() {
        let doc = Document::parse("<span>単独</span>").unwrap();
        let text = doc.children(doc.children(doc.root())[0])[0];
        let block = normalize(&doc, text);
        assert_eq!("単独", block.clean_text);
        assert_eq!(1, block.map.spans().len());
    }
}
