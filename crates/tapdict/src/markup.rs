//! Arena-allocated markup tree.
//!
//! The rendering collaborator hands over the markup surrounding a tap, either
//! as a string of (X)HTML or as already-structured text runs. Both end up as a
//! [`Document`], where every node is addressed by a [`NodeId`] index into one
//! flat arena. Nothing here recurses, so deeply nested markup cannot overflow
//! the stack.

use {
    anyhow::{Context, Result},
    quick_xml::{Reader, events::Event},
    std::borrow::Cow,
};

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Single node of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Parent node, or [`None`] for the root.
    pub parent: Option<NodeId>,
    /// Child nodes in document order.
    pub children: Vec<NodeId>,
    /// What this node holds.
    pub kind: NodeKind,
}

/// Content of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a lowercase local tag name.
    Element {
        /// Local tag name, e.g. `ruby`.
        tag: String,
        /// Attributes in source order.
        attrs: Vec<(String, String)>,
    },
    /// Run of text.
    Text(String),
}

/// Tree of markup nodes with a synthetic root element.
///
/// The root has the tag [`Document::ROOT_TAG`] and wraps everything that was
/// handed over, so that a bare fragment such as `<ruby>漢字<rt>かんじ</rt></ruby>です`
/// still forms one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

/// Elements which never have content, even when written without `/>`.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements which start a new paragraph-like container.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "div",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "li",
    "main",
    "p",
    "pre",
    "section",
    "td",
    "th",
];

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Tag of the synthetic root element.
    pub const ROOT_TAG: &'static str = "#document";

    /// Creates a document holding only the root element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Element {
                    tag: Self::ROOT_TAG.into(),
                    attrs: Vec::new(),
                },
            }],
        }
    }

    /// Parses a markup fragment.
    ///
    /// The parser is lenient in the ways HTML needs: void elements like
    /// `<br>` need no closing tag, mismatched closing tags close everything up
    /// to the nearest matching open element (or are ignored if none is
    /// open), and unknown entities are kept as written.
    ///
    /// # Errors
    ///
    /// Errors if the markup is not well-formed enough to tokenize, e.g. an
    /// unterminated tag.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;

        let mut builder = DocumentBuilder::new();
        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("invalid markup at byte {}", reader.buffer_position()))?;
            match event {
                Event::Start(start) => {
                    let tag = decode_name(start.local_name().as_ref());
                    let attrs = decode_attrs(&start);
                    if VOID_TAGS.contains(&tag.as_str()) {
                        builder.empty(tag, attrs);
                    } else {
                        builder.open(tag, attrs);
                    }
                }
                Event::Empty(start) => {
                    let tag = decode_name(start.local_name().as_ref());
                    let attrs = decode_attrs(&start);
                    builder.empty(tag, attrs);
                }
                Event::End(end) => {
                    builder.close(&decode_name(end.local_name().as_ref()));
                }
                Event::Text(text) => {
                    let decoded = text
                        .unescape_with(resolve_html_entity)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned().into());
                    builder.text(decoded);
                }
                Event::CData(data) => {
                    builder.text(String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                Event::Comment(_)
                | Event::Decl(_)
                | Event::PI(_)
                | Event::DocType(_) => {}
            }
        }
        Ok(builder.finish())
    }

    /// Root element.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Gets a node by index.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; a document has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tag name if `id` is an element.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Text content if `id` is a text run.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Value of attribute `name` if `id` is an element that has it.
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// Children of `id`, empty for text runs and unknown nodes.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |node| &node.children)
    }

    /// `id` followed by its parent, grandparent, and so on up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).map(|_| id), |&id| self.parent(id))
    }

    /// Whether `id` is an element which starts a paragraph-like container.
    #[must_use]
    pub fn is_block(&self, id: NodeId) -> bool {
        self.tag(id)
            .is_some_and(|tag| tag == Self::ROOT_TAG || BLOCK_TAGS.contains(&tag))
    }

    /// Every node below `id` in document order, `id` included.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = self.get(id).map(|_| id).into_iter().collect::<Vec<_>>();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev());
            Some(next)
        })
    }

    /// Concatenated text of every run below `id`.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| self.text(node))
            .collect()
    }
}

/// Builds a [`Document`] one node at a time, in document order.
///
/// This is how a host that already has structured text runs (rather than
/// markup text) hands them over.
///
/// # Example
///
/// ```
/// # use tapdict::markup::DocumentBuilder;
/// let mut builder = DocumentBuilder::new();
/// builder.open("p", []);
/// builder.open("ruby", []);
/// builder.text("漢字");
/// builder.open("rt", []);
/// builder.text("かんじ");
/// builder.close("rt");
/// builder.close("ruby");
/// builder.text("です");
/// builder.close("p");
/// let doc = builder.finish();
/// assert_eq!(doc.text_content(doc.root()), "漢字かんじです");
/// ```
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Starts a document with only its root open.
    #[must_use]
    pub fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId(0))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let id = NodeId(self.doc.nodes.len());
        self.doc.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.doc.nodes[parent.0].children.push(id);
        id
    }

    /// Opens an element; following nodes become its children.
    pub fn open(
        &mut self,
        tag: impl Into<String>,
        attrs: impl IntoIterator<Item = (String, String)>,
    ) -> NodeId {
        let id = self.push(NodeKind::Element {
            tag: tag.into().to_ascii_lowercase(),
            attrs: attrs.into_iter().collect(),
        });
        self.open.push(id);
        id
    }

    /// Adds an element with no children.
    pub fn empty(
        &mut self,
        tag: impl Into<String>,
        attrs: impl IntoIterator<Item = (String, String)>,
    ) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.into().to_ascii_lowercase(),
            attrs: attrs.into_iter().collect(),
        })
    }

    /// Closes the innermost open element named `tag`, along with everything
    /// opened after it. Does nothing if no such element is open.
    pub fn close(&mut self, tag: &str) {
        let tag = tag.to_ascii_lowercase();
        // index 0 is the root, which can't be closed
        let Some(pos) = self
            .open
            .iter()
            .skip(1)
            .rposition(|&id| self.doc.tag(id) == Some(tag.as_str()))
        else {
            return;
        };
        self.open.truncate(pos + 1);
    }

    /// Adds a text run. Adjacent runs are merged, empty runs are dropped.
    pub fn text<'a>(&mut self, text: impl Into<Cow<'a, str>>) -> Option<NodeId> {
        let text = text.into();
        if text.is_empty() {
            return None;
        }
        let parent = self.current();
        if let Some(&last) = self.doc.nodes[parent.0].children.last() {
            if let NodeKind::Text(existing) = &mut self.doc.nodes[last.0].kind {
                existing.push_str(&text);
                return Some(last);
            }
        }
        Some(self.push(NodeKind::Text(text.into_owned())))
    }

    /// Finishes the document, implicitly closing every open element.
    #[must_use]
    pub fn finish(self) -> Document {
        self.doc
    }
}

fn decode_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

fn decode_attrs(start: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    start
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .map(|attr| {
            let key = decode_name(attr.key.local_name().as_ref());
            let value = attr
                .unescape_value()
                .map_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned(), Cow::into_owned);
            (key, value)
        })
        .collect()
}

fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "zwsp" => Some("\u{200b}"),
        "zwj" => Some("\u{200d}"),
        "zwnj" => Some("\u{200c}"),
        "hellip" => Some("…"),
        "mdash" => Some("—"),
        "ndash" => Some("–"),
        "lsquo" => Some("‘"),
        "rsquo" => Some("’"),
        "ldquo" => Some("“"),
        "rdquo" => Some("”"),
        "middot" => Some("·"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fragment() {
        let doc = Document::parse("<ruby>漢字<rt>かんじ</rt></ruby>です").unwrap();
        let root = doc.root();
        assert_eq!(Some(Document::ROOT_TAG), doc.tag(root));
        let children = doc.children(root);
        assert_eq!(2, children.len());
        assert_eq!(Some("ruby"), doc.tag(children[0]));
        assert_eq!(Some("です"), doc.text(children[1]));
        assert_eq!("漢字かんじです", doc.text_content(root));
    }

    #[test]
    fn lenient_html() {
        let doc = Document::parse(
            r#"<p class="x">一行目<br>二行目&nbsp;<span>三</p><p>次</p></div>"#,
        )
        .unwrap();
        let root = doc.root();
        let paragraphs = doc.children(root);
        assert_eq!(2, paragraphs.len());
        assert_eq!(Some("x"), doc.attr(paragraphs[0], "class"));
        assert_eq!("一行目二行目\u{a0}三", doc.text_content(paragraphs[0]));
        assert_eq!("次", doc.text_content(paragraphs[1]));
    }

    #[test]
    fn tags_are_lowercased_and_unprefixed() {
        let doc = Document::parse(r#"<xhtml:P><RUBY>字<RT>じ</RT></RUBY></xhtml:P>"#).unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(Some("p"), doc.tag(p));
        let ruby = doc.children(p)[0];
        assert_eq!(Some("ruby"), doc.tag(ruby));
    }

    #[test]
    fn ancestors_and_blocks() {
        let doc = Document::parse("<div><p><span>文</span></p></div>").unwrap();
        let text = doc
            .descendants(doc.root())
            .find(|&id| doc.text(id).is_some())
            .unwrap();
        let tags = doc
            .ancestors(text)
            .filter_map(|id| doc.tag(id))
            .collect::<Vec<_>>();
        assert_eq!(vec!["span", "p", "div", Document::ROOT_TAG], tags);
        let block = doc.ancestors(text).find(|&id| doc.is_block(id)).unwrap();
        assert_eq!(Some("p"), doc.tag(block));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let depth = 10_000;
        let markup = format!("{}深{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let doc = Document::parse(&markup).unwrap();
        assert_eq!("深", doc.text_content(doc.root()));
        assert_eq!(depth + 2, doc.len());
    }
}
