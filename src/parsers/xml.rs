//! Owned XML tree built from `quick-xml` events.
//!
//! Elements keep both their qualified name (`ce:para`) and local name
//! (`para`), their attributes keyed by local name, their mixed content and
//! the byte span they occupy in the source. Namespaces are not resolved:
//! every dialect handled here is addressed by local or prefixed names.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::ops::Range;

/// A node inside an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its content
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    local: String,
    attributes: Vec<(String, String)>,
    nodes: Vec<Node>,
    span: Range<usize>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, offset: usize) -> Result<Self, String> {
        let name = decode(start.name().as_ref())?;
        let local = decode(start.local_name().as_ref())?;

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute in <{name}>: {e}"))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = decode(attr.key.local_name().as_ref())?;
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            local,
            attributes,
            nodes: Vec::new(),
            span: offset..offset,
        })
    }

    /// Qualified name as written, including any prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without namespace prefix
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Whether the element matches a name, qualified (`ce:para`) or local (`para`)
    pub fn is(&self, name: &str) -> bool {
        if name.contains(':') {
            self.name == name
        } else {
            self.local == name
        }
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Mixed content in document order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Byte range of the element in the parsed input
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Element children in document order
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Element children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |el| el.is(name))
    }

    /// First element child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|el| el.is(name))
    }

    /// All elements matching a `/`-separated path of child names, in document order.
    ///
    /// `"front/article-meta/article-id"` behaves like the ElementTree path of
    /// the same shape. A `*` segment matches any element.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|el| el.children().filter(|c| segment == "*" || c.is(segment)))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// First element matching a path, see [`Element::find_all`]
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// Text of the first element matching a path
    pub fn find_text(&self, path: &str) -> Option<String> {
        self.find(path).map(Element::text)
    }

    /// All descendants (excluding self) with the given name, in document order
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in self.children() {
            if child.is(name) {
                out.push(child);
            }
            child.collect_descendants(name, out);
        }
    }

    /// First descendant with the given name
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        self.descendants(name).into_iter().next()
    }

    /// Concatenated text of the element and all its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.push_text(out),
            }
        }
    }

    fn push_node(&mut self, node: Node) {
        if let (Node::Text(new), Some(Node::Text(last))) = (&node, self.nodes.last_mut()) {
            last.push_str(new);
            return;
        }
        self.nodes.push(node);
    }
}

fn decode(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("invalid UTF-8 in name: {e}"))
}

/// HTML entities commonly left in scholarly XML without a DTD.
///
/// Consulted after the five predefined XML entities.
fn resolve_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "thinsp" => Some("\u{2009}"),
        "times" => Some("\u{d7}"),
        "deg" => Some("\u{b0}"),
        "plusmn" => Some("\u{b1}"),
        "micro" => Some("\u{b5}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        _ => None,
    }
}

/// Parse a document and return its root element.
///
/// Errors carry a human-readable message; callers wrap them into their
/// format-specific error.
pub fn parse_document(raw: &[u8]) -> Result<Element, String> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = tag_start(raw, reader.buffer_position() as usize);
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("error at byte {}: {e}", reader.error_position()))?;

        match event {
            Event::Start(start) => stack.push(Element::from_start(&start, offset)?),
            Event::Empty(start) => {
                let mut element = Element::from_start(&start, offset)?;
                element.span.end = reader.buffer_position() as usize;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| format!("unexpected closing tag at byte {offset}"))?;
                element.span.end = reader.buffer_position() as usize;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let content = match text.unescape_with(|entity| {
                        resolve_predefined_entity(entity).or_else(|| resolve_entity(entity))
                    }) {
                        Ok(content) => content,
                        Err(_) => Cow::Owned(String::from_utf8_lossy(&text).into_owned()),
                    };
                    parent.push_node(Node::Text(content.into_owned()));
                } else if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(format!("text outside the root element at byte {offset}"));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.push_node(Node::Text(content));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "no root element".to_string())
}

/// Position of the `<` opening the next markup, whether or not the reader consumed it
fn tag_start(raw: &[u8], position: usize) -> usize {
    match (raw.get(position), position.checked_sub(1).and_then(|p| raw.get(p))) {
        (Some(b'<'), _) => position,
        (_, Some(b'<')) => position - 1,
        _ => position,
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.push_node(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(format!("second root element <{}>", element.name)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<!DOCTYPE article>
<article xmlns:xlink="http://www.w3.org/1999/xlink" article-type="research-article">
  <front>
    <article-meta>
      <article-id pub-id-type="pmid">123</article-id>
      <article-id pub-id-type="doi">10.1/x</article-id>
    </article-meta>
  </front>
  <body><p>I <bold>like</bold> python &amp; tea<xref/>.</p><p><![CDATA[a < b]]></p></body>
</article>"#;

    #[test]
    fn test_parse_tree() {
        let root = parse_document(DOC.as_bytes()).unwrap();
        assert_eq!(root.local(), "article");
        assert_eq!(root.attr("article-type"), Some("research-article"));
        assert_eq!(root.attr("xlink"), None);

        let ids = root.find_all("front/article-meta/article-id");
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1].attr("pub-id-type"), Some("doi"));
        assert_eq!(ids[1].text(), "10.1/x");

        let paragraphs = root.descendants("p");
        assert_eq!(paragraphs[0].text(), "I like python & tea.");
        assert_eq!(paragraphs[1].text(), "a < b");
    }

    #[test]
    fn test_spans_cover_elements() {
        let root = parse_document(DOC.as_bytes()).unwrap();
        let id = root.find("front/article-meta/article-id").unwrap();
        assert_eq!(
            &DOC[id.span()],
            r#"<article-id pub-id-type="pmid">123</article-id>"#
        );
    }

    #[test]
    fn test_prefixed_names() {
        let root = parse_document(br#"<r xmlns:ce="urn:x"><ce:para>one</ce:para><para>two</para></r>"#)
            .unwrap();
        assert_eq!(root.find_all("para").len(), 2);
        assert_eq!(root.find_all("ce:para").len(), 1);
        assert_eq!(root.find_text("ce:para").as_deref(), Some("one"));
    }

    #[test]
    fn test_html_entities_resolved() {
        let root = parse_document(b"<p>a&nbsp;b &unknown; c</p>").unwrap();
        assert!(root.text().contains("&unknown;"));
        let root = parse_document(b"<p>1&ndash;2</p>").unwrap();
        assert_eq!(root.text(), "1\u{2013}2");
    }

    #[test]
    fn test_predefined_and_html_entities_mixed() {
        let root = parse_document(b"<t>Salt &amp; pepper&nbsp;study &lt;2&gt; &quot;q&apos; 1&ndash;2</t>")
            .unwrap();
        assert_eq!(root.text(), "Salt & pepper\u{a0}study <2> \"q' 1\u{2013}2");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_document(b"").is_err());
        assert!(parse_document(b"not xml at all").is_err());
        assert!(parse_document(b"<a><b></a>").is_err());
        assert!(parse_document(b"<a><b>").is_err());
        assert!(parse_document(b"<a/><b/>").is_err());
    }
}
