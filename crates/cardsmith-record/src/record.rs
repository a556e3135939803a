use std::fmt;
use std::rc::Rc;

// ── Record ────────────────────────────────────────────────────────────────

/// One node of a hierarchical data tree: a name, ordered uniquely named
/// string attributes, and interleaved text and child records.
///
/// `Record` is a cheap shared handle; cloning never copies the tree. All
/// lookups are read-only and represent absence with `Option` or an empty
/// iterator instead of an error, because deck data has no schema the caller
/// could validate against up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Rc<RecordNode>);

#[derive(Debug, PartialEq)]
struct RecordNode {
    name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Content {
    Text(String),
    Child(Record),
}

impl Record {
    /// Starts building a record programmatically. Parsed data should go
    /// through [`crate::parse_record`] instead.
    pub fn build(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            attributes: Vec::new(),
            content: Vec::new(),
        }
    }

    /// The node's element name as written in the source.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Looks up an attribute by exact name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.0
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All element children in document order.
    pub fn children(&self) -> impl Iterator<Item = Record> + '_ {
        self.0.content.iter().filter_map(|c| match c {
            Content::Child(r) => Some(r.clone()),
            Content::Text(_) => None,
        })
    }

    /// Element children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Record> + 'a {
        self.children().filter(move |r| r.name() == name)
    }

    /// The `index`-th element child, counting every child.
    pub fn child(&self, index: usize) -> Option<Record> {
        self.children().nth(index)
    }

    /// The `index`-th element child with the given name.
    pub fn child_named(&self, name: &str, index: usize) -> Option<Record> {
        self.children_named(name).nth(index)
    }

    /// Number of element children.
    pub fn child_count(&self) -> usize {
        self.children().count()
    }

    /// Concatenation of the node's direct text content, in document order.
    /// Child element content is not included.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for c in &self.0.content {
            if let Content::Text(t) = c {
                out.push_str(t);
            }
        }
        out
    }

    /// The node serialized back to markup, for templates that re-embed a
    /// subtree verbatim. Attribute values and text are re-escaped.
    pub fn raw_markup(&self) -> String {
        let mut out = String::new();
        self.serialize_into(&mut out);
        out
    }

    fn serialize_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.0.name);
        for (k, v) in &self.0.attributes {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            escape_into(out, v);
            out.push('"');
        }
        if self.0.content.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for c in &self.0.content {
            match c {
                Content::Text(t) => escape_into(out, t),
                Content::Child(r) => r.serialize_into(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.0.name);
        out.push('>');
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_markup())
    }
}

/// Appends `s` with the five markup-special characters escaped.
fn escape_into(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
}

// ── RecordBuilder ─────────────────────────────────────────────────────────

/// Builds a [`Record`] in code, mainly for tests and for callers that
/// synthesize data contexts without an XML source.
pub struct RecordBuilder {
    name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
}

impl RecordBuilder {
    /// Adds an attribute. Re-adding an existing name replaces its value so
    /// the uniqueness invariant holds for built records too.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    /// Appends a run of direct text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Content::Text(text.into()));
        self
    }

    /// Appends a child record.
    pub fn child(mut self, child: Record) -> Self {
        self.content.push(Content::Child(child));
        self
    }

    pub fn build(self) -> Record {
        Record(Rc::new(RecordNode {
            name: self.name,
            attributes: self.attributes,
            content: self.content,
        }))
    }
}

/// Assembles a record directly from parsed parts. Attribute uniqueness is
/// the parser's responsibility.
pub(crate) fn from_parts(
    name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
) -> Record {
    Record(Rc::new(RecordNode { name, attributes, content }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::build("Card")
            .attr("Id", "3")
            .attr("Name", "Ogre")
            .text("before ")
            .child(Record::build("Note").text("first").build())
            .text(" after")
            .child(Record::build("Note").text("second").build())
            .child(Record::build("Art").attr("Source", "ogre.png").build())
            .build()
    }

    #[test]
    fn attribute_lookup() {
        let r = sample();
        assert_eq!(r.attribute("Id"), Some("3"));
        assert_eq!(r.attribute("Missing"), None);
    }

    #[test]
    fn attribute_replacement_keeps_names_unique() {
        let r = Record::build("Card").attr("Id", "1").attr("Id", "2").build();
        assert_eq!(r.attribute("Id"), Some("2"));
        assert_eq!(r.attributes().count(), 1);
    }

    #[test]
    fn children_in_document_order() {
        let r = sample();
        let names: Vec<String> = r.children().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["Note", "Note", "Art"]);
        assert_eq!(r.child_count(), 3);
    }

    #[test]
    fn children_named_and_indexed() {
        let r = sample();
        assert_eq!(r.children_named("Note").count(), 2);
        assert_eq!(r.child_named("Note", 1).unwrap().text(), "second");
        assert_eq!(r.child_named("Note", 2), None);
        assert_eq!(r.child(2).unwrap().name(), "Art");
        assert_eq!(r.child(5), None);
    }

    #[test]
    fn text_skips_child_content() {
        assert_eq!(sample().text(), "before  after");
    }

    #[test]
    fn raw_markup_round_trip_shape() {
        let r = sample();
        let markup = r.raw_markup();
        assert!(markup.starts_with(r#"<Card Id="3" Name="Ogre">"#));
        assert!(markup.contains("<Note>first</Note>"));
        assert!(markup.contains(r#"<Art Source="ogre.png"/>"#));
        assert!(markup.ends_with("</Card>"));
    }

    #[test]
    fn raw_markup_escapes_specials() {
        let r = Record::build("Card").attr("Name", "a<b").text("x & y").build();
        assert_eq!(r.raw_markup(), r#"<Card Name="a&lt;b">x &amp; y</Card>"#);
    }

    #[test]
    fn clone_is_shallow_handle() {
        let r = sample();
        let c = r.clone();
        assert_eq!(r, c);
        assert_eq!(c.attribute("Id"), Some("3"));
    }
}
