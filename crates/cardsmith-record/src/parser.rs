use crate::error::ParseError;
use crate::record::{Content, Record, from_parts};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Parses an XML document into a [`Record`] tree rooted at its single root
/// element. Whitespace in text content is preserved; comments, processing
/// instructions, and the XML declaration are skipped.
pub fn parse_record(source: &str) -> Result<Record, ParseError> {
    RecordParser::new(source).parse()
}

// ── RecordParser ──────────────────────────────────────────────────────────

struct RecordParser<'s> {
    source: &'s str,
    reader: Reader<&'s [u8]>,
    stack: Vec<BuildNode>,
}

/// A node being assembled while its closing tag is still ahead.
struct BuildNode {
    name: String,
    /// Byte offset of the `<` that opened this element, for error positions.
    start_offset: usize,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
}

impl<'s> RecordParser<'s> {
    fn new(source: &'s str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        // Tag mismatches are reported by our own stack check, with positions.
        reader.config_mut().check_end_names = false;
        Self { source, reader, stack: Vec::new() }
    }

    fn err(&self, msg: impl Into<String>, offset: usize) -> ParseError {
        ParseError::at_offset(msg, self.source, offset)
    }

    fn parse(&mut self) -> Result<Record, ParseError> {
        let mut root: Option<Record> = None;

        loop {
            let event_start = self.reader.buffer_position() as usize;
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = tag_name(&e);
                    let attributes = self.parse_attributes(&e, event_start)?;
                    self.stack.push(BuildNode {
                        name,
                        start_offset: event_start,
                        attributes,
                        content: Vec::new(),
                    });
                }
                Ok(Event::End(e)) => {
                    let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let node = self.stack.pop().ok_or_else(|| {
                        self.err(format!("unexpected closing tag </{end_name}>"), event_start)
                    })?;
                    if node.name != end_name {
                        return Err(self.err(
                            format!("expected </{}>, found </{}>", node.name, end_name),
                            event_start,
                        ));
                    }
                    let record = from_parts(node.name, node.attributes, node.content);
                    self.attach(record, &mut root, event_start)?;
                }
                Ok(Event::Empty(e)) => {
                    let name = tag_name(&e);
                    let attributes = self.parse_attributes(&e, event_start)?;
                    let record = from_parts(name, attributes, Vec::new());
                    self.attach(record, &mut root, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| {
                        self.err(format!("invalid text content: {err}"), event_start)
                    })?;
                    if let Some(node) = self.stack.last_mut() {
                        node.content.push(Content::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    if let Some(node) = self.stack.last_mut() {
                        node.content.push(Content::Text(text));
                    }
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    let offset = self.reader.error_position() as usize;
                    return Err(self.err(e.to_string(), offset));
                }
            }
        }

        if let Some(node) = self.stack.last() {
            return Err(self.err(
                format!("missing closing tag </{}>", node.name),
                node.start_offset,
            ));
        }
        root.ok_or_else(|| self.err("document has no root element", 0))
    }

    /// Places a finished record either as the document root or as the
    /// current parent's child.
    fn attach(
        &mut self,
        record: Record,
        root: &mut Option<Record>,
        offset: usize,
    ) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.content.push(Content::Child(record));
                Ok(())
            }
            None if root.is_some() => {
                Err(self.err("document has more than one root element", offset))
            }
            None => {
                *root = Some(record);
                Ok(())
            }
        }
    }

    fn parse_attributes(
        &self,
        e: &BytesStart<'_>,
        tag_offset: usize,
    ) -> Result<Vec<(String, String)>, ParseError> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr
                .map_err(|err| self.err(format!("invalid attribute: {err}"), tag_offset))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| self.err(format!("invalid attribute value: {err}"), tag_offset))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(attributes)
    }
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_keep_document_order() {
        let r = parse_record(r#"<Card Z="1" A="2" M="3"/>"#).unwrap();
        let keys: Vec<&str> = r.attributes().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Z", "A", "M"]);
    }

    #[test]
    fn entities_are_unescaped() {
        let r = parse_record(r#"<Card Name="a&amp;b">x &lt; y</Card>"#).unwrap();
        assert_eq!(r.attribute("Name"), Some("a&b"));
        assert_eq!(r.text(), "x < y");
    }

    #[test]
    fn whitespace_text_is_preserved() {
        let r = parse_record("<Card>\n  <Sub/>\n</Card>").unwrap();
        assert_eq!(r.text(), "\n  \n");
        assert_eq!(r.child_count(), 1);
    }

    #[test]
    fn cdata_is_not_reescaped_on_read() {
        let r = parse_record("<Card><![CDATA[a < b]]></Card>").unwrap();
        assert_eq!(r.text(), "a < b");
    }

    #[test]
    fn nested_structure() {
        let r = parse_record(
            r#"<Deck Template="Unit"><Card Id="1"><Note>a</Note></Card><Card Id="2"/></Deck>"#,
        )
        .unwrap();
        assert_eq!(r.name(), "Deck");
        assert_eq!(r.attribute("Template"), Some("Unit"));
        assert_eq!(r.child_count(), 2);
        assert_eq!(r.child(0).unwrap().child_named("Note", 0).unwrap().text(), "a");
    }

    #[test]
    fn error_positions_are_one_based() {
        let e = parse_record("<Deck>\n  <Card>\n</Deck>").unwrap_err();
        assert!(e.line >= 2, "error should point past line 1, got {e}");
        assert!(e.col >= 1);
    }

    #[test]
    fn unexpected_close_names_the_tag() {
        let e = parse_record("<Deck></Card></Deck>").unwrap_err();
        assert!(e.message.contains("Card"), "message: {}", e.message);
    }

    #[test]
    fn prefixed_names_kept_verbatim() {
        let r = parse_record(r#"<x:Card xmlns:x="u" x:Name="n"/>"#).unwrap();
        assert_eq!(r.name(), "x:Card");
        assert_eq!(r.attribute("x:Name"), Some("n"));
    }
}
