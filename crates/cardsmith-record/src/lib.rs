//! Hierarchical record model and XML parsing for card decks.
//!
//! A [`Record`] is one node of an order-preserving data tree: a name, a set
//! of uniquely named string attributes, and interleaved text and child
//! records. Decks and cards are free-form XML with no fixed schema, so every
//! lookup is late-bound and returns an `Option` (or an empty sequence)
//! rather than failing on absence.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`record`] | `Record`, `RecordBuilder` |
//! | [`parser`] | `parse_record` entry point |
//! | [`error`] | `ParseError` |
//!
//! # Quick start
//!
//! ```rust
//! use cardsmith_record::parse_record;
//!
//! let card = parse_record(r#"<Card Id="7" Rarity="gold"><Note>hi</Note></Card>"#).unwrap();
//! assert_eq!(card.attribute("Id"), Some("7"));
//! assert_eq!(card.child_named("Note", 0).unwrap().text(), "hi");
//! ```

pub mod error;
pub mod parser;
pub mod record;

pub use error::ParseError;
pub use parser::parse_record;
pub use record::{Record, RecordBuilder};

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) -> Record { parse_record(src).unwrap() }
    fn err(src: &str) { parse_record(src).unwrap_err(); }

    #[test] fn empty_element() { ok("<Card/>"); }
    #[test] fn attributes() { ok(r#"<Card Id="1" Name="Ogre"/>"#); }
    #[test] fn nested() { ok("<Deck><Card/><Card/></Deck>"); }
    #[test] fn text_content() { ok("<Card>plain text</Card>"); }
    #[test] fn mixed_content() { ok("<Card>a<Sub/>b</Card>"); }
    #[test] fn cdata() { ok("<Card><![CDATA[<raw>]]></Card>"); }
    #[test] fn xml_declaration() { ok("<?xml version=\"1.0\"?><Deck/>"); }
    #[test] fn comment_skipped() { ok("<Deck><!-- note --><Card/></Deck>"); }
    #[test] fn err_empty() { err(""); }
    #[test] fn err_unclosed() { err("<Deck><Card></Deck>"); }
    #[test] fn err_two_roots() { err("<A/><B/>"); }
    #[test] fn err_duplicate_attribute() { err(r#"<Card Id="1" Id="2"/>"#); }
    #[test] fn err_stray_close() { err("</Card>"); }
}
