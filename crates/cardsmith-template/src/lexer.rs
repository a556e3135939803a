use crate::error::{Diagnostic, Pos};

// ── Segment ───────────────────────────────────────────────────────────────

/// One lexed piece of a template: a verbatim markup chunk, a directive, or
/// a part of a split attribute value.
///
/// A literal attribute value stays inside a plain `Literal` chunk. Only
/// when a directive interrupts a quoted value does the lexer split the
/// surrounding markup into the `AttrBegin`/`AttrLiteral`/`AttrExpr`/
/// `AttrEnd` form that the runtime's attribute protocol consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    AttrBegin { name: String, prefix: String },
    AttrLiteral(String),
    AttrExpr { src: String, raw: bool, pos: Pos },
    AttrEnd { suffix: String },
    Expr { src: String, raw: bool, pos: Pos },
    If { cond_src: String, pos: Pos },
    Else { pos: Pos },
    EndIf { pos: Pos },
    For { head_src: String, pos: Pos },
    EndFor { pos: Pos },
}

/// Splits template source into literal markup and directives.
pub fn lex(src: &str) -> Result<Vec<Segment>, Diagnostic> {
    Lexer::new(src).run()
}

/// Collects module names declared by `<!-- reference NAME -->` comments,
/// in declaration order, deduplicated, each with the position of its
/// comment. The comments themselves still pass through to the output as
/// ordinary literal markup.
pub fn scan_references(src: &str) -> Vec<(String, Pos)> {
    let mut out: Vec<(String, Pos)> = Vec::new();
    let mut offset = 0;
    while let Some(i) = src[offset..].find("<!--") {
        let comment_at = offset + i;
        let after = &src[comment_at + 4..];
        let Some(j) = after.find("-->") else { break };
        let body = after[..j].trim();
        let keyword = "reference".len();
        let bytes = body.as_bytes();
        if bytes.len() > keyword
            && bytes[..keyword].eq_ignore_ascii_case(b"reference")
            && bytes[keyword].is_ascii_whitespace()
        {
            let name = body[keyword..].trim();
            if !name.is_empty() && !out.iter().any(|(n, _)| n == name) {
                out.push((name.to_string(), pos_at(src, comment_at)));
            }
        }
        offset = comment_at + 4 + j + 3;
    }
    out
}

fn pos_at(src: &str, offset: usize) -> Pos {
    let mut pos = Pos::START;
    for ch in src[..offset].chars() {
        pos.advance(ch);
    }
    pos
}

// ── Lexer ─────────────────────────────────────────────────────────────────

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    loc: Pos,
    pending: String,
    segments: Vec<Segment>,
    markup: Markup,
}

/// Loose markup tracking, just enough to know whether a directive sits
/// inside a quoted attribute value. The generated document is properly
/// validated later, when the renderer parses it.
enum Markup {
    Text,
    Tag(TagTrack),
    Value(ValueTrack),
}

#[derive(Default)]
struct TagTrack {
    /// Set at `=`: the attribute name and the `pending` index where its
    /// leading whitespace begins. Cleared by any char other than
    /// whitespace or an opening quote.
    awaiting: Option<(String, usize)>,
}

struct ValueTrack {
    quote: char,
    attr_name: String,
    /// `pending` index where ` Name="` begins.
    prefix_start: usize,
    /// `pending` index just past the opening quote.
    content_start: usize,
    /// True once a directive split this value.
    split: bool,
}

enum Dir {
    Expr { src: String, raw: bool },
    If(String),
    Else,
    EndIf,
    For(String),
    EndFor,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            loc: Pos::START,
            pending: String::new(),
            segments: Vec::new(),
            markup: Markup::Text,
        }
    }

    fn run(mut self) -> Result<Vec<Segment>, Diagnostic> {
        while self.pos < self.src.len() {
            if self.src[self.pos..].starts_with("@@") {
                self.bump();
                self.bump();
                self.pending.push('@');
                continue;
            }
            if self.src[self.pos..].starts_with('@') {
                self.directive()?;
                continue;
            }
            let ch = match self.bump() {
                Some(c) => c,
                None => break,
            };
            self.literal_char(ch);
        }

        if let Markup::Value(v) = &self.markup
            && v.split
        {
            return Err(Diagnostic::error(
                format!("attribute '{}' is not closed before end of template", v.attr_name),
                self.loc,
            ));
        }
        self.flush_literal();
        Ok(self.segments)
    }

    // ── char scanning ─────────────────────────────────────────────────────

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        self.loc.advance(ch);
        Some(ch)
    }

    // ── literal accumulation with markup tracking ─────────────────────────

    fn literal_char(&mut self, ch: char) {
        match &mut self.markup {
            Markup::Text => {
                self.pending.push(ch);
                if ch == '<' {
                    self.markup = Markup::Tag(TagTrack::default());
                }
            }
            Markup::Tag(track) => {
                match ch {
                    '>' => {
                        self.pending.push(ch);
                        self.markup = Markup::Text;
                    }
                    '=' => {
                        track.awaiting = attr_before_eq(&self.pending);
                        self.pending.push(ch);
                    }
                    '"' | '\'' => {
                        if let Some((attr_name, prefix_start)) = track.awaiting.take() {
                            self.pending.push(ch);
                            self.markup = Markup::Value(ValueTrack {
                                quote: ch,
                                attr_name,
                                prefix_start,
                                content_start: self.pending.len(),
                                split: false,
                            });
                        } else {
                            self.pending.push(ch);
                        }
                    }
                    c if c.is_whitespace() => {
                        self.pending.push(ch);
                    }
                    _ => {
                        track.awaiting = None;
                        self.pending.push(ch);
                    }
                }
            }
            Markup::Value(track) => {
                if ch == track.quote {
                    if track.split {
                        let run = std::mem::take(&mut self.pending);
                        if !run.is_empty() {
                            self.segments.push(Segment::AttrLiteral(run));
                        }
                        self.segments.push(Segment::AttrEnd { suffix: ch.to_string() });
                    } else {
                        self.pending.push(ch);
                    }
                    self.markup = Markup::Tag(TagTrack::default());
                } else {
                    self.pending.push(ch);
                }
            }
        }
    }

    fn flush_literal(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.segments.push(Segment::Literal(text));
        }
    }

    // ── directives ────────────────────────────────────────────────────────

    fn directive(&mut self) -> Result<(), Diagnostic> {
        let pos = self.loc;
        self.bump(); // consume `@`
        let dir = self.scan_directive(pos)?;

        let in_value = matches!(&self.markup, Markup::Value(_));
        match dir {
            Dir::Expr { src, raw } => {
                if in_value {
                    self.split_attr_value();
                    self.segments.push(Segment::AttrExpr { src, raw, pos });
                } else {
                    self.flush_literal();
                    self.segments.push(Segment::Expr { src, raw, pos });
                }
            }
            ctrl => {
                if in_value {
                    return Err(Diagnostic::error(
                        "control directives are not allowed inside attribute values",
                        pos,
                    ));
                }
                self.flush_literal();
                self.segments.push(match ctrl {
                    Dir::If(cond_src) => Segment::If { cond_src, pos },
                    Dir::Else => Segment::Else { pos },
                    Dir::EndIf => Segment::EndIf { pos },
                    Dir::For(head_src) => Segment::For { head_src, pos },
                    Dir::EndFor => Segment::EndFor { pos },
                    Dir::Expr { .. } => unreachable!("handled above"),
                });
            }
        }
        Ok(())
    }

    /// First directive inside a quoted value: splits the pending literal
    /// into plain markup, the attribute prefix, and the value written so
    /// far, then switches the value into protocol mode.
    fn split_attr_value(&mut self) {
        let Markup::Value(track) = &mut self.markup else { return };
        if track.split {
            let run = std::mem::take(&mut self.pending);
            if !run.is_empty() {
                self.segments.push(Segment::AttrLiteral(run));
            }
            return;
        }
        track.split = true;
        let before = self.pending[..track.prefix_start].to_string();
        let prefix = self.pending[track.prefix_start..track.content_start].to_string();
        let value_so_far = self.pending[track.content_start..].to_string();
        let name = track.attr_name.clone();
        self.pending.clear();

        if !before.is_empty() {
            self.segments.push(Segment::Literal(before));
        }
        self.segments.push(Segment::AttrBegin { name, prefix });
        if !value_so_far.is_empty() {
            self.segments.push(Segment::AttrLiteral(value_so_far));
        }
    }

    fn scan_directive(&mut self, pos: Pos) -> Result<Dir, Diagnostic> {
        match self.peek_char() {
            Some('(') => {
                self.bump();
                let src = self.consume_balanced('(', ')', pos)?;
                Ok(Dir::Expr { src, raw: false })
            }
            Some(c) if is_ident_start(c) => {
                let word = self.scan_ident();
                match word.as_str() {
                    "if" => Ok(Dir::If(self.keyword_args("if", pos)?)),
                    "for" => Ok(Dir::For(self.keyword_args("for", pos)?)),
                    "raw" => {
                        let src = self.keyword_args("raw", pos)?;
                        Ok(Dir::Expr { src, raw: true })
                    }
                    "else" => Ok(Dir::Else),
                    "endif" => Ok(Dir::EndIf),
                    "endfor" => Ok(Dir::EndFor),
                    _ => {
                        let src = self.scan_path_tail(word)?;
                        Ok(Dir::Expr { src, raw: false })
                    }
                }
            }
            _ => Err(Diagnostic::error(
                "expected an expression or directive after '@' (use '@@' for a literal '@')",
                pos,
            )),
        }
    }

    /// `( ... )` after a directive keyword, whitespace tolerated before the
    /// opening paren.
    fn keyword_args(&mut self, keyword: &str, pos: Pos) -> Result<String, Diagnostic> {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        if self.peek_char() != Some('(') {
            return Err(Diagnostic::error(format!("expected '(' after @{keyword}"), pos));
        }
        self.bump();
        self.consume_balanced('(', ')', pos)
    }

    fn scan_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if is_ident(c)) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// Continues an implicit expression after its root identifier:
    /// `.ident`, `( ... )`, and `[ ... ]` steps, stopping at the first
    /// character that cannot extend the path.
    fn scan_path_tail(&mut self, root: String) -> Result<String, Diagnostic> {
        let start = self.pos - root.len();
        loop {
            match self.peek_char() {
                Some('.') => {
                    let mut ahead = self.src[self.pos..].chars();
                    ahead.next();
                    if matches!(ahead.next(), Some(c) if is_ident_start(c)) {
                        self.bump();
                        self.scan_ident();
                    } else {
                        break;
                    }
                }
                Some('(') => {
                    let pos = self.loc;
                    self.bump();
                    self.consume_balanced('(', ')', pos)?;
                }
                Some('[') => {
                    let pos = self.loc;
                    self.bump();
                    self.consume_balanced('[', ']', pos)?;
                }
                _ => break,
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Consumes up to and including the matching close bracket, returning
    /// the inner content. Same-type brackets nest; double-quoted strings
    /// are skipped so quotes inside arguments cannot terminate an
    /// enclosing attribute value.
    fn consume_balanced(&mut self, open: char, close: char, pos: Pos) -> Result<String, Diagnostic> {
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.peek_char() {
            if c == '"' {
                self.bump();
                self.skip_string(pos)?;
            } else if c == open {
                depth += 1;
                self.bump();
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    let src = self.src[start..self.pos].to_string();
                    self.bump();
                    return Ok(src);
                }
                self.bump();
            } else {
                self.bump();
            }
        }
        Err(Diagnostic::error(format!("unterminated '{open}' in directive"), pos))
    }

    fn skip_string(&mut self, pos: Pos) -> Result<(), Diagnostic> {
        loop {
            match self.bump() {
                None => {
                    return Err(Diagnostic::error("unterminated string in directive", pos));
                }
                Some('\\') => {
                    self.bump();
                }
                Some('"') => return Ok(()),
                Some(_) => {}
            }
        }
    }
}

/// Scans backward from the end of `pending` (which sits just before an
/// `=`) for the attribute name and the start of its leading whitespace.
fn attr_before_eq(pending: &str) -> Option<(String, usize)> {
    let end = pending.trim_end().len();
    let start = pending[..end]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_attr_name(c))
        .last()
        .map(|(i, _)| i)?;
    let prefix_start = pending[..start]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_whitespace())
        .last()
        .map_or(start, |(i, _)| i);
    Some((pending[start..end].to_string(), prefix_start))
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[inline]
fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[inline]
fn is_attr_name(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(src: &str) -> Vec<Segment> {
        lex(src).unwrap()
    }

    #[test]
    fn literal_only() {
        let segs = lex_ok("<Grid><Border/></Grid>");
        assert_eq!(segs, vec![Segment::Literal("<Grid><Border/></Grid>".into())]);
    }

    #[test]
    fn at_escape() {
        let segs = lex_ok("a@@b");
        assert_eq!(segs, vec![Segment::Literal("a@b".into())]);
    }

    #[test]
    fn implicit_expression_between_tags() {
        let segs = lex_ok("<T>@Data.Id</T>");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment::Literal("<T>".into()));
        match &segs[1] {
            Segment::Expr { src, raw: false, .. } => assert_eq!(src, "Data.Id"),
            other => panic!("expected Expr, got {other:?}"),
        }
        assert_eq!(segs[2], Segment::Literal("</T>".into()));
    }

    #[test]
    fn implicit_expression_stops_at_trailing_dot() {
        let segs = lex_ok("@Data.Id. more");
        match &segs[0] {
            Segment::Expr { src, .. } => assert_eq!(src, "Data.Id"),
            other => panic!("expected Expr, got {other:?}"),
        }
        assert_eq!(segs[1], Segment::Literal(". more".into()));
    }

    #[test]
    fn implicit_expression_with_call_and_index() {
        let segs = lex_ok(r#"@Data["Note", 0].text()!"#);
        match &segs[0] {
            Segment::Expr { src, .. } => assert_eq!(src, r#"Data["Note", 0].text()"#),
            other => panic!("expected Expr, got {other:?}"),
        }
        assert_eq!(segs[1], Segment::Literal("!".into()));
    }

    #[test]
    fn explicit_and_raw_expressions() {
        let segs = lex_ok("@(Data.Id)@raw(Data.xml())");
        match (&segs[0], &segs[1]) {
            (
                Segment::Expr { src: a, raw: false, .. },
                Segment::Expr { src: b, raw: true, .. },
            ) => {
                assert_eq!(a, "Data.Id");
                assert_eq!(b, "Data.xml()");
            }
            other => panic!("unexpected segments {other:?}"),
        }
    }

    #[test]
    fn control_block_segments() {
        let segs = lex_ok("@if(Data.Rare)gold@else plain@endif");
        assert!(matches!(segs[0], Segment::If { .. }));
        assert_eq!(segs[1], Segment::Literal("gold".into()));
        assert!(matches!(segs[2], Segment::Else { .. }));
        assert_eq!(segs[3], Segment::Literal(" plain".into()));
        assert!(matches!(segs[4], Segment::EndIf { .. }));
    }

    #[test]
    fn attribute_value_splits_into_protocol_segments() {
        let segs = lex_ok(r#"<Img Source="art/@(Data.Id).png"/>"#);
        assert_eq!(segs[0], Segment::Literal("<Img".into()));
        assert_eq!(
            segs[1],
            Segment::AttrBegin { name: "Source".into(), prefix: " Source=\"".into() }
        );
        assert_eq!(segs[2], Segment::AttrLiteral("art/".into()));
        match &segs[3] {
            Segment::AttrExpr { src, raw: false, .. } => assert_eq!(src, "Data.Id"),
            other => panic!("expected AttrExpr, got {other:?}"),
        }
        assert_eq!(segs[4], Segment::AttrLiteral(".png".into()));
        assert_eq!(segs[5], Segment::AttrEnd { suffix: "\"".into() });
        assert_eq!(segs[6], Segment::Literal("/>".into()));
    }

    #[test]
    fn attribute_value_without_directive_stays_literal() {
        let segs = lex_ok(r#"<Border Background="Red"/>"#);
        assert_eq!(segs, vec![Segment::Literal(r#"<Border Background="Red"/>"#.into())]);
    }

    #[test]
    fn directive_first_in_attribute_value() {
        let segs = lex_ok(r#"<T A="@Data.Id"/>"#);
        assert_eq!(segs[0], Segment::Literal("<T".into()));
        assert_eq!(segs[1], Segment::AttrBegin { name: "A".into(), prefix: " A=\"".into() });
        assert!(matches!(segs[2], Segment::AttrExpr { .. }));
        assert_eq!(segs[3], Segment::AttrEnd { suffix: "\"".into() });
    }

    #[test]
    fn quotes_inside_directive_args_do_not_close_the_value() {
        let segs = lex_ok(r#"<Img Source="@path("a.png")"/>"#);
        assert!(matches!(segs[1], Segment::AttrBegin { .. }));
        match &segs[2] {
            Segment::AttrExpr { src, .. } => assert_eq!(src, r#"path("a.png")"#),
            other => panic!("expected AttrExpr, got {other:?}"),
        }
        assert_eq!(segs[3], Segment::AttrEnd { suffix: "\"".into() });
    }

    #[test]
    fn control_directive_in_attribute_value_is_rejected() {
        let err = lex(r#"<T A="@if(Data.X)y@endif"/>"#).unwrap_err();
        assert!(err.message.contains("attribute values"), "{}", err.message);
    }

    #[test]
    fn control_directive_between_attributes_is_allowed() {
        let segs = lex_ok(r#"<Border @if(Data.Rare) Background="Gold" @endif/>"#);
        assert_eq!(segs[0], Segment::Literal("<Border ".into()));
        assert!(matches!(segs[1], Segment::If { .. }));
        assert_eq!(segs[2], Segment::Literal(r#" Background="Gold" "#.into()));
        assert!(matches!(segs[3], Segment::EndIf { .. }));
        assert_eq!(segs[4], Segment::Literal("/>".into()));
    }

    #[test]
    fn unterminated_directive_is_an_error() {
        let err = lex("@if(Data.X").unwrap_err();
        assert!(err.message.contains("unterminated"), "{}", err.message);
    }

    #[test]
    fn stray_at_is_an_error() {
        let err = lex("cost: @ 3").unwrap_err();
        assert!(err.message.contains("'@@'"), "{}", err.message);
    }

    #[test]
    fn directive_positions_are_tracked() {
        let segs = lex_ok("<T>\n  @Data.Id\n</T>");
        match &segs[1] {
            Segment::Expr { pos, .. } => assert_eq!(*pos, Pos::new(2, 3)),
            other => panic!("expected Expr, got {other:?}"),
        }
    }

    #[test]
    fn references_scanned_case_insensitively() {
        let refs = scan_references(
            "<!-- reference text -->\n<Grid/>\n<!--REFERENCE  math -->\n<!-- reference text -->",
        );
        let names: Vec<&str> = refs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["text", "math"]);
        assert_eq!(refs[0].1, Pos::new(1, 1));
        assert_eq!(refs[1].1, Pos::new(3, 1));
    }

    #[test]
    fn non_reference_comments_ignored() {
        assert!(scan_references("<!-- references are elsewhere -->").is_empty());
        assert!(scan_references("<!-- note -->").is_empty());
    }
}
