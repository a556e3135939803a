//! Parses markup text into a [`Visual`] tree.
//!
//! The dialect is a closed set of elements; anything else is an error, on
//! the theory that a typo in a template should fail the run, not silently
//! drop a visual. `{Binding X}` attribute values are substituted from the
//! card Record here, before values are parsed, so a bound value goes
//! through exactly the same validation as a literal one.

use std::path::{Path, PathBuf};

use cardsmith_record::Record;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::color::{Color, parse_color};
use crate::error::RenderError;
use crate::geometry::Edges;
use crate::visual::{Kind, Orientation, Stretch, TextWrapping, Visual};

/// Builds the visual tree for one card's markup.
///
/// Relative `Image` sources resolve against `base_dir` (the project root).
pub fn build_tree(markup: &str, card: &Record, base_dir: &Path) -> Result<Visual, RenderError> {
    TreeParser::new(markup, card, base_dir).parse()
}

// ── TreeParser ────────────────────────────────────────────────────────────

struct TreeParser<'s> {
    source: &'s str,
    reader: Reader<&'s [u8]>,
    card: &'s Record,
    base_dir: &'s Path,
    /// Open elements awaiting their closing tag, with the byte offset of
    /// the `<` that opened them.
    stack: Vec<(String, Visual, usize)>,
    root: Option<Visual>,
}

impl<'s> TreeParser<'s> {
    fn new(source: &'s str, card: &'s Record, base_dir: &'s Path) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        // Tag mismatches are reported by our own stack check, with positions.
        reader.config_mut().check_end_names = false;
        Self { source, reader, card, base_dir, stack: Vec::new(), root: None }
    }

    fn err(&self, msg: impl Into<String>, offset: usize) -> RenderError {
        let (line, col) = line_col(self.source, offset);
        RenderError::markup(msg, line, col)
    }

    fn parse(mut self) -> Result<Visual, RenderError> {
        loop {
            let event_start = self.reader.buffer_position() as usize;
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let tag = tag_name(&e);
                    let visual = self.open_element(&tag, &e, event_start)?;
                    self.stack.push((tag, visual, event_start));
                }
                Ok(Event::Empty(e)) => {
                    let tag = tag_name(&e);
                    let visual = self.open_element(&tag, &e, event_start)?;
                    self.attach(visual, event_start)?;
                }
                Ok(Event::End(e)) => {
                    let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let (tag, visual, _) = self.stack.pop().ok_or_else(|| {
                        self.err(format!("unexpected closing tag </{end_name}>"), event_start)
                    })?;
                    if tag != end_name {
                        return Err(self.err(
                            format!("expected </{tag}>, found </{end_name}>"),
                            event_start,
                        ));
                    }
                    self.attach(visual, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| {
                        self.err(format!("invalid text content: {err}"), event_start)
                    })?;
                    if !text.trim().is_empty() {
                        return Err(self.err(
                            "element text content is not supported; use a TextBlock with a Text attribute",
                            event_start,
                        ));
                    }
                }
                Ok(Event::CData(_)) => {
                    return Err(self.err("CDATA content is not supported", event_start));
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    let offset = self.reader.error_position() as usize;
                    return Err(self.err(e.to_string(), offset));
                }
            }
        }

        if let Some((tag, _, opened_at)) = self.stack.last() {
            return Err(self.err(format!("missing closing tag </{tag}>"), *opened_at));
        }
        match self.root.take() {
            Some(root) => Ok(root),
            None => Err(self.err("markup has no root element", 0)),
        }
    }

    fn attach(&mut self, visual: Visual, offset: usize) -> Result<(), RenderError> {
        // Error construction is deferred so the parent borrow is released
        // before `self.err` reads the source.
        let problem = match self.stack.last_mut() {
            Some((tag, parent, _)) => match &parent.kind {
                Kind::Grid | Kind::Stack { .. } => {
                    parent.children.push(visual);
                    None
                }
                Kind::Border { .. } if parent.children.is_empty() => {
                    parent.children.push(visual);
                    None
                }
                Kind::Border { .. } => Some("Border accepts a single child".to_string()),
                Kind::Text { .. } | Kind::Image { .. } => {
                    Some(format!("<{tag}> cannot contain child elements"))
                }
            },
            None if self.root.is_some() => {
                Some("markup has more than one root element".to_string())
            }
            None => {
                self.root = Some(visual);
                None
            }
        };
        match problem {
            Some(msg) => Err(self.err(msg, offset)),
            None => Ok(()),
        }
    }

    fn open_element(
        &self,
        tag: &str,
        e: &BytesStart<'_>,
        offset: usize,
    ) -> Result<Visual, RenderError> {
        let mut builder = match tag {
            "Grid" => ElementBuilder::new(Kind::Grid),
            "StackPanel" => {
                ElementBuilder::new(Kind::Stack { orientation: Orientation::Vertical })
            }
            "Border" => ElementBuilder::new(Kind::Border {
                padding: Edges::default(),
                background: None,
                border_brush: None,
                border_thickness: Edges::default(),
                corner_radius: 0.0,
            }),
            "TextBlock" => ElementBuilder::new(Kind::Text {
                text: String::new(),
                size: 12.0,
                family: None,
                foreground: Color::BLACK,
                wrapping: TextWrapping::NoWrap,
            }),
            "Image" => ElementBuilder::new(Kind::Image {
                source: PathBuf::new(),
                bitmap: image::RgbaImage::new(0, 0),
                stretch: Stretch::Uniform,
            }),
            other => return Err(self.err(format!("unknown element '{other}'"), offset)),
        };

        for attr in e.attributes() {
            let attr =
                attr.map_err(|err| self.err(format!("invalid attribute: {err}"), offset))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let raw = attr
                .unescape_value()
                .map_err(|err| self.err(format!("invalid attribute value: {err}"), offset))?;
            let value = resolve_binding(&raw, self.card);
            builder
                .set(tag, &key, &value)
                .map_err(|msg| self.err(msg, offset))?;
        }

        builder.finish(tag, self.base_dir).map_err(|e| match e {
            FinishError::Markup(msg) => self.err(msg, offset),
            FinishError::Image(err) => err,
        })
    }
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let mut line = 1;
    let mut col = 1;
    for ch in source[..clamped].chars() {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

// ── Binding substitution ──────────────────────────────────────────────────

/// Replaces a whole-value `{Binding X}` / `{Binding Path=X}` with the
/// card's `X` attribute, empty when absent. Anything else passes through.
fn resolve_binding<'a>(value: &'a str, card: &Record) -> std::borrow::Cow<'a, str> {
    use std::borrow::Cow;

    let trimmed = value.trim();
    let Some(inner) = trimmed.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return Cow::Borrowed(value);
    };
    let Some(rest) = inner.trim().strip_prefix("Binding") else {
        return Cow::Borrowed(value);
    };
    let rest = rest.trim();
    let path = rest.strip_prefix("Path=").map(str::trim).unwrap_or(rest);
    Cow::Owned(card.attribute(path).unwrap_or("").to_string())
}

// ── ElementBuilder ────────────────────────────────────────────────────────

/// Accumulates attributes for one element, then loads any deferred
/// resources (image bitmaps) in `finish`.
struct ElementBuilder {
    visual: Visual,
    image_source: Option<String>,
}

enum FinishError {
    Markup(String),
    Image(RenderError),
}

impl ElementBuilder {
    fn new(kind: Kind) -> Self {
        Self { visual: Visual::new(kind), image_source: None }
    }

    fn set(&mut self, tag: &str, key: &str, value: &str) -> Result<(), String> {
        // Attributes shared by every element.
        match key {
            "x:Name" => {
                self.visual.name = Some(value.to_string());
                return Ok(());
            }
            "Margin" => {
                self.visual.margin = parse_thickness(value)?;
                return Ok(());
            }
            "Width" => {
                self.visual.width = Some(parse_size(value)?);
                return Ok(());
            }
            "Height" => {
                self.visual.height = Some(parse_size(value)?);
                return Ok(());
            }
            _ => {}
        }

        match &mut self.visual.kind {
            Kind::Grid => Err(unknown_attribute(tag, key)),
            Kind::Stack { orientation } => match key {
                "Orientation" => {
                    *orientation = parse_orientation(value)?;
                    Ok(())
                }
                _ => Err(unknown_attribute(tag, key)),
            },
            Kind::Border { padding, background, border_brush, border_thickness, corner_radius } => {
                match key {
                    "Padding" => *padding = parse_thickness(value)?,
                    "Background" => *background = Some(parse_color(value)?),
                    "BorderBrush" => *border_brush = Some(parse_color(value)?),
                    "BorderThickness" => *border_thickness = parse_thickness(value)?,
                    "CornerRadius" => *corner_radius = parse_size(value)?,
                    _ => return Err(unknown_attribute(tag, key)),
                }
                Ok(())
            }
            Kind::Text { text, size, family, foreground, wrapping } => {
                match key {
                    "Text" => *text = value.to_string(),
                    "FontSize" => *size = parse_size(value)?,
                    "FontFamily" => *family = Some(value.to_string()),
                    "Foreground" => *foreground = parse_color(value)?,
                    "TextWrapping" => *wrapping = parse_wrapping(value)?,
                    _ => return Err(unknown_attribute(tag, key)),
                }
                Ok(())
            }
            Kind::Image { stretch, .. } => match key {
                "Source" => {
                    self.image_source = Some(value.to_string());
                    Ok(())
                }
                "Stretch" => {
                    *stretch = parse_stretch(value)?;
                    Ok(())
                }
                _ => Err(unknown_attribute(tag, key)),
            },
        }
    }

    fn finish(mut self, tag: &str, base_dir: &Path) -> Result<Visual, FinishError> {
        if let Kind::Image { source, bitmap, .. } = &mut self.visual.kind {
            let Some(raw) = self.image_source.take() else {
                return Err(FinishError::Markup(format!("<{tag}> requires a Source attribute")));
            };
            let path = resolve_source(&raw, base_dir);
            let decoded = image::open(&path).map_err(|e| {
                FinishError::Image(RenderError::Image { path: path.clone(), message: e.to_string() })
            })?;
            *bitmap = decoded.to_rgba8();
            *source = path;
        }
        Ok(self.visual)
    }
}

fn resolve_source(raw: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() { p.to_path_buf() } else { base_dir.join(p) }
}

fn unknown_attribute(tag: &str, key: &str) -> String {
    format!("<{tag}> has no attribute '{key}'")
}

// ── Attribute value parsers ───────────────────────────────────────────────

fn parse_size(s: &str) -> Result<f32, String> {
    let v: f32 = s.trim().parse().map_err(|_| format!("'{s}' is not a number"))?;
    if v < 0.0 {
        return Err(format!("'{s}' must not be negative"));
    }
    Ok(v)
}

/// 1, 2, or 4 comma-separated numbers: uniform; horizontal,vertical;
/// left,top,right,bottom.
fn parse_thickness(s: &str) -> Result<Edges, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|_| format!("'{s}' is not a thickness")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [u] => Ok(Edges::all(*u)),
        [h, v] => Ok(Edges::symmetric(*v, *h)),
        [l, t, r, b] => Ok(Edges::from_sides(*l, *t, *r, *b)),
        _ => Err(format!("'{s}' is not a thickness (expected 1, 2, or 4 numbers)")),
    }
}

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    match s.trim() {
        v if v.eq_ignore_ascii_case("Horizontal") => Ok(Orientation::Horizontal),
        v if v.eq_ignore_ascii_case("Vertical") => Ok(Orientation::Vertical),
        _ => Err(format!("'{s}' is not an Orientation (Horizontal or Vertical)")),
    }
}

fn parse_wrapping(s: &str) -> Result<TextWrapping, String> {
    match s.trim() {
        v if v.eq_ignore_ascii_case("NoWrap") => Ok(TextWrapping::NoWrap),
        v if v.eq_ignore_ascii_case("Wrap") => Ok(TextWrapping::Wrap),
        _ => Err(format!("'{s}' is not a TextWrapping (NoWrap or Wrap)")),
    }
}

fn parse_stretch(s: &str) -> Result<Stretch, String> {
    match s.trim() {
        v if v.eq_ignore_ascii_case("Uniform") => Ok(Stretch::Uniform),
        v if v.eq_ignore_ascii_case("Fill") => Ok(Stretch::Fill),
        v if v.eq_ignore_ascii_case("None") => Ok(Stretch::None),
        _ => Err(format!("'{s}' is not a Stretch (Uniform, Fill, or None)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_record::parse_record;

    fn card(xml: &str) -> Record {
        parse_record(xml).unwrap()
    }

    fn build(markup: &str) -> Result<Visual, RenderError> {
        build_tree(markup, &card("<Card Id=\"1\"/>"), Path::new("."))
    }

    // ── Structure ─────────────────────────────────────────────────────────

    #[test]
    fn minimal_grid() {
        let v = build("<Grid/>").unwrap();
        assert!(matches!(v.kind, Kind::Grid));
        assert!(v.children.is_empty());
    }

    #[test]
    fn nested_panels() {
        let v = build(
            r#"<Grid>
                 <StackPanel Orientation="Horizontal">
                   <TextBlock Text="a"/>
                   <TextBlock Text="b"/>
                 </StackPanel>
               </Grid>"#,
        )
        .unwrap();
        assert_eq!(v.children.len(), 1);
        let stack = &v.children[0];
        assert!(matches!(stack.kind, Kind::Stack { orientation: Orientation::Horizontal }));
        assert_eq!(stack.children.len(), 2);
    }

    #[test]
    fn stackpanel_defaults_to_vertical() {
        let v = build("<StackPanel/>").unwrap();
        assert!(matches!(v.kind, Kind::Stack { orientation: Orientation::Vertical }));
    }

    #[test]
    fn border_takes_one_child_only() {
        assert!(build("<Border><Grid/></Border>").is_ok());
        let e = build("<Border><Grid/><Grid/></Border>").unwrap_err();
        assert!(e.to_string().contains("single child"), "{e}");
    }

    #[test]
    fn leaves_reject_children() {
        let e = build(r#"<TextBlock Text="x"><Grid/></TextBlock>"#).unwrap_err();
        assert!(e.to_string().contains("cannot contain child elements"), "{e}");
    }

    #[test]
    fn stray_text_is_rejected() {
        let e = build("<Grid>hello</Grid>").unwrap_err();
        assert!(e.to_string().contains("text content"), "{e}");
        // whitespace between tags is fine
        assert!(build("<Grid>\n  <Grid/>\n</Grid>").is_ok());
    }

    #[test]
    fn unknown_element_is_an_error_with_position() {
        let e = build("<Grid>\n<Canvas/>\n</Grid>").unwrap_err();
        assert_eq!(e.to_string(), "markup error at 2:1: unknown element 'Canvas'");
    }

    #[test]
    fn unknown_attribute_names_the_element() {
        let e = build(r#"<Grid Opacity="0.5"/>"#).unwrap_err();
        assert!(e.to_string().contains("<Grid> has no attribute 'Opacity'"), "{e}");
    }

    #[test]
    fn xmlns_and_xname_are_understood() {
        let v = build(
            r#"<Grid xmlns="d" xmlns:x="ns"><Border x:Name="Card"/></Grid>"#,
        )
        .unwrap();
        assert!(v.find_named("Card").is_some());
    }

    // ── Attribute values ──────────────────────────────────────────────────

    #[test]
    fn border_attributes_parse() {
        let v = build(
            r##"<Border Margin="8" Padding="4,2" Background="White"
                       BorderBrush="#336699" BorderThickness="2,4,6,8"
                       CornerRadius="10" Width="240" Height="336"/>"##,
        )
        .unwrap();
        assert_eq!(v.margin, Edges::all(8.0));
        assert_eq!(v.width, Some(240.0));
        assert_eq!(v.height, Some(336.0));
        let Kind::Border { padding, background, border_brush, border_thickness, corner_radius } =
            &v.kind
        else {
            panic!("not a border");
        };
        assert_eq!(*padding, Edges::symmetric(2.0, 4.0));
        assert_eq!(*background, Some(Color::rgb(255, 255, 255)));
        assert_eq!(*border_brush, Some(Color::rgb(0x33, 0x66, 0x99)));
        assert_eq!(*border_thickness, Edges::from_sides(2.0, 4.0, 6.0, 8.0));
        assert_eq!(*corner_radius, 10.0);
    }

    #[test]
    fn textblock_defaults() {
        let v = build("<TextBlock/>").unwrap();
        let Kind::Text { text, size, family, foreground, wrapping } = &v.kind else {
            panic!("not text");
        };
        assert_eq!(text, "");
        assert_eq!(*size, 12.0);
        assert!(family.is_none());
        assert_eq!(*foreground, Color::BLACK);
        assert_eq!(*wrapping, TextWrapping::NoWrap);
    }

    #[test]
    fn malformed_values_are_markup_errors() {
        assert!(build(r#"<Border BorderThickness="1,2,3"/>"#).is_err());
        assert!(build(r#"<Border Background="blurple"/>"#).is_err());
        assert!(build(r#"<TextBlock FontSize="big"/>"#).is_err());
        assert!(build(r#"<Border Width="-4"/>"#).is_err());
        assert!(build(r#"<StackPanel Orientation="Diagonal"/>"#).is_err());
    }

    #[test]
    fn negative_margins_are_allowed() {
        let v = build(r#"<Grid Margin="-5"/>"#).unwrap();
        assert_eq!(v.margin, Edges::all(-5.0));
    }

    // ── Bindings ──────────────────────────────────────────────────────────

    #[test]
    fn bindings_substitute_card_attributes() {
        let c = card(r##"<Card Id="7" Title="Aurora" Fill="#102030"/>"##);
        let v = build_tree(
            r#"<Border Background="{Binding Fill}">
                 <TextBlock Text="{Binding Path=Title}"/>
               </Border>"#,
            &c,
            Path::new("."),
        )
        .unwrap();
        let Kind::Border { background, .. } = &v.kind else { panic!() };
        assert_eq!(*background, Some(Color::rgb(0x10, 0x20, 0x30)));
        let Kind::Text { text, .. } = &v.children[0].kind else { panic!() };
        assert_eq!(text, "Aurora");
    }

    #[test]
    fn absent_binding_is_empty() {
        let v = build(r#"<TextBlock Text="{Binding Missing}"/>"#).unwrap();
        let Kind::Text { text, .. } = &v.kind else { panic!() };
        assert_eq!(text, "");
    }

    #[test]
    fn bound_values_are_still_validated() {
        let c = card(r#"<Card Id="1" W="oops"/>"#);
        let e = build_tree(r#"<Border Width="{Binding W}"/>"#, &c, Path::new(".")).unwrap_err();
        assert!(e.to_string().contains("not a number"), "{e}");
    }

    #[test]
    fn non_binding_braces_pass_through() {
        let v = build(r#"<TextBlock Text="{curly}"/>"#).unwrap();
        let Kind::Text { text, .. } = &v.kind else { panic!() };
        assert_eq!(text, "{curly}");
    }

    // ── Images ────────────────────────────────────────────────────────────

    #[test]
    fn image_requires_a_source() {
        let e = build("<Image/>").unwrap_err();
        assert!(e.to_string().contains("requires a Source"), "{e}");
    }

    #[test]
    fn missing_image_file_is_an_image_error() {
        let e = build(r#"<Image Source="art/nope.png"/>"#).unwrap_err();
        assert!(matches!(e, RenderError::Image { .. }), "{e}");
        assert!(e.to_string().contains("nope.png"), "{e}");
    }

    #[test]
    fn image_loads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("art")).unwrap();
        image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(dir.path().join("art/pip.png"))
            .unwrap();

        let v = build_tree(
            r#"<Image Source="art/pip.png" Stretch="None"/>"#,
            &card("<Card Id=\"1\"/>"),
            dir.path(),
        )
        .unwrap();
        let Kind::Image { bitmap, stretch, .. } = &v.kind else { panic!() };
        assert_eq!((bitmap.width(), bitmap.height()), (4, 2));
        assert_eq!(*stretch, Stretch::None);
    }
}
