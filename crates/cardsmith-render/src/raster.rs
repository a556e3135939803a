//! The renderer entry point: markup text in, pixels out.
//!
//! The pipeline is parse (with card bindings), optional border
//! suppression, measure/arrange, paint at `dpi / 96`, optional crop to the
//! node named `Card`, PNG encode. Every stage is a deterministic function
//! of its inputs.

use std::path::PathBuf;

use cardsmith_record::Record;
use tiny_skia::Pixmap;

use crate::error::RenderError;
use crate::fonts::FontLibrary;
use crate::geometry::{Constraints, Rect, Vec2};
use crate::layout::{arrange, measure};
use crate::markup::build_tree;
use crate::paint::paint;
use crate::visual::{Kind, Visual};

/// Per-card render settings, after deck/card defaults are merged.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Dots per inch; logical units are 1/96 inch.
    pub dpi: f64,
    /// Explicit surface width in pixels; defaults to desired size × dpi/96.
    pub width: Option<u32>,
    /// Explicit surface height in pixels.
    pub height: Option<u32>,
    /// Crop the surface to the node named `Card`, when present.
    pub crop: bool,
    /// When false, the `Card` node's border brush is suppressed before
    /// painting. Layout is unaffected.
    pub draw_border: bool,
    /// Project root; relative `Image` sources resolve against it.
    pub base_dir: PathBuf,
}

impl RenderOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            dpi: 300.0,
            width: None,
            height: None,
            crop: true,
            draw_border: true,
            base_dir: base_dir.into(),
        }
    }
}

/// Renders one card's markup to a pixmap.
pub fn render_markup(
    markup: &str,
    card: &Record,
    fonts: &FontLibrary,
    options: &RenderOptions,
) -> Result<Pixmap, RenderError> {
    let mut root = build_tree(markup, card, &options.base_dir)?;

    if !options.draw_border {
        if let Some(node) = root.find_named_mut("Card") {
            if let Kind::Border { border_brush, .. } = &mut node.kind {
                *border_brush = None;
            }
        }
    }

    let k = (options.dpi / 96.0) as f32;
    measure(&mut root, fonts, Constraints::unbounded(), k);
    let size = root.desired;
    arrange(&mut root, Rect::from_origin_size(Vec2::zero(), size));

    let width = options.width.unwrap_or((size.x as f64 * options.dpi / 96.0) as u32);
    let height = options.height.unwrap_or((size.y as f64 * options.dpi / 96.0) as u32);
    let mut pixmap =
        Pixmap::new(width, height).ok_or(RenderError::Surface { width, height })?;
    paint(&root, &mut pixmap, k, fonts);
    log::debug!("painted {width}x{height} surface at dpi {}", options.dpi);

    if options.crop {
        if let Some(node) = root.find_named("Card") {
            return crop_to(&pixmap, node, options.dpi);
        }
    }
    Ok(pixmap)
}

/// Encodes a rendered pixmap as PNG bytes.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap.encode_png().map_err(|e| RenderError::Encode { message: e.to_string() })
}

/// Crops to the card node: offset by its margin, sized by its arranged
/// content box, all scaled to pixels and truncated.
fn crop_to(pixmap: &Pixmap, node: &Visual, dpi: f64) -> Result<Pixmap, RenderError> {
    let k = dpi / 96.0;
    let x = (node.margin.left as f64 * k) as i32;
    let y = (node.margin.top as f64 * k) as i32;
    let width = (node.rect.size.x as f64 * k) as u32;
    let height = (node.rect.size.y as f64 * k) as u32;

    let surface = (pixmap.width(), pixmap.height());
    let inside = x >= 0
        && y >= 0
        && width > 0
        && height > 0
        && x as i64 + width as i64 <= surface.0 as i64
        && y as i64 + height as i64 <= surface.1 as i64;
    let cropped = inside
        .then(|| tiny_skia::IntRect::from_xywh(x, y, width, height))
        .flatten()
        .and_then(|r| pixmap.clone_rect(r));
    cropped.ok_or(RenderError::Crop { x, y, width, height, surface })
}
