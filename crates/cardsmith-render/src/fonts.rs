//! Font loading and text measurement.
//!
//! Families are named by the caller (the generator uses the file stem of
//! each file in the project's `Fonts/` directory). Measurement works
//! without any loaded font: it falls back to an empirical line metric so
//! layout stays deterministic on machines without the font assets.

use crate::error::RenderError;
use crate::geometry::Vec2;

/// Owns the fonts loaded for one render session.
///
/// Fonts are immutable after loading. The library is built once per run
/// and shared by every card, so glyph metrics cannot drift between cards.
pub struct FontLibrary {
    entries: Vec<(String, fontdue::Font)>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Parses and stores a TrueType or OpenType font under `family`.
    pub fn load(&mut self, family: impl Into<String>, bytes: &[u8]) -> Result<(), RenderError> {
        let family = family.into();
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| RenderError::FontLoad { name: family.clone(), message: e.to_string() })?;
        self.entries.push((family, font));
        Ok(())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The font for `family` (case-insensitive), or the first loaded font
    /// when the family is unknown or unspecified. `None` only when the
    /// library is empty.
    pub(crate) fn resolve(&self, family: Option<&str>) -> Option<&fontdue::Font> {
        if let Some(name) = family {
            if let Some((_, font)) =
                self.entries.iter().find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                return Some(font);
            }
            if let Some((fallback, font)) = self.entries.first() {
                log::warn!("font family '{name}' is not loaded; using '{fallback}'");
                return Some(font);
            }
            return None;
        }
        self.entries.first().map(|(_, f)| f)
    }

    /// Computes the bounding box of a laid-out text string, in logical
    /// units.
    ///
    /// The layout runs at `size * scale` physical pixels and the result is
    /// divided back, so the measured width matches the painter's
    /// physical-pixel glyph positions exactly. This eliminates the
    /// cumulative per-character drift that arises when fontdue's advances
    /// at different pixel sizes are not perfectly proportional.
    #[must_use]
    pub fn measure(
        &self,
        text: &str,
        family: Option<&str>,
        size: f32,
        max_width: Option<f32>,
        scale: f32,
    ) -> Vec2 {
        use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

        let Some(font) = self.resolve(family) else {
            return Vec2::new(0.0, size * 1.2);
        };

        let scale = scale.max(0.01);
        let phys_size = size * scale;
        let phys_max = max_width.map(|w| w * scale);

        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings { max_width: phys_max, ..LayoutSettings::default() });
        layout.append(&[font], &TextStyle::new(text, phys_size, 0));

        let glyphs = layout.glyphs();
        if glyphs.is_empty() {
            return Vec2::new(0.0, size * 1.2);
        }

        // Use the pen position *after* each glyph (= g.x - xmin + advance_width)
        // rather than the bitmap right edge (= g.x + g.width). Fontdue's wrap
        // check compares the advance extent against max_width, so a width
        // measured this way never triggers spurious wrapping when it is fed
        // back in as the paint max_width.
        let w = glyphs
            .iter()
            .map(|g| {
                let m = font.metrics_indexed(g.key.glyph_index, phys_size);
                (g.x - m.xmin as f32 + m.advance_width).max(0.0)
            })
            .fold(0.0f32, f32::max)
            / scale;
        let h = glyphs.iter().map(|g| g.y + g.height as f32).fold(phys_size, f32::max) / scale;
        Vec2::new(w, h)
    }
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_library_measures_with_the_line_fallback() {
        let lib = FontLibrary::new();
        assert_eq!(lib.measure("Hello", None, 10.0, None, 1.0), Vec2::new(0.0, 12.0));
        assert_eq!(lib.measure("Hello", Some("Cinzel"), 20.0, None, 3.125), Vec2::new(0.0, 24.0));
    }

    #[test]
    fn fallback_is_scale_invariant() {
        // The fallback is a logical metric; the physical scale must not leak in.
        let lib = FontLibrary::new();
        let at_1x = lib.measure("x", None, 12.0, None, 1.0);
        let at_300dpi = lib.measure("x", None, 12.0, None, 300.0 / 96.0);
        assert_eq!(at_1x, at_300dpi);
    }

    #[test]
    fn garbage_bytes_are_a_font_load_error() {
        let mut lib = FontLibrary::new();
        let err = lib.load("Broken", &[0x00, 0x01, 0x02]).unwrap_err();
        assert!(err.to_string().starts_with("cannot load font 'Broken'"));
        assert!(lib.is_empty());
    }

    #[test]
    fn resolve_on_an_empty_library_is_none() {
        let lib = FontLibrary::new();
        assert!(lib.resolve(None).is_none());
        assert!(lib.resolve(Some("Anything")).is_none());
    }
}
