//! Two-pass layout over the visual tree: measure, then arrange.
//!
//! Measure is bottom-up: every node computes its desired size (margin
//! included) under the constraints its parent hands down and stores it in
//! [`Visual::desired`]. Arrange is top-down: the parent assigns each child
//! a slot and the child records its content box in [`Visual::rect`].
//! Explicit `Width`/`Height` pin the content box in both passes.
//!
//! `scale` is the physical pixel ratio (`dpi / 96`). Text is measured at
//! physical size so arranged positions agree with painted glyphs.

use crate::fonts::FontLibrary;
use crate::geometry::{Constraints, Rect, Vec2, inset_rect};
use crate::visual::{Kind, Orientation, Stretch, TextWrapping, Visual};

pub fn measure(v: &mut Visual, fonts: &FontLibrary, c: Constraints, scale: f32) -> Vec2 {
    let Visual { kind, children, margin, width, height, desired, .. } = v;

    let mut avail = c.shrink(*margin).max;
    if let Some(w) = *width {
        avail.x = w;
    }
    if let Some(h) = *height {
        avail.y = h;
    }

    let mut content = match kind {
        Kind::Grid => {
            let child_c = Constraints::loose(avail);
            children
                .iter_mut()
                .map(|ch| measure(ch, fonts, child_c, scale))
                .fold(Vec2::zero(), Vec2::max)
        }
        Kind::Stack { orientation: Orientation::Vertical } => {
            let child_c = Constraints::loose(Vec2::new(avail.x, f32::INFINITY));
            let mut size = Vec2::zero();
            for ch in children.iter_mut() {
                let d = measure(ch, fonts, child_c, scale);
                size.x = size.x.max(d.x);
                size.y += d.y;
            }
            size
        }
        Kind::Stack { orientation: Orientation::Horizontal } => {
            let child_c = Constraints::loose(Vec2::new(f32::INFINITY, avail.y));
            let mut size = Vec2::zero();
            for ch in children.iter_mut() {
                let d = measure(ch, fonts, child_c, scale);
                size.x += d.x;
                size.y = size.y.max(d.y);
            }
            size
        }
        Kind::Border { padding, border_thickness, .. } => {
            let chrome = Vec2::new(
                padding.h() + border_thickness.h(),
                padding.v() + border_thickness.v(),
            );
            let child_c =
                Constraints::loose(avail).shrink(*padding).shrink(*border_thickness);
            let inner = match children.first_mut() {
                Some(ch) => measure(ch, fonts, child_c, scale),
                None => Vec2::zero(),
            };
            inner + chrome
        }
        Kind::Text { text, size, family, wrapping, .. } => {
            let max_width = match wrapping {
                TextWrapping::Wrap if avail.x.is_finite() => Some(avail.x),
                _ => None,
            };
            fonts.measure(text, family.as_deref(), *size, max_width, scale)
        }
        Kind::Image { bitmap, stretch, .. } => {
            image_content_size(bitmap, *stretch, *width, *height)
        }
    };

    if let Some(w) = *width {
        content.x = w;
    }
    if let Some(h) = *height {
        content.y = h;
    }

    *desired = c.constrain(content + Vec2::new(margin.h(), margin.v()));
    *desired
}

/// The natural content size of an image. `Uniform` with one fixed axis
/// scales the other by the bitmap's aspect ratio; everything else defers
/// to the natural size (fixed axes override afterwards).
fn image_content_size(
    bitmap: &image::RgbaImage,
    stretch: Stretch,
    width: Option<f32>,
    height: Option<f32>,
) -> Vec2 {
    let nat = Vec2::new(bitmap.width() as f32, bitmap.height() as f32);
    if stretch != Stretch::Uniform {
        return nat;
    }
    match (width, height) {
        (Some(w), None) if nat.x > 0.0 => Vec2::new(w, w * nat.y / nat.x),
        (None, Some(h)) if nat.y > 0.0 => Vec2::new(h * nat.x / nat.y, h),
        _ => nat,
    }
}

pub fn arrange(v: &mut Visual, slot: Rect) {
    let mut rect = inset_rect(slot, v.margin);
    if let Some(w) = v.width {
        rect.size.x = w;
    }
    if let Some(h) = v.height {
        rect.size.y = h;
    }
    v.rect = rect;

    let Visual { kind, children, .. } = v;
    match kind {
        Kind::Stack { orientation: Orientation::Vertical } => {
            let mut y = rect.origin.y;
            for ch in children.iter_mut() {
                let h = ch.desired.y;
                arrange(ch, Rect::new(rect.origin.x, y, rect.size.x, h));
                y += h;
            }
        }
        Kind::Stack { orientation: Orientation::Horizontal } => {
            let mut x = rect.origin.x;
            for ch in children.iter_mut() {
                let w = ch.desired.x;
                arrange(ch, Rect::new(x, rect.origin.y, w, rect.size.y));
                x += w;
            }
        }
        Kind::Border { padding, border_thickness, .. } => {
            let inner = inset_rect(inset_rect(rect, *border_thickness), *padding);
            if let Some(ch) = children.first_mut() {
                arrange(ch, inner);
            }
        }
        // Grid children overlay the full content box; leaves have none.
        _ => {
            for ch in children.iter_mut() {
                arrange(ch, rect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Edges;
    use crate::visual::Visual;
    use std::path::PathBuf;

    fn fixed(w: f32, h: f32) -> Visual {
        let mut v = Visual::new(Kind::Grid);
        v.width = Some(w);
        v.height = Some(h);
        v
    }

    fn layout_root(v: &mut Visual) {
        let fonts = FontLibrary::new();
        measure(v, &fonts, Constraints::unbounded(), 1.0);
        arrange(v, Rect::from_origin_size(Vec2::zero(), v.desired));
    }

    // ── Measure ───────────────────────────────────────────────────────────

    #[test]
    fn grid_takes_the_max_of_its_children() {
        let mut grid = Visual::new(Kind::Grid);
        grid.children.push(fixed(100.0, 50.0));
        grid.children.push(fixed(60.0, 80.0));
        layout_root(&mut grid);
        assert_eq!(grid.desired, Vec2::new(100.0, 80.0));
        // overlay: both children get the full content box
        assert_eq!(grid.children[0].rect, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(grid.children[1].rect, Rect::new(0.0, 0.0, 60.0, 80.0));
    }

    #[test]
    fn margin_is_part_of_desired_but_not_the_content_box() {
        let mut v = fixed(100.0, 50.0);
        v.margin = Edges::all(10.0);
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(120.0, 70.0));
        assert_eq!(v.rect, Rect::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn vertical_stack_sums_heights() {
        let mut stack = Visual::new(Kind::Stack { orientation: Orientation::Vertical });
        stack.children.push(fixed(50.0, 30.0));
        stack.children.push(fixed(80.0, 40.0));
        layout_root(&mut stack);
        assert_eq!(stack.desired, Vec2::new(80.0, 70.0));
        assert_eq!(stack.children[0].rect, Rect::new(0.0, 0.0, 50.0, 30.0));
        assert_eq!(stack.children[1].rect, Rect::new(0.0, 30.0, 80.0, 40.0));
    }

    #[test]
    fn horizontal_stack_sums_widths() {
        let mut stack = Visual::new(Kind::Stack { orientation: Orientation::Horizontal });
        stack.children.push(fixed(50.0, 30.0));
        stack.children.push(fixed(80.0, 40.0));
        layout_root(&mut stack);
        assert_eq!(stack.desired, Vec2::new(130.0, 40.0));
        assert_eq!(stack.children[1].rect, Rect::new(50.0, 0.0, 80.0, 40.0));
    }

    #[test]
    fn stacked_margins_move_the_cursor() {
        let mut stack = Visual::new(Kind::Stack { orientation: Orientation::Vertical });
        let mut first = fixed(20.0, 10.0);
        first.margin = Edges::all(5.0);
        stack.children.push(first);
        stack.children.push(fixed(20.0, 10.0));
        layout_root(&mut stack);
        assert_eq!(stack.desired, Vec2::new(30.0, 30.0)); // 10+5+5 then 10
        assert_eq!(stack.children[0].rect, Rect::new(5.0, 5.0, 20.0, 10.0));
        assert_eq!(stack.children[1].rect, Rect::new(0.0, 20.0, 20.0, 10.0));
    }

    #[test]
    fn border_wraps_its_child_in_chrome() {
        let mut border = Visual::new(Kind::Border {
            padding: Edges::all(4.0),
            background: None,
            border_brush: None,
            border_thickness: Edges::all(2.0),
            corner_radius: 0.0,
        });
        border.children.push(fixed(10.0, 10.0));
        layout_root(&mut border);
        assert_eq!(border.desired, Vec2::new(22.0, 22.0)); // 10 + 2*4 + 2*2
        assert_eq!(border.children[0].rect, Rect::new(6.0, 6.0, 10.0, 10.0));
    }

    #[test]
    fn fixed_size_wins_over_content() {
        let mut border = Visual::new(Kind::Border {
            padding: Edges::default(),
            background: None,
            border_brush: None,
            border_thickness: Edges::default(),
            corner_radius: 0.0,
        });
        border.width = Some(240.0);
        border.height = Some(336.0);
        border.children.push(fixed(10.0, 10.0));
        layout_root(&mut border);
        assert_eq!(border.desired, Vec2::new(240.0, 336.0));
        assert_eq!(border.rect.size, Vec2::new(240.0, 336.0));
    }

    // ── Text ──────────────────────────────────────────────────────────────

    #[test]
    fn text_without_fonts_uses_the_line_fallback() {
        let mut v = Visual::new(Kind::Text {
            text: "Hello".into(),
            size: 20.0,
            family: None,
            foreground: crate::color::Color::BLACK,
            wrapping: TextWrapping::NoWrap,
        });
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(0.0, 24.0)); // 20 * 1.2
    }

    // ── Images ────────────────────────────────────────────────────────────

    fn image(w: u32, h: u32, stretch: Stretch) -> Visual {
        Visual::new(Kind::Image {
            source: PathBuf::new(),
            bitmap: image::RgbaImage::new(w, h),
            stretch,
        })
    }

    #[test]
    fn image_measures_at_natural_size() {
        let mut v = image(4, 2, Stretch::Uniform);
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(4.0, 2.0));
    }

    #[test]
    fn uniform_image_keeps_aspect_when_one_axis_is_fixed() {
        let mut v = image(4, 2, Stretch::Uniform);
        v.width = Some(8.0);
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(8.0, 4.0));

        let mut v = image(4, 2, Stretch::Uniform);
        v.height = Some(1.0);
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn non_uniform_image_does_not_infer_the_other_axis() {
        let mut v = image(4, 2, Stretch::Fill);
        v.width = Some(8.0);
        layout_root(&mut v);
        assert_eq!(v.desired, Vec2::new(8.0, 2.0));
    }
}
