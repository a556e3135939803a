//! Paints an arranged visual tree into a tiny-skia pixmap.
//!
//! Geometry is built in logical units and scaled by `k = dpi / 96` through
//! a transform, except text: glyphs are laid out and rasterized directly at
//! physical size so hinting and advances match the measure pass.

use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};

use crate::color::Color;
use crate::fonts::FontLibrary;
use crate::geometry::{Edges, Rect, Vec2, inset_rect};
use crate::visual::{Kind, Stretch, TextWrapping, Visual};

/// Cubic Bezier approximation of a quarter circle.
const KAPPA: f32 = 0.552_284_75;

pub fn paint(root: &Visual, pixmap: &mut Pixmap, k: f32, fonts: &FontLibrary) {
    paint_node(root, pixmap, k, fonts);
}

fn paint_node(v: &Visual, pixmap: &mut Pixmap, k: f32, fonts: &FontLibrary) {
    match &v.kind {
        Kind::Border { background, border_brush, border_thickness, corner_radius, .. } => {
            paint_chrome(v.rect, *background, *border_brush, *border_thickness, *corner_radius, pixmap, k);
        }
        Kind::Text { text, size, family, foreground, wrapping } => {
            paint_text(v.rect, text, *size, family.as_deref(), *foreground, *wrapping, pixmap, k, fonts);
        }
        Kind::Image { bitmap, stretch, .. } => {
            paint_image(v.rect, bitmap, *stretch, pixmap, k);
        }
        Kind::Grid | Kind::Stack { .. } => {}
    }
    for child in &v.children {
        paint_node(child, pixmap, k, fonts);
    }
}

// ── Border ────────────────────────────────────────────────────────────────

fn paint_chrome(
    rect: Rect,
    background: Option<Color>,
    border_brush: Option<Color>,
    thickness: Edges,
    radius: f32,
    pixmap: &mut Pixmap,
    k: f32,
) {
    if rect.is_empty() {
        return;
    }
    let ts = Transform::from_scale(k, k);

    if let Some(bg) = background {
        if let Some(path) = rounded_rect_path(rect, radius) {
            pixmap.fill_path(&path, &solid(bg), FillRule::Winding, ts, None);
        }
    }

    let Some(brush) = border_brush else { return };
    if thickness.is_zero() {
        return;
    }

    let uniform = thickness.left == thickness.right
        && thickness.left == thickness.top
        && thickness.left == thickness.bottom;
    if uniform {
        // Stroke centered on the half-thickness inset keeps the outer edge
        // on the content box.
        let t = thickness.left;
        let inset = inset_rect(rect, Edges::all(t / 2.0));
        if let Some(path) = rounded_rect_path(inset, (radius - t / 2.0).max(0.0)) {
            let stroke = Stroke { width: t, ..Stroke::default() };
            pixmap.stroke_path(&path, &solid(brush), &stroke, ts, None);
        }
        return;
    }

    // Non-uniform thickness: four edge bands, corner radius not supported.
    let paint = solid(brush);
    let (x0, y0) = (rect.origin.x, rect.origin.y);
    let (w, h) = (rect.size.x, rect.size.y);
    let bands = [
        Rect::new(x0, y0, w, thickness.top),
        Rect::new(x0, y0 + h - thickness.bottom, w, thickness.bottom),
        Rect::new(x0, y0, thickness.left, h),
        Rect::new(x0 + w - thickness.right, y0, thickness.right, h),
    ];
    for band in bands {
        if band.is_empty() {
            continue;
        }
        if let Some(r) =
            tiny_skia::Rect::from_xywh(band.origin.x, band.origin.y, band.size.x, band.size.y)
        {
            pixmap.fill_rect(r, &paint, ts, None);
        }
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn rounded_rect_path(rect: Rect, radius: f32) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let r = radius.min(rect.size.x / 2.0).min(rect.size.y / 2.0).max(0.0);
    if r == 0.0 {
        pb.push_rect(tiny_skia::Rect::from_xywh(
            rect.origin.x,
            rect.origin.y,
            rect.size.x,
            rect.size.y,
        )?);
        return pb.finish();
    }
    let (x0, y0) = (rect.origin.x, rect.origin.y);
    let (x1, y1) = (x0 + rect.size.x, y0 + rect.size.y);
    let c = r * KAPPA;
    pb.move_to(x0 + r, y0);
    pb.line_to(x1 - r, y0);
    pb.cubic_to(x1 - r + c, y0, x1, y0 + r - c, x1, y0 + r);
    pb.line_to(x1, y1 - r);
    pb.cubic_to(x1, y1 - r + c, x1 - r + c, y1, x1 - r, y1);
    pb.line_to(x0 + r, y1);
    pb.cubic_to(x0 + r - c, y1, x0, y1 - r + c, x0, y1 - r);
    pb.line_to(x0, y0 + r);
    pb.cubic_to(x0, y0 + r - c, x0 + r - c, y0, x0 + r, y0);
    pb.close();
    pb.finish()
}

// ── Text ──────────────────────────────────────────────────────────────────

fn paint_text(
    rect: Rect,
    text: &str,
    size: f32,
    family: Option<&str>,
    color: Color,
    wrapping: TextWrapping,
    pixmap: &mut Pixmap,
    k: f32,
    fonts: &FontLibrary,
) {
    use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

    // No loaded font: measurement already fell back to the line metric and
    // the glyphs are skipped.
    let Some(font) = fonts.resolve(family) else { return };
    if text.is_empty() {
        return;
    }

    let k = k.max(0.01);
    let phys_size = size * k;
    let max_width = match wrapping {
        TextWrapping::Wrap if rect.size.x.is_finite() => Some(rect.size.x * k),
        _ => None,
    };

    let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x: rect.origin.x * k,
        y: rect.origin.y * k,
        max_width,
        ..LayoutSettings::default()
    });
    layout.append(&[font], &TextStyle::new(text, phys_size, 0));

    for g in layout.glyphs() {
        if !g.char_data.rasterize() || g.width == 0 || g.height == 0 {
            continue;
        }
        let (_, coverage) = font.rasterize_config(g.key);
        blend_glyph(
            pixmap,
            g.x.round() as i32,
            g.y.round() as i32,
            g.width,
            g.height,
            &coverage,
            color,
        );
    }
}

/// Alpha-blends a fontdue coverage bitmap into the premultiplied pixmap.
fn blend_glyph(
    pixmap: &mut Pixmap,
    x: i32,
    y: i32,
    w: usize,
    h: usize,
    coverage: &[u8],
    color: Color,
) {
    let pw = pixmap.width() as i32;
    let ph = pixmap.height() as i32;
    let (sr, sg, sb, sa) = (
        color.r as f32 / 255.0,
        color.g as f32 / 255.0,
        color.b as f32 / 255.0,
        color.a as f32 / 255.0,
    );
    let pixels = pixmap.pixels_mut();

    for row in 0..h as i32 {
        let py = y + row;
        if py < 0 || py >= ph {
            continue;
        }
        for col in 0..w as i32 {
            let px = x + col;
            if px < 0 || px >= pw {
                continue;
            }
            let cov = coverage[(row as usize) * w + col as usize] as f32 / 255.0;
            if cov <= 0.0 {
                continue;
            }
            let a = sa * cov;
            let inv = 1.0 - a;
            let idx = (py * pw + px) as usize;
            let dst = pixels[idx];
            let na = a + dst.alpha() as f32 / 255.0 * inv;
            let nr = (sr * a + dst.red() as f32 / 255.0 * inv).min(na);
            let ng = (sg * a + dst.green() as f32 / 255.0 * inv).min(na);
            let nb = (sb * a + dst.blue() as f32 / 255.0 * inv).min(na);
            if let Some(out) = PremultipliedColorU8::from_rgba(
                (nr * 255.0 + 0.5) as u8,
                (ng * 255.0 + 0.5) as u8,
                (nb * 255.0 + 0.5) as u8,
                (na * 255.0 + 0.5) as u8,
            ) {
                pixels[idx] = out;
            }
        }
    }
}

// ── Images ────────────────────────────────────────────────────────────────

fn paint_image(rect: Rect, bitmap: &image::RgbaImage, stretch: Stretch, pixmap: &mut Pixmap, k: f32) {
    if rect.is_empty() || bitmap.width() == 0 || bitmap.height() == 0 {
        return;
    }
    let nat = Vec2::new(bitmap.width() as f32, bitmap.height() as f32);

    // Destination box in logical units.
    let dst = match stretch {
        Stretch::Fill => rect,
        Stretch::None => Rect::from_origin_size(rect.origin, nat),
        Stretch::Uniform => {
            let s = (rect.size.x / nat.x).min(rect.size.y / nat.y);
            let size = nat * s;
            let offset = (rect.size - size) * 0.5;
            Rect::from_origin_size(rect.origin + offset, size)
        }
    };

    let dst_w = (dst.size.x * k).round().max(1.0) as u32;
    let dst_h = (dst.size.y * k).round().max(1.0) as u32;
    let scaled;
    let source = if (dst_w, dst_h) == (bitmap.width(), bitmap.height()) {
        bitmap
    } else {
        scaled = image::imageops::resize(bitmap, dst_w, dst_h, image::imageops::FilterType::Triangle);
        &scaled
    };

    let Some(src) = premultiplied_pixmap(source) else { return };
    pixmap.draw_pixmap(
        (dst.origin.x * k).round() as i32,
        (dst.origin.y * k).round() as i32,
        src.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Copies a straight-alpha image into a premultiplied pixmap.
fn premultiplied_pixmap(img: &image::RgbaImage) -> Option<Pixmap> {
    let mut pm = Pixmap::new(img.width(), img.height())?;
    let pixels = pm.pixels_mut();
    for (i, p) in img.pixels().enumerate() {
        let [r, g, b, a] = p.0;
        let af = a as f32 / 255.0;
        pixels[i] = PremultipliedColorU8::from_rgba(
            (r as f32 * af + 0.5) as u8,
            (g as f32 * af + 0.5) as u8,
            (b as f32 * af + 0.5) as u8,
            a,
        )
        .unwrap_or(PremultipliedColorU8::TRANSPARENT);
    }
    Some(pm)
}
