//! Markup-to-raster rendering for card generation.
//!
//! Takes the markup a compiled template produced, builds a visual tree,
//! lays it out in logical units (1/96 inch), paints it at the requested
//! DPI, optionally crops to the node named `Card`, and encodes PNG. The
//! whole pipeline is CPU-side and deterministic: same markup, same card,
//! same fonts, same pixels.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`markup`] | dialect parser, `{Binding}` substitution |
//! | [`visual`] | the typed visual tree |
//! | [`layout`] | measure and arrange passes |
//! | [`paint`] | tiny-skia painting, glyph and image blending |
//! | [`raster`] | `render_markup`, `RenderOptions`, crop, PNG |
//! | [`fonts`] | `FontLibrary`: loading and measurement |
//! | [`geometry`] | `Vec2`, `Rect`, `Edges`, `Constraints` |
//! | [`color`] | brush parsing |
//! | [`error`] | `RenderError` |
//!
//! # Quick start
//!
//! ```rust
//! use cardsmith_record::parse_record;
//! use cardsmith_render::{FontLibrary, RenderOptions, render_markup};
//!
//! let card = parse_record(r#"<Card Id="1"/>"#).unwrap();
//! let markup = r#"
//!     <Grid>
//!       <Border x:Name="Card" Margin="8" Width="96" Height="48"
//!               Background="White" BorderBrush="Black" BorderThickness="1"/>
//!     </Grid>"#;
//! let pixmap = render_markup(markup, &card, &FontLibrary::new(), &RenderOptions::new(".")).unwrap();
//! // 96 logical units at the default 300 dpi crop to 300 pixels.
//! assert_eq!((pixmap.width(), pixmap.height()), (300, 150));
//! ```

pub mod color;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod markup;
pub mod paint;
pub mod raster;
pub mod visual;

pub use color::{Color, parse_color};
pub use error::RenderError;
pub use fonts::FontLibrary;
pub use markup::build_tree;
pub use raster::{RenderOptions, encode_png, render_markup};

// Re-exported so callers can hold a surface without naming tiny-skia.
pub use tiny_skia::Pixmap;
