use std::fmt;
use std::path::PathBuf;

/// Any failure between markup text and encoded PNG.
///
/// The orchestrator treats every variant the same way (the card's render
/// failed); the variants exist so the report can say which stage gave up.
#[derive(Debug)]
pub enum RenderError {
    /// The markup is not well-formed XML, or uses an element, attribute,
    /// or value outside the renderer dialect.
    Markup { message: String, line: usize, col: usize },
    /// An `Image` source could not be read or decoded.
    Image { path: PathBuf, message: String },
    /// A font file could not be parsed.
    FontLoad { name: String, message: String },
    /// The resolved raster size has a zero dimension or exceeds what the
    /// pixmap allocator accepts.
    Surface { width: u32, height: u32 },
    /// The crop region for the `Card` node falls outside the rendered
    /// surface.
    Crop { x: i32, y: i32, width: u32, height: u32, surface: (u32, u32) },
    /// PNG encoding failed.
    Encode { message: String },
}

impl RenderError {
    pub(crate) fn markup(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::Markup { message: message.into(), line, col }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markup { message, line, col } => {
                write!(f, "markup error at {line}:{col}: {message}")
            }
            Self::Image { path, message } => {
                write!(f, "cannot load image {}: {message}", path.display())
            }
            Self::FontLoad { name, message } => {
                write!(f, "cannot load font '{name}': {message}")
            }
            Self::Surface { width, height } => {
                write!(f, "cannot allocate a {width}x{height} render surface")
            }
            Self::Crop { x, y, width, height, surface } => write!(
                f,
                "crop region {width}x{height} at ({x},{y}) is outside the {}x{} surface",
                surface.0, surface.1
            ),
            Self::Encode { message } => write!(f, "png encoding failed: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_position() {
        let e = RenderError::markup("unknown element 'Canvas'", 3, 7);
        assert_eq!(e.to_string(), "markup error at 3:7: unknown element 'Canvas'");
    }

    #[test]
    fn display_names_the_crop_surface() {
        let e = RenderError::Crop { x: 10, y: 10, width: 500, height: 700, surface: (300, 400) };
        assert_eq!(
            e.to_string(),
            "crop region 500x700 at (10,10) is outside the 300x400 surface"
        );
    }
}
