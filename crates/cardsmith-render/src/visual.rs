//! The typed visual tree the markup parses into.
//!
//! Layout writes its results back into the tree: [`Visual::desired`] after
//! measure (margin included) and [`Visual::rect`] after arrange (the
//! content box, margin excluded). The crop stage reads the `Card` node's
//! margin and arranged size, exactly the values a template author reasons
//! about.

use std::path::PathBuf;

use crate::color::Color;
use crate::geometry::{Edges, Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextWrapping {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stretch {
    /// Scale to fit inside the slot, preserving aspect ratio.
    Uniform,
    /// Scale to fill the slot exactly.
    Fill,
    /// Natural size, no scaling.
    None,
}

/// One node of the visual tree.
#[derive(Debug)]
pub struct Visual {
    pub kind: Kind,
    /// `x:Name` from markup. `Card` is the one name with meaning: it marks
    /// the crop target and the border the generator may suppress.
    pub name: Option<String>,
    pub margin: Edges,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub children: Vec<Visual>,
    /// Set by measure: desired size including margin.
    pub desired: Vec2,
    /// Set by arrange: the content box, margin excluded.
    pub rect: Rect,
}

#[derive(Debug)]
pub enum Kind {
    Grid,
    Stack {
        orientation: Orientation,
    },
    Border {
        padding: Edges,
        background: Option<Color>,
        border_brush: Option<Color>,
        border_thickness: Edges,
        corner_radius: f32,
    },
    Text {
        text: String,
        size: f32,
        family: Option<String>,
        foreground: Color,
        wrapping: TextWrapping,
    },
    Image {
        source: PathBuf,
        bitmap: image::RgbaImage,
        stretch: Stretch,
    },
}

impl Visual {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            name: None,
            margin: Edges::default(),
            width: None,
            height: None,
            children: Vec::new(),
            desired: Vec2::zero(),
            rect: Rect::default(),
        }
    }

    /// Depth-first search for the first node with `x:Name` equal to `name`.
    /// Names are case-sensitive.
    pub fn find_named(&self, name: &str) -> Option<&Visual> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_named(name))
    }

    pub fn find_named_mut(&mut self, name: &str) -> Option<&mut Visual> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_named_mut(name))
    }
}
