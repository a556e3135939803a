//! The generation session: parses decks, compiles templates on first use,
//! executes them per card, renders the markup, and writes the `Renders/`
//! and `Debug/` artifact trees.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cardsmith_record::{parse_record, Record};
use cardsmith_render::{encode_png, render_markup, FontLibrary, RenderOptions};
use cardsmith_template::{compile_template, InstructionBackend, ModuleResolver, TemplateUnit};

use crate::error::{DataError, GenError};

// ── CancelFlag ────────────────────────────────────────────────────────────

/// Shared stop signal checked at card boundaries. Clones share one flag,
/// so a host can keep a handle and cancel a running session from outside.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Session inputs ────────────────────────────────────────────────────────

/// One deck to generate: its name (the source file stem) and raw XML.
#[derive(Debug, Clone)]
pub struct DeckSource {
    pub name: String,
    pub source: String,
}

impl DeckSource {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into() }
    }
}

/// Run-wide renderer switches.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Crop output to the node named `Card` when present.
    pub crop: bool,
    /// Draw the card node's border stroke.
    pub draw_border: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { crop: true, draw_border: true }
    }
}

// ── CardSettings ──────────────────────────────────────────────────────────

/// The four attributes the orchestrator itself reads. On the deck root
/// they are defaults; a card may override any of them. Everything else on
/// a card is template-visible data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardSettings {
    pub template: Option<String>,
    pub dpi: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl CardSettings {
    pub(crate) fn from_record(r: &Record) -> Result<Self, DataError> {
        Ok(Self {
            template: r.attribute("Template").map(str::to_string),
            dpi: parse_attr(r, "Dpi")?,
            width: parse_attr(r, "Width")?,
            height: parse_attr(r, "Height")?,
        })
    }

    /// Fills gaps from the deck defaults; the card's own values win.
    pub(crate) fn or(self, defaults: &Self) -> Self {
        Self {
            template: self.template.or_else(|| defaults.template.clone()),
            dpi: self.dpi.or(defaults.dpi),
            width: self.width.or(defaults.width),
            height: self.height.or(defaults.height),
        }
    }
}

fn parse_attr<T: FromStr>(r: &Record, name: &str) -> Result<Option<T>, DataError> {
    match r.attribute(name) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| DataError::Attribute {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

// ── GenerationSession ─────────────────────────────────────────────────────

/// One generation run. Opening empties the artifact trees; compiled units
/// and their modules live exactly as long as the session.
pub struct GenerationSession {
    project_root: PathBuf,
    renders_path: PathBuf,
    debug_path: PathBuf,
    templates: HashMap<String, String>,
    units: HashMap<String, Box<dyn TemplateUnit>>,
    fonts: FontLibrary,
    resolver: Box<dyn ModuleResolver>,
    options: SessionOptions,
    cancel: CancelFlag,
}

impl GenerationSession {
    /// Opens a session over a project root. `Renders/` and `Debug/` under
    /// the root are created if missing and emptied of previous artifacts.
    pub fn open(
        project_root: impl Into<PathBuf>,
        templates: HashMap<String, String>,
        fonts: FontLibrary,
        resolver: Box<dyn ModuleResolver>,
        options: SessionOptions,
    ) -> Result<Self, GenError> {
        let project_root = project_root.into();
        let renders_path = project_root.join("Renders");
        let debug_path = project_root.join("Debug");
        empty_dir(&renders_path)?;
        empty_dir(&debug_path)?;
        log::debug!("session open at {}", project_root.display());
        Ok(Self {
            project_root,
            renders_path,
            debug_path,
            templates,
            units: HashMap::new(),
            fonts,
            resolver,
            options,
            cancel: CancelFlag::new(),
        })
    }

    /// A handle on the session's cancel flag.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[inline]
    pub fn renders_path(&self) -> &Path {
        &self.renders_path
    }

    #[inline]
    pub fn debug_path(&self) -> &Path {
        &self.debug_path
    }

    /// Generates every deck in order. The first error aborts the run;
    /// artifacts already written stay on disk.
    pub fn run(&mut self, decks: &[DeckSource]) -> Result<(), GenError> {
        for deck in decks {
            self.generate_deck(deck)?;
        }
        Ok(())
    }

    /// Generates one deck: parses it, reads root defaults, then renders
    /// its cards in document order.
    pub fn generate_deck(&mut self, deck: &DeckSource) -> Result<(), GenError> {
        let root = parse_record(&deck.source).map_err(|e| GenError::DataParsing {
            deck: deck.name.clone(),
            code: deck.source.clone(),
            cause: DataError::Xml(e),
        })?;
        let defaults = CardSettings::from_record(&root).map_err(|cause| GenError::DataParsing {
            deck: deck.name.clone(),
            code: deck.source.clone(),
            cause,
        })?;

        fs::create_dir_all(self.renders_path.join(&deck.name))?;
        fs::create_dir_all(self.debug_path.join(&deck.name))?;
        log::info!("generating deck {} ({} cards)", deck.name, root.child_count());

        for (i, card) in root.children().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("cancelled before card {} of deck {}", i + 1, deck.name);
                return Err(GenError::Cancelled);
            }
            let settings = CardSettings::from_record(&card)
                .map_err(|cause| GenError::DataParsing {
                    deck: deck.name.clone(),
                    code: deck.source.clone(),
                    cause,
                })?
                .or(&defaults);
            self.generate_card(&deck.name, i + 1, &card, settings)?;
        }
        Ok(())
    }

    /// `index` is the card's 1-based document-order position, used when the
    /// card cannot be named by Id.
    fn generate_card(
        &mut self,
        deck: &str,
        index: usize,
        card: &Record,
        settings: CardSettings,
    ) -> Result<(), GenError> {
        // Field-level borrows: the unit borrowed from `units` stays live
        // while `templates`, `fonts` and the paths are read.
        let Self {
            project_root,
            renders_path,
            debug_path,
            templates,
            units,
            fonts,
            resolver,
            options,
            ..
        } = self;

        let template = settings.template.unwrap_or_default();
        let source = templates.get(&template).ok_or_else(|| GenError::TemplateNotFound {
            deck: deck.to_string(),
            template: template.clone(),
        })?;

        let id = card.attribute("Id").ok_or_else(|| GenError::MissingId {
            deck: deck.to_string(),
            index,
        })?;

        // Compiled on first use; later cards with the same template reuse
        // the unit for the rest of the run.
        let unit = match units.entry(template.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(slot) => {
                let unit =
                    compile_template(source, project_root, resolver.as_ref(), &InstructionBackend)
                        .map_err(|cause| GenError::Compilation {
                            template: template.clone(),
                            code: source.clone(),
                            cause,
                        })?;
                fs::write(debug_path.join(format!("{template}.txt")), unit.listing())?;
                log::debug!("compiled template {template}");
                slot.insert(unit)
            }
        };

        let markup = unit.execute(card).map_err(|cause| GenError::Execution {
            deck: deck.to_string(),
            card: id.to_string(),
            code: unit.listing().to_string(),
            cause,
        })?;

        // Written before rendering so the artifact survives a render
        // failure.
        fs::write(debug_path.join(deck).join(format!("{id}.xml")), &markup)?;

        let mut render = RenderOptions::new(project_root.clone());
        if let Some(dpi) = settings.dpi {
            render.dpi = dpi;
        }
        render.width = settings.width;
        render.height = settings.height;
        render.crop = options.crop;
        render.draw_border = options.draw_border;

        let render_err = |cause| GenError::Render {
            deck: deck.to_string(),
            card: id.to_string(),
            code: markup.clone(),
            cause,
        };
        let pixmap = render_markup(&markup, card, fonts, &render).map_err(&render_err)?;
        let png = encode_png(&pixmap).map_err(&render_err)?;
        fs::write(renders_path.join(deck).join(format!("{id}.png")), png)?;
        log::info!("rendered {deck}/{id} ({}x{})", pixmap.width(), pixmap.height());
        Ok(())
    }

    /// The units compiled so far, for hosts that print listings after a
    /// run.
    pub fn compiled(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units.iter().map(|(name, unit)| (name.as_str(), unit.listing()))
    }

    /// Tears the run down. Dropping the session has the same effect; the
    /// explicit form marks the end of the run in the host's control flow.
    pub fn close(mut self) {
        self.units.clear();
        log::debug!("generation session closed");
    }
}

/// Creates `path` if needed and removes everything inside it, so a run
/// never sees artifacts from a previous one.
fn empty_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
