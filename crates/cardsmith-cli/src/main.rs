//! Command-line batch generation over a card project directory.
//!
//! Expected layout under the project root: `Templates/` holds template
//! source files named by stem, `Decks/` holds deck XML, and an optional
//! `Fonts/` holds TTF/OTF files whose stem is the `FontFamily` name.
//! Renders land in `Renders/<deck>/<Id>.png`; compiled listings and
//! generated markup land in `Debug/`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cardsmith_gen::{
    BuiltinResolver, DeckSource, FontLibrary, GenError, GenerationSession, LoggingConfig,
    SessionOptions, init_logging,
};

/// Batch-renders every card of every deck in a project.
#[derive(Parser, Debug)]
#[command(name = "cardsmith", version, about)]
struct Cli {
    /// Project root containing Templates/, Decks/ and optionally Fonts/.
    #[arg(value_name = "PROJECT", default_value = ".")]
    project: PathBuf,

    /// Generate only the named deck (repeatable; default: all decks).
    #[arg(long = "deck", value_name = "NAME")]
    decks: Vec<String>,

    /// Keep the full surface instead of cropping to the Card node.
    #[arg(long = "no-crop")]
    no_crop: bool,

    /// Suppress the Card node's border stroke.
    #[arg(long = "no-border")]
    no_border: bool,

    /// Print every compiled template listing after the run.
    #[arg(long = "dump-ir")]
    dump_ir: bool,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: filter_for(cli.verbose),
        ..LoggingConfig::default()
    });

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Generation errors print their full source-carrying report;
            // everything else prints the anyhow chain.
            match e.downcast_ref::<GenError>() {
                Some(r#gen) => eprintln!("{}", r#gen.report()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn filter_for(verbose: u8) -> Option<String> {
    match verbose {
        0 => None,
        1 => Some("info".into()),
        2 => Some("debug".into()),
        _ => Some("trace".into()),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let templates = load_templates(&cli.project.join("Templates"))?;
    let decks = load_decks(&cli.project.join("Decks"), &cli.decks)?;
    let fonts = load_fonts(&cli.project.join("Fonts"))?;

    let options = SessionOptions { crop: !cli.no_crop, draw_border: !cli.no_border };
    let mut session = GenerationSession::open(
        &cli.project,
        templates,
        fonts,
        Box::new(BuiltinResolver),
        options,
    )?;
    let outcome = session.run(&decks);

    if cli.dump_ir {
        for (name, listing) in session.compiled() {
            println!("── {name} ──");
            println!("{listing}");
        }
    }

    if outcome.is_ok() {
        println!("{} deck(s) rendered to {}", decks.len(), session.renders_path().display());
    }
    session.close();
    outcome.map_err(Into::into)
}

/// Reads every file in `Templates/` as template source, keyed by stem.
fn load_templates(dir: &Path) -> Result<HashMap<String, String>> {
    let mut templates = HashMap::new();
    for path in files_in(dir)? {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let source = fs::read_to_string(&path)
            .with_context(|| format!("reading template {}", path.display()))?;
        if templates.insert(stem.to_string(), source).is_some() {
            bail!("duplicate template name '{stem}' in {}", dir.display());
        }
    }
    log::debug!("loaded {} template(s)", templates.len());
    Ok(templates)
}

/// Reads `Decks/*.xml`. With an explicit `--deck` filter only the named
/// decks load, and naming a missing deck is an error.
fn load_decks(dir: &Path, filter: &[String]) -> Result<Vec<DeckSource>> {
    let mut decks = Vec::new();
    for path in files_in(dir)? {
        if path.extension().and_then(|e| e.to_str()) != Some("xml") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !filter.is_empty() && !filter.iter().any(|f| f == stem) {
            continue;
        }
        let source = fs::read_to_string(&path)
            .with_context(|| format!("reading deck {}", path.display()))?;
        decks.push(DeckSource::new(stem, source));
    }
    for name in filter {
        if !decks.iter().any(|d| d.name == *name) {
            bail!("deck '{name}' not found in {}", dir.display());
        }
    }
    log::debug!("loaded {} deck(s)", decks.len());
    Ok(decks)
}

/// Loads every TTF/OTF in `Fonts/`, family named by stem. A missing
/// directory simply means no fonts; layout then uses the fallback metric.
fn load_fonts(dir: &Path) -> Result<FontLibrary> {
    let mut fonts = FontLibrary::new();
    if !dir.is_dir() {
        return Ok(fonts);
    }
    for path in files_in(dir)? {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some("ttf" | "otf")) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let bytes =
            fs::read(&path).with_context(|| format!("reading font {}", path.display()))?;
        fonts
            .load(stem, &bytes)
            .with_context(|| format!("loading font {}", path.display()))?;
    }
    log::debug!("loaded {} font(s)", fonts.len());
    Ok(fonts)
}

/// Non-directory entries of `dir`, sorted by name for a stable run order.
fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
