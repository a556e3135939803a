//! Deck-driven card generation: the orchestrator over the record,
//! template, and render crates.
//!
//! A [`GenerationSession`] owns one run. Opening it empties the `Renders/`
//! and `Debug/` trees under the project root; each deck's cards are then
//! generated in document order. Templates compile once per run on first
//! use, every card writes its markup artifact before rendering, and the
//! first error aborts the run with a [`GenError`] that can print a full
//! source-carrying report. Closing (or dropping) the session releases the
//! compiled units and their modules.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`session`] | `GenerationSession`, deck/card orchestration |
//! | [`error`] | `GenError` taxonomy, `report()` formatting |
//! | [`logging`] | `env_logger` setup |
//!
//! # Quick start
//!
//! ```rust
//! use std::collections::HashMap;
//! use cardsmith_gen::{
//!     BuiltinResolver, DeckSource, FontLibrary, GenerationSession, SessionOptions,
//! };
//!
//! let root = tempfile::tempdir().unwrap();
//! let templates = HashMap::from([(
//!     "Unit".to_string(),
//!     r#"<Grid><Border x:Name="Card" Width="48" Height="24" Margin="2"
//!          Background="White"/></Grid>"#.to_string(),
//! )]);
//! let mut session = GenerationSession::open(
//!     root.path(),
//!     templates,
//!     FontLibrary::new(),
//!     Box::new(BuiltinResolver),
//!     SessionOptions::default(),
//! ).unwrap();
//! session.run(&[DeckSource::new(
//!     "Heroes",
//!     r#"<Deck Template="Unit" Dpi="96"><Card Id="1"/></Deck>"#,
//! )]).unwrap();
//! assert!(root.path().join("Renders/Heroes/1.png").is_file());
//! session.close();
//! ```

pub mod error;
pub mod logging;
pub mod session;

pub use error::{DataError, GenError};
pub use logging::{LoggingConfig, init_logging};
pub use session::{CancelFlag, CardSettings, DeckSource, GenerationSession, SessionOptions};

// Re-exported: every session host needs these to call `open`.
pub use cardsmith_render::FontLibrary;
pub use cardsmith_template::{BuiltinResolver, MemoryResolver, ModuleResolver};
