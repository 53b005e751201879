//! rstdcx
//!
//! Cross-reference resolution for restructuredText document trees. Every
//! folder gets `_links_<format>.rst` substitution files binding target ids to
//! links, plus a `.tags` file locating each target.

pub mod builder;
pub mod config;
pub mod document;
pub mod emitter;
pub mod error;
pub mod extract;
pub mod folder;
pub mod generate;
pub mod inclusion;
pub mod session;
pub mod utils;

pub use builder::{BuildStats, LinkBuilder};
pub use config::BuildConfig;
pub use document::DocumentCache;
pub use emitter::{emit, render, OutputFormat};
pub use error::BuildError;
pub use extract::{find_links, find_targets, BlockKind, LinkRef, Target};
pub use folder::{scan, DocumentEntry, FolderScope};
pub use generate::{ManifestEntry, TransformRegistry};
pub use inclusion::{InclusionWalker, Inclusions};
pub use session::ScanSession;
