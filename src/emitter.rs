//! Substitution files and tag files.
//!
//! For every folder one `_links_<format>.rst` per output format and one
//! `.tags` file are written. The substitution files bind each target id to a
//! format specific link; link references found between targets are recorded
//! as comments, unresolved ones with a leading `-`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BuildError, Result};
use crate::extract::{LinkRef, Target};
use crate::folder::FolderScope;
use crate::utils::to_slash;

/// Name of the tag file written into every folder
pub const TAGS_FILE_NAME: &str = ".tags";

/// Marker placed before link ids that do not resolve within their folder
pub const UNRESOLVED_MARKER: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Sphinx HTML, links become `:ref:` roles
    Sphinx,
    Docx,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Sphinx, OutputFormat::Docx, OutputFormat::Pdf];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Sphinx => "sphinx",
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// Substitution file name, `_links_sphinx.rst` for the default prefix
    pub fn links_file_name(&self, link_prefix: &str) -> String {
        format!("{}{}.rst", link_prefix, self.name())
    }

    /// Replacement directive binding `|id|` to the target
    pub fn substitution(&self, target: &Target, base_name: &str) -> String {
        match self {
            OutputFormat::Sphinx => format!(
                ".. |{id}| replace:: :ref:`{label}<{id}>`\n",
                id = target.id,
                label = target.label
            ),
            OutputFormat::Docx | OutputFormat::Pdf => format!(
                ".. |{id}| replace:: `{label} <{base}.{ext}#{id}>`_\n",
                id = target.id,
                label = target.label,
                base = base_name,
                ext = self.name()
            ),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sphinx" | "html" => Ok(OutputFormat::Sphinx),
            "docx" => Ok(OutputFormat::Docx),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(format!(
                "unknown output format '{}' (expected sphinx, docx or pdf)",
                other
            )),
        }
    }
}

/// Rendered contents of one folder's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFolder {
    pub links: Vec<(OutputFormat, String)>,
    pub tags: String,
    pub targets: usize,
    pub links_seen: usize,
    pub unresolved: usize,
}

/// What [`emit`] wrote for a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    pub folder: PathBuf,
    pub files: Vec<PathBuf>,
    pub targets: usize,
    pub links: usize,
    pub unresolved: usize,
}

struct Streams<'a> {
    formats: &'a [OutputFormat],
    entries: Vec<Vec<String>>,
}

impl<'a> Streams<'a> {
    fn new(formats: &'a [OutputFormat]) -> Self {
        Self {
            formats,
            entries: vec![Vec::new(); formats.len()],
        }
    }

    fn push_all(&mut self, entry: &str) {
        for stream in &mut self.entries {
            stream.push(entry.to_string());
        }
    }

    fn push_target(&mut self, target: &Target, base_name: &str) {
        for (format, stream) in self.formats.iter().zip(&mut self.entries) {
            stream.push(format.substitution(target, base_name));
        }
    }

    fn finish(self) -> Vec<(OutputFormat, String)> {
        self.formats
            .iter()
            .copied()
            .zip(self.entries.into_iter().map(|e| e.join("\n")))
            .collect()
    }
}

/// Render the substitution streams and tag rows of a folder without
/// touching the file system. Documents and targets keep their scan order.
pub fn render(scope: &FolderScope, formats: &[OutputFormat]) -> RenderedFolder {
    let mut streams = Streams::new(formats);
    let mut tags = Vec::new();
    let mut unresolved = 0;
    let up = "../".repeat(scope.depth());

    for document in &scope.documents {
        let doc_path = to_slash(&document.path);
        streams.push_all(&format!("\n.. .. {}\n\n", doc_path));

        let mut links = document.links.iter().peekable();
        for target in &document.targets {
            unresolved += flush_links(&mut links, Some(target.line), scope, &mut streams);
            streams.push_target(target, &document.base_name);
            tags.push(tag_row(target, &up, &doc_path));
        }
        unresolved += flush_links(&mut links, None, scope, &mut streams);
    }

    RenderedFolder {
        links: streams.finish(),
        tags: tags.join("\n"),
        targets: scope.target_count(),
        links_seen: scope.link_count(),
        unresolved,
    }
}

/// Record the links up to and including line `until` (all remaining links
/// for `None`) as one comment. Returns the number of unresolved ids.
fn flush_links<'a, I>(
    links: &mut Peekable<I>,
    until: Option<usize>,
    scope: &FolderScope,
    streams: &mut Streams<'_>,
) -> usize
where
    I: Iterator<Item = &'a LinkRef>,
{
    let mut ids = Vec::new();
    let mut unresolved = 0;
    while let Some(link) = links.next_if(|l| until.map_or(true, |line| l.line <= line)) {
        if scope.resolves(&link.id) {
            ids.push(link.id.clone());
        } else {
            unresolved += 1;
            ids.push(format!("{}{}", UNRESOLVED_MARKER, link.id));
        }
    }
    if !ids.is_empty() {
        streams.push_all(&format!(".. .. {}\n\n", ids.join(",")));
    }
    unresolved
}

/// `id<TAB>path<TAB>pattern;"<TAB>line:n`, line numbers counted from 1
fn tag_row(target: &Target, up: &str, doc_path: &str) -> String {
    format!(
        "{id}\t{up}{path}\t/^\\.\\. _`\\?{id}`\\?:/;\"\tline:{line}",
        id = target.id,
        up = up,
        path = doc_path,
        line = target.line + 1
    )
}

/// Write the substitution files and the tag file of a folder below `root`.
///
/// Files are written even when the folder has no targets so that includes of
/// them always resolve.
pub fn emit(
    root: &Path,
    scope: &FolderScope,
    formats: &[OutputFormat],
    link_prefix: &str,
) -> Result<EmitSummary> {
    let rendered = render(scope, formats);
    let directory = root.join(&scope.folder);
    std::fs::create_dir_all(&directory)
        .map_err(|e| BuildError::write_failure(&directory, e))?;

    let mut files = Vec::new();
    for (format, content) in &rendered.links {
        let path = directory.join(format.links_file_name(link_prefix));
        std::fs::write(&path, content).map_err(|e| BuildError::write_failure(&path, e))?;
        files.push(path);
    }

    let tags_path = directory.join(TAGS_FILE_NAME);
    std::fs::write(&tags_path, rendered.tags.as_bytes())
        .map_err(|e| BuildError::write_failure(&tags_path, e))?;
    files.push(tags_path);

    log::info!(
        "Wrote {} files for '{}' ({} targets, {} unresolved links)",
        files.len(),
        scope.folder.display(),
        rendered.targets,
        rendered.unresolved
    );

    Ok(EmitSummary {
        folder: scope.folder.clone(),
        files,
        targets: rendered.targets,
        links: rendered.links_seen,
        unresolved: rendered.unresolved,
    })
}
