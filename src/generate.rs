//! Generation manifests.
//!
//! A folder may contain a `gen` file listing text generation tasks, one per
//! line:
//!
//! ```text
//! # source | target | transform | options
//! dd_code.py | _dd_code.rst | prefixed | { prefix = "#@" }
//! ```
//!
//! Transforms are looked up by name in a fixed [`TransformRegistry`]. Nothing
//! found inside the scanned files is ever executed.

use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::document::split_lines;
use crate::error::{BuildError, Result};

/// File name of a folder's generation manifest
pub const MANIFEST_FILE_NAME: &str = "gen";

/// A transform turns the lines of a source file into the lines of a target
pub type TransformFn = fn(&[String], &Table) -> Result<Vec<String>>;

/// One task of a generation manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// One-based line in the manifest
    pub line: usize,
    pub source: PathBuf,
    pub target: PathBuf,
    pub transform: String,
    pub options: Table,
}

/// Outcome of running one manifest
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub generated: Vec<PathBuf>,
    /// Entries that could not be run, with the reason
    pub skipped: Vec<(ManifestEntry, BuildError)>,
}

/// Parse manifest lines. Comments and blank lines are ignored; malformed
/// lines are logged and skipped.
pub fn parse_manifest(path: &Path, lines: &[String]) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_manifest_line(path, index + 1, line) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("{}", e),
        }
    }
    entries
}

fn parse_manifest_line(path: &Path, line: usize, text: &str) -> Result<ManifestEntry> {
    let malformed = |reason: String| BuildError::MalformedDirective {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let fields: Vec<&str> = text.split('|').map(str::trim).collect();
    let [source, target, transform, options] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 'source | target | transform | options', found {} fields",
            fields.len()
        )));
    };
    if source.is_empty() || target.is_empty() || transform.is_empty() {
        return Err(malformed("source, target and transform are required".to_string()));
    }

    let options = parse_options(options).map_err(malformed)?;
    Ok(ManifestEntry {
        line,
        source: PathBuf::from(source),
        target: PathBuf::from(target),
        transform: transform.to_string(),
        options,
    })
}

/// Parse an inline TOML table such as `{ prefix = "#@" }`. Empty means no options.
fn parse_options(text: &str) -> std::result::Result<Table, String> {
    if text.is_empty() {
        return Ok(Table::new());
    }
    let mut document: Table =
        toml::from_str(&format!("options = {}", text)).map_err(|e| e.message().to_string())?;
    match document.remove("options") {
        Some(Value::Table(table)) => Ok(table),
        _ => Err(format!("options must be an inline table, found '{}'", text)),
    }
}

/// Closed set of named transforms
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: IndexMap<String, TransformFn>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("prefixed", prefixed);
        registry.register("between", between);
        registry.register("copy", copy);
        registry
    }
}

impl TransformRegistry {
    /// Registry with the built-in transforms
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            transforms: IndexMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, transform: TransformFn) {
        self.transforms.insert(name.into(), transform);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    pub fn apply(&self, name: &str, lines: &[String], options: &Table) -> Result<Vec<String>> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| BuildError::UnknownTransform {
                name: name.to_string(),
            })?;
        transform(lines, options)
    }

    /// Run every entry of the manifest in `folder`, if there is one.
    ///
    /// An unreadable manifest is logged and yields an empty report. Entries
    /// with a missing source, an unknown transform or bad options are
    /// reported and skipped. Failing to write a target aborts the run.
    pub fn run_manifest(&self, folder: &Path) -> Result<GenerationReport> {
        let manifest = folder.join(MANIFEST_FILE_NAME);
        let mut report = GenerationReport::default();
        let content = match read_lossy(&manifest) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => {
                log::warn!("Cannot read manifest {}: {}", manifest.display(), e);
                return Ok(report);
            }
        };

        for entry in parse_manifest(&manifest, &split_lines(&content)) {
            let source = folder.join(&entry.source);
            let target = folder.join(&entry.target);

            let lines = match read_lossy(&source) {
                Ok(text) => split_lines(&text),
                Err(_) => {
                    log::warn!("{} cannot be opened", source.display());
                    report
                        .skipped
                        .push((entry, BuildError::NotFound { path: source }));
                    continue;
                }
            };

            let generated = match self.apply(&entry.transform, &lines, &entry.options) {
                Ok(generated) => generated,
                Err(e) => {
                    log::warn!("{}:{}: {}", manifest.display(), entry.line, e);
                    report.skipped.push((entry, e));
                    continue;
                }
            };

            write_lines(&target, &generated)?;
            log::debug!(
                "Generated {} from {} with '{}'",
                target.display(),
                source.display(),
                entry.transform
            );
            report.generated.push(target);
        }

        Ok(report)
    }
}

fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_lines(target: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::write_failure(parent, e))?;
    }
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    std::fs::write(target, content).map_err(|e| BuildError::write_failure(target, e))
}

fn string_option<'a>(
    transform: &str,
    options: &'a Table,
    key: &str,
    default: &'a str,
) -> Result<&'a str> {
    match options.get(key) {
        None => Ok(default),
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(other) => Err(BuildError::InvalidOption {
            transform: transform.to_string(),
            option: key.to_string(),
            reason: format!("expected a string, found {}", other.type_str()),
        }),
    }
}

/// Text after `prefix` on every line whose first non-blank text is `prefix`
fn prefixed(lines: &[String], options: &Table) -> Result<Vec<String>> {
    let prefix = string_option("prefixed", options, "prefix", "#@")?;
    Ok(lines
        .iter()
        .filter_map(|line| line.trim_start().strip_prefix(prefix))
        .map(str::to_string)
        .collect())
}

/// Lines strictly between `start` and `end` marker lines, with the leading
/// `comment` marker removed. Several blocks are concatenated.
fn between(lines: &[String], options: &Table) -> Result<Vec<String>> {
    let start = string_option("between", options, "start", "#def gen")?;
    let end = string_option("between", options, "end", start)?;
    let comment = string_option("between", options, "comment", "#")?;

    let mut result = Vec::new();
    let mut inside = false;
    for line in lines {
        let trimmed = line.trim_start();
        if !inside && trimmed.starts_with(start) {
            inside = true;
            continue;
        }
        if inside && trimmed.starts_with(end) {
            inside = false;
            continue;
        }
        if inside {
            let text = if comment.is_empty() {
                line.as_str()
            } else {
                trimmed.strip_prefix(comment).unwrap_or(line.as_str())
            };
            result.push(text.to_string());
        }
    }
    Ok(result)
}

fn copy(lines: &[String], _options: &Table) -> Result<Vec<String>> {
    Ok(lines.to_vec())
}
