//! Inclusion graph discovery.
//!
//! Starting from a document, follows `.. include::` directives and toctree
//! listings (and optionally image/figure directives) to list every file the
//! document depends on. Missing files are reported by name but never
//! followed, so a half-generated tree can still be scanned.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::document::DocumentCache;
use crate::utils::{normalize_path, relative_to, to_slash, with_suffix};

lazy_static! {
    /// Path argument of `.. image::`, `.. figure::` or `.. |sub| image::`
    static ref IMAGE_REGEX: Regex =
        Regex::new(r"(?:image|figure):: ((?:\.|/|\\|\w).*)").unwrap();
}

const TOCTREE_MARKER: &str = ".. toctree::";
const INCLUDE_DIRECTIVE: &str = "include:: ";

/// One discovery result, handed out as an independent cursor over a shared,
/// already materialized list. Cloning the cursor clones only the position.
#[derive(Debug, Clone)]
pub struct Inclusions {
    paths: Arc<[PathBuf]>,
    position: usize,
}

impl Inclusions {
    fn new(paths: Arc<[PathBuf]>) -> Self {
        Self { paths, position: 0 }
    }
}

impl Iterator for Inclusions {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.paths.get(self.position)?.clone();
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paths.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Inclusions {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiscoveryKey {
    path: PathBuf,
    search_roots: Vec<PathBuf>,
    include_images: bool,
}

/// What a single document line contributes to the inclusion graph
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    /// Followed recursively
    Document(String),
    /// Listed but never followed
    Leaf(String),
}

/// Memoizing inclusion walker. Results are cached per
/// `(path, search_roots, include_images)` until [`InclusionWalker::clear`].
#[derive(Debug)]
pub struct InclusionWalker {
    link_prefix: String,
    template_suffix: String,
    cache: HashMap<DiscoveryKey, Arc<[PathBuf]>>,
}

impl InclusionWalker {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            link_prefix: config.link_prefix.clone(),
            template_suffix: config.template_suffix.clone(),
            cache: HashMap::new(),
        }
    }

    /// List `path` followed by every file it transitively references.
    ///
    /// Names are yielded as written in the documents; `search_roots` are only
    /// used to locate files for reading.
    pub fn discover(
        &mut self,
        documents: &mut DocumentCache,
        path: &Path,
        search_roots: &[PathBuf],
        include_images: bool,
    ) -> Inclusions {
        let mut stack = Vec::new();
        let (paths, _) = self.discover_inner(documents, path, search_roots, include_images, &mut stack);
        Inclusions::new(paths)
    }

    /// Returns the discovered list and whether it was cut short by the cycle
    /// guard. Cut-short lists are not cached.
    fn discover_inner(
        &mut self,
        documents: &mut DocumentCache,
        path: &Path,
        search_roots: &[PathBuf],
        include_images: bool,
        stack: &mut Vec<PathBuf>,
    ) -> (Arc<[PathBuf]>, bool) {
        let key = DiscoveryKey {
            path: path.to_path_buf(),
            search_roots: search_roots.to_vec(),
            include_images,
        };
        if let Some(cached) = self.cache.get(&key) {
            return (Arc::clone(cached), false);
        }

        let mut found = vec![path.to_path_buf()];
        let mut truncated = false;

        let resolved = self
            .locate(path, search_roots)
            .unwrap_or_else(|| path.to_path_buf());

        if stack.contains(&resolved) {
            log::debug!("Include cycle through {}", path.display());
            return (found.into(), true);
        }

        let lines = match documents.read(&resolved) {
            Ok(lines) => lines,
            Err(_) => {
                log::debug!("Not following missing file {}", resolved.display());
                let paths: Arc<[PathBuf]> = found.into();
                self.cache.insert(key, Arc::clone(&paths));
                return (paths, false);
            }
        };

        stack.push(resolved);
        for reference in self.references(&lines, search_roots, include_images) {
            match reference {
                Reference::Document(name) => {
                    let (nested, cut) = self.discover_inner(
                        documents,
                        Path::new(&name),
                        search_roots,
                        include_images,
                        stack,
                    );
                    truncated |= cut;
                    found.extend(nested.iter().cloned());
                }
                Reference::Leaf(name) => found.push(PathBuf::from(name)),
            }
        }
        stack.pop();

        let paths: Arc<[PathBuf]> = found.into();
        if !truncated {
            self.cache.insert(key, Arc::clone(&paths));
        }
        (paths, truncated)
    }

    /// Scan the lines of one document for include, toctree and image references
    fn references(
        &self,
        lines: &[String],
        search_roots: &[PathBuf],
        include_images: bool,
    ) -> Vec<Reference> {
        let mut references = Vec::new();
        let mut in_toctree = false;

        for line in lines {
            if in_toctree {
                if line.starts_with(' ') || line.starts_with('\t') {
                    if let Some(entry) = toctree_entry(line) {
                        if entry.ends_with(".rest")
                            && self.locate(Path::new(entry), search_roots).is_some()
                        {
                            references.push(Reference::Document(entry.to_string()));
                        }
                    }
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                in_toctree = false;
            }

            if line.starts_with(TOCTREE_MARKER) {
                in_toctree = true;
                continue;
            }

            let Some(directive) = line.strip_prefix(".. ") else {
                continue;
            };
            if let Some(target) = directive.strip_prefix(INCLUDE_DIRECTIVE) {
                let target = target.trim();
                if target.is_empty() {
                    log::debug!("Skipping include directive without a target: {}", line);
                } else if !target.starts_with(&self.link_prefix) {
                    references.push(Reference::Document(target.to_string()));
                }
            } else if directive.contains(INCLUDE_DIRECTIVE) {
                // substitution includes (`.. |x| include:: y`) are not followed
            } else if include_images {
                if let Some(captures) = IMAGE_REGEX.captures(directive) {
                    references.push(Reference::Leaf(captures[1].trim().to_string()));
                }
            }
        }

        references
    }

    /// Find `name` under one of the search roots, trying the template suffix
    /// as a second choice for every root.
    pub fn locate(&self, name: &Path, search_roots: &[PathBuf]) -> Option<PathBuf> {
        for root in search_roots {
            let candidate = normalize_path(&root.join(name));
            if candidate.exists() {
                return Some(candidate);
            }
            let template = with_suffix(&candidate, &self.template_suffix);
            if template.exists() {
                return Some(template);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

/// Path of a toctree entry line, `None` for options and blank lines.
/// Entries of the form `Title <path>` yield the path.
fn toctree_entry(line: &str) -> Option<&str> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with(':') {
        return None;
    }
    if let (Some(open), true) = (entry.rfind('<'), entry.ends_with('>')) {
        return Some(entry[open + 1..entry.len() - 1].trim());
    }
    Some(entry)
}

/// Walk `directory` and return, per primary document, the document followed
/// by everything it includes, joined onto the document's directory.
///
/// Paths containing one of `config.exclude_substrings` are dropped. Files of a
/// directory come before its subdirectories, both in name order; hidden
/// subdirectories are skipped.
pub fn discover_under(
    walker: &mut InclusionWalker,
    documents: &mut DocumentCache,
    directory: &Path,
    config: &BuildConfig,
) -> Vec<Vec<PathBuf>> {
    let mut result = Vec::new();

    let entries = WalkDir::new(directory)
        .sort_by(|a, b| {
            let a_key = (a.file_type().is_dir(), a.file_name());
            let b_key = (b.file_type().is_dir(), b.file_name());
            a_key.cmp(&b_key)
        })
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|e| e.ok());

    for entry in entries {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !config.is_primary_document(&file_name) {
            continue;
        }
        let parent = entry.path().parent().unwrap_or(directory).to_path_buf();
        let primary = normalize_path(entry.path());
        if is_excluded_under(config, &primary, directory) {
            log::debug!("Excluded {}", primary.display());
            continue;
        }

        let mut paths = Vec::new();
        let roots = [parent.clone()];
        for included in walker.discover(documents, Path::new(&file_name), &roots, false) {
            if config.is_excluded(&included.to_string_lossy()) {
                continue;
            }
            let joined = normalize_path(&parent.join(&included));
            if is_excluded_under(config, &joined, directory) {
                continue;
            }
            paths.push(joined);
        }
        result.push(paths);
    }

    result
}

/// Exclusion is decided on the path below the scan root, never on the root itself
fn is_excluded_under(config: &BuildConfig, path: &Path, directory: &Path) -> bool {
    config.is_excluded(&to_slash(&relative_to(path, directory)))
}
