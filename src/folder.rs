//! Folder aggregation.
//!
//! Every primary document and the files it includes belong to the folder of
//! the primary document. All targets of a folder are collected before any
//! link is resolved, since a link may point at a target declared further
//! down the traversal order.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::document::Lines;
use crate::error::Result;
use crate::extract::{find_links, find_targets, LinkRef, Target};
use crate::inclusion::discover_under;
use crate::session::ScanSession;
use crate::utils::{base_name, relative_to, with_suffix};

/// Links and targets of one scanned file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// Base name of the primary document the file belongs to (`dd` for `dd.rest`)
    pub base_name: String,
    /// Path relative to the scan root
    pub path: PathBuf,
    pub line_count: usize,
    pub links: Vec<LinkRef>,
    pub targets: Vec<Target>,
}

/// Everything known about one folder before its links are resolved
#[derive(Debug, Clone, Default)]
pub struct FolderScope {
    /// Folder relative to the scan root, empty for the root itself
    pub folder: PathBuf,
    /// Scanned files in traversal order
    pub documents: Vec<DocumentEntry>,
    /// Every file belonging to the folder, including unreadable ones
    pub files: BTreeSet<PathBuf>,
    /// Ids of all targets declared in the folder
    pub target_ids: HashSet<String>,
}

impl FolderScope {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Number of directory levels between the scan root and this folder
    pub fn depth(&self) -> usize {
        self.folder.components().count()
    }

    pub fn resolves(&self, id: &str) -> bool {
        self.target_ids.contains(id)
    }

    pub fn add_document(&mut self, entry: DocumentEntry) {
        self.target_ids.extend(entry.targets.iter().map(|t| t.id.clone()));
        self.documents.push(entry);
    }

    pub fn target_count(&self) -> usize {
        self.documents.iter().map(|d| d.targets.len()).sum()
    }

    pub fn link_count(&self) -> usize {
        self.documents.iter().map(|d| d.links.len()).sum()
    }
}

/// Scan every folder under `root`. Folders come in the order their first
/// primary document was found.
pub fn scan(session: &mut ScanSession, root: &Path) -> IndexMap<PathBuf, FolderScope> {
    let config = session.config().clone();
    let lists = discover_under(&mut session.walker, &mut session.documents, root, &config);

    let mut folders: IndexMap<PathBuf, FolderScope> = IndexMap::new();
    let mut base_names: HashSet<String> = HashSet::new();

    for list in lists {
        let Some(primary) = list.iter().find(|p| {
            p.file_name()
                .is_some_and(|n| config.is_primary_document(&n.to_string_lossy()))
        }) else {
            continue;
        };

        let relative_primary = relative_to(primary, root);
        let folder = relative_primary
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let file_name = relative_primary
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let base = base_name(&file_name, &config.template_suffix);
        base_names.insert(base.clone());
        let group = base_names.len();

        log::debug!("{} (group {})", relative_primary.display(), group);

        let scope = folders
            .entry(folder.clone())
            .or_insert_with(|| FolderScope::new(folder.clone()));

        for path in &list {
            let relative = relative_to(path, root);
            scope.files.insert(relative.clone());

            let lines = match read_document(session, path, &config.template_suffix) {
                Ok(lines) => lines,
                Err(e) => {
                    log::debug!("Skipping {}: {}", relative.display(), e);
                    continue;
                }
            };

            let links = find_links(&lines);
            let targets = find_targets(&lines, session.counters.group(group));
            scope.add_document(DocumentEntry {
                base_name: base.clone(),
                path: relative,
                line_count: lines.len(),
                links,
                targets,
            });
        }
    }

    for scope in folders.values() {
        log::info!(
            "Folder '{}': {} documents, {} targets, {} links",
            scope.folder.display(),
            scope.documents.len(),
            scope.target_count(),
            scope.link_count()
        );
    }

    folders
}

/// Read a scanned file, falling back to its template source
fn read_document(session: &mut ScanSession, path: &Path, template_suffix: &str) -> Result<Lines> {
    match session.documents.read(path) {
        Ok(lines) => Ok(lines),
        Err(e) if template_suffix.is_empty() => Err(e),
        Err(e) => session
            .documents
            .read(&with_suffix(path, template_suffix))
            .map_err(|_| e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_groups_by_folder() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "doc/ra.rest",
            ".. _`ra`:\n\nRisk Analysis\n=============\n\nSee |dd_intro|.\n\n.. include:: _links_sphinx.rst\n",
        );
        write(
            dir.path(),
            "doc/dd.rest",
            ".. _`dd_intro`:\n\nIntro\n-----\n\n.. include:: dd_part.rst\n",
        );
        write(dir.path(), "doc/dd_part.rst", "Back to |ra|.\n");
        write(dir.path(), "other/x.rest", ".. _`x`:\n\nX\n=\n");

        let mut session = ScanSession::default();
        let folders = scan(&mut session, dir.path());

        let keys: Vec<&PathBuf> = folders.keys().collect();
        assert_eq!(keys, vec![&PathBuf::from("doc"), &PathBuf::from("other")]);

        let doc = &folders[&PathBuf::from("doc")];
        let paths: Vec<PathBuf> = doc.documents.iter().map(|d| d.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("doc/dd.rest"),
                PathBuf::from("doc/dd_part.rst"),
                PathBuf::from("doc/ra.rest"),
            ]
        );
        assert_eq!(doc.documents[1].base_name, "dd");
        assert!(doc.resolves("ra"));
        assert!(doc.resolves("dd_intro"));
        assert!(!doc.resolves("x"));
        assert_eq!(doc.depth(), 1);
        assert_eq!(doc.target_count(), 2);
        assert_eq!(doc.link_count(), 2);
    }

    #[test]
    fn test_missing_included_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tp.rest", ".. include:: _generated.rst\n\n.. _`tp`:\n\nTP\n==\n");

        let mut session = ScanSession::default();
        let folders = scan(&mut session, dir.path());

        let root = &folders[&PathBuf::new()];
        assert_eq!(root.depth(), 0);
        assert_eq!(root.documents.len(), 1);
        assert!(root.files.contains(&PathBuf::from("_generated.rst")));
        assert_eq!(root.documents[0].targets[0].label, "TP");
    }

    #[test]
    fn test_counters_restart_for_each_document_group() {
        let dir = TempDir::new().unwrap();
        let figure = ".. _`{id}`:\n\n.. figure:: a.png\n   :name:\n";
        write(
            dir.path(),
            "a.rest",
            &format!(
                "{}\n{}.. include:: a_more.rst\n",
                figure.replace("{id}", "a1"),
                figure.replace("{id}", "a2")
            ),
        );
        write(dir.path(), "a_more.rst", &figure.replace("{id}", "a3"));
        write(dir.path(), "b.rest", &figure.replace("{id}", "b1"));

        let mut session = ScanSession::default();
        let folders = scan(&mut session, dir.path());
        let labels: Vec<(String, String)> = folders[&PathBuf::new()]
            .documents
            .iter()
            .flat_map(|d| d.targets.iter().map(|t| (t.id.clone(), t.label.clone())))
            .collect();

        assert_eq!(
            labels,
            vec![
                ("a1".to_string(), "Figure 1".to_string()),
                ("a2".to_string(), "Figure 2".to_string()),
                ("a3".to_string(), "Figure 3".to_string()),
                ("b1".to_string(), "Figure 1".to_string()),
            ]
        );
    }

    #[test]
    fn test_template_primary_documents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dd.rest.stpl", ".. include:: dd_inc.rst\n");
        write(dir.path(), "dd_inc.rst.stpl", ".. _`inc`:\n\nInc\n===\n");

        let mut session = ScanSession::default();
        let folders = scan(&mut session, dir.path());
        let root = &folders[&PathBuf::new()];

        assert_eq!(root.documents[0].base_name, "dd");
        assert_eq!(root.documents[1].path, PathBuf::from("dd_inc.rst"));
        assert!(root.resolves("inc"));
    }
}
