//! Line-oriented document reader with a per-session cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BuildError, Result};

/// Lines of a document, without line terminators
pub type Lines = Arc<Vec<String>>;

/// Memoizes document contents by path for the lifetime of a scan session.
///
/// The cache has no invalidation; the file system is assumed stable during a
/// run. Call [`DocumentCache::clear`] between independent runs.
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: HashMap<PathBuf, Lines>,
    hits: usize,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` as lines. Repeated reads return the same shared vector.
    pub fn read(&mut self, path: &Path) -> Result<Lines> {
        if let Some(lines) = self.documents.get(path) {
            self.hits += 1;
            return Ok(Arc::clone(lines));
        }

        let bytes = std::fs::read(path).map_err(|_| BuildError::NotFound {
            path: path.to_path_buf(),
        })?;
        let lines: Lines = Arc::new(split_lines(&String::from_utf8_lossy(&bytes)));
        log::debug!("Read {} ({} lines)", path.display(), lines.len());

        self.documents.insert(path.to_path_buf(), Arc::clone(&lines));
        Ok(lines)
    }

    pub fn hit_count(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.hits = 0;
    }
}

/// Split text into lines, dropping `\n` and `\r\n` terminators
pub fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}
