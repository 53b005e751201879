//! State shared by one scan: the document cache, the inclusion cache and the
//! per-group label counters.

use crate::config::BuildConfig;
use crate::document::DocumentCache;
use crate::extract::GroupCounters;
use crate::inclusion::InclusionWalker;

/// Owns every cache used while scanning a tree.
///
/// Nothing here is invalidated automatically. A long-lived process must call
/// [`ScanSession::reset`] between independent runs, otherwise documents and
/// label numbers from the previous run are reused.
#[derive(Debug)]
pub struct ScanSession {
    config: BuildConfig,
    pub documents: DocumentCache,
    pub walker: InclusionWalker,
    pub counters: GroupCounters,
}

impl ScanSession {
    pub fn new(config: BuildConfig) -> Self {
        let walker = InclusionWalker::new(&config);
        Self {
            config,
            documents: DocumentCache::new(),
            walker,
            counters: GroupCounters::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Drop all cached documents, inclusion lists and counters
    pub fn reset(&mut self) {
        log::debug!(
            "Resetting scan session ({} documents, {} inclusion lists, {} counter groups)",
            self.documents.len(),
            self.walker.cached_entries(),
            self.counters.len()
        );
        self.documents.clear();
        self.walker.clear();
        self.counters.clear();
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}
