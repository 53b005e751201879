use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::{DirEntry, WalkDir};

use crate::config::BuildConfig;
use crate::emitter::{self, EmitSummary};
use crate::folder::{self, FolderScope};
use crate::generate::{TransformRegistry, MANIFEST_FILE_NAME};
use crate::session::ScanSession;

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub folders: usize,
    pub documents: usize,
    pub targets: usize,
    pub links: usize,
    pub unresolved_links: usize,
    pub generated_files: usize,
    pub skipped_generations: usize,
    pub build_time: Duration,
    pub cache_hits: usize,
}

/// Runs generation manifests, scans a tree and writes the link files of
/// every folder.
pub struct LinkBuilder {
    config: BuildConfig,
    session: ScanSession,
    registry: TransformRegistry,
}

impl LinkBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let session = ScanSession::new(config.clone());
        Self {
            config,
            session,
            registry: TransformRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Scan `root` without writing anything
    pub fn scan(&mut self, root: &Path) -> IndexMap<PathBuf, FolderScope> {
        self.session.reset();
        folder::scan(&mut self.session, root)
    }

    pub fn build(&mut self, root: &Path) -> Result<BuildStats> {
        let start_time = Instant::now();
        info!("Building links under {}", root.display());

        if !root.is_dir() {
            anyhow::bail!("Scan root is not a directory: {}", root.display());
        }

        let mut stats = BuildStats::default();

        if self.config.run_generators {
            self.run_generators(root, &mut stats)?;
        } else {
            debug!("Generation manifests disabled");
        }

        let folders = self.scan(root);
        info!("Scanned {} folders", folders.len());

        for scope in folders.values() {
            let summary = emitter::emit(root, scope, &self.config.formats, &self.config.link_prefix)
                .with_context(|| {
                    format!(
                        "Failed to write link files for folder '{}'",
                        scope.folder.display()
                    )
                })?;
            stats.record(scope, &summary);
        }

        stats.folders = folders.len();
        stats.cache_hits = self.session.documents.hit_count();
        stats.build_time = start_time.elapsed();

        if stats.unresolved_links > 0 {
            warn!("{} link references do not resolve", stats.unresolved_links);
        }
        info!("Build completed in {:?}", stats.build_time);
        Ok(stats)
    }

    fn run_generators(&self, root: &Path, stats: &mut BuildStats) -> Result<()> {
        let manifests = discover_manifests(root);
        debug!("Found {} generation manifests", manifests.len());

        for manifest in manifests {
            let folder = manifest.parent().unwrap_or(root);
            let report = self
                .registry
                .run_manifest(folder)
                .with_context(|| format!("Failed to run manifest: {}", manifest.display()))?;
            stats.generated_files += report.generated.len();
            stats.skipped_generations += report.skipped.len();
        }
        Ok(())
    }
}

impl BuildStats {
    fn record(&mut self, scope: &FolderScope, summary: &EmitSummary) {
        self.documents += scope.documents.len();
        self.targets += summary.targets;
        self.links += summary.links;
        self.unresolved_links += summary.unresolved;
    }
}

/// Manifest files below `root`, hidden directories excluded
fn discover_manifests(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME)
        .map(|entry| entry.into_path())
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
