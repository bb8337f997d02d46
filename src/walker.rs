//! Tree walker
//!
//! Feeds a single file, or every eligible file below a directory, to the
//! [`FileProcessor`]. Symlinks are only followed when configured; when they
//! are, walkdir's loop detection turns a cyclic link into a logged
//! traversal error instead of an endless walk.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use crate::classify::eligible_extension;
use crate::config::RunConfig;
use crate::error::{Result, VolumeError};
use crate::processor::FileProcessor;
use crate::report::{BatchResult, ProcessingOutcome};
use crate::staging::StagingArea;

/// Progress notifications for the caller's status output.
#[derive(Debug)]
pub enum WalkEvent<'a> {
    Started(&'a Path),
    Finished(&'a ProcessingOutcome),
}

pub struct TreeWalker<'a> {
    processor: FileProcessor<'a>,
    config: &'a RunConfig,
    staging: &'a StagingArea,
}

impl<'a> TreeWalker<'a> {
    pub fn new(processor: FileProcessor<'a>, config: &'a RunConfig, staging: &'a StagingArea) -> Self {
        Self {
            processor,
            config,
            staging,
        }
    }

    /// Process `root` and everything eligible below it.
    ///
    /// Only an unusable root is an error; per-file failures end up in the
    /// returned [`BatchResult`].
    pub fn run(&self, root: &Path) -> Result<BatchResult> {
        self.run_with(root, |_| {})
    }

    /// Like [`run`](Self::run), reporting progress to `on_event`.
    pub fn run_with<F>(&self, root: &Path, mut on_event: F) -> Result<BatchResult>
    where
        F: FnMut(WalkEvent<'_>),
    {
        let metadata = fs::metadata(root).map_err(|e| VolumeError::InvalidInput {
            reason: format!("cannot access {}: {}", root.display(), e),
        })?;

        let files = if metadata.is_dir() {
            self.collect(root)
        } else {
            vec![root.to_path_buf()]
        };
        info!("{} file(s) to process under {}", files.len(), root.display());

        let mut batch = BatchResult::new(root);
        for path in files {
            on_event(WalkEvent::Started(&path));
            let outcome = self.processor.process(&path);
            on_event(WalkEvent::Finished(&outcome));
            batch.record(outcome);
        }

        Ok(batch.finish())
    }

    /// Eligible files below `root`, in file-name order.
    pub fn collect(&self, root: &Path) -> Vec<PathBuf> {
        let staging_dir = self.staging.path();
        WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && is_staging_dir(entry.path(), staging_dir))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| eligible_extension(entry.path(), &self.config.extensions).is_some())
            .map(|entry| entry.into_path())
            .collect()
    }
}

fn is_staging_dir(path: &Path, staging_dir: &Path) -> bool {
    if path.starts_with(staging_dir) {
        return true;
    }
    // Walk paths keep the root's spelling; the staging path is canonical.
    match fs::canonicalize(path) {
        Ok(canonical) => canonical == staging_dir,
        Err(_) => false,
    }
}
