//! Staging area
//!
//! Every pass writes into a process-scoped directory first. A staged file is
//! only moved over its original once the pass that produced it succeeded,
//! and the move is a rename within one filesystem, so the original is either
//! fully replaced or untouched.

use std::fs::{self, File, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

use crate::classify::AudioFile;
use crate::error::{Result, VolumeError};

/// Prefix of staging directories and commit temp files.
const STAGING_PREFIX: &str = "voladjust-";

/// Process-scoped staging directory, removed when dropped.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    wiped: bool,
}

impl StagingArea {
    /// Create a fresh staging directory under `cache_dir`.
    ///
    /// `cache_dir` is created if missing and must be writable.
    pub fn create(cache_dir: &Path) -> Result<Self> {
        let unavailable = |source: io::Error| VolumeError::CacheDirUnavailable {
            path: cache_dir.to_path_buf(),
            source,
        };

        fs::create_dir_all(cache_dir).map_err(unavailable)?;
        let dir = cache_dir.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()));
        fs::create_dir(&dir).map_err(unavailable)?;
        let dir = fs::canonicalize(&dir).map_err(unavailable)?;

        // Fails early on read-only or full filesystems.
        tempfile::tempfile_in(&dir).map_err(unavailable)?;

        debug!("Staging directory: {}", dir.display());
        Ok(Self { dir, wiped: false })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Staging location for `file`, keyed by its base name.
    pub fn staged_path(&self, file: &AudioFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    /// Whether `path` lies inside the staging directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// Atomically replace `original` with `staged`.
    ///
    /// A symlinked `original` has its target replaced and the link kept.
    /// On error `original` is left as it was.
    pub fn commit(&self, staged: &Path, original: &Path) -> Result<()> {
        let commit_error = |source: io::Error| VolumeError::CommitError {
            path: original.to_path_buf(),
            source,
        };

        let staged_len = fs::metadata(staged).map_err(commit_error)?.len();
        if staged_len == 0 {
            return Err(commit_error(io::Error::new(
                io::ErrorKind::InvalidData,
                "processed output is empty",
            )));
        }

        let target = resolve_link(original).map_err(commit_error)?;
        let permissions = fs::metadata(&target).map(|m| m.permissions()).ok();
        if let Some(permissions) = &permissions {
            if let Err(e) = fs::set_permissions(staged, permissions.clone()) {
                warn!("Could not copy permissions of {}: {}", target.display(), e);
            }
        }

        match fs::rename(staged, &target) {
            Ok(()) => return Ok(()),
            Err(e) => debug!(
                "Rename into {} failed ({}), replacing through a sibling file",
                target.display(),
                e
            ),
        }

        replace_via_sibling(staged, &target, permissions).map_err(commit_error)
    }

    /// Drop a staged file that must not be committed.
    pub fn discard(&self, staged: &Path) {
        if staged.exists() {
            if let Err(e) = fs::remove_file(staged) {
                warn!("Could not remove staged file {}: {}", staged.display(), e);
            }
        }
    }

    /// Remove the staging directory and everything in it.
    pub fn wipe(mut self) -> Result<()> {
        self.wiped = true;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.wiped {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// Follow `path` to the file it points at when it is a symlink.
fn resolve_link(path: &Path) -> io::Result<PathBuf> {
    if fs::symlink_metadata(path)?.file_type().is_symlink() {
        fs::canonicalize(path)
    } else {
        Ok(path.to_path_buf())
    }
}

/// Replace `original` with a copy of `staged` written next to it, for when
/// the two live on different filesystems.
///
/// The copy is synced and renamed within `original`'s directory, so
/// `original` is never partially written. `staged` is removed afterwards.
pub fn replace_via_sibling(
    staged: &Path,
    original: &Path,
    permissions: Option<Permissions>,
) -> io::Result<()> {
    let parent = original
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut source = File::open(staged)?;
    let mut sibling = tempfile::Builder::new()
        .prefix(&format!(".{}", STAGING_PREFIX))
        .suffix(".tmp")
        .tempfile_in(parent)?;

    io::copy(&mut source, sibling.as_file_mut())?;
    sibling.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        fs::set_permissions(sibling.path(), permissions)?;
    }

    sibling.persist(original).map_err(|e| e.error)?;
    let _ = fs::remove_file(staged);
    Ok(())
}
