//! Staging and cleanup of the local working tree.
//!
//! [`stage`] copies the source object into the working directory; every later
//! step mutates only that copy. [`cleanup_success`] is the one place the
//! source is removed, and [`cleanup_failure`] purges whatever the run left in
//! the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use dp_core::{Error, Job, Result};

/// Copy `<source_dir>/<refid>` to `<tmp_dir>/<refid>`.
///
/// The working directory is created when missing.
///
/// # Errors
///
/// [`Error::Precondition`] if the source does not exist or the staged
/// directory is already present, I/O errors while copying.
pub fn stage(job: &Job) -> Result<PathBuf> {
    let source = job.source_path();
    let staged = job.bag_dir();

    if !source.is_dir() {
        return Err(Error::Precondition(format!(
            "source directory {} does not exist",
            source.display()
        )));
    }
    if staged.exists() {
        return Err(Error::Precondition(format!(
            "staging directory {} already exists",
            staged.display()
        )));
    }
    fs::create_dir_all(job.tmp_dir()).map_err(|e| Error::file(job.tmp_dir(), e))?;

    copy_tree(&source, &staged)?;
    tracing::debug!("Staged {} -> {}", source.display(), staged.display());
    Ok(staged)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| Error::Precondition(format!("cannot read {}: {e}", from.display())))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|_| Error::Internal(format!("{} escaped the source", entry.path().display())))?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::file(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::file(entry.path(), e))?;
        }
    }
    Ok(())
}

/// Remove the source object after the package was delivered.
pub fn cleanup_success(job: &Job) -> Result<()> {
    let source = job.source_path();
    fs::remove_dir_all(&source).map_err(|e| Error::file(&source, e))?;
    tracing::debug!("Removed source {}", source.display());
    Ok(())
}

/// Remove the staged directory and partial archive, if present.
///
/// The source is never touched.
pub fn cleanup_failure(job: &Job) -> Result<()> {
    let staged = job.bag_dir();
    if staged.exists() {
        fs::remove_dir_all(&staged).map_err(|e| Error::file(&staged, e))?;
    }
    let archive = job.archive_path();
    match fs::remove_file(&archive) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::file(&archive, e)),
    }
    tracing::debug!("Removed working files for {}", job.refid());
    Ok(())
}
