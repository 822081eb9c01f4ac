use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::{CopyOutcome, SkipReason};

/// What to take out of a snapshot directory.
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    /// A single entry of the snapshot directory, by name.
    pub file: Option<&'a str>,
    /// Copy the directory contents when no file is named.
    pub recursive: bool,
    pub dry_run: bool,
}

/// Copies from `source` into the `destination` directory, creating it as needed.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn restore_into(source: &Path, destination: &Path, request: CopyRequest<'_>) -> Result<CopyOutcome> {
    if !source.exists() {
        warn!(path = %source.display(), "Snapshot path does not exist, nothing copied.");
        return Ok(CopyOutcome::NotFound {
            path: source.to_path_buf(),
        });
    }

    if source.is_file() {
        return restore_single_file(source, destination, request);
    }

    if let Some(name) = request.file {
        let Some(entry) = find_entry(source, name)? else {
            warn!(%name, "Requested file is not in the snapshot directory.");
            return Ok(CopyOutcome::Skipped(SkipReason::FileNotInSnapshot {
                name: name.to_string(),
            }));
        };
        if request.dry_run {
            info!(entry = %entry.display(), "Dry run, would copy entry.");
            return Ok(CopyOutcome::Skipped(SkipReason::DryRun));
        }
        fs::create_dir_all(destination)?;
        let target = destination.join(entry.file_name().unwrap_or(OsStr::new(name)));
        let (files, bytes) = if entry.is_dir() {
            copy_tree(&entry, &target)?
        } else {
            debug!(from = %entry.display(), to = %target.display(), "Copying file.");
            (1, fs::copy(&entry, &target)?)
        };
        info!(files, bytes, "Restored requested entry.");
        return Ok(CopyOutcome::Copied { files, bytes });
    }

    if !request.recursive {
        warn!(path = %source.display(), "No file named and recursive copy is off, items cannot be copied.");
        return Ok(CopyOutcome::Skipped(SkipReason::RecursiveNotRequested));
    }
    if request.dry_run {
        info!("Dry run, would copy directory tree.");
        return Ok(CopyOutcome::Skipped(SkipReason::DryRun));
    }

    fs::create_dir_all(destination)?;
    let (files, bytes) = copy_tree(source, destination)?;
    info!(files, bytes, "Restored directory tree.");
    Ok(CopyOutcome::Copied { files, bytes })
}

/// The snapshot path names a file. It is copied whether or not recursion is
/// on; a requested name must match it, ignoring ASCII case.
fn restore_single_file(source: &Path, destination: &Path, request: CopyRequest<'_>) -> Result<CopyOutcome> {
    let Some(file_name) = source.file_name() else {
        return Err(Error::Custom(format!("Snapshot path has no file name: {}", source.display())));
    };
    if let Some(name) = request.file {
        if !file_name.to_string_lossy().eq_ignore_ascii_case(name) {
            warn!(%name, path = %source.display(), "Snapshot path is a different file than the one requested.");
            return Ok(CopyOutcome::Skipped(SkipReason::FileNotInSnapshot {
                name: name.to_string(),
            }));
        }
    }
    if request.dry_run {
        info!(entry = %source.display(), "Dry run, would copy file.");
        return Ok(CopyOutcome::Skipped(SkipReason::DryRun));
    }

    fs::create_dir_all(destination)?;
    let target = destination.join(file_name);
    debug!(from = %source.display(), to = %target.display(), "Copying file.");
    let bytes = fs::copy(source, &target)?;
    info!(bytes, "Restored snapshot file.");
    Ok(CopyOutcome::Copied { files: 1, bytes })
}

/// Looks `name` up among the direct entries of `dir`; exact match first, then ignoring ASCII case.
fn find_entry(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let mut folded = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name == name {
            return Ok(Some(entry.path()));
        }
        if folded.is_none() && file_name.eq_ignore_ascii_case(name) {
            folded = Some(entry.path());
        }
    }
    Ok(folded)
}

fn copy_tree(from: &Path, to: &Path) -> Result<(usize, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    fs::create_dir_all(to)?;

    for entry_result in WalkDir::new(from).min_depth(1) {
        let entry = entry_result?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::Custom(format!("Unexpected path outside the copy root: {}", e)))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!(from = %entry.path().display(), to = %target.display(), "Copying file.");
            bytes += fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok((files, bytes))
}
