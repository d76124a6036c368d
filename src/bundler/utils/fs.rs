//! File system utilities for bundling.
//!
//! Provides file operations with automatic directory creation,
//! symlink preservation, and path-aware error handling.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{ffi::OsStr, fs::Metadata, io, path::Path};
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_dir_all(path)
            .await
            .fs_context("removing directory", path)
    } else {
        Ok(())
    }
}

/// Makes a symbolic link at `dst` pointing at `target`, creating parents.
pub async fn symlink(target: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }
    make_symlink(target, dst).fs_context("creating symlink", dst)
}

#[cfg(unix)]
fn make_symlink(target: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(windows)]
fn make_symlink(target: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, dst)
}

/// Returns whether `path` itself is a symlink (not following it).
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Returns whether `path` is a real directory (not following symlinks).
pub fn is_directory(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

/// Returns whether `path` is a regular file (not following symlinks).
pub fn is_regular_file(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

/// Returns whether any execute permission bit is set.
#[cfg(unix)]
pub fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

/// Returns whether any execute permission bit is set.
#[cfg(not(unix))]
pub fn is_executable(_metadata: &Metadata) -> bool {
    false
}

/// Returns whether a file may hold native code: executable, `.dylib` or `.so`.
pub fn is_binary_candidate(path: &Path, metadata: &Metadata) -> bool {
    if !metadata.is_file() {
        return false;
    }
    let library = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext == "dylib" || ext == "so");
    library || is_executable(metadata)
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file to", to)?;
    Ok(())
}

/// Replaces `to` with a verbatim copy of `from`, permissions included.
///
/// An existing file at `to` is removed first so the copy never writes
/// through a hard link or symlink left by an earlier copy.
pub async fn replace_file(from: &Path, to: &Path) -> Result<()> {
    if to.symlink_metadata().is_ok() {
        fs::remove_file(to)
            .await
            .fs_context("removing file", to)?;
    }
    copy_file(from, to).await
}

/// Returns whether two files have identical contents.
pub async fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let (meta_a, meta_b) = (
        fs::metadata(a).await.fs_context("reading metadata", a)?,
        fs::metadata(b).await.fs_context("reading metadata", b)?,
    );
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = fs::File::open(a).await.fs_context("opening file", a)?;
    let mut file_b = fs::File::open(b).await.fs_context("opening file", b)?;
    let mut buf_a = vec![0u8; 8192];
    let mut buf_b = vec![0u8; 8192];

    loop {
        let n = file_a.read(&mut buf_a).await.fs_context("reading file", a)?;
        if n == 0 {
            return Ok(true);
        }
        file_b
            .read_exact(&mut buf_b[..n])
            .await
            .fs_context("reading file", b)?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks as symlinks. Fails if the source path is not a
/// directory or doesn't exist.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_dir() {
        return Err(Error::GenericError(format!("{from:?} is not a Directory")));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }

    for entry in walkdir::WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        debug_assert!(entry.path().starts_with(from));
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            make_symlink(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying file to", &dest_path)?;
        }
    }

    Ok(())
}

/// Total size in bytes of a file, or of every regular file under a directory.
pub fn total_size(path: &Path) -> Result<u64> {
    let metadata = path.metadata().fs_context("reading metadata", path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let mut size = 0;
    for entry in walkdir::WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}
