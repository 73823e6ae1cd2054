//! Collision-safe moves and leftover directory cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Errors while moving a file into place.
///
/// Unlike per-file read failures these abort the run: a destination that
/// rejects a move will reject the next one too.
#[derive(thiserror::Error, Debug)]
pub enum RelocateError {
    /// The destination directory could not be created.
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory being created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The rename itself failed.
    #[error("Cannot move {from} to {to}: {source}")]
    Move {
        /// Source file
        from: PathBuf,
        /// Intended destination
        to: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// First free name among `dst`, `dst.1`, `dst.2`, …
///
/// `dst` itself is returned when it is free or is `src`.
#[must_use]
pub fn available_path(src: &Path, dst: &Path) -> PathBuf {
    if src == dst || !exists(dst) {
        return dst.to_path_buf();
    }

    let mut n: u64 = 1;
    loop {
        let mut name = dst.as_os_str().to_owned();
        name.push(format!(".{n}"));
        let candidate = PathBuf::from(name);
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Move `src` to `dst` by rename, never overwriting another file.
///
/// If `dst` is taken by a different file the first free `.N` suffix is
/// used. Missing parent directories are created. Returns the final path.
///
/// # Errors
///
/// Returns [`RelocateError`] if the parent cannot be created or the rename
/// fails (for example across filesystems).
pub fn safe_move(src: &Path, dst: &Path) -> Result<PathBuf, RelocateError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| RelocateError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let target = available_path(src, dst);
    if target.as_path() == src {
        return Ok(target);
    }

    fs::rename(src, &target).map_err(|e| RelocateError::Move {
        from: src.to_path_buf(),
        to: target.clone(),
        source: e,
    })?;

    if target != dst {
        log::debug!(
            "Renamed on collision: {} -> {}",
            src.display(),
            target.display()
        );
    }
    Ok(target)
}

/// Remove every empty directory below `root`, deepest first.
///
/// `root` itself and anything under `keep` are left alone. Directories that
/// are not empty (or cannot be removed) are skipped silently. Returns the
/// number of directories removed.
pub fn remove_leftover_dirs(root: &Path, keep: &[PathBuf]) -> usize {
    let mut removed = 0;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| !keep.iter().any(|k| e.path().starts_with(k)));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_dir() {
            continue;
        }
        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                log::trace!("Removed empty directory {}", entry.path().display());
                removed += 1;
            }
            Err(e) => log::trace!("Kept directory {}: {}", entry.path().display(), e),
        }
    }

    if removed > 0 {
        log::debug!("Removed {} empty directories below {}", removed, root.display());
    }
    removed
}
