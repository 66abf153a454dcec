//! Deterministic directory enumeration and clean-up helpers.
//!
//! Descriptor file lists must be reproducible across runs and machines, so
//! enumeration always yields `/`-separated paths relative to a base directory
//! in lexical order, independent of the order the filesystem reports entries.

use camino::{Utf8Path, Utf8PathBuf};
use log::trace;
use std::io;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised while enumerating files.
#[derive(Debug, Error)]
pub enum FilesError {
    /// The directory to enumerate does not exist or is not a directory.
    #[error("directory {path} does not exist")]
    MissingDirectory {
        /// Directory that was expected.
        path: Utf8PathBuf,
    },

    /// Traversal failed part-way through the tree.
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// Directory being walked.
        path: Utf8PathBuf,
        /// Underlying traversal error.
        #[source]
        source: walkdir::Error,
    },

    /// An entry's path is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8 {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// An entry does not live under the base directory.
    #[error("{path} is not under {base}")]
    OutsideBase {
        /// Offending path.
        path: Utf8PathBuf,
        /// Base directory paths are made relative to.
        base: Utf8PathBuf,
    },
}

/// Lists every regular file under `dir`, relative to `base`.
///
/// Paths use `/` separators regardless of platform and are sorted
/// lexically. Symlinks are not followed.
///
/// # Errors
///
/// Returns [`FilesError::MissingDirectory`] when `dir` is not a directory,
/// and traversal or encoding errors otherwise.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use relpipe_common::relative_files;
///
/// # fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let temp = tempfile::tempdir()?;
/// let base = Utf8Path::from_path(temp.path()).ok_or("non-UTF-8 temp dir")?;
/// std::fs::create_dir_all(base.join("src/b"))?;
/// std::fs::write(base.join("src/b/Two.java"), "")?;
/// std::fs::write(base.join("src/One.java"), "")?;
///
/// let files = relative_files(base, &base.join("src"))?;
/// assert_eq!(files, vec!["src/One.java", "src/b/Two.java"]);
/// # Ok(())
/// # }
/// ```
pub fn relative_files(base: &Utf8Path, dir: &Utf8Path) -> Result<Vec<String>, FilesError> {
    if !dir.is_dir() {
        return Err(FilesError::MissingDirectory {
            path: dir.to_owned(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|source| FilesError::Walk {
            path: dir.to_owned(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| FilesError::NonUtf8 {
            path: entry.path().to_string_lossy().into_owned(),
        })?;
        let relative = path
            .strip_prefix(base)
            .map_err(|_| FilesError::OutsideBase {
                path: path.to_owned(),
                base: base.to_owned(),
            })?;
        files.push(join_components(relative));
    }

    files.sort();
    trace!("found {} file(s) under {dir}", files.len());
    Ok(files)
}

/// Removes `dir` and everything below it. A missing directory is not an error.
///
/// # Errors
///
/// Returns any I/O error other than [`io::ErrorKind::NotFound`].
pub fn clear_directory(dir: &Utf8Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Removes the file at `path`. A missing file is not an error.
///
/// # Errors
///
/// Returns any I/O error other than [`io::ErrorKind::NotFound`].
pub fn remove_file_if_present(path: &Utf8Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn join_components(path: &Utf8Path) -> String {
    path.components()
        .map(|component| component.as_str())
        .collect::<Vec<_>>()
        .join("/")
}
