//! The fingerprint index.
//!
//! An index maps each surviving fingerprint to the one path holding that
//! content. On disk it is newline-delimited `path, fingerprint` text, which
//! other tools (and people) can grep. The file is always rewritten whole,
//! through a temporary file and a rename, so a reader never sees a
//! half-written index.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::scanner::Fingerprint;

/// Separator between path and fingerprint on an index line.
pub const FIELD_SEPARATOR: &str = ", ";

/// Errors while reading or writing an index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The index file could not be read or written.
    #[error("Index file {path}: {source}")]
    Io {
        /// The index file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A line without the `path, fingerprint` shape.
    #[error("Index line {line}: expected 'path, fingerprint', found {content:?}")]
    Malformed {
        /// One-based line number
        line: usize,
        /// The offending line
        content: String,
    },

    /// A line whose fingerprint is not valid hex of the right length.
    #[error("Index line {line}: invalid fingerprint {value:?}")]
    BadFingerprint {
        /// One-based line number
        line: usize,
        /// The offending value
        value: String,
    },

    /// A path that cannot be written as one index line.
    #[error("Path cannot be stored in an index: {0:?}")]
    UnrepresentablePath(PathBuf),
}

/// One `path, fingerprint` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Where the content lives
    pub path: PathBuf,
    /// Content fingerprint
    pub fingerprint: Fingerprint,
}

impl IndexRecord {
    /// Create a record.
    #[must_use]
    pub fn new(path: PathBuf, fingerprint: Fingerprint) -> Self {
        Self { path, fingerprint }
    }
}

/// Fingerprint to path mapping, at most one path per fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: HashMap<Fingerprint, PathBuf>,
}

impl Index {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` for `fingerprint` unless one is already recorded.
    ///
    /// Returns `false` (and keeps the existing path) for a repeat.
    pub fn insert(&mut self, fingerprint: Fingerprint, path: PathBuf) -> bool {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(path);
                true
            }
        }
    }

    /// Path recorded for `fingerprint`.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Path> {
        self.entries.get(fingerprint).map(PathBuf::as_path)
    }

    /// Whether `fingerprint` is recorded.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(fingerprint, path)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &Path)> {
        self.entries.iter().map(|(f, p)| (f, p.as_path()))
    }

    /// Records sorted by path, the order they are written in.
    #[must_use]
    pub fn records(&self) -> Vec<IndexRecord> {
        let mut records: Vec<IndexRecord> = self
            .entries
            .iter()
            .map(|(f, p)| IndexRecord::new(p.clone(), *f))
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Build an index from records; the first record of a fingerprint wins.
    #[must_use]
    pub fn from_records<I: IntoIterator<Item = IndexRecord>>(records: I) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record.fingerprint, record.path);
        }
        index
    }

    /// Serialize to `writer`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Path`] for a path that is not valid UTF-8 or
    /// contains a line break, and I/O errors from the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        for record in self.records() {
            let Some(path) = storable(&record.path) else {
                return Err(WriteError::Path(record.path));
            };
            writeln!(writer, "{}{}{}", path, FIELD_SEPARATOR, record.fingerprint)?;
        }
        Ok(())
    }

    /// Write to `path` through a temporary sibling and an atomic rename.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), IndexError> {
        let tmp = temporary_path(path);

        let result = (|| -> Result<(), WriteError> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.write_to(&mut writer)?;
            writer
                .into_inner()
                .map_err(io::IntoInnerError::into_error)?
                .sync_all()?;
            std::fs::rename(&tmp, path)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                log::info!("Wrote index of {} entries to {}", self.len(), path.display());
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(match e {
                    WriteError::Io(source) => IndexError::Io {
                        path: path.to_path_buf(),
                        source,
                    },
                    WriteError::Path(p) => IndexError::UnrepresentablePath(p),
                })
            }
        }
    }

    /// Read an index file; repeated fingerprints keep their first path.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the file cannot be read or a line is malformed.
    pub fn read(path: &Path) -> Result<Self, IndexError> {
        Ok(Self::from_records(read_records(path)?))
    }
}

/// Failure inside [`Index::write_to`].
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// Writer failure
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A path that would break the line format
    #[error("Path cannot be stored in an index: {0:?}")]
    Path(PathBuf),
}

/// Parse one index line (without its line break).
///
/// The line is split on the last separator, so a path that itself contains
/// `", "` still parses.
///
/// # Errors
///
/// Returns [`IndexError::Malformed`] or [`IndexError::BadFingerprint`].
pub fn parse_line(line: &str, number: usize) -> Result<IndexRecord, IndexError> {
    let (path, hex) = line
        .rsplit_once(FIELD_SEPARATOR)
        .filter(|(path, _)| !path.is_empty())
        .ok_or_else(|| IndexError::Malformed {
            line: number,
            content: line.to_string(),
        })?;

    let fingerprint = Fingerprint::from_hex(hex).map_err(|_| IndexError::BadFingerprint {
        line: number,
        value: hex.to_string(),
    })?;

    Ok(IndexRecord::new(PathBuf::from(path), fingerprint))
}

/// Parse index records from `reader`, in file order, blank lines skipped.
///
/// `source` names the input in I/O errors.
///
/// # Errors
///
/// Returns [`IndexError`] for I/O failures and malformed lines.
pub fn parse_records<R: BufRead>(reader: R, source: &Path) -> Result<Vec<IndexRecord>, IndexError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IndexError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(line, i + 1)?);
    }
    Ok(records)
}

/// Read every record of an index file in file order.
///
/// # Errors
///
/// Returns [`IndexError`] if the file cannot be read or a line is malformed.
pub fn read_records(path: &Path) -> Result<Vec<IndexRecord>, IndexError> {
    let file = File::open(path).map_err(|e| IndexError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_records(BufReader::new(file), path)
}

/// Whether `path` reads back unchanged from an index line.
#[must_use]
pub fn is_storable(path: &Path) -> bool {
    storable(path).is_some()
}

fn storable(path: &Path) -> Option<&str> {
    path.to_str().filter(|p| !p.contains(['\n', '\r']))
}

/// Sibling path used while writing `path`.
#[must_use]
pub fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("index"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}
