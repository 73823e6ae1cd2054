//! Pre-known fingerprint sets.
//!
//! The known set is loaded once from a file of hex fingerprints and is
//! read-only for the rest of the run. It can be tens of millions of entries,
//! so besides a plain [`ExactKnownSet`] there is a [`BloomKnownSet`] that
//! answers most negative lookups from a Bloom filter and optionally confirms
//! positives against a sorted vector.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use growable_bloom_filter::GrowableBloom;
use serde::{Deserialize, Serialize};

use crate::scanner::Fingerprint;

/// Default target false-positive rate of the Bloom pre-filter.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 1e-9;

/// Membership test against fingerprints known before the run.
pub trait KnownSet: Send + Sync {
    /// Whether `fingerprint` is known.
    fn contains(&self, fingerprint: &Fingerprint) -> bool;

    /// Number of distinct fingerprints loaded.
    fn len(&self) -> usize;

    /// Whether nothing is known.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors while loading or writing a known-set file.
#[derive(thiserror::Error, Debug)]
pub enum KnownSetError {
    /// The file could not be read or written.
    #[error("Known-set file {path}: {source}")]
    Io {
        /// The file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The configured false-positive rate is outside (0, 1).
    #[error("Invalid false-positive rate {0}: must be between 0 and 1 (exclusive)")]
    InvalidFalsePositiveRate(f64),

    /// No line of the file is a fingerprint, e.g. a list of MD5 digests.
    #[error(
        "Known-set file {path}: none of its {invalid_lines} line(s) is a fingerprint \
         (expected 64 hex digits per line, as written by `hashset`)"
    )]
    NoFingerprints {
        /// The file
        path: PathBuf,
        /// Lines that failed to parse
        invalid_lines: usize,
    },
}

/// Backing store for the known set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum KnownSetBacking {
    /// Hash set of every fingerprint
    Exact,
    /// Bloom pre-filter, optionally confirmed
    #[default]
    Bloom,
}

impl std::fmt::Display for KnownSetBacking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Bloom => write!(f, "bloom"),
        }
    }
}

/// Known-set loading options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownSetConfig {
    /// Which store to build
    pub backing: KnownSetBacking,
    /// Target false-positive rate of the Bloom filter
    pub false_positive_rate: f64,
    /// Confirm Bloom positives against the exact list
    pub confirm: bool,
}

impl Default for KnownSetConfig {
    fn default() -> Self {
        Self {
            backing: KnownSetBacking::Bloom,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            confirm: true,
        }
    }
}

/// Exact known set.
#[derive(Debug, Clone, Default)]
pub struct ExactKnownSet {
    fingerprints: HashSet<Fingerprint>,
}

impl ExactKnownSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fingerprint.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }
}

impl FromIterator<Fingerprint> for ExactKnownSet {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        Self {
            fingerprints: iter.into_iter().collect(),
        }
    }
}

impl KnownSet for ExactKnownSet {
    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

/// Bloom-filter backed known set.
///
/// A negative answer from the filter is final. A positive one is checked
/// with a binary search over the sorted fingerprints when confirmation is
/// on, and trusted otherwise.
pub struct BloomKnownSet {
    bloom: GrowableBloom,
    /// Sorted, deduplicated; `None` when positives are trusted
    confirm: Option<Vec<Fingerprint>>,
    len: usize,
}

impl std::fmt::Debug for BloomKnownSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomKnownSet")
            .field("len", &self.len)
            .field("confirm", &self.confirm.is_some())
            .finish_non_exhaustive()
    }
}

impl BloomKnownSet {
    /// Build from a list of fingerprints.
    ///
    /// # Errors
    ///
    /// Returns [`KnownSetError::InvalidFalsePositiveRate`] unless
    /// `0 < false_positive_rate < 1`.
    pub fn new(
        mut fingerprints: Vec<Fingerprint>,
        false_positive_rate: f64,
        confirm: bool,
    ) -> Result<Self, KnownSetError> {
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(KnownSetError::InvalidFalsePositiveRate(false_positive_rate));
        }

        fingerprints.sort_unstable();
        fingerprints.dedup();

        let mut bloom = GrowableBloom::new(false_positive_rate, fingerprints.len().max(1));
        for fingerprint in &fingerprints {
            bloom.insert(fingerprint);
        }

        let len = fingerprints.len();
        Ok(Self {
            bloom,
            confirm: confirm.then_some(fingerprints),
            len,
        })
    }
}

impl KnownSet for BloomKnownSet {
    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        if !self.bloom.contains(fingerprint) {
            return false;
        }
        match &self.confirm {
            Some(sorted) => sorted.binary_search(fingerprint).is_ok(),
            None => true,
        }
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Result of reading a fingerprint list.
#[derive(Debug, Clone, Default)]
pub struct FingerprintList {
    /// Parsed fingerprints in file order (may repeat)
    pub fingerprints: Vec<Fingerprint>,
    /// Lines that were not valid fingerprints
    pub invalid_lines: usize,
}

/// Parse one hex fingerprint per line.
///
/// Blank lines and `#` comments are ignored. Invalid lines are logged and
/// counted, not fatal.
///
/// # Errors
///
/// Returns the underlying I/O error if reading fails.
pub fn parse_fingerprints<R: BufRead>(reader: R) -> io::Result<FingerprintList> {
    let mut list = FingerprintList::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match Fingerprint::from_hex(trimmed) {
            Ok(fingerprint) => list.fingerprints.push(fingerprint),
            Err(_) => {
                log::warn!("Known-set line {}: not a fingerprint: {}", number + 1, trimmed);
                list.invalid_lines += 1;
            }
        }
    }
    Ok(list)
}

/// Load a known-set file into the configured store.
///
/// # Errors
///
/// Returns [`KnownSetError`] if the file cannot be read, holds lines but no
/// fingerprint, or the configuration is invalid.
pub fn load_known_set(
    path: &Path,
    config: &KnownSetConfig,
) -> Result<Box<dyn KnownSet>, KnownSetError> {
    let io_err = |source| KnownSetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let list = parse_fingerprints(BufReader::new(file)).map_err(io_err)?;

    if list.fingerprints.is_empty() && list.invalid_lines > 0 {
        return Err(KnownSetError::NoFingerprints {
            path: path.to_path_buf(),
            invalid_lines: list.invalid_lines,
        });
    }
    if list.invalid_lines > 0 {
        log::warn!(
            "Skipped {} invalid line(s) in known-set file {}",
            list.invalid_lines,
            path.display()
        );
    }

    let set: Box<dyn KnownSet> = match config.backing {
        KnownSetBacking::Exact => Box::new(list.fingerprints.into_iter().collect::<ExactKnownSet>()),
        KnownSetBacking::Bloom => Box::new(BloomKnownSet::new(
            list.fingerprints,
            config.false_positive_rate,
            config.confirm,
        )?),
    };

    log::info!(
        "Loaded {} known fingerprints from {} ({} store)",
        set.len(),
        path.display(),
        config.backing
    );
    Ok(set)
}

/// Write fingerprints one per line, through a temporary file and rename.
///
/// # Errors
///
/// Returns [`KnownSetError::Io`] if the file cannot be written.
pub fn write_fingerprints<'a, I>(path: &Path, fingerprints: I) -> Result<usize, KnownSetError>
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    let io_err = |source| KnownSetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp = super::index::temporary_path(path);

    let mut count = 0;
    let result = (|| -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for fingerprint in fingerprints {
            writeln!(writer, "{fingerprint}")?;
            count += 1;
        }
        writer.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(count)
}
