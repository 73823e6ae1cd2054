//! Duplicate and known-set filtering.
//!
//! A file is discarded when its fingerprint is in the pre-loaded
//! [`KnownSet`] or was already kept earlier in this run ([`FoundSet`]).
//! Otherwise it is admitted and its fingerprint joins the found set, so the
//! earliest occurrence of any content is the one that survives. The driver
//! checks first and records only once a file is actually kept.
//!
//! The [`Blacklist`] is applied later, after classification, by the driver.

pub mod index;
pub mod known;

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::classify::Category;
use crate::scanner::{Fingerprint, HashError, Hasher};

pub use index::{Index, IndexError, IndexRecord};
pub use known::{
    load_known_set, BloomKnownSet, ExactKnownSet, KnownSet, KnownSetBacking, KnownSetConfig,
    KnownSetError,
};

/// Fingerprints kept so far in this run.
#[derive(Debug, Clone, Default)]
pub struct FoundSet {
    fingerprints: HashSet<Fingerprint>,
}

impl FoundSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `fingerprint` was already kept.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Add a fingerprint; `false` if it was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    /// Number of fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// In the known set
    Known,
    /// Already kept earlier in this run
    Duplicate,
    /// First occurrence; now recorded
    New,
}

impl Verdict {
    /// Whether the file is to be discarded.
    #[must_use]
    pub fn is_discard(&self) -> bool {
        !matches!(self, Self::New)
    }
}

/// Known set plus found set.
pub struct DuplicateFilter {
    known: Box<dyn KnownSet>,
    found: FoundSet,
}

impl std::fmt::Debug for DuplicateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateFilter")
            .field("known", &self.known.len())
            .field("found", &self.found.len())
            .finish()
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(Box::new(ExactKnownSet::new()))
    }
}

impl DuplicateFilter {
    /// Create a filter over `known` with an empty found set.
    #[must_use]
    pub fn new(known: Box<dyn KnownSet>) -> Self {
        Self {
            known,
            found: FoundSet::new(),
        }
    }

    /// Whether `fingerprint` would be discarded. Does not record anything.
    #[must_use]
    pub fn is_duplicate(&self, fingerprint: &Fingerprint) -> bool {
        self.known.contains(fingerprint) || self.found.contains(fingerprint)
    }

    /// Decide for `fingerprint` without recording it.
    #[must_use]
    pub fn check(&self, fingerprint: &Fingerprint) -> Verdict {
        if self.known.contains(fingerprint) {
            Verdict::Known
        } else if self.found.contains(fingerprint) {
            Verdict::Duplicate
        } else {
            Verdict::New
        }
    }

    /// Record a kept fingerprint; `false` if it was already recorded.
    pub fn record(&mut self, fingerprint: Fingerprint) -> bool {
        self.found.insert(fingerprint)
    }

    /// Decide for `fingerprint`, recording it when it is new.
    pub fn admit(&mut self, fingerprint: Fingerprint) -> Verdict {
        let verdict = self.check(&fingerprint);
        if verdict == Verdict::New {
            self.found.insert(fingerprint);
        }
        verdict
    }

    /// Whether the whole content of `path` is in the known set.
    ///
    /// Sampled fingerprints never match a known set written from whole-file
    /// digests, so files fingerprinted by sampling are confirmed here before
    /// they are kept. Always `false` when nothing is known.
    ///
    /// # Errors
    ///
    /// Returns the [`HashError`] if the file cannot be read.
    pub fn is_known_content(&self, path: &Path, hasher: &Hasher) -> Result<bool, HashError> {
        if self.known.is_empty() {
            return Ok(false);
        }
        let exact = hasher.full_hash(path)?;
        Ok(self.known.contains(&exact))
    }

    /// The known set.
    #[must_use]
    pub fn known(&self) -> &dyn KnownSet {
        self.known.as_ref()
    }

    /// The found set.
    #[must_use]
    pub fn found(&self) -> &FoundSet {
        &self.found
    }
}

/// Errors while loading a blacklist.
#[derive(thiserror::Error, Debug)]
pub enum BlacklistError {
    /// The file could not be read.
    #[error("Blacklist file {path}: {source}")]
    Io {
        /// The file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A label that names no category.
    #[error("Blacklist line {line}: unknown category '{label}'")]
    UnknownCategory {
        /// One-based line number (0 for configured labels)
        line: usize,
        /// The label
        label: String,
    },
}

/// Categories whose members are deleted after classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    categories: BTreeSet<Category>,
}

impl Blacklist {
    /// Create an empty blacklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from category labels.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError::UnknownCategory`] for a label that names no
    /// category.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, BlacklistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut blacklist = Self::new();
        for label in labels {
            let label = label.as_ref();
            let category = label
                .parse()
                .map_err(|_| BlacklistError::UnknownCategory {
                    line: 0,
                    label: label.to_string(),
                })?;
            blacklist.insert(category);
        }
        Ok(blacklist)
    }

    /// Parse one label per line; blank lines and `#` comments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError`] for read failures and unknown labels.
    pub fn parse<R: BufRead>(reader: R, source: &Path) -> Result<Self, BlacklistError> {
        let mut blacklist = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| BlacklistError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
            let label = line.trim();
            if label.is_empty() || label.starts_with('#') {
                continue;
            }
            let category = label
                .parse()
                .map_err(|_| BlacklistError::UnknownCategory {
                    line: i + 1,
                    label: label.to_string(),
                })?;
            blacklist.insert(category);
        }
        Ok(blacklist)
    }

    /// Load a blacklist file.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError`] for read failures and unknown labels.
    pub fn load(path: &Path) -> Result<Self, BlacklistError> {
        let file = File::open(path).map_err(|e| BlacklistError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(BufReader::new(file), path)
    }

    /// Add a category.
    pub fn insert(&mut self, category: Category) {
        self.categories.insert(category);
    }

    /// Add every category of `other`.
    pub fn extend(&mut self, other: &Blacklist) {
        self.categories.extend(other.categories.iter().copied());
    }

    /// Whether `category` is blacklisted.
    #[must_use]
    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Whether nothing is blacklisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Blacklisted categories in label order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().copied()
    }
}
