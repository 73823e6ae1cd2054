//! Category classifier.
//!
//! Every file gets exactly one of sixteen [`Category`] labels from two
//! independent signals:
//!
//! - the **extension signal**, looked up in the [`ClassifierTables`]
//! - the **content signal**, from the words of a [`ContentProbe`] description
//!
//! [`resolve`] combines them with a fixed table, and images below a size
//! threshold are relabelled [`Category::SmallImages`] afterwards.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tombraider::classify::{Classifier, ClassifierConfig, ClassifierTables};
//!
//! let tables = ClassifierTables::builtin()?;
//! let classifier = Classifier::new(tables, ClassifierConfig::default());
//! println!("{}", classifier.classify(Path::new("recup_dir.1/f0001.jpg")));
//! # Ok::<(), tombraider::classify::TableError>(())
//! ```

pub mod probe;
pub mod tables;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use probe::{ContentProbe, ProbeError, SignatureProbe, GENERIC_MARKER};
pub use tables::{CategoryOverride, CategoryTable, ClassifierTables};

/// Default size below which images become [`Category::SmallImages`].
pub const DEFAULT_SMALL_IMAGE_THRESHOLD: u64 = 50_000;

/// Classification outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    /// Encrypted containers, keys and wallets
    Encrypted,
    /// Compressed or packed archives
    Archives,
    /// Video files
    Videos,
    /// Audio files
    Audio,
    /// Images at or above the small-image threshold
    Images,
    /// Executables, libraries and source code
    Programs,
    /// Office documents, text formats and markup
    Documents,
    /// Logs, caches, temporary and system files
    Irrelevant,
    /// Databases, fonts, disk images and other known formats
    Misc,
    /// Extension and content name two different groups
    Mismatches,
    /// Known extension, binary content nobody recognises
    #[serde(rename = "Unsupported_Filedata")]
    UnsupportedFiledata,
    /// Known extension, content without any information
    #[serde(rename = "Unknown_Filedata")]
    UnknownFiledata,
    /// Unmapped extension with recognised content, when kept apart
    #[serde(rename = "Unsupported_Extension")]
    UnsupportedExtension,
    /// Neither signal says anything
    Unknown,
    /// Text that no table recognises
    #[serde(rename = "Unsupported_Text")]
    UnsupportedText,
    /// Images below the small-image threshold
    #[serde(rename = "Small_Images")]
    SmallImages,
}

impl Category {
    /// The nine content groups, in classification priority order.
    pub const GROUPS: &'static [Category] = &[
        Self::Encrypted,
        Self::Archives,
        Self::Videos,
        Self::Audio,
        Self::Images,
        Self::Programs,
        Self::Documents,
        Self::Irrelevant,
        Self::Misc,
    ];

    /// Every category.
    pub const ALL: &'static [Category] = &[
        Self::Encrypted,
        Self::Archives,
        Self::Videos,
        Self::Audio,
        Self::Images,
        Self::Programs,
        Self::Documents,
        Self::Irrelevant,
        Self::Misc,
        Self::Mismatches,
        Self::UnsupportedFiledata,
        Self::UnknownFiledata,
        Self::UnsupportedExtension,
        Self::Unknown,
        Self::UnsupportedText,
        Self::SmallImages,
    ];

    /// Label used for destination directories, reports and blacklists.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Encrypted => "Encrypted",
            Self::Archives => "Archives",
            Self::Videos => "Videos",
            Self::Audio => "Audio",
            Self::Images => "Images",
            Self::Programs => "Programs",
            Self::Documents => "Documents",
            Self::Irrelevant => "Irrelevant",
            Self::Misc => "Misc",
            Self::Mismatches => "Mismatches",
            Self::UnsupportedFiledata => "Unsupported_Filedata",
            Self::UnknownFiledata => "Unknown_Filedata",
            Self::UnsupportedExtension => "Unsupported_Extension",
            Self::Unknown => "Unknown",
            Self::UnsupportedText => "Unsupported_Text",
            Self::SmallImages => "Small_Images",
        }
    }

    /// Whether this is one of the nine table-backed groups.
    #[must_use]
    pub fn is_group(&self) -> bool {
        Self::GROUPS.contains(self)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TableError::UnknownCategory(s.to_string()))
    }
}

/// One classifier signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A content group
    Known(Category),
    /// Nothing to go on (no extension, or the generic content marker)
    Unknown,
    /// Something there, but no table claims it
    Unsupported,
}

/// Errors in classifier configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A label that names no category.
    #[error("Unknown category: '{0}'")]
    UnknownCategory(String),

    /// A derived category was given tables.
    #[error("Category '{0}' is not a content group and cannot have tables")]
    NotAGroup(String),

    /// A group was listed twice.
    #[error("Category '{0}' is listed more than once")]
    DuplicateGroup(String),

    /// Two groups claim the same extension.
    #[error("Extension '{extension}' belongs to both {first} and {second}")]
    DuplicateExtension {
        /// The shared extension
        extension: String,
        /// Earlier group
        first: String,
        /// Later group
        second: String,
    },

    /// Two groups claim the same tag.
    #[error("Tag '{tag}' belongs to both {first} and {second}")]
    DuplicateTag {
        /// The shared tag
        tag: String,
        /// Earlier group
        first: String,
        /// Later group
        second: String,
    },
}

/// Combine the two signals into a category.
///
/// `plaintext` is only evaluated by the rules that need it.
/// With `separate_unsupported_extensions`, an unmapped extension on
/// recognised content yields [`Category::UnsupportedExtension`] instead of
/// the content's group.
pub fn resolve(
    ext: Signal,
    info: Signal,
    plaintext: impl FnOnce() -> bool,
    separate_unsupported_extensions: bool,
) -> Category {
    match (ext, info) {
        (Signal::Known(x), Signal::Known(y)) if x == y => x,
        (Signal::Known(_), Signal::Known(_)) => Category::Mismatches,
        (Signal::Known(x), Signal::Unsupported) => {
            if plaintext() {
                x
            } else {
                Category::UnsupportedFiledata
            }
        }
        (Signal::Known(_), Signal::Unknown) => Category::UnknownFiledata,
        (Signal::Unsupported, Signal::Known(y)) => {
            if separate_unsupported_extensions {
                Category::UnsupportedExtension
            } else {
                y
            }
        }
        (Signal::Unsupported | Signal::Unknown, Signal::Unknown) => Category::Unknown,
        (Signal::Unknown, Signal::Known(y)) => y,
        (Signal::Unknown | Signal::Unsupported, Signal::Unsupported) => {
            if plaintext() {
                Category::UnsupportedText
            } else {
                Category::UnsupportedFiledata
            }
        }
    }
}

/// Classifier behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Images strictly smaller than this many bytes become `Small_Images`
    pub small_image_threshold: u64,
    /// Keep unmapped extensions with recognised content apart
    pub separate_unsupported_extensions: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            small_image_threshold: DEFAULT_SMALL_IMAGE_THRESHOLD,
            separate_unsupported_extensions: false,
        }
    }
}

/// Full classification of one file, for logging and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Extension signal
    pub ext: Signal,
    /// Content signal
    pub info: Signal,
    /// Probe description the content signal came from
    pub description: String,
    /// Final category
    pub category: Category,
}

/// Assigns categories using immutable tables and an injected probe.
pub struct Classifier {
    tables: ClassifierTables,
    probe: Box<dyn ContentProbe>,
    config: ClassifierConfig,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("tables", &self.tables)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Create a classifier using the built-in [`SignatureProbe`].
    #[must_use]
    pub fn new(tables: ClassifierTables, config: ClassifierConfig) -> Self {
        Self {
            tables,
            probe: Box::new(SignatureProbe::new()),
            config,
        }
    }

    /// Replace the content probe.
    #[must_use]
    pub fn with_probe(mut self, probe: impl ContentProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// The tables in use.
    #[must_use]
    pub fn tables(&self) -> &ClassifierTables {
        &self.tables
    }

    /// Classify a file, reading its size from the filesystem.
    ///
    /// A file whose size cannot be read is never treated as small.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Category {
        let size = std::fs::metadata(path).map_or(u64::MAX, |m| m.len());
        self.classify_with_size(path, size)
    }

    /// Classify a file whose size is already known.
    #[must_use]
    pub fn classify_with_size(&self, path: &Path, size: u64) -> Category {
        self.explain(path, size).category
    }

    /// Classify and keep both signals.
    #[must_use]
    pub fn explain(&self, path: &Path, size: u64) -> Classification {
        let ext = self.tables.extension_signal(path);
        let description = self.probe.describe_or_generic(path);
        let info = self.tables.description_signal(&description);

        let mut category = resolve(
            ext,
            info,
            || self.probe.is_plaintext(path),
            self.config.separate_unsupported_extensions,
        );
        if category == Category::Images && size < self.config.small_image_threshold {
            category = Category::SmallImages;
        }

        log::trace!(
            "Classified {}: ext={:?} info={:?} ({}) -> {}",
            path.display(),
            ext,
            info,
            description,
            category
        );

        Classification {
            ext,
            info,
            description,
            category,
        }
    }
}
