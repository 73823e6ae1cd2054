//! Extension and tag tables for the nine content groups.
//!
//! Built once, validated, then shared read-only by the classifier. Every
//! extension belongs to at most one group and so does every tag; overlapping
//! configuration is rejected with [`TableError`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Category, Signal, TableError};

/// Extensions and descriptive tags of one content group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    /// The group this table maps to
    pub category: Category,
    /// Lowercase extensions without the leading dot
    pub extensions: BTreeSet<String>,
    /// Lowercase description words
    pub tags: BTreeSet<String>,
}

impl CategoryTable {
    /// Build a table from string slices, normalizing case and leading dots.
    #[must_use]
    pub fn new<E, T>(category: Category, extensions: E, tags: T) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            category,
            extensions: extensions.into_iter().map(|e| normalize_ext(e.as_ref())).collect(),
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

/// Per-group override read from the configuration file.
///
/// A present list replaces the built-in list for that group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOverride {
    /// Replacement extension list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    /// Replacement tag list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Validated, immutable classifier tables.
#[derive(Debug, Clone)]
pub struct ClassifierTables {
    /// One table per group, in priority order
    groups: Vec<CategoryTable>,
    /// Extension lookup
    by_extension: HashMap<String, Category>,
}

fn normalize_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Split a description into lowercase words with surrounding punctuation removed.
#[must_use]
pub fn tokenize(description: &str) -> BTreeSet<String> {
    description
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c| matches!(c, ',' | ';' | ':' | '(' | ')' | '[' | ']' | '{' | '}' | '"'))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

impl ClassifierTables {
    /// Validate and index `tables`.
    ///
    /// Tables may come in any order; groups without a table get an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a table names a derived category, a group
    /// appears twice, or an extension or tag is claimed by two groups.
    pub fn new(tables: Vec<CategoryTable>) -> Result<Self, TableError> {
        let mut slots: BTreeMap<Category, CategoryTable> = BTreeMap::new();
        for table in tables {
            if !table.category.is_group() {
                return Err(TableError::NotAGroup(table.category.label().to_string()));
            }
            if slots.contains_key(&table.category) {
                return Err(TableError::DuplicateGroup(table.category.label().to_string()));
            }
            slots.insert(table.category, table);
        }

        let groups: Vec<CategoryTable> = Category::GROUPS
            .iter()
            .map(|&category| {
                slots.remove(&category).unwrap_or_else(|| {
                    CategoryTable::new(category, Vec::<&str>::new(), Vec::<&str>::new())
                })
            })
            .collect();

        let mut by_extension = HashMap::new();
        let mut tag_owner: HashMap<&str, Category> = HashMap::new();
        for group in &groups {
            for ext in &group.extensions {
                if let Some(previous) = by_extension.insert(ext.clone(), group.category) {
                    return Err(TableError::DuplicateExtension {
                        extension: ext.clone(),
                        first: previous.label().to_string(),
                        second: group.category.label().to_string(),
                    });
                }
            }
            for tag in &group.tags {
                if let Some(previous) = tag_owner.insert(tag.as_str(), group.category) {
                    return Err(TableError::DuplicateTag {
                        tag: tag.clone(),
                        first: previous.label().to_string(),
                        second: group.category.label().to_string(),
                    });
                }
            }
        }

        Ok(Self {
            groups,
            by_extension,
        })
    }

    /// The built-in tables.
    ///
    /// # Errors
    ///
    /// Never fails for the shipped tables; the result is still validated.
    pub fn builtin() -> Result<Self, TableError> {
        Self::new(builtin_tables())
    }

    /// Replace individual groups' lists with configured ones.
    ///
    /// Keys are category labels, matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] for an unknown label, a derived category, or
    /// overrides that make two groups overlap.
    pub fn with_overrides(
        self,
        overrides: &BTreeMap<String, CategoryOverride>,
    ) -> Result<Self, TableError> {
        if overrides.is_empty() {
            return Ok(self);
        }

        let mut groups = self.groups;
        for (label, override_) in overrides {
            let category: Category = label.parse()?;
            let group = groups
                .iter_mut()
                .find(|g| g.category == category)
                .ok_or_else(|| TableError::NotAGroup(label.clone()))?;

            if let Some(extensions) = &override_.extensions {
                group.extensions = extensions.iter().map(|e| normalize_ext(e)).collect();
            }
            if let Some(tags) = &override_.tags {
                group.tags = tags.iter().map(|t| t.trim().to_lowercase()).collect();
            }
            log::debug!(
                "Category {} overridden: {} extensions, {} tags",
                category,
                group.extensions.len(),
                group.tags.len()
            );
        }

        Self::new(groups)
    }

    /// Tables in priority order.
    #[must_use]
    pub fn groups(&self) -> &[CategoryTable] {
        &self.groups
    }

    /// Group owning `ext` (case-insensitive, leading dot optional).
    #[must_use]
    pub fn category_for_extension(&self, ext: &str) -> Option<Category> {
        self.by_extension.get(&normalize_ext(ext)).copied()
    }

    /// Extension signal of a path.
    ///
    /// No extension, or only a trailing dot, is `Unknown`; an extension no
    /// group claims is `Unsupported`.
    #[must_use]
    pub fn extension_signal(&self, path: &Path) -> Signal {
        let ext = match path.extension() {
            Some(ext) if !ext.is_empty() => ext.to_string_lossy(),
            _ => return Signal::Unknown,
        };
        match self.category_for_extension(&ext) {
            Some(category) => Signal::Known(category),
            None => Signal::Unsupported,
        }
    }

    /// Content signal of a probe description.
    ///
    /// The generic marker (or nothing at all) is `Unknown`. Otherwise a word
    /// equal to any group's extension decides first, then descriptive tags;
    /// both passes walk the groups in priority order.
    #[must_use]
    pub fn description_signal(&self, description: &str) -> Signal {
        let trimmed = description.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(super::probe::GENERIC_MARKER) {
            return Signal::Unknown;
        }

        let tokens = tokenize(trimmed);

        if let Some(group) = self
            .groups
            .iter()
            .find(|g| tokens.iter().any(|t| g.extensions.contains(t)))
        {
            return Signal::Known(group.category);
        }

        if let Some(group) = self
            .groups
            .iter()
            .find(|g| tokens.iter().any(|t| g.tags.contains(t)))
        {
            return Signal::Known(group.category);
        }

        Signal::Unsupported
    }
}

/// Built-in tables, one per group.
///
/// `h` and `text` are deliberately absent: a header file or a bare text
/// description resolves through the plaintext rules.
#[must_use]
pub fn builtin_tables() -> Vec<CategoryTable> {
    vec![
        CategoryTable::new(
            Category::Encrypted,
            [
                "gpg", "pgp", "asc", "aes", "enc", "kdbx", "kdb", "luks", "tc", "hc", "axx",
                "p12", "pfx", "pem", "key", "wallet", "jks", "keystore",
            ],
            [
                "encrypted", "openssl", "salted", "keepass", "private", "openssh",
                "truecrypt", "veracrypt", "bitlocker", "cipher",
            ],
        ),
        CategoryTable::new(
            Category::Archives,
            [
                "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "tbz2", "xz", "txz", "lz", "lzma",
                "zst", "cab", "arj", "z", "cpio", "lzh", "ace",
            ],
            ["archive", "compressed", "gzip", "bzip2", "zstandard", "cabinet", "7-zip"],
        ),
        CategoryTable::new(
            Category::Videos,
            [
                "mp4", "m4v", "mkv", "webm", "avi", "mov", "wmv", "asf", "flv", "mpg", "mpeg",
                "3gp", "3g2", "vob", "ogv", "mts", "m2ts", "rm", "rmvb", "divx",
            ],
            ["video", "movie", "matroska", "quicktime", "realmedia"],
        ),
        CategoryTable::new(
            Category::Audio,
            [
                "mp3", "wav", "flac", "ogg", "oga", "m4a", "aac", "wma", "aiff", "aif", "mid",
                "midi", "opus", "amr", "ape",
            ],
            ["audio", "wave", "sound", "vorbis"],
        ),
        CategoryTable::new(
            Category::Images,
            [
                "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "avif",
                "ico", "svg", "psd", "raw", "cr2", "nef", "arw", "dng", "tga", "xcf", "jp2",
            ],
            ["image", "bitmap", "icon", "photoshop", "jfif", "exif"],
        ),
        CategoryTable::new(
            Category::Programs,
            [
                "exe", "dll", "sys", "so", "elf", "msi", "apk", "jar", "class", "dex", "wasm",
                "py", "pyc", "sh", "bash", "bat", "cmd", "ps1", "pl", "rb", "js", "c", "cpp",
                "cc", "cs", "java", "go", "rs", "php", "swift", "kt", "lua", "o", "vbs", "deb",
                "rpm",
            ],
            ["executable", "script", "pe32", "pe32+", "mach-o", "relocatable", "dalvik"],
        ),
        CategoryTable::new(
            Category::Documents,
            [
                "txt", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
                "rtf", "csv", "md", "tex", "html", "htm", "xml", "epub", "ps", "pages",
                "numbers", "json", "yml", "yaml", "eml", "msg",
            ],
            [
                "document", "word", "excel", "powerpoint", "opendocument", "postscript",
                "spreadsheet", "presentation", "mail",
            ],
        ),
        CategoryTable::new(
            Category::Irrelevant,
            [
                "log", "tmp", "temp", "bak", "old", "lnk", "ini", "cfg", "cache", "swp", "dmp",
                "evtx", "evt", "pf", "cur",
            ],
            [
                "temporary", "thumbnail", "shortcut", "registry", "prefetch", "event",
                "swap", "crash", "minidump", "cursor",
            ],
        ),
        CategoryTable::new(
            Category::Misc,
            [
                "sqlite", "sqlite3", "db", "ttf", "otf", "woff", "woff2", "iso", "dmg", "img",
                "vmdk", "vdi", "qcow2", "torrent", "ics", "vcf",
            ],
            [
                "database", "font", "truetype", "opentype", "berkeley", "disk", "bittorrent",
                "vcard", "vcalendar", "calendar",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ClassifierTables {
        ClassifierTables::builtin().unwrap()
    }

    #[test]
    fn test_builtin_tables_are_disjoint() {
        let t = tables();
        assert_eq!(t.groups().len(), Category::GROUPS.len());
        for (group, expected) in t.groups().iter().zip(Category::GROUPS) {
            assert_eq!(group.category, *expected);
        }
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        let tokens = tokenize("RIFF (little-endian) data, WAVE audio");
        assert!(tokens.contains("little-endian"));
        assert!(tokens.contains("data"));
        assert!(tokens.contains("wave"));
        assert!(!tokens.contains("data,"));
    }

    #[test]
    fn test_extension_signal() {
        let t = tables();
        assert_eq!(t.extension_signal(Path::new("a/photo.JPG")), Signal::Known(Category::Images));
        assert_eq!(t.extension_signal(Path::new("report.h")), Signal::Unsupported);
        assert_eq!(t.extension_signal(Path::new("README")), Signal::Unknown);
        assert_eq!(t.extension_signal(Path::new("trailing.")), Signal::Unknown);
        assert_eq!(t.extension_signal(Path::new(".bashrc")), Signal::Unknown);
    }

    #[test]
    fn test_description_generic_marker_is_unknown() {
        let t = tables();
        assert_eq!(t.description_signal("data"), Signal::Unknown);
        assert_eq!(t.description_signal("  DATA "), Signal::Unknown);
        assert_eq!(t.description_signal(""), Signal::Unknown);
    }

    #[test]
    fn test_description_extension_tokens_win_over_tags() {
        let t = tables();
        // "document" is a Documents tag, "zip" an Archives extension
        assert_eq!(
            t.description_signal("zip document"),
            Signal::Known(Category::Archives)
        );
    }

    #[test]
    fn test_description_tags_follow_priority_order() {
        let t = tables();
        assert_eq!(
            t.description_signal("temporary encrypted file"),
            Signal::Known(Category::Encrypted)
        );
        assert_eq!(
            t.description_signal("audio / video file"),
            Signal::Known(Category::Videos)
        );
        assert_eq!(
            t.description_signal("compressed heavy document"),
            Signal::Known(Category::Archives)
        );
    }

    #[test]
    fn test_description_unmatched_is_unsupported() {
        let t = tables();
        assert_eq!(t.description_signal("ASCII text"), Signal::Unsupported);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let err = ClassifierTables::new(vec![
            CategoryTable::new(Category::Images, ["png"], Vec::<&str>::new()),
            CategoryTable::new(Category::Misc, [".PNG"], Vec::<&str>::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::DuplicateExtension { ref extension, .. } if extension == "png"));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let err = ClassifierTables::new(vec![
            CategoryTable::new(Category::Audio, Vec::<&str>::new(), ["sound"]),
            CategoryTable::new(Category::Videos, Vec::<&str>::new(), ["Sound"]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::DuplicateTag { .. }));
    }

    #[test]
    fn test_derived_category_rejected() {
        let err = ClassifierTables::new(vec![CategoryTable::new(
            Category::SmallImages,
            ["png"],
            Vec::<&str>::new(),
        )])
        .unwrap_err();
        assert!(matches!(err, TableError::NotAGroup(_)));
    }

    #[test]
    fn test_overrides_replace_lists() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "programs".to_string(),
            CategoryOverride {
                extensions: Some(vec!["exe".into(), "h".into()]),
                tags: None,
            },
        );
        let t = tables().with_overrides(&overrides).unwrap();
        assert_eq!(t.category_for_extension("h"), Some(Category::Programs));
        assert_eq!(t.category_for_extension("py"), None);
        assert_eq!(t.description_signal("sh script"), Signal::Known(Category::Programs));
    }

    #[test]
    fn test_overrides_conflict_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "Misc".to_string(),
            CategoryOverride {
                extensions: Some(vec!["jpg".into()]),
                tags: None,
            },
        );
        assert!(tables().with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_overrides_unknown_label_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Pictures".to_string(), CategoryOverride::default());
        assert!(matches!(
            tables().with_overrides(&overrides),
            Err(TableError::UnknownCategory(_))
        ));
    }
}
