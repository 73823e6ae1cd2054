//! BLAKE3 fingerprint engine with exact and sampled modes.
//!
//! # Overview
//!
//! A [`Fingerprint`] identifies file content for equality testing. Two modes
//! are available:
//!
//! - [`FingerprintMode::Exact`]: the whole file is streamed through BLAKE3 in
//!   bounded chunks. Collision-resistant content identity.
//! - [`FingerprintMode::Fast`]: only the first and last `sample_size` bytes
//!   plus the file length are hashed, so the cost per file is constant no
//!   matter how large the file is. Files of at most `2 * sample_size` bytes are
//!   hashed whole, which makes both modes agree on small files.
//!
//! Fast mode accepts a nonzero chance of calling two different large files
//! duplicates when they share length, prefix and suffix.
//!
//! # Example
//!
//! ```no_run
//! use tombraider::scanner::{FingerprintMode, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new().with_mode(FingerprintMode::Exact);
//! let fingerprint = hasher.fingerprint(Path::new("photo.jpg")).unwrap();
//! println!("{}", fingerprint);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::HashError;

/// Default number of bytes sampled from each end of a file in fast mode.
pub const DEFAULT_SAMPLE_SIZE: usize = 8 * 1024;

/// Default read buffer for exact mode.
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// A 32-byte BLAKE3 content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; Fingerprint::LEN]);

impl Fingerprint {
    /// Length of a fingerprint in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hexadecimal representation (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hexadecimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not exactly 64 hex digits.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Which fingerprint algorithm to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Prefix + suffix sample (constant time per file)
    #[default]
    Fast,
    /// Whole-file hash (collision resistant)
    Exact,
}

impl fmt::Display for FingerprintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// Tunables for the fingerprint engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
    /// Fingerprint algorithm.
    pub mode: FingerprintMode,
    /// Bytes hashed from each end of the file in fast mode.
    pub sample_size: usize,
    /// Read buffer for exact mode.
    pub buffer_size: usize,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            mode: FingerprintMode::Fast,
            sample_size: DEFAULT_SAMPLE_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Fingerprint engine.
///
/// Stateless apart from its configuration, so a single instance can be shared
/// across worker threads.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    config: HasherConfig,
}

impl Hasher {
    /// Create a hasher with default settings (fast mode, 8 KiB samples).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher from explicit settings.
    #[must_use]
    pub fn with_config(config: HasherConfig) -> Self {
        Self {
            config: HasherConfig {
                sample_size: config.sample_size.max(1),
                buffer_size: config.buffer_size.max(1),
                ..config
            },
        }
    }

    /// Switch the fingerprint mode.
    #[must_use]
    pub fn with_mode(mut self, mode: FingerprintMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// The active fingerprint mode.
    #[must_use]
    pub fn mode(&self) -> FingerprintMode {
        self.config.mode
    }

    /// The active settings.
    #[must_use]
    pub fn config(&self) -> &HasherConfig {
        &self.config
    }

    /// Whether fast mode samples a file of `len` bytes instead of hashing
    /// all of it. Fast and exact fingerprints differ exactly for such files.
    #[must_use]
    pub fn samples(&self, len: u64) -> bool {
        len > 2 * self.config.sample_size as u64
    }

    /// Whether this hasher's fingerprint of a `len`-byte file is sampled.
    #[must_use]
    pub fn is_sampled(&self, len: u64) -> bool {
        self.config.mode == FingerprintMode::Fast && self.samples(len)
    }

    /// Fingerprint a file using the configured mode.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or if it
    /// is empty.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        match self.config.mode {
            FingerprintMode::Fast => self.sampled_hash(path),
            FingerprintMode::Exact => self.full_hash(path),
        }
    }

    /// Hash the entire file content.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] on read failure or when the file is empty.
    pub fn full_hash(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let total = self.stream_into(&mut file, &mut hasher, path)?;
        if total == 0 {
            return Err(HashError::Empty(path.to_path_buf()));
        }
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Hash the first and last `sample_size` bytes and the file length.
    ///
    /// Falls back to [`Hasher::full_hash`] semantics for files no larger than
    /// two samples.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] on read failure or when the file is empty.
    pub fn sampled_hash(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        if len == 0 {
            return Err(HashError::Empty(path.to_path_buf()));
        }

        let sample = self.config.sample_size;
        let mut hasher = blake3::Hasher::new();

        if !self.samples(len) {
            let total = self.stream_into(&mut file, &mut hasher, path)?;
            if total == 0 {
                return Err(HashError::Empty(path.to_path_buf()));
            }
            return Ok(Fingerprint(*hasher.finalize().as_bytes()));
        }

        let mut buffer = vec![0u8; sample];
        file.read_exact(&mut buffer)
            .map_err(|e| HashError::from_io(path, e))?;
        hasher.update(&buffer);

        file.seek(SeekFrom::End(-(sample as i64)))
            .map_err(|e| HashError::from_io(path, e))?;
        file.read_exact(&mut buffer)
            .map_err(|e| HashError::from_io(path, e))?;
        hasher.update(&buffer);
        hasher.update(&len.to_le_bytes());

        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Stream a reader into `hasher` in `buffer_size` chunks, returning bytes read.
    fn stream_into<R: Read>(
        &self,
        reader: &mut R,
        hasher: &mut blake3::Hasher,
        path: &Path,
    ) -> Result<u64, HashError> {
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total = 0u64;
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                    total += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            }
        }
        Ok(total)
    }
}
