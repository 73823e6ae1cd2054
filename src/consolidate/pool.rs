//! Chunked parallel fingerprinting.
//!
//! Workers only compute fingerprints. Each chunk's results come back in
//! input order and are handed to the caller one by one on the calling
//! thread, and the next chunk starts only after the caller has dealt with
//! all of them. Keep/discard decisions therefore happen strictly in
//! enumeration order, and at most one chunk of results is in memory.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::scanner::{FileEntry, Fingerprint, HashError, Hasher};

/// Default number of fingerprinting workers.
pub const DEFAULT_IO_THREADS: usize = 2;

/// Default number of files per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Bounded worker pool for fingerprinting.
pub struct FingerprintPool {
    pool: rayon::ThreadPool,
    hasher: Hasher,
    chunk_size: usize,
}

impl std::fmt::Debug for FingerprintPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintPool")
            .field("threads", &self.pool.current_num_threads())
            .field("hasher", &self.hasher)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// How a chunked run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRun {
    /// Every entry was handed to the caller
    Completed,
    /// Shutdown was requested; later entries were not touched
    Interrupted,
}

impl FingerprintPool {
    /// Create a pool of `io_threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns the rayon error if the thread pool cannot be built.
    pub fn new(
        hasher: Hasher,
        io_threads: usize,
        chunk_size: usize,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(io_threads.max(1))
            .thread_name(|i| format!("tombraider-hash-{i}"))
            .build()?;
        Ok(Self {
            pool,
            hasher,
            chunk_size: chunk_size.max(1),
        })
    }

    /// The hasher used by the workers.
    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Fingerprint `entries` chunk by chunk and pass each result to `apply`,
    /// in input order.
    ///
    /// `shutdown` is checked before every entry is applied.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `apply`.
    pub fn run<E, F>(
        &self,
        entries: &[FileEntry],
        shutdown: Option<&AtomicBool>,
        mut apply: F,
    ) -> Result<PoolRun, E>
    where
        F: FnMut(&FileEntry, Result<Fingerprint, HashError>) -> Result<(), E>,
    {
        let interrupted = || shutdown.is_some_and(|f| f.load(Ordering::SeqCst));

        for chunk in entries.chunks(self.chunk_size) {
            if interrupted() {
                return Ok(PoolRun::Interrupted);
            }

            let results: Vec<Result<Fingerprint, HashError>> = self.pool.install(|| {
                chunk
                    .par_iter()
                    .map(|entry| self.hasher.fingerprint(&entry.path))
                    .collect()
            });

            for (entry, result) in chunk.iter().zip(results) {
                if interrupted() {
                    return Ok(PoolRun::Interrupted);
                }
                apply(entry, result)?;
            }
        }
        Ok(PoolRun::Completed)
    }
}
