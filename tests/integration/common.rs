//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tombraider::cli::Cli;
use tombraider::error::ExitCode;

/// JPEG start-of-image marker with a JFIF segment.
pub const JPEG_HEADER: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00";

/// A scratch directory with an empty config file, so runs never pick up the
/// user's own configuration.
pub struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "").unwrap();
        Self { dir, config }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Replace the config file contents.
    pub fn set_config(&self, toml: &str) {
        fs::write(&self.config, toml).unwrap();
    }

    /// Run the application with `args` after the global flags.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let mut argv = vec![
            "tombraider".to_string(),
            "-q".to_string(),
            "--config".to_string(),
            self.config.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        let cli = Cli::try_parse_from(argv).unwrap();
        tombraider::run_app(cli)
    }
}

pub fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A JPEG-looking file of `size` bytes whose payload depends on `seed`.
pub fn jpeg(size: usize, seed: u8) -> Vec<u8> {
    let mut data = JPEG_HEADER.to_vec();
    data.resize(size, seed);
    data
}

pub fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Every regular file below `root`, relative to it, sorted.
pub fn files_below(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    files.sort();
    files
}
