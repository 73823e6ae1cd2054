//! Tombraider - consolidation of recovered files
//!
//! Merges the output of disk-recovery tools into one sorted tree: every file
//! is fingerprinted with BLAKE3, dropped if its content is already known or
//! was kept earlier in the run, classified into one of sixteen categories,
//! and moved to `<dest>/<Category>/<flattened path>`. An index of what was
//! kept is written next to the sorted files.

pub mod actions;
pub mod classify;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod dedupe;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{ActionContext, DeleteMode, MergeTree};
use crate::classify::Classifier;
use crate::cli::{
    Cli, Commands, CondenseArgs, HashsetArgs, IndexArgs, KnownArgs, MergeArgs, OutputFormat,
    ProcessArgs, PruneArgs, WalkArgs, WorkerArgs,
};
use crate::config::Config;
use crate::consolidate::{ConsolidateConfig, Consolidator};
use crate::dedupe::{load_known_set, Blacklist, DuplicateFilter};
use crate::error::ExitCode;
use crate::output::{JsonOutput, Report, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{FingerprintMode, Hasher};

/// Shared state for one invocation.
struct Session {
    config: Config,
    shutdown: Arc<AtomicBool>,
    progress: Arc<dyn ProgressCallback>,
}

impl Session {
    fn action_context(&self) -> ActionContext {
        ActionContext::default()
            .with_walker_config(self.config.walker_config())
            .with_io_threads(self.config.io_threads)
            .with_chunk_size(self.config.chunk_size)
            .with_delete_mode(self.config.delete_mode)
            .with_shutdown_flag(Arc::clone(&self.shutdown))
            .with_progress_callback(Arc::clone(&self.progress))
    }

    fn hasher(&self, default_mode: FingerprintMode) -> Hasher {
        let hasher = Hasher::with_config(self.config.hasher_config(default_mode));
        log::info!("Fingerprint mode: {}", hasher.mode());
        hasher
    }

    fn apply_workers(&mut self, args: &WorkerArgs) {
        if let Some(mode) = args.mode {
            self.config.fingerprint.mode = Some(mode);
        }
        if let Some(threads) = args.io_threads {
            self.config.io_threads = threads;
        }
        if let Some(size) = args.chunk_size {
            self.config.chunk_size = size;
        }
    }

    fn apply_walk(&mut self, args: &WalkArgs) {
        self.config.follow_symlinks |= args.follow_symlinks;
        self.config.skip_hidden |= args.skip_hidden;
    }

    fn apply_trash(&mut self, trash: bool) {
        if trash {
            self.config.delete_mode = DeleteMode::Trash;
        }
    }

    /// A duplicate filter over the known set named on the command line, or
    /// an empty one.
    fn duplicate_filter(&mut self, args: &KnownArgs) -> anyhow::Result<DuplicateFilter> {
        if let Some(backing) = args.known_backing {
            self.config.known_set.backing = backing;
        }
        let Some(path) = &args.known else {
            return Ok(DuplicateFilter::default());
        };
        let known = load_known_set(path, &self.config.known_set)
            .with_context(|| format!("Cannot load known set {}", path.display()))?;
        Ok(DuplicateFilter::new(known))
    }
}

/// Run the application with parsed arguments.
///
/// # Errors
///
/// Returns an error for bad configuration, unusable inputs, and failures
/// that abort a run (a failed move or index write). Per-file problems are
/// reported in the summary and turn the exit code into partial success.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let handler = signal::install_handler().context("Cannot install Ctrl+C handler")?;
    let config = Config::load(cli.config.as_deref()).context("Cannot load configuration")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));
    let mut session = Session {
        config,
        shutdown: handler.flag(),
        progress,
    };

    let report = match &cli.command {
        Commands::Process(args) => Report::Process(run_process(&mut session, args)?),
        Commands::Condense(args) => Report::Condense(run_condense(&mut session, args)?),
        Commands::Index(args) => Report::Index(run_index(&mut session, args)?),
        Commands::Prune(args) => Report::Prune(run_prune(&mut session, args)?),
        Commands::Merge(args) => Report::Merge(run_merge(&mut session, args)?),
        Commands::Hashset(args) => Report::Hashset(run_hashset(&mut session, args)?),
    };

    write_report(&report, cli.format, cli.quiet, !cli.no_color)?;
    let code = report.exit_code();
    if code == ExitCode::Interrupted {
        log::warn!("Interrupted by user");
    }
    Ok(code)
}

fn write_report(
    report: &Report,
    format: OutputFormat,
    quiet: bool,
    colored: bool,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => JsonOutput::new(report)
            .write_to(&mut out)
            .context("Cannot write JSON report")?,
        OutputFormat::Text if quiet => {}
        OutputFormat::Text => TextOutput::new(report, colored)
            .write_to(&mut out)
            .context("Cannot write report")?,
    }
    out.flush().context("Cannot write report")?;
    Ok(())
}

fn run_process(
    session: &mut Session,
    args: &ProcessArgs,
) -> anyhow::Result<consolidate::ConsolidateSummary> {
    session.apply_workers(&args.workers);
    session.apply_walk(&args.walk);
    session.apply_trash(args.trash);
    if let Some(threshold) = args.small_image_threshold {
        session.config.small_image_threshold = threshold;
    }
    session.config.separate_unsupported_extensions |= args.separate_unsupported_extensions;
    if let Some(name) = &args.index_name {
        session.config.index_name = name.clone();
    }
    session.config.validate()?;

    let classifier = Classifier::new(
        session.config.classifier_tables()?,
        session.config.classifier_config(),
    );
    let mut blacklist = session.config.blacklist()?;
    if let Some(path) = &args.blacklist {
        blacklist.extend(&Blacklist::load(path)?);
    }
    if !blacklist.is_empty() {
        let labels: Vec<_> = blacklist.iter().map(|c| c.label()).collect();
        log::info!("Blacklisted categories: {}", labels.join(", "));
    }
    let filter = session.duplicate_filter(&args.known)?;

    let config = ConsolidateConfig::new(args.dest.clone())
        .with_index_name(session.config.index_name.clone())
        .with_io_threads(session.config.io_threads)
        .with_chunk_size(session.config.chunk_size)
        .with_delete_mode(session.config.delete_mode)
        .with_walker_config(session.config.walker_config())
        .with_shutdown_flag(Arc::clone(&session.shutdown))
        .with_progress_callback(Arc::clone(&session.progress));

    let mut consolidator = Consolidator::new(config, classifier)
        .with_hasher(session.hasher(FingerprintMode::Fast))
        .with_filter(filter)
        .with_blacklist(blacklist);
    Ok(consolidator.run(&args.sources)?)
}

fn run_condense(
    session: &mut Session,
    args: &CondenseArgs,
) -> anyhow::Result<actions::CondenseSummary> {
    session.apply_walk(&args.walk);
    Ok(actions::condense(&args.root, &session.action_context())?)
}

fn run_index(session: &mut Session, args: &IndexArgs) -> anyhow::Result<actions::IndexSummary> {
    session.apply_workers(&args.workers);
    session.apply_walk(&args.walk);
    session.config.validate()?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| actions::index::default_output(&args.root));
    let hasher = session.hasher(FingerprintMode::Exact);
    Ok(actions::build_index(
        &args.root,
        &output,
        &hasher,
        &session.action_context(),
    )?)
}

fn run_prune(session: &mut Session, args: &PruneArgs) -> anyhow::Result<actions::PruneSummary> {
    session.apply_trash(args.trash);
    let filter = session.duplicate_filter(&args.known)?;
    let hasher = session.hasher(FingerprintMode::Exact);
    Ok(actions::prune(
        &args.index,
        filter,
        &hasher,
        &session.action_context(),
    )?)
}

fn run_merge(session: &mut Session, args: &MergeArgs) -> anyhow::Result<actions::MergeSummary> {
    session.apply_trash(args.trash);
    if let Some(name) = &args.index_name {
        session.config.index_name = name.clone();
    }
    session.config.validate()?;
    let primary = MergeTree::new(&args.primary, &args.primary_index);
    let secondary = MergeTree::new(&args.secondary, &args.secondary_index);
    Ok(actions::merge(
        &primary,
        &secondary,
        &args.dest,
        &session.config.index_name,
        &session.action_context(),
    )?)
}

fn run_hashset(
    session: &mut Session,
    args: &HashsetArgs,
) -> anyhow::Result<actions::HashsetSummary> {
    session.apply_workers(&args.workers);
    session.apply_walk(&args.walk);
    session.config.validate()?;
    let hasher = session.hasher(FingerprintMode::Exact);
    Ok(actions::build_hashset(
        &args.roots,
        &args.output,
        &hasher,
        &session.action_context(),
    )?)
}
