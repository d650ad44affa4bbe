//! # dirmerkle CLI - Directory change detection
//!
//! Command-line front end for the dirmerkle library.
//!
//! ## Usage
//! ```bash
//! # Print the root hash of a directory
//! dirmerkle hash ./project
//!
//! # Store a snapshot
//! dirmerkle --relative snapshot ./project -o before.json
//!
//! # Has anything changed? (exit 0 = identical, 1 = changed)
//! dirmerkle --relative compare ./project before.json
//!
//! # What changed?
//! dirmerkle --relative diff before.json ./project --stat
//!
//! # Check a snapshot for tampering
//! dirmerkle verify before.json
//! ```
//!
//! Any error exits with status 2.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dirmerkle::{
    diff, snapshot, BuildOptions, BuildReport, Change, ChangeKind, DirMerkleError, HashAlgorithm,
    LocalFs, PathStyle, ProgressInfo, Tree, TreeBuilder, TreeVerifier,
};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Exit status when trees are identical or verification passed
const EXIT_SAME: i32 = 0;
/// Exit status when trees differ or verification failed
const EXIT_DIFFERENT: i32 = 1;
/// Exit status for any error
const EXIT_ERROR: i32 = 2;

/// dirmerkle - Merkle tree hashing and diffing for directories
#[derive(Parser)]
#[command(name = "dirmerkle")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Digest algorithm
    #[arg(long, value_enum, global = true)]
    algorithm: Option<AlgorithmArg>,

    /// Use root-relative node paths (needed to compare moved directories)
    #[arg(long, global = true)]
    relative: bool,

    /// Glob patterns to leave out, matched against root-relative paths
    #[arg(short, long, global = true)]
    ignore: Vec<String>,

    /// Read through symbolic links
    #[arg(long, global = true)]
    follow_symlinks: bool,

    /// Worker threads for hashing and diffing
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// JSON file with build options; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the root hash of a directory
    Hash {
        /// Directory to hash
        dir: PathBuf,
    },

    /// Write a snapshot of a directory
    Snapshot {
        /// Directory to snapshot
        dir: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether a directory still matches a snapshot
    Compare {
        /// Directory to check
        dir: PathBuf,

        /// Snapshot to check against
        snapshot: PathBuf,
    },

    /// List what changed between two trees
    Diff {
        /// Expected side: directory or snapshot file
        expected: PathBuf,

        /// Actual side: directory or snapshot file
        actual: PathBuf,

        /// Show only statistics
        #[arg(long)]
        stat: bool,

        /// Print changes as JSON
        #[arg(long, conflicts_with = "stat")]
        json: bool,
    },

    /// Check the internal consistency of a snapshot
    Verify {
        /// Snapshot to verify
        snapshot: PathBuf,

        /// Also rehash every file from disk
        #[arg(long)]
        files: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum AlgorithmArg {
    Sha256,
    Blake3,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            AlgorithmArg::Blake3 => HashAlgorithm::Blake3,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "dirmerkle=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let message = match e.downcast_ref::<DirMerkleError>() {
                Some(err) => err.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("{}: {}", "Error".red().bold(), message);
            std::process::exit(EXIT_ERROR);
        }
    }
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<i32> {
    let options = resolve_options(&cli)?;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Hash { dir } => cmd_hash(&dir, &options, verbose),
        Commands::Snapshot { dir, output } => cmd_snapshot(&dir, output.as_deref(), &options),
        Commands::Compare { dir, snapshot } => cmd_compare(&dir, &snapshot, &options),
        Commands::Diff {
            expected,
            actual,
            stat,
            json,
        } => cmd_diff(&expected, &actual, &options, stat, json),
        Commands::Verify { snapshot, files } => cmd_verify(&snapshot, files, &options),
    }
}

/// Merge the config file (if any) with command-line flags
fn resolve_options(cli: &Cli) -> anyhow::Result<BuildOptions> {
    let mut options = match &cli.config {
        Some(path) => BuildOptions::from_file(path)?,
        None => BuildOptions::default(),
    };

    if let Some(algorithm) = cli.algorithm {
        options.algorithm = algorithm.into();
    }
    if cli.relative {
        options.path_style = PathStyle::Relative;
    }
    options.ignore_patterns.extend(cli.ignore.iter().cloned());
    if cli.follow_symlinks {
        options.follow_symlinks = true;
    }
    if let Some(workers) = cli.workers {
        options.parallel_workers = workers;
    }

    options.validate()?;
    Ok(options)
}

/// Print the root hash of a directory
fn cmd_hash(dir: &Path, options: &BuildOptions, verbose: bool) -> anyhow::Result<i32> {
    let report = build_tree(dir, options)?;
    println!("{}", report.tree.root_hash());

    if verbose {
        eprintln!(
            "  {} files, {} folders, {} in {}",
            report.files_hashed.to_string().cyan(),
            report.tree.folder_count().to_string().cyan(),
            format_bytes(report.bytes_hashed).cyan(),
            format_duration(truncate_millis(report.duration)).to_string().cyan()
        );
    }
    Ok(EXIT_SAME)
}

/// Write a snapshot to a file or stdout
fn cmd_snapshot(dir: &Path, output: Option<&Path>, options: &BuildOptions) -> anyhow::Result<i32> {
    let report = build_tree(dir, options)?;

    match output {
        Some(path) => {
            snapshot::save(&report.tree, path)?;
            eprintln!(
                "{} Saved snapshot of {} files to {}",
                "✓".green().bold(),
                report.files_hashed.to_string().cyan(),
                path.display().to_string().cyan()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            snapshot::to_writer(&report.tree, &mut handle)?;
            writeln!(handle)?;
        }
    }
    Ok(EXIT_SAME)
}

/// Compare a live directory against a stored snapshot by root hash only
fn cmd_compare(dir: &Path, snapshot_path: &Path, options: &BuildOptions) -> anyhow::Result<i32> {
    let expected = snapshot::load(snapshot_path, options.algorithm)?;
    let actual = build_tree(dir, options)?.tree;

    if expected.is_same(&actual) {
        println!("{} {}", "✓".green().bold(), "Identical".green());
        Ok(EXIT_SAME)
    } else {
        println!("{} {}", "✗".red().bold(), "Changed".red());
        println!("  Expected: {}", expected.root_hash().yellow());
        println!("  Actual:   {}", actual.root_hash().yellow());
        Ok(EXIT_DIFFERENT)
    }
}

/// List the changes between two trees
fn cmd_diff(
    expected: &Path,
    actual: &Path,
    options: &BuildOptions,
    stat: bool,
    json: bool,
) -> anyhow::Result<i32> {
    let expected = load_side(expected, options)?;
    let actual = load_side(actual, options)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.parallel_workers)
        .build()
        .map_err(DirMerkleError::from)?;
    let changes = pool.install(|| diff::diff_trees(&expected, &actual))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(EXIT_SAME);
    }

    let summary = diff::summarize(&changes);
    if summary.is_empty() {
        println!("{}", "No changes".green());
        return Ok(EXIT_SAME);
    }

    if !stat {
        for change in &changes {
            print_change(change);
        }
        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  Files added:     {}", summary.files_added.to_string().green());
    println!("  Files removed:   {}", summary.files_removed.to_string().red());
    println!("  Files changed:   {}", summary.files_changed.to_string().yellow());
    println!("  Folders added:   {}", summary.folders_added.to_string().green());
    println!("  Folders removed: {}", summary.folders_removed.to_string().red());
    Ok(EXIT_SAME)
}

/// Verify a snapshot's aggregates, and optionally its files
fn cmd_verify(snapshot_path: &Path, files: bool, options: &BuildOptions) -> anyhow::Result<i32> {
    let tree = snapshot::load(snapshot_path, options.algorithm)?;
    let verifier = TreeVerifier::new(options.algorithm);

    let mut reports = vec![("Aggregates", verifier.verify_aggregates(&tree))];
    if files {
        let filesystem = LocalFs::new(options.follow_symlinks);
        reports.push(("Files", verifier.verify_files(&tree, &filesystem)?));
    }

    let mut valid = true;
    for (label, report) in &reports {
        if report.is_valid() {
            println!("{} {}: {}", "✓".green().bold(), label, report.summary());
        } else {
            valid = false;
            println!("{} {}: {}", "✗".red().bold(), label, report.summary());
            for mismatch in &report.mismatches {
                println!("  ~ {}", mismatch.path.yellow());
            }
            for error in &report.errors {
                println!("  ! {}", error.red());
            }
        }
    }

    Ok(if valid { EXIT_SAME } else { EXIT_DIFFERENT })
}

/// A diff side is a live directory or a snapshot file
fn load_side(path: &Path, options: &BuildOptions) -> anyhow::Result<Tree> {
    if path.is_dir() {
        Ok(build_tree(path, options)?.tree)
    } else {
        Ok(snapshot::load(path, options.algorithm)?)
    }
}

/// Build a tree with a spinner on stderr, reporting skipped entries
fn build_tree(dir: &Path, options: &BuildOptions) -> anyhow::Result<BuildReport> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Scanning {}...", dir.display()));

    let progress = pb.clone();
    let result = TreeBuilder::new(dir)
        .with_options(options.clone())
        .build_with_progress(Some(move |info: ProgressInfo| {
            progress.set_message(format!(
                "Hashed {} files ({})",
                info.processed,
                format_bytes(info.bytes_processed)
            ));
        }));
    pb.finish_and_clear();

    let report = result?;
    for skipped in &report.skipped {
        eprintln!(
            "{} skipped {}: {}",
            "warning:".yellow().bold(),
            skipped.path.display(),
            skipped.reason
        );
    }
    tracing::debug!("Build of {} finished in {:?}", dir.display(), start.elapsed());
    Ok(report)
}

fn print_change(change: &Change) {
    let path = change.path();
    match change.kind() {
        ChangeKind::Added => println!("  + {}", path.green()),
        ChangeKind::Removed => println!("  - {}", path.red()),
        ChangeKind::Changed => println!("  ~ {}", path.yellow()),
        ChangeKind::AddedFolder => println!("  + {}/", path.green().bold()),
        ChangeKind::RemovedFolder => println!("  - {}/", path.red().bold()),
    }
}

fn truncate_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
