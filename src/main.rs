//! driftwatch - a file integrity auditor for long-lived archives.
//!
//! Usage:
//!   driftwatch audit [PATH]        Scan, verify and inventory a directory tree
//!   driftwatch duplicates [PATH]   Report identical files in the inventory
//!   driftwatch extensions [PATH]   Survey file extensions under a path
//!   driftwatch prune [PATH]        Drop missing/corrupted records from the inventory
//!   driftwatch --help              Show help

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::EnvFilter;

use driftwatch_audit::{AuditConfig, AuditReport, Auditor, survey_extensions};
use driftwatch_core::RecordState;
use driftwatch_dedupe::{
    DuplicateResolver, KnownDuplicates, render_csv, render_text, write_json_artifact,
};
use driftwatch_store::InventoryStore;

#[derive(Parser)]
#[command(
    name = "driftwatch",
    version,
    about = "A file integrity auditor",
    long_about = "driftwatch keeps a content-addressed inventory of a directory tree \
                  and tells you what changed between runs: new, modified, renamed and \
                  deleted files, plus silent corruption where bytes changed but \
                  metadata did not."
)]
struct Cli {
    /// Inventory database file
    #[arg(long, global = true, default_value = "driftwatch.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree, verify contents and update the inventory
    Audit {
        /// Root path to audit
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only audit files with these extensions (repeatable, e.g. -e jpg -e mp4)
        #[arg(short = 'e', long = "ext")]
        extensions: Vec<String>,

        /// Glob patterns to exclude from the walk (repeatable)
        #[arg(short = 'x', long = "exclude")]
        excludes: Vec<String>,

        /// Recompute every digest regardless of metadata
        #[arg(long)]
        force_verify: bool,

        /// Re-hash every Nth metadata-unchanged file (0 disables sampling)
        #[arg(long, default_value = "0")]
        verify_every: u64,

        /// Load audit settings from a JSON config file (flags override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Report groups of identical files recorded in the inventory
    Duplicates {
        /// Root path whose records to consider
        #[arg(default_value = ".")]
        path: PathBuf,

        /// JSON file of acknowledged duplicate groups to suppress
        #[arg(short, long)]
        known: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        /// Directory to write a timestamped JSON artifact into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Survey file extensions under a path (no inventory involved)
    Extensions {
        /// Root path to survey
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Number of extensions to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Permanently drop records in a given state from the inventory
    Prune {
        /// Root path whose records to prune
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Record state to drop ("missing" or "corrupted")
        #[arg(short, long)]
        state: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ReportFormat {
    #[default]
    Text,
    Csv,
    Json,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Audit {
            path,
            extensions,
            excludes,
            force_verify,
            verify_every,
            config,
            format,
        } => run_audit(
            &cli.db,
            &path,
            extensions,
            excludes,
            force_verify,
            verify_every,
            config,
            format,
        ),
        Command::Duplicates {
            path,
            known,
            format,
            output,
        } => run_duplicates(&cli.db, &path, known, format, output),
        Command::Extensions { path, top, format } => run_extensions(&path, top, format),
        Command::Prune { path, state } => run_prune(&cli.db, &path, &state),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_audit(
    db: &PathBuf,
    path: &PathBuf,
    extensions: Vec<String>,
    excludes: Vec<String>,
    force_verify: bool,
    verify_every: u64,
    config_file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let root = path.canonicalize().context("Invalid path")?;

    let mut config = match config_file {
        Some(file) => AuditConfig::from_json_file(&file)
            .wrap_err_with(|| format!("loading config {}", file.display()))?,
        None => AuditConfig::new(&root),
    };
    config.root = root.clone();
    if !extensions.is_empty() {
        config.ext_filter = extensions
            .iter()
            .map(|e| {
                let e = e.trim().to_lowercase();
                if e.starts_with('.') { e } else { format!(".{e}") }
            })
            .collect();
    }
    if !excludes.is_empty() {
        config.exclude_patterns = excludes;
    }
    config.force_verify = config.force_verify || force_verify;
    if verify_every > 0 {
        config.verify_every = verify_every;
    }

    let mut store = InventoryStore::open(db)
        .wrap_err_with(|| format!("opening inventory {}", db.display()))?;

    eprintln!("Auditing {}...", root.display());

    let auditor = Auditor::new(config)?;
    let mut progress_rx = auditor.subscribe();
    std::thread::spawn(move || {
        while let Ok(progress) = progress_rx.blocking_recv() {
            eprintln!(
                "  {} files scanned, {} hashed ({:.0} files/s)",
                progress.files_scanned,
                progress.files_hashed,
                progress.files_per_second()
            );
        }
    });

    let report = auditor.run(&mut store)?;
    drop(auditor);

    match format {
        OutputFormat::Text => print_audit_summary(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.has_corruption() {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_audit_summary(report: &AuditReport) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Audit Report - {}", report.root.display());
    println!("{}", "─".repeat(70));
    println!();
    println!(" Scanned:    {:>8} files", report.stats.scanned);
    println!(" Unchanged:  {:>8}", report.stats.unchanged);
    println!(" New:        {:>8}", report.stats.new_files);
    println!(" Modified:   {:>8}", report.stats.modified);
    println!(" Moved:      {:>8}", report.stats.moved);
    println!(" Missing:    {:>8}  (swept this run)", report.stats.swept);
    println!(
        " Verified:   {:>8}  ({} hashed)",
        report.stats.verified, report.stats.hashed
    );
    if report.stats.filtered > 0 {
        println!(" Filtered:   {:>8}", report.stats.filtered);
    }
    if report.stats.skipped > 0 {
        println!(" Skipped:    {:>8}  (read errors)", report.stats.skipped);
    }
    println!(
        " Duration:   {:>7.2}s  ({:?})",
        report.duration.as_secs_f64(),
        report.phase
    );

    if !report.warnings.is_empty() {
        println!();
        println!(" {} warning(s):", report.warnings.len());
        for warning in report.warnings.iter().take(10) {
            println!("   {warning}");
        }
        if report.warnings.len() > 10 {
            println!("   ... and {} more", report.warnings.len() - 10);
        }
    }

    if report.has_corruption() {
        println!();
        println!("{}", "!".repeat(70));
        println!(
            " POSSIBLE BIT-ROT: {} file(s) changed content without metadata change",
            report.corrupted_paths.len()
        );
        for path in &report.corrupted_paths {
            println!("   {}", path.display());
        }
        println!("{}", "!".repeat(70));
    }
    println!();
}

fn run_duplicates(
    db: &PathBuf,
    path: &PathBuf,
    known_file: Option<PathBuf>,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let root = path.canonicalize().context("Invalid path")?;
    let store = InventoryStore::open(db)
        .wrap_err_with(|| format!("opening inventory {}", db.display()))?;

    let known = match known_file {
        Some(file) => KnownDuplicates::from_json_file(&file)
            .wrap_err_with(|| format!("loading known duplicates {}", file.display()))?,
        None => KnownDuplicates::default(),
    };

    let report = DuplicateResolver::with_known(known).resolve(&store, &root)?;

    match format {
        ReportFormat::Text => print!("{}", render_text(&report)),
        ReportFormat::Csv => print!("{}", render_csv(&report)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(dir) = output {
        let artifact = write_json_artifact(&report, &dir)?;
        eprintln!("Wrote {}", artifact.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn run_extensions(path: &PathBuf, top: usize, format: OutputFormat) -> Result<ExitCode> {
    let root = path.canonicalize().context("Invalid path")?;

    eprintln!("Surveying {}...", root.display());
    let report = survey_extensions(&root)?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(40));
            println!(" Extensions under {}", root.display());
            println!(" {} files total", report.total_files);
            println!("{}", "─".repeat(40));
            for (ext, count) in report.top(top) {
                println!(" {ext:<20} {count:>8}");
            }
            let remaining = report.counts.len().saturating_sub(top);
            if remaining > 0 {
                println!(" ... and {remaining} more");
            }
            if !report.warnings.is_empty() {
                println!();
                println!(" {} warning(s) during survey", report.warnings.len());
            }
            println!();
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(ExitCode::SUCCESS)
}

fn run_prune(db: &PathBuf, path: &PathBuf, state: &str) -> Result<ExitCode> {
    let state = RecordState::from_str(state)
        .map_err(|_| eyre!("unknown state {state:?}, expected \"missing\" or \"corrupted\""))?;
    if state == RecordState::Active {
        return Err(eyre!("refusing to prune active records"));
    }

    let root = path.canonicalize().context("Invalid path")?;
    let mut store = InventoryStore::open(db)
        .wrap_err_with(|| format!("opening inventory {}", db.display()))?;

    let dropped = store.prune(&root, state)?;
    println!(
        "Dropped {dropped} {state} record(s) under {}",
        root.display()
    );

    Ok(ExitCode::SUCCESS)
}
