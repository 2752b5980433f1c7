//! metaprop CLI - apply metadata records to a property store

mod config;
mod errors;

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use metaprop_core::{
    Batch, BatchReport, CategoryRegistry, FileLinkPolicy, InputFormat, MemoryStore, Outcome,
    SourceRecord,
};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn log_level(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Error,
            Verbosity::Normal => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Debug,
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    fn debug(self, msg: &str) {
        if matches!(self, Verbosity::Verbose) {
            println!("[debug] {msg}");
        }
    }
}

#[derive(Parser)]
#[command(name = "metaprop")]
#[command(about = "Apply external metadata records to typed property slots", long_about = None)]
struct Cli {
    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (default: ~/.config/metaprop/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Grouping domain table (JSON, YAML or TOML), merged over the config
    #[arg(long, global = true)]
    categories: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and validate records without writing anything
    Check {
        /// Input file(s) or glob patterns
        #[arg(required = true)]
        input: Vec<String>,
        /// Input format (csv, json, jsonl); detected from the extension by default
        #[arg(long)]
        format: Option<String>,
        /// Accept File and Link properties
        #[arg(long)]
        allow_file_links: bool,
        /// Exit with an error if any record fails
        #[arg(long)]
        strict: bool,
    },

    /// Apply records to a JSON slot store
    Apply {
        /// Input file(s) or glob patterns
        #[arg(required = true)]
        input: Vec<String>,
        /// Slot store to read and update
        #[arg(short, long)]
        store: PathBuf,
        /// Input format (csv, json, jsonl); detected from the extension by default
        #[arg(long)]
        format: Option<String>,
        /// Create slots that don't exist yet
        #[arg(long)]
        create_missing: bool,
        /// Write File and Link properties as text
        #[arg(long)]
        allow_file_links: bool,
        /// Run without saving the store
        #[arg(long)]
        dry_run: bool,
        /// Write the batch report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Exit with an error if any record fails
        #[arg(long)]
        strict: bool,
    },

    /// List the grouping domain
    Categories,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from_path(Some(path.clone()))
    } else {
        Config::load()
    };

    // Config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);

    env_logger::Builder::new()
        .filter_level(verbosity.log_level())
        .parse_default_env()
        .init();

    let mut registry = config.category_registry();
    if let Some(path) = &cli.categories {
        let data = std::fs::read(path).map_err(|e| anyhow!(errors::file_read_error(path, &e)))?;
        let extra = CategoryRegistry::from_bytes(&data, path.to_str())
            .with_context(|| format!("Invalid category table '{}'", path.display()))?;
        registry.merge(&extra);
    }

    match cli.command {
        Commands::Check {
            input,
            format,
            allow_file_links,
            strict,
        } => {
            let policy = file_link_policy(&config, allow_file_links);
            let strict = strict || config.defaults.strict;
            cmd_check(&config, &registry, input, format, policy, strict, verbosity)
        }
        Commands::Apply {
            input,
            store,
            format,
            create_missing,
            allow_file_links,
            dry_run,
            report,
            strict,
        } => {
            let opts = ApplyOptions {
                policy: file_link_policy(&config, allow_file_links),
                create_missing: create_missing || config.defaults.create_missing,
                dry_run,
                report,
                strict: strict || config.defaults.strict,
            };
            cmd_apply(&config, &registry, input, &store, format, opts, verbosity)
        }
        Commands::Categories => cmd_categories(&registry),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "metaprop", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn file_link_policy(config: &Config, allow: bool) -> FileLinkPolicy {
    if allow {
        FileLinkPolicy::Write
    } else {
        config.defaults.file_links
    }
}

/// Expand input patterns into file paths, resolving against the input folder.
fn collect_inputs(config: &Config, patterns: Vec<String>, v: Verbosity) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for pattern in patterns {
        let resolved = config.resolve_input(&pattern);
        let text = resolved.to_string_lossy();

        if text.contains('*') || text.contains('?') || text.contains('[') {
            match glob::glob(&text) {
                Ok(paths) => {
                    let before = files.len();
                    files.extend(paths.flatten().filter(|p| p.is_file()));
                    if files.len() == before {
                        v.info(&format!("Warning: pattern '{}' matched no files", pattern));
                    }
                }
                Err(e) => {
                    v.info(&format!("Warning: invalid glob pattern '{}': {}", pattern, e));
                }
            }
        } else {
            files.push(resolved);
        }
    }

    files.sort();
    files
}

/// Read and decode one input file.
fn load_records(path: &Path, format: Option<&str>) -> Result<Vec<SourceRecord>> {
    let display = path.to_string_lossy();
    let format = match format {
        Some(name) => InputFormat::from_name(name)
            .with_context(|| format!("Unknown input format '{}'. Use csv, json or jsonl", name))?,
        None => InputFormat::detect(&display)
            .ok_or_else(|| anyhow!(errors::format_detection_error(&display)))?,
    };

    let data = std::fs::read(path).map_err(|e| anyhow!(errors::file_read_error(path, &e)))?;
    metaprop_core::decode(&data, format).with_context(|| format!("Failed to decode '{}'", display))
}

fn cmd_check(
    config: &Config,
    registry: &CategoryRegistry,
    input: Vec<String>,
    format: Option<String>,
    policy: FileLinkPolicy,
    strict: bool,
    v: Verbosity,
) -> Result<()> {
    let files = collect_inputs(config, input, v);
    if files.is_empty() {
        bail!("No input files found");
    }

    let batch = Batch::new(registry).file_links(policy);
    let mut valid = 0;
    let mut failed = 0;

    for path in &files {
        v.info(&format!("{}:", path.display()));
        let records = load_records(path, format.as_deref())?;

        for record in &records {
            match batch.prepare(record) {
                Ok(resolved) => {
                    valid += 1;
                    let prop = &resolved.prop;
                    v.info(&format!(
                        "  #{} {}/{} '{}' {} -> {} (group {}) = {}",
                        record.index,
                        prop.external_id,
                        prop.component,
                        prop.display_name,
                        prop.meta_type,
                        resolved.value_kind,
                        resolved.grouping,
                        resolved.display
                    ));
                }
                Err(e) => {
                    failed += 1;
                    eprintln!(
                        "  #{} FAILED [{}] {}",
                        record.index,
                        e.code(),
                        errors::describe_failure(&e, registry)
                    );
                }
            }
        }
    }

    v.info(&format!("\n{} valid, {} failed", valid, failed));

    if strict && failed > 0 {
        bail!("{} record(s) failed validation", failed);
    }
    Ok(())
}

/// Options for the apply command.
struct ApplyOptions {
    policy: FileLinkPolicy,
    create_missing: bool,
    dry_run: bool,
    report: Option<PathBuf>,
    strict: bool,
}

fn cmd_apply(
    config: &Config,
    registry: &CategoryRegistry,
    input: Vec<String>,
    store_path: &Path,
    format: Option<String>,
    opts: ApplyOptions,
    v: Verbosity,
) -> Result<()> {
    let files = collect_inputs(config, input, v);
    if files.is_empty() {
        bail!("No input files found");
    }

    let store = if store_path.exists() {
        let data = std::fs::read(store_path)
            .map_err(|e| anyhow!(errors::file_read_error(store_path, &e)))?;
        MemoryStore::from_json(&data)
            .with_context(|| format!("Invalid slot store '{}'", store_path.display()))?
    } else {
        v.debug(&format!("Store '{}' not found, starting empty", store_path.display()));
        MemoryStore::new()
    };
    let mut store = store.create_missing(opts.create_missing);

    let batch = Batch::new(registry).file_links(opts.policy);
    let mut reports: Vec<(String, BatchReport)> = Vec::new();

    for path in &files {
        let records = load_records(path, format.as_deref())?;
        v.debug(&format!("{}: {} records", path.display(), records.len()));

        let pb = if !matches!(v, Verbosity::Quiet) {
            let pb = ProgressBar::new(records.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            pb.set_message(path.display().to_string());
            Some(pb)
        } else {
            None
        };

        let report = batch.run_with(records, &mut store, |_| {
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
            ControlFlow::Continue(())
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        print_report(path, &report, registry, v);
        reports.push((path.display().to_string(), report));
    }

    if opts.dry_run {
        v.info("Dry run: store not saved");
    } else {
        let bytes = store.to_json().context("Failed to serialize slot store")?;
        std::fs::write(store_path, bytes)
            .with_context(|| format!("Failed to write '{}'", store_path.display()))?;
        v.debug(&format!("Saved {} slots to {}", store.len(), store_path.display()));
    }

    if let Some(report_path) = &opts.report {
        let by_file: indexmap::IndexMap<_, _> = reports.iter().map(|(f, r)| (f.as_str(), r)).collect();
        let bytes = serde_json::to_vec_pretty(&by_file).context("Failed to serialize report")?;
        std::fs::write(report_path, bytes)
            .with_context(|| format!("Failed to write '{}'", report_path.display()))?;
    }

    let failed: usize = reports.iter().map(|(_, r)| r.stats.failed).sum();
    if opts.strict && failed > 0 {
        bail!("{} record(s) failed", failed);
    }
    Ok(())
}

fn print_report(path: &Path, report: &BatchReport, registry: &CategoryRegistry, v: Verbosity) {
    for entry in &report.records {
        let who = format!(
            "#{} {}/{} '{}'",
            entry.index, entry.identity.external_id, entry.identity.component, entry.identity.display_name
        );
        match &entry.outcome {
            Outcome::Applied { value } => v.debug(&format!("{} <- {}", who, value)),
            Outcome::Skipped { reason } => v.info(&format!("  {} skipped: {:?}", who, reason)),
            Outcome::Failed { error } => eprintln!(
                "  {} FAILED [{}] {}",
                who,
                error.code(),
                errors::describe_failure(error, registry)
            ),
        }
    }

    v.info(&format!(
        "{}: {} applied, {} skipped, {} failed ({:.3}s)",
        path.display(),
        report.stats.applied,
        report.stats.skipped,
        report.stats.failed,
        report.stats.duration.as_secs_f64()
    ));
}

fn cmd_categories(registry: &CategoryRegistry) -> Result<()> {
    println!("Grouping domain:\n");
    for (name, id) in registry.groups() {
        println!("  {:<32} {}", name, id);
    }
    println!("\nTotal: {} groups", registry.len());
    Ok(())
}
