use crate::commands::{DEFAULT_CONFIG_DIR, DEFAULT_DB_PATH};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, debug};
use tracksift_capture::FilterPolicy;
use tracksift_core::dataset::prepare_labeled;
use tracksift_core::features::{
    BEHAVIOR_FEATURES_FILE, NETWORK_FEATURES_FILE, SESSION_ID_COLUMN, START_URL_COLUMN,
    behavior_table, network_table,
};
use tracksift_core::logs::write_logs;
use tracksift_core::merge::merge;
use tracksift_core::replay::{ReplayOptions, execute_replay};
use tracksift_core::report::{
    ReportFormat, generate_dataset_report, generate_merge_report, generate_replay_report,
};
use tracksift_core::store::CaptureStore;
use tracksift_core::table::FeatureTable;

pub const DB_FILE_NAME: &str = "tracksift.db";
pub const POLICY_FILE_NAME: &str = "policy.json";

// Helpers shared by the handlers

pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Install the fmt subscriber. Only the first call in a process takes effect.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(io::stderr)
        .try_init();
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Policy from `path`, or the built-in defaults when no file is given.
pub fn load_policy(path: Option<&PathBuf>) -> Result<FilterPolicy> {
    match path {
        Some(path) => FilterPolicy::from_file(path)
            .with_context(|| format!("Failed to load filter policy {}", path.display())),
        None => Ok(FilterPolicy::default()),
    }
}

/// Expand the `--capture` arguments: directories contribute their `.jsonl`
/// files in name order, plain paths are taken as given.
pub fn collect_capture_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("Failed to read capture directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "capture directory expanded");
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    if files.is_empty() {
        bail!("No capture files found");
    }
    Ok(files)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn confirmed(response: &str) -> bool {
    response == "y" || response == "yes"
}

fn spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    Some(spinner)
}

fn db_path_arg(args: &ArgMatches) -> PathBuf {
    expand_path(
        args.get_one::<String>("db")
            .map(String::as_str)
            .unwrap_or(DEFAULT_DB_PATH),
    )
}

/// Path-valued argument `name` with `~` expanded.
pub fn path_arg(args: &ArgMatches, name: &str) -> Option<PathBuf> {
    args.get_one::<PathBuf>(name)
        .map(|path| expand_path(&path.to_string_lossy()))
}

fn required_path(args: &ArgMatches, name: &str) -> Result<PathBuf> {
    path_arg(args, name).with_context(|| format!("--{} is required", name))
}

// Handlers

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  TRACKSIFT INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let target = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let force = args.get_flag("force");
    let config_dir = expand_path(target);
    let db_path = config_dir.join(DB_FILE_NAME);
    let policy_path = config_dir.join(POLICY_FILE_NAME);

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {}", config_dir.display()))?;

    // Filter policy
    let write_policy = if policy_path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A filter policy already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            policy_path.display().to_string().bright_white()
        );
        println!();
        let response = print_prompt("Replace it with the default policy? [y/N]:")?;
        println!();
        confirmed(&response)
    } else {
        true
    };

    if write_policy {
        println!("{} Writing default filter policy...", "→".blue());
        let policy = serde_json::to_string_pretty(&FilterPolicy::default())?;
        fs::write(&policy_path, policy)
            .with_context(|| format!("Failed to write {}", policy_path.display()))?;
        println!(
            "  {} {}",
            "✓".green().bold(),
            policy_path.display().to_string().bright_white()
        );
        println!();
    } else {
        println!("{} Keeping existing filter policy", "→".blue());
        println!();
    }

    // Capture database
    if CaptureStore::exists(&db_path) {
        let replace = if force {
            println!(
                "{} Deleting existing database (force mode)",
                "→".yellow().bold()
            );
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!();
            let response = print_prompt("Overwrite it? Stored sessions will be lost. [y/N]:")?;
            println!();
            confirmed(&response)
        };

        if replace {
            CaptureStore::remove(&db_path)?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
        println!();
    }

    if !CaptureStore::exists(&db_path) {
        println!("{} Creating database...", "→".blue());
        CaptureStore::open(&db_path)
            .with_context(|| format!("Failed to create database {}", db_path.display()))?;
    }

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!(
        "{} Filter policy: {}",
        "✓".green().bold(),
        policy_path.display().to_string().bright_white()
    );
    println!();

    Ok(())
}

pub async fn handle_replay(args: &ArgMatches, quiet: bool) -> Result<()> {
    let capture_args: Vec<PathBuf> = args
        .get_many::<PathBuf>("capture")
        .map(|values| values.map(|path| expand_path(&path.to_string_lossy())).collect())
        .unwrap_or_default();
    let capture_files = collect_capture_files(&capture_args)?;
    let db_path = db_path_arg(args);
    let threads = *args.get_one::<usize>("threads").unwrap_or(&4);
    let policy = load_policy(path_arg(args, "policy").as_ref())?;
    let logs_dir = path_arg(args, "logs");

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    println!("\n{} Replaying {} capture file(s)", "→".blue(), capture_files.len());
    println!("Workers: {}", threads);
    println!("Database: {}\n", db_path.display());

    let options = ReplayOptions {
        capture_files,
        db_path: db_path.clone(),
        workers: threads,
        policy,
        show_progress_bars: !quiet,
    };
    let summary = execute_replay(options).await.context("Replay failed")?;

    println!("\n{} Replay complete!\n", "✓".green().bold());
    print!("{}", generate_replay_report(&summary));

    if !summary.failed_files.is_empty() {
        println!(
            "{} {} capture file(s) could not be replayed",
            "⚠".yellow().bold(),
            summary.failed_files.len()
        );
    }

    if let Some(dir) = logs_dir {
        let store = CaptureStore::open(&db_path)?;
        let sessions = store.load_closed_sessions()?;
        let (behavior_rows, network_rows) = write_logs(&dir, &sessions)
            .with_context(|| format!("Failed to write raw logs to {}", dir.display()))?;
        println!(
            "{} Raw logs: {} ({} behavior rows, {} network rows)",
            "✓".green().bold(),
            dir.display().to_string().bright_white(),
            behavior_rows.to_string().cyan(),
            network_rows.to_string().cyan()
        );
    }

    Ok(())
}

pub fn handle_features(args: &ArgMatches, quiet: bool) -> Result<()> {
    let db_path = db_path_arg(args);
    let output_dir = required_path(args, "output")?;
    let policy = load_policy(path_arg(args, "policy").as_ref())?;
    let complete_only = args.get_flag("complete-only");

    if !CaptureStore::exists(&db_path) {
        bail!(
            "No capture database at {}; run `tracksift init` and `tracksift replay` first",
            db_path.display()
        );
    }

    let progress = spinner(quiet, "Aggregating session features...");

    let store = CaptureStore::open(&db_path)?;
    let mut sessions = store.load_closed_sessions()?;
    let loaded = sessions.len();
    if complete_only {
        sessions.retain(|s| !s.partial);
    }

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let behavior_path = output_dir.join(BEHAVIOR_FEATURES_FILE);
    let network_path = output_dir.join(NETWORK_FEATURES_FILE);

    let behavior = behavior_table(&sessions)?;
    behavior.write_csv(&behavior_path)?;
    let network = network_table(&sessions, &policy)?;
    network.write_csv(&network_path)?;

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    println!(
        "{} Sessions: {} loaded, {} aggregated",
        "✓".green().bold(),
        loaded.to_string().cyan(),
        sessions.len().to_string().cyan()
    );
    println!(
        "{} Behavior features: {} ({} rows)",
        "✓".green().bold(),
        behavior_path.display().to_string().bright_white(),
        behavior.len()
    );
    println!(
        "{} Network features: {} ({} rows)",
        "✓".green().bold(),
        network_path.display().to_string().bright_white(),
        network.len()
    );

    Ok(())
}

pub fn handle_merge(args: &ArgMatches) -> Result<()> {
    let behavior_path = required_path(args, "behavior")?;
    let network_path = required_path(args, "network")?;
    let output_path = required_path(args, "output")?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let behavior = read_table(&behavior_path, &[SESSION_ID_COLUMN, START_URL_COLUMN])?;
    let network = read_table(&network_path, &[START_URL_COLUMN])?;

    let (merged, report) = merge(&behavior, &network)?;

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    merged
        .write_csv(&output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    let rendered = generate_merge_report(&report, format)?;
    match path_arg(args, "report") {
        Some(report_path) => {
            fs::write(&report_path, &rendered)
                .with_context(|| format!("Failed to write report {}", report_path.display()))?;
            println!(
                "{} Report saved: {}",
                "✓".green().bold(),
                report_path.display().to_string().bright_white()
            );
        }
        None => print!("{}", rendered),
    }

    println!(
        "{} Merged table: {} ({} rows)",
        "✓".green().bold(),
        output_path.display().to_string().bright_white(),
        merged.len()
    );
    if !report.is_clean() {
        println!(
            "{} Merge finished with cardinality warnings; see the report",
            "⚠".yellow().bold()
        );
    }

    Ok(())
}

pub fn handle_dataset(args: &ArgMatches) -> Result<()> {
    let input = required_path(args, "input")?;
    let label = args
        .get_one::<String>("label")
        .map(String::as_str)
        .unwrap_or(tracksift_core::dataset::LABEL_COLUMN);

    let table = read_table(&input, &[SESSION_ID_COLUMN, START_URL_COLUMN])?;
    let set = prepare_labeled(&table, label)
        .with_context(|| format!("{} is not usable as a training set", input.display()))?;

    print!("{}", generate_dataset_report(&set));
    println!(
        "{} {} labeled rows ready for training",
        "✓".green().bold(),
        set.labels.len().to_string().cyan()
    );

    Ok(())
}

fn read_table(path: &Path, id_columns: &[&str]) -> Result<FeatureTable> {
    FeatureTable::read_csv(path, id_columns)
        .with_context(|| format!("Failed to read feature table {}", path.display()))
}
