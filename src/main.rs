//! Dup Sweeper CLI
//!
//! Duplicate file sweeper with parallel directory traversal.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use dup_sweeper::config::{DEFAULT_BUFF_SIZE, DEFAULT_CONFIG_PATH};
use dup_sweeper::{ConfigDocument, RunSummary, ScanConfig};

const ABOUT: &str = r#"
Dup Sweeper - duplicate file sweeper

Examples:
  dup_sweeper init --base /photos --ext jpg --ext png      write configs/config.json
  dup_sweeper init --base /media --dest /dupes --cache-readable --cache-writable
  dup_sweeper run                                          sweep using configs/config.json
  dup_sweeper run -c other.json --work-dir /var/sweeper    cache and logs under /var/sweeper
  dup_sweeper run --json                                   JSON summary on stdout
"#;

/// Duplicate file sweeper
#[derive(Parser)]
#[command(name = "dup_sweeper")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the configured base paths
    Run {
        /// Configuration document
        #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Directory holding cache/ and logs/
        #[arg(short = 'w', long, default_value = ".")]
        work_dir: PathBuf,

        /// Worker threads, 0 = one per CPU
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Write a configuration document
    Init {
        /// Where to write the document
        #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Base directory to sweep (repeatable)
        #[arg(short = 'b', long = "base", required = true)]
        base_paths: Vec<PathBuf>,

        /// Destination for same-size files; omit to disable moving
        #[arg(short = 'd', long)]
        dest: Option<PathBuf>,

        /// Accepted extension (repeatable, `*.*` for all files)
        #[arg(short = 'e', long = "ext")]
        extensions: Vec<String>,

        /// Hashing buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_BUFF_SIZE)]
        buff_size: usize,

        /// Load the fingerprint cache at startup
        #[arg(long)]
        cache_readable: bool,

        /// Save the fingerprint cache after the run
        #[arg(long)]
        cache_writable: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            config,
            work_dir,
            threads,
            json,
            progress,
        }) => {
            let mut scan_config = match ScanConfig::load(&config) {
                Ok(c) => c,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            scan_config.work_dir = work_dir;
            scan_config.num_threads = threads;
            scan_config.show_progress = progress;

            info!("Starting sweep...");
            info!("Base paths: {:?}", scan_config.base_paths);
            info!("Destination: {:?}", scan_config.dest_path);
            info!(
                "Cache: read={} write={}",
                scan_config.cache_readable, scan_config.cache_writable
            );

            let summary = dup_sweeper::run(&scan_config);
            print_summary(&summary, json);
            ExitCode::SUCCESS
        }
        Some(Commands::Init {
            config,
            base_paths,
            dest,
            extensions,
            buff_size,
            cache_readable,
            cache_writable,
        }) => {
            let extensions = if extensions.is_empty() {
                ScanConfig::default_extensions()
            } else {
                extensions
            };
            let mut builder = ScanConfig::builder()
                .base_paths(base_paths)
                .extensions(extensions)
                .buff_size(buff_size)
                .cache_readable(cache_readable)
                .cache_writable(cache_writable);
            if let Some(dest) = dest {
                builder = builder.dest_path(dest);
            }

            match ConfigDocument::from(&builder.build()).save(&config) {
                Ok(()) => {
                    println!("Wrote {}", config.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Use 'dup_sweeper --help' for the full help");
            ExitCode::SUCCESS
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Cannot serialize summary: {}", e),
        }
        return;
    }
    println!("Sweep completed:");
    println!("  Directories: {}", summary.total_dirs);
    println!("  Files checked: {}", summary.total_files);
    println!("  Kept: {}", summary.accepted_count);
    println!(
        "  Removed: {} files, {}",
        summary.removed_count,
        human_bytes(summary.removed_bytes)
    );
    println!(
        "  Moved: {} files, {}",
        summary.moved_count,
        human_bytes(summary.moved_bytes)
    );
    println!("  Errors: {}", summary.error_count());
    println!("  Cache written: {}", summary.cache_written);
    println!("  Duration: {}ms", summary.duration_ms);
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}
