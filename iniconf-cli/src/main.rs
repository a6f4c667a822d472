//! iniconf CLI
//!
//! Command-line front end for inspecting INI configuration files through a
//! cached `ConfigStore`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iniconf_store::{ConfigOptions, ConfigStore};

/// iniconf - cached section lookups for INI files
#[derive(Parser)]
#[command(name = "iniconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file to read
    #[arg(short, long, env = "INICONF_FILE")]
    file: PathBuf,

    /// Refresh cached sections after this many milliseconds
    /// (defaults to INICONF_TTL_MS, else never)
    #[arg(long)]
    ttl_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List section names
    Sections,

    /// Print a section, or one key of it
    Get {
        /// Section name
        section: String,
        /// Only print this key
        key: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-read a section periodically through one cache
    Watch {
        /// Section name
        section: String,
        /// Delay between reads
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
        /// Number of reads
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "iniconf=debug,info"
    } else {
        "iniconf=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = match cli.ttl_ms {
        Some(ms) => ConfigOptions::default().with_ttl(Duration::from_millis(ms)),
        None => ConfigOptions::from_env().context("Invalid environment configuration")?,
    };
    let store = ConfigStore::new(&cli.file, options).context("Invalid options")?;
    debug!(?store, "Store ready");

    let mut out = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Sections => cmd_sections(&store, &mut out),
        Commands::Get { section, key, json } => {
            cmd_get(&store, &section, key.as_deref(), json, &mut out)
        }
        Commands::Watch {
            section,
            interval_ms,
            count,
        } => cmd_watch(
            &store,
            &section,
            Duration::from_millis(interval_ms),
            count,
            &mut out,
        ),
    };

    store.close()?;
    result
}

/// List section names
fn cmd_sections(store: &ConfigStore, out: &mut impl Write) -> Result<()> {
    let table = store
        .table()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    for name in table.names() {
        let count = table.get(name).map_or(0, |s| s.len());
        writeln!(out, "{} {}", name.cyan().bold(), format!("({count} keys)").dimmed())?;
    }

    Ok(())
}

/// Print a section or a single value
fn cmd_get(
    store: &ConfigStore,
    section: &str,
    key: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let pairs = store
        .section(section)
        .with_context(|| format!("Failed to load section [{section}]"))?;

    if let Some(key) = key {
        let value = pairs
            .get(key)
            .with_context(|| format!("No key {key:?} in section [{section}]"))?;
        if json {
            writeln!(out, "{}", serde_json::to_string(value)?)?;
        } else {
            writeln!(out, "{value}")?;
        }
        return Ok(());
    }

    let sorted: BTreeMap<&String, &String> = pairs.iter().collect();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&sorted)?)?;
    } else {
        writeln!(out, "{}", format!("[{section}]").yellow().bold())?;
        for (k, v) in sorted {
            writeln!(out, "{} = {}", k.green(), v)?;
        }
    }

    Ok(())
}

/// Poll a section to show cache hits and TTL refreshes
fn cmd_watch(
    store: &ConfigStore,
    section: &str,
    interval: Duration,
    count: usize,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(
        out,
        "{} [{}] every {:?} (ttl: {:?})",
        "Watching".cyan().bold(),
        section,
        interval,
        store.ttl()
    )?;

    for round in 1..=count {
        match store.section(section) {
            Ok(pairs) => {
                let stats = store.stats();
                writeln!(
                    out,
                    "{} {} keys {}",
                    format!("#{round}").dimmed(),
                    pairs.len(),
                    format!("(loads: {}, hits: {})", stats.loads, stats.hits).dimmed()
                )?;
            }
            Err(e) => writeln!(out, "{} {}", format!("#{round}").dimmed(), e.to_string().red())?,
        }
        out.flush()?;
        if round < count {
            std::thread::sleep(interval);
        }
    }

    Ok(())
}
