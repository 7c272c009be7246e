//! instcache CLI
//!
//! Command-line interface for exercising the shared instance cache against
//! real origins.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use instcache::{FindRequest, InstanceCacheConfig, SharedInstanceCache, XmlElement, XmlNode};

/// instcache - shared cache for remote XML instances
#[derive(Parser)]
#[command(name = "instcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum number of cached instances
    #[arg(long, global = true, env = "INSTCACHE_CAPACITY", default_value = "10")]
    capacity: usize,

    /// Fetch timeout in seconds
    #[arg(long, global = true, env = "INSTCACHE_FETCH_TIMEOUT_SECS", default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch instances through the cache, optionally several rounds
    Fetch {
        /// Source URIs
        #[arg(required = true)]
        uris: Vec<String>,
        /// TTL in milliseconds for admitted entries (negative: never expires)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        ttl_ms: i64,
        /// Number of rounds over all URIs
        #[arg(short, long, default_value = "1")]
        repeat: usize,
        /// Pause between rounds in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
        /// Validation hint stored with admitted entries
        #[arg(long)]
        validation: Option<String>,
    },

    /// Fetch one instance and print its element tree
    Show {
        /// Source URI
        uri: String,
        /// Maximum depth to print
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "instcache=debug,info"
    } else {
        "instcache=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = InstanceCacheConfig::default()
        .with_capacity(cli.capacity)
        .with_fetch_timeout(cli.timeout);
    let cache = SharedInstanceCache::with_config(config).context("Failed to create cache")?;
    tracing::debug!(capacity = cli.capacity, timeout_secs = cli.timeout, "Cache ready");

    match cli.command {
        Commands::Fetch {
            uris,
            ttl_ms,
            repeat,
            interval_ms,
            validation,
        } => cmd_fetch(&cache, &uris, ttl_ms, repeat, interval_ms, validation).await,
        Commands::Show { uri, depth } => cmd_show(&cache, &uri, depth).await,
    }
}

/// Fetch URIs through the cache
async fn cmd_fetch(
    cache: &SharedInstanceCache,
    uris: &[String],
    ttl_ms: i64,
    repeat: usize,
    interval_ms: u64,
    validation: Option<String>,
) -> Result<()> {
    println!("{} {} URI(s), {} round(s)", "📥 Fetching".cyan().bold(), uris.len(), repeat);

    for round in 0..repeat {
        if round > 0 && interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }

        for (idx, uri) in uris.iter().enumerate() {
            let mut request = FindRequest::new(format!("instance-{}-{}", round, idx), "cli", uri.as_str())
                .with_ttl_millis(ttl_ms);
            if let Some(hint) = &validation {
                request = request.with_validation(hint.clone());
            }

            let fetches_before = cache.stats().fetches;
            match cache.find(request).await {
                Ok(view) => {
                    let origin = if cache.stats().fetches > fetches_before {
                        "loaded".yellow()
                    } else {
                        "cached".green()
                    };
                    println!(
                        "   [{}] {} {} <{}> ({} elements, ttl {})",
                        round,
                        origin,
                        uri,
                        view.document.root().name,
                        view.document.root().element_count(),
                        view.ttl,
                    );
                }
                Err(e) => {
                    let label = if e.is_client_error() {
                        "rejected".red()
                    } else {
                        "failed".red()
                    };
                    println!("   [{}] {} {}: {}", round, label, uri, e);
                }
            }
        }
    }

    let stats = cache.stats();
    println!("\n{}", "📈 Cache statistics:".green().bold());
    println!("   {} {}/{}", "Entries:".dimmed(), stats.entries, stats.capacity);
    println!("   {} {}", "Hits:".dimmed(), stats.hits);
    println!("   {} {}", "Misses:".dimmed(), stats.misses);
    println!("   {} {}", "Expirations:".dimmed(), stats.expirations);
    println!("   {} {} ({} failed)", "Fetches:".dimmed(), stats.fetches, stats.fetch_failures);
    println!("   {} {}", "Parse failures:".dimmed(), stats.parse_failures);

    Ok(())
}

/// Print the element tree of one instance
async fn cmd_show(cache: &SharedInstanceCache, uri: &str, depth: usize) -> Result<()> {
    let view = cache
        .find(FindRequest::new("show", "cli", uri))
        .await
        .with_context(|| format!("Failed to load {}", uri))?;

    println!("{} {}", "📄".cyan(), uri);
    print_element(view.document.root(), 0, depth);

    Ok(())
}

fn print_element(element: &XmlElement, level: usize, max_depth: usize) {
    let indent = "  ".repeat(level + 1);
    let attributes: Vec<String> = element
        .attributes
        .iter()
        .map(|a| format!("{}=\"{}\"", a.name, a.value))
        .collect();
    let text: String = element
        .children
        .iter()
        .filter_map(|child| match child {
            XmlNode::Text(t) => Some(t.trim()),
            XmlNode::Element(_) => None,
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = format!("{}<{}", indent, element.name.yellow());
    if !attributes.is_empty() {
        line.push(' ');
        line.push_str(&attributes.join(" "));
    }
    line.push('>');
    if !text.trim().is_empty() {
        line.push(' ');
        line.push_str(text.trim());
    }
    println!("{}", line);

    if level + 1 >= max_depth {
        let hidden = element.elements().count();
        if hidden > 0 {
            println!("{}  {}", indent, format!("... {} child element(s)", hidden).dimmed());
        }
        return;
    }
    for child in element.elements() {
        print_element(child, level + 1, max_depth);
    }
}
