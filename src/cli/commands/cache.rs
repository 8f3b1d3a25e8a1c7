//! Cache command - inspect cache namespaces

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::StowawayResult;
use crate::request::RequestKey;
use crate::store::{create_store, CacheStore};
use console::style;
use serde::Serialize;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> StowawayResult<()> {
    let store = create_store(&config.store);

    match args.action {
        CacheAction::List { format } => list_namespaces(&*store, config, format).await,
        CacheAction::Show { namespace, format } => {
            let namespace = namespace.unwrap_or_else(|| config.worker.version.clone());
            show_namespace(&*store, &namespace, format).await
        }
    }
}

#[derive(Debug, Serialize)]
struct NamespaceSummary {
    name: String,
    entries: usize,
    current: bool,
}

/// List every namespace in the store
async fn list_namespaces(
    store: &dyn CacheStore,
    config: &Config,
    format: OutputFormat,
) -> StowawayResult<()> {
    let mut summaries = Vec::new();
    for name in store.namespaces().await? {
        let entries = store.open(&name).await?.keys().await?.len();
        summaries.push(NamespaceSummary {
            current: name == config.worker.version,
            name,
            entries,
        });
    }

    match format {
        OutputFormat::Table => print_namespace_table(store, &summaries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Plain => {
            for summary in &summaries {
                println!("{}", summary.name);
            }
        }
    }

    Ok(())
}

fn print_namespace_table(store: &dyn CacheStore, summaries: &[NamespaceSummary]) {
    if summaries.is_empty() {
        println!("No cache namespaces found ({} store).", store.backend_name());
        return;
    }

    println!("{:<30} {:<10} {:<10}", "NAMESPACE", "ENTRIES", "STATE");
    println!("{}", "-".repeat(50));

    for summary in summaries {
        let state = if summary.current {
            style("current").green().to_string()
        } else {
            style("stale").yellow().to_string()
        };
        println!(
            "{:<30} {:<10} {:<10}",
            summary.name, summary.entries, state
        );
    }

    println!();
    println!("Total: {} namespace(s)", summaries.len());
}

/// List the request identities stored in one namespace
async fn show_namespace(
    store: &dyn CacheStore,
    namespace: &str,
    format: OutputFormat,
) -> StowawayResult<()> {
    if !store.namespaces().await?.iter().any(|n| n == namespace) {
        println!("Namespace {} does not exist.", namespace);
        return Ok(());
    }

    let handle = store.open(namespace).await?;
    let mut keys = handle.keys().await?;
    keys.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

    match format {
        OutputFormat::Table => print_key_table(namespace, &keys),
        OutputFormat::Json => {
            let urls: Vec<KeyJson<'_>> = keys
                .iter()
                .map(|k| KeyJson {
                    method: &k.method,
                    url: k.url.as_str(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        OutputFormat::Plain => {
            for key in &keys {
                println!("{}", key.url);
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct KeyJson<'a> {
    method: &'a str,
    url: &'a str,
}

fn print_key_table(namespace: &str, keys: &[RequestKey]) {
    println!("{}", style(namespace).cyan().bold());
    for key in keys {
        println!("  {} {} {}", style("•").cyan(), key.method, key.url);
    }
    println!();
    println!("Total: {} entr{}", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
}
