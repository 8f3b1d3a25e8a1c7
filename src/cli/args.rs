//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stowaway - offline-first caching proxy
///
/// Serves an application's static assets from a versioned local cache and
/// its pages network-first, falling back to an offline page when the
/// network is unavailable.
#[derive(Parser, Debug)]
#[command(name = "stowaway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STOWAWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local stowaway.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the current version and serve requests through it
    Serve(ServeArgs),

    /// Precache the manifest into the current cache namespace
    Install,

    /// Delete stale cache namespaces
    Activate,

    /// Run a single request through the worker
    Fetch(FetchArgs),

    /// Inspect cache namespaces
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.listen)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Base URL same-origin requests are forwarded to (overrides network.upstream)
    #[arg(short, long)]
    pub upstream: Option<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Path or URL to request, resolved against the worker origin
    pub path: String,

    /// Send `Accept: text/html` so the request is treated as a navigation
    #[arg(long)]
    pub html: bool,

    /// Print the response body
    #[arg(short, long)]
    pub body: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache namespaces
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the entries stored in a namespace
    Show {
        /// Namespace to inspect (defaults to worker.version)
        namespace: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_serve() {
        let cli = Cli::parse_from(["stowaway", "serve", "--listen", "0.0.0.0:9000"]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.listen.as_deref(), Some("0.0.0.0:9000"));
                assert!(args.upstream.is_none());
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_install_and_activate() {
        let cli = Cli::parse_from(["stowaway", "install"]);
        assert!(matches!(cli.command, Commands::Install));

        let cli = Cli::parse_from(["stowaway", "activate"]);
        assert!(matches!(cli.command, Commands::Activate));
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from(["stowaway", "fetch", "/about", "--html"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.path, "/about");
                assert!(args.html);
                assert!(!args.body);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_parses_cache_show_default_namespace() {
        let cli = Cli::parse_from(["stowaway", "cache", "show"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Show { namespace, .. },
            }) => assert!(namespace.is_none()),
            _ => panic!("expected Cache Show command"),
        }
    }

    #[test]
    fn cli_parses_cache_list_json() {
        let cli = Cli::parse_from(["stowaway", "cache", "list", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheArgs {
                action: CacheAction::List {
                    format: OutputFormat::Json
                }
            })
        ));
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from([
            "stowaway",
            "config",
            "show",
            "-vv",
            "--no-local",
            "-c",
            "/tmp/stowaway.toml",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_local);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/stowaway.toml")));
    }

    #[test]
    fn cli_parses_config_without_action() {
        let cli = Cli::parse_from(["stowaway", "config"]);
        match cli.command {
            Commands::Config(args) => assert!(args.action.is_none()),
            _ => panic!("expected Config command"),
        }
    }
}
