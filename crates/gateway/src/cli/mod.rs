pub mod chat;
pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

use sv_domain::config::Config;

/// Skypearls Villas sales concierge.
#[derive(Debug, Parser)]
#[command(name = "skypearls", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Send a single message and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Thread to continue (defaults to "cli:run").
        #[arg(long, default_value = "cli:run")]
        thread: String,
        /// Output the final event as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Interactive conversation in the terminal.
    Chat {
        /// Thread to continue. A fresh thread is started if omitted.
        #[arg(long)]
        thread: Option<String>,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `SV_CONFIG` (or `config.toml`), then apply
/// `SV_*` environment overrides. Override problems are printed as warnings
/// (tracing is not up yet) and the file value is kept.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("SV_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config: Config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    for issue in config.apply_env_overrides() {
        eprintln!("WARNING: config: {issue}");
    }

    Ok((config, config_path))
}
