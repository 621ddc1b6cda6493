//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use factlearn_core::{InMemoryOperations, InMemoryTemplates, LearningService};
use factlearn_extract::ParserRegistry;
use factlearn_shared::{
    Ability, AppConfig, LinkId, Operation, init_config, load_config, load_config_from,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// factlearn — learn facts and relationships from command output.
#[derive(Parser)]
#[command(
    name = "factlearn",
    version,
    about = "Extract facts from command output and relate them using ability variables.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.factlearn/factlearn.toml.
    #[arg(long, global = true, env = "FACTLEARN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build and print the variable co-occurrence model.
    Model {
        /// JSON array of abilities.
        #[arg(long)]
        abilities: PathBuf,
    },

    /// Run the configured parsers over a file and print the facts found.
    Parse {
        /// File holding command output.
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as base64, the way agents ship output.
        #[arg(long)]
        base64: bool,
    },

    /// Learn from one link's output and update the operation snapshot.
    Learn {
        /// JSON array of abilities used to build the model.
        #[arg(long)]
        abilities: PathBuf,

        /// JSON operation snapshot.
        #[arg(long)]
        operation: PathBuf,

        /// Link (execution record) id within the operation.
        #[arg(long)]
        link: String,

        /// File holding the base64-encoded command output.
        #[arg(long)]
        blob: PathBuf,

        /// Where to write the updated operation (defaults to overwriting --operation).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber from verbosity and log format.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "factlearn=info",
        1 => "factlearn=debug",
        _ => "factlearn=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Model { abilities } => cmd_model(&config, &abilities).await,
        Command::Parse { input, base64 } => cmd_parse(&config, &input, base64),
        Command::Learn {
            abilities,
            operation,
            link,
            blob,
            out,
        } => cmd_learn(&config, &abilities, &operation, &link, &blob, out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn service(
    config: &AppConfig,
    abilities: Vec<Ability>,
    operations: Arc<InMemoryOperations>,
) -> Result<LearningService> {
    let parsers = ParserRegistry::from_config(&config.parsers)?;
    let templates = Arc::new(InMemoryTemplates::new(abilities));
    Ok(LearningService::new(parsers, templates, operations).with_config(config.learning.clone()))
}

async fn cmd_model(config: &AppConfig, abilities: &Path) -> Result<()> {
    let abilities: Vec<Ability> = read_json(abilities)?;
    let service = service(config, abilities, Arc::new(InMemoryOperations::new()))?;

    let model = service.build_model().await?;
    print_json(&*model)
}

fn cmd_parse(config: &AppConfig, input: &Path, base64: bool) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .wrap_err_with(|| format!("reading {}", input.display()))?;
    let text = if base64 {
        factlearn_core::codec::decode_text(&raw)?
    } else {
        raw
    };

    let service = service(config, Vec::new(), Arc::new(InMemoryOperations::new()))?;
    let (facts, failed) = service.extract_facts(&text);
    for name in &failed {
        eprintln!("parser '{name}' failed; see log for details");
    }
    print_json(&facts)
}

async fn cmd_learn(
    config: &AppConfig,
    abilities: &Path,
    operation: &Path,
    link: &str,
    blob: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let link_id: LinkId = link.parse().map_err(|e| eyre!("invalid link id '{link}': {e}"))?;
    let abilities: Vec<Ability> = read_json(abilities)?;
    let snapshot: Operation = read_json(operation)?;
    let blob_text = std::fs::read_to_string(blob)
        .wrap_err_with(|| format!("reading {}", blob.display()))?;

    let link = snapshot
        .link(&link_id)
        .cloned()
        .ok_or_else(|| eyre!("link {link_id} is not part of operation {}", snapshot.id))?;

    let operations = Arc::new(InMemoryOperations::new());
    let shared = operations.insert(snapshot);
    let service = service(config, abilities, operations)?;

    service.build_model().await?;
    let report = service.learn(&link, &blob_text).await?;

    let target = out.unwrap_or(operation);
    let updated = shared.lock().await;
    let json = serde_json::to_string_pretty(&*updated)?;
    std::fs::write(target, json).wrap_err_with(|| format!("writing {}", target.display()))?;
    info!(path = %target.display(), "operation snapshot written");

    print_json(&report)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_learn_command() {
        let cli = Cli::try_parse_from([
            "factlearn",
            "-vv",
            "learn",
            "--abilities",
            "abilities.json",
            "--operation",
            "op.json",
            "--link",
            "0190c0de-0000-7000-8000-000000000000",
            "--blob",
            "out.b64",
        ])
        .expect("parse args");

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Learn { link, out, .. } => {
                assert!(link.parse::<LinkId>().is_ok());
                assert!(out.is_none());
            }
            _ => panic!("expected learn"),
        }
    }

    #[test]
    fn cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
