//! CLI for the emberd metrics daemon configuration.
//!
//! Provides commands for checking a daemon configuration, resolving
//! storage rules for a metric name, and printing the built-in defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use emberd::Config;

/// emberd — carbon-compatible metrics daemon configuration CLI.
#[derive(Parser)]
#[command(name = "emberd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and its rule files.
    Check {
        /// Path to the daemon TOML configuration file.
        config_path: PathBuf,
    },

    /// Resolve the retention and aggregation policy for a metric name.
    Resolve {
        /// Path to the daemon TOML configuration file.
        config_path: PathBuf,

        /// Metric name to resolve (e.g. "servers.web1.cpu.user").
        metric: String,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the built-in default configuration as TOML.
    Defaults,
}

/// Output format for resolved policies.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// A single JSON object.
    Json,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { config_path } => cmd_check(&config_path),
        Commands::Resolve {
            config_path,
            metric,
            format,
        } => cmd_resolve(&config_path, &metric, &format),
        Commands::Defaults => cmd_defaults(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Reads a TOML configuration file, overlaying it onto the defaults,
/// and resolves its rule tables.
fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(config_path)
        .map_err(|e| format!("failed to read '{}': {e}", config_path.display()))?;
    let mut config: Config = toml::from_str(&text)?;
    config.load()?;
    Ok(config)
}

/// Implements `emberd check <config_path>`.
fn cmd_check(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    println!("Configuration OK: {}", config_path.display());

    if let Some(schemas) = config.whisper_schemas() {
        println!("  Schema rules: {} (+ default)", schemas.len());
        for rule in schemas.rules() {
            let tiers: Vec<String> = rule
                .policy()
                .tiers()
                .iter()
                .map(|t| format!("{}s:{}s", t.interval.as_secs(), t.retention.as_secs()))
                .collect();
            println!("    [{}] {} -> {}", rule.name(), rule.pattern_text(), tiers.join(","));
        }
    } else {
        println!("  Storage disabled; no rules loaded");
    }

    if let Some(aggregation) = config.whisper_aggregation() {
        println!("  Aggregation rules: {} (+ default)", aggregation.len());
        for rule in aggregation.rules() {
            println!(
                "    [{}] {} -> {} (xff {})",
                rule.name(),
                rule.pattern_text(),
                rule.policy().method,
                rule.policy().x_files_factor
            );
        }
    }

    Ok(())
}

/// Implements `emberd resolve <config_path> <metric>`.
fn cmd_resolve(
    config_path: &Path,
    metric: &str,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let Some(retention) = config.retention_resolver() else {
        return Err("storage is disabled in this configuration; nothing to resolve".into());
    };
    let aggregation = config
        .aggregation_resolver()
        .ok_or("aggregation rules not loaded")?;

    let schemas = config.whisper_schemas().ok_or("schema rules not loaded")?;
    let matched = schemas
        .resolve_rule(metric)
        .map_or("(default)", |rule| rule.name());

    let retention_policy = retention.resolve(metric);
    let aggregation_policy = aggregation.resolve(metric);

    match format {
        OutputFormat::Text => {
            println!("metric:      {metric}");
            println!("schema rule: {matched}");
            for tier in retention_policy.tiers() {
                println!(
                    "  tier: {}s per point, kept {}s ({} points)",
                    tier.interval.as_secs(),
                    tier.retention.as_secs(),
                    tier.points()
                );
            }
            println!(
                "aggregation: {} (xFilesFactor {})",
                aggregation_policy.method, aggregation_policy.x_files_factor
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "metric": metric,
                "schema_rule": matched,
                "retention": retention_policy,
                "aggregation": aggregation_policy,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `emberd defaults`.
fn cmd_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    println!("{}", toml::to_string(&config)?);
    Ok(())
}
