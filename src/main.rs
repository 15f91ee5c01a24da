//! Risk Signals Agent for Zentinel
//!
//! Analyzes telemetry, screens client origins and checks form submissions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_agent_risk_signals::{RiskSignalsAgent, RiskSignalsConfig};

#[derive(Parser, Debug)]
#[command(name = "zentinel-agent-risk-signals")]
#[command(author, version, about = "Risk signal detectors for Zentinel")]
struct Args {
    /// Path to configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key for the remote origin classification provider
    #[arg(long, env = "VPNAPI_IO_KEY", global = true, hide_env_values = true)]
    vpnapi_key: Option<String>,

    /// Offline anonymizer range dataset
    #[arg(long, env = "IPSET_DATA_PATH", global = true)]
    ipset_path: Option<PathBuf>,

    /// Block anonymized origins (1, true or yes)
    #[arg(long, env = "BLOCK_VPN", global = true)]
    block_vpn: Option<String>,

    /// Comma-separated addresses or ranges exempt from blocking
    #[arg(long, env = "VPN_ALLOWLIST", global = true, value_delimiter = ',')]
    vpn_allowlist: Option<Vec<String>>,

    /// Enable JSON logging format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a telemetry report (JSON file, or stdin when omitted)
    Analyze { file: Option<PathBuf> },

    /// Classify one or more client addresses
    Classify {
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Check a JSON object of form fields for filled honeyfields
    Form { file: Option<PathBuf> },
}

fn init_logging(json: bool, level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    // Results go to stdout, so logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// Apply command-line and environment overrides on top of the file config.
fn apply_overrides(config: &mut RiskSignalsConfig, args: &Args) {
    if let Some(key) = &args.vpnapi_key {
        config.origin.remote_api_key = Some(key.clone());
    }
    if let Some(path) = &args.ipset_path {
        config.origin.offline_dataset = Some(path.clone());
    }
    if let Some(flag) = &args.block_vpn {
        config.origin.enforce = parse_flag(flag);
    }
    if let Some(list) = &args.vpn_allowlist {
        config.origin.allowlist = list
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

fn read_json(file: Option<&Path>) -> Result<Value> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("input is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.json_logs, &args.log_level);

    // Load configuration
    let mut config = match &args.config {
        Some(path) => RiskSignalsConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RiskSignalsConfig::default(),
    };
    apply_overrides(&mut config, &args);

    info!(
        remote = config.origin.remote_credential().is_some(),
        enforce = config.origin.enforce,
        allowlist = config.origin.allowlist.len(),
        "Starting risk-signals agent"
    );

    // Create agent
    let agent = RiskSignalsAgent::new(config)?;

    match &args.command {
        Command::Analyze { file } => {
            let raw = read_json(file.as_deref())?;
            let (result, _signal) = agent.analyze_telemetry(&raw);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Classify { addresses } => {
            for address in addresses {
                let decision = agent.screen_origin(address).await;
                println!("{}", serde_json::to_string(&decision)?);
            }
        }
        Command::Form { file } => {
            let raw = read_json(file.as_deref())?;
            let form = raw
                .as_object()
                .context("form input must be a JSON object")?;
            let output = match agent.check_form_json(form) {
                Some(hit) => json!({ "honeyfield": true, "hit": hit, "signal": hit.to_signal() }),
                None => json!({ "honeyfield": false }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("on"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "zentinel-agent-risk-signals",
            "--vpnapi-key",
            "k",
            "--block-vpn",
            "yes",
            "--vpn-allowlist",
            "10.0.0.0/8, 192.0.2.1",
            "classify",
            "192.0.2.1",
        ]);
        let mut config = RiskSignalsConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.origin.remote_credential(), Some("k"));
        assert!(config.origin.enforce);
        assert_eq!(config.origin.allowlist, vec!["10.0.0.0/8", "192.0.2.1"]);
    }
}
