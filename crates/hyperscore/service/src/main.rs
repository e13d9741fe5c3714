//! Hyperscore daemon CLI
//!
//! Bootstraps the service (configuration, logging, seed data) over the
//! in-memory store and prints the result of one facade operation as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hyperscore_service::{check_scoring_body, HypergraphService, ServiceConfig};
use hyperscore_storage::{CatalogStore, InMemoryCatalogStore, TimeoutStore};
use hyperscore_types::{HypergraphId, Parameters};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hyperscore CLI
#[derive(Parser)]
#[command(name = "hyperscored")]
#[command(about = "Hyperscore - rule scoring and scheme evaluation", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HYPERSCORE_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "HYPERSCORE_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HYPERSCORE_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List elements grouped by type, or the elements of one type
    Elements {
        #[arg(long = "type")]
        element_type: Option<String>,
    },

    /// List rules
    Rules,

    /// List standalone schemes, or the schemes of a hypergraph
    Schemes {
        /// Hypergraph id or name
        #[arg(long)]
        hypergraph: Option<String>,
    },

    /// List hypergraph summaries
    Hypergraphs,

    /// Evaluate one scheme
    Evaluate {
        scheme: String,
        #[arg(long)]
        hypergraph: Option<String>,
    },

    /// Evaluate every scheme in a scope
    EvaluateAll {
        #[arg(long)]
        hypergraph: Option<String>,
    },

    /// Rule to element hyperedges
    RuleHyperedges,

    /// Scheme to rule hyperedges
    SchemeHyperedges,

    /// Score one rule against one element
    Preview {
        /// Rule id, name or slug of name
        rule: String,
        element: String,
        /// Parameter override `key=value`; values are parsed as JSON when possible
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,
    },

    /// Compile a scoring body and report diagnostics
    Check { file: PathBuf },
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Accept a hypergraph id or its exact name
async fn resolve_hypergraph<S: CatalogStore>(
    service: &HypergraphService<S>,
    reference: Option<&str>,
) -> anyhow::Result<Option<HypergraphId>> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    let found = service
        .list_hypergraphs()
        .await?
        .into_iter()
        .find(|h| h.id.as_str() == reference || h.name == reference)
        .with_context(|| format!("hypergraph not found: {}", reference))?;
    Ok(Some(found.id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Initialize tracing; logs go to stderr so stdout stays JSON
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if let Command::Check { file } = &cli.command {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let diagnostics = check_scoring_body(&source);
        print_json(&diagnostics)?;
        if !diagnostics.ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    let store = TimeoutStore::new(InMemoryCatalogStore::new(), config.storage.timeout());
    let (service, report) = HypergraphService::bootstrap(store, config).await?;
    tracing::info!(
        elements = report.elements_loaded,
        rules = report.rules_loaded,
        "Hyperscore ready"
    );

    match cli.command {
        Command::Elements { element_type } => match element_type {
            Some(element_type) => print_json(&service.list_elements_by_type(&element_type).await?)?,
            None => print_json(&service.list_elements().await?)?,
        },
        Command::Rules => print_json(&service.list_rules().await?)?,
        Command::Schemes { hypergraph } => {
            let hypergraph = resolve_hypergraph(&service, hypergraph.as_deref()).await?;
            print_json(&service.list_schemes(hypergraph.as_ref()).await?)?
        }
        Command::Hypergraphs => print_json(&service.list_hypergraphs().await?)?,
        Command::Evaluate { scheme, hypergraph } => {
            let hypergraph = resolve_hypergraph(&service, hypergraph.as_deref()).await?;
            print_json(&service.evaluate_scheme(hypergraph.as_ref(), &scheme).await?)?
        }
        Command::EvaluateAll { hypergraph } => {
            let hypergraph = resolve_hypergraph(&service, hypergraph.as_deref()).await?;
            print_json(&service.evaluate_all_schemes(hypergraph.as_ref()).await?)?
        }
        Command::RuleHyperedges => print_json(&service.rule_element_hyperedges().await?)?,
        Command::SchemeHyperedges => print_json(&service.scheme_rule_hyperedges().await?)?,
        Command::Preview {
            rule,
            element,
            params,
        } => {
            let overrides: Parameters = params.into_iter().collect();
            print_json(&service.preview_rule(&rule, &element, &overrides).await?)?
        }
        Command::Check { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("threshold=4.5").unwrap(),
            ("threshold".to_string(), serde_json::json!(4.5))
        );
        assert_eq!(
            parse_param("season=秋").unwrap(),
            ("season".to_string(), serde_json::json!("秋"))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hyperscored",
            "evaluate",
            "经济型旅游",
            "--hypergraph",
            "旅游规划超图",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Evaluate { .. }));
    }
}
