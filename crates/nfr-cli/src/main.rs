//!
//! Command-line harness for evaluating NFD match rules against a feature
//! snapshot fixture. Not part of the evaluation core: a thin I/O wrapper
//! that reads two YAML files, validates the rule document, and prints the
//! verdict and matched evidence for each rule.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nfr_eval::{Features, RegexCache};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nfr", about = "Evaluate node feature rules against a feature snapshot")]
struct Args {
    /// Path to a rule document (YAML list of rules).
    rules: PathBuf,

    /// Path to a feature snapshot fixture (YAML `Features`).
    features: PathBuf,

    /// Only print rules whose verdict is a match.
    #[arg(long)]
    matches_only: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Dsl(#[from] nfr_dsl::DslError),
    #[error("failed to parse feature snapshot: {0}")]
    FeaturesParse(#[from] serde_yaml::Error),
}

fn read_to_string(path: &PathBuf) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })
}

fn run(args: Args) -> Result<bool, CliError> {
    let rules_src = read_to_string(&args.rules)?;
    let features_src = read_to_string(&args.features)?;

    let (rules, invalid) = nfr_dsl::load_and_validate(&rules_src)?;
    for err in &invalid {
        tracing::warn!(error = %err, "skipping invalid rule");
    }

    let features: Features = serde_yaml::from_str(&features_src)?;
    let cache = RegexCache::default();

    let mut any_matched = false;
    for rule in &rules {
        match nfr_eval::evaluate_with_cache(rule, &features, &cache) {
            Ok((matched, evidence)) => {
                any_matched |= matched;
                if matched {
                    println!("MATCH     {}", rule.name);
                    for (feature, elements) in &evidence {
                        for element in elements {
                            let fields: Vec<String> = element
                                .iter()
                                .map(|(k, v)| format!("{k}={v}"))
                                .collect();
                            println!("  {feature}: {}", fields.join(", "));
                        }
                    }
                } else if !args.matches_only {
                    println!("NO MATCH  {}", rule.name);
                }
            }
            Err(err) => {
                tracing::error!(rule = %rule.name, error = %err, "rule evaluation failed");
                if !args.matches_only {
                    println!("ERROR     {}: {err}", rule.name);
                }
            }
        }
    }

    Ok(any_matched)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(any_matched) => {
            if any_matched {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "nfr failed");
            ExitCode::from(2)
        }
    }
}
