//! `tca` - run the coverage auditing pipeline for one requirement

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tca_core::{
    standard_registry, validate_req_id, CoverageReport, Orchestrator, PipelineConfig, RunStatus,
};
use tca_model::OpenAiCompatibleClient;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("tca")
        .version(tca_core::VERSION)
        .about("Requirement test-coverage auditor")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file (defaults apply when absent)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Audit coverage of one requirement and write reports")
                .arg(
                    Arg::new("req-id")
                        .required(true)
                        .value_parser(parse_req_id)
                        .help("Requirement identifier, e.g. SKYRADAR-ARR-044"),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Report directory (overrides report.output_dir)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the JSON report to stdout"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate configuration and model capabilities"),
        )
}

fn parse_req_id(raw: &str) -> Result<String, String> {
    validate_req_id(raw).map_err(|e| e.to_string())?;
    Ok(raw.to_string())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<PipelineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

async fn run(config: PipelineConfig, args: &ArgMatches) -> anyhow::Result<RunStatus> {
    let req_id = args
        .get_one::<String>("req-id")
        .context("missing requirement id")?;
    let output_dir = args
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| config.report.output_dir.clone());

    let model = OpenAiCompatibleClient::from_settings(config.model.clone())
        .context("creating model client")?;
    let orchestrator = Orchestrator::from_config(&config, Arc::new(model), None)?;
    tracing::info!(req_id, output_dir = %output_dir.display(), "starting coverage audit");

    let state = orchestrator.run(req_id).await;
    let report = CoverageReport::from_state(&state);
    let written = report
        .write_to(&output_dir)
        .await
        .with_context(|| format!("writing reports to {}", output_dir.display()))?;

    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        println!(
            "{req_id}: {}/{} test cases covered ({:.1}%), score {}/10, {} false positive(s)",
            report.summary.covered,
            report.summary.total,
            report.summary.percentage,
            report.summary.score,
            report.false_positives.len()
        );
        for error in &report.errors {
            println!("  error: {error}");
        }
        for path in &written {
            println!("  wrote {}", path.display());
        }
    }
    Ok(report.status)
}

fn check_config(config: &PipelineConfig) -> anyhow::Result<()> {
    config.validate()?;
    let registry = standard_registry()?;
    println!("configuration valid");
    println!("  model: {} at {}", config.model.model, config.model.endpoint());
    println!("  scenarios: {}", config.scenarios.root.display());
    println!(
        "  retry: up to {} retries, at most {:?} of backoff per call",
        config.retry.max_retries,
        config.retry.worst_case_delay()
    );
    println!("  capabilities: {}", registry.names().join(", "));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("run", args)) => {
            let status = run(config, args).await?;
            if status == RunStatus::Failed {
                std::process::exit(1);
            }
        }
        Some(("check-config", _)) => check_config(&config)?,
        Some((other, _)) => anyhow::bail!("unknown command '{other}'"),
        None => anyhow::bail!("no command given"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn run_parses_requirement_and_output() {
        let matches = cli()
            .try_get_matches_from(["tca", "--log-json", "run", "REQ-1", "-o", "out"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert_eq!(args.get_one::<String>("req-id").unwrap(), "REQ-1");
        assert_eq!(args.get_one::<PathBuf>("output-dir").unwrap(), &PathBuf::from("out"));
    }

    #[test]
    fn path_like_requirement_ids_are_rejected() {
        for bad in ["../x", "a/b", ".."] {
            let err = cli().try_get_matches_from(["tca", "run", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let matches = cli().try_get_matches_from(["tca", "check-config"]).unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.retry.max_retries, 3);
    }
}
