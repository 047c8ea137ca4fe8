use anyhow::{bail, Context};
use clap::{Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracefork_core::{tree_depth, TraceExecution};
use tracefork_engine::{
    AlternativeRequest, EngineConfig, HeaderScopeResolver, RequestContext, TraceForkService,
};
use tracing_subscriber::EnvFilter;

fn trace_arg() -> Arg {
    Arg::new("trace")
        .long("trace")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Trace execution JSON file")
}

fn alternative_args(cmd: Command) -> Command {
    cmd.arg(trace_arg())
        .arg(
            Arg::new("node")
                .long("node")
                .required(true)
                .help("Decision node to fork at"),
        )
        .arg(
            Arg::new("alternative")
                .long("alternative")
                .required(true)
                .help("Alternative outcome to select"),
        )
}

fn cli() -> Command {
    Command::new("tracefork")
        .version(tracefork_engine::VERSION)
        .about("Fork and compare recorded agent decision traces")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(alternative_args(
            Command::new("compare")
                .about("Compare the recorded path against an alternative outcome"),
        ))
        .subcommand(alternative_args(
            Command::new("fork")
                .about("Fork the trace at a node and wait for the scoped re-execution"),
        ))
        .subcommand(
            Command::new("show")
                .about("Summarize a trace file")
                .arg(trace_arg()),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let Some((command, args)) = matches.subcommand() else {
        bail!("a subcommand is required");
    };
    let config_path = args
        .get_one::<PathBuf>("config")
        .or_else(|| matches.get_one::<PathBuf>("config"));
    let config = EngineConfig::load(config_path.map(PathBuf::as_path))?;

    match command {
        "compare" => {
            let (service, ctx, body) = prepare(&config, args)?;
            let comparison = service.compare(&ctx, &body)?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        "fork" => {
            let (service, ctx, body) = prepare(&config, args)?;
            let handle = service.submit_fork(&ctx, &body)?;
            tracing::info!(fork_id = handle.fork_id(), "waiting for fork");
            let Some(job) = handle.completion().await else {
                bail!("fork run ended without a final state");
            };
            let execution = match job.fork_execution_id.as_deref() {
                Some(id) => Some(service.get_trace(&ctx, id)?),
                None => None,
            };
            let output = serde_json::json!({ "fork": job, "execution": execution.as_deref() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "show" => {
            let execution = read_trace(trace_path(args)?)?;
            let (cost, duration) = execution.totals();
            println!("execution: {}", execution.execution_id);
            println!("agent:     {}", execution.agent_id);
            println!("status:    {:?}", execution.status);
            println!("nodes:     {}", execution.node_count());
            println!("depth:     {}", tree_depth(&execution.root_decisions));
            println!("cost:      {cost:.4}");
            println!("duration:  {duration:.3}s");
        }
        other => bail!("unknown subcommand {other}"),
    }
    Ok(())
}

/// Load the trace into a fresh in-memory service scoped to the default project
fn prepare(
    config: &EngineConfig,
    args: &ArgMatches,
) -> anyhow::Result<(TraceForkService, RequestContext, String)> {
    let execution = read_trace(trace_path(args)?)?;
    let project = config.default_project_id.clone();
    let service = TraceForkService::in_memory(config, HeaderScopeResolver::from_config(config));

    let request = AlternativeRequest::new(
        execution.execution_id.as_str(),
        arg(args, "node")?,
        arg(args, "alternative")?,
    );
    service.executions().upsert(execution, Some(&project));

    let body = serde_json::to_string(&request)?;
    Ok((service, RequestContext::for_project(project), body))
}

fn trace_path(args: &ArgMatches) -> anyhow::Result<&Path> {
    args.get_one::<PathBuf>("trace")
        .map(PathBuf::as_path)
        .context("--trace is required")
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("--{name} is required"))
}

fn read_trace(path: &Path) -> anyhow::Result<TraceExecution> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a trace execution", path.display()))
}
