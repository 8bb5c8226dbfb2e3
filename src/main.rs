use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use hookflow::{Config, EngineBuilder, HookflowError, Result, WorkflowModel, build_runtime, server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hookflow", version, about = "Trigger dispatch and workflow execution server")]
struct Args {
    /// TOML config file, defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of workflow JSON documents deployed at start-up
    #[arg(short, long)]
    workflows: Option<PathBuf>,
}

fn load_workflows(dir: &PathBuf) -> Result<Vec<WorkflowModel>> {
    let mut workflows = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let text = std::fs::read_to_string(&path)?;
        match WorkflowModel::from_json(&text) {
            Ok(wf) => workflows.push(wf),
            Err(err) => warn!("skipping {:?}: {}", path, err),
        }
    }
    Ok(workflows)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"))).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::create(path)?,
        None => Config::default(),
    };

    let runtime = build_runtime(&config)?;
    runtime.block_on(async move {
        let engine = Arc::new(EngineBuilder::new().config(config).handle(tokio::runtime::Handle::current()).build()?);
        if let Some(dir) = &args.workflows {
            for wf in load_workflows(dir)? {
                engine.deploy(&wf).map_err(|e| HookflowError::Workflow(format!("failed to deploy {}: {}", wf.id, e)))?;
                info!("deployed workflow {}", wf.id);
            }
        }
        server::serve(engine).await
    })
}
