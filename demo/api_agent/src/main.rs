mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use config::ApiAgentConfig;
use tracing::{info, warn};
use trellis_core::{
    ApiOrchestrator, LlmClient, OperationCatalog, RequestsWrapper, UserRequest,
};

/// Answer a natural-language request against an OpenAPI-described HTTP API
#[derive(Parser, Debug)]
#[command(name = "api_agent", version, about)]
struct Cli {
    /// The request, e.g. "add two trending items to my cart"
    #[arg(required = true)]
    request: Vec<String>,

    /// OpenAPI document (JSON or YAML); overrides the configured path
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Authorize DELETE operations the request needs
    #[arg(long)]
    confirm_delete: bool,

    /// Rewrite the answer from the controller results
    #[arg(long)]
    summarize: bool,

    /// Print the whole outcome (phases, plan, traces) as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,trellis_core=info,api_agent=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (defaults + env + optional TOML overlay)
    let mut cfg = ApiAgentConfig::load();
    if let Some(spec) = cli.spec {
        cfg.api.spec_path = spec;
    }
    if cli.summarize {
        cfg.agent.summarize = true;
    }

    info!(target: "api_agent", spec = %cfg.api.spec_path.display(), model = %cfg.llm.model, "Starting API agent");

    let text = std::fs::read_to_string(&cfg.api.spec_path)?;
    let catalog = Arc::new(OperationCatalog::from_openapi_str(&text)?);
    info!(target: "api_agent", base_url = %catalog.base_url, endpoints = catalog.endpoints.len(), "Loaded API description");

    let llm = Arc::new(LlmClient::new(cfg.llm.clone())?);
    let requests = RequestsWrapper::new(&cfg.api.headers, cfg.request_timeout())?;
    let orchestrator = ApiOrchestrator::new(llm, catalog, requests, cfg.orchestrator_config())?;

    let request = UserRequest {
        text: cli.request.join(" "),
        confirmed_deletion: cli.confirm_delete,
    };
    let outcome = orchestrator.run(request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.answer);
    }
    if outcome.needs_confirmation {
        warn!(target: "api_agent", "The plan deletes data the request did not ask to delete");
        eprintln!("This request needs a DELETE. Re-run with --confirm-delete to authorize it.");
    }
    info!(target: "api_agent", phase = ?outcome.phase, "Done");
    Ok(())
}
