//! Command-line front end: runs one build and prints its progress.
//!
//! Hosting providers are not wired in, so deployments end in the local
//! fallback with run instructions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use buildflow::artifacts::{CodeBundle, Tone};
use buildflow::client::HttpModelInvoker;
use buildflow::contracts::coerce_variant;
use buildflow::prelude::*;
use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "buildflow", about = "Turn a description into a deployed agent")]
struct Cli {
    /// What the agent should do
    description: String,

    /// JSON configuration file
    #[arg(short, long, env = "BUILDFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Agent name override
    #[arg(long)]
    name: Option<String>,

    /// Personality override (professional, friendly, casual, ...)
    #[arg(long)]
    tone: Option<String>,

    /// Deployment provider to try; repeat for a fallback order
    #[arg(long = "provider")]
    providers: Vec<String>,

    /// Suppress the rate-limit countdown (own API key)
    #[arg(long)]
    unmetered: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "BUILDFLOW_LOG_JSON")]
    log_json: bool,

    /// Print every event as a JSON line instead of a summary
    #[arg(long)]
    events_json: bool,
}

/// Deploys nowhere; health checks are plain GETs.
#[derive(Debug, Default)]
struct UnhostedDeployer {
    http: reqwest::Client,
}

#[async_trait]
impl Deployer for UnhostedDeployer {
    async fn deploy(&self, _bundle: &CodeBundle, provider: &str) -> Result<Value, BuildflowError> {
        Err(BuildflowError::Deployment(format!(
            "No credentials configured for {provider}"
        )))
    }

    async fn health_check(&self, endpoint: &str) -> bool {
        self.http
            .get(endpoint)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn teardown(&self, _deployment_id: &str) -> Result<(), BuildflowError> {
        Ok(())
    }
}

fn options(cli: &Cli) -> BuildOptions {
    let mut options = BuildOptions::new();
    if let Some(name) = &cli.name {
        options = options.with_name(name);
    }
    if let Some(tone) = &cli.tone {
        options = options.with_tone(coerce_variant::<Tone>(tone));
    }
    if !cli.providers.is_empty() {
        options = options.with_providers(cli.providers.iter().cloned());
    }
    if cli.unmetered {
        options = options.with_unmetered(true);
    }
    options
}

fn summary(event: &ProgressEvent) -> Option<String> {
    match event.kind {
        EventKind::StageStarted => Some(format!("==> {}", event.stage)),
        EventKind::StageComplete => Some(format!(
            "    {} done in {:.0} ms",
            event.stage,
            event.payload["durationMs"].as_f64().unwrap_or_default()
        )),
        EventKind::StageError => Some(format!(
            "!!  {} failed: {}",
            event.stage,
            event.message().unwrap_or_default()
        )),
        EventKind::Progress => event.message().map(|m| format!("    {m}")),
        EventKind::TestResult => Some(format!(
            "    test {} {}",
            event.payload["name"].as_str().unwrap_or_default(),
            if event.payload["passed"].as_bool().unwrap_or(false) {
                "passed"
            } else {
                "failed"
            }
        )),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::new(),
    };
    let invoker = Arc::new(HttpModelInvoker::from_env(config.model.clone()));
    let orchestrator = Orchestrator::builder(invoker, Arc::new(UnhostedDeployer::default()))
        .config(config)
        .event_sink(Arc::new(LoggingEventSink::debug()))
        .build()?;

    let mut events = orchestrator.start_build(&cli.description, options(&cli));
    let build_id = events.build_id();
    info!(build_id = %build_id, "Build started");

    let canceller = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(build_id = %build_id, "Interrupted");
            let _ = canceller.cancel_build(build_id);
        }
    });

    while let Some(event) = events.next().await {
        if cli.events_json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let Some(line) = summary(&event) {
            println!("{line}");
        }
    }

    let build = orchestrator
        .build(build_id)
        .context("build disappeared from the registry")?;
    if let Some(failure) = &build.last_error {
        anyhow::bail!("{} failed: {}", failure.stage, failure.message);
    }
    if build.cancelled {
        anyhow::bail!("build cancelled");
    }
    if let Some(ui) = &build.artifacts.ui {
        println!("Interface: {}", ui.public_url.as_deref().unwrap_or_default());
    }
    if let Some(deployment) = &build.artifacts.deployment {
        for step in &deployment.local_instructions {
            println!("  {step}");
        }
    }
    Ok(())
}
