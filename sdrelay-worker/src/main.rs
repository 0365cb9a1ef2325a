//! sdrelay Worker
//!
//! A stateless serverless worker that forwards jobs to a Stable Diffusion
//! WebUI running next to it.
//!
//! Architecture:
//! - Configuration: environment variables with defaults, plus CLI flags
//! - Readiness gate: blocks until the WebUI answers its health endpoint
//! - Service: the dispatcher routing each job to one WebUI call
//! - Job sources: queue poller, one-shot test input, or local HTTP API

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdrelay_client::{QueueClient, RetryPolicy, WebUiClient};
use sdrelay_worker::api;
use sdrelay_worker::config::Config;
use sdrelay_worker::mode::{ModeArgs, RunMode};
use sdrelay_worker::readiness::{ReadinessConfig, wait_for_service};
use sdrelay_worker::scheduler::{QueuePoller, run_job};
use sdrelay_worker::service::{Dispatcher, JobHandler};

#[derive(Parser)]
#[command(name = "sdrelay-worker")]
#[command(about = "Serverless worker forwarding jobs to a Stable Diffusion WebUI", long_about = None)]
struct Cli {
    /// Run a single job envelope (JSON) and print its output
    #[arg(long, env = "TEST_INPUT")]
    test_input: Option<String>,

    /// Serve the local HTTP API instead of polling a queue
    #[arg(long, env = "SERVE_API")]
    serve_api: bool,

    /// Local API bind host
    #[arg(long, env = "API_HOST", default_value = "127.0.0.1")]
    api_host: String,

    /// Local API bind port
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    api_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sdrelay_worker=info,sdrelay_client=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting sdrelay worker");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: worker_id={}, webui_url={}",
        config.worker_id, config.webui_url
    );

    // Pick the job source before waiting on the WebUI
    let mode = RunMode::resolve(
        &ModeArgs {
            test_input: cli.test_input,
            serve_api: cli.serve_api,
            api_host: cli.api_host,
            api_port: cli.api_port,
        },
        config.queue.clone(),
    )?;

    let client = WebUiClient::new(config.webui_url.clone(), RetryPolicy::default());

    // Block until the WebUI is up
    let readiness = ReadinessConfig {
        max_wait: config.readiness_max_wait,
        ..ReadinessConfig::default()
    };
    wait_for_service(&client, &readiness)
        .await
        .context("WebUI did not become ready")?;
    info!("WebUI API Service is ready. Starting job processing");

    let handler: Arc<dyn JobHandler> = Arc::new(Dispatcher::new(client));

    match mode {
        RunMode::TestInput(job) => {
            let output = run_job(handler, job).await;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        RunMode::ServeApi(addr) => api::serve(addr, handler).await,
        RunMode::Poll(endpoints) => {
            let queue = Arc::new(QueueClient::new(endpoints, config.worker_id.clone()));
            let poller = QueuePoller::new(config, queue, handler);

            info!("Starting job polling loop");
            poller.run().await
        }
    }
}

/// Loads configuration from environment variables and validates it
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}
