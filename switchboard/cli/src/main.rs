//! Switchboard - Adaptive LLM Router CLI
//!
//! One-shot front end over `switchboard-core`: send a prompt through the
//! router, or inspect provider status and live metrics.
//!
//! # Usage
//!
//! ```bash
//! # Let the router pick a provider
//! switchboard generate "Explain backpressure in one paragraph"
//!
//! # Ask for a specific provider and model, print the full response as JSON
//! switchboard generate --provider groq --model llama-3.1-8b-instant --json "Hi"
//!
//! # Provider readiness and metrics
//! switchboard status
//! switchboard metrics
//!
//! # Custom config and a tighter deadline
//! switchboard --config ./switchboard.toml --timeout 10 generate "Hi"
//!
//! # Point at another Ollama server
//! switchboard --ollama-url http://gpu-box:11434 status
//!
//! # Verbose logging
//! RUST_LOG=debug switchboard generate "Hi"
//! ```
//!
//! # Exit Codes
//!
//! - `0`: success
//! - `2`: the request or its credentials were rejected
//! - `3`: no provider could serve the request

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use switchboard_core::{
    load_config_from_path, AdaptiveRouter, ConfigOverrides, ErrorClass, ProviderSet,
    RequestedProvider, RouteRequest, RouterError, DEFAULT_TEMPERATURE,
};

/// Exit code for requests rejected as the caller's fault
const EXIT_CLIENT_FAULT: u8 = 2;

/// Exit code when every attempted provider was unavailable
const EXIT_SERVICE_UNAVAILABLE: u8 = 3;

/// Switchboard - Adaptive multi-provider LLM router
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, global = true, env = "SWITCHBOARD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-call deadline in seconds
    #[arg(short = 't', long, global = true, value_name = "SECS")]
    timeout: Option<f64>,

    /// Ollama server address (overrides config and `OLLAMA_BASE_URL`)
    #[arg(long, global = true, value_name = "URL")]
    ollama_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a prompt through the router
    Generate {
        /// Provider to use: auto, openai, groq, gemini or ollama
        #[arg(short = 'p', long, default_value = "auto")]
        provider: RequestedProvider,

        /// Model name passed to the provider
        #[arg(short = 'm', long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Prompt text
        #[arg(value_name = "PROMPT")]
        prompt: String,
    },

    /// Print provider readiness as JSON
    Status,

    /// Print per-provider metrics as JSON
    Metrics,
}

/// Initialize logging on stderr so stdout stays machine-readable
fn init_logging() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new("switchboard_core=info,switchboard=info")
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn overrides(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if let Some(secs) = cli.timeout {
        overrides = overrides.with_request_timeout_secs(secs);
    }
    if let Some(ref url) = cli.ollama_url {
        overrides = overrides.with_ollama_base_url(url.clone());
    }
    overrides
}

fn build_router(cli: &Cli) -> Result<AdaptiveRouter> {
    let mut config =
        load_config_from_path(cli.config.clone()).context("Failed to load configuration")?;

    overrides(cli)
        .apply(&mut config)
        .context("Invalid command-line override")?;

    info!(
        source = ?config.source(),
        path = ?config.config_file_path,
        timeout_secs = config.router.request_timeout.as_secs_f64(),
        "Configuration loaded"
    );

    let providers = ProviderSet::from_settings(&config.providers);
    Ok(AdaptiveRouter::new(providers, config.router))
}

fn exit_code_for(err: &RouterError) -> u8 {
    match err.kind() {
        ErrorClass::ClientFault => EXIT_CLIENT_FAULT,
        ErrorClass::ServiceUnavailable => EXIT_SERVICE_UNAVAILABLE,
    }
}

async fn run(router: &AdaptiveRouter, command: Command) -> Result<ExitCode> {
    match command {
        Command::Generate {
            provider,
            model,
            temperature,
            json,
            prompt,
        } => {
            let mut request = RouteRequest::new(prompt)
                .with_provider(provider)
                .with_temperature(temperature);
            if let Some(model) = model {
                request = request.with_model(model);
            }

            match router.route(request).await {
                Ok(response) if json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(response) => {
                    println!("{}", response.text);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    let label = match err.kind() {
                        ErrorClass::ClientFault => "request rejected",
                        ErrorClass::ServiceUnavailable => "service unavailable",
                    };
                    error!(provider = %err.provider(), error = %err, "Generation failed");
                    eprintln!("switchboard: {label}: {err}");
                    Ok(ExitCode::from(exit_code_for(&err)))
                }
            }
        }
        Command::Status => {
            let report = router.provider_statuses().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Metrics => {
            let snapshots = router.metrics_snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;

    let router = build_router(&cli)?;
    let outcome = run(&router, cli.command).await;
    router.shutdown().await;
    outcome
}
