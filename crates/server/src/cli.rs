//! CLI argument parsing and subcommand dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use mcqgen_core::Config;

use crate::api::GenerateResponse;
use crate::pipeline::PipelineRequest;
use crate::{app_config, router};

/// Generate multiple-choice questions from PDF documents.
#[derive(Parser, Debug)]
#[command(name = "mcqgen-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve {
        /// Bind address, overrides HOST.
        #[arg(long)]
        host: Option<String>,
        /// Listen port, overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the pipeline once on a local PDF and print the questions.
    Generate {
        /// Path to the PDF.
        pdf: PathBuf,
        /// Number of questions.
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,
        /// Topic to retrieve context for, instead of the whole document.
        #[arg(short, long)]
        query: Option<String>,
        /// API key for the configured LLM provider.
        #[arg(long, hide_env_values = true, env = "MCQGEN_API_KEY")]
        api_key: Option<String>,
        /// Print the full JSON response instead of the raw text.
        #[arg(long)]
        json: bool,
    },
}

/// Run the parsed command.
pub async fn dispatch(config: Config, command: Option<Command>) -> anyhow::Result<()> {
    match command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Generate {
            pdf,
            count,
            query,
            api_key,
            json,
        } => generate(config, pdf, count, query, api_key, json).await,
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.log_summary();

    let state = Arc::new(app_config::build_state(config, None)?);
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    info!("API docs at http://{}/docs", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn generate(
    config: Config,
    pdf: PathBuf,
    count: u32,
    query: Option<String>,
    api_key: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let pdf_bytes = tokio::fs::read(&pdf)
        .await
        .with_context(|| format!("failed to read {}", pdf.display()))?;
    let filename = pdf
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);

    let state = app_config::build_state(config, api_key)?;
    let output = state
        .pipeline
        .run(PipelineRequest {
            pdf_bytes,
            num_mcqs: count,
            query,
            filename,
        })
        .await?;

    if json {
        let response = GenerateResponse::from(output);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", output.mcqs);
    }
    Ok(())
}
