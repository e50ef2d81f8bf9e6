use anyhow::{Context as _, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use ev_core::{EmbedVecConfig, PartialEmbeddingPolicy};
use ev_embed::{EmbeddingClient, MockEmbeddingClient, OpenAiEmbeddingClient};
use ev_pipeline::{scenario, Pipeline, PipelineOptions};
use ev_vectordb::{IndexManager, MemoryBackend, PineconeBackend, VectorBackend, VectorStore};

mod cli;

use clap::Parser as _;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,embedvec=info,ev_pipeline=info,ev_vectordb=info,ev_embed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = EmbedVecConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Commands::Run {
            model,
            index,
            top_k,
            include_values,
            concurrency,
            timeout_secs,
            proceed_on_partial,
            probe,
            offline,
        } => {
            if let Some(model) = model {
                config.embedding.model = model;
            }
            if let Some(index) = index {
                config.store.index_name = index;
            }
            if let Some(top_k) = top_k {
                config.query.top_k = top_k;
            }
            if let Some(include_values) = include_values {
                config.query.include_values = include_values;
            }
            if let Some(concurrency) = concurrency {
                config.embedding.concurrency = concurrency;
            }
            if let Some(secs) = timeout_secs {
                config.pipeline.stage_timeout_secs = secs;
            }
            if proceed_on_partial {
                config.pipeline.partial_policy = PartialEmbeddingPolicy::ProceedWithSubset;
            }
            handle_run(&config, probe, offline).await
        }
        Commands::Indexes => handle_indexes(&config).await,
    }
}

async fn handle_run(config: &EmbedVecConfig, probe: bool, offline: bool) -> Result<ExitCode> {
    let (embedder, backend): (Arc<dyn EmbeddingClient>, Arc<dyn VectorBackend>) = if offline {
        tracing::info!("offline run: deterministic embeddings, in-memory store");
        (Arc::new(MockEmbeddingClient::new()), Arc::new(MemoryBackend::new()))
    } else {
        (
            Arc::new(OpenAiEmbeddingClient::from_config(config)?),
            Arc::new(PineconeBackend::from_config(config)?),
        )
    };

    let pipeline = Pipeline::new(
        embedder,
        Arc::new(IndexManager::new(backend.clone())),
        Arc::new(VectorStore::new(backend)),
        PipelineOptions::from_config(config),
    );
    let request = if probe {
        scenario::literary_probe_request()
    } else {
        scenario::literary_request()
    };

    let report = pipeline.run(&request).await;
    println!("{}", report.to_json_pretty()?);

    match report.failure() {
        None => Ok(ExitCode::SUCCESS),
        Some(failure) => {
            tracing::error!(stage = %failure.stage, kind = failure.kind, "{}", failure.message);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn handle_indexes(config: &EmbedVecConfig) -> Result<ExitCode> {
    let backend: Arc<dyn VectorBackend> = Arc::new(PineconeBackend::from_config(config)?);
    let indexes = IndexManager::new(backend).list_indexes().await?;
    println!("{}", serde_json::to_string_pretty(&indexes)?);
    Ok(ExitCode::SUCCESS)
}
