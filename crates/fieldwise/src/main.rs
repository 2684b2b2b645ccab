mod client;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fieldwise_core::{
    ExtractionConfig, ExtractionPipeline, FieldSchema, ProgressEvent, ProgressSink, RateLimiter,
    RetryingBoundary,
};

use client::HttpModelClient;

#[derive(Parser)]
#[command(name = "fw", about = "Structured field extraction from documents", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract lease fields from a plain-text document
    Extract {
        /// Path to the document text file
        file: PathBuf,
        /// Confidence below which fields get a refinement pass
        #[arg(long, default_value_t = 0.70)]
        threshold: f64,
        /// Skip the refinement pass entirely
        #[arg(long)]
        no_refine: bool,
        /// Model API requests allowed per second
        #[arg(long, default_value_t = 2.0, value_parser = parse_positive_rate)]
        rate: f64,
        /// Model API endpoint
        #[arg(long, default_value = "https://api.anthropic.com/v1/messages")]
        endpoint: String,
        /// Model identifier
        #[arg(long, default_value = "claude-sonnet-4-20250514")]
        model: String,
        /// Emit compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Print the extraction field schema
    Schema,
}

fn parse_positive_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err("rate must be a positive number of requests per second".to_string())
    }
}

struct StderrProgress;

#[async_trait::async_trait]
impl ProgressSink for StderrProgress {
    async fn report(&self, event: ProgressEvent) {
        eprintln!("[{:>3}%] {}: {}", event.percent, event.stage.label(), event.detail);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract {
            file,
            threshold,
            no_refine,
            rate,
            endpoint,
            model,
            compact,
        } => extract(file, threshold, no_refine, rate, &endpoint, &model, compact).await,
        Commands::Schema => {
            println!("{}", FieldSchema::lease().prompt_block());
            Ok(())
        }
    }
}

async fn extract(
    file: PathBuf,
    threshold: f64,
    no_refine: bool,
    rate: f64,
    endpoint: &str,
    model: &str,
    compact: bool,
) -> Result<()> {
    let document_text = std::fs::read_to_string(&file)
        .with_context(|| format!("reading document {}", file.display()))?;

    let api_key = std::env::var("FIELDWISE_API_KEY")
        .context("FIELDWISE_API_KEY environment variable is not set")?;

    let config = ExtractionConfig {
        confidence_threshold: threshold,
        enable_refinement: !no_refine,
        ..Default::default()
    };

    let inner = HttpModelClient::new(endpoint, model, api_key, config.request_timeout)?;
    let boundary = RetryingBoundary::new(
        inner,
        RateLimiter::new(1, rate),
        config.request_timeout,
        config.max_retries,
        config.initial_backoff,
    );

    let pipeline = ExtractionPipeline::new(Arc::new(boundary), FieldSchema::lease(), config)?
        .with_progress(Arc::new(StderrProgress));

    let result = pipeline.run(&document_text, &[]).await?;
    tracing::info!(
        cost = result.metadata.total_cost,
        refined = result.metadata.refined_fields.len(),
        warnings = result.warnings.len(),
        "extraction finished"
    );

    let rendered = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{rendered}");

    Ok(())
}
