//! Metaculus Forecasting Bot CLI
//!
//! Invoked once per day by an external scheduler; forecasts every open
//! question in the configured tournament and reports the outcome by email.

use anyhow::Result;
use clap::{Parser, Subcommand};
use metaculus_bot::{
    Aggregator, ChatModel, Checkpoint, Config, EmailNotifier, ForecastSampler, MetaculusClient,
    PerplexityModel, Pipeline, Platform, ProxyChatModel, RetryConfig, RunReport,
};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "metaculus-bot")]
#[command(about = "Forecasting bot for Metaculus tournaments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full forecast-and-submit pipeline once
    Run {
        /// Force submission off regardless of configuration
        #[arg(long)]
        dry_run: bool,
    },

    /// List the open questions for the configured tournament
    Questions {
        /// Maximum number of questions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the processed-question checkpoint
    Checkpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run { dry_run } => run_pipeline(&config, dry_run).await?,
        Commands::Questions { limit } => list_questions(&config, limit).await?,
        Commands::Checkpoint => show_checkpoint(&config)?,
    }

    Ok(())
}

async fn run_pipeline(config: &Config, dry_run: bool) -> Result<()> {
    let mut config = config.clone();
    if dry_run {
        config.submit_predictions = false;
    }

    println!("\n{}", "=".repeat(70));
    println!("  METACULUS FORECAST RUN");
    println!(
        "  Tournament: {} | Samples: {} | Submit: {} | Research: {}",
        config.tournament_id,
        config.samples_per_question,
        if config.submit_predictions { "YES" } else { "NO - DRY RUN" },
        if config.research_enabled() { "ENABLED" } else { "DISABLED" }
    );
    println!("{}\n", "=".repeat(70));

    let retry = RetryConfig::default();

    let platform: Arc<dyn Platform> = Arc::new(MetaculusClient::new(&config, retry.clone()));
    let forecast_model: Arc<dyn ChatModel> =
        Arc::new(ProxyChatModel::new(config.metac_token.clone()));
    let research_model: Option<Arc<dyn ChatModel>> = if config.research_enabled() {
        config
            .perplexity_api_key
            .clone()
            .map(|key| Arc::new(PerplexityModel::new(key)) as Arc<dyn ChatModel>)
    } else {
        None
    };

    let sampler = ForecastSampler::new(
        forecast_model.clone(),
        retry.clone(),
        config.samples_per_question,
    );
    let aggregator = Aggregator::new(forecast_model, retry.clone());
    let checkpoint = Checkpoint::load(&config.checkpoint_path)?;

    let mut pipeline = Pipeline::new(
        platform,
        research_model,
        sampler,
        aggregator,
        checkpoint,
        retry,
        &config,
    );

    let notifier = config.email.clone().map(EmailNotifier::new);

    match pipeline.run_once().await {
        Ok(report) => {
            println!("\n{}", report.render());
            if let Some(notifier) = &notifier {
                notifier.send_run_report(&report).await;
            }
            Ok(())
        }
        Err(err) => {
            error!("Run aborted: {:#}", err);
            if let Some(notifier) = &notifier {
                let mut report = RunReport::default();
                report.record_failure(0, &err);
                notifier.send_run_report(&report).await;
            }
            // Non-zero exit so the scheduler sees the failure
            Err(err)
        }
    }
}

async fn list_questions(config: &Config, limit: usize) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  OPEN QUESTIONS - Tournament {}", config.tournament_id);
    println!("{}\n", "=".repeat(70));

    let platform = MetaculusClient::new(config, RetryConfig::default());
    let questions = platform.list_open_questions().await?;

    if questions.is_empty() {
        println!("No open questions found.\n");
        return Ok(());
    }

    for (i, question) in questions.iter().take(limit).enumerate() {
        println!("{}. [{}] {}", i + 1, question.id, question.short_title(70));
        println!("   {}", question.url());
    }

    if questions.len() > limit {
        println!("\n   ... and {} more", questions.len() - limit);
    }

    println!();
    Ok(())
}

fn show_checkpoint(config: &Config) -> Result<()> {
    let checkpoint = Checkpoint::load(&config.checkpoint_path)?;

    println!("\n{}", "=".repeat(70));
    println!("  CHECKPOINT - {}", config.checkpoint_path);
    println!("{}\n", "=".repeat(70));

    if checkpoint.is_empty() {
        println!("No questions processed yet.\n");
        return Ok(());
    }

    println!("Processed questions: {}", checkpoint.len());
    for id in checkpoint.ids() {
        println!("  {}", id);
    }
    println!();

    Ok(())
}
