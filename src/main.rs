//! RAG Retrieval Eval CLI
//!
//! Scores retrieval results and evaluates RAG pipelines against ground truth.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_retrieval_eval::{
    config::Config,
    eval::{BatchReport, Dataset, LlmGenerator, LlmJudge, RagEvaluator, create_sample_dataset},
    llm::LlmClient,
    metrics::MetricsCalculator,
    quality::QualityScorer,
    retrieval::{
        FixtureSearchBackend, HttpReranker, HttpSearchBackend, SearchBackend, SearchHit,
        score_hits,
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// RAG Retrieval Eval - score retrieval quality and ground-truth metrics
#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a set of search hits (JSON array of {content, id, distance})
    Score {
        /// Path to the hits file
        hits: PathBuf,

        /// Treat the file as a query -> hits map and score this query
        #[arg(short, long)]
        query: Option<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute precision, recall and MRR from ID lists
    Metrics {
        /// Retrieved IDs in rank order, comma separated
        #[arg(long, value_delimiter = ',')]
        retrieved: Vec<String>,

        /// Relevant IDs, comma separated
        #[arg(long, value_delimiter = ',')]
        relevant: Vec<String>,
    },

    /// Run a dataset through search, generation and judging
    Evaluate {
        /// Path to a dataset JSON file (built-in sample if omitted)
        dataset: Option<PathBuf>,

        /// Use a query -> hits fixture file instead of the search service
        #[arg(long)]
        hits: Option<PathBuf>,

        /// Maximum number of questions to evaluate
        #[arg(long)]
        max_items: Option<usize>,

        /// Maximum number of questions evaluated at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Save results to JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Score { hits, query, json } => cmd_score(hits, query, json).await,
        Commands::Metrics {
            retrieved,
            relevant,
        } => cmd_metrics(retrieved, relevant),
        Commands::Evaluate {
            dataset,
            hits,
            max_items,
            concurrency,
            output,
        } => cmd_evaluate(dataset, hits, max_items, concurrency, output).await,
        Commands::Test => cmd_test().await,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("rag_retrieval_eval={level},rag_eval={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn read_hits(path: &Path, query: Option<&str>) -> Result<Vec<SearchHit>> {
    match query {
        Some(query) => {
            let fixture = FixtureSearchBackend::load(path).context("Failed to load hits file")?;
            let hits = fixture
                .search(query, usize::MAX)
                .await
                .context("Failed to look up query")?;
            if hits.is_empty() {
                warn!(query, "No hits recorded for query");
            }
            Ok(hits)
        }
        None => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read hits file: {:?}", path))?;
            serde_json::from_str(&content).context("Failed to parse hits JSON")
        }
    }
}

async fn cmd_score(path: PathBuf, query: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    let hits = read_hits(&path, query.as_deref()).await?;
    let scored = score_hits(hits).context("Invalid hit distance")?;
    let report = QualityScorer::new(config.scoring).report(&scored);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Retrieval Quality");
    println!("{}", "─".repeat(60));
    if let Some(query) = &query {
        println!("  Query:        {}", query);
    }
    println!(
        "  Score:        {:.1}/100 ({})",
        report.quality_score, report.grade
    );
    println!("  Avg score:    {:.3}", report.avg_score);
    println!("  Top score:    {:.3}", report.top_score);
    println!(
        "  Variance:     {:.4} ({} consistency)",
        report.score_variance,
        report.consistency()
    );
    println!("  Sources:      {}", report.num_sources);

    if !report.sources_with_scores.is_empty() {
        println!("{}", "─".repeat(60));
        for hit in &report.sources_with_scores {
            let preview: String = hit.content.chars().take(60).collect();
            println!(
                "{:>3}. {} ({:.3}) {}",
                hit.rank,
                hit.id,
                hit.similarity.value(),
                preview.replace('\n', " ")
            );
        }
    }

    Ok(())
}

fn cmd_metrics(retrieved: Vec<String>, relevant: Vec<String>) -> Result<()> {
    let config = load_config()?;
    let metrics = MetricsCalculator::new(config.metrics).calculate(&retrieved, &relevant);

    println!("Retrieval Metrics");
    println!("{}", "─".repeat(40));
    println!("  Retrieved:  {}", retrieved.len());
    println!("  Relevant:   {}", relevant.len());
    println!("  Precision:  {:.3}", metrics.precision);
    println!("  Recall:     {:.3}", metrics.recall);
    println!("  MRR:        {:.3}", metrics.mrr);

    Ok(())
}

async fn cmd_evaluate(
    dataset_path: Option<PathBuf>,
    hits: Option<PathBuf>,
    max_items: Option<usize>,
    concurrency: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config()?;
    config.validate_llm().context("Invalid LLM configuration")?;
    if let Some(limit) = concurrency {
        config.evaluation.max_concurrency = limit.max(1);
    }

    let dataset = match &dataset_path {
        Some(path) => {
            println!("Loading dataset from {:?}...", path);
            Dataset::load_json(path)?
        }
        None => {
            println!("Using sample dataset...");
            create_sample_dataset()
        }
    };
    let dataset = match max_items {
        Some(max) => dataset.take(max),
        None => dataset,
    };

    let search: Arc<dyn SearchBackend> = match &hits {
        Some(path) => Arc::new(FixtureSearchBackend::load(path).context("Failed to load hits file")?),
        None => {
            config.validate_search().context("Invalid search configuration")?;
            Arc::new(HttpSearchBackend::new(&config.search)?)
        }
    };

    let client = LlmClient::new(config.llm.clone())?;
    println!("LLM Model: {}", client.model());

    let mut evaluator = RagEvaluator::new(
        search,
        Arc::new(LlmGenerator::new(client.clone())),
        Arc::new(LlmJudge::new(client)),
    )
    .with_scoring(config.scoring.clone())
    .with_metrics_policy(config.metrics)
    .with_config(config.evaluation.clone());

    if let Some(api_base) = &config.search.rerank_api_base {
        info!(api_base = %api_base, model = %config.search.rerank_model, "Using re-ranker");
        evaluator = evaluator.with_reranker(Arc::new(HttpReranker::new(
            api_base,
            &config.search.rerank_model,
            config.search.timeout_secs,
        )?));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining questions");
            ctrl_c.cancel();
        }
    });

    println!(
        "Evaluating {} questions ({} at a time)...",
        dataset.len(),
        evaluator.config().max_concurrency
    );
    let report = evaluator
        .evaluate_batch(&dataset.name, &dataset.items, &cancel)
        .await;

    report.print_summary();

    if let Some(path) = output {
        save_report(&report, &path)?;
        println!("Results saved to {:?}", path);
    }

    Ok(())
}

fn save_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write results: {:?}", path))?;
    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing LLM connection...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    println!(
        "  API Key:   {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm)?;

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
