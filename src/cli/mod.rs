//! Command-line interface for skillflow.
//!
//! Provides commands for asking a question, running a batch of questions
//! against one orchestrator, checking the provider and showing the
//! resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;

use crate::adapters::{AgentServiceAdapter, SkillProvider};
use crate::config;
use crate::core::{MetricsState, Orchestrator};
use crate::domain::{Capability, OverallStatus, ProgressEvent, StageResult, WorkflowResult};

/// skillflow - three-stage remote skill workflow coordinator
#[derive(Parser, Debug)]
#[command(name = "skillflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question (reads stdin if no question is given)
    Ask {
        /// The question
        query: Option<String>,

        /// Print the full workflow result as JSON
        #[arg(long)]
        json: bool,

        /// Do not print progress updates
        #[arg(short, long)]
        quiet: bool,
    },

    /// Ask every question in a file (one per line) concurrently
    Batch {
        /// File with one question per line
        file: PathBuf,

        /// Print each workflow result as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Check that the skill provider is reachable
    Health,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ask { query, json, quiet } => ask(query, json, quiet).await,
            Commands::Batch { file, json } => batch(&file, json).await,
            Commands::Health => health().await,
            Commands::Config => show_config(),
        }
    }
}

/// Run one workflow and print its result
async fn ask(query: Option<String>, json: bool, quiet: bool) -> Result<()> {
    let query = match query {
        Some(q) => q,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
        None => anyhow::bail!("No question provided. Pass it as an argument or pipe it to stdin"),
    };

    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("Question is empty");
    }

    let orchestrator = Orchestrator::from_config(config::config()?);

    let print_progress = |event: &ProgressEvent| {
        eprintln!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), event);
    };
    let on_progress: Option<&(dyn Fn(&ProgressEvent) + Send + Sync)> =
        if quiet { None } else { Some(&print_progress) };

    let result = orchestrator.run(query, on_progress).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
        print_metrics(&orchestrator.metrics());
    }

    if result.summary.overall_status == OverallStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Run every question in `file` against one shared orchestrator
async fn batch(file: &PathBuf, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read question file: {}", file.display()))?;

    let queries: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();

    if queries.is_empty() {
        anyhow::bail!("No questions found in {}", file.display());
    }

    let orchestrator = Arc::new(Orchestrator::from_config(config::config()?));
    let mut tasks = JoinSet::new();

    for (index, query) in queries.into_iter().enumerate() {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move { (index, orchestrator.run(&query, None).await) });
    }

    let mut results: Vec<(usize, WorkflowResult)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.context("Workflow task panicked")?;
        results.push((index, result?));
    }
    results.sort_by_key(|(index, _)| *index);

    if json {
        for (_, result) in &results {
            println!("{}", serde_json::to_string(result)?);
        }
        return Ok(());
    }

    println!("{:<4} {:<10} {:<8} {:<9} QUESTION", "#", "STATUS", "STAGES", "SECONDS");
    println!("{}", "-".repeat(72));
    for (index, result) in &results {
        let summary = &result.summary;
        println!(
            "{:<4} {:<10} {:<8} {:<9.2} {}",
            index + 1,
            format!("{:?}", summary.overall_status).to_lowercase(),
            format!(
                "{}/{}",
                summary.successful_stage_count, summary.total_stage_count
            ),
            summary.execution_time.as_secs_f64(),
            summary.query
        );
    }
    println!();
    print_metrics(&orchestrator.metrics());

    Ok(())
}

/// Check that the provider answers
async fn health() -> Result<()> {
    let cfg = config::config()?;
    let adapter = AgentServiceAdapter::new(&cfg.provider);

    adapter
        .health_check()
        .await
        .with_context(|| format!("Provider at {} is not healthy", cfg.provider.endpoint))?;

    println!("{} at {} is healthy", adapter.name(), cfg.provider.endpoint);
    Ok(())
}

fn print_result(result: &WorkflowResult) {
    print_stage(Capability::Retrieval, &result.research);
    print_stage(Capability::Analysis, &result.analysis);
    print_stage(Capability::Synthesis, &result.synthesis);

    let summary = &result.summary;
    println!("== Summary");
    println!("Workflow:  {}", result.workflow_id);
    println!(
        "Status:    {}",
        format!("{:?}", summary.overall_status).to_lowercase()
    );
    println!(
        "Stages:    {}/{} succeeded",
        summary.successful_stage_count, summary.total_stage_count
    );
    println!("Time:      {:.2}s", summary.execution_time.as_secs_f64());
}

fn print_stage(capability: Capability, stage: &StageResult) {
    println!(
        "== {} ({})",
        capability,
        format!("{:?}", stage.status).to_lowercase()
    );
    if let Some(ref error) = stage.error {
        println!("Error: {}", error);
    }
    if !stage.text.is_empty() {
        println!("{}", stage.text);
    }
    if !stage.attachments.is_empty() {
        println!("Attachments: {}", stage.attachments.join(", "));
    }
    println!();
}

fn print_metrics(metrics: &MetricsState) {
    println!(
        "Queries: {}  Average latency: {:.2}s",
        metrics.total_queries,
        metrics.average_latency.as_secs_f64()
    );
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let settings = &cfg.orchestrator;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Provider:");
    println!("  Endpoint:    {}", cfg.provider.endpoint);
    println!("  API version: {}", cfg.provider.api_version);
    println!("  Timeout:     {}s", cfg.provider.request_timeout.as_secs());
    println!(
        "  API key:     {} ({})",
        if cfg.provider.api_key.is_some() { "set" } else { "not set" },
        cfg.api_key_env
    );
    println!();
    println!("Polling:");
    println!("  Interval: {}ms", settings.polling.interval.as_millis());
    println!("  Max wait: {}s", settings.polling.max_wait.as_secs());
    println!();
    println!("Workers: {}", settings.workers);
    println!("Retain conversations: {}", settings.retain_conversations);
    println!();
    println!("Skills:");
    for capability in Capability::ALL {
        let skill = settings.skill(capability);
        println!(
            "  {:<10} {} ({}, {} tools)",
            capability,
            skill.name,
            skill.model,
            skill.tools.len()
        );
    }

    Ok(())
}
