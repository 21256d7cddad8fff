//! Command-line interface for running the training pipeline and the
//! prediction service.

use clap::{Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ConfigurationManager;
use crate::monitoring::{serve_metrics, PipelineMetrics};
use crate::pipeline::{PipelineReport, Stage, StageArtifact, TrainingPipeline};
use crate::training::ModelMetrics;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 110, 110) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_failed(msg: &str) {
    println!("  {} {}", bad("✗"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn metric_row(name: &str, value: f64) {
    println!("  {:<16} {}", muted(name), format!("{:.4}", value).white().bold());
}

fn print_scores(metrics: &ModelMetrics) {
    metric_row("Accuracy", metrics.accuracy);
    metric_row("Precision", metrics.precision);
    metric_row("Recall", metrics.recall);
    metric_row("F1", metrics.f1);
    metric_row("AUC", metrics.auc);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bank-mlops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bank marketing term-deposit training pipeline and prediction service")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run all six pipeline stages in order
    Run {
        /// Directory holding config.yaml, params.yaml and schema.yaml
        #[arg(short, long, default_value = "config")]
        config_dir: PathBuf,

        /// Expose pipeline metrics on this port while running
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Run a single stage against the artifacts of the previous ones
    Stage {
        #[arg(value_enum)]
        stage: Stage,

        #[arg(short, long, default_value = "config")]
        config_dir: PathBuf,
    },

    /// Start the prediction service
    Serve {
        /// Server host (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Server port (defaults to API_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_run(config_dir: &Path, metrics_port: Option<u16>) -> anyhow::Result<()> {
    section("Training pipeline");
    let config = ConfigurationManager::from_dir(config_dir)?;
    step_ok(&format!("Loaded configuration from {}", config_dir.display()));

    let metrics = PipelineMetrics::new()?;
    let exporter = match metrics_port {
        Some(port) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let registry = metrics.registry().clone();
            step_ok(&format!("Metrics at http://{}/metrics", addr));
            Some(tokio::spawn(serve_metrics(addr, registry)))
        }
        None => None,
    };

    let mut pipeline = TrainingPipeline::new(config)?.with_metrics(metrics);
    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run_all()).await?;
    if let Some(handle) = exporter {
        handle.abort();
    }

    match outcome {
        Ok(report) => {
            print_report(&report);
            println!("  {:<16} {}", muted("Time"), format!("{:.2?}", start.elapsed()).white());
            println!();
            Ok(())
        }
        Err(e) => {
            step_failed(&format!("{} [{}]", e, e.code()));
            println!();
            Err(e.into())
        }
    }
}

fn print_report(report: &PipelineReport) {
    step_ok(&format!("Ingested {}", report.ingestion.train_file_path.display()));
    let validation = if report.validation.validation_status { ok("passed") } else { bad("failed") };
    step_ok(&format!("Validation {}", validation));
    if !report.validation.drifted_columns.is_empty() {
        println!("    {} {}", muted("drift:"), report.validation.drifted_columns.join(", ").yellow());
    }
    step_ok(&format!("Selected {} features", report.features.selected_features.len()));
    step_ok(&format!(
        "Split {} train / {} test rows{}",
        report.transformation.train_rows,
        report.transformation.test_rows,
        if report.transformation.stratified { " (stratified)" } else { "" }
    ));
    step_ok(&format!("Best model {}", report.training.best_model_name.cyan()));

    section("Evaluation");
    print_scores(&report.evaluation.train_model_metric_artifact);
    let verdict = if report.evaluation.is_model_accepted { ok("accepted") } else { bad("rejected") };
    println!(
        "  {:<16} {} ({:+.4})",
        muted("Champion"),
        verdict,
        report.evaluation.improved_accuracy
    );
}

pub fn cmd_stage(stage: Stage, config_dir: &Path) -> anyhow::Result<()> {
    section(&format!("Stage {}", stage));
    let config = ConfigurationManager::from_dir(config_dir)?;
    let mut pipeline = TrainingPipeline::new(config)?;

    let start = Instant::now();
    let artifact = match pipeline.run_stage(stage) {
        Ok(artifact) => artifact,
        Err(e) => {
            step_failed(&format!("{} [{}]", e, e.code()));
            return Err(e.into());
        }
    };

    match &artifact {
        StageArtifact::Ingestion(a) => step_ok(&a.message),
        StageArtifact::Validation(a) => step_ok(&format!(
            "Validation {} → {}",
            if a.validation_status { "passed" } else { "failed" },
            a.drift_report_file_path.display()
        )),
        StageArtifact::Features(a) => step_ok(&format!(
            "{} features → {}",
            a.selected_features.len(),
            a.processed_train_path.display()
        )),
        StageArtifact::Transformation(a) => step_ok(&format!(
            "{} train / {} test rows → {}",
            a.train_rows,
            a.test_rows,
            a.transformed_train_file_path.display()
        )),
        StageArtifact::Training(a) => {
            step_ok(&format!("{} → {}", a.best_model_name.cyan(), a.trained_model_file_path.display()));
            print_scores(&a.test_metric_artifact);
        }
        StageArtifact::Evaluation(a) => {
            print_scores(&a.train_model_metric_artifact);
            step_ok(&format!("Metrics → {}", a.metric_file_path.display()));
        }
    }
    println!("  {:<16} {}", muted("Time"), format!("{:.2?}", start.elapsed()).white());
    println!();
    Ok(())
}

pub async fn cmd_serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Bank Marketing Prediction".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("POST http://{}:{}/predict", config.host, config.port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", config.host, config.port)));
    line_box(&kv("Model  ", &config.model_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

/// Dispatch a parsed command line
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run { config_dir, metrics_port } => cmd_run(&config_dir, metrics_port).await,
        Commands::Stage { stage, config_dir } => {
            tokio::task::spawn_blocking(move || cmd_stage(stage, &config_dir)).await?
        }
        Commands::Serve { host, port } => cmd_serve(host, port).await,
    }
}
