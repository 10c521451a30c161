//! Liver risk CLI
//!
//! Command-line interface for training, one-off prediction, data generation
//! and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::data::loader::DEFAULT_SQL_FILE;
use crate::data::synthetic::{generate, SyntheticConfig};
use crate::data::{render_sql_script, PatientRecord};
use crate::inference::{assess, Predictor};
use crate::registry::{FsModelRegistry, ModelRegistry};
use crate::server::{run_server, ServerConfig};
use crate::training::{Trainer, TrainingConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

/// Border row; the inner width matches `box_row`
fn box_rule(left: char, right: char) -> String {
    format!("{}{}{}", left, "─".repeat(W + 3), right)
}

/// Content row, left-aligned or centered within the box
fn box_row(content: &str, centered: bool) -> String {
    let pad = W.saturating_sub(strip_ansi(content).chars().count());
    let (left, right) = if centered { (pad / 2, pad - pad / 2) } else { (0, pad) };
    format!("│  {}{}{} │", " ".repeat(left), content, " ".repeat(right))
}

fn line_box_top()    { println!("  {}", dim(&box_rule('┌', '┐'))); }
fn line_box_bottom() { println!("  {}", dim(&box_rule('└', '┘'))); }
fn line_box_sep()    { println!("  {}", dim(&box_rule('├', '┤'))); }

fn line_box(content: &str)        { println!("  {}", box_row(content, false)); }
fn line_box_center(content: &str) { println!("  {}", box_row(content, true)); }

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

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "liver-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Liver-cancer risk model: train, predict and serve")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the risk model and save its artifacts
    Train {
        /// SQL script holding `mytable`
        #[arg(short, long, default_value = DEFAULT_SQL_FILE)]
        data: PathBuf,

        /// Directory for the saved artifacts
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        models_dir: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value = "50")]
        epochs: usize,
    },

    /// Score one patient record read from a JSON file
    Predict {
        /// JSON file with one patient record
        #[arg(short, long)]
        input: PathBuf,

        /// Directory holding the saved artifacts
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        models_dir: PathBuf,
    },

    /// Start the prediction API
    Serve {
        /// Host to bind to
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value = "8000")]
        port: u16,

        /// Directory holding the saved artifacts
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        models_dir: PathBuf,
    },

    /// Write a synthetic dataset as a SQL script
    GenerateData {
        /// Output script path
        #[arg(short, long, default_value = DEFAULT_SQL_FILE)]
        output: PathBuf,

        /// Number of rows
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_train(data: &Path, models_dir: &Path, epochs: usize) -> anyhow::Result<()> {
    section("Train");

    let config = TrainingConfig::new().with_sql_file(data).with_epochs(epochs);
    let registry: Arc<dyn ModelRegistry> = Arc::new(FsModelRegistry::new(models_dir));

    step_run(&format!("Training on {}", data.display().to_string().cyan()));
    let start = Instant::now();
    let artifacts = Trainer::new(config).run(registry).await?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let report = &artifacts.report;
    if let Some(source) = &report.data_source {
        step_ok(&format!("Data: {}", source));
    }
    if let Some(manifest) = &report.manifest {
        step_ok(&format!(
            "Saved v{} to {}",
            manifest.version,
            models_dir.display()
        ));
    }

    let auc = report
        .auc_roc()
        .map(|a| format!("{:.4}", a))
        .unwrap_or_else(|| "n/a".to_string());
    let final_loss = report
        .final_loss()
        .map(|e| format!("{:.4}", e.train_loss))
        .unwrap_or_else(|| "n/a".to_string());

    println!();
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", report.accuracy()).white().bold());
    println!("  {:<16} {}", muted("ROC AUC"), auc.white().bold());
    println!("  {:<16} {}", muted("Final loss"), final_loss.white());
    println!("  {:<16} {}", muted("Samples"), report.n_samples.to_string().white());
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", report.training_time_secs).white());
    println!();

    Ok(())
}

pub async fn cmd_predict(input: &Path, models_dir: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read(input).await?;
    let record: PatientRecord = serde_json::from_slice(&raw)?;

    let registry: Arc<dyn ModelRegistry> = Arc::new(FsModelRegistry::new(models_dir));
    let predictor = Predictor::new(registry);
    let assessment = tokio::task::spawn_blocking(move || assess(&predictor, &record)).await??;

    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

pub async fn cmd_generate_data(output: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    section("Generate data");

    step_run(&format!("Generating {} rows", rows));
    let start = Instant::now();
    let df = generate(&SyntheticConfig::new().with_samples(rows).with_seed(seed))?;
    let script = render_sql_script(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, script).await?;
    step_ok(&format!("Wrote {}", output.display().to_string().cyan()));
    println!();

    Ok(())
}

pub async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    let host = &config.host;
    let port = config.port;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Liver Risk API".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("POST http://{}:{}/predict", host, port)));
    line_box(&kv("Health ", &format!("GET  http://{}:{}/health", host, port)));
    line_box(&kv("Models ", &config.models_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        colored::control::set_override(true);
        let styled = format!("{}", "hello".red());
        assert_eq!(strip_ansi(&styled), "hello");
        colored::control::unset_override();
    }

    #[test]
    fn test_box_rows_align_with_borders() {
        let width = |s: &str| strip_ansi(s).chars().count();
        let rule = box_rule('┌', '┐');
        assert_eq!(width(&box_row("Predict", false)), width(&rule));
        assert_eq!(width(&box_row("Liver Risk API", true)), width(&rule));
        assert_eq!(width(&box_row(&"x".repeat(W + 10), false)), width(&rule) + 10);
    }

    #[test]
    fn test_parse_train_defaults() {
        let cli = Cli::try_parse_from(["liver-risk", "train"]).unwrap();
        match cli.command {
            Some(Commands::Train { data, epochs, .. }) => {
                assert_eq!(data, PathBuf::from(DEFAULT_SQL_FILE));
                assert_eq!(epochs, 50);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_parse_generate_data() {
        let cli = Cli::try_parse_from(["liver-risk", "generate-data", "--rows", "10", "--seed", "7"]).unwrap();
        match cli.command {
            Some(Commands::GenerateData { rows, seed, .. }) => {
                assert_eq!(rows, 10);
                assert_eq!(seed, 7);
            }
            _ => panic!("expected generate-data"),
        }
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::try_parse_from(["liver-risk"]).unwrap();
        assert!(cli.command.is_none());
    }
}
