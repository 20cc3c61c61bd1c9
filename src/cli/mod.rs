//! Command-line interface for training, prediction and the HTTP service

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineSettings;
use crate::inference::PredictionPipeline;
use crate::pipeline::{PipelineOutcome, TrainingPipeline};
use crate::source::{records_from_csv, DocumentSink, FileDocumentStore};
use crate::training::SelectionMetric;

// ─── Output styling ────────────────────────────────────────────────────────────

const BANNER_WIDTH: usize = 56;

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn label(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn heading(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(BANNER_WIDTH)));
}

fn progress(msg: &str) {
    print!("  {} {}... ", "›".truecolor(120, 170, 255), msg);
}

fn finished(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

enum BannerRow<'a> {
    Blank,
    Rule,
    Title(&'a str),
    Note(&'a str),
    Entry(&'a str, String),
}

/// Frame rows in a box; widths are measured before colouring
fn banner(rows: &[BannerRow]) -> Vec<String> {
    let edge = |left: &str, right: &str| format!("  {}", dim(&format!("{left}{}{right}", "─".repeat(BANNER_WIDTH + 2))));
    let side = dim("│");

    let mut lines = vec![edge("┌", "┐")];
    for row in rows {
        let (width, styled, centred) = match row {
            BannerRow::Rule => {
                lines.push(edge("├", "┤"));
                continue;
            }
            BannerRow::Blank => (0, String::new(), false),
            BannerRow::Title(text) => (text.chars().count(), text.white().bold().to_string(), true),
            BannerRow::Note(text) => (text.chars().count(), dim(text).to_string(), true),
            BannerRow::Entry(key, value) => (
                key.chars().count() + 1 + value.chars().count(),
                format!("{} {}", label(key), value.white()),
                false,
            ),
        };
        let pad = BANNER_WIDTH.saturating_sub(width);
        let left = if centred { pad / 2 } else { 0 };
        lines.push(format!(
            "  {side} {}{styled}{} {side}",
            " ".repeat(left),
            " ".repeat(pad - left)
        ));
    }
    lines.push(edge("└", "┘"));
    lines
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "predictive-maintenance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Machine failure prediction: training pipeline, batch prediction and HTTP service")]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Settings file (YAML); missing keys use defaults
    #[arg(short, long, global = true, env = "MAINTENANCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the document store collections
    #[arg(long, global = true, env = "DOCUMENT_STORE_ROOT")]
    pub document_store_root: Option<PathBuf>,

    /// Column schema file
    #[arg(long, global = true, env = "SCHEMA_PATH")]
    pub schema: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ingestion, validation, transformation and training
    Train {
        /// Score used to pick the production model (r2, f1, accuracy)
        #[arg(long)]
        metric: Option<SelectionMetric>,

        /// Number of cross-validation folds for the grid search
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Seed for splitting, resampling and model randomness
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Label a CSV of readings with the production model
    Predict {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for output.csv
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Load a CSV file into the document store
    PushData {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Database name (defaults to the settings value)
        #[arg(long)]
        database: Option<String>,

        /// Collection name (defaults to the settings value)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Start the HTTP service
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8080", env = "API_PORT")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0", env = "API_HOST")]
        host: String,
    },
}

/// Build settings from the optional YAML file and command-line overrides
pub fn resolve_settings(args: &GlobalArgs) -> anyhow::Result<PipelineSettings> {
    let mut settings = match &args.config {
        Some(path) => PipelineSettings::from_yaml_file(path)?,
        None => PipelineSettings::default(),
    };
    if let Some(root) = &args.document_store_root {
        settings = settings.with_document_store_root(root);
    }
    if let Some(schema) = &args.schema {
        settings = settings.with_schema_path(schema);
    }
    Ok(settings)
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(&cli.global)?;
    match cli.command {
        Commands::Train { metric, cv_folds, seed } => {
            let mut settings = settings;
            if let Some(metric) = metric {
                settings = settings.with_selection_metric(metric);
            }
            if let Some(folds) = cv_folds {
                settings = settings.with_cv_folds(folds);
            }
            if let Some(seed) = seed {
                settings = settings.with_random_seed(seed);
            }
            settings.validate()?;
            // Training is CPU bound; keep it off the async workers
            tokio::task::spawn_blocking(move || cmd_train(settings)).await??;
        }
        Commands::Predict { data, output_dir } => {
            let settings = match output_dir {
                Some(dir) => settings.with_prediction_output_dir(dir),
                None => settings,
            };
            cmd_predict(&settings, &data)?;
        }
        Commands::PushData { data, database, collection } => {
            let database = database.unwrap_or_else(|| settings.database_name.clone());
            let collection = collection.unwrap_or_else(|| settings.collection_name.clone());
            cmd_push_data(&settings, &data, &database, &collection)?;
        }
        Commands::Serve { port, host } => {
            cmd_serve(settings, &host, port).await?;
        }
    }
    Ok(())
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(settings: PipelineSettings) -> anyhow::Result<PipelineOutcome> {
    heading("Train");
    println!("  {:<16} {}", label("Collection"), format!("{}/{}", settings.database_name, settings.collection_name));
    println!("  {:<16} {}", label("Metric"), settings.selection_metric.to_string().white());
    println!();

    progress("Running pipeline");
    let start = Instant::now();
    let outcome = TrainingPipeline::new(settings).run_pipeline()?;
    finished(&format!("{:?}", start.elapsed()));

    let training = &outcome.training;
    let drift = if outcome.validation.validation_status { ok("none") } else { "detected".yellow() };

    println!();
    println!("  {:<16} {}", label("Run"), outcome.run.timestamp);
    println!("  {:<16} {}", label("Drift"), drift);
    println!("  {:<16} {}", label("Best model"), training.best_model_name.white().bold());
    println!("  {:<16} {}", label("Score"), format!("{:.4}", training.best_model_score).white().bold());
    println!();
    println!("  {:<16} {:>10} {:>10} {:>10}", "", label("F1"), label("Precision"), label("Recall"));
    println!("  {}", dim(&"─".repeat(50)));
    for (split, metrics) in [("train", &training.train_metric_artifact), ("test", &training.test_metric_artifact)] {
        println!(
            "  {:<16} {:>10.4} {:>10.4} {:>10.4}",
            split, metrics.f1_score, metrics.precision_score, metrics.recall_score
        );
    }
    println!();

    Ok(outcome)
}

pub fn cmd_predict(settings: &PipelineSettings, data_path: &Path) -> anyhow::Result<()> {
    heading("Predict");

    progress("Loading production model");
    let pipeline = PredictionPipeline::from_settings(settings)?;
    finished(&settings.final_model_path().display().to_string());

    progress(&format!("Labelling {}", data_path.display()));
    let start = Instant::now();
    let labelled = pipeline.predict_csv_file(data_path)?;
    finished(&format!("{} rows in {:?}", labelled.height(), start.elapsed()));

    println!();
    println!("  {:<16} {}", label("Output"), pipeline.output_path().display());
    println!();
    Ok(())
}

pub fn cmd_push_data(
    settings: &PipelineSettings,
    data_path: &Path,
    database: &str,
    collection: &str,
) -> anyhow::Result<usize> {
    heading("Push data");

    progress(&format!("Reading {}", data_path.display()));
    let records = records_from_csv(data_path)?;
    finished(&format!("{} records", records.len()));

    progress(&format!("Inserting into {}/{}", database, collection));
    let store = FileDocumentStore::new(&settings.document_store_root);
    let inserted = store.insert_many(database, collection, records)?;
    finished(&format!("{} inserted", inserted));

    println!();
    Ok(inserted)
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(settings: PipelineSettings, host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let version = format!("v{}", env!("CARGO_PKG_VERSION"));
    let url = |path: &str| format!("http://{}:{}/{}", host, port, path);
    let rows = [
        BannerRow::Blank,
        BannerRow::Title("Predictive Maintenance"),
        BannerRow::Note(&version),
        BannerRow::Blank,
        BannerRow::Rule,
        BannerRow::Blank,
        BannerRow::Entry("Health ", url("health")),
        BannerRow::Entry("Train  ", url("train")),
        BannerRow::Entry("Predict", url("predict")),
        BannerRow::Blank,
        BannerRow::Rule,
        BannerRow::Blank,
        BannerRow::Note("ctrl+c to stop"),
        BannerRow::Blank,
    ];
    println!();
    for line in banner(&rows) {
        println!("{line}");
    }
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };

    run_server(config, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DocumentSource;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_parse_train_overrides() {
        let cli = Cli::try_parse_from([
            "predictive-maintenance",
            "train",
            "--metric",
            "f1",
            "--cv-folds",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { metric, cv_folds, seed } => {
                assert_eq!(metric, Some(SelectionMetric::F1));
                assert_eq!(cv_folds, Some(3));
                assert_eq!(seed, None);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_metric() {
        let parsed = Cli::try_parse_from(["predictive-maintenance", "train", "--metric", "auc"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_resolve_settings_applies_overrides() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.yaml");
        std::fs::write(&config_path, "database_name: plant\ncv_folds: 3\n").unwrap();

        let args = GlobalArgs {
            config: Some(config_path),
            document_store_root: Some(dir.path().join("store")),
            schema: None,
        };
        let settings = resolve_settings(&args).unwrap();
        assert_eq!(settings.database_name, "plant");
        assert_eq!(settings.cv_folds, 3);
        assert_eq!(settings.document_store_root, dir.path().join("store"));
        assert_eq!(settings.schema_path, PipelineSettings::default().schema_path);
    }

    #[test]
    fn test_banner_rows_share_one_width() {
        colored::control::set_override(false);
        let rows = [
            BannerRow::Title("Predictive Maintenance"),
            BannerRow::Rule,
            BannerRow::Entry("Health ", "http://127.0.0.1:8080/health".to_string()),
            BannerRow::Blank,
            BannerRow::Note("ctrl+c to stop"),
        ];
        let lines = banner(&rows);
        assert_eq!(lines.len(), rows.len() + 2);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));
        // Titles are centred, entries start at the left edge
        assert!(lines[1].contains(&format!("│ {}Predictive Maintenance", " ".repeat(17))));
        assert!(lines[3].starts_with("  │ Health  http://"));
    }

    #[test]
    fn test_push_data_inserts_every_row() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("readings.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "UDI,Type,Torque [Nm]").unwrap();
        writeln!(file, "1,M,42.8").unwrap();
        writeln!(file, "2,L,46.3").unwrap();
        drop(file);

        let settings = PipelineSettings::default().with_document_store_root(dir.path().join("store"));
        let inserted = cmd_push_data(&settings, &csv_path, "plant", "machines").unwrap();
        assert_eq!(inserted, 2);

        let store = FileDocumentStore::new(dir.path().join("store"));
        let documents = store.fetch_all("plant", "machines").unwrap();
        assert_eq!(documents.len(), 2);
    }
}
