use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tonika_analysis::{AnalysisConfig, AnalysisJob, AnalysisPipeline, LabChordDetector};
use tonika_ledger::{AnalysisAggregator, ChordUsageSummary, JsonFileLedger, LedgerStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Analyze songs and keep a chord usage ledger", long_about = None)]
struct Cli {
    /// YAML analysis config; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Ledger file, overriding the configured one
    #[arg(short, long, global = true)]
    ledger: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze an audio file and append the result to the ledger
    Analyze {
        /// Path to the audio file
        input: PathBuf,
        #[arg(long)]
        artist: String,
        #[arg(long)]
        title: String,
        /// Chord sidecar (`<time> <label>` per line) instead of chroma detection
        #[arg(long)]
        chords: Option<PathBuf>,
        /// Write the tempo report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the chord usage summary of the ledger
    History,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_yaml_file(path)?,
        None => AnalysisConfig::default(),
    };
    let ledger_path = cli.ledger.unwrap_or_else(|| config.ledger_path.clone());
    let store = JsonFileLedger::new(&ledger_path);

    match cli.command {
        Command::Analyze {
            input,
            artist,
            title,
            chords,
            report,
            json,
        } => {
            let mut pipeline = AnalysisPipeline::from_config(&config)?;
            if let Some(sidecar) = chords {
                pipeline =
                    pipeline.with_chord_detector(Box::new(LabChordDetector::with_sidecar(sidecar)));
            }
            let job = AnalysisJob {
                audio_path: input,
                artist,
                title,
            };
            let analysis = pipeline.analyze(&job)?;

            let tempo_report = analysis.tempo_report().to_string();
            match report {
                Some(path) => {
                    fs::write(&path, &tempo_report)
                        .with_context(|| format!("write tempo report {:?}", path))?;
                    info!(path = ?path, "tempo report written");
                }
                None => print!("{tempo_report}"),
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }

            let aggregator = AnalysisAggregator::new(store);
            let entries = aggregator.record(analysis.record())?;
            println!(
                "Key: {}",
                analysis.key.best_keynote.as_deref().unwrap_or("Unknown")
            );
            println!("Ledger {:?} now holds {} entries", ledger_path, entries.len());
        }
        Command::History => {
            let entries = store.load()?;
            print!("{}", ChordUsageSummary::from_entries(&entries));
        }
    }
    Ok(())
}
