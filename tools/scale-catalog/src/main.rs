use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tonika_domain::{decode_catalog, encode_catalog, DataFormat, ScaleCatalog};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Dump or inspect scale catalogs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the built-in catalog
    Dump {
        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
    /// Validate a JSON or YAML catalog file and list its keynotes
    Inspect { input: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Args::parse().command {
        Command::Dump { yaml } => {
            let format = if yaml { DataFormat::Yaml } else { DataFormat::Json };
            let bytes = encode_catalog(&ScaleCatalog::builtin(), format)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::Inspect { input } => {
            let bytes = fs::read(&input).with_context(|| format!("read catalog {:?}", input))?;
            let catalog = decode_catalog(&bytes, DataFormat::from_path(&input))
                .with_context(|| format!("invalid catalog {:?}", input))?;
            info!(
                keynotes = catalog.keynotes().len(),
                scales = catalog.len(),
                "loaded catalog"
            );
            for entry in catalog.keynotes() {
                let names: Vec<&str> = entry
                    .scales
                    .iter()
                    .map(|scale| scale.name.as_str())
                    .collect();
                println!(
                    "{:<4} {:>2} scales: {}",
                    entry.keynote,
                    names.len(),
                    names.join(", ")
                );
            }
            println!("{} keynote/scale pairs", catalog.len());
        }
    }
    Ok(())
}
