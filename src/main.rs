use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openehr::{Composition, Item, PersistentCodes, SimpleTerminologyService};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "ehr-composition")]
#[command(about = "Validate openEHR compositions and address their contents by path")]
struct Cli {
    /// Terminology table (YAML) layered over the built-in openEHR defaults
    #[arg(long, global = true)]
    terminology: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a composition
    Validate {
        /// Composition YAML file
        file: PathBuf,
    },
    /// Print the item a path addresses
    Resolve {
        /// Composition YAML file
        file: PathBuf,
        /// Path, for example "/content[openEHR-EHR-SECTION.adhoc.v1]/items[1]"
        path: String,
    },
    /// Print the canonical path of every addressable item
    Paths {
        /// Composition YAML file
        file: PathBuf,
    },
}

/// Entry point for the composition tool.
///
/// # Environment Variables
/// - `EHR_TERMINOLOGY_FILE`: terminology table merged over the built-in defaults
/// - `EHR_PERSISTENT_CODES`: comma-separated persistent category codes (default: "431")
/// - `RUST_LOG`: log filter (default directive: "ehr_composition=info")
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ehr_composition=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env()?.with_terminology_override(cli.terminology);
    tracing::debug!(
        terminology_file = ?config.terminology_file(),
        persistent_codes = ?config.persistent_codes().collect::<Vec<_>>(),
        "configuration resolved"
    );
    let terminology = config.terminology()?;
    let policy = config.persistence_policy();

    match cli.command {
        Commands::Validate { file } => {
            let composition = load(&file, &terminology, &policy)?;
            println!(
                "valid: uid={}, category={} ({}), territory={}",
                composition
                    .uid()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".into()),
                composition.category().value,
                composition.category().defining_code,
                composition.territory().code_string,
            );
        }
        Commands::Resolve { file, path } => {
            let composition = load(&file, &terminology, &policy)?;
            let item = composition.item_at_path(&path)?;
            println!("{}", describe(&item));
        }
        Commands::Paths { file } => {
            let composition = load(&file, &terminology, &policy)?;
            for (path, item) in composition.items() {
                println!("{path}\t{}", describe(&item));
            }
        }
    }

    Ok(())
}

fn load(
    file: &Path,
    terminology: &SimpleTerminologyService,
    policy: &PersistentCodes,
) -> anyhow::Result<Composition> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let composition = openehr::read_composition_yaml(&yaml, terminology, policy)
        .with_context(|| format!("{} is not a valid composition", file.display()))?;

    tracing::info!(
        file = %file.display(),
        archetype = composition.archetype_node_id(),
        persistent = composition.is_persistent(),
        "composition constructed"
    );
    Ok(composition)
}

fn describe(item: &Item<'_>) -> String {
    match item.archetype_node_id() {
        Some(node_id) => format!("{} {} '{}'", item.kind(), node_id, item.name()),
        None => format!("{} '{}'", item.kind(), item.name()),
    }
}
