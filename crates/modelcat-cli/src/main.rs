//! modelcat - model catalog builder.
//!
//! This binary wires the modelcat-core pipeline to the command line:
//! artifact references in, a consolidated `models-catalog.yaml` out.

use anyhow::{bail, Context, Result};
use clap::Parser;
use modelcat_core::{
    CatalogMetadata, CatalogPipeline, HuggingFaceHub, ModelHub, OciRegistryClient,
    StaticHubIndex,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modelcat")]
#[command(about = "Builds a model metadata catalog from OCI artifacts and the HuggingFace Hub")]
struct Args {
    /// Artifact references (registry/repository:tag)
    refs: Vec<String>,

    /// File with one artifact reference per line ('#' starts a comment)
    #[arg(long)]
    refs_file: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long, default_value = "./catalog-output")]
    output: PathBuf,

    /// Maximum concurrent extraction workers
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Hub organization whose models form the match index (repeatable)
    #[arg(long = "hub-author")]
    hub_authors: Vec<String>,

    /// Static hub index YAML; replaces the live HuggingFace index
    #[arg(long)]
    hub_index: Option<PathBuf>,

    /// Pre-authored catalog records (YAML list) appended after the
    /// deduplicated output, never merged
    #[arg(long)]
    static_catalog: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let references = collect_references(&args)?;
    if references.is_empty() {
        bail!("no artifact references given (positional or --refs-file)");
    }
    info!("modelcat starting: {} references", references.len());

    let hub: Arc<dyn ModelHub> = match &args.hub_index {
        Some(path) => Arc::new(
            StaticHubIndex::load(path)
                .with_context(|| format!("loading hub index {}", path.display()))?,
        ),
        None => {
            let cache_dir = args.output.join("cache").join("hub");
            Arc::new(HuggingFaceHub::new(cache_dir)?.with_authors(args.hub_authors.clone()))
        }
    };

    let static_records = match &args.static_catalog {
        Some(path) => load_static_records(path)?,
        None => Vec::new(),
    };

    let registry = Arc::new(OciRegistryClient::new()?);
    let pipeline = CatalogPipeline::new(registry, hub, &args.output, args.concurrency)?;

    let summary = pipeline.run(&references, static_records).await?;

    info!(
        "Done: {} extracted, {} skeleton, {} enriched, {} no-match, {} catalog entries",
        summary.extracted, summary.skeletons, summary.enriched, summary.no_match,
        summary.catalog_models
    );
    println!(
        "Wrote {} model(s) to {}",
        summary.catalog_models,
        args.output.join("models-catalog.yaml").display()
    );

    Ok(())
}

/// Positional references plus the optional refs file, deduplicated.
fn collect_references(args: &Args) -> Result<Vec<String>> {
    let mut references = args.refs.clone();

    if let Some(path) = &args.refs_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading refs file {}", path.display()))?;
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if !line.is_empty() {
                references.push(line.to_string());
            }
        }
    }

    references.dedup();
    Ok(references)
}

fn load_static_records(path: &PathBuf) -> Result<Vec<CatalogMetadata>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading static catalog {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing static catalog {}", path.display()))
}
