use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docrouter::{
    config::Config,
    embeddings, llm,
    store::{DocumentFetcher, DriveDocumentStore, InMemoryDocumentStore},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrouter")]
#[command(about = "Route natural-language requests to document search, general answers or document actions")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to config/settings.toml, then ~/.config/docrouter/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Document store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Drive, global = true)]
    store: StoreKind,

    /// JSON file of documents to seed the in-memory store with
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    /// Results per search (overrides config)
    #[arg(long, global = true)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Drive,
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the store, then answer a request
    Ask {
        /// The request, in plain language
        #[arg(value_name = "TEXT")]
        text: String,
        /// Skip indexing (document search will report an empty index)
        #[arg(long)]
        no_index: bool,
    },
    /// Show how a request would be classified
    Classify {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Index the store, then print the best-matching chunks without generating an answer
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
        /// Number of chunks to return
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Print one document from the store
    Read {
        #[arg(value_name = "DOCUMENT_ID")]
        id: String,
    },
    /// Rebuild the index and print a summary
    Reindex,
    /// Rebuild the index and print per-document chunk counts
    DebugIndex,
    /// List files in the store
    Files {
        /// Maximum number of files
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only files of this MIME type
        #[arg(long)]
        mime_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Answers go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docrouter=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(top_k) = cli.top_k {
        config.router.top_k = top_k;
    }

    let store = build_store(&cli, &config)?;

    if let Commands::Files { limit, mime_type } = &cli.command {
        let files = store
            .list_files(*limit, mime_type.as_deref())
            .await
            .context("Failed to list files")?;
        println!("Found {} files:", files.len());
        for (i, file) in files.iter().enumerate() {
            println!("{}. {} ({})", i + 1, file.name, file.mime_type);
        }
        return Ok(());
    }

    let embedder = embeddings::from_config(&config);
    let completion = llm::from_config(&config);
    let router = Router::new(store, embedder, completion, &config)
        .context("Failed to set up router")?;

    match cli.command {
        Commands::Ask { text, no_index } => {
            if !no_index {
                router.reindex().await.context("Failed to index documents")?;
            }
            let response = router.resolve(&text).await;
            if let Some(error) = &response.error {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!("\nSources:");
                for source in &response.sources {
                    println!("- {} ({:.3})", source.title, source.score);
                }
            }
        }
        Commands::Classify { text } => {
            let classification = router
                .classify(&text)
                .await
                .context("Failed to classify request")?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::Search { query, limit } => {
            router.reindex().await.context("Failed to index documents")?;
            let hits = router.search(&query, limit).await.context("Search failed")?;
            if hits.is_empty() {
                println!("No matching documents.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. {} [{}] ({:.3})", i + 1, hit.title, hit.chunk_id, hit.score);
                println!("   {}", hit.preview.replace('\n', " "));
            }
        }
        Commands::Read { id } => {
            let record = router
                .read(&id)
                .await
                .with_context(|| format!("Failed to read document {}", id))?;
            println!("{}
{}

{}", record.title, record.source_uri, record.content);
        }
        Commands::Reindex => {
            let summary = router.reindex().await.context("Reindex failed")?;
            println!(
                "Indexed {} documents, {} chunks ({} skipped)",
                summary.document_count, summary.chunk_count, summary.skipped_chunks
            );
            for failure in &summary.failures {
                println!("  skipped {}: {}", failure.chunk_id, failure.reason);
            }
        }
        Commands::DebugIndex => {
            router.reindex().await.context("Reindex failed")?;
            println!("{}", serde_json::to_string_pretty(&router.debug_index())?);
        }
        Commands::Files { .. } => {}
    }

    Ok(())
}

fn build_store(cli: &Cli, config: &Config) -> Result<Arc<dyn DocumentFetcher>> {
    match cli.store {
        StoreKind::Drive => {
            let token = config
                .drive_access_token()
                .context("No Drive access token: set drive.access_token or GOOGLE_ACCESS_TOKEN")?;
            Ok(Arc::new(DriveDocumentStore::new(&config.drive, token)))
        }
        StoreKind::Memory => match &cli.seed {
            Some(path) => Ok(Arc::new(
                InMemoryDocumentStore::from_json_file(path)
                    .with_context(|| format!("Failed to load seed file {}", path.display()))?,
            )),
            None => Ok(Arc::new(InMemoryDocumentStore::new())),
        },
    }
}
