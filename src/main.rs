use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use ragdex::answer::{self, Synthesizer, ollama::OllamaSynthesizer};
use ragdex::config::{Config, DEFAULT_CONFIG_PATH};
use ragdex::embedder::{self, Embedder};
use ragdex::extract;
use ragdex::indexer::core::Indexer;
use ragdex::retrieval::Retriever;
use ragdex::store::{SharedStore, Store};

#[derive(Parser)]
#[command(name = "ragdex", version, about = "Index documents and ask questions about them")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a PDF or a text file (pages separated by form feeds)
    Ingest {
        file: PathBuf,
        /// Document id; defaults to the file stem
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Print the passages closest to a question
    Search {
        question: String,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Answer a question from the indexed passages
    Ask {
        question: String,
        #[arg(short)]
        k: Option<usize>,
    },
    /// List indexed documents
    List,
    /// Verify that the vector index and the metadata line up
    Check,
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {e}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

fn main() -> Result<ExitCode> {
    init_tracing()?;
    let cli = Cli::parse();

    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    // 2. Open the store pair
    let store = Store::open(config.store_paths())
        .context("failed to open store")?
        .into_shared();

    // 3. Collaborators are blocking clients, so build them outside the runtime
    let embedder = embedder::from_config(&config.embedding).context("failed to build embedder")?;
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(
        OllamaSynthesizer::new(&config.generation).context("failed to build generator")?,
    );

    // 4. Run the command
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let code = runtime.block_on(run(
        cli.command,
        &config,
        store,
        embedder.clone(),
        synthesizer.clone(),
    ))?;

    // The last handles to the blocking clients must go away off the runtime.
    drop(runtime);
    drop((embedder, synthesizer));
    Ok(code)
}

async fn run(
    command: Command,
    config: &Config,
    store: SharedStore,
    embedder: Arc<dyn Embedder>,
    synthesizer: Arc<dyn Synthesizer>,
) -> Result<ExitCode> {
    match command {
        Command::Ingest { file, doc_id } => {
            let doc_id = match doc_id {
                Some(id) => id,
                None => default_doc_id(&file)?,
            };
            let pages = extract::load_pages(&file)?;
            let indexer = Indexer::new(store.clone(), embedder, config.chunker()?);
            let report = indexer.ingest(&doc_id, &pages).await?;
            println!(
                "{doc_id}: {} pages, {} chunks indexed",
                report.page_count, report.chunk_count
            );
        }
        Command::Search { question, k } => {
            let retriever = Retriever::new(store.clone(), embedder);
            let k = k.unwrap_or(config.search_top_k);
            let passages = retriever.retrieve(&question, k).await?;
            if passages.is_empty() {
                println!("No passages found.");
            }
            for (rank, p) in passages.iter().enumerate() {
                println!(
                    "#{} {} p.{} (distance {:.4})\n{}\n",
                    rank + 1,
                    p.document_id,
                    p.page_number,
                    p.distance,
                    p.text
                );
            }
        }
        Command::Ask { question, k } => {
            let retriever = Retriever::new(store.clone(), embedder);
            let k = k.unwrap_or(config.search_top_k);
            let answer = answer::answer_question(&retriever, synthesizer, &question, k).await?;
            println!("{answer}");
        }
        Command::List => {
            let guard = store.read().await;
            let docs = guard.metadata().documents();
            if docs.is_empty() {
                println!("Nothing indexed yet.");
            }
            for d in docs {
                println!(
                    "{}\t{} pages\t{} chunks\tfirst id {}",
                    d.document_id, d.pages, d.chunks, d.first_id
                );
            }
        }
        Command::Check => {
            let guard = store.read().await;
            let vectors = guard.index().size();
            let entries = guard.metadata().len();
            println!("index:    {}", guard.paths().index.display());
            println!("metadata: {}", guard.paths().metadata.display());
            if guard.alignment_check() {
                println!("aligned: {vectors} vectors, {entries} metadata entries");
            } else {
                println!(
                    "MISALIGNED: {vectors} vectors, {entries} metadata entries; re-ingest the affected documents"
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    // Release the store so pending writes are flushed before exit.
    if let Ok(store) = Arc::try_unwrap(store) {
        store.into_inner().close()?;
    }
    Ok(ExitCode::SUCCESS)
}

fn default_doc_id(file: &Path) -> Result<String> {
    file.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a document id from {}", file.display()))
}
