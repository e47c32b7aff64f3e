//! Command-line interface for the pdfkb knowledge base.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pdfkb::config::init_config;
use pdfkb::logging::init_tracing;
use pdfkb::pipeline::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, IngestRequest, PageField, SearchMode, SearchRequest,
    VectorizerService, await_completion, spawn_ingestion,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pdfkb", version, about = "Dual-vector PDF knowledge base over Qdrant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF into the knowledge base, streaming progress as JSON lines.
    Ingest {
        /// Path to the PDF file.
        path: PathBuf,
        /// Identity the stored pages belong to.
        #[arg(long)]
        owner: String,
        /// Make the document readable by other owners.
        #[arg(long)]
        public: bool,
        /// Store the document under this name instead of the file name.
        #[arg(long)]
        name: Option<String>,
        /// Give up polling after this many seconds; the run continues in
        /// the background.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout: u64,
    },
    /// Search stored pages semantically.
    Search {
        /// Natural-language query.
        query: String,
        /// Maximum hits per retrieval path.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Retrieval mode: dual, summary, or content.
        #[arg(long, default_value = "dual")]
        mode: String,
        /// Requesting identity; scopes results to owned and public pages.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Fetch specific pages of a stored document.
    Pages {
        /// Document filename.
        filename: String,
        /// Page numbers to fetch, 1-based.
        #[arg(required = true)]
        pages: Vec<u32>,
        /// Comma-separated payload fields to return; defaults to all.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Requesting identity.
        #[arg(long)]
        owner: Option<String>,
    },
    /// List documents visible to an owner.
    List {
        /// Requesting identity.
        #[arg(long)]
        owner: String,
    },
    /// Change a document's visibility flag.
    Visibility {
        /// Document filename.
        filename: String,
        /// Owner of the document.
        #[arg(long)]
        owner: String,
        /// New visibility: make the document public or private.
        #[arg(long)]
        public: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config();

    let cli = Cli::parse();
    let service = VectorizerService::new()
        .await
        .context("Failed to initialize knowledge base service")?;

    match cli.command {
        Command::Ingest {
            path,
            owner,
            public,
            name,
            timeout,
        } => {
            if !path.is_file() {
                bail!("No such file: {}", path.display());
            }

            let service = Arc::new(service);
            let handle = spawn_ingestion(
                service.clone(),
                IngestRequest {
                    path,
                    owner,
                    is_public: public,
                    display_name: name,
                },
            );

            let final_snapshot = await_completion(
                &handle,
                DEFAULT_POLL_INTERVAL,
                Duration::from_secs(timeout),
                |snapshot| {
                    if let Ok(line) = serde_json::to_string(snapshot) {
                        println!("{line}");
                    }
                },
            )
            .await;

            if let Some(error) = final_snapshot.error {
                bail!("Ingestion failed: {error}");
            }

            let metrics = service.metrics();
            tracing::info!(
                documents_ingested = metrics.documents_ingested,
                pages_indexed = metrics.pages_indexed,
                "Ingestion metrics"
            );
        }
        Command::Search {
            query,
            limit,
            mode,
            owner,
        } => {
            let mode: SearchMode = mode.parse()?;
            let results = service
                .search(&SearchRequest {
                    query,
                    limit,
                    mode,
                    owner,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Pages {
            filename,
            pages,
            fields,
            owner,
        } => {
            let fields = fields
                .iter()
                .map(|field| field.parse::<PageField>())
                .collect::<Result<Vec<_>, _>>()?;
            let projection = if fields.is_empty() {
                None
            } else {
                Some(fields.as_slice())
            };

            let views = service
                .get_pages(&filename, &pages, projection, owner.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Command::List { owner } => {
            let documents = service.get_document_list(&owner).await?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        Command::Visibility {
            filename,
            owner,
            public,
        } => {
            let update = service
                .update_document_visibility(&filename, &owner, public)
                .await?;
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
    }

    Ok(())
}
