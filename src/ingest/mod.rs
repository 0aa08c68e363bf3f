//! Ingestion run: crawl every space, normalize pages and attachments,
//! chunk and embed the text, then rebuild the vector index in one shot.


use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::confluence::{ConfluenceClient, ContentItem, ItemBody, Page};
use crate::embeddings::{ChunkingConfig, OllamaClient, chunk_text};
use crate::index::{ChunkRecord, DocMetadata, SourceKind, VectorStore};
use crate::normalize::{NormalizedDocument, normalize};
use crate::{QaError, Result};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub spaces: usize,
    pub pages: usize,
    pub attachments: usize,
    /// Pages or attachments skipped after a fetch or embedding failure.
    pub failed_items: usize,
    pub chunks: usize,
    pub duration: Duration,
}

pub struct Ingestor {
    client: ConfluenceClient,
    embedder: OllamaClient,
    store: VectorStore,
    chunking: ChunkingConfig,
}

impl Ingestor {
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let client = ConfluenceClient::new(&config.confluence)?;
        let embedder = OllamaClient::new(&config.ollama)?;
        let store = VectorStore::open(config).await?;

        Ok(Self {
            client,
            embedder,
            store,
            chunking: config.chunking,
        })
    }

    /// Crawl, normalize, and embed everything, then replace the index.
    ///
    /// Individual pages and attachments fail soft (logged, counted,
    /// skipped); only a failure to enumerate spaces aborts the run. The
    /// index is rebuilt only after the whole crawl completes, so a failed
    /// run leaves the previous index intact.
    #[inline]
    pub async fn run(&self) -> Result<IngestStats> {
        let started = Instant::now();

        let client = self.client.clone();
        let embedder = self.embedder.clone();
        let chunking = self.chunking;

        let (records, mut stats) =
            tokio::task::spawn_blocking(move || collect_records(&client, &embedder, chunking))
                .await
                .map_err(|e| QaError::Fetch(format!("Ingestion task failed: {}", e)))??;

        self.store.rebuild(&records).await?;

        stats.chunks = records.len();
        stats.duration = started.elapsed();

        info!(
            "Ingestion complete: {} spaces, {} pages, {} attachments, {} chunks, {} failed items in {:?}",
            stats.spaces, stats.pages, stats.attachments, stats.chunks, stats.failed_items,
            stats.duration
        );
        Ok(stats)
    }
}

fn collect_records(
    client: &ConfluenceClient,
    embedder: &OllamaClient,
    chunking: ChunkingConfig,
) -> Result<(Vec<ChunkRecord>, IngestStats)> {
    let spaces = client
        .list_spaces()
        .map_err(|e| QaError::Fetch(format!("Failed to enumerate spaces: {:#}", e)))?;

    info!("Found {} spaces to ingest", spaces.len());

    let mut stats = IngestStats {
        spaces: spaces.len(),
        ..IngestStats::default()
    };
    let mut records = Vec::new();

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}] Ingesting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    for space in &spaces {
        let pages = match client.list_pages(&space.key) {
            Ok(pages) => pages,
            Err(error) => {
                warn!("Failed to list pages in space {}: {:#}", space.key, error);
                stats.failed_items += 1;
                continue;
            }
        };

        info!("Space {} has {} pages", space.key, pages.len());

        for page in &pages {
            bar.set_message(format!("{}/{}", space.key, page.title));

            match ingest_page(client, embedder, chunking, &space.key, page) {
                Ok(mut page_records) => {
                    stats.pages += 1;
                    records.append(&mut page_records);
                }
                Err(error) => {
                    warn!("Skipping page {} ({}): {:#}", page.title, page.id, error);
                    stats.failed_items += 1;
                }
            }

            ingest_attachments(
                client,
                embedder,
                chunking,
                &space.key,
                page,
                &mut records,
                &mut stats,
            );

            bar.inc(1);
        }
    }

    bar.finish_and_clear();
    Ok((records, stats))
}

fn ingest_page(
    client: &ConfluenceClient,
    embedder: &OllamaClient,
    chunking: ChunkingConfig,
    space_key: &str,
    page: &Page,
) -> Result<Vec<ChunkRecord>> {
    let item = ContentItem {
        metadata: DocMetadata {
            source: page.title.clone(),
            kind: SourceKind::Page,
            space_key: space_key.to_string(),
            page_id: page.id.clone(),
            link: client.viewer_link(&page.id),
        },
        body: ItemBody::Html(page.storage_html().to_string()),
    };

    embed_document(embedder, chunking, &normalize(item))
}

/// Ingest every attachment under one page. Failures are logged and
/// counted; they never propagate.
fn ingest_attachments(
    client: &ConfluenceClient,
    embedder: &OllamaClient,
    chunking: ChunkingConfig,
    space_key: &str,
    page: &Page,
    records: &mut Vec<ChunkRecord>,
    stats: &mut IngestStats,
) {
    let attachments = match client.list_attachments(&page.id) {
        Ok(attachments) => attachments,
        Err(error) => {
            warn!(
                "Failed to list attachments for page {}: {:#}",
                page.id, error
            );
            stats.failed_items += 1;
            return;
        }
    };

    for attachment in &attachments {
        let bytes = match client.download_attachment(attachment.download_path()) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Failed to download {}: {:#}", attachment.title, error);
                stats.failed_items += 1;
                continue;
            }
        };

        let item = ContentItem {
            metadata: DocMetadata {
                source: attachment.title.clone(),
                kind: SourceKind::Attachment,
                space_key: space_key.to_string(),
                page_id: page.id.clone(),
                // Attachments link back to their parent page.
                link: client.viewer_link(&page.id),
            },
            body: ItemBody::Binary(bytes),
        };

        match embed_document(embedder, chunking, &normalize(item)) {
            Ok(mut attachment_records) => {
                stats.attachments += 1;
                records.append(&mut attachment_records);
            }
            Err(error) => {
                warn!("Skipping attachment {}: {:#}", attachment.title, error);
                stats.failed_items += 1;
            }
        }
    }
}

fn embed_document(
    embedder: &OllamaClient,
    chunking: ChunkingConfig,
    document: &NormalizedDocument,
) -> Result<Vec<ChunkRecord>> {
    let chunks = chunk_text(&document.text, &chunking);
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = embedder
        .embed_batch(&chunks)
        .map_err(|e| QaError::Embedding(format!("Failed to embed chunks: {:#}", e)))?;

    Ok(build_records(document, chunks, embeddings))
}

/// Pair each chunk with its embedding, stamping every record with the
/// source document's metadata.
fn build_records(
    document: &NormalizedDocument,
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
) -> Vec<ChunkRecord> {
    chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (content, vector))| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            content,
            chunk_index: index as u32,
            metadata: document.metadata.clone(),
        })
        .collect()
}
