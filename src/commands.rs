use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::api;
use crate::chat;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::VectorStore;
use crate::ingest::Ingestor;
use crate::qa::QaPipeline;

/// Crawl every Confluence space and rebuild the vector index
#[inline]
pub async fn run_ingest(config: &Config) -> Result<()> {
    config.validate_for_ingest()?;

    // Fail fast if the embedding backend is down rather than after the
    // whole crawl.
    let embedder = OllamaClient::new(&config.ollama)?;
    embedder
        .health_check()
        .context("Ollama is not reachable; start it before ingesting")?;

    info!(
        "Starting ingestion from {}",
        config.confluence.base_url
    );

    let ingestor = Ingestor::new(config).await?;
    let stats = ingestor.run().await?;

    println!("Ingestion completed successfully!");
    println!("  Spaces crawled: {}", stats.spaces);
    println!("  Pages ingested: {}", stats.pages);
    println!("  Attachments ingested: {}", stats.attachments);
    println!("  Chunks indexed: {}", stats.chunks);
    println!("  Failed items: {}", stats.failed_items);
    println!("  Duration: {:?}", stats.duration);

    Ok(())
}

/// Serve the HTTP question-answering API
#[inline]
pub async fn run_serve(config: &Config, port: u16) -> Result<()> {
    config.validate_for_query()?;

    let pipeline = Arc::new(QaPipeline::build(config).await?);

    let indexed = pipeline.indexed_chunks().await?;
    if indexed == 0 {
        println!("Warning: the vector index is empty. Run 'confluence-qa ingest' first;");
        println!("until then every query will get the fallback answer.");
    } else {
        info!("Serving over an index of {} chunks", indexed);
    }

    api::serve(pipeline, port).await?;
    Ok(())
}

/// Run the interactive terminal chat loop
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    config.validate_for_query()?;

    let pipeline = Arc::new(QaPipeline::build(config).await?);
    chat::run(pipeline).await
}

/// Report connectivity and index status
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Confluence Q&A Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔧 Configuration:");
    if config.confluence.base_url.is_empty() {
        println!("   ❌ Confluence: CONFLUENCE_BASE_URL is not set");
    } else {
        println!("   ✅ Confluence: {}", config.confluence.base_url);
    }
    if config.groq.api_key.is_empty() {
        println!("   ❌ Groq: GROQ_API_KEY is not set");
    } else {
        println!("   ✅ Groq: model {}", config.groq.model);
    }

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {}", e);
        }
    }

    println!("🔍 Vector Index Status:");
    match VectorStore::open(config).await {
        Ok(store) => match store.count().await {
            Ok(0) => {
                println!("   ⚠️  Index is empty ({})", config.index_dir.display());
                println!("   Run 'confluence-qa ingest' to build it.");
            }
            Ok(count) => {
                println!(
                    "   ✅ {} chunks indexed at {}",
                    count,
                    config.index_dir.display()
                );
            }
            Err(e) => {
                println!("   ❌ Failed to read index - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Failed to open index - {}", e);
        }
    }

    Ok(())
}
