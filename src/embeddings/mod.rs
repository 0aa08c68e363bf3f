// Embedding pipeline: text chunking and the Ollama embedding client.

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_text};
pub use ollama::OllamaClient;
