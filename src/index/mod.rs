// Vector index data model and the LanceDB-backed store.

pub mod vector_store;

pub use vector_store::{SearchResult, VectorStore};

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of source material a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Page,
    Attachment,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Page => write!(f, "page"),
            SourceKind::Attachment => write!(f, "attachment"),
        }
    }
}

impl SourceKind {
    /// Parse the stored string form back into the enum; unknown values
    /// default to `Page` so a stale index never breaks retrieval.
    #[inline]
    pub fn parse(s: &str) -> Self {
        if s == "attachment" {
            SourceKind::Attachment
        } else {
            SourceKind::Page
        }
    }
}

/// Provenance metadata for one source document.
///
/// Carried unchanged from fetch through normalization to every chunk
/// produced from the document; chunk boundaries never split or merge
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Page title or attachment filename
    pub source: String,
    pub kind: SourceKind,
    /// Key of the Confluence space the document lives in
    pub space_key: String,
    /// Identifier of the page (attachments carry their parent page's id)
    pub page_id: String,
    /// Canonical viewer link for the page
    pub link: String,
}

/// One embedded chunk ready for storage in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this record
    pub id: String,
    /// The embedding vector
    pub vector: Vec<f32>,
    /// The chunk text that was embedded
    pub content: String,
    /// Position of this chunk within its source document
    pub chunk_index: u32,
    /// Provenance of the source document
    pub metadata: DocMetadata,
}
