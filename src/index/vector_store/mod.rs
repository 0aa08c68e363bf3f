
use super::{ChunkRecord, DocMetadata, SourceKind};
use crate::{QaError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAME: &str = "chunks";

/// Persisted vector index over LanceDB.
///
/// Built once per ingestion run via [`VectorStore::rebuild`], which fully
/// replaces any previous index (no incremental update); opened read-only by
/// the query paths.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

/// One retrieved chunk with its similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub chunk_index: u32,
    pub metadata: DocMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the index directory and connect to LanceDB.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, QaError> {
        let db_path = &config.index_dir;
        debug!("Opening vector index at {:?}", db_path);

        std::fs::create_dir_all(db_path)
            .map_err(|e| QaError::Index(format!("Failed to create index directory: {}", e)))?;

        // A relative path would become the URL's host, not its path, so the
        // file URI must be built from an absolute path.
        let db_path = std::path::absolute(db_path)
            .map_err(|e| QaError::Index(format!("Failed to resolve index directory: {}", e)))?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to connect to vector index: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
        })
    }

    /// Replace the entire index with the given records.
    ///
    /// The previous table is dropped first; the vector dimension is taken
    /// from the first record.
    #[inline]
    pub async fn rebuild(&self, records: &[ChunkRecord]) -> Result<(), QaError> {
        self.drop_table_if_exists().await?;

        let Some(first) = records.first() else {
            info!("No chunk records produced; index left empty");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        let schema = create_schema(vector_dim);

        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to create chunks table: {}", e)))?;

        let record_batch = create_record_batch(records, vector_dim)?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to open chunks table: {}", e)))?;

        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to insert chunk records: {}", e)))?;

        info!(
            "Rebuilt vector index with {} chunks ({} dimensions)",
            records.len(),
            vector_dim
        );
        Ok(())
    }

    /// Retrieve the `limit` nearest chunks to the query vector.
    ///
    /// A missing or empty table yields an empty result set rather than an
    /// error, so a fresh deployment degrades to the fallback answer.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, QaError> {
        if !self.table_exists().await? {
            debug!("Chunks table does not exist; returning no results");
            return Ok(Vec::new());
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to open chunks table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| QaError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut stream = query
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| QaError::Index(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        debug!("Retrieved {} chunks for query", search_results.len());
        Ok(search_results)
    }

    /// Number of chunk records currently stored.
    #[inline]
    pub async fn count(&self) -> Result<u64, QaError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to open chunks table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Index(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    async fn table_exists(&self) -> Result<bool, QaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn drop_table_if_exists(&self) -> Result<(), QaError> {
        if self.table_exists().await? {
            info!("Dropping existing chunks table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| QaError::Index(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("space_key", DataType::Utf8, false),
        Field::new("page_id", DataType::Utf8, false),
        Field::new("link", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch, QaError> {
    let len = records.len();
    let created_at = chrono::Utc::now().to_rfc3339();

    let mut ids = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut kinds = Vec::with_capacity(len);
    let mut space_keys = Vec::with_capacity(len);
    let mut page_ids = Vec::with_capacity(len);
    let mut links = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);

    for record in records {
        if record.vector.len() != vector_dim {
            return Err(QaError::Index(format!(
                "Inconsistent vector dimensions: expected {}, got {} for chunk {}",
                vector_dim,
                record.vector.len(),
                record.id
            )));
        }

        ids.push(record.id.as_str());
        contents.push(record.content.as_str());
        chunk_indices.push(record.chunk_index);
        sources.push(record.metadata.source.as_str());
        kinds.push(record.metadata.kind.to_string());
        space_keys.push(record.metadata.space_key.as_str());
        page_ids.push(record.metadata.page_id.as_str());
        links.push(record.metadata.link.as_str());
        created_ats.push(created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| QaError::Index(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(kinds)),
        Arc::new(StringArray::from(space_keys)),
        Arc::new(StringArray::from(page_ids)),
        Arc::new(StringArray::from(links)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| QaError::Index(format!("Failed to create record batch: {}", e)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, QaError> {
    let num_rows = batch.num_rows();
    let mut search_results = Vec::with_capacity(num_rows);

    let string_column = |name: &str| -> Result<&StringArray, QaError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| QaError::Index(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| QaError::Index(format!("Invalid {} column type", name)))
    };

    let contents = string_column("content")?;
    let sources = string_column("source")?;
    let kinds = string_column("kind")?;
    let space_keys = string_column("space_key")?;
    let page_ids = string_column("page_id")?;
    let links = string_column("link")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| QaError::Index("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| QaError::Index("Invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    for row in 0..num_rows {
        let metadata = DocMetadata {
            source: sources.value(row).to_string(),
            kind: SourceKind::parse(kinds.value(row)),
            space_key: space_keys.value(row).to_string(),
            page_id: page_ids.value(row).to_string(),
            link: links.value(row).to_string(),
        };

        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        search_results.push(SearchResult {
            content: contents.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            metadata,
            similarity_score: 1.0 - distance,
            distance,
        });
    }

    Ok(search_results)
}
