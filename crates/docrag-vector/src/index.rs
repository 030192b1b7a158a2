use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int64Type};
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use tokio::sync::RwLock;

use docrag_core::types::{ChunkMetadata, IndexEntry, RetrievalResult, ScoredEntry};
use docrag_core::{Error, Result};

use crate::schema::{build_collection_schema, vector_dimension, VECTOR_COLUMN};
use crate::similarity::{cosine_similarity, rank_order};
use crate::table::{get_meta, meta_key, open_db, set_meta, sql_literal, table_exists};

/// A persistent, named collection of embedded chunks backed by one LanceDB table.
///
/// The vector width is fixed by the first insert and recovered from the table
/// schema on re-open. Queries are exact: every row is scored by cosine
/// similarity, ties go to the row inserted first.
pub struct VectorIndex {
    conn: Connection,
    collection: String,
    layout: RwLock<Option<Layout>>,
}

struct Layout {
    table: Table,
    dimension: usize,
    next_seq: i64,
}

struct StoredRow {
    entry: IndexEntry,
    insert_seq: i64,
}

fn store_error(message: impl Into<String>) -> Error {
    Error::Store { message: message.into(), source: None }
}

impl VectorIndex {
    /// Open (or lazily create) `collection` in the database at `path`.
    ///
    /// Re-opening is non-destructive: existing rows stay queryable.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if collection.trim().is_empty() {
            return Err(Error::InvalidConfig("collection name must not be empty".into()));
        }
        let conn = open_db(path).await?;
        let layout = if table_exists(&conn, collection).await? {
            let table = conn.open_table(collection).execute().await.map_err(Error::store)?;
            let schema = table.schema().await.map_err(Error::store)?;
            let dimension = vector_dimension(&schema)
                .ok_or_else(|| store_error(format!("collection '{collection}' has no vector column")))?;
            let next_seq = max_insert_seq(&table).await? + 1;
            Some(Layout { table, dimension, next_seq })
        } else {
            None
        };
        tracing::debug!(
            path = %path.display(),
            collection,
            dimension = layout.as_ref().map(|l| l.dimension),
            "opened vector index"
        );
        Ok(Self { conn, collection: collection.to_string(), layout: RwLock::new(layout) })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Established vector width, `None` until the first insert.
    pub async fn dimension(&self) -> Option<usize> {
        self.layout.read().await.as_ref().map(|l| l.dimension)
    }

    /// Insert or replace a single entry.
    pub async fn insert(&self, entry: IndexEntry) -> Result<()> {
        self.upsert(std::slice::from_ref(&entry)).await
    }

    /// Insert or replace entries by id. A replaced row takes every field from
    /// the new entry and counts as freshly inserted for tie-breaking.
    pub async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let entries = last_write_wins(entries);
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let mut guard = self.layout.write().await;
        let dimension = guard.as_ref().map_or(first.embedding.len(), |l| l.dimension);
        if dimension == 0 {
            return Err(store_error("cannot index an empty embedding"));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(Error::DimensionMismatch { expected: dimension, actual: bad.embedding.len() });
        }

        if let Some(layout) = guard.as_mut() {
            let batch = encode(&entries, dimension, layout.next_seq)?;
            let schema = batch.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            let mut mi = layout.table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(reader).await.map_err(Error::store)?;
            layout.next_seq += entries.len() as i64;
            tracing::debug!(collection = %self.collection, rows = entries.len(), "upserted entries");
            return Ok(());
        }

        let batch = encode(&entries, dimension, 0)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self
            .conn
            .create_table(&self.collection, reader)
            .execute()
            .await
            .map_err(Error::store)?;
        *guard = Some(Layout { table, dimension, next_seq: entries.len() as i64 });
        tracing::info!(collection = %self.collection, dimension, rows = entries.len(), "created collection");
        // the width is recovered from the table schema; the meta row is informational
        if let Err(e) = set_meta(&self.conn, &meta_key(&self.collection, "dimension"), &dimension.to_string()).await {
            tracing::warn!(collection = %self.collection, error = %e, "could not record collection dimension");
        }
        Ok(())
    }

    /// Up to `k` entries ranked by cosine similarity to `embedding`.
    ///
    /// An index without an established width returns nothing; a query of the
    /// wrong width is a `DimensionMismatch`.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult> {
        let guard = self.layout.read().await;
        let Some(layout) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        if embedding.len() != layout.dimension {
            return Err(Error::DimensionMismatch { expected: layout.dimension, actual: embedding.len() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, StoredRow)> = scan(&layout.table, None)
            .await?
            .into_iter()
            .map(|row| (cosine_similarity(embedding, &row.entry.embedding), row))
            .collect();
        scored.sort_by(|a, b| rank_order((a.0, a.1.insert_seq), (b.0, b.1.insert_seq)));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(score, row)| ScoredEntry { entry: row.entry, score }).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        let guard = self.layout.read().await;
        let Some(layout) = guard.as_ref() else {
            return Ok(None);
        };
        let rows = scan(&layout.table, Some(format!("id = {}", sql_literal(id)))).await?;
        Ok(rows.into_iter().next().map(|r| r.entry))
    }

    pub async fn count(&self) -> Result<usize> {
        match self.layout.read().await.as_ref() {
            Some(layout) => layout.table.count_rows(None).await.map_err(Error::store),
            None => Ok(0),
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.delete_where(format!("id = {}", sql_literal(id))).await? > 0)
    }

    /// Remove every chunk of one document. Returns the number removed.
    pub async fn delete_source(&self, source: &str) -> Result<usize> {
        let removed = self.delete_where(format!("source = {}", sql_literal(source))).await?;
        tracing::info!(collection = %self.collection, source, removed, "deleted document");
        Ok(removed)
    }

    async fn delete_where(&self, predicate: String) -> Result<usize> {
        let guard = self.layout.write().await;
        let Some(layout) = guard.as_ref() else {
            return Ok(0);
        };
        let matching = layout.table.count_rows(Some(predicate.clone())).await.map_err(Error::store)?;
        if matching > 0 {
            layout.table.delete(&predicate).await.map_err(Error::store)?;
        }
        Ok(matching)
    }

    /// Chunk count per document, ordered by document name.
    pub async fn documents(&self) -> Result<BTreeMap<String, usize>> {
        let guard = self.layout.read().await;
        let mut counts = BTreeMap::new();
        let Some(layout) = guard.as_ref() else {
            return Ok(counts);
        };
        for batch in collect_batches(&layout.table, None, Some(&["source"])).await? {
            let sources = string_column(&batch, "source")?;
            for i in 0..batch.num_rows() {
                *counts.entry(sources.value(i).to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Embedding model the collection was built with, if recorded.
    pub async fn embedder_id(&self) -> Result<Option<String>> {
        get_meta(&self.conn, &meta_key(&self.collection, "embedder")).await
    }

    /// Record `model_id` as the collection's embedder, or fail if a different one is recorded.
    pub async fn ensure_embedder(&self, model_id: &str) -> Result<()> {
        match self.embedder_id().await? {
            Some(stored) if stored == model_id => Ok(()),
            Some(stored) => Err(Error::ModelMismatch { stored, requested: model_id.to_string() }),
            None => set_meta(&self.conn, &meta_key(&self.collection, "embedder"), model_id).await,
        }
    }

    /// Fail fast when the collection was built with a different embedder.
    pub async fn verify_embedder(&self, model_id: &str) -> Result<()> {
        match self.embedder_id().await? {
            Some(stored) if stored != model_id => {
                Err(Error::ModelMismatch { stored, requested: model_id.to_string() })
            }
            _ => Ok(()),
        }
    }
}

/// Keep only the last entry per id, preserving the order of those survivors.
fn last_write_wins(entries: &[IndexEntry]) -> Vec<IndexEntry> {
    let mut seen = HashSet::new();
    let mut out: Vec<IndexEntry> = entries.iter().rev().filter(|e| seen.insert(e.id.as_str())).cloned().collect();
    out.reverse();
    out
}

fn encode(entries: &[IndexEntry], dimension: usize, first_seq: i64) -> Result<RecordBatch> {
    let width = i32::try_from(dimension).map_err(|_| store_error(format!("dimension {dimension} too large")))?;
    RecordBatch::try_new(
        build_collection_schema(width),
        vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.id.as_str()))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.metadata.source.as_str()))),
            Arc::new(Int64Array::from_iter_values(entries.iter().map(|e| e.metadata.sequence_index as i64))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.text.as_str()))),
            Arc::new(Int64Array::from_iter_values((0..entries.len()).map(|i| first_seq + i as i64))),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                entries.iter().map(|e| Some(e.embedding.iter().copied().map(Some))),
                width,
            )),
        ],
    )
    .map_err(Error::store)
}

async fn collect_batches(table: &Table, filter: Option<String>, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let total = table.count_rows(filter.clone()).await.map_err(Error::store)?;
    if total == 0 {
        return Ok(Vec::new());
    }
    let mut query = table.query().limit(total);
    if let Some(filter) = filter {
        query = query.only_if(filter);
    }
    if let Some(columns) = columns {
        query = query.select(Select::columns(columns));
    }
    let stream = query.execute().await.map_err(Error::store)?;
    stream.try_collect().await.map_err(Error::store)
}

async fn scan(table: &Table, filter: Option<String>) -> Result<Vec<StoredRow>> {
    let mut rows = Vec::new();
    for batch in collect_batches(table, filter, None).await? {
        decode(&batch, &mut rows)?;
    }
    Ok(rows)
}

async fn max_insert_seq(table: &Table) -> Result<i64> {
    let mut max = -1;
    for batch in collect_batches(table, None, Some(&["insert_seq"])).await? {
        let seqs = int_column(&batch, "insert_seq")?;
        max = seqs.values().iter().copied().fold(max, i64::max);
    }
    Ok(max)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| store_error(format!("{name} column missing")))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .ok_or_else(|| store_error(format!("{name} column missing")))
}

fn decode(batch: &RecordBatch, out: &mut Vec<StoredRow>) -> Result<()> {
    let ids = string_column(batch, "id")?;
    let sources = string_column(batch, "source")?;
    let texts = string_column(batch, "text")?;
    let sequence = int_column(batch, "sequence_index")?;
    let insert_seq = int_column(batch, "insert_seq")?;
    let vectors = batch
        .column_by_name(VECTOR_COLUMN)
        .and_then(|c| c.as_fixed_size_list_opt())
        .ok_or_else(|| store_error("vector column missing"))?;

    for i in 0..batch.num_rows() {
        let sequence_index = usize::try_from(sequence.value(i))
            .map_err(|_| store_error(format!("negative sequence_index for {}", ids.value(i))))?;
        let embedding = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
        out.push(StoredRow {
            entry: IndexEntry {
                id: ids.value(i).to_string(),
                embedding,
                metadata: ChunkMetadata { source: sources.value(i).to_string(), sequence_index },
                text: texts.value(i).to_string(),
            },
            insert_seq: insert_seq.value(i),
        });
    }
    Ok(())
}
