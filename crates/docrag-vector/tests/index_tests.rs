use std::sync::Arc;

use arrow_array::RecordBatchIterator;
use arrow_schema::{DataType, Field, Schema};
use docrag_core::types::{ChunkMetadata, IndexEntry};
use docrag_core::Error;
use docrag_vector::VectorIndex;
use tempfile::TempDir;

fn entry(source: &str, seq: usize, embedding: Vec<f32>, text: &str) -> IndexEntry {
    IndexEntry {
        id: format!("{source}_chunk_{seq}"),
        embedding,
        metadata: ChunkMetadata { source: source.into(), sequence_index: seq },
        text: text.into(),
    }
}

#[tokio::test]
async fn empty_index_returns_no_hits() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    assert_eq!(index.dimension().await, None);
    assert_eq!(index.count().await.expect("count"), 0);
    assert!(index.query(&[1.0, 0.0, 0.0], 4).await.expect("query").is_empty());
}

#[tokio::test]
async fn exact_match_ranks_first_with_max_score() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index
        .upsert(&[
            entry("a.txt", 0, vec![1.0, 0.0, 0.0], "alpha"),
            entry("a.txt", 1, vec![0.6, 0.8, 0.0], "beta"),
            entry("b.txt", 0, vec![0.0, 0.0, 1.0], "gamma"),
        ])
        .await
        .expect("upsert");

    let hits = index.query(&[0.6, 0.8, 0.0], 2).await.expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].entry.id, "a.txt_chunk_1");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[1].entry.id, "a.txt_chunk_0");
    assert_eq!(hits[0].entry.metadata, ChunkMetadata { source: "a.txt".into(), sequence_index: 1 });
    assert_eq!(hits[0].entry.text, "beta");

    assert!(index.query(&[0.6, 0.8, 0.0], 0).await.expect("k=0").is_empty());
    assert_eq!(index.query(&[0.6, 0.8, 0.0], 10).await.expect("k>n").len(), 3);
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index.insert(entry("t.txt", 0, vec![1.0, 1.0], "first")).await.expect("insert");
    index.insert(entry("t.txt", 1, vec![1.0, 1.0], "second")).await.expect("insert");
    index.insert(entry("t.txt", 2, vec![1.0, 1.0], "third")).await.expect("insert");

    let hits = index.query(&[1.0, 1.0], 3).await.expect("query");
    let texts: Vec<&str> = hits.iter().map(|h| h.entry.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn upsert_replaces_instead_of_duplicating() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index.insert(entry("a.txt", 0, vec![1.0, 0.0], "old")).await.expect("insert");
    index.insert(entry("a.txt", 0, vec![0.0, 1.0], "new")).await.expect("insert");

    assert_eq!(index.count().await.expect("count"), 1);
    let stored = index.get("a.txt_chunk_0").await.expect("get").expect("present");
    assert_eq!(stored.text, "new");
    assert_eq!(stored.embedding, vec![0.0, 1.0]);
}

#[tokio::test]
async fn dimension_mismatch_is_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index.insert(entry("a.txt", 0, vec![1.0, 0.0, 0.0], "x")).await.expect("insert");

    let err = index.query(&[1.0, 0.0], 1).await.expect_err("query width");
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));

    let err = index.insert(entry("a.txt", 1, vec![1.0; 4], "y")).await.expect_err("insert width");
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 4 }));
    assert_eq!(err.kind(), "DimensionMismatchError");
}

#[tokio::test]
async fn reopening_keeps_entries_and_dimension() {
    let tmp = TempDir::new().expect("tmp");
    {
        let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
        index
            .upsert(&[entry("a.txt", 0, vec![1.0, 0.0], "kept"), entry("a.txt", 1, vec![1.0, 0.0], "later")])
            .await
            .expect("upsert");
        index.ensure_embedder("hashing-d2").await.expect("record model");
    }

    let index = VectorIndex::open(tmp.path(), "docs").await.expect("reopen");
    assert_eq!(index.dimension().await, Some(2));
    assert_eq!(index.count().await.expect("count"), 2);
    assert_eq!(index.embedder_id().await.expect("meta").as_deref(), Some("hashing-d2"));

    // rows added after re-open still rank after the originals on a tie
    index.insert(entry("b.txt", 0, vec![1.0, 0.0], "newest")).await.expect("insert");
    let hits = index.query(&[1.0, 0.0], 3).await.expect("query");
    let texts: Vec<&str> = hits.iter().map(|h| h.entry.text.as_str()).collect();
    assert_eq!(texts, vec!["kept", "later", "newest"]);

    let other = VectorIndex::open(tmp.path(), "other").await.expect("open other");
    assert_eq!(other.count().await.expect("count"), 0);
}

#[tokio::test]
async fn embedder_guard_rejects_a_different_model() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index.verify_embedder("anything").await.expect("nothing recorded yet");

    index.ensure_embedder("model-a").await.expect("record");
    index.ensure_embedder("model-a").await.expect("same model");
    index.verify_embedder("model-a").await.expect("same model");

    let err = index.verify_embedder("model-b").await.expect_err("mismatch");
    assert!(matches!(err, Error::ModelMismatch { ref stored, ref requested } if stored == "model-a" && requested == "model-b"));
    assert!(index.ensure_embedder("model-b").await.is_err());
}

#[tokio::test]
async fn delete_by_id_and_by_source() {
    let tmp = TempDir::new().expect("tmp");
    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index
        .upsert(&[
            entry("a.txt", 0, vec![1.0, 0.0], "a0"),
            entry("a.txt", 1, vec![1.0, 0.0], "a1"),
            entry("o'brien.txt", 0, vec![0.0, 1.0], "b0"),
        ])
        .await
        .expect("upsert");

    let docs = index.documents().await.expect("documents");
    assert_eq!(docs.get("a.txt"), Some(&2));
    assert_eq!(docs.get("o'brien.txt"), Some(&1));

    assert!(index.delete("a.txt_chunk_1").await.expect("delete"));
    assert!(!index.delete("a.txt_chunk_1").await.expect("delete again"));
    assert_eq!(index.delete_source("o'brien.txt").await.expect("delete source"), 1);
    assert_eq!(index.count().await.expect("count"), 1);
    assert!(index.get("o'brien.txt_chunk_0").await.expect("get").is_none());
}

#[tokio::test]
async fn broken_meta_table_does_not_strand_a_new_collection() {
    let tmp = TempDir::new().expect("tmp");
    let conn = lancedb::connect(tmp.path().to_string_lossy().as_ref()).execute().await.expect("connect");
    let schema = Arc::new(Schema::new(vec![Field::new("other", DataType::Int64, false)]));
    let empty = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table("collection_meta", Box::new(empty)).execute().await.expect("meta table");

    let index = VectorIndex::open(tmp.path(), "docs").await.expect("open");
    index.insert(entry("a.txt", 0, vec![1.0, 0.0], "first")).await.expect("rows stored without meta");
    assert_eq!(index.dimension().await, Some(2));

    index.insert(entry("a.txt", 1, vec![0.0, 1.0], "second")).await.expect("table already established");
    assert_eq!(index.count().await.expect("count"), 2);
    let hits = index.query(&[1.0, 0.0], 2).await.expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].entry.text, "first");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_and_queries() {
    const WRITERS: usize = 8;
    let tmp = TempDir::new().expect("tmp");
    let index = Arc::new(VectorIndex::open(tmp.path(), "docs").await.expect("open"));
    index.insert(entry("seed.txt", 0, vec![1.0, 1.0], "seed")).await.expect("seed");

    let mut tasks = Vec::new();
    for i in 0..WRITERS {
        let writer = index.clone();
        tasks.push(tokio::spawn(async move {
            writer.insert(entry("w.txt", i, vec![1.0, 1.0], &format!("w{i}"))).await.map(|()| 0)
        }));
        let reader = index.clone();
        tasks.push(tokio::spawn(async move {
            let hits = reader.query(&[1.0, 1.0], 100).await?;
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            // the oldest row wins every tie
            assert_eq!(hits[0].entry.text, "seed");
            Ok::<usize, Error>(hits.len())
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("index operation");
    }

    assert_eq!(index.count().await.expect("count"), WRITERS + 1);
    let first: Vec<String> = index.query(&[1.0, 1.0], 100).await.expect("query").into_iter().map(|h| h.entry.id).collect();
    let again: Vec<String> = index.query(&[1.0, 1.0], 100).await.expect("query").into_iter().map(|h| h.entry.id).collect();
    assert_eq!(first.len(), WRITERS + 1);
    assert_eq!(first[0], "seed.txt_chunk_0");
    assert_eq!(first, again);
    for i in 0..WRITERS {
        assert!(first.contains(&format!("w.txt_chunk_{i}")));
    }
}
