use docrag_core::traits::Embedder;
use docrag_embed::{BertEmbedder, HashingEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn hashing_embedder_shapes_and_determinism() {
    let embedder = HashingEmbedder::new(384).expect("embedder");
    assert_eq!(embedder.model_id(), "hashing-d384");

    let v1 = embedder.embed("hello world").await.expect("embed");
    let v2 = embedder.embed("hello world").await.expect("embed");
    assert_eq!(v1.len(), 384, "embedding dim is 384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn shared_words_score_higher() {
    let embedder = HashingEmbedder::new(256).expect("embedder");
    let query = embedder.embed("what colour is the sky").await.expect("embed");
    let near = embedder.embed("The sky is blue.").await.expect("embed");
    let far = embedder.embed("Bananas grow in tropical plantations.").await.expect("embed");
    assert!(cosine(&query, &near) > cosine(&query, &far));
}

#[test]
fn missing_model_dir_is_a_config_error() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let err = BertEmbedder::load("sentence-transformers/all-MiniLM-L6-v2", tmp.path(), 256)
        .err()
        .expect("no model files");
    assert_eq!(err.kind(), "ConfigError");
}
