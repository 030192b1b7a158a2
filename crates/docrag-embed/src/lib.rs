//! Embedding backends: a local candle sentence-transformer and a deterministic
//! hashing embedder used for offline runs and tests.

pub mod bert;
pub mod device;
pub mod hashing;
pub mod pool;
pub mod tokenize;

pub use bert::BertEmbedder;
pub use hashing::HashingEmbedder;
pub use pool::masked_mean_l2;
