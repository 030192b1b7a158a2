//! Persistent vector collections on LanceDB.

pub mod index;
pub mod schema;
pub mod similarity;
pub mod table;

pub use index::VectorIndex;
