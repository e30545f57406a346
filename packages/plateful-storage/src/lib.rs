mod error;
pub mod qdrant;

pub use error::{Error, Result};
pub use qdrant::{BM25_MODEL, BM25_VECTOR_NAME, DENSE_VECTOR_NAME, QdrantStore, RetrievedDoc};
