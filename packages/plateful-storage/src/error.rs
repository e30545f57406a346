pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] qdrant_client::QdrantError),
	#[error("{message}")]
	Index { message: String },
}
