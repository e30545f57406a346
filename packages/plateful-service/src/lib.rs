pub mod agent;
pub mod conversations;
pub mod prompts;
pub mod rag;
pub mod rank;
pub mod retrieve;
pub mod tools;

use std::{future::Future, pin::Pin, sync::Arc};

use futures::StreamExt;
use serde_json::Value;

pub use agent::{ChatTurnRequest, HistoryMessage, StreamEvent};
use conversations::ConversationRegistry;
use plateful_config::{BackendConfig, Config, EmbeddingProviderConfig, LlmProviderConfig,
	ProviderConfig, WebSearchConfig};
use plateful_domain::{Corpus, constraint::Predicate};
use plateful_providers::{
	backend, backend::BackendResource, chat, embedding, reasoning, rerank, web_search,
	web_search::WebHit,
};
use plateful_storage::{QdrantStore, RetrievedDoc};
pub use rag::SearchOutcome;
pub use rank::RankedResult;
pub use retrieve::{CandidateItem, CandidateSource, RetrievalOutcome};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Ordered assistant token deltas; ends after the provider's terminal marker.
pub type TokenStream = futures::stream::BoxStream<'static, color_eyre::Result<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid constraint: {message}")]
	InvalidConstraint { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval unavailable: {message}")]
	RetrievalUnavailable { message: String },
	#[error("Tool execution failed: {message}")]
	ToolExecutionFailed { message: String },
	#[error("Upstream model error: {message}")]
	UpstreamModel { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
}
impl From<plateful_domain::constraint::ConstraintError> for ServiceError {
	fn from(err: plateful_domain::constraint::ConstraintError) -> Self {
		Self::InvalidConstraint { message: err.to_string() }
	}
}
impl From<plateful_storage::Error> for ServiceError {
	fn from(err: plateful_storage::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::UpstreamModel { message: err.to_string() }
	}
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>>;

	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait ReasoningProvider
where
	Self: Send + Sync,
{
	fn extract_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait BackendProvider
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		resource: &'a BackendResource,
		user_token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait WebSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<WebHit>>>;
}

/// Index seam over the two corpora. The real implementation is Qdrant; the
/// test one evaluates predicates in memory.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	fn dense<'a>(
		&'a self,
		corpus: Corpus,
		query_vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RetrievedDoc>>>;

	fn keyword<'a>(
		&'a self,
		corpus: Corpus,
		query_text: &'a str,
		predicate: &'a Predicate,
		limit: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RetrievedDoc>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub chat: Arc<dyn ChatProvider>,
	pub reasoning: Arc<dyn ReasoningProvider>,
	pub backend: Arc<dyn BackendProvider>,
	pub search: Arc<dyn WebSearchProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl ChatProvider for DefaultProviders {
	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		Box::pin(async move {
			let inner = chat::stream(cfg, messages).await?;
			let stream = futures::stream::unfold(Some(inner), |state| async move {
				let mut inner = state?;

				match inner.next_delta().await {
					Ok(Some(delta)) => Some((Ok(delta), Some(inner))),
					Ok(None) => None,
					Err(err) => Some((Err(err), None)),
				}
			});

			Ok(stream.boxed())
		})
	}

	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(chat::complete(cfg, messages))
	}
}

impl ReasoningProvider for DefaultProviders {
	fn extract_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(reasoning::extract_json(cfg, messages))
	}

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(reasoning::complete_text(cfg, messages))
	}
}

impl BackendProvider for DefaultProviders {
	fn fetch<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		resource: &'a BackendResource,
		user_token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(backend::fetch(cfg, resource, user_token))
	}
}

impl WebSearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<WebHit>>> {
		Box::pin(web_search::search(cfg, query))
	}
}

impl SearchIndex for QdrantStore {
	fn dense<'a>(
		&'a self,
		corpus: Corpus,
		query_vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RetrievedDoc>>> {
		Box::pin(async move {
			Ok(self.dense_query(corpus, query_vector, predicate, limit).await?)
		})
	}

	fn keyword<'a>(
		&'a self,
		corpus: Corpus,
		query_text: &'a str,
		predicate: &'a Predicate,
		limit: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RetrievedDoc>>> {
		Box::pin(async move {
			Ok(self.keyword_query(corpus, query_text, predicate, limit).await?)
		})
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			rerank: provider.clone(),
			chat: provider.clone(),
			reasoning: provider.clone(),
			backend: provider.clone(),
			search: provider,
		}
	}
}

pub struct Service {
	pub cfg: Config,
	pub providers: Providers,
	pub index: Arc<dyn SearchIndex>,
	pub conversations: ConversationRegistry,
}
impl Service {
	pub fn new(cfg: Config) -> ServiceResult<Self> {
		let store = QdrantStore::new(&cfg.storage.qdrant)?;

		Ok(Self::with_parts(cfg, Providers::default(), Arc::new(store)))
	}

	pub fn with_parts(cfg: Config, providers: Providers, index: Arc<dyn SearchIndex>) -> Self {
		Self { cfg, providers, index, conversations: ConversationRegistry::default() }
	}
}
