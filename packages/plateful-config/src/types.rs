use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub agent: Agent,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	#[serde(default)]
	pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub food_collection: String,
	pub manual_collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub chat: LlmProviderConfig,
	pub reasoning: LlmProviderConfig,
	pub backend: BackendConfig,
	pub web_search: WebSearchConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Planner backend the agent reads meal plans, pantry, and profiles from.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
	pub base_url: String,
	pub timeout_ms: u64,
}

/// SearXNG-compatible search endpoint for questions outside the catalog.
#[derive(Debug, Deserialize)]
pub struct WebSearchConfig {
	pub base_url: String,
	pub timeout_ms: u64,
	#[serde(default = "default_max_results")]
	pub max_results: usize,
}

fn default_max_results() -> usize {
	3
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	/// First-stage candidate pool size as a multiple of the requested k.
	pub overfetch_factor: u32,
	/// Additive bonus applied after reranking when the lexical path also hit.
	pub keyword_boost_weight: f32,
	/// Dense hits below this similarity are dropped before merging.
	pub min_score: f32,
	pub default_k: usize,
	pub max_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct Agent {
	/// Turn count past which older history is summarized before deciding.
	pub summarize_after_turns: usize,
	/// Most recent turns kept verbatim when summarizing.
	pub keep_recent_turns: usize,
	pub idle_ttl_secs: u64,
}
