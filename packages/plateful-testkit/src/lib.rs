//! Deterministic mocks for service tests: scripted providers, an in-memory
//! vector index that evaluates predicates directly, and a small sample
//! corpus. Every mock supports failure injection through atomic flags.

mod index;
mod providers;

pub use index::MockIndex;
pub use providers::{
	MockBackend, MockChat, MockEmbedding, MockReasoning, MockRerank, MockWebSearch,
};

use std::sync::Arc;

use plateful_config::{
	Agent, BackendConfig, Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig,
	Providers as ProviderSection, Qdrant, Retrieval, Service as ServiceSection, Storage,
	WebSearchConfig,
};
use plateful_domain::{Corpus, constraint::ItemAttributes};
use plateful_service::{Providers, Service};

pub const TEST_VECTOR_DIM: usize = 8;

/// Deterministic pseudo-embedding: a normalized bag-of-words hash. The same
/// function drives the mock embedding provider and corpus ingestion, so
/// dense similarity behaves consistently end to end.
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
	let mut vector = vec![0.0f32; dim];

	for word in text.to_lowercase().split_whitespace() {
		let mut hash: u64 = 1469598103934665603;

		for byte in word.bytes() {
			hash ^= byte as u64;
			hash = hash.wrapping_mul(1099511628211);
		}

		vector[(hash % dim as u64) as usize] += 1.0;
	}

	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}

/// A config with mock-friendly defaults; no file involved.
pub fn test_config() -> Config {
	Config {
		service: ServiceSection {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "debug".to_string(),
			allowed_origins: Vec::new(),
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				food_collection: "foods_test".to_string(),
				manual_collection: "manual_test".to_string(),
				vector_dim: TEST_VECTOR_DIM as u32,
			},
		},
		providers: ProviderSection {
			embedding: EmbeddingProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "mock-embed".to_string(),
				dimensions: TEST_VECTOR_DIM as u32,
				timeout_ms: 1000,
				default_headers: serde_json::Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test".to_string(),
				path: "/v1/rerank".to_string(),
				model: "mock-rerank".to_string(),
				timeout_ms: 1000,
				default_headers: serde_json::Map::new(),
			},
			chat: LlmProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "mock-chat".to_string(),
				temperature: 0.0,
				timeout_ms: 1000,
				default_headers: serde_json::Map::new(),
			},
			reasoning: LlmProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "mock-reasoning".to_string(),
				temperature: 0.0,
				timeout_ms: 1000,
				default_headers: serde_json::Map::new(),
			},
			backend: BackendConfig { base_url: "http://127.0.0.1:1".to_string(), timeout_ms: 1000 },
			web_search: WebSearchConfig {
				base_url: "http://127.0.0.1:1".to_string(),
				timeout_ms: 1000,
				max_results: 3,
			},
		},
		retrieval: Retrieval {
			overfetch_factor: 4,
			keyword_boost_weight: 0.05,
			min_score: 0.0,
			default_k: 5,
			max_k: 20,
		},
		agent: Agent { summarize_after_turns: 6, keep_recent_turns: 2, idle_ttl_secs: 1800 },
	}
}

/// Fixture bundle so tests can flip failure flags after construction.
pub struct TestHarness {
	pub service: Arc<Service>,
	pub index: Arc<MockIndex>,
	pub embedding: Arc<MockEmbedding>,
	pub rerank: Arc<MockRerank>,
	pub chat: Arc<MockChat>,
	pub reasoning: Arc<MockReasoning>,
	pub backend: Arc<MockBackend>,
	pub web: Arc<MockWebSearch>,
}

pub fn harness() -> TestHarness {
	harness_with_config(test_config())
}

pub fn harness_with_config(cfg: Config) -> TestHarness {
	let index = Arc::new(MockIndex::default());
	let embedding = Arc::new(MockEmbedding::default());
	let rerank = Arc::new(MockRerank::default());
	let chat = Arc::new(MockChat::default());
	let reasoning = Arc::new(MockReasoning::default());
	let backend = Arc::new(MockBackend::default());
	let web = Arc::new(MockWebSearch::default());
	let providers = Providers {
		embedding: embedding.clone(),
		rerank: rerank.clone(),
		chat: chat.clone(),
		reasoning: reasoning.clone(),
		backend: backend.clone(),
		search: web.clone(),
	};
	let service = Arc::new(Service::with_parts(cfg, providers, index.clone()));

	TestHarness { service, index, embedding, rerank, chat, reasoning, backend, web }
}

fn food(
	id: &str,
	name: &str,
	calories: f64,
	protein_g: f64,
	carbs_g: f64,
	slots: (bool, bool, bool, bool),
	tags: &[&str],
) -> (String, String, ItemAttributes) {
	let attributes = ItemAttributes {
		name: name.to_string(),
		calories,
		protein_g,
		carbs_g,
		fat_g: 10.0,
		fiber_g: 4.0,
		total_time_minutes: 30.0,
		is_breakfast: slots.0,
		is_lunch: slots.1,
		is_dinner: slots.2,
		is_snack: slots.3,
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
	};

	(id.to_string(), name.to_string(), attributes)
}

/// Eight foods spanning slots, macros, and tags.
pub fn sample_foods() -> Vec<(String, String, ItemAttributes)> {
	vec![
		food("f1", "Grilled chicken salad", 420.0, 38.0, 12.0, (false, true, true, false), &[
			"gluten-free",
		]),
		food("f2", "Keto salmon with asparagus", 510.0, 34.0, 6.0, (false, false, true, false), &[
			"keto",
			"gluten-free",
		]),
		food("f3", "Overnight oats with berries", 350.0, 14.0, 52.0, (true, false, false, false), &[
			"vegetarian",
		]),
		food("f4", "Lentil soup", 320.0, 18.0, 40.0, (false, true, true, false), &[
			"vegan",
			"vegetarian",
		]),
		food("f5", "Keto beef stir fry", 560.0, 36.0, 9.0, (false, false, true, false), &["keto"]),
		food("f6", "Greek yogurt with almonds", 220.0, 19.0, 11.0, (true, false, false, true), &[
			"vegetarian",
			"gluten-free",
		]),
		food("f7", "Chicken pesto pasta", 680.0, 33.0, 70.0, (false, true, true, false), &[
			"contains-gluten",
		]),
		food("f8", "Tofu buddha bowl", 450.0, 22.0, 48.0, (false, true, true, false), &[
			"vegan",
			"vegetarian",
		]),
	]
}

/// A few manual sections for the documentation corpus.
pub fn sample_manual() -> Vec<(String, String)> {
	vec![
		(
			"m1".to_string(),
			"Shopping lists: open the planner, select a week, and tap Export \
shopping list to generate one from your planned meals."
				.to_string(),
		),
		(
			"m2".to_string(),
			"Pantry tracking: add items from the Pantry tab; planned recipes \
deduct ingredients automatically when you log a meal."
				.to_string(),
		),
		(
			"m3".to_string(),
			"Macro goals: set daily calorie and macro targets under Profile, \
then the planner highlights meals that fit the remaining budget."
				.to_string(),
		),
	]
}

/// Load both sample corpora into the mock index. Food documents are indexed
/// by their full attribute summary so slot and tag words are searchable,
/// matching how real corpus documents are written.
pub fn seed_index(index: &MockIndex) {
	for (id, _, attributes) in sample_foods() {
		let text = attributes.summary();

		index.insert(Corpus::Food, &id, &text, attributes);
	}
	for (id, text) in sample_manual() {
		index.insert(Corpus::Manual, &id, &text, ItemAttributes::default());
	}
}
