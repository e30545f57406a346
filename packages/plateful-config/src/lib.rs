mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, BackendConfig, Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig,
	Providers, Qdrant, Retrieval, Service, Storage, WebSearchConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	for (label, collection) in [
		("food_collection", &cfg.storage.qdrant.food_collection),
		("manual_collection", &cfg.storage.qdrant.manual_collection),
	] {
		if collection.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("storage.qdrant.{label} must be non-empty."),
			});
		}
	}
	if cfg.storage.qdrant.food_collection == cfg.storage.qdrant.manual_collection {
		return Err(Error::Validation {
			message: "storage.qdrant food and manual collections must differ.".to_string(),
		});
	}
	if cfg.retrieval.overfetch_factor == 0 {
		return Err(Error::Validation {
			message: "retrieval.overfetch_factor must be greater than zero.".to_string(),
		});
	}
	if !cfg.retrieval.keyword_boost_weight.is_finite()
		|| cfg.retrieval.keyword_boost_weight < 0.0
	{
		return Err(Error::Validation {
			message: "retrieval.keyword_boost_weight must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if !cfg.retrieval.min_score.is_finite() || cfg.retrieval.min_score < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.min_score must be a finite number, zero or greater.".to_string(),
		});
	}
	if cfg.retrieval.default_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.default_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_k < cfg.retrieval.default_k {
		return Err(Error::Validation {
			message: "retrieval.max_k must be at least retrieval.default_k.".to_string(),
		});
	}
	if cfg.agent.summarize_after_turns <= cfg.agent.keep_recent_turns {
		return Err(Error::Validation {
			message: "agent.summarize_after_turns must exceed agent.keep_recent_turns."
				.to_string(),
		});
	}
	if cfg.agent.idle_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "agent.idle_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.backend.base_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.backend.base_url must be non-empty.".to_string(),
		});
	}
	if cfg.providers.web_search.base_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.web_search.base_url must be non-empty.".to_string(),
		});
	}
	if cfg.providers.web_search.max_results == 0 {
		return Err(Error::Validation {
			message: "providers.web_search.max_results must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("chat", &cfg.providers.chat.api_key),
		("reasoning", &cfg.providers.reasoning.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.allowed_origins.retain(|origin| !origin.trim().is_empty());

	for base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.rerank.api_base,
		&mut cfg.providers.chat.api_base,
		&mut cfg.providers.reasoning.api_base,
		&mut cfg.providers.backend.base_url,
		&mut cfg.providers.web_search.base_url,
	] {
		while base.ends_with('/') {
			base.pop();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_toml() -> String {
		r#"
[service]
http_bind = "127.0.0.1:8000"
log_level = "info"
allowed_origins = ["http://localhost:5173"]

[storage.qdrant]
url = "http://127.0.0.1:6334"
food_collection = "foods"
manual_collection = "manual_sections"
vector_dim = 384

[providers.embedding]
provider_id = "local"
api_base = "http://127.0.0.1:9100/"
api_key = "test"
path = "/v1/embeddings"
model = "bge-small-en"
dimensions = 384
timeout_ms = 5000

[providers.rerank]
provider_id = "local"
api_base = "http://127.0.0.1:9101"
api_key = "test"
path = "/v1/rerank"
model = "mini-reranker"
timeout_ms = 5000

[providers.chat]
provider_id = "local"
api_base = "http://127.0.0.1:9102"
api_key = "test"
path = "/v1/chat/completions"
model = "chat-model"
temperature = 0.7
timeout_ms = 30000

[providers.reasoning]
provider_id = "local"
api_base = "http://127.0.0.1:9102"
api_key = "test"
path = "/v1/chat/completions"
model = "chat-model"
temperature = 0.0
timeout_ms = 10000

[providers.backend]
base_url = "http://127.0.0.1:3000/api"
timeout_ms = 5000

[providers.web_search]
base_url = "http://127.0.0.1:8080/"
timeout_ms = 5000
max_results = 3

[retrieval]
overfetch_factor = 4
keyword_boost_weight = 0.05
min_score = 0.0
default_k = 5
max_k = 20

[agent]
summarize_after_turns = 6
keep_recent_turns = 2
idle_ttl_secs = 1800
"#
		.to_string()
	}

	fn parse(raw: &str) -> Config {
		let mut cfg: Config = toml::from_str(raw).expect("config parses");

		normalize(&mut cfg);

		cfg
	}

	#[test]
	fn sample_config_validates() {
		let cfg = parse(&sample_toml());

		assert!(validate(&cfg).is_ok());
		assert_eq!(cfg.providers.embedding.api_base, "http://127.0.0.1:9100");
	}

	#[test]
	fn rejects_dimension_mismatch() {
		let raw = sample_toml().replace("dimensions = 384", "dimensions = 768");
		let cfg = parse(&raw);
		let err = validate(&cfg).expect_err("mismatched dims rejected");

		assert!(err.to_string().contains("vector_dim"));
	}

	#[test]
	fn rejects_zero_overfetch() {
		let raw = sample_toml().replace("overfetch_factor = 4", "overfetch_factor = 0");
		let cfg = parse(&raw);

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn rejects_max_k_below_default_k() {
		let raw = sample_toml().replace("max_k = 20", "max_k = 3");
		let cfg = parse(&raw);

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn rejects_zero_web_search_results() {
		let raw = sample_toml().replace("max_results = 3", "max_results = 0");
		let cfg = parse(&raw);
		let err = validate(&cfg).expect_err("zero results rejected");

		assert!(err.to_string().contains("max_results"));
	}

	#[test]
	fn rejects_blank_api_key() {
		let raw = sample_toml().replacen("api_key = \"test\"", "api_key = \" \"", 1);
		let cfg = parse(&raw);
		let err = validate(&cfg).expect_err("blank key rejected");

		assert!(err.to_string().contains("embedding"));
	}
}
