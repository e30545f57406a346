//! Scripted provider mocks. All deterministic; failure flags flip the next
//! call into an error.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use futures::StreamExt;
use plateful_config::{
	BackendConfig, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig, WebSearchConfig,
};
use plateful_providers::{backend::BackendResource, web_search::WebHit};
use plateful_service::{
	BackendProvider, BoxFuture, ChatProvider, EmbeddingProvider, ReasoningProvider, RerankProvider,
	TokenStream, WebSearchProvider,
};
use serde_json::Value;

use crate::embed_text;

#[derive(Default)]
pub struct MockEmbedding {
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl EmbeddingProvider for MockEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("embedding provider down (injected)"));
			}

			Ok(texts.iter().map(|text| embed_text(text, cfg.dimensions as usize)).collect())
		})
	}
}

/// Scores each document by the share of query words it contains.
#[derive(Default)]
pub struct MockRerank {
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl RerankProvider for MockRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("rerank provider down (injected)"));
			}

			let query = query.to_lowercase();
			let terms: Vec<&str> = query.split_whitespace().collect();

			Ok(docs
				.iter()
				.map(|doc| {
					if terms.is_empty() {
						return 0.0;
					}

					let doc = doc.to_lowercase();
					let matched = terms.iter().filter(|term| doc.contains(**term)).count();

					matched as f32 / terms.len() as f32
				})
				.collect())
		})
	}
}

/// Streams a scripted reply word by word. `fail_after_tokens` injects a
/// mid-stream error once that many tokens have been delivered. Every wire
/// message list is recorded so tests can assert on what the provider saw.
pub struct MockChat {
	pub reply: Mutex<String>,
	pub fail_after_tokens: AtomicUsize,
	pub requests: Mutex<Vec<Vec<Value>>>,
}
impl Default for MockChat {
	fn default() -> Self {
		Self {
			reply: Mutex::new("Here are some ideas that fit.".to_string()),
			fail_after_tokens: AtomicUsize::new(usize::MAX),
			requests: Mutex::new(Vec::new()),
		}
	}
}
impl MockChat {
	pub fn set_reply(&self, reply: &str) {
		*self.reply.lock().expect("reply lock poisoned") = reply.to_string();
	}

	pub fn last_request(&self) -> Vec<Value> {
		self.requests.lock().expect("requests lock poisoned").last().cloned().unwrap_or_default()
	}

	fn tokens(&self) -> Vec<String> {
		let reply = self.reply.lock().expect("reply lock poisoned").clone();
		let words: Vec<&str> = reply.split(' ').collect();

		words
			.iter()
			.enumerate()
			.map(|(idx, word)| {
				if idx + 1 == words.len() { (*word).to_string() } else { format!("{word} ") }
			})
			.collect()
	}
}
impl ChatProvider for MockChat {
	fn stream<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		Box::pin(async move {
			self.requests.lock().expect("requests lock poisoned").push(messages.to_vec());

			let fail_after = self.fail_after_tokens.load(Ordering::SeqCst);
			let mut items: Vec<color_eyre::Result<String>> =
				self.tokens().into_iter().map(Ok).collect();

			if fail_after < items.len() {
				items.truncate(fail_after);
				items.push(Err(eyre::eyre!("chat stream interrupted (injected)")));
			}

			Ok(futures::stream::iter(items).boxed())
		})
	}

	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			self.requests.lock().expect("requests lock poisoned").push(messages.to_vec());

			if self.fail_after_tokens.load(Ordering::SeqCst) == 0 {
				return Err(eyre::eyre!("chat provider down (injected)"));
			}

			Ok(self.reply.lock().expect("reply lock poisoned").clone())
		})
	}
}

/// Classification and structured-parse mock. The category script drives
/// `complete_text` for classification prompts, the date script answers
/// date-resolution prompts; other prompts get a fixed summary line.
#[derive(Default)]
pub struct MockReasoning {
	pub category: Mutex<Option<String>>,
	pub parsed: Mutex<Option<Value>>,
	pub date: Mutex<Option<String>>,
	pub fail: AtomicBool,
}
impl MockReasoning {
	pub fn set_category(&self, category: &str) {
		*self.category.lock().expect("category lock poisoned") = Some(category.to_string());
	}

	pub fn set_parsed(&self, parsed: Value) {
		*self.parsed.lock().expect("parsed lock poisoned") = Some(parsed);
	}

	pub fn set_date(&self, date: &str) {
		*self.date.lock().expect("date lock poisoned") = Some(date.to_string());
	}
}
impl ReasoningProvider for MockReasoning {
	fn extract_json<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(async move {
			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("reasoning provider down (injected)"));
			}
			if let Some(parsed) = self.parsed.lock().expect("parsed lock poisoned").clone() {
				return Ok(parsed);
			}

			let message = messages
				.last()
				.and_then(|msg| msg.get("content"))
				.and_then(Value::as_str)
				.unwrap_or_default();

			Ok(serde_json::json!({ "semantic_query": message }))
		})
	}

	fn complete_text<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("reasoning provider down (injected)"));
			}

			let system = messages
				.first()
				.and_then(|msg| msg.get("content"))
				.and_then(Value::as_str)
				.unwrap_or_default();

			if system.starts_with("Classify") {
				let category = self.category.lock().expect("category lock poisoned").clone();

				return Ok(category.unwrap_or_else(|| "GENERAL".to_string()));
			}
			if system.starts_with("Determine the target date") {
				let date = self.date.lock().expect("date lock poisoned").clone();

				return Ok(date.unwrap_or_default());
			}

			Ok("The user wants quick, budget-friendly meals.".to_string())
		})
	}
}

#[derive(Default)]
pub struct MockBackend {
	pub payloads: Mutex<HashMap<String, Value>>,
	/// Dates of every daily-plan fetch, in call order.
	pub plan_dates: Mutex<Vec<String>>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl MockBackend {
	pub fn set_payload(&self, resource: &BackendResource, payload: Value) {
		self.payloads
			.lock()
			.expect("payloads lock poisoned")
			.insert(resource.as_str().to_string(), payload);
	}
}
impl BackendProvider for MockBackend {
	fn fetch<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		resource: &'a BackendResource,
		_user_token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let BackendResource::DailyPlan { date } = resource {
				self.plan_dates.lock().expect("plan_dates lock poisoned").push(date.clone());
			}
			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("backend unreachable (injected)"));
			}

			let payloads = self.payloads.lock().expect("payloads lock poisoned");

			Ok(payloads
				.get(resource.as_str())
				.cloned()
				.unwrap_or_else(|| serde_json::json!({ "resource": resource.as_str() })))
		})
	}
}

/// Scripted web search results with failure injection.
#[derive(Default)]
pub struct MockWebSearch {
	pub hits: Mutex<Vec<WebHit>>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl MockWebSearch {
	pub fn set_hits(&self, hits: Vec<WebHit>) {
		*self.hits.lock().expect("hits lock poisoned") = hits;
	}
}
impl WebSearchProvider for MockWebSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a WebSearchConfig,
		_query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<WebHit>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.fail.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("web search unreachable (injected)"));
			}

			Ok(self.hits.lock().expect("hits lock poisoned").clone())
		})
	}
}
