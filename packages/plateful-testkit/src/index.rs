//! In-memory stand-in for the Qdrant store.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, Ordering},
	},
};

use color_eyre::eyre;
use plateful_domain::{
	Corpus,
	constraint::{ItemAttributes, Predicate},
};
use plateful_service::{BoxFuture, SearchIndex};
use plateful_storage::RetrievedDoc;

use crate::embed_text;

struct StoredDoc {
	id: String,
	text: String,
	vector: Vec<f32>,
	attributes: ItemAttributes,
}

/// Cosine-similarity dense search plus word-overlap keyword search, both
/// honoring the compiled predicate. `fail_dense` / `fail_keyword` make the
/// corresponding path error on the next call.
#[derive(Default)]
pub struct MockIndex {
	docs: Mutex<HashMap<Corpus, Vec<StoredDoc>>>,
	pub fail_dense: AtomicBool,
	pub fail_keyword: AtomicBool,
}
impl MockIndex {
	pub fn insert(&self, corpus: Corpus, id: &str, text: &str, attributes: ItemAttributes) {
		let doc = StoredDoc {
			id: id.to_string(),
			text: text.to_string(),
			vector: embed_text(text, crate::TEST_VECTOR_DIM),
			attributes,
		};

		self.docs.lock().expect("index lock poisoned").entry(corpus).or_default().push(doc);
	}

	pub fn doc_count(&self, corpus: Corpus) -> usize {
		self.docs
			.lock()
			.expect("index lock poisoned")
			.get(&corpus)
			.map(Vec::len)
			.unwrap_or_default()
	}

	fn search(
		&self,
		corpus: Corpus,
		predicate: &Predicate,
		limit: u64,
		score: impl Fn(&StoredDoc) -> f32,
	) -> Vec<RetrievedDoc> {
		let docs = self.docs.lock().expect("index lock poisoned");
		let mut hits: Vec<RetrievedDoc> = docs
			.get(&corpus)
			.map(|docs| {
				docs.iter()
					.filter(|doc| predicate.matches(&doc.attributes))
					.map(|doc| RetrievedDoc {
						id: doc.id.clone(),
						score: score(doc),
						text: doc.text.clone(),
						attributes: doc.attributes.clone(),
					})
					.filter(|doc| doc.score > 0.0)
					.collect()
			})
			.unwrap_or_default();

		hits.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.id.cmp(&b.id))
		});
		hits.truncate(limit as usize);

		hits
	}
}

impl SearchIndex for MockIndex {
	fn dense<'a>(
		&'a self,
		corpus: Corpus,
		query_vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RetrievedDoc>>> {
		Box::pin(async move {
			if self.fail_dense.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("dense index unavailable (injected)"));
			}

			Ok(self.search(corpus, predicate, limit, |doc| cosine(&doc.vector, query_vector)))
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
			if self.fail_keyword.load(Ordering::SeqCst) {
				return Err(eyre::eyre!("keyword index unavailable (injected)"));
			}

			let query = query_text.to_lowercase();
			let terms: Vec<&str> = query.split_whitespace().collect();

			Ok(self.search(corpus, predicate, limit, |doc| {
				let text = doc.text.to_lowercase();

				terms.iter().filter(|term| text.contains(**term)).count() as f32
			}))
		})
	}
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}

	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
	use super::*;
	use plateful_domain::constraint::{NumericRange, SearchConstraints, compile};

	#[tokio::test]
	async fn keyword_search_respects_predicate() {
		let index = MockIndex::default();

		crate::seed_index(&index);

		let mut constraints = SearchConstraints::default();

		constraints
			.ranges
			.insert("calories".to_string(), NumericRange { min: None, max: Some(400.0) });

		let predicate = compile(&constraints).expect("valid");
		let hits = index.keyword(Corpus::Food, "keto salmon", &predicate, 10).await.expect("ok");

		// The keto dishes all exceed 400 kcal.
		assert!(hits.iter().all(|hit| hit.attributes.calories <= 400.0));
	}

	#[tokio::test]
	async fn dense_failure_injection_trips_once_set() {
		let index = MockIndex::default();

		index.fail_dense.store(true, Ordering::SeqCst);

		let vector = embed_text("anything", crate::TEST_VECTOR_DIM);
		let result = index.dense(Corpus::Food, &vector, &Predicate::default(), 5).await;

		assert!(result.is_err());
	}
}
