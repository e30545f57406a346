//! First-stage hybrid retrieval.
//!
//! Dense and BM25 paths run concurrently against the same corpus and filter,
//! then merge by id. The dense score is primary; a keyword hit on the same
//! id only sets a boost flag the reranker folds in later. A dense-path
//! failure downgrades to keyword-only results, always flagged as degraded.

use futures::join;
use plateful_domain::{Corpus, constraint::{ItemAttributes, Predicate}};
use plateful_storage::RetrievedDoc;
use tracing::warn;

use crate::{Service, ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
	Vector,
	Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
	pub id: String,
	pub first_score: f32,
	pub source: CandidateSource,
	pub keyword_boost: bool,
	pub text: String,
	pub attributes: ItemAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
	pub candidates: Vec<CandidateItem>,
	pub degraded: bool,
}

impl Service {
	/// Fetch `overfetch_factor * k` candidates from both paths and merge.
	pub async fn retrieve(
		&self,
		corpus: Corpus,
		query_text: &str,
		predicate: &Predicate,
		k: usize,
	) -> ServiceResult<RetrievalOutcome> {
		let limit = (self.cfg.retrieval.overfetch_factor as u64) * (k as u64);
		let dense_future = self.dense_candidates(corpus, query_text, predicate, limit);
		let keyword_future = self.index.keyword(corpus, query_text, predicate, limit);
		let (dense, keyword) = join!(dense_future, keyword_future);

		match dense {
			Ok(mut dense_docs) => {
				dense_docs.retain(|doc| doc.score >= self.cfg.retrieval.min_score);

				let keyword_docs = match keyword {
					Ok(docs) => docs,
					Err(err) => {
						// Dense-only is full quality, so a lexical failure
						// costs nothing but the boost flags.
						warn!(corpus = corpus.as_str(), "keyword retrieval failed: {err}");

						Vec::new()
					},
				};

				Ok(RetrievalOutcome {
					candidates: merge_candidates(dense_docs, keyword_docs),
					degraded: false,
				})
			},
			Err(dense_err) => match keyword {
				Ok(keyword_docs) if !keyword_docs.is_empty() => {
					warn!(
						corpus = corpus.as_str(),
						"dense retrieval failed, serving keyword-only results: {dense_err}"
					);

					Ok(RetrievalOutcome {
						candidates: merge_candidates(Vec::new(), keyword_docs),
						degraded: true,
					})
				},
				Ok(_) => Err(ServiceError::RetrievalUnavailable {
					message: format!(
						"dense retrieval failed and keyword retrieval matched nothing: {dense_err}"
					),
				}),
				Err(keyword_err) => Err(ServiceError::RetrievalUnavailable {
					message: format!(
						"both retrieval paths failed: dense: {dense_err}; keyword: {keyword_err}"
					),
				}),
			},
		}
	}

	async fn dense_candidates(
		&self,
		corpus: Corpus,
		query_text: &str,
		predicate: &Predicate,
		limit: u64,
	) -> color_eyre::Result<Vec<RetrievedDoc>> {
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&query_text.to_string()))
			.await?;
		let vector = embeddings
			.into_iter()
			.next()
			.ok_or_else(|| color_eyre::eyre::eyre!("Embedding provider returned no vectors."))?;

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(color_eyre::eyre::eyre!(
				"Embedding vector dimension mismatch: got {}, expected {}.",
				vector.len(),
				self.cfg.storage.qdrant.vector_dim
			));
		}

		self.index.dense(corpus, &vector, predicate, limit).await
	}
}

/// Merge the two result lists by id. Re-merging the output with the same
/// keyword list is a no-op.
pub fn merge_candidates(dense: Vec<RetrievedDoc>, keyword: Vec<RetrievedDoc>) -> Vec<CandidateItem> {
	let mut out: Vec<CandidateItem> = dense
		.into_iter()
		.map(|doc| CandidateItem {
			id: doc.id,
			first_score: doc.score,
			source: CandidateSource::Vector,
			keyword_boost: false,
			text: doc.text,
			attributes: doc.attributes,
		})
		.collect();

	for doc in keyword {
		if let Some(existing) = out.iter_mut().find(|candidate| candidate.id == doc.id) {
			existing.keyword_boost = true;
		} else {
			out.push(CandidateItem {
				id: doc.id,
				first_score: doc.score,
				source: CandidateSource::Keyword,
				keyword_boost: true,
				text: doc.text,
				attributes: doc.attributes,
			});
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(id: &str, score: f32) -> RetrievedDoc {
		RetrievedDoc {
			id: id.to_string(),
			score,
			text: format!("doc {id}"),
			attributes: ItemAttributes::default(),
		}
	}

	#[test]
	fn merge_flags_overlap_instead_of_duplicating() {
		let merged = merge_candidates(vec![doc("a", 0.9), doc("b", 0.8)], vec![doc("b", 3.0), doc("c", 2.0)]);

		assert_eq!(merged.len(), 3);
		assert_eq!(merged[0].id, "a");
		assert!(!merged[0].keyword_boost);
		assert_eq!(merged[1].id, "b");
		assert!(merged[1].keyword_boost);
		// Vector score stays primary for overlapping ids.
		assert_eq!(merged[1].first_score, 0.8);
		assert_eq!(merged[2].source, CandidateSource::Keyword);
	}

	#[test]
	fn merge_is_idempotent() {
		let keyword = vec![doc("b", 3.0), doc("c", 2.0)];
		let once = merge_candidates(vec![doc("a", 0.9), doc("b", 0.8)], keyword.clone());
		let ids: Vec<&str> = once.iter().map(|candidate| candidate.id.as_str()).collect();

		let again = merge_candidates(
			once.iter()
				.map(|candidate| doc(&candidate.id, candidate.first_score))
				.collect(),
			keyword,
		);

		assert_eq!(
			again.iter().map(|candidate| candidate.id.as_str()).collect::<Vec<_>>(),
			ids
		);
	}

	#[test]
	fn keyword_only_merge_keeps_keyword_scores() {
		let merged = merge_candidates(Vec::new(), vec![doc("x", 5.0)]);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].source, CandidateSource::Keyword);
		assert_eq!(merged[0].first_score, 5.0);
		assert!(merged[0].keyword_boost);
	}
}
