//! Second-stage cross-encoder reranking.

use serde::{Deserialize, Serialize};

use crate::{CandidateItem, Service, ServiceResult};
use plateful_domain::constraint::ItemAttributes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub id: String,
	pub score: f32,
	pub rank: u32,
	pub text: String,
	pub attributes: ItemAttributes,
}

impl Service {
	/// Rerank candidates against the query and keep the top `k`.
	pub async fn rank(
		&self,
		query_text: &str,
		candidates: Vec<CandidateItem>,
		k: usize,
	) -> ServiceResult<Vec<RankedResult>> {
		if candidates.is_empty() {
			return Ok(Vec::new());
		}

		let docs: Vec<String> = candidates.iter().map(|candidate| candidate.text.clone()).collect();
		let scores =
			self.providers.rerank.rerank(&self.cfg.providers.rerank, query_text, &docs).await?;

		if scores.len() != candidates.len() {
			return Err(crate::ServiceError::UpstreamModel {
				message: "Rerank provider returned mismatched score count.".to_string(),
			});
		}

		Ok(score_and_rank(candidates, &scores, self.cfg.retrieval.keyword_boost_weight, k))
	}
}

/// Final score is the rerank score plus a fixed boost for lexical overlap.
/// Ordering is total: descending score, ties broken by ascending id, so the
/// same inputs always rank identically.
pub fn score_and_rank(
	candidates: Vec<CandidateItem>,
	rerank_scores: &[f32],
	keyword_boost_weight: f32,
	k: usize,
) -> Vec<RankedResult> {
	let mut scored: Vec<(f32, CandidateItem)> = candidates
		.into_iter()
		.zip(rerank_scores)
		.map(|(candidate, rerank_score)| {
			let boost = if candidate.keyword_boost { keyword_boost_weight } else { 0.0 };

			(rerank_score + boost, candidate)
		})
		.collect();

	scored.sort_by(|(a_score, a), (b_score, b)| {
		b_score
			.partial_cmp(a_score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| a.id.cmp(&b.id))
	});
	scored.truncate(k);

	scored
		.into_iter()
		.enumerate()
		.map(|(idx, (score, candidate))| RankedResult {
			id: candidate.id,
			score,
			rank: idx as u32 + 1,
			text: candidate.text,
			attributes: candidate.attributes,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::CandidateSource;

	fn candidate(id: &str, boost: bool) -> CandidateItem {
		CandidateItem {
			id: id.to_string(),
			first_score: 0.5,
			source: CandidateSource::Vector,
			keyword_boost: boost,
			text: format!("doc {id}"),
			attributes: ItemAttributes::default(),
		}
	}

	#[test]
	fn sorts_descending_and_truncates() {
		let candidates = vec![candidate("a", false), candidate("b", false), candidate("c", false)];
		let ranked = score_and_rank(candidates, &[0.1, 0.9, 0.5], 0.05, 2);

		assert_eq!(ranked.len(), 2);
		assert_eq!(ranked[0].id, "b");
		assert_eq!(ranked[0].rank, 1);
		assert_eq!(ranked[1].id, "c");
		assert_eq!(ranked[1].rank, 2);
	}

	#[test]
	fn ties_break_by_ascending_id() {
		let candidates = vec![candidate("z", false), candidate("a", false)];
		let ranked = score_and_rank(candidates, &[0.7, 0.7], 0.05, 2);

		assert_eq!(ranked[0].id, "a");
		assert_eq!(ranked[1].id, "z");
	}

	#[test]
	fn keyword_boost_lifts_score() {
		let candidates = vec![candidate("a", false), candidate("b", true)];
		let ranked = score_and_rank(candidates, &[0.7, 0.68], 0.05, 2);

		assert_eq!(ranked[0].id, "b");
		assert!((ranked[0].score - 0.73).abs() < 1e-6);
	}

	#[test]
	fn identical_inputs_rank_identically() {
		let make = || vec![candidate("a", true), candidate("b", false), candidate("c", true)];
		let first = score_and_rank(make(), &[0.4, 0.4, 0.2], 0.05, 3);
		let second = score_and_rank(make(), &[0.4, 0.4, 0.2], 0.05, 3);

		assert_eq!(first, second);
	}
}
