//! Retrieval-augmented context assembly: compile, retrieve, rank.
//!
//! Stateless and shared; a conversation turn and a bare search request go
//! through the same path.

use plateful_domain::{
	Corpus,
	constraint::{Predicate, SearchConstraints, compile},
};
use serde::{Deserialize, Serialize};

use crate::{RankedResult, Service, ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
	pub items: Vec<RankedResult>,
	pub degraded: bool,
}

impl Service {
	/// Resolve the effective `k`: config default when absent, rejected when
	/// zero or above the configured ceiling.
	pub fn resolve_k(&self, k: Option<usize>) -> ServiceResult<usize> {
		let k = k.unwrap_or(self.cfg.retrieval.default_k);

		if k == 0 {
			return Err(ServiceError::InvalidRequest {
				message: "k must be greater than zero.".to_string(),
			});
		}
		if k > self.cfg.retrieval.max_k {
			return Err(ServiceError::InvalidRequest {
				message: format!("k must not exceed {}.", self.cfg.retrieval.max_k),
			});
		}

		Ok(k)
	}

	/// Full pipeline over one corpus. Constraints compile before anything
	/// touches the network; the degraded flag from retrieval is passed
	/// through untouched.
	pub async fn answer_context(
		&self,
		corpus: Corpus,
		query_text: &str,
		k: usize,
		constraints: Option<&SearchConstraints>,
	) -> ServiceResult<SearchOutcome> {
		if query_text.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must be non-empty.".to_string(),
			});
		}

		let predicate = match constraints {
			Some(constraints) => compile(constraints)?,
			None => Predicate::default(),
		};
		let outcome = self.retrieve(corpus, query_text, &predicate, k).await?;
		let degraded = outcome.degraded;
		let items = self.rank(query_text, outcome.candidates, k).await?;

		Ok(SearchOutcome { items, degraded })
	}
}
