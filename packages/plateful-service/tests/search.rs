//! Retrieval pipeline behavior against the in-memory index.

use std::sync::atomic::Ordering;

use plateful_domain::{
	Corpus,
	constraint::{NumericRange, SearchConstraints},
};
use plateful_service::ServiceError;
use plateful_testkit::{harness, seed_index};

#[tokio::test]
async fn food_query_returns_exactly_k_deduplicated_descending() {
	let fixture = harness();

	seed_index(&fixture.index);

	let outcome = fixture
		.service
		.answer_context(Corpus::Food, "dinner", 5, None)
		.await
		.expect("search succeeds");

	assert_eq!(outcome.items.len(), 5);
	assert!(!outcome.degraded);

	let mut ids: Vec<&str> = outcome.items.iter().map(|item| item.id.as_str()).collect();

	ids.dedup();

	assert_eq!(ids.len(), 5, "no duplicate ids");

	for pair in outcome.items.windows(2) {
		assert!(pair[0].score >= pair[1].score, "scores descend");
	}
	for (idx, item) in outcome.items.iter().enumerate() {
		assert_eq!(item.rank, idx as u32 + 1);
	}
}

#[tokio::test]
async fn thin_corpus_returns_fewer_than_k_never_padded() {
	let fixture = harness();

	seed_index(&fixture.index);

	let outcome = fixture
		.service
		.answer_context(Corpus::Manual, "pantry", 5, None)
		.await
		.expect("search succeeds");

	assert!(!outcome.items.is_empty());
	assert!(outcome.items.len() < 5, "only part of the manual mentions the pantry");
}

#[tokio::test]
async fn inverted_range_fails_before_any_index_call() {
	let fixture = harness();

	seed_index(&fixture.index);

	let mut constraints = SearchConstraints::default();

	constraints
		.ranges
		.insert("calories".to_string(), NumericRange { min: Some(800.0), max: Some(200.0) });

	let err = fixture
		.service
		.answer_context(Corpus::Food, "dinner", 5, Some(&constraints))
		.await
		.expect_err("inverted range rejected");

	assert!(matches!(err, ServiceError::InvalidConstraint { .. }));
	assert_eq!(fixture.embedding.calls.load(Ordering::SeqCst), 0, "nothing was embedded");
	assert_eq!(fixture.rerank.calls.load(Ordering::SeqCst), 0, "nothing was reranked");
}

#[tokio::test]
async fn constraints_narrow_the_result_set() {
	let fixture = harness();

	seed_index(&fixture.index);

	let mut constraints = SearchConstraints::default();

	constraints
		.ranges
		.insert("carbs_g".to_string(), NumericRange { min: None, max: Some(15.0) });
	constraints.meal_slots.push("dinner".to_string());

	let outcome = fixture
		.service
		.answer_context(Corpus::Food, "dinner", 10, Some(&constraints))
		.await
		.expect("search succeeds");

	assert!(!outcome.items.is_empty());

	for item in &outcome.items {
		assert!(item.attributes.carbs_g <= 15.0);
		assert!(item.attributes.is_dinner);
	}
}

#[tokio::test]
async fn dense_failure_degrades_to_flagged_keyword_results() {
	let fixture = harness();

	seed_index(&fixture.index);
	fixture.index.fail_dense.store(true, Ordering::SeqCst);

	let outcome = fixture
		.service
		.answer_context(Corpus::Food, "keto dinner", 5, None)
		.await
		.expect("keyword path still serves");

	assert!(outcome.degraded, "keyword-only results must be flagged");
	assert!(!outcome.items.is_empty());
}

#[tokio::test]
async fn both_paths_failing_is_retrieval_unavailable() {
	let fixture = harness();

	seed_index(&fixture.index);
	fixture.index.fail_dense.store(true, Ordering::SeqCst);
	fixture.index.fail_keyword.store(true, Ordering::SeqCst);

	let err = fixture
		.service
		.answer_context(Corpus::Food, "dinner", 5, None)
		.await
		.expect_err("nothing left to serve");

	assert!(matches!(err, ServiceError::RetrievalUnavailable { .. }));
}

#[tokio::test]
async fn embedding_failure_alone_also_degrades() {
	let fixture = harness();

	seed_index(&fixture.index);
	fixture.embedding.fail.store(true, Ordering::SeqCst);

	let outcome = fixture
		.service
		.answer_context(Corpus::Food, "keto dinner", 5, None)
		.await
		.expect("keyword path still serves");

	assert!(outcome.degraded);
}

#[tokio::test]
async fn k_bounds_are_enforced() {
	let fixture = harness();

	assert!(matches!(
		fixture.service.resolve_k(Some(0)),
		Err(ServiceError::InvalidRequest { .. })
	));
	assert!(matches!(
		fixture.service.resolve_k(Some(999)),
		Err(ServiceError::InvalidRequest { .. })
	));
	assert_eq!(fixture.service.resolve_k(None).expect("default"), 5);
	assert_eq!(fixture.service.resolve_k(Some(3)).expect("explicit"), 3);
}
