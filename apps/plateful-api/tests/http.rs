use std::sync::atomic::Ordering;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
	response::Response,
};
use tower::util::ServiceExt;
use uuid::Uuid;

use plateful_api::{routes, state::AppState};
use plateful_testkit::{TestHarness, harness, seed_index};

fn app(fixture: &TestHarness) -> Router {
	routes::router(AppState::with_service(fixture.service.clone()))
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

async fn body_json(response: Response) -> serde_json::Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&bytes).expect("Failed to parse response.")
}

#[tokio::test]
async fn health_ok() {
	let fixture = harness();
	let response = app(&fixture)
		.oneshot(
			Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn food_search_returns_ranked_items() {
	let fixture = harness();

	seed_index(&fixture.index);

	let response = app(&fixture)
		.oneshot(post_json("/search/food", serde_json::json!({ "query": "dinner", "k": 3 })))
		.await
		.expect("Failed to call /search/food.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;

	assert_eq!(json["items"].as_array().map(Vec::len), Some(3));
	assert_eq!(json["degraded"], false);
	assert_eq!(json["items"][0]["rank"], 1);
}

#[tokio::test]
async fn inverted_range_is_a_bad_request() {
	let fixture = harness();

	seed_index(&fixture.index);

	let payload = serde_json::json!({
		"query": "dinner",
		"constraints": { "ranges": { "calories": { "min": 800.0, "max": 200.0 } } }
	});
	let response = app(&fixture)
		.oneshot(post_json("/search/food", payload))
		.await
		.expect("Failed to call /search/food.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = body_json(response).await;

	assert_eq!(json["error_code"], "invalid_constraint");
}

#[tokio::test]
async fn zero_k_is_a_bad_request() {
	let fixture = harness();
	let response = app(&fixture)
		.oneshot(post_json("/search/manual", serde_json::json!({ "query": "pantry", "k": 0 })))
		.await
		.expect("Failed to call /search/manual.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = body_json(response).await;

	assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn both_retrieval_paths_down_is_a_503() {
	let fixture = harness();

	seed_index(&fixture.index);
	fixture.index.fail_dense.store(true, Ordering::SeqCst);
	fixture.index.fail_keyword.store(true, Ordering::SeqCst);

	let response = app(&fixture)
		.oneshot(post_json("/search/food", serde_json::json!({ "query": "dinner" })))
		.await
		.expect("Failed to call /search/food.");

	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

	let json = body_json(response).await;

	assert_eq!(json["error_code"], "retrieval_unavailable");
}

#[tokio::test]
async fn dense_outage_flags_the_response_degraded() {
	let fixture = harness();

	seed_index(&fixture.index);
	fixture.index.fail_dense.store(true, Ordering::SeqCst);

	let response = app(&fixture)
		.oneshot(post_json("/search/food", serde_json::json!({ "query": "keto dinner" })))
		.await
		.expect("Failed to call /search/food.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;

	assert_eq!(json["degraded"], true);
}

#[tokio::test]
async fn chat_streams_ndjson_events() {
	let fixture = harness();

	fixture.chat.set_reply("Try the salmon tonight.");

	let payload = serde_json::json!({
		"messages": [{ "role": "user", "content": "what should I cook?" }],
		"stream": true
	});
	let response = app(&fixture)
		.oneshot(post_json("/ai/chat", payload))
		.await
		.expect("Failed to call /ai/chat.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get("content-type").and_then(|value| value.to_str().ok()),
		Some("application/x-ndjson")
	);

	let id = response
		.headers()
		.get(routes::CONVERSATION_HEADER)
		.and_then(|value| value.to_str().ok())
		.expect("conversation id header");

	Uuid::parse_str(id).expect("header is a UUID");

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let lines: Vec<serde_json::Value> = std::str::from_utf8(&bytes)
		.expect("body is UTF-8")
		.lines()
		.map(|line| serde_json::from_str(line).expect("each line is JSON"))
		.collect();

	assert_eq!(lines.first().map(|line| line["status"].clone()), Some("thinking".into()));
	assert_eq!(lines.last().map(|line| line["status"].clone()), Some("done".into()));

	let reply: String = lines
		.iter()
		.filter(|line| line["status"] == "token")
		.filter_map(|line| line["content"].as_str())
		.collect();

	assert_eq!(reply, "Try the salmon tonight.");
}

#[tokio::test]
async fn non_streaming_chat_returns_one_payload() {
	let fixture = harness();

	fixture.chat.set_reply(
		"Added! {\"type\": \"add_to_plan\", \"food_id\": \"f2\", \"slot\": \"dinner\"}",
	);

	let payload = serde_json::json!({
		"messages": [{ "role": "user", "content": "add the salmon to tonight" }],
		"stream": false
	});
	let response = app(&fixture)
		.oneshot(post_json("/ai/chat", payload))
		.await
		.expect("Failed to call /ai/chat.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;

	assert!(json["content"].as_str().is_some_and(|content| content.starts_with("Added!")));
	assert_eq!(json["commands"][0]["type"], "add_to_plan");
	assert!(json["conversation_id"].as_str().is_some());
}

#[tokio::test]
async fn client_supplied_history_seeds_the_conversation() {
	let fixture = harness();

	fixture.chat.set_reply("A lentil curry would fit.");

	let payload = serde_json::json!({
		"messages": [
			{ "role": "user", "content": "I'm vegetarian" },
			{ "role": "assistant", "content": "Noted, no meat." },
			{ "role": "user", "content": "what should I cook tonight?" }
		],
		"stream": false
	});
	let response = app(&fixture)
		.oneshot(post_json("/ai/chat", payload))
		.await
		.expect("Failed to call /ai/chat.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;
	let id = json["conversation_id"].as_str().expect("conversation id");
	let id = Uuid::parse_str(id).expect("id is a UUID");
	let (_, entry) = fixture.service.conversations.resolve(Some(id));
	let state = entry.state.lock().await;

	assert_eq!(state.turns.len(), 4, "resent history plus the new exchange");
	assert_eq!(state.turns[0].content, "I'm vegetarian");
	assert_eq!(state.turns[2].content, "what should I cook tonight?");
}

#[tokio::test]
async fn chat_without_a_user_message_is_rejected() {
	let fixture = harness();
	let payload = serde_json::json!({
		"messages": [{ "role": "system", "content": "be nice" }],
		"stream": false
	});
	let response = app(&fixture)
		.oneshot(post_json("/ai/chat", payload))
		.await
		.expect("Failed to call /ai/chat.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = body_json(response).await;

	assert_eq!(json["error_code"], "invalid_request");
}
