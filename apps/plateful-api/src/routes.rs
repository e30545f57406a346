use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use plateful_domain::{Corpus, constraint::SearchConstraints, conversation::Role};
use plateful_service::{ChatTurnRequest, HistoryMessage, SearchOutcome, ServiceError, StreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

use crate::state::AppState;

pub const CONVERSATION_HEADER: &str = "x-conversation-id";

pub fn router(state: AppState) -> Router {
	let cors = cors_layer(&state.service.cfg.service.allowed_origins);

	Router::new()
		.route("/health", get(health))
		.route("/ai/chat", post(chat))
		.route("/search/food", post(search_food))
		.route("/search/manual", post(search_manual))
		.layer(cors)
		.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
	let layer = CorsLayer::new()
		.allow_methods([Method::GET, Method::POST])
		.allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

	if origins.is_empty() {
		return layer.allow_origin(Any);
	}

	let origins: Vec<HeaderValue> =
		origins.iter().filter_map(|origin| origin.parse().ok()).collect();

	layer.allow_origin(AllowOrigin::list(origins))
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
	pub role: String,
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
	#[serde(default)]
	pub conversation_id: Option<Uuid>,
	pub messages: Vec<ChatMessage>,
	#[serde(default = "default_stream")]
	pub stream: bool,
}

fn default_stream() -> bool {
	true
}

#[derive(Debug, Serialize)]
pub struct ChatCompletion {
	pub conversation_id: Uuid,
	pub content: String,
	pub commands: Vec<Value>,
}

async fn chat(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
	let last_user = payload
		.messages
		.iter()
		.rposition(|message| message.role.eq_ignore_ascii_case("user"))
		.ok_or_else(|| {
			json_error(StatusCode::BAD_REQUEST, "invalid_request", "No user message in the request.")
		})?;
	// Stateless clients resend the transcript instead of a conversation id;
	// seed a fresh conversation from it so that context is not lost.
	let history = if payload.conversation_id.is_none() {
		wire_history(&payload.messages[..last_user])
	} else {
		Vec::new()
	};
	let request = ChatTurnRequest {
		conversation_id: payload.conversation_id,
		message: payload.messages[last_user].content.clone(),
		user_token: bearer_token(&headers),
		history,
	};
	let (id, rx) = state.service.chat(request)?;

	if payload.stream {
		return Ok(ndjson_response(id, rx));
	}

	collect_completion(id, rx).await
}

fn wire_history(messages: &[ChatMessage]) -> Vec<HistoryMessage> {
	messages
		.iter()
		.filter_map(|message| {
			let role = match message.role.to_ascii_lowercase().as_str() {
				"system" => Role::System,
				"user" => Role::User,
				"assistant" => Role::Assistant,
				_ => return None,
			};

			Some(HistoryMessage { role, content: message.content.clone() })
		})
		.collect()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
	headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::to_string)
}

/// One JSON event per line; the body ends when the turn does.
fn ndjson_response(id: Uuid, rx: mpsc::Receiver<StreamEvent>) -> Response {
	let lines = ReceiverStream::new(rx)
		.map(|event| Ok::<_, std::convert::Infallible>(event_line(&event)));
	let mut response = Response::new(Body::from_stream(lines));

	response
		.headers_mut()
		.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));

	if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
		response.headers_mut().insert(CONVERSATION_HEADER, value);
	}

	response
}

fn event_line(event: &StreamEvent) -> String {
	let mut line = serde_json::to_string(event).unwrap_or_else(|_| {
		r#"{"status":"error","message":"Event serialization failed."}"#.to_string()
	});

	line.push('\n');
	line
}

async fn collect_completion(
	id: Uuid,
	mut rx: mpsc::Receiver<StreamEvent>,
) -> Result<Response, ApiError> {
	let mut content = String::new();
	let mut commands = Vec::new();

	while let Some(event) = rx.recv().await {
		match event {
			StreamEvent::Thinking { .. } => {},
			StreamEvent::Token { content: delta } => content.push_str(&delta),
			StreamEvent::Done { commands: finished } => commands = finished,
			StreamEvent::Error { message } => {
				return Err(json_error(StatusCode::BAD_GATEWAY, "upstream_model", message));
			},
		}
	}

	Ok(Json(ChatCompletion { conversation_id: id, content, commands }).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub k: Option<usize>,
	#[serde(default)]
	pub constraints: Option<SearchConstraints>,
}

async fn search_food(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, ApiError> {
	Ok(Json(run_search(&state, Corpus::Food, payload).await?))
}

async fn search_manual(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, ApiError> {
	Ok(Json(run_search(&state, Corpus::Manual, payload).await?))
}

async fn run_search(
	state: &AppState,
	corpus: Corpus,
	payload: SearchRequest,
) -> Result<SearchOutcome, ApiError> {
	let k = state.service.resolve_k(payload.k)?;
	let outcome = state
		.service
		.answer_context(corpus, &payload.query, k, payload.constraints.as_ref())
		.await?;

	Ok(outcome)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, code) = match &err {
			ServiceError::InvalidConstraint { .. } => (StatusCode::BAD_REQUEST, "invalid_constraint"),
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::RetrievalUnavailable { .. } => {
				(StatusCode::SERVICE_UNAVAILABLE, "retrieval_unavailable")
			},
			ServiceError::ToolExecutionFailed { .. } => {
				(StatusCode::BAD_GATEWAY, "tool_execution_failed")
			},
			ServiceError::UpstreamModel { .. } => (StatusCode::BAD_GATEWAY, "upstream_model"),
			ServiceError::Index { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
		};

		json_error(status, code, err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
