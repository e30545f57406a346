//! The per-turn agent controller.
//!
//! A turn moves through the phases in `plateful_domain::strategy`: the
//! strategy is decided exactly once, executed, and the reply is streamed as
//! ordered events with a terminal `done` or `error`. A failed turn rolls the
//! transcript back to its pre-turn length, and a dropped receiver cancels
//! the turn cooperatively.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use plateful_domain::{
	Corpus,
	command::extract_commands,
	constraint::SearchConstraints,
	conversation::{ConversationState, Role},
	intent::{Intent, classify_keywords, parse_category},
	strategy::{StrategyDecision, TurnPhase},
};
use plateful_providers::backend::BackendResource;

use crate::{Service, ServiceError, ServiceResult, prompts, tools};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum StreamEvent {
	Thinking { message: String },
	Token { content: String },
	Done { commands: Vec<Value> },
	Error { message: String },
}

/// A prior exchange supplied by a stateless client; used to seed a fresh
/// conversation so resent history is not silently dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
	pub role: Role,
	pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurnRequest {
	pub conversation_id: Option<Uuid>,
	pub message: String,
	pub user_token: Option<String>,
	#[serde(default)]
	pub history: Vec<HistoryMessage>,
}

enum TurnEnd {
	/// Receiver dropped; stop quietly.
	Aborted,
	Failed(ServiceError),
}
impl From<ServiceError> for TurnEnd {
	fn from(err: ServiceError) -> Self {
		Self::Failed(err)
	}
}

impl Service {
	/// Run one conversation turn on a background task and return the event
	/// stream. Turns on the same conversation serialize on its lock.
	pub fn chat(
		self: &Arc<Self>,
		req: ChatTurnRequest,
	) -> ServiceResult<(Uuid, mpsc::Receiver<StreamEvent>)> {
		if req.message.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "message must be non-empty.".to_string(),
			});
		}

		let (id, entry) = self.conversations.resolve(req.conversation_id);
		let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
		let service = self.clone();

		tokio::spawn(async move {
			let mut state = entry.state.lock().await;

			if state.turns.is_empty() {
				for msg in &req.history {
					state.push_turn(msg.role, msg.content.clone());
				}
			}

			// Compact before the checkpoint so a rollback cannot resurrect
			// turns the summary already replaced.
			service.maybe_summarize(&mut state).await;

			let checkpoint = state.turns.len();

			match service.run_turn(&mut state, &req, &tx).await {
				Ok(()) => {},
				Err(TurnEnd::Aborted) => {
					debug!(conversation = %id, "turn cancelled by receiver drop");
					state.rollback_to(checkpoint);
				},
				Err(TurnEnd::Failed(err)) => {
					warn!(conversation = %id, "turn failed: {err}");
					state.rollback_to(checkpoint);

					let _ = tx.send(StreamEvent::Error { message: err.to_string() }).await;
				},
			}

			state.touch();
		});

		Ok((id, rx))
	}

	async fn run_turn(
		&self,
		state: &mut ConversationState,
		req: &ChatTurnRequest,
		tx: &mpsc::Sender<StreamEvent>,
	) -> Result<(), TurnEnd> {
		let token = req.user_token.as_deref();

		emit(tx, StreamEvent::Thinking { message: "Thinking...".to_string() }).await?;

		self.maybe_fetch_profile(state, token).await;
		state.push_turn(Role::User, req.message.clone());

		let mut phase = TurnPhase::Idle;

		advance(&mut phase, TurnPhase::Deciding)?;

		let (decision, chat_note) = self.decide(&req.message).await;

		info!(strategy = decision.label(), "turn strategy decided");

		let (context, tool_note) = match &decision {
			StrategyDecision::Chat => {
				advance(&mut phase, TurnPhase::Chatting)?;

				(None, chat_note)
			},
			StrategyDecision::Retrieve { corpus, query, constraints, k } => {
				advance(&mut phase, TurnPhase::Retrieving)?;

				let context = self
					.retrieval_context(*corpus, query, constraints.as_ref(), *k)
					.await
					.map_err(TurnEnd::from)?;

				(context, None)
			},
			StrategyDecision::ToolCall { name, arguments } => {
				advance(&mut phase, TurnPhase::ToolExecuting)?;

				let run =
					self.execute_tool(name, arguments, token).await.map_err(TurnEnd::from)?;
				let note = match &run.context {
					Some(context) => Some(context.clone()),
					None => {
						// The failed call stays in history and the model is
						// told to explain, not to improvise data.
						advance(&mut phase, TurnPhase::Chatting)?;

						Some(
							"The data lookup failed. Tell the user you could not \
reach their data right now and do not invent any values."
								.to_string(),
						)
					},
				};

				state.push_tool_turn(
					format!("tool {name}: {}", run_outcome_label(&run)),
					run.record.clone(),
				);

				(None, note)
			},
		};

		let system =
			prompts::system_prompt(state.profile.as_ref(), context.as_deref(), tool_note.as_deref());
		let mut messages = vec![serde_json::json!({ "role": "system", "content": system })];

		messages.extend(prompts::history_messages(&state.turns));

		advance(&mut phase, TurnPhase::Responding)?;
		emit(tx, StreamEvent::Thinking { message: "Drafting response...".to_string() }).await?;

		let full = self.stream_reply(&messages, tx).await?;
		let commands = extract_commands(&full);

		state.push_turn(Role::Assistant, full);
		emit(tx, StreamEvent::Done { commands }).await?;
		advance(&mut phase, TurnPhase::Idle)?;

		Ok(())
	}

	/// Classify the message and map the intent to a strategy, plus an
	/// optional note injected into the system prompt for plain-chat
	/// strategies. Every failure here has a deterministic fallback; deciding
	/// never errors.
	async fn decide(&self, message: &str) -> (StrategyDecision, Option<String>) {
		let intent = match self
			.providers
			.reasoning
			.complete_text(
				&self.cfg.providers.reasoning,
				&prompts::classification_messages(message),
			)
			.await
		{
			Ok(label) => parse_category(&label).unwrap_or_else(|| {
				debug!(label, "unrecognized category label, using keyword fallback");

				classify_keywords(message)
			}),
			Err(err) => {
				warn!("classification call failed, using keyword fallback: {err}");

				classify_keywords(message)
			},
		};

		match intent {
			Intent::FoodSearch => {
				let (query, constraints, k) = self.parse_food_search(message).await;

				(StrategyDecision::Retrieve { corpus: Corpus::Food, query, constraints, k }, None)
			},
			Intent::ManualHelp => (
				StrategyDecision::Retrieve {
					corpus: Corpus::Manual,
					query: message.to_string(),
					constraints: None,
					k: self.cfg.retrieval.default_k,
				},
				None,
			),
			Intent::PersonalData => {
				let resource = infer_resource(message);
				let arguments = if resource == "daily_plan" {
					let date = self.resolve_plan_date(message).await;

					serde_json::json!({ "resource": resource, "date": date })
				} else {
					serde_json::json!({ "resource": resource })
				};

				(StrategyDecision::ToolCall { name: tools::BACKEND_TOOL.to_string(), arguments }, None)
			},
			Intent::WebSearch => (
				StrategyDecision::ToolCall {
					name: tools::WEB_SEARCH_TOOL.to_string(),
					arguments: serde_json::json!({ "query": message }),
				},
				None,
			),
			Intent::Action => (StrategyDecision::Chat, Some(prompts::ACTION_NOTE.to_string())),
			Intent::Chat => (StrategyDecision::Chat, None),
		}
	}

	/// Which date a meal-plan lookup is about. The reasoning model resolves
	/// relative wording against today; anything unparseable means today.
	async fn resolve_plan_date(&self, message: &str) -> String {
		let today = today_iso();
		let answer = match self
			.providers
			.reasoning
			.complete_text(
				&self.cfg.providers.reasoning,
				&prompts::resolve_date_messages(&today, message),
			)
			.await
		{
			Ok(answer) => answer,
			Err(err) => {
				debug!("date resolution failed, using today: {err}");

				return today;
			},
		};
		let candidate = answer.trim();

		match time::Date::parse(candidate, DATE_FORMAT) {
			Ok(_) => candidate.to_string(),
			Err(_) => {
				debug!(candidate, "unparseable target date, using today");

				today
			},
		}
	}

	/// LLM-parsed semantic query + constraints, with the raw message as the
	/// fallback on any parse problem.
	async fn parse_food_search(
		&self,
		message: &str,
	) -> (String, Option<SearchConstraints>, usize) {
		let fallback =
			(message.to_string(), None, self.cfg.retrieval.default_k);
		let parsed = match self
			.providers
			.reasoning
			.extract_json(&self.cfg.providers.reasoning, &prompts::search_parse_messages(message))
			.await
		{
			Ok(value) => value,
			Err(err) => {
				warn!("search parse failed, retrieving with the raw message: {err}");

				return fallback;
			},
		};
		let query = parsed
			.get("semantic_query")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|query| !query.is_empty())
			.unwrap_or(message)
			.to_string();
		let k = parsed
			.get("limit")
			.and_then(Value::as_u64)
			.map(|limit| (limit as usize).clamp(1, self.cfg.retrieval.max_k))
			.unwrap_or(self.cfg.retrieval.default_k);
		let constraints = match serde_json::from_value::<SearchConstraints>(parsed) {
			Ok(constraints) if !constraints.is_empty() => {
				// Model-produced constraints must still compile; drop them
				// instead of failing the user's turn.
				match plateful_domain::constraint::compile(&constraints) {
					Ok(_) => Some(constraints),
					Err(err) => {
						warn!("dropping unparseable model constraints: {err}");

						None
					},
				}
			},
			_ => None,
		};

		(query, constraints, k)
	}

	async fn retrieval_context(
		&self,
		corpus: Corpus,
		query: &str,
		constraints: Option<&SearchConstraints>,
		k: usize,
	) -> ServiceResult<Option<String>> {
		match self.answer_context(corpus, query, k, constraints).await {
			Ok(outcome) if outcome.items.is_empty() => Ok(Some(
				"The search returned no matching items. Say so and suggest \
loosening the requirements."
					.to_string(),
			)),
			Ok(outcome) => Ok(Some(prompts::grounding_context(&outcome))),
			// An unreachable index degrades the turn to ungrounded chat
			// rather than failing it; the model is told to hedge.
			Err(ServiceError::RetrievalUnavailable { message }) => {
				warn!("retrieval unavailable mid-turn: {message}");

				Ok(Some(
					"Search is currently unavailable. Answer from general \
knowledge, say that you could not check the live catalog, and avoid \
specific nutritional numbers."
						.to_string(),
				))
			},
			Err(err) => Err(err),
		}
	}

	async fn stream_reply(
		&self,
		messages: &[Value],
		tx: &mpsc::Sender<StreamEvent>,
	) -> Result<String, TurnEnd> {
		use futures::StreamExt;

		let mut stream = self
			.providers
			.chat
			.stream(&self.cfg.providers.chat, messages)
			.await
			.map_err(|err| TurnEnd::Failed(ServiceError::UpstreamModel {
				message: err.to_string(),
			}))?;
		let mut full = String::new();

		while let Some(delta) = stream.next().await {
			let delta = delta.map_err(|err| {
				TurnEnd::Failed(ServiceError::UpstreamModel { message: err.to_string() })
			})?;

			full.push_str(&delta);
			emit(tx, StreamEvent::Token { content: delta }).await?;
		}

		Ok(full)
	}

	/// Collapse old history into one system summary turn once the transcript
	/// grows past the configured threshold. Failures keep the full history.
	async fn maybe_summarize(&self, state: &mut ConversationState) {
		let total = state.turns.len();
		let keep = self.cfg.agent.keep_recent_turns;

		if total <= self.cfg.agent.summarize_after_turns {
			return;
		}

		let head = &state.turns[..total - keep];
		let summary = match self
			.providers
			.reasoning
			.complete_text(&self.cfg.providers.reasoning, &prompts::summarize_messages(head))
			.await
		{
			Ok(summary) => summary,
			Err(err) => {
				warn!("history summarization failed, keeping full history: {err}");

				return;
			},
		};
		let mut turns = Vec::with_capacity(keep + 1);
		let tail = state.turns.split_off(total - keep);

		turns.push(plateful_domain::conversation::ChatTurn::new(
			Role::System,
			format!("Conversation so far: {summary}"),
		));
		turns.extend(tail);
		state.turns = turns;
	}

	async fn maybe_fetch_profile(&self, state: &mut ConversationState, token: Option<&str>) {
		let Some(token) = token.filter(|token| !token.trim().is_empty()) else {
			return;
		};

		if state.profile.is_some() {
			return;
		}

		match self
			.providers
			.backend
			.fetch(&self.cfg.providers.backend, &BackendResource::Profile, token)
			.await
		{
			Ok(profile) => state.set_profile(profile),
			Err(err) => debug!("profile fetch failed, continuing without: {err}"),
		}
	}
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), TurnEnd> {
	tx.send(event).await.map_err(|_| TurnEnd::Aborted)
}

fn advance(phase: &mut TurnPhase, next: TurnPhase) -> Result<(), TurnEnd> {
	phase.advance(next).map_err(|err| {
		TurnEnd::Failed(ServiceError::InvalidRequest { message: err.to_string() })
	})
}

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
	time::macros::format_description!("[year]-[month]-[day]");

pub(crate) fn today_iso() -> String {
	let date = time::OffsetDateTime::now_utc().date();

	format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

fn infer_resource(message: &str) -> &'static str {
	let lowered = message.to_lowercase();

	if lowered.contains("pantry") {
		"pantry"
	} else if ["plan", "meal", "today", "tomorrow"].iter().any(|word| lowered.contains(word)) {
		"daily_plan"
	} else {
		"profile"
	}
}

fn run_outcome_label(run: &tools::ToolRun) -> &'static str {
	match run.record.outcome {
		plateful_domain::conversation::ToolOutcome::Success => "succeeded",
		plateful_domain::conversation::ToolOutcome::Failed { .. } => "failed",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stream_events_serialize_with_status_tag() {
		let event = StreamEvent::Token { content: "hi".to_string() };
		let json = serde_json::to_value(&event).expect("serializes");

		assert_eq!(json["status"], "token");
		assert_eq!(json["content"], "hi");

		let done = StreamEvent::Done { commands: vec![serde_json::json!({ "type": "set_goal" })] };
		let json = serde_json::to_value(&done).expect("serializes");

		assert_eq!(json["status"], "done");
		assert_eq!(json["commands"][0]["type"], "set_goal");
	}

	#[test]
	fn resource_inference_prefers_specific_keywords() {
		assert_eq!(infer_resource("what's in my pantry?"), "pantry");
		assert_eq!(infer_resource("show my plan for today"), "daily_plan");
		assert_eq!(infer_resource("what am I eating tomorrow?"), "daily_plan");
		assert_eq!(infer_resource("what are my macros set to"), "profile");
	}

	#[test]
	fn today_is_rendered_as_an_iso_date() {
		let today = today_iso();

		assert!(time::Date::parse(&today, DATE_FORMAT).is_ok());
	}
}
