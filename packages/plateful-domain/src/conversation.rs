//! Conversation transcript types.
//!
//! The transcript is append-only during a turn. When a turn fails after
//! partial writes, the caller rolls back to the length it recorded before
//! the turn started, so a failed turn never leaves half an exchange behind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
			Self::Tool => "tool",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ToolOutcome {
	Success,
	Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
	pub name: String,
	pub arguments: Value,
	#[serde(flatten)]
	pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
	pub role: Role,
	pub content: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tool_call: Option<ToolCallRecord>,
	#[serde(with = "time::serde::rfc3339")]
	pub at: OffsetDateTime,
}
impl ChatTurn {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into(), tool_call: None, at: OffsetDateTime::now_utc() }
	}
}

/// Per-conversation state. A summary turn, when present, is a `System` turn
/// at the head of `turns` that condenses everything evicted before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
	pub id: Uuid,
	pub turns: Vec<ChatTurn>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<Value>,
	#[serde(with = "time::serde::rfc3339")]
	pub last_active: OffsetDateTime,
}
impl ConversationState {
	pub fn new(id: Uuid) -> Self {
		Self { id, turns: Vec::new(), profile: None, last_active: OffsetDateTime::now_utc() }
	}

	pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
		self.turns.push(ChatTurn::new(role, content));
		self.touch();
	}

	pub fn push_tool_turn(&mut self, content: impl Into<String>, record: ToolCallRecord) {
		let mut turn = ChatTurn::new(Role::Tool, content);

		turn.tool_call = Some(record);

		self.turns.push(turn);
		self.touch();
	}

	pub fn recent(&self, n: usize) -> &[ChatTurn] {
		let start = self.turns.len().saturating_sub(n);

		&self.turns[start..]
	}

	/// Discard everything appended after `len`. Used to undo a failed turn.
	pub fn rollback_to(&mut self, len: usize) {
		self.turns.truncate(len);
	}

	pub fn set_profile(&mut self, profile: Value) {
		self.profile = Some(profile);
		self.touch();
	}

	pub fn touch(&mut self) {
		self.last_active = OffsetDateTime::now_utc();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rollback_discards_partial_turn() {
		let mut state = ConversationState::new(Uuid::new_v4());

		state.push_turn(Role::User, "hello");
		state.push_turn(Role::Assistant, "hi there");

		let checkpoint = state.turns.len();

		state.push_turn(Role::User, "plan my week");
		state.push_turn(Role::Assistant, "working on");
		state.rollback_to(checkpoint);

		assert_eq!(state.turns.len(), 2);
		assert_eq!(state.turns.last().map(|turn| turn.content.as_str()), Some("hi there"));
	}

	#[test]
	fn recent_clamps_to_available_turns() {
		let mut state = ConversationState::new(Uuid::new_v4());

		state.push_turn(Role::User, "one");

		assert_eq!(state.recent(10).len(), 1);

		state.push_turn(Role::Assistant, "two");
		state.push_turn(Role::User, "three");

		let recent = state.recent(2);

		assert_eq!(recent.len(), 2);
		assert_eq!(recent[0].content, "two");
	}

	#[test]
	fn tool_turn_carries_record() {
		let mut state = ConversationState::new(Uuid::new_v4());

		state.push_tool_turn(
			"pantry: eggs, rice",
			ToolCallRecord {
				name: "backend".to_string(),
				arguments: serde_json::json!({ "resource": "pantry" }),
				outcome: ToolOutcome::Success,
			},
		);

		let turn = state.turns.last().expect("turn pushed");

		assert_eq!(turn.role, Role::Tool);
		assert!(turn.tool_call.is_some());
	}
}
