//! Turn strategy and the per-turn phase machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Corpus, constraint::SearchConstraints};

/// The plan for a single turn, computed exactly once after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StrategyDecision {
	Chat,
	Retrieve {
		corpus: Corpus,
		query: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		constraints: Option<SearchConstraints>,
		k: usize,
	},
	ToolCall {
		name: String,
		arguments: Value,
	},
}
impl StrategyDecision {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Chat => "chat",
			Self::Retrieve { .. } => "retrieve",
			Self::ToolCall { .. } => "tool_call",
		}
	}
}

/// Phases a turn moves through. Transitions are one-directional within a
/// turn; in particular `Deciding` is entered once and never re-entered, so
/// a turn cannot loop between strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
	Idle,
	Deciding,
	Chatting,
	Retrieving,
	ToolExecuting,
	Responding,
}
impl TurnPhase {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Deciding => "deciding",
			Self::Chatting => "chatting",
			Self::Retrieving => "retrieving",
			Self::ToolExecuting => "tool_executing",
			Self::Responding => "responding",
		}
	}

	pub fn advance(&mut self, next: Self) -> Result<(), PhaseError> {
		let allowed = matches!(
			(*self, next),
			(Self::Idle, Self::Deciding)
				| (Self::Deciding, Self::Chatting)
				| (Self::Deciding, Self::Retrieving)
				| (Self::Deciding, Self::ToolExecuting)
				// A failed tool call falls back to plain chat without
				// revisiting the decision.
				| (Self::ToolExecuting, Self::Chatting)
				| (Self::Chatting, Self::Responding)
				| (Self::Retrieving, Self::Responding)
				| (Self::ToolExecuting, Self::Responding)
				| (Self::Responding, Self::Idle)
		);

		if allowed {
			*self = next;

			Ok(())
		} else {
			Err(PhaseError { from: *self, to: next })
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid phase transition from {} to {}.", from.as_str(), to.as_str())]
pub struct PhaseError {
	pub from: TurnPhase,
	pub to: TurnPhase,
}
