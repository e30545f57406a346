//! Prompt construction for the chat, classification, search-parse, and
//! summarization calls.

use plateful_domain::conversation::{ChatTurn, Role};
use serde_json::Value;

use crate::{RankedResult, SearchOutcome};

const ASSISTANT_PROMPT: &str = "You are Plateful's meal-planning assistant. \
Answer briefly and concretely. Ground every nutritional claim in the \
provided context when context is present; say so when you are unsure. \
When the user asks you to change their plan, emit a JSON command object \
with a \"type\" field alongside your reply.";

const DEGRADED_NOTICE: &str = "PARTIAL RESULTS: the primary search index was \
unavailable and the items below come from keyword matching only. Present \
them with reduced confidence and say the results may be incomplete.";

pub const ACTION_NOTE: &str = "The user is asking for an app action. Generate \
the matching JSON command object with a \"type\" field alongside a short \
confirmation, and only describe changes that command actually makes.";

pub fn system_prompt(
	profile: Option<&Value>,
	context: Option<&str>,
	tool_note: Option<&str>,
) -> String {
	let mut prompt = ASSISTANT_PROMPT.to_string();

	if let Some(profile) = profile {
		prompt.push_str("\n\nUser profile:\n");
		prompt.push_str(&profile.to_string());
	}
	if let Some(context) = context {
		prompt.push_str("\n\nContext:\n");
		prompt.push_str(context);
	}
	if let Some(note) = tool_note {
		prompt.push_str("\n\n");
		prompt.push_str(note);
	}

	prompt
}

/// Render ranked results into the grounding block. Degraded outcomes are
/// prefixed with an explicit partial-results notice.
pub fn grounding_context(outcome: &SearchOutcome) -> String {
	let mut out = String::new();

	if outcome.degraded {
		out.push_str(DEGRADED_NOTICE);
		out.push_str("\n\n");
	}

	for item in &outcome.items {
		out.push_str(&render_item(item));
		out.push_str("\n\n");
	}

	out.trim_end().to_string()
}

fn render_item(item: &RankedResult) -> String {
	if item.attributes.name.is_empty() {
		format!("[{rank}] {text}", rank = item.rank, text = item.text)
	} else {
		format!("[{rank}] {summary}", rank = item.rank, summary = item.attributes.summary())
	}
}

pub fn classification_messages(message: &str) -> Vec<Value> {
	let system = "Classify the user message into exactly one category. \
Reply with the category label only, nothing else.\n\
Categories:\n\
FOOD_SEARCH - looking for foods, recipes, or meals, possibly with nutritional requirements\n\
MANUAL_HELP - asking how to use the app or one of its features\n\
PERSONAL_DATA - asking about their own meal plan, pantry, or profile\n\
WEB_SEARCH - external knowledge, current events, or food facts unlikely to be in the catalog\n\
ACTION - asking the assistant to change something in the app\n\
GENERAL - anything else";

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": message }),
	]
}

/// Ask the reasoning model to split a food request into a semantic query
/// plus hard constraints.
pub fn search_parse_messages(message: &str) -> Vec<Value> {
	let schema = serde_json::json!({
		"semantic_query": "string",
		"ranges": { "calories": { "min": 0.0, "max": 0.0 } },
		"meal_slots": ["string"],
		"exclude_tags": ["string"],
		"limit": 5
	});
	let system = format!(
		"Extract search parameters from the user's food request. Output valid \
JSON only, matching this schema (omit fields that do not apply):\n{schema}\n\
Numeric range names: calories, protein_g, carbs_g, fat_g, fiber_g, \
total_time_minutes. Meal slots: breakfast, lunch, dinner, snack. \
Put everything that is not a hard numeric or slot requirement into \
semantic_query.",
		schema = serde_json::to_string_pretty(&schema).unwrap_or_default()
	);

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": message }),
	]
}

/// Ask the reasoning model which date a plan lookup is about, relative to
/// today. The reply must be a bare `YYYY-MM-DD`.
pub fn resolve_date_messages(context_date: &str, message: &str) -> Vec<Value> {
	let system = format!(
		"Determine the target date for the user's request. The current date is \
{context_date}. If the user names a day (tomorrow, next Monday, 21/01), resolve \
it relative to the current date; otherwise answer with the current date. Reply \
with the date in YYYY-MM-DD format and nothing else."
	);

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": message }),
	]
}

pub fn summarize_messages(turns: &[ChatTurn]) -> Vec<Value> {
	let system = "Summarize this conversation between a user and a meal-planning \
assistant in at most five sentences. Keep every stated dietary preference, \
restriction, goal, and decision. Output the summary text only.";
	let transcript = turns
		.iter()
		.map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
		.collect::<Vec<_>>()
		.join("\n");

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": transcript }),
	]
}

/// History as provider wire messages, oldest first. Tool records travel as
/// system notes: OpenAI-style endpoints reject a `tool` message that is not
/// paired with an assistant `tool_calls` message.
pub fn history_messages(turns: &[ChatTurn]) -> Vec<Value> {
	turns
		.iter()
		.map(|turn| {
			let role = match turn.role {
				Role::Tool => "system",
				role => role.as_str(),
			};

			serde_json::json!({ "role": role, "content": turn.content })
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use plateful_domain::constraint::ItemAttributes;

	fn outcome(degraded: bool) -> SearchOutcome {
		SearchOutcome {
			items: vec![RankedResult {
				id: "1".to_string(),
				score: 0.9,
				rank: 1,
				text: "Grilled salmon with greens".to_string(),
				attributes: ItemAttributes::default(),
			}],
			degraded,
		}
	}

	#[test]
	fn degraded_context_carries_partial_notice() {
		let context = grounding_context(&outcome(true));

		assert!(context.starts_with("PARTIAL RESULTS"));
		assert!(context.contains("Grilled salmon"));
	}

	#[test]
	fn healthy_context_has_no_notice() {
		let context = grounding_context(&outcome(false));

		assert!(!context.contains("PARTIAL RESULTS"));
		assert!(context.starts_with("[1]"));
	}

	#[test]
	fn tool_turns_travel_as_system_messages() {
		let turns = vec![
			ChatTurn::new(Role::User, "what's in my pantry?"),
			ChatTurn::new(Role::Tool, "tool backend: succeeded"),
			ChatTurn::new(Role::Assistant, "You have eggs and rice."),
		];
		let messages = history_messages(&turns);

		assert!(messages.iter().all(|msg| msg["role"] != "tool"));
		assert_eq!(messages[1]["role"], "system");
		assert_eq!(messages[1]["content"], "tool backend: succeeded");
	}

	#[test]
	fn system_prompt_layers_sections_in_order() {
		let profile = serde_json::json!({ "diet": "vegetarian" });
		let prompt = system_prompt(Some(&profile), Some("[1] Lentil soup"), None);
		let profile_at = prompt.find("User profile").expect("profile section");
		let context_at = prompt.find("Context:").expect("context section");

		assert!(profile_at < context_at);
	}
}
