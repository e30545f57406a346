//! Intent classification labels and the keyword fallback.
//!
//! The primary classifier is a reasoning-model call that returns one of the
//! labels below. When that call fails or returns garbage, `classify_keywords`
//! gives a deterministic answer so a turn always has a strategy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	FoodSearch,
	ManualHelp,
	PersonalData,
	WebSearch,
	Action,
	Chat,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FoodSearch => "food_search",
			Self::ManualHelp => "manual_help",
			Self::PersonalData => "personal_data",
			Self::WebSearch => "web_search",
			Self::Action => "action",
			Self::Chat => "chat",
		}
	}
}

/// Map a classifier label to an intent. Tolerates surrounding whitespace and
/// either case; anything unrecognized is `None` so the caller can fall back.
pub fn parse_category(raw: &str) -> Option<Intent> {
	match raw.trim().to_ascii_uppercase().as_str() {
		"FOOD_SEARCH" => Some(Intent::FoodSearch),
		"MANUAL_HELP" => Some(Intent::ManualHelp),
		"PERSONAL_DATA" => Some(Intent::PersonalData),
		"WEB_SEARCH" => Some(Intent::WebSearch),
		"ACTION" => Some(Intent::Action),
		"GENERAL" | "CHAT" => Some(Intent::Chat),
		_ => None,
	}
}

const PERSONAL_KEYWORDS: &[&str] = &[
	"my plan",
	"meal plan",
	"my pantry",
	"pantry",
	"my profile",
	"my goal",
	"my macros",
	"today's plan",
	"daily plan",
];
const MANUAL_KEYWORDS: &[&str] =
	&["how do i", "how to", "where is", "how can i", "app", "feature", "settings", "export"];
const FOOD_KEYWORDS: &[&str] = &[
	"recipe",
	"meal",
	"dish",
	"dinner",
	"lunch",
	"breakfast",
	"snack",
	"calorie",
	"calories",
	"protein",
	"carb",
	"keto",
	"vegan",
	"vegetarian",
	"gluten",
	"ingredient",
	"cook",
	"eat",
	"food",
];

/// Deterministic fallback classifier. Checks run most-specific first so
/// "how do I log my pantry" lands on personal data, not manual help.
pub fn classify_keywords(message: &str) -> Intent {
	let lowered = message.to_lowercase();

	if PERSONAL_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return Intent::PersonalData;
	}
	if MANUAL_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return Intent::ManualHelp;
	}
	if FOOD_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return Intent::FoodSearch;
	}

	Intent::Chat
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_classifier_labels() {
		assert_eq!(parse_category("FOOD_SEARCH"), Some(Intent::FoodSearch));
		assert_eq!(parse_category(" manual_help \n"), Some(Intent::ManualHelp));
		assert_eq!(parse_category("WEB_SEARCH"), Some(Intent::WebSearch));
		assert_eq!(parse_category("GENERAL"), Some(Intent::Chat));
		assert_eq!(parse_category("WEATHER"), None);
		assert_eq!(parse_category(""), None);
	}

	#[test]
	fn keyword_fallback_prefers_personal_data() {
		assert_eq!(classify_keywords("How do I log my pantry?"), Intent::PersonalData);
		assert_eq!(classify_keywords("what's in today's plan"), Intent::PersonalData);
	}

	#[test]
	fn keyword_fallback_detects_manual_and_food() {
		assert_eq!(classify_keywords("How do I export a shopping list?"), Intent::ManualHelp);
		assert_eq!(classify_keywords("suggest a high protein dinner"), Intent::FoodSearch);
	}

	#[test]
	fn keyword_fallback_defaults_to_chat() {
		assert_eq!(classify_keywords("thanks, that was helpful"), Intent::Chat);
	}
}
