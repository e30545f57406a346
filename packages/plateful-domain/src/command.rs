//! Frontend command extraction.
//!
//! Assistant responses may embed JSON command objects for the frontend to
//! act on (add an item to the plan, open a view). The scanner walks the text
//! with a brace counter, so commands survive surrounding prose and code
//! fences, and keeps only objects whose `type` is a known command.

use serde_json::Value;

const COMMAND_TYPES: &[&str] =
	&["add_to_plan", "remove_from_plan", "open_view", "update_pantry", "set_goal"];

/// Extract recognized command objects from free-form model output, in order
/// of appearance. Malformed JSON and unknown types are skipped silently.
pub fn extract_commands(text: &str) -> Vec<Value> {
	let bytes = text.as_bytes();
	let mut commands = Vec::new();
	let mut idx = 0;

	while idx < bytes.len() {
		if bytes[idx] != b'{' {
			idx += 1;

			continue;
		}

		let mut depth = 0_usize;
		let mut in_string = false;
		let mut escaped = false;
		let mut end = None;

		for (offset, &byte) in bytes[idx..].iter().enumerate() {
			if escaped {
				escaped = false;

				continue;
			}

			match byte {
				b'\\' if in_string => escaped = true,
				b'"' => in_string = !in_string,
				b'{' if !in_string => depth += 1,
				b'}' if !in_string => {
					depth -= 1;

					if depth == 0 {
						end = Some(idx + offset + 1);

						break;
					}
				},
				_ => {},
			}
		}

		let Some(end) = end else {
			// Unbalanced braces from here on, nothing more to find.
			break;
		};

		if let Ok(value) = serde_json::from_str::<Value>(&text[idx..end])
			&& value
				.get("type")
				.and_then(Value::as_str)
				.is_some_and(|kind| COMMAND_TYPES.contains(&kind))
		{
			commands.push(value);
		}

		idx = end;
	}

	commands
}
