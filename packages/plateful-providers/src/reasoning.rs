use color_eyre::{Result, eyre};
use serde_json::Value;

/// Ask the reasoning model for a JSON object. Providers occasionally wrap
/// JSON in prose or fences, so the call retries up to three times before
/// giving up.
pub async fn extract_json(
	cfg: &plateful_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<Value> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	for attempt in 0..3 {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_json_content(json) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => tracing::debug!(attempt, "reasoning output was not JSON: {err}"),
		}
	}

	Err(eyre::eyre!("Reasoning response is not valid JSON after 3 attempts."))
}

/// One-shot plain-text completion from the reasoning model, used for
/// single-label classification.
pub async fn complete_text(
	cfg: &plateful_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	content_of(&json)
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Reasoning response is missing message content."))
}

fn parse_json_content(json: Value) -> Result<Value> {
	if let Some(content) = content_of(&json) {
		let candidate = strip_fences(content);
		let parsed: Value = serde_json::from_str(candidate)
			.map_err(|_| eyre::eyre!("Reasoning content is not valid JSON."))?;

		return Ok(parsed);
	}

	if json.is_object() {
		return Ok(json);
	}

	Err(eyre::eyre!("Reasoning response is missing JSON content."))
}

fn content_of(json: &Value) -> Option<&str> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
}

fn strip_fences(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
