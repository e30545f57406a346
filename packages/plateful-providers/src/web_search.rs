//! Web search over a SearXNG-compatible JSON endpoint.
//!
//! Used for questions outside the catalog and manual, so the assistant can
//! ground general food-knowledge answers instead of improvising them.

use color_eyre::Result;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebHit {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default, alias = "content")]
	pub snippet: String,
}

pub async fn search(
	cfg: &plateful_config::WebSearchConfig,
	query: &str,
) -> Result<Vec<WebHit>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}/search", cfg.base_url);
	let res = client
		.get(url)
		.query(&[("q", query), ("format", "json")])
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	Ok(parse_hits(json, cfg.max_results))
}

fn parse_hits(json: Value, max_results: usize) -> Vec<WebHit> {
	let mut hits: Vec<WebHit> = json
		.get("results")
		.cloned()
		.and_then(|results| serde_json::from_value(results).ok())
		.unwrap_or_default();

	hits.retain(|hit: &WebHit| !hit.title.is_empty() || !hit.snippet.is_empty());
	hits.truncate(max_results);
	hits
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_and_truncates_results() {
		let json = serde_json::json!({
			"results": [
				{ "title": "Keto basics", "url": "https://a", "content": "Low-carb overview" },
				{ "title": "Pizza history", "url": "https://b", "content": "Naples, 1889" },
				{ "title": "Third", "url": "https://c", "content": "extra" }
			]
		});
		let hits = parse_hits(json, 2);

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].title, "Keto basics");
		assert_eq!(hits[0].snippet, "Low-carb overview");
	}

	#[test]
	fn missing_results_parse_to_empty() {
		assert!(parse_hits(serde_json::json!({}), 3).is_empty());
		assert!(parse_hits(serde_json::json!({ "results": "bogus" }), 3).is_empty());
	}
}
