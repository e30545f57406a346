//! Read-only client for the main application backend.
//!
//! Requests are made on the caller's behalf with their bearer token, so the
//! backend's own authorization rules apply unchanged.

use color_eyre::{Result, eyre};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResource {
	/// The plan for one day; `date` is `YYYY-MM-DD`.
	DailyPlan { date: String },
	Pantry,
	Profile,
}
impl BackendResource {
	pub fn path(&self) -> &'static str {
		match self {
			Self::DailyPlan { .. } => "/users/me/daily-plan",
			Self::Pantry => "/users/me/pantry",
			Self::Profile => "/users/me/profile",
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DailyPlan { .. } => "daily_plan",
			Self::Pantry => "pantry",
			Self::Profile => "profile",
		}
	}

	fn query(&self) -> Option<(&'static str, &str)> {
		match self {
			Self::DailyPlan { date } => Some(("date", date.as_str())),
			Self::Pantry | Self::Profile => None,
		}
	}
}

pub async fn fetch(
	cfg: &plateful_config::BackendConfig,
	resource: &BackendResource,
	user_token: &str,
) -> Result<Value> {
	if user_token.trim().is_empty() {
		return Err(eyre::eyre!("Backend requests require a user token."));
	}

	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.base_url, resource.path());
	let mut req = client.get(url).bearer_auth(user_token);

	if let Some(pair) = resource.query() {
		req = req.query(&[pair]);
	}

	let res = req.send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	Ok(json)
}
