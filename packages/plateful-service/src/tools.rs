//! Tool registry and execution.
//!
//! Two tools: read-only access to the planner backend (daily plan, pantry,
//! profile) on the user's own bearer token, and a web search for questions
//! outside the catalog. Arguments are validated before the call; a failed
//! call is reported as a failed record, never as fabricated output.

use plateful_providers::backend::BackendResource;
use serde_json::Value;

use plateful_domain::conversation::{ToolCallRecord, ToolOutcome};

use crate::{Service, ServiceError, ServiceResult, agent::today_iso};

pub const BACKEND_TOOL: &str = "backend";
pub const WEB_SEARCH_TOOL: &str = "web_search";

pub fn known_tools() -> &'static [&'static str] {
	&[BACKEND_TOOL, WEB_SEARCH_TOOL]
}

/// Result of running a tool: the history record plus, on success, context
/// text for the follow-up chat call.
#[derive(Debug, Clone)]
pub struct ToolRun {
	pub record: ToolCallRecord,
	pub context: Option<String>,
}

impl Service {
	pub async fn execute_tool(
		&self,
		name: &str,
		arguments: &Value,
		user_token: Option<&str>,
	) -> ServiceResult<ToolRun> {
		match name {
			BACKEND_TOOL => self.run_backend_tool(arguments, user_token).await,
			WEB_SEARCH_TOOL => self.run_web_search_tool(arguments).await,
			_ => Err(ServiceError::ToolExecutionFailed {
				message: format!("Unknown tool '{name}'."),
			}),
		}
	}

	async fn run_backend_tool(
		&self,
		arguments: &Value,
		user_token: Option<&str>,
	) -> ServiceResult<ToolRun> {
		let resource = match arguments.get("resource").and_then(Value::as_str) {
			Some("daily_plan") => {
				// Callers resolve relative dates; a bare lookup means today.
				let date = arguments
					.get("date")
					.and_then(Value::as_str)
					.map(str::to_string)
					.unwrap_or_else(today_iso);

				BackendResource::DailyPlan { date }
			},
			Some("pantry") => BackendResource::Pantry,
			Some("profile") => BackendResource::Profile,
			_ => {
				return Err(ServiceError::ToolExecutionFailed {
					message: "Tool 'backend' requires a resource of daily_plan, pantry, or profile."
						.to_string(),
				});
			},
		};
		let Some(token) = user_token.filter(|token| !token.trim().is_empty()) else {
			return Ok(ToolRun {
				record: ToolCallRecord {
					name: BACKEND_TOOL.to_string(),
					arguments: arguments.clone(),
					outcome: ToolOutcome::Failed {
						message: "No user token was provided.".to_string(),
					},
				},
				context: None,
			});
		};

		match self.providers.backend.fetch(&self.cfg.providers.backend, &resource, token).await {
			Ok(payload) => {
				let label = match &resource {
					BackendResource::DailyPlan { date } => format!("meal plan for {date}"),
					BackendResource::Pantry => "pantry".to_string(),
					BackendResource::Profile => "profile".to_string(),
				};

				Ok(ToolRun {
					record: ToolCallRecord {
						name: BACKEND_TOOL.to_string(),
						arguments: arguments.clone(),
						outcome: ToolOutcome::Success,
					},
					context: Some(format!("Live data from the user's {label}:\n{payload}")),
				})
			},
			Err(err) => Ok(ToolRun {
				record: ToolCallRecord {
					name: BACKEND_TOOL.to_string(),
					arguments: arguments.clone(),
					outcome: ToolOutcome::Failed { message: err.to_string() },
				},
				context: None,
			}),
		}
	}

	async fn run_web_search_tool(&self, arguments: &Value) -> ServiceResult<ToolRun> {
		let query = arguments
			.get("query")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|query| !query.is_empty())
			.ok_or_else(|| ServiceError::ToolExecutionFailed {
				message: "Tool 'web_search' requires a non-empty query.".to_string(),
			})?;

		match self.providers.search.search(&self.cfg.providers.web_search, query).await {
			Ok(hits) => {
				let context = if hits.is_empty() {
					"No web results found.".to_string()
				} else {
					let block = hits
						.iter()
						.map(|hit| {
							format!(
								"Title: {title}\nLink: {url}\nSnippet: {snippet}",
								title = hit.title,
								url = hit.url,
								snippet = hit.snippet
							)
						})
						.collect::<Vec<_>>()
						.join("\n---\n");

					format!("Web results:\n{block}")
				};

				Ok(ToolRun {
					record: ToolCallRecord {
						name: WEB_SEARCH_TOOL.to_string(),
						arguments: arguments.clone(),
						outcome: ToolOutcome::Success,
					},
					context: Some(context),
				})
			},
			Err(err) => Ok(ToolRun {
				record: ToolCallRecord {
					name: WEB_SEARCH_TOOL.to_string(),
					arguments: arguments.clone(),
					outcome: ToolOutcome::Failed { message: err.to_string() },
				},
				context: None,
			}),
		}
	}
}
