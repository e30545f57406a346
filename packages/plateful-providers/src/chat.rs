//! Streaming and non-streaming chat completions over the OpenAI-style API.

use color_eyre::{Result, eyre};
use futures::StreamExt;
use serde_json::Value;

/// Pull-based token stream over an SSE chat response. Dropping it aborts the
/// underlying request, which is how a cancelled turn stops mid-generation.
///
/// The buffer stays raw bytes until a full line is available; transport
/// chunks can split a multibyte character anywhere.
pub struct ChatStream {
	inner: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
	buffer: Vec<u8>,
	done: bool,
}
impl ChatStream {
	/// Next content delta, `None` once the provider sends `[DONE]` or the
	/// byte stream ends.
	pub async fn next_delta(&mut self) -> Result<Option<String>> {
		loop {
			if self.done {
				return Ok(None);
			}
			if let Some(delta) = self.drain_buffered_line()? {
				return Ok(Some(delta));
			}

			match self.inner.next().await {
				Some(chunk) => {
					let bytes = chunk?;

					self.buffer.extend_from_slice(&bytes);
				},
				None => {
					self.done = true;

					return Ok(None);
				},
			}
		}
	}

	fn drain_buffered_line(&mut self) -> Result<Option<String>> {
		while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
			let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
			let line = String::from_utf8_lossy(&raw);
			let line = line.trim();

			let Some(data) = line.strip_prefix("data:") else {
				continue;
			};
			let data = data.trim();

			if data == "[DONE]" {
				self.done = true;

				return Ok(None);
			}
			if let Some(delta) = parse_stream_delta(data)?
				&& !delta.is_empty()
			{
				return Ok(Some(delta));
			}
		}

		Ok(None)
	}
}

pub async fn stream(
	cfg: &plateful_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<ChatStream> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"stream": true,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;

	Ok(ChatStream { inner: res.bytes_stream().boxed(), buffer: Vec::new(), done: false })
}

/// One-shot completion, used for summarization and non-streaming replies.
pub async fn complete(
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

	parse_completion(json)
}

fn parse_stream_delta(data: &str) -> Result<Option<String>> {
	let chunk: Value = serde_json::from_str(data)
		.map_err(|_| eyre::eyre!("Chat stream chunk is not valid JSON."))?;
	let delta = chunk
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.and_then(|content| content.as_str())
		.map(str::to_string);

	Ok(delta)
}

fn parse_completion(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Chat response is missing message content."))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stream_of(chunks: Vec<&[u8]>) -> ChatStream {
		let items: Vec<reqwest::Result<bytes::Bytes>> =
			chunks.into_iter().map(|chunk| Ok(bytes::Bytes::copy_from_slice(chunk))).collect();

		ChatStream { inner: futures::stream::iter(items).boxed(), buffer: Vec::new(), done: false }
	}

	#[test]
	fn reassembles_multibyte_chars_split_across_chunks() {
		let payload =
			"data: {\"choices\": [{\"delta\": {\"content\": \"bún chả\"}}]}\n\ndata: [DONE]\n\n";
		let bytes = payload.as_bytes();
		// Cut inside the two-byte "ú" so neither chunk is valid UTF-8 alone.
		let split = payload.find('ú').expect("payload has the char") + 1;
		let mut stream = stream_of(vec![&bytes[..split], &bytes[split..]]);

		let delta = futures::executor::block_on(stream.next_delta())
			.expect("stream parses")
			.expect("delta present");

		assert_eq!(delta, "bún chả");
		assert_eq!(futures::executor::block_on(stream.next_delta()).expect("stream ends"), None);
	}

	#[test]
	fn parses_stream_delta_content() {
		let data = r#"{"choices": [{"delta": {"content": "Hel"}}]}"#;

		assert_eq!(parse_stream_delta(data).expect("parse failed"), Some("Hel".to_string()));
	}

	#[test]
	fn tolerates_delta_without_content() {
		let data = r#"{"choices": [{"delta": {"role": "assistant"}}]}"#;

		assert_eq!(parse_stream_delta(data).expect("parse failed"), None);
	}

	#[test]
	fn parses_completion_content() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "Hello!" } }]
		});

		assert_eq!(parse_completion(json).expect("parse failed"), "Hello!");
	}

	#[test]
	fn rejects_completion_without_choices() {
		assert!(parse_completion(serde_json::json!({ "choices": [] })).is_err());
	}
}
