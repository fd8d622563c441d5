mod error;
mod request;

pub use error::{Error, Result};
pub use request::{ApiRequest, Method};

use reqwest::{
	Client, Response,
	header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

/// Header the server reads the API key from.
pub const API_KEY_HEADER: &str = "apiKey";

pub fn default_headers(cfg: &mr_config::Server) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = cfg.api_key.as_deref() {
		let mut value = HeaderValue::from_str(api_key)?;

		value.set_sensitive(true);
		headers.insert(HeaderName::from_bytes(API_KEY_HEADER.as_bytes())?, value);
	}

	for (key, value) in &cfg.default_headers {
		headers.insert(HeaderName::from_bytes(key.as_bytes())?, value.parse()?);
	}

	Ok(headers)
}

/// HTTP transport for [`ApiRequest`]s against the configured server.
#[derive(Clone, Debug)]
pub struct RemoteClient {
	api_base: String,
	client: Client,
}
impl RemoteClient {
	pub fn new(cfg: &mr_config::Server) -> Result<Self> {
		let client = Client::builder().default_headers(default_headers(cfg)?).build()?;

		Ok(Self { api_base: cfg.api_base.trim_end_matches('/').to_string(), client })
	}

	pub fn api_base(&self) -> &str {
		&self.api_base
	}

	pub async fn send(&self, request: &ApiRequest) -> Result<Value> {
		let url = format!("{}{}", self.api_base, request.path()?);
		let mut builder =
			self.client.request(request.method().into(), url.as_str()).query(request.query());

		if let Some(body) = request.json_body() {
			builder = builder.json(body);
		}

		tracing::debug!(method = request.method().as_str(), %url, "Sending server request.");

		let res = builder.send().await?;

		parse_response(res).await
	}
}

async fn parse_response(res: Response) -> Result<Value> {
	let status = res.status();
	let bytes = res.bytes().await?;

	if !status.is_success() {
		return Err(Error::Status { status: status.as_u16(), message: error_message(&bytes) });
	}
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	Ok(serde_json::from_slice(&bytes)?)
}

/// The server wraps most failures as `{"status": "...", "message": "..."}`.
fn error_message(bytes: &[u8]) -> String {
	if let Ok(json) = serde_json::from_slice::<Value>(bytes)
		&& let Some(message) = json.get("message").and_then(Value::as_str)
	{
		return message.to_string();
	}

	let text = String::from_utf8_lossy(bytes).trim().to_string();

	if text.is_empty() { "No response body.".to_string() } else { text }
}
