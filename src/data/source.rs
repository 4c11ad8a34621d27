use std::collections::HashMap;

use gloo_timers::future::TimeoutFuture;
use log::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use super::error::FetchError;
use crate::config::{RetryPolicy, SourceConfig};

/// Dataset file names, relative to the source root.
pub mod files {
	pub const METRICS: &str = "system-metrics.json";
	pub const TRANSACTIONS: &str = "transactions.json";
}

const BUNDLED: &[(&str, &str)] = &[
	("us-wires.json", include_str!("../../fixtures/us-wires.json")),
	("korea.json", include_str!("../../fixtures/korea.json")),
	(files::METRICS, include_str!("../../fixtures/system-metrics.json")),
	(files::TRANSACTIONS, include_str!("../../fixtures/transactions.json")),
];

/// Anything that can hand back the body of a named JSON document.
#[allow(async_fn_in_trait)]
pub trait DataSource {
	async fn fetch_text(&self, path: &str) -> Result<String, FetchError>;
}

/// In-memory documents, optionally delayed to mimic network latency.
#[derive(Clone, Debug, Default)]
pub struct FixtureSource {
	files: HashMap<String, String>,
	delay_ms: u32,
}

impl FixtureSource {
	pub fn new(delay_ms: u32) -> Self {
		Self {
			files: HashMap::new(),
			delay_ms,
		}
	}

	/// The fixtures shipped with the app.
	pub fn bundled(delay_ms: u32) -> Self {
		BUNDLED
			.iter()
			.fold(Self::new(delay_ms), |s, (path, body)| s.with_file(*path, *body))
	}

	pub fn with_file(mut self, path: impl Into<String>, body: impl Into<String>) -> Self {
		self.files.insert(path.into(), body.into());
		self
	}
}

impl DataSource for FixtureSource {
	async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
		pause(self.delay_ms).await;
		self.files.get(path).cloned().ok_or(FetchError::Status(404))
	}
}

/// Browser `fetch` against a static file server.
#[derive(Clone, Debug)]
pub struct HttpSource {
	base_url: String,
}

impl HttpSource {
	pub fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}
}

impl DataSource for HttpSource {
	async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
		let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

		let opts = RequestInit::new();
		opts.set_method("GET");
		opts.set_mode(RequestMode::Cors);

		let request = Request::new_with_str_and_init(&url, &opts)
			.map_err(|e| FetchError::Transport(format!("request error: {:?}", e)))?;
		let window =
			web_sys::window().ok_or_else(|| FetchError::Transport("no window".into()))?;
		let resp_value = JsFuture::from(window.fetch_with_request(&request))
			.await
			.map_err(|e| FetchError::Transport(format!("fetch error: {:?}", e)))?;
		let resp: Response = resp_value
			.dyn_into()
			.map_err(|_| FetchError::Transport("response is not a Response".into()))?;

		if !resp.ok() {
			return Err(FetchError::Status(resp.status()));
		}

		let text = JsFuture::from(
			resp.text()
				.map_err(|e| FetchError::Transport(format!("body error: {:?}", e)))?,
		)
		.await
		.map_err(|e| FetchError::Transport(format!("body error: {:?}", e)))?;
		text.as_string()
			.ok_or_else(|| FetchError::Malformed("body is not text".into()))
	}
}

/// The source selected by configuration.
#[derive(Clone, Debug)]
pub enum Source {
	Bundled(FixtureSource),
	Http(HttpSource),
}

impl From<&SourceConfig> for Source {
	fn from(config: &SourceConfig) -> Self {
		match config {
			SourceConfig::Bundled { delay_ms } => Self::Bundled(FixtureSource::bundled(*delay_ms)),
			SourceConfig::Http { base_url } => Self::Http(HttpSource::new(base_url)),
		}
	}
}

impl DataSource for Source {
	async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
		match self {
			Self::Bundled(s) => s.fetch_text(path).await,
			Self::Http(s) => s.fetch_text(path).await,
		}
	}
}

/// Fetch `path`, retrying transient failures up to `policy.max_retries` times.
pub async fn fetch_with_retry<S: DataSource>(
	source: &S,
	path: &str,
	policy: &RetryPolicy,
) -> Result<String, FetchError> {
	let mut attempt = 0;
	loop {
		match source.fetch_text(path).await {
			Ok(body) => return Ok(body),
			Err(err) if err.is_retryable() && attempt < policy.max_retries => {
				attempt += 1;
				warn!(
					"Fetching {} failed ({}), retry {}/{}",
					path, err, attempt, policy.max_retries
				);
				pause(policy.backoff_ms).await;
			}
			Err(err) => return Err(err),
		}
	}
}

async fn pause(ms: u32) {
	if ms > 0 {
		TimeoutFuture::new(ms).await;
	}
}
