//! Runtime knobs for the diagram: section geometry, status thresholds,
//! cache windows, retry policy and where data comes from.

use chrono::Duration;
use log::warn;
use serde::Deserialize;

/// Share of the usable width given to each section, left to right.
pub const DEFAULT_PROPORTIONS: [f64; 4] = [0.2, 0.2, 0.25, 0.35];
/// Horizontal gap between adjacent sections, in pixels.
pub const DEFAULT_SECTION_GAP: f64 = 16.0;

/// Bounded retry for transient fetch failures.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Extra attempts after the first one.
	pub max_retries: u32,
	/// Pause between attempts; zero retries immediately.
	pub backoff_ms: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 2,
			backoff_ms: 300,
		}
	}
}

impl RetryPolicy {
	/// Retry immediately, used where no timer is available.
	pub const fn immediate(max_retries: u32) -> Self {
		Self {
			max_retries,
			backoff_ms: 0,
		}
	}
}

/// Where datasets, metrics and transactions are read from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
	/// JSON fixtures compiled into the binary, served after an artificial delay.
	Bundled {
		#[serde(default)]
		delay_ms: u32,
	},
	/// Plain GET requests against a static file server.
	Http { base_url: String },
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self::Bundled { delay_ms: 500 }
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
	pub section_proportions: [f64; 4],
	pub section_gap: f64,
	/// Absolute std-variation beyond which a system counts as off trend.
	pub trend_threshold: f64,
	pub stale_after_secs: i64,
	pub evict_after_secs: i64,
	pub retry: RetryPolicy,
	pub source: SourceConfig,
}

impl Default for DiagramConfig {
	fn default() -> Self {
		Self {
			section_proportions: DEFAULT_PROPORTIONS,
			section_gap: DEFAULT_SECTION_GAP,
			trend_threshold: 2.0,
			stale_after_secs: 5 * 60,
			evict_after_secs: 10 * 60,
			retry: RetryPolicy::default(),
			source: SourceConfig::default(),
		}
	}
}

impl DiagramConfig {
	/// Overlay a (possibly partial) JSON document onto the defaults.
	pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
		let config: Self = serde_json::from_str(text)?;
		Ok(config.sanitized())
	}

	/// Replace values that would break layout with their defaults.
	pub fn sanitized(mut self) -> Self {
		if !proportions_valid(&self.section_proportions) {
			warn!(
				"Section proportions {:?} must be non-negative and sum to 1.0, using defaults",
				self.section_proportions
			);
			self.section_proportions = DEFAULT_PROPORTIONS;
		}
		if !(self.section_gap.is_finite() && self.section_gap >= 0.0) {
			warn!("Section gap {} is invalid, using default", self.section_gap);
			self.section_gap = DEFAULT_SECTION_GAP;
		}
		self
	}

	pub fn stale_after(&self) -> Duration {
		Duration::seconds(self.stale_after_secs)
	}

	pub fn evict_after(&self) -> Duration {
		Duration::seconds(self.evict_after_secs)
	}
}

fn proportions_valid(p: &[f64; 4]) -> bool {
	p.iter().all(|v| v.is_finite() && *v >= 0.0) && (p.iter().sum::<f64>() - 1.0).abs() < 1e-6
}
