//! Passive health colouring from the system metrics feed.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::data::error::FetchError;

static EXTERNAL_ID: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"AIT (\d+)").expect("external id pattern"));

/// The AIT number embedded in a node subtitle such as `"AIT 28960"`.
pub fn external_id(subtitle: &str) -> Option<&str> {
	EXTERNAL_ID
		.captures(subtitle)
		.and_then(|c| c.get(1))
		.map(|m| m.as_str())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusColor {
	Green,
	Red,
	#[default]
	Grey,
}

impl StatusColor {
	pub fn fill(self) -> &'static str {
		match self {
			StatusColor::Green => "#22c55e",
			StatusColor::Red => "#ef4444",
			StatusColor::Grey => "#9ca3af",
		}
	}

	/// Red wins over green; grey only when nothing was known.
	fn merge(current: Option<Self>, next: Option<Self>) -> Option<Self> {
		match (current, next) {
			(Some(StatusColor::Red), _) | (_, Some(StatusColor::Red)) => Some(StatusColor::Red),
			(Some(c), _) | (None, Some(c)) => Some(c),
			(None, None) => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStatus {
	pub trend: StatusColor,
	pub traffic: StatusColor,
}

/// A number that may arrive as JSON number or numeric text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
	Number(f64),
	Text(String),
}

impl Numeric {
	pub fn value(&self) -> Option<f64> {
		match self {
			Numeric::Number(n) => Some(*n),
			Numeric::Text(s) => s.trim().replace(',', "").parse().ok(),
		}
	}
}

#[allow(non_snake_case)]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricRow {
	pub aiT_NUM: Option<String>,
	pub aiT_NAME: Option<String>,
	pub FLOW_DIRECTION: Option<String>,
	pub flow_AIT_NUM: Option<String>,
	pub flow_AIT_NAME: Option<String>,
	pub is_TRAFFIC_FOLLOWING: Option<String>,
	pub is_TRAFFIC_ON_TREND: Option<String>,
	pub average_TRANSACTION_COUNT: Option<Numeric>,
	pub current_TRANSACTION_COUNT: Option<Numeric>,
	pub historic_STD: Option<Numeric>,
	pub historic_MEAN: Option<Numeric>,
	pub current_STD_VARIATION: Option<Numeric>,
}

fn flag(text: Option<&str>) -> Option<bool> {
	match text?.trim().to_lowercase().as_str() {
		"true" | "yes" | "y" | "1" => Some(true),
		"false" | "no" | "n" | "0" => Some(false),
		_ => None,
	}
}

fn from_flag(ok: bool) -> StatusColor {
	if ok { StatusColor::Green } else { StatusColor::Red }
}

impl MetricRow {
	fn trend(&self, threshold: f64) -> Option<StatusColor> {
		if let Some(on_trend) = flag(self.is_TRAFFIC_ON_TREND.as_deref()) {
			return Some(from_flag(on_trend));
		}
		let variation = self.current_STD_VARIATION.as_ref()?.value()?;
		Some(from_flag(variation.abs() <= threshold))
	}

	fn traffic(&self) -> Option<StatusColor> {
		if let Some(flowing) = flag(self.is_TRAFFIC_FOLLOWING.as_deref()) {
			return Some(from_flag(flowing));
		}
		let current = self.current_TRANSACTION_COUNT.as_ref()?.value()?;
		let average = self
			.average_TRANSACTION_COUNT
			.as_ref()
			.and_then(Numeric::value)
			.unwrap_or(0.0);
		match (current > 0.0, average > 0.0) {
			(true, _) => Some(StatusColor::Green),
			(false, true) => Some(StatusColor::Red),
			(false, false) => None,
		}
	}
}

/// Decode the feed, skipping rows that do not fit the row shape.
pub fn parse_metric_rows(text: &str) -> Result<Vec<MetricRow>, FetchError> {
	let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
	Ok(values
		.into_iter()
		.filter_map(|v| serde_json::from_value(v).ok())
		.collect())
}

/// Per-system status, keyed by AIT number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusMap(HashMap<String, NodeStatus>);

impl StatusMap {
	/// Neutral grey for systems the feed does not mention.
	pub fn get(&self, external_id: &str) -> NodeStatus {
		self.0.get(external_id).copied().unwrap_or_default()
	}

	pub fn for_subtitle(&self, subtitle: &str) -> NodeStatus {
		external_id(subtitle)
			.map(|id| self.get(id))
			.unwrap_or_default()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, NodeStatus)> {
		self.0.iter().map(|(k, v)| (k.as_str(), *v))
	}
}

/// Fold metric rows into one trend and one traffic colour per system.
pub fn resolve(rows: &[MetricRow], trend_threshold: f64) -> StatusMap {
	let mut acc: HashMap<&str, (Option<StatusColor>, Option<StatusColor>)> = HashMap::new();
	for row in rows {
		let Some(id) = row.aiT_NUM.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
			continue;
		};
		let entry = acc.entry(id).or_default();
		entry.0 = StatusColor::merge(entry.0, row.trend(trend_threshold));
		entry.1 = StatusColor::merge(entry.1, row.traffic());
	}
	StatusMap(
		acc.into_iter()
			.map(|(id, (trend, traffic))| {
				(
					id.to_string(),
					NodeStatus {
						trend: trend.unwrap_or_default(),
						traffic: traffic.unwrap_or_default(),
					},
				)
			})
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rows(json: &str) -> Vec<MetricRow> {
		parse_metric_rows(json).unwrap()
	}

	#[test]
	fn extracts_external_id() {
		assert_eq!(external_id("AIT 28960"), Some("28960"));
		assert_eq!(external_id("Gateway (AIT 512)"), Some("512"));
		assert_eq!(external_id("AIT A"), None);
		assert_eq!(external_id(""), None);
	}

	#[test]
	fn flags_drive_both_classifications() {
		let map = resolve(
			&rows(
				r#"[
					{"aiT_NUM": "512", "is_TRAFFIC_FOLLOWING": "Yes", "is_TRAFFIC_ON_TREND": "true"},
					{"aiT_NUM": "834", "is_TRAFFIC_FOLLOWING": "No", "is_TRAFFIC_ON_TREND": "false"}
				]"#,
			),
			2.0,
		);
		assert_eq!(
			map.get("512"),
			NodeStatus {
				trend: StatusColor::Green,
				traffic: StatusColor::Green
			}
		);
		assert_eq!(
			map.get("834"),
			NodeStatus {
				trend: StatusColor::Red,
				traffic: StatusColor::Red
			}
		);
	}

	#[test]
	fn statistics_fill_in_missing_flags() {
		let map = resolve(
			&rows(
				r#"[
					{"aiT_NUM": "1", "current_STD_VARIATION": "-1.5", "current_TRANSACTION_COUNT": 12},
					{"aiT_NUM": "2", "current_STD_VARIATION": 3.2, "current_TRANSACTION_COUNT": "0",
					 "average_TRANSACTION_COUNT": "1,204"},
					{"aiT_NUM": "3", "is_TRAFFIC_FOLLOWING": null}
				]"#,
			),
			2.0,
		);
		assert_eq!(map.get("1").trend, StatusColor::Green);
		assert_eq!(map.get("1").traffic, StatusColor::Green);
		assert_eq!(map.get("2").trend, StatusColor::Red);
		assert_eq!(map.get("2").traffic, StatusColor::Red);
		assert_eq!(map.get("3"), NodeStatus::default());
	}

	#[test]
	fn red_rows_dominate_an_id() {
		let map = resolve(
			&rows(
				r#"[
					{"aiT_NUM": "9", "FLOW_DIRECTION": "IN", "is_TRAFFIC_ON_TREND": "true"},
					{"aiT_NUM": "9", "FLOW_DIRECTION": "OUT", "is_TRAFFIC_ON_TREND": "false"}
				]"#,
			),
			2.0,
		);
		assert_eq!(map.get("9").trend, StatusColor::Red);
		assert_eq!(map.len(), 1);
	}

	#[test]
	fn resolution_is_total() {
		let map = resolve(
			&rows(r#"[{"aiT_NUM": 42}, {"aiT_NUM": ""}, "junk", {"aiT_NUM": "5", "current_STD_VARIATION": "n/a"}]"#),
			2.0,
		);
		assert_eq!(map.get("absent"), NodeStatus::default());
		assert_eq!(map.for_subtitle("no id here"), NodeStatus::default());
		assert_eq!(map.get("5"), NodeStatus::default());
	}

	#[test]
	fn non_array_feed_is_malformed() {
		assert!(matches!(
			parse_metric_rows(r#"{"rows": []}"#),
			Err(FetchError::Malformed(_))
		));
	}
}
