use std::cell::RefCell;

use chrono::Utc;
use log::{debug, error};

use super::cache::QueryCache;
use super::error::FetchError;
use super::source::{DataSource, fetch_with_retry, files};
use crate::components::flow_diagram::loader::{fallback_graph, try_load};
use crate::components::flow_diagram::status::{MetricRow, StatusMap, parse_metric_rows, resolve};
use crate::components::flow_diagram::transactions::{
	SearchOutcome, TransactionId, parse_transactions, search_records,
};
use crate::components::flow_diagram::types::FlowGraph;
use crate::config::DiagramConfig;

const METRICS_KEY: &str = "splunk-data";

/// Cached access to topologies, the metrics feed and transaction searches.
///
/// Only successful responses are cached; failures are retried on the next
/// call. Borrows of the caches never span an await point.
pub struct DataClient<S> {
	source: S,
	config: DiagramConfig,
	graphs: RefCell<QueryCache<FlowGraph>>,
	metrics: RefCell<QueryCache<Vec<MetricRow>>>,
	searches: RefCell<QueryCache<SearchOutcome>>,
}

impl<S: DataSource> DataClient<S> {
	pub fn new(source: S, config: DiagramConfig) -> Self {
		Self {
			graphs: RefCell::new(cache_for(&config)),
			metrics: RefCell::new(cache_for(&config)),
			searches: RefCell::new(cache_for(&config)),
			source,
			config,
		}
	}

	pub fn config(&self) -> &DiagramConfig {
		&self.config
	}

	/// Template graph for `file`; the empty section layout on failure.
	pub async fn flow_graph(&self, file: &str) -> FlowGraph {
		if let Some(graph) = self.graphs.borrow().get_fresh(file, Utc::now()) {
			debug!("Serving {} from cache", file);
			return graph;
		}
		match try_load(&self.source, file, &self.config.retry).await {
			Ok(graph) => {
				let mut graphs = self.graphs.borrow_mut();
				graphs.evict_expired(Utc::now());
				graphs.insert(file, graph.clone(), Utc::now());
				graph
			}
			Err(err) => {
				error!("Failed to load flow data from {}: {}", file, err);
				fallback_graph()
			}
		}
	}

	/// Resolved status colours from the metrics feed.
	pub async fn status(&self) -> Result<StatusMap, FetchError> {
		let rows = self.metric_rows().await?;
		Ok(resolve(&rows, self.config.trend_threshold))
	}

	async fn metric_rows(&self) -> Result<Vec<MetricRow>, FetchError> {
		if let Some(rows) = self.metrics.borrow().get_fresh(METRICS_KEY, Utc::now()) {
			return Ok(rows);
		}
		let text = fetch_with_retry(&self.source, files::METRICS, &self.config.retry).await?;
		let rows = parse_metric_rows(&text)?;
		self.metrics
			.borrow_mut()
			.insert(METRICS_KEY, rows.clone(), Utc::now());
		Ok(rows)
	}

	/// Drop the cached feed so the next [`DataClient::status`] refetches.
	pub fn invalidate_status(&self) {
		self.metrics.borrow_mut().invalidate(METRICS_KEY);
	}

	/// Look up a transaction. Not-found and invalid ids are not retried.
	pub async fn search_transaction(&self, id: &TransactionId) -> Result<SearchOutcome, FetchError> {
		let key = format!("transaction:{}", id.as_str());
		if let Some(outcome) = self.searches.borrow().get_fresh(&key, Utc::now()) {
			return Ok(outcome);
		}
		let text = fetch_with_retry(&self.source, files::TRANSACTIONS, &self.config.retry).await?;
		let outcome = search_records(&parse_transactions(&text)?, id)?;
		let mut searches = self.searches.borrow_mut();
		searches.evict_expired(Utc::now());
		searches.insert(key, outcome.clone(), Utc::now());
		Ok(outcome)
	}
}

fn cache_for<V: Clone>(config: &DiagramConfig) -> QueryCache<V> {
	QueryCache::new(config.stale_after(), config.evict_after())
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;

	use super::*;
	use crate::config::RetryPolicy;
	use crate::data::source::FixtureSource;
	use crate::data::source::tests::ScriptedSource;

	fn config() -> DiagramConfig {
		DiagramConfig {
			retry: RetryPolicy::immediate(2),
			..DiagramConfig::default()
		}
	}

	#[test]
	fn graphs_are_cached_by_file() {
		let source = ScriptedSource::new(
			vec![Ok(r#"{"nodes": [{"id": "1", "data": {"label": "x"}, "class": "origination"}]}"#.into())],
			Err(FetchError::Transport("gone".into())),
		);
		let client = DataClient::new(source, config());
		let first = block_on(client.flow_graph("us-wires.json"));
		let second = block_on(client.flow_graph("us-wires.json"));
		assert_eq!(first, second);
		assert_eq!(first.regular_nodes().count(), 1);
		assert_eq!(client.source.calls.get(), 1);
	}

	#[test]
	fn failed_graph_loads_are_not_cached() {
		let source = ScriptedSource::new(vec![Err(FetchError::Status(404))], Ok(r#"{}"#.into()));
		let client = DataClient::new(source, config());
		assert_eq!(block_on(client.flow_graph("x.json")), fallback_graph());
		block_on(client.flow_graph("x.json"));
		assert_eq!(client.source.calls.get(), 2);
	}

	#[test]
	fn status_resolves_bundled_feed() {
		let client = DataClient::new(FixtureSource::bundled(0), config());
		let status = block_on(client.status()).unwrap();
		assert!(!status.is_empty());
	}

	#[test]
	fn status_refetches_after_invalidation() {
		let source = ScriptedSource::new(vec![], Ok(r#"[{"aiT_NUM": "1"}]"#.into()));
		let client = DataClient::new(source, config());
		block_on(client.status()).unwrap();
		block_on(client.status()).unwrap();
		assert_eq!(client.source.calls.get(), 1);
		client.invalidate_status();
		block_on(client.status()).unwrap();
		assert_eq!(client.source.calls.get(), 2);
	}

	#[test]
	fn status_surfaces_transport_errors() {
		let source = ScriptedSource::new(vec![], Err(FetchError::Transport("down".into())));
		let client = DataClient::new(source, config());
		assert!(matches!(block_on(client.status()), Err(FetchError::Transport(_))));
		assert_eq!(client.source.calls.get(), 3);
	}

	#[test]
	fn bundled_transaction_is_found_and_mapped() {
		use crate::components::flow_diagram::transactions::{SYSTEM_CODE_TO_AIT, resolve_matches};

		let client = DataClient::new(FixtureSource::bundled(0), config());
		let id = TransactionId::parse("T0P7R96NFJWBBSTZ").unwrap();
		let outcome = block_on(client.search_transaction(&id)).unwrap();
		assert!(!outcome.records.is_empty());
		assert!(resolve_matches(&outcome.records, SYSTEM_CODE_TO_AIT).contains("28960"));
	}

	#[test]
	fn missing_transaction_is_not_found_without_retry() {
		let client = DataClient::new(FixtureSource::bundled(0), config());
		let id = TransactionId::parse("ZZZZZZZZZZZZZZZZ").unwrap();
		assert!(matches!(
			block_on(client.search_transaction(&id)),
			Err(FetchError::NotFound(_))
		));
	}
}
