//! Transaction search: input validation, record matching, summaries, and
//! the reverse mapping from system codes to diagram nodes.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::data::error::FetchError;

static TRANSACTION_ID: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Z0-9]{16}$").expect("transaction id pattern"));

/// A validated, upper-cased 16 character transaction id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
	pub fn parse(input: &str) -> Result<Self, FetchError> {
		let normalized = input.trim().to_uppercase();
		if TRANSACTION_ID.is_match(&normalized) {
			Ok(Self(normalized))
		} else {
			Err(FetchError::InvalidInput(format!(
				"transaction id must be 16 letters or digits, got {:?}",
				input.trim()
			)))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

#[allow(non_snake_case)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
	pub SMH_SOURCE: Option<String>,
	pub SMH_DEST: Option<String>,
	pub RUA_20BYTE_STRING_001: Option<String>,
	pub BCC_CPS_CORRELATION: Option<String>,
	pub RRR_ACTION_CODE: Option<String>,
	pub AQQ_BILLING_CURR_CODE: Option<String>,
	pub TPP_CURR_CODE: Option<String>,
	pub TBT_BILLING_AMT: Option<String>,
	pub TPP_TRAN_AMT: Option<String>,
	pub REC_CRT_TS: Option<String>,
	pub TBT_REF_NUM: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionRecord {
	pub source: String,
	pub source_type: String,
	#[serde(rename = "_raw")]
	pub raw: RawTransaction,
}

impl TransactionRecord {
	fn matches(&self, id: &TransactionId) -> bool {
		[&self.raw.RUA_20BYTE_STRING_001, &self.raw.BCC_CPS_CORRELATION]
			.into_iter()
			.flatten()
			.any(|candidate| candidate.trim().eq_ignore_ascii_case(id.as_str()))
	}
}

pub fn parse_transactions(text: &str) -> Result<Vec<TransactionRecord>, FetchError> {
	let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
	Ok(values
		.into_iter()
		.filter_map(|v| serde_json::from_value(v).ok())
		.collect())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
	Approved,
	Rejected,
	Pending,
}

impl TransactionStatus {
	pub fn from_action_code(code: Option<&str>) -> Self {
		match code.map(|c| c.trim().to_uppercase()).as_deref() {
			Some("A") => Self::Approved,
			Some("R") => Self::Rejected,
			_ => Self::Pending,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransactionSummary {
	pub id: String,
	pub status: TransactionStatus,
	pub amount: f64,
	pub currency: String,
	pub timestamp: Option<DateTime<Utc>>,
	pub reference: String,
	pub source: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_amount(value: Option<&str>) -> f64 {
	value
		.and_then(|v| v.replace(',', "").parse::<f64>().ok())
		.filter(|n| n.is_finite())
		.unwrap_or(0.0)
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
	let value = value?;
	DateTime::parse_from_rfc3339(value)
		.map(|t| t.with_timezone(&Utc))
		.ok()
		.or_else(|| {
			NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
				.ok()
				.map(|t| t.and_utc())
		})
}

impl TransactionSummary {
	/// Summarise the first matching record.
	pub fn from_records(id: &TransactionId, records: &[TransactionRecord]) -> Option<Self> {
		let raw = &records.first()?.raw;
		Some(Self {
			id: id.as_str().to_string(),
			status: TransactionStatus::from_action_code(raw.RRR_ACTION_CODE.as_deref()),
			amount: parse_amount(non_empty(&raw.TBT_BILLING_AMT).or(non_empty(&raw.TPP_TRAN_AMT))),
			currency: non_empty(&raw.AQQ_BILLING_CURR_CODE)
				.or(non_empty(&raw.TPP_CURR_CODE))
				.unwrap_or("USD")
				.to_string(),
			timestamp: parse_timestamp(non_empty(&raw.REC_CRT_TS)),
			reference: non_empty(&raw.TBT_REF_NUM)
				.unwrap_or(id.as_str())
				.to_string(),
			source: non_empty(&raw.SMH_SOURCE).unwrap_or("Unknown").to_string(),
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
	pub id: TransactionId,
	pub records: Vec<TransactionRecord>,
	pub summary: TransactionSummary,
}

/// Find the records for `id`; no match is [`FetchError::NotFound`].
pub fn search_records(
	records: &[TransactionRecord],
	id: &TransactionId,
) -> Result<SearchOutcome, FetchError> {
	let matches: Vec<TransactionRecord> =
		records.iter().filter(|r| r.matches(id)).cloned().collect();
	let summary = TransactionSummary::from_records(id, &matches)
		.ok_or_else(|| FetchError::NotFound(id.as_str().to_string()))?;
	Ok(SearchOutcome {
		id: id.clone(),
		records: matches,
		summary,
	})
}

/// System code (as found in `SMH_SOURCE` / `SMH_DEST`) to AIT number.
///
/// Rails such as FED, RTP or SEPA have no node and are deliberately absent.
pub const SYSTEM_CODE_TO_AIT: &[(&str, &str)] = &[
	("CPO", "11697"),
	("CashPro Mobile", "41107"),
	("GPP", "28960"),
	("Swift Gateway", "11554"),
	("B2Bi", "54071"),
	("Swift Alliance", "512"),
	("GPO", "70199"),
	("CashPro Payments", "28960"),
	("FRP US", "15227"),
	("RPI", "60745"),
	("PSR", "31427"),
	("ECS", "834"),
];

pub fn ait_for_code<'a>(table: &'a [(&'a str, &'a str)], code: &str) -> Option<&'a str> {
	table.iter().find(|(c, _)| *c == code).map(|(_, ait)| *ait)
}

/// Every AIT number touched by the search results.
pub fn resolve_matches(records: &[TransactionRecord], table: &[(&str, &str)]) -> BTreeSet<String> {
	records
		.iter()
		.flat_map(|r| [r.raw.SMH_SOURCE.as_deref(), r.raw.SMH_DEST.as_deref()])
		.flatten()
		.filter_map(|code| ait_for_code(table, code))
		.map(str::to_string)
		.collect()
}

/// Which controls a node shows, given the search phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlayMode {
	/// No search active: passive status controls.
	#[default]
	Default,
	/// A search is in flight.
	Loading,
	/// A search has settled.
	Results,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeAffordance {
	StatusControls,
	Busy,
	Actions,
	Hidden,
}

pub fn affordance(mode: OverlayMode, matched: bool) -> NodeAffordance {
	match (mode, matched) {
		(OverlayMode::Default, _) => NodeAffordance::StatusControls,
		(OverlayMode::Loading, _) => NodeAffordance::Busy,
		(OverlayMode::Results, true) => NodeAffordance::Actions,
		(OverlayMode::Results, false) => NodeAffordance::Hidden,
	}
}

/// Issued when a search starts; only the latest ticket may land.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTicket {
	generation: u64,
	id: TransactionId,
}

impl SearchTicket {
	pub fn id(&self) -> &TransactionId {
		&self.id
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SearchPhase {
	#[default]
	Idle,
	Invalid(String),
	Loading(TransactionId),
	Found(SearchOutcome),
	NotFound(TransactionId),
	Failed { id: TransactionId, message: String },
}

/// Active transaction search, passed explicitly to whoever renders it.
#[derive(Clone, Debug, Default)]
pub struct SearchSession {
	generation: u64,
	phase: SearchPhase,
	matched: BTreeSet<String>,
}

impl SearchSession {
	pub fn phase(&self) -> &SearchPhase {
		&self.phase
	}

	pub fn matched(&self) -> &BTreeSet<String> {
		&self.matched
	}

	pub fn is_matched(&self, external_id: &str) -> bool {
		self.matched.contains(external_id)
	}

	pub fn mode(&self) -> OverlayMode {
		match self.phase {
			SearchPhase::Idle | SearchPhase::Invalid(_) => OverlayMode::Default,
			SearchPhase::Loading(_) => OverlayMode::Loading,
			SearchPhase::Found(_) | SearchPhase::NotFound(_) | SearchPhase::Failed { .. } => {
				OverlayMode::Results
			}
		}
	}

	/// Validate `input` and start a search. Invalid input issues no ticket.
	pub fn begin(&mut self, input: &str) -> Option<SearchTicket> {
		self.generation += 1;
		self.matched.clear();
		match TransactionId::parse(input) {
			Ok(id) => {
				self.phase = SearchPhase::Loading(id.clone());
				Some(SearchTicket {
					generation: self.generation,
					id,
				})
			}
			Err(err) => {
				self.phase = SearchPhase::Invalid(err.to_string());
				None
			}
		}
	}

	/// Land a result. Returns `false` (and changes nothing) for stale tickets.
	pub fn complete(
		&mut self,
		ticket: &SearchTicket,
		result: Result<SearchOutcome, FetchError>,
		table: &[(&str, &str)],
	) -> bool {
		if ticket.generation != self.generation {
			return false;
		}
		self.phase = match result {
			Ok(outcome) => {
				self.matched = resolve_matches(&outcome.records, table);
				SearchPhase::Found(outcome)
			}
			Err(FetchError::NotFound(_)) => SearchPhase::NotFound(ticket.id.clone()),
			Err(FetchError::InvalidInput(message)) => SearchPhase::Invalid(message),
			Err(err) => SearchPhase::Failed {
				id: ticket.id.clone(),
				message: err.to_string(),
			},
		};
		true
	}

	pub fn clear(&mut self) {
		self.generation += 1;
		self.phase = SearchPhase::Idle;
		self.matched.clear();
	}
}
