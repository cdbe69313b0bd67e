//! Raw per-agent counters pulled from the data store for one scoring run.
//! Everything defaults to zero so agents with no matching rows score from a
//! clean slate instead of erroring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Named time boundaries for one scoring run. All sub-aggregates are scoped
/// to one of these cuts.
#[derive(Clone, Copy, Debug)]
pub struct ScoringWindow {
	pub now: OffsetDateTime,
	/// Start of the long trailing window for listing/closing history.
	pub lookback_start: OffsetDateTime,
	/// Start of the last 30 days.
	pub recent_start: OffsetDateTime,
	/// Start of the 30 days before that.
	pub prior_start: OffsetDateTime,
	/// Start of the rolling 90-day window for open-lead pressure.
	pub rolling_90_start: OffsetDateTime,
	/// Leads created at least this long ago with no movement count as stale.
	pub stale_cutoff: OffsetDateTime,
}
impl ScoringWindow {
	pub fn ending_at(now: OffsetDateTime, lookback_days: i64) -> Self {
		Self {
			now,
			lookback_start: now - Duration::days(lookback_days),
			recent_start: now - Duration::days(30),
			prior_start: now - Duration::days(60),
			rolling_90_start: now - Duration::days(90),
			stale_cutoff: now - Duration::days(7),
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClosedDeal {
	pub price: f64,
	#[serde(with = "crate::time_serde")]
	pub closed_at: OffsetDateTime,
}

/// One agent's raw signal bundle for a scoring window.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AgentSignals {
	pub leads_worked: u64,
	pub leads_converted: u64,
	pub leads_created_30d: u64,
	pub stale_new_leads: u64,
	pub open_leads_90d: u64,
	pub buyer_leads: u64,
	pub seller_leads: u64,

	pub tasks_completed_30d: u64,
	pub tasks_completed_prior_30d: u64,
	pub tasks_overdue_open: u64,

	pub active_listings: u64,
	pub active_transactions: u64,
	pub closed_deals: Vec<ClosedDeal>,

	pub first_touch_satisfied: u64,
	pub first_touch_breached: u64,
	pub first_touch_median_minutes: Option<f64>,

	pub touchpoints_30d: u64,
	pub touchpoints_prior_30d: u64,

	pub noncompliant_transactions: u64,
	pub oldest_flag_age_days: Option<f64>,
	pub risk_interventions_90d: u64,

	/// Listing counts in the lookback window, keyed by state code. BTreeMap
	/// keeps tie-breaking stable across runs.
	pub listings_by_state: BTreeMap<String, u64>,
	/// Listing counts keyed by normalized property-type string.
	pub listings_by_property_type: BTreeMap<String, u64>,
}
impl AgentSignals {
	pub fn listings_total(&self) -> u64 {
		self.listings_by_state.values().sum()
	}

	pub fn closed_total(&self) -> u64 {
		self.closed_deals.len() as u64
	}

	/// True when the agent produced no rows at all in the window, which is
	/// the brand-new-agent case the scorer treats as all-neutral.
	pub fn is_empty(&self) -> bool {
		self.leads_worked == 0
			&& self.leads_created_30d == 0
			&& self.open_leads_90d == 0
			&& self.tasks_completed_30d == 0
			&& self.tasks_completed_prior_30d == 0
			&& self.tasks_overdue_open == 0
			&& self.active_listings == 0
			&& self.active_transactions == 0
			&& self.closed_deals.is_empty()
			&& self.first_touch_satisfied == 0
			&& self.first_touch_breached == 0
			&& self.touchpoints_30d == 0
			&& self.touchpoints_prior_30d == 0
			&& self.noncompliant_transactions == 0
			&& self.risk_interventions_90d == 0
			&& self.listings_by_state.is_empty()
	}
}
