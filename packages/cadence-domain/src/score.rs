//! Composite scoring: five weighted positive dimensions minus a capped risk
//! drag, bucketed into a confidence band, with the largest deviations from
//! the dimension midpoint surfaced as explanatory drivers.
//!
//! Normalization curves. Each curve is monotonic in its raw signal, clamps
//! to [0,1], and returns the 0.5 midpoint when its underlying signals are
//! entirely absent, so a brand-new agent lands on all-neutral dimensions:
//!
//! - historical effectiveness: `0.6 * min(1, conversion_rate / 0.25) +
//!   0.4 * closed / (closed + 4)`; conversion saturates at a 25% rate.
//! - responsiveness/reliability: `0.6 * sla_satisfaction + 0.4 *
//!   completed30 / (completed30 + overdue_open)`.
//! - recency momentum: mean of `r / (r + 1)` per channel with
//!   `r = current30 / prior30` over workflow tasks and touchpoints; equal
//!   windows sit exactly on the midpoint.
//! - opportunity fit: the baseline fit score, used directly.
//! - capacity load: `load / (load + 8)` with `load = active listings +
//!   active transactions + open leads (90d)`.
//! - risk drag: `min(cap, 0.04 * noncompliant + 0.03 * interventions +
//!   0.01 * floor(oldest_flag_age_days / 30))`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{baseline::BaselineFit, signals::AgentSignals};

/// Conversion rate at which the effectiveness curve saturates.
const CONVERSION_SATURATION: f64 = 0.25;
/// Half-saturation point of the closed-deal count curve.
const CLOSINGS_HALF_SATURATION: f64 = 4.0;
/// Half-saturation point of the active-workload curve.
const CAPACITY_HALF_SATURATION: f64 = 8.0;
/// Deviations are measured from this dimension midpoint.
const DIMENSION_MIDPOINT: f64 = 0.5;
/// Display budget for the driver list.
const MAX_DRIVERS: usize = 2;

pub fn clamp01(value: f64) -> f64 {
	value.clamp(0.0, 1.0)
}

/// Organization-configured dimension coefficients and banding thresholds.
/// Treated as already-calibrated; they need not sum to one.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct DimensionWeights {
	pub historical_effectiveness: f64,
	pub responsiveness_reliability: f64,
	pub recency_momentum: f64,
	pub opportunity_fit: f64,
	pub capacity_load: f64,
	pub max_risk_drag_penalty: f64,
	pub high_band_threshold: f64,
	pub medium_band_threshold: f64,
}
impl Default for DimensionWeights {
	fn default() -> Self {
		Self {
			historical_effectiveness: 0.30,
			responsiveness_reliability: 0.20,
			recency_momentum: 0.20,
			opportunity_fit: 0.20,
			capacity_load: 0.10,
			max_risk_drag_penalty: 0.15,
			high_band_threshold: 0.75,
			medium_band_threshold: 0.50,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
	Developing,
	Established,
	Proven,
}
impl ConfidenceBand {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Developing => "DEVELOPING",
			Self::Established => "ESTABLISHED",
			Self::Proven => "PROVEN",
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DimensionScores {
	pub historical_effectiveness: f64,
	pub responsiveness_reliability: f64,
	pub recency_momentum: f64,
	pub opportunity_fit: f64,
	pub capacity_load: f64,
	pub risk_drag_penalty: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverDirection {
	Positive,
	Negative,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Driver {
	pub label: String,
	pub direction: DriverDirection,
	pub summary: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub link: Option<String>,
}

/// One immutable scoring result, ready to persist.
#[derive(Clone, Debug, Serialize)]
pub struct ScorePayload {
	pub overall_score: f64,
	pub band: ConfidenceBand,
	pub dimensions: DimensionScores,
	pub drivers: Vec<Driver>,
	pub feature_summary: Value,
	#[serde(with = "crate::time_serde")]
	pub period_start: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub period_end: OffsetDateTime,
}

pub struct ScoreInputs<'a> {
	pub signals: &'a AgentSignals,
	pub baseline: &'a BaselineFit,
	pub weights: &'a DimensionWeights,
	pub period_start: OffsetDateTime,
	pub period_end: OffsetDateTime,
}

/// Pure composition of one agent's snapshot payload. Identical inputs yield
/// identical output; no I/O and no clock reads happen here.
pub fn compose_score(inputs: ScoreInputs<'_>) -> ScorePayload {
	let ScoreInputs { signals, baseline, weights, period_start, period_end } = inputs;
	let dimensions = DimensionScores {
		historical_effectiveness: historical_effectiveness(signals),
		responsiveness_reliability: responsiveness_reliability(signals),
		recency_momentum: recency_momentum(signals),
		opportunity_fit: checked_dimension(baseline.score),
		capacity_load: capacity_load(signals),
		risk_drag_penalty: risk_drag_penalty(signals, weights.max_risk_drag_penalty),
	};
	let overall_score = clamp01(
		weights.historical_effectiveness * dimensions.historical_effectiveness
			+ weights.responsiveness_reliability * dimensions.responsiveness_reliability
			+ weights.recency_momentum * dimensions.recency_momentum
			+ weights.opportunity_fit * dimensions.opportunity_fit
			+ weights.capacity_load * dimensions.capacity_load
			- dimensions.risk_drag_penalty,
	);
	// A brand-new agent with no signals at all sits on neutral dimensions
	// and always starts in the DEVELOPING band, whatever the thresholds.
	let band = if signals.is_empty() {
		ConfidenceBand::Developing
	} else {
		band_for(overall_score, weights)
	};
	let drivers = select_drivers(signals, &dimensions);
	let feature_summary = feature_summary(signals, baseline);

	ScorePayload { overall_score, band, dimensions, drivers, feature_summary, period_start, period_end }
}

pub fn band_for(overall_score: f64, weights: &DimensionWeights) -> ConfidenceBand {
	if overall_score >= weights.high_band_threshold {
		ConfidenceBand::Proven
	} else if overall_score >= weights.medium_band_threshold {
		ConfidenceBand::Established
	} else {
		ConfidenceBand::Developing
	}
}

fn historical_effectiveness(signals: &AgentSignals) -> f64 {
	let closed = signals.closed_total();

	if signals.leads_worked == 0 && closed == 0 {
		return DIMENSION_MIDPOINT;
	}

	let conversion = if signals.leads_worked == 0 {
		0.0
	} else {
		let rate = signals.leads_converted as f64 / signals.leads_worked as f64;

		(rate / CONVERSION_SATURATION).min(1.0)
	};
	let closings = closed as f64 / (closed as f64 + CLOSINGS_HALF_SATURATION);

	checked_dimension(0.6 * conversion + 0.4 * closings)
}

fn responsiveness_reliability(signals: &AgentSignals) -> f64 {
	let timers = signals.first_touch_satisfied + signals.first_touch_breached;
	let sla = if timers == 0 {
		DIMENSION_MIDPOINT
	} else {
		signals.first_touch_satisfied as f64 / timers as f64
	};
	let task_pool = signals.tasks_completed_30d + signals.tasks_overdue_open;
	let tasks = if task_pool == 0 {
		DIMENSION_MIDPOINT
	} else {
		signals.tasks_completed_30d as f64 / task_pool as f64
	};

	checked_dimension(0.6 * sla + 0.4 * tasks)
}

fn recency_momentum(signals: &AgentSignals) -> f64 {
	let tasks = momentum_channel(signals.tasks_completed_30d, signals.tasks_completed_prior_30d);
	let touches = momentum_channel(signals.touchpoints_30d, signals.touchpoints_prior_30d);

	checked_dimension((tasks + touches) / 2.0)
}

/// Maps a 30-day-vs-prior ratio onto [0,1) with the midpoint at parity.
fn momentum_channel(current: u64, prior: u64) -> f64 {
	if current == 0 && prior == 0 {
		return DIMENSION_MIDPOINT;
	}
	if prior == 0 {
		// Activity out of nowhere is full momentum.
		return 1.0;
	}

	let ratio = current as f64 / prior as f64;

	ratio / (ratio + 1.0)
}

fn capacity_load(signals: &AgentSignals) -> f64 {
	let load = signals.active_listings + signals.active_transactions + signals.open_leads_90d;

	if load == 0 {
		return DIMENSION_MIDPOINT;
	}

	checked_dimension(load as f64 / (load as f64 + CAPACITY_HALF_SATURATION))
}

fn risk_drag_penalty(signals: &AgentSignals, cap: f64) -> f64 {
	let age_steps = signals
		.oldest_flag_age_days
		.map(|days| (days / 30.0).floor().max(0.0))
		.unwrap_or(0.0);
	let raw = 0.04 * signals.noncompliant_transactions as f64
		+ 0.03 * signals.risk_interventions_90d as f64
		+ 0.01 * age_steps;
	let penalty = raw.min(cap).max(0.0);

	debug_assert!(penalty >= 0.0 && penalty <= cap, "risk drag penalty out of range: {penalty}");

	penalty
}

/// Out-of-range dimension values are a programming defect: loud in debug
/// builds, clamped in release.
fn checked_dimension(value: f64) -> f64 {
	debug_assert!((0.0..=1.0).contains(&value), "dimension score out of range: {value}");

	clamp01(value)
}

fn select_drivers(signals: &AgentSignals, dimensions: &DimensionScores) -> Vec<Driver> {
	let labeled = [
		(
			"Historical effectiveness",
			dimensions.historical_effectiveness,
			format!(
				"Converted {} of {} leads worked; {} closings in window",
				signals.leads_converted,
				signals.leads_worked,
				signals.closed_total()
			),
		),
		(
			"Responsiveness",
			dimensions.responsiveness_reliability,
			format!(
				"Met first-touch SLA {} of {} times; {} overdue tasks open",
				signals.first_touch_satisfied,
				signals.first_touch_satisfied + signals.first_touch_breached,
				signals.tasks_overdue_open
			),
		),
		(
			"Recent momentum",
			dimensions.recency_momentum,
			format!(
				"{} tasks and {} touchpoints in the last 30 days (prior: {} / {})",
				signals.tasks_completed_30d,
				signals.touchpoints_30d,
				signals.tasks_completed_prior_30d,
				signals.touchpoints_prior_30d
			),
		),
		(
			"Opportunity fit",
			dimensions.opportunity_fit,
			format!("Fit {:.2} against the org's dominant segment", dimensions.opportunity_fit),
		),
		(
			"Capacity",
			dimensions.capacity_load,
			format!(
				"{} active listings, {} active transactions, {} open leads",
				signals.active_listings, signals.active_transactions, signals.open_leads_90d
			),
		),
	];

	let mut positive: Vec<(f64, Driver)> = Vec::new();
	let mut negative: Vec<(f64, Driver)> = Vec::new();

	for (label, value, summary) in labeled {
		let deviation = value - DIMENSION_MIDPOINT;
		let driver = Driver {
			label: label.to_string(),
			direction: if deviation >= 0.0 {
				DriverDirection::Positive
			} else {
				DriverDirection::Negative
			},
			summary,
			link: None,
		};

		if deviation >= 0.0 {
			positive.push((deviation, driver));
		} else {
			negative.push((-deviation, driver));
		}
	}

	if dimensions.risk_drag_penalty > 0.0 {
		negative.push((
			dimensions.risk_drag_penalty,
			Driver {
				label: "Compliance risk".to_string(),
				direction: DriverDirection::Negative,
				summary: format!(
					"{} non-compliant transactions, {} recent interventions",
					signals.noncompliant_transactions, signals.risk_interventions_90d
				),
				link: None,
			},
		));
	}

	positive.sort_by(|a, b| b.0.total_cmp(&a.0));
	negative.sort_by(|a, b| b.0.total_cmp(&a.0));
	positive.truncate(MAX_DRIVERS);
	negative.truncate(MAX_DRIVERS);

	let mut candidates: Vec<(f64, Driver)> = positive;

	candidates.extend(negative);
	candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
	candidates.truncate(MAX_DRIVERS);

	candidates.into_iter().map(|(_, driver)| driver).collect()
}

/// Denormalized inputs kept on the snapshot for audit and debugging.
fn feature_summary(signals: &AgentSignals, baseline: &BaselineFit) -> Value {
	serde_json::json!({
		"leads_worked": signals.leads_worked,
		"leads_converted": signals.leads_converted,
		"leads_created_30d": signals.leads_created_30d,
		"stale_new_leads": signals.stale_new_leads,
		"open_leads_90d": signals.open_leads_90d,
		"buyer_leads": signals.buyer_leads,
		"seller_leads": signals.seller_leads,
		"tasks_completed_30d": signals.tasks_completed_30d,
		"tasks_completed_prior_30d": signals.tasks_completed_prior_30d,
		"tasks_overdue_open": signals.tasks_overdue_open,
		"active_listings": signals.active_listings,
		"active_transactions": signals.active_transactions,
		"closed_total": signals.closed_total(),
		"first_touch_satisfied": signals.first_touch_satisfied,
		"first_touch_breached": signals.first_touch_breached,
		"first_touch_median_minutes": signals.first_touch_median_minutes,
		"touchpoints_30d": signals.touchpoints_30d,
		"touchpoints_prior_30d": signals.touchpoints_prior_30d,
		"noncompliant_transactions": signals.noncompliant_transactions,
		"oldest_flag_age_days": signals.oldest_flag_age_days,
		"risk_interventions_90d": signals.risk_interventions_90d,
		"baseline_fit": {
			"score": baseline.score,
			"context": baseline.context,
			"counts": baseline.counts,
		},
	})
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use crate::{
		baseline::{self, MarketProfile},
		signals::ClosedDeal,
	};

	use super::*;

	fn period() -> (OffsetDateTime, OffsetDateTime) {
		(datetime!(2024-06-01 00:00 UTC), datetime!(2025-06-01 00:00 UTC))
	}

	fn neutral_profile() -> MarketProfile {
		baseline::market_profile(std::iter::empty())
	}

	fn busy_signals() -> AgentSignals {
		AgentSignals {
			leads_worked: 80,
			leads_converted: 12,
			leads_created_30d: 9,
			open_leads_90d: 14,
			buyer_leads: 50,
			seller_leads: 20,
			tasks_completed_30d: 40,
			tasks_completed_prior_30d: 25,
			tasks_overdue_open: 3,
			active_listings: 5,
			active_transactions: 4,
			closed_deals: vec![
				ClosedDeal { price: 420_000.0, closed_at: datetime!(2025-02-01 00:00 UTC) },
				ClosedDeal { price: 510_000.0, closed_at: datetime!(2025-04-10 00:00 UTC) },
			],
			first_touch_satisfied: 34,
			first_touch_breached: 6,
			touchpoints_30d: 120,
			touchpoints_prior_30d: 90,
			..Default::default()
		}
	}

	fn score_of(signals: &AgentSignals, weights: &DimensionWeights) -> ScorePayload {
		let profile = neutral_profile();
		let fit = baseline::estimate_baseline_fit(signals, &profile);
		let (start, end) = period();

		compose_score(ScoreInputs { signals, baseline: &fit, weights, period_start: start, period_end: end })
	}

	#[test]
	fn identical_inputs_produce_byte_identical_payloads() {
		let signals = busy_signals();
		let weights = DimensionWeights::default();
		let first = score_of(&signals, &weights);
		let second = score_of(&signals, &weights);

		assert_eq!(
			serde_json::to_vec(&first).expect("serialize"),
			serde_json::to_vec(&second).expect("serialize")
		);
	}

	#[test]
	fn all_dimensions_stay_in_range_across_extremes() {
		let weights = DimensionWeights::default();
		let mut extreme = busy_signals();

		extreme.leads_converted = extreme.leads_worked;
		extreme.noncompliant_transactions = 50;
		extreme.risk_interventions_90d = 20;
		extreme.oldest_flag_age_days = Some(900.0);
		extreme.touchpoints_30d = 10_000;
		extreme.touchpoints_prior_30d = 1;

		for signals in [AgentSignals::default(), busy_signals(), extreme] {
			let payload = score_of(&signals, &weights);
			let d = payload.dimensions;

			for value in [
				payload.overall_score,
				d.historical_effectiveness,
				d.responsiveness_reliability,
				d.recency_momentum,
				d.opportunity_fit,
				d.capacity_load,
			] {
				assert!((0.0..=1.0).contains(&value), "out of range: {value}");
			}

			assert!(d.risk_drag_penalty >= 0.0);
			assert!(d.risk_drag_penalty <= weights.max_risk_drag_penalty);
		}
	}

	#[test]
	fn band_never_drops_as_score_rises() {
		let weights = DimensionWeights::default();
		let mut previous = ConfidenceBand::Developing;

		for step in 0..=100 {
			let band = band_for(step as f64 / 100.0, &weights);

			assert!(band >= previous, "band regressed at score {step}");

			previous = band;
		}
	}

	#[test]
	fn band_thresholds_are_inclusive() {
		let weights = DimensionWeights::default();

		assert_eq!(band_for(0.75, &weights), ConfidenceBand::Proven);
		assert_eq!(band_for(0.749, &weights), ConfidenceBand::Established);
		assert_eq!(band_for(0.50, &weights), ConfidenceBand::Established);
		assert_eq!(band_for(0.499, &weights), ConfidenceBand::Developing);
	}

	#[test]
	fn zero_activity_agent_scores_neutral_and_developing() {
		let weights = DimensionWeights::default();
		let payload = score_of(&AgentSignals::default(), &weights);
		let d = payload.dimensions;

		assert_eq!(d.historical_effectiveness, 0.5);
		assert_eq!(d.responsiveness_reliability, 0.5);
		assert_eq!(d.recency_momentum, 0.5);
		assert_eq!(d.capacity_load, 0.5);
		assert_eq!(d.risk_drag_penalty, 0.0);
		assert_eq!(payload.band, ConfidenceBand::Developing);
	}

	#[test]
	fn risk_drag_is_capped_at_configured_maximum() {
		let weights = DimensionWeights::default();
		let mut signals = busy_signals();

		signals.noncompliant_transactions = 100;
		signals.risk_interventions_90d = 100;
		signals.oldest_flag_age_days = Some(3_650.0);

		let payload = score_of(&signals, &weights);

		assert_eq!(payload.dimensions.risk_drag_penalty, weights.max_risk_drag_penalty);
	}

	#[test]
	fn risk_drag_lowers_the_overall_score() {
		let weights = DimensionWeights::default();
		let clean = score_of(&busy_signals(), &weights);
		let mut flagged_signals = busy_signals();

		flagged_signals.noncompliant_transactions = 3;

		let flagged = score_of(&flagged_signals, &weights);

		assert!(flagged.overall_score < clean.overall_score);
	}

	#[test]
	fn driver_list_respects_display_budget_and_ordering() {
		let weights = DimensionWeights::default();
		let payload = score_of(&busy_signals(), &weights);

		assert!(payload.drivers.len() <= 2);
		assert!(!payload.drivers.is_empty());

		let deviation_of = |driver: &Driver| match driver.label.as_str() {
			"Historical effectiveness" => {
				(payload.dimensions.historical_effectiveness - 0.5).abs()
			},
			"Responsiveness" => (payload.dimensions.responsiveness_reliability - 0.5).abs(),
			"Recent momentum" => (payload.dimensions.recency_momentum - 0.5).abs(),
			"Opportunity fit" => (payload.dimensions.opportunity_fit - 0.5).abs(),
			"Capacity" => (payload.dimensions.capacity_load - 0.5).abs(),
			"Compliance risk" => payload.dimensions.risk_drag_penalty,
			other => panic!("unexpected driver label: {other}"),
		};

		if payload.drivers.len() == 2 {
			assert!(deviation_of(&payload.drivers[0]) >= deviation_of(&payload.drivers[1]));
		}
	}

	#[test]
	fn nonzero_risk_surfaces_as_negative_driver() {
		let weights = DimensionWeights { max_risk_drag_penalty: 0.5, ..Default::default() };
		let mut signals = AgentSignals::default();

		signals.noncompliant_transactions = 6;
		signals.risk_interventions_90d = 4;

		let payload = score_of(&signals, &weights);
		let risk = payload
			.drivers
			.iter()
			.find(|driver| driver.label == "Compliance risk")
			.expect("risk driver present");

		assert_eq!(risk.direction, DriverDirection::Negative);
	}
}
