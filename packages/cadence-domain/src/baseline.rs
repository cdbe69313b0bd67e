//! Baseline opportunity-fit estimation: how well an agent's historical
//! listing/closing footprint matches the organization's dominant market
//! segment, with no request context involved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
	classify::{self, Orientation, PriceBand},
	score::clamp01,
	signals::AgentSignals,
};

/// Sub-fit value used whenever a dimension has nothing to measure against.
pub const NEUTRAL_FIT: f64 = 0.7;

pub const GEO_WEIGHT: f64 = 0.35;
pub const PRICE_WEIGHT: f64 = 0.25;
pub const PROPERTY_WEIGHT: f64 = 0.15;
pub const LEAD_TYPE_WEIGHT: f64 = 0.25;

/// Listings in the dominant state at or above this count earn the strong
/// geo fit outright.
const GEO_STRONG_LISTING_COUNT: u64 = 5;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadType {
	Buyer,
	Seller,
	Unknown,
}
impl LeadType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Buyer => "BUYER",
			Self::Seller => "SELLER",
			Self::Unknown => "UNKNOWN",
		}
	}
}

/// The organization's dominant market segment for one recompute run.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketProfile {
	pub typical_lead_type: LeadType,
	pub dominant_state: Option<String>,
	pub dominant_property_type: Option<String>,
	pub dominant_price_band: Option<PriceBand>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FitContext {
	pub typical_lead_type: LeadType,
	pub dominant_state: Option<String>,
	pub dominant_property_type: Option<String>,
	pub dominant_price_band: Option<PriceBand>,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct FitCounts {
	pub listings_total: u64,
	pub listings_in_dominant_state: u64,
	pub listings_in_dominant_property_type: u64,
	pub closed_total: u64,
	pub closed_in_dominant_band: u64,
	pub closed_flagged: u64,
}

/// Per-agent baseline fit. Recomputed fresh on every run and consumed
/// inline by the composite scorer; never persisted on its own.
#[derive(Clone, Debug, Serialize)]
pub struct BaselineFit {
	pub score: f64,
	pub context: FitContext,
	pub counts: FitCounts,
}

/// Derive the org-wide market profile from every in-scope agent's signals.
pub fn market_profile<'a, I>(all_signals: I) -> MarketProfile
where
	I: IntoIterator<Item = &'a AgentSignals>,
{
	let mut buyer_total = 0_u64;
	let mut seller_total = 0_u64;
	let mut by_state: BTreeMap<String, u64> = BTreeMap::new();
	let mut by_property: BTreeMap<String, u64> = BTreeMap::new();
	let mut by_band: BTreeMap<PriceBand, u64> = BTreeMap::new();

	for signals in all_signals {
		buyer_total += signals.buyer_leads;
		seller_total += signals.seller_leads;

		for (state, count) in &signals.listings_by_state {
			*by_state.entry(state.clone()).or_default() += count;
		}
		for (property_type, count) in &signals.listings_by_property_type {
			*by_property.entry(property_type.clone()).or_default() += count;
		}
		for deal in &signals.closed_deals {
			*by_band.entry(classify::classify_price(deal.price)).or_default() += 1;
		}
	}

	// Ties resolve to BUYER.
	let typical_lead_type = if buyer_total == 0 && seller_total == 0 {
		LeadType::Unknown
	} else if buyer_total >= seller_total {
		LeadType::Buyer
	} else {
		LeadType::Seller
	};

	MarketProfile {
		typical_lead_type,
		dominant_state: dominant_key(&by_state),
		dominant_property_type: dominant_key(&by_property),
		dominant_price_band: dominant_band(&by_band),
	}
}

/// Estimate one agent's fit against the org profile. Never fails: every
/// sub-fit falls back to the neutral default for agents with no activity.
pub fn estimate_baseline_fit(signals: &AgentSignals, profile: &MarketProfile) -> BaselineFit {
	let listings_total = signals.listings_total();
	let listings_in_dominant_state = profile
		.dominant_state
		.as_deref()
		.and_then(|state| signals.listings_by_state.get(state).copied())
		.unwrap_or(0);
	let listings_in_dominant_property_type = profile
		.dominant_property_type
		.as_deref()
		.and_then(|property_type| signals.listings_by_property_type.get(property_type).copied())
		.unwrap_or(0);
	let closed_total = signals.closed_total();
	let closed_in_dominant_band = profile
		.dominant_price_band
		.map(|band| {
			signals
				.closed_deals
				.iter()
				.filter(|deal| classify::classify_price(deal.price) == band)
				.count() as u64
		})
		.unwrap_or(0);

	let geo = geo_fit(
		profile.dominant_state.is_some(),
		listings_in_dominant_state,
		listings_total,
	);
	let price = smoothed_fit(
		profile.dominant_price_band.is_some(),
		closed_in_dominant_band,
		closed_total,
	);
	let property = smoothed_fit(
		profile.dominant_property_type.is_some(),
		listings_in_dominant_property_type,
		listings_total,
	);
	let orientation = classify::classify_orientation(signals.buyer_leads, signals.seller_leads);
	let lead_type = lead_type_fit(orientation, profile.typical_lead_type);

	let score = clamp01(
		GEO_WEIGHT * geo
			+ PRICE_WEIGHT * price
			+ PROPERTY_WEIGHT * property
			+ LEAD_TYPE_WEIGHT * lead_type,
	);

	BaselineFit {
		score,
		context: FitContext {
			typical_lead_type: profile.typical_lead_type,
			dominant_state: profile.dominant_state.clone(),
			dominant_property_type: profile.dominant_property_type.clone(),
			dominant_price_band: profile.dominant_price_band,
		},
		counts: FitCounts {
			listings_total,
			listings_in_dominant_state,
			listings_in_dominant_property_type,
			closed_total,
			closed_in_dominant_band,
			closed_flagged: signals.noncompliant_transactions,
		},
	}
}

/// Geographic fit: strong at five or more listings in the dominant state,
/// otherwise interpolated between 0.6 and 0.85 by listing share. Neutral
/// when there is no dominant state or the agent has no listings.
pub fn geo_fit(has_dominant_state: bool, in_state: u64, listings_total: u64) -> f64 {
	if !has_dominant_state || listings_total == 0 {
		return NEUTRAL_FIT;
	}
	if in_state >= GEO_STRONG_LISTING_COUNT {
		return 0.9;
	}

	let share = in_state as f64 / listings_total as f64;

	0.6 + 0.25 * share
}

/// Laplace-smoothed share fit: `min(1, (k + 1) / (n + 4))`. Neutral when
/// the dominant segment is absent or the agent has no history to share.
pub fn smoothed_fit(has_dominant: bool, in_segment: u64, total: u64) -> f64 {
	if !has_dominant || total == 0 {
		return NEUTRAL_FIT;
	}

	((in_segment as f64 + 1.0) / (total as f64 + 4.0)).min(1.0)
}

/// Orientation match against the org's typical lead type. An org with no
/// lead history gives every agent the neutral 0.75.
pub fn lead_type_fit(orientation: Orientation, typical: LeadType) -> f64 {
	match (typical, orientation) {
		(LeadType::Unknown, _) | (_, Orientation::Unknown) => 0.75,
		(_, Orientation::Balanced) => 0.85,
		(LeadType::Buyer, Orientation::BuyerHeavy)
		| (LeadType::Seller, Orientation::SellerHeavy) => 1.0,
		(LeadType::Buyer, Orientation::SellerHeavy)
		| (LeadType::Seller, Orientation::BuyerHeavy) => 0.6,
	}
}

fn dominant_key(counts: &BTreeMap<String, u64>) -> Option<String> {
	let mut best: Option<(&String, u64)> = None;

	for (key, count) in counts {
		if *count == 0 {
			continue;
		}
		// Strictly-greater keeps the first maximal key, so ties break on the
		// map's stable ordering.
		if best.map(|(_, best_count)| *count > best_count).unwrap_or(true) {
			best = Some((key, *count));
		}
	}

	best.map(|(key, _)| key.clone())
}

fn dominant_band(counts: &BTreeMap<PriceBand, u64>) -> Option<PriceBand> {
	let mut best: Option<(PriceBand, u64)> = None;

	for band in PriceBand::ALL {
		let count = counts.get(&band).copied().unwrap_or(0);

		if count == 0 {
			continue;
		}
		if best.map(|(_, best_count)| count > best_count).unwrap_or(true) {
			best = Some((band, count));
		}
	}

	best.map(|(band, _)| band)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use crate::signals::ClosedDeal;

	use super::*;

	fn listing_signals(states: &[(&str, u64)]) -> AgentSignals {
		AgentSignals {
			listings_by_state: states
				.iter()
				.map(|(state, count)| (state.to_string(), *count))
				.collect(),
			..Default::default()
		}
	}

	#[test]
	fn profile_of_empty_org_is_all_unknown() {
		let profile = market_profile(std::iter::empty());

		assert_eq!(profile.typical_lead_type, LeadType::Unknown);
		assert_eq!(profile.dominant_state, None);
		assert_eq!(profile.dominant_property_type, None);
		assert_eq!(profile.dominant_price_band, None);
	}

	#[test]
	fn lead_type_tie_resolves_to_buyer() {
		let a = AgentSignals { buyer_leads: 4, seller_leads: 4, ..Default::default() };
		let profile = market_profile([&a]);

		assert_eq!(profile.typical_lead_type, LeadType::Buyer);
	}

	#[test]
	fn dominant_state_tie_breaks_on_stable_ordering() {
		let a = listing_signals(&[("TX", 3)]);
		let b = listing_signals(&[("FL", 3)]);
		let profile = market_profile([&a, &b]);

		assert_eq!(profile.dominant_state.as_deref(), Some("FL"));
	}

	#[test]
	fn dominant_band_ignores_empty_bands() {
		let deal = |price: f64| ClosedDeal { price, closed_at: datetime!(2025-01-15 00:00 UTC) };
		let a = AgentSignals {
			closed_deals: vec![deal(250_000.0), deal(450_000.0), deal(480_000.0)],
			..Default::default()
		};
		let profile = market_profile([&a]);

		assert_eq!(profile.dominant_price_band, Some(PriceBand::MoveUp));
	}

	#[test]
	fn strong_geo_fit_at_five_listings_in_dominant_state() {
		// Org: 8 of 10 listings in FL. Agent A: 6 FL listings of 6 total.
		let a = listing_signals(&[("FL", 6)]);
		let b = listing_signals(&[("FL", 2), ("GA", 2)]);
		let profile = market_profile([&a, &b]);

		assert_eq!(profile.dominant_state.as_deref(), Some("FL"));

		let fit = estimate_baseline_fit(&a, &profile);

		assert_eq!(fit.counts.listings_in_dominant_state, 6);
		assert_eq!(
			geo_fit(true, fit.counts.listings_in_dominant_state, fit.counts.listings_total),
			0.9
		);
		// No closings anywhere, so priceFit falls back to neutral and the
		// combined score follows the fixed sub-fit weighting.
		let expected = GEO_WEIGHT * 0.9
			+ PRICE_WEIGHT * NEUTRAL_FIT
			+ PROPERTY_WEIGHT * NEUTRAL_FIT
			+ LEAD_TYPE_WEIGHT * 0.75;

		assert!((fit.score - clamp01(expected)).abs() < 1e-12);
	}

	#[test]
	fn partial_geo_share_interpolates_between_bounds() {
		assert_eq!(geo_fit(true, 0, 10), 0.6);
		assert!((geo_fit(true, 2, 10) - 0.65).abs() < 1e-12);
		assert_eq!(geo_fit(false, 0, 10), NEUTRAL_FIT);
		assert_eq!(geo_fit(true, 0, 0), NEUTRAL_FIT);
	}

	#[test]
	fn smoothed_fit_is_laplace_ratio() {
		assert!((smoothed_fit(true, 3, 6) - 0.4).abs() < 1e-12);
		assert_eq!(smoothed_fit(true, 100, 0), NEUTRAL_FIT);
		assert_eq!(smoothed_fit(false, 3, 6), NEUTRAL_FIT);
		// Saturates at 1 for overwhelming concentration.
		assert_eq!(smoothed_fit(true, 1_000, 10), 1.0);
	}

	#[test]
	fn lead_type_fit_matches_spec_table() {
		assert_eq!(lead_type_fit(Orientation::BuyerHeavy, LeadType::Buyer), 1.0);
		assert_eq!(lead_type_fit(Orientation::SellerHeavy, LeadType::Seller), 1.0);
		assert_eq!(lead_type_fit(Orientation::Balanced, LeadType::Buyer), 0.85);
		assert_eq!(lead_type_fit(Orientation::SellerHeavy, LeadType::Buyer), 0.6);
		assert_eq!(lead_type_fit(Orientation::BuyerHeavy, LeadType::Seller), 0.6);
		assert_eq!(lead_type_fit(Orientation::Unknown, LeadType::Buyer), 0.75);
		assert_eq!(lead_type_fit(Orientation::BuyerHeavy, LeadType::Unknown), 0.75);
	}

	#[test]
	fn zero_activity_agent_gets_all_neutral_sub_fits() {
		let active = listing_signals(&[("FL", 6)]);
		let idle = AgentSignals::default();
		let profile = market_profile([&active]);
		let fit = estimate_baseline_fit(&idle, &profile);
		let expected = GEO_WEIGHT * NEUTRAL_FIT
			+ PRICE_WEIGHT * NEUTRAL_FIT
			+ PROPERTY_WEIGHT * NEUTRAL_FIT
			+ LEAD_TYPE_WEIGHT * 0.75;

		assert!((fit.score - clamp01(expected)).abs() < 1e-12);
		assert_eq!(fit.counts.listings_total, 0);
	}
}
