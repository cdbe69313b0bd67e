//! Context-fit plumbing: a pure normalization step over the ad-hoc request
//! context, a deterministic SHA-256 key over its canonical JSON form, and
//! the agent-vs-context fit computation. Normalization and hashing are
//! independent units so each can be tested on its own.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
	baseline::{self, LeadType, NEUTRAL_FIT},
	classify::{self, PriceBand},
	score::clamp01,
	signals::AgentSignals,
};

/// Ad-hoc request context as received from the caller. Every field is
/// optional; a sparse context simply leaves more sub-fits at their
/// neutral defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FitRequestContext {
	pub lead_type: Option<String>,
	pub city: Option<String>,
	pub state: Option<String>,
	pub postal_code: Option<String>,
	pub property_type: Option<String>,
	pub price: Option<f64>,
	pub price_band: Option<String>,
}

/// Canonicalized context. Two requests that normalize to the same value
/// share one cache row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NormalizedContext {
	pub lead_type: Option<LeadType>,
	pub city: Option<String>,
	pub state: Option<String>,
	pub postal_code: Option<String>,
	pub property_type: Option<String>,
	pub price_band: Option<PriceBand>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FitReason {
	pub label: String,
	pub summary: String,
}

/// Canonicalization rules: trim everything; city and property type fold to
/// lowercase; state folds to uppercase; an explicit price band wins over a
/// raw price; empty strings and unknown band names become None.
pub fn normalize_context(ctx: &FitRequestContext) -> NormalizedContext {
	let lead_type = ctx.lead_type.as_deref().and_then(|value| {
		match value.trim().to_ascii_uppercase().as_str() {
			"BUYER" => Some(LeadType::Buyer),
			"SELLER" => Some(LeadType::Seller),
			_ => None,
		}
	});
	let price_band = ctx
		.price_band
		.as_deref()
		.and_then(PriceBand::parse)
		.or_else(|| ctx.price.map(classify::classify_price));

	NormalizedContext {
		lead_type,
		city: normalized_field(ctx.city.as_deref(), str::to_lowercase),
		state: normalized_field(ctx.state.as_deref(), str::to_uppercase),
		postal_code: normalized_field(ctx.postal_code.as_deref(), str::to_string),
		property_type: normalized_field(ctx.property_type.as_deref(), str::to_lowercase),
		price_band,
	}
}

fn normalized_field(value: Option<&str>, fold: fn(&str) -> String) -> Option<String> {
	value.map(str::trim).filter(|trimmed| !trimmed.is_empty()).map(fold)
}

/// Canonical serialization of the normalized context. serde_json maps are
/// key-sorted, so the byte layout is stable across runs.
pub fn canonical_json(normalized: &NormalizedContext) -> serde_json::Value {
	serde_json::json!({
		"lead_type": normalized.lead_type,
		"city": normalized.city,
		"state": normalized.state,
		"postal_code": normalized.postal_code,
		"property_type": normalized.property_type,
		"price_band": normalized.price_band,
	})
}

/// Content address of one normalized context: hex SHA-256 over the
/// canonical JSON bytes.
pub fn context_key(normalized: &NormalizedContext) -> String {
	let payload = canonical_json(normalized);
	let raw = payload.to_string();
	let mut hasher = Sha256::new();

	hasher.update(raw.as_bytes());

	let digest = hasher.finalize();

	digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Score one agent's own history against the requested context, using the
/// same four sub-fit formulas as the baseline estimator but with the
/// requested segment standing in for the org's dominant one.
pub fn context_fit_score(
	signals: &AgentSignals,
	normalized: &NormalizedContext,
) -> (f64, Vec<FitReason>) {
	let listings_total = signals.listings_total();
	let closed_total = signals.closed_total();

	let in_state = normalized
		.state
		.as_deref()
		.and_then(|state| signals.listings_by_state.get(state).copied())
		.unwrap_or(0);
	let geo = baseline::geo_fit(normalized.state.is_some(), in_state, listings_total);

	let closed_in_band = normalized
		.price_band
		.map(|band| {
			signals
				.closed_deals
				.iter()
				.filter(|deal| classify::classify_price(deal.price) == band)
				.count() as u64
		})
		.unwrap_or(0);
	let price = baseline::smoothed_fit(normalized.price_band.is_some(), closed_in_band, closed_total);

	let in_property = normalized
		.property_type
		.as_deref()
		.and_then(|property_type| signals.listings_by_property_type.get(property_type).copied())
		.unwrap_or(0);
	let property =
		baseline::smoothed_fit(normalized.property_type.is_some(), in_property, listings_total);

	let orientation = classify::classify_orientation(signals.buyer_leads, signals.seller_leads);
	let lead_type = baseline::lead_type_fit(
		orientation,
		normalized.lead_type.unwrap_or(LeadType::Unknown),
	);

	let score = clamp01(
		baseline::GEO_WEIGHT * geo
			+ baseline::PRICE_WEIGHT * price
			+ baseline::PROPERTY_WEIGHT * property
			+ baseline::LEAD_TYPE_WEIGHT * lead_type,
	);
	let mut reasons = Vec::with_capacity(4);

	if let Some(state) = normalized.state.as_deref() {
		reasons.push(FitReason {
			label: "Geography".to_string(),
			summary: format!("{in_state} of {listings_total} listings in {state}"),
		});
	}
	if let Some(band) = normalized.price_band {
		reasons.push(FitReason {
			label: "Price band".to_string(),
			summary: format!(
				"{closed_in_band} of {closed_total} closings in the {} band",
				band.as_str()
			),
		});
	}
	if let Some(property_type) = normalized.property_type.as_deref() {
		reasons.push(FitReason {
			label: "Property type".to_string(),
			summary: format!("{in_property} of {listings_total} listings are {property_type}"),
		});
	}
	if let Some(lead) = normalized.lead_type {
		reasons.push(FitReason {
			label: "Lead type".to_string(),
			summary: format!(
				"{} orientation against a {} lead",
				orientation.as_str(),
				lead.as_str()
			),
		});
	}
	if reasons.is_empty() {
		reasons.push(FitReason {
			label: "Context".to_string(),
			summary: format!("No scorable context fields; neutral fit {NEUTRAL_FIT:.2} applied"),
		});
	}

	(score, reasons)
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use time::macros::datetime;

	use crate::signals::ClosedDeal;

	use super::*;

	fn context(city: &str, state: &str, lead_type: &str) -> FitRequestContext {
		FitRequestContext {
			lead_type: Some(lead_type.to_string()),
			city: Some(city.to_string()),
			state: Some(state.to_string()),
			postal_code: Some("33101".to_string()),
			property_type: Some("Condo".to_string()),
			price: Some(550_000.0),
			price_band: None,
		}
	}

	#[test]
	fn equivalent_contexts_share_one_key() {
		let a = normalize_context(&context("Miami", "fl", "buyer"));
		let b = normalize_context(&context(" miami ", " FL ", " BUYER "));

		assert_eq!(a, b);
		assert_eq!(context_key(&a), context_key(&b));
	}

	#[test]
	fn differing_contexts_produce_differing_keys() {
		let a = normalize_context(&context("Miami", "FL", "BUYER"));
		let b = normalize_context(&context("Tampa", "FL", "BUYER"));

		assert_ne!(context_key(&a), context_key(&b));
	}

	#[test]
	fn price_resolves_to_band_and_explicit_band_wins() {
		let from_price = normalize_context(&context("Miami", "FL", "BUYER"));

		assert_eq!(from_price.price_band, Some(PriceBand::MoveUp));

		let mut explicit = context("Miami", "FL", "BUYER");

		explicit.price_band = Some("luxury".to_string());

		assert_eq!(normalize_context(&explicit).price_band, Some(PriceBand::Luxury));
	}

	#[test]
	fn empty_and_unknown_fields_normalize_to_none() {
		let ctx = FitRequestContext {
			lead_type: Some("RENTER".to_string()),
			city: Some("   ".to_string()),
			state: None,
			postal_code: Some("".to_string()),
			property_type: None,
			price: None,
			price_band: Some("MID".to_string()),
		};
		let normalized = normalize_context(&ctx);

		assert_eq!(normalized.lead_type, None);
		assert_eq!(normalized.city, None);
		assert_eq!(normalized.postal_code, None);
		assert_eq!(normalized.price_band, None);
	}

	#[test]
	fn key_is_hex_sha256() {
		let normalized = normalize_context(&FitRequestContext::default());
		let key = context_key(&normalized);

		assert_eq!(key.len(), 64);
		assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn fit_scores_agent_history_against_requested_segment() {
		let signals = AgentSignals {
			buyer_leads: 40,
			seller_leads: 10,
			listings_by_state: BTreeMap::from([("FL".to_string(), 6)]),
			listings_by_property_type: BTreeMap::from([("condo".to_string(), 4)]),
			closed_deals: vec![
				ClosedDeal { price: 450_000.0, closed_at: datetime!(2025-01-10 00:00 UTC) },
				ClosedDeal { price: 520_000.0, closed_at: datetime!(2025-03-20 00:00 UTC) },
			],
			..Default::default()
		};
		let normalized = normalize_context(&context("Miami", "FL", "BUYER"));
		let (score, reasons) = context_fit_score(&signals, &normalized);

		// 6 FL listings, MOVE_UP closings 2/2, condos 4/6, buyer-heavy
		// against a buyer lead.
		let expected = baseline::GEO_WEIGHT * 0.9
			+ baseline::PRICE_WEIGHT * (3.0 / 6.0)
			+ baseline::PROPERTY_WEIGHT * (5.0 / 10.0)
			+ baseline::LEAD_TYPE_WEIGHT * 1.0;

		assert!((score - clamp01(expected)).abs() < 1e-12);
		assert_eq!(reasons.len(), 4);
	}

	#[test]
	fn sparse_context_yields_neutral_fit() {
		let (score, reasons) = context_fit_score(
			&AgentSignals::default(),
			&normalize_context(&FitRequestContext::default()),
		);
		let expected = baseline::GEO_WEIGHT * NEUTRAL_FIT
			+ baseline::PRICE_WEIGHT * NEUTRAL_FIT
			+ baseline::PROPERTY_WEIGHT * NEUTRAL_FIT
			+ baseline::LEAD_TYPE_WEIGHT * 0.75;

		assert!((score - clamp01(expected)).abs() < 1e-12);
		assert_eq!(reasons.len(), 1);
	}
}
