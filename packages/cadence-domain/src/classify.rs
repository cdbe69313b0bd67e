//! Buyer/seller orientation and closed-price band classification, shared by
//! the baseline estimator, the context-fit computation, and the leaderboard
//! filters.

use serde::{Deserialize, Serialize};

/// An agent's buyer-vs-seller lead mix.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
	BuyerHeavy,
	SellerHeavy,
	Balanced,
	Unknown,
}
impl Orientation {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::BuyerHeavy => "BUYER_HEAVY",
			Self::SellerHeavy => "SELLER_HEAVY",
			Self::Balanced => "BALANCED",
			Self::Unknown => "UNKNOWN",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_uppercase().as_str() {
			"BUYER_HEAVY" => Some(Self::BuyerHeavy),
			"SELLER_HEAVY" => Some(Self::SellerHeavy),
			"BALANCED" => Some(Self::Balanced),
			"UNKNOWN" => Some(Self::Unknown),
			_ => None,
		}
	}
}

/// Share of buyer leads, rounded to whole percent. Zero when the agent has
/// no leads of either kind.
pub fn buyer_share_percent(buyer_count: u64, seller_count: u64) -> u8 {
	let total = buyer_count + seller_count;

	if total == 0 {
		return 0;
	}

	((100.0 * buyer_count as f64 / total as f64).round() as u64).min(100) as u8
}

pub fn classify_orientation(buyer_count: u64, seller_count: u64) -> Orientation {
	if buyer_count + seller_count == 0 {
		return Orientation::Unknown;
	}

	let share = buyer_share_percent(buyer_count, seller_count);

	if share >= 67 {
		Orientation::BuyerHeavy
	} else if share <= 33 {
		Orientation::SellerHeavy
	} else {
		Orientation::Balanced
	}
}

/// Fixed transaction-value buckets. Upper bounds are half-open: a closing at
/// exactly $600,000 is PREMIUM, not MOVE_UP.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceBand {
	Starter,
	MoveUp,
	Premium,
	Luxury,
}
impl PriceBand {
	pub const ALL: [Self; 4] = [Self::Starter, Self::MoveUp, Self::Premium, Self::Luxury];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Starter => "STARTER",
			Self::MoveUp => "MOVE_UP",
			Self::Premium => "PREMIUM",
			Self::Luxury => "LUXURY",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_uppercase().as_str() {
			"STARTER" => Some(Self::Starter),
			"MOVE_UP" => Some(Self::MoveUp),
			"PREMIUM" => Some(Self::Premium),
			"LUXURY" => Some(Self::Luxury),
			_ => None,
		}
	}
}

pub fn classify_price(price: f64) -> PriceBand {
	if price < 300_000.0 {
		PriceBand::Starter
	} else if price < 600_000.0 {
		PriceBand::MoveUp
	} else if price < 1_000_000.0 {
		PriceBand::Premium
	} else {
		PriceBand::Luxury
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn buyer_share_rounds_to_whole_percent() {
		assert_eq!(buyer_share_percent(0, 0), 0);
		assert_eq!(buyer_share_percent(1, 2), 33);
		assert_eq!(buyer_share_percent(2, 1), 67);
		assert_eq!(buyer_share_percent(5, 5), 50);
	}

	#[test]
	fn orientation_thresholds_are_inclusive_at_67_and_33() {
		assert_eq!(classify_orientation(67, 33), Orientation::BuyerHeavy);
		assert_eq!(classify_orientation(66, 34), Orientation::Balanced);
		assert_eq!(classify_orientation(33, 67), Orientation::SellerHeavy);
		assert_eq!(classify_orientation(34, 66), Orientation::Balanced);
		assert_eq!(classify_orientation(0, 0), Orientation::Unknown);
	}

	#[test]
	fn price_bands_use_half_open_upper_bounds() {
		assert_eq!(classify_price(0.0), PriceBand::Starter);
		assert_eq!(classify_price(299_999.99), PriceBand::Starter);
		assert_eq!(classify_price(300_000.0), PriceBand::MoveUp);
		assert_eq!(classify_price(550_000.0), PriceBand::MoveUp);
		assert_eq!(classify_price(600_000.0), PriceBand::Premium);
		assert_eq!(classify_price(999_999.0), PriceBand::Premium);
		assert_eq!(classify_price(1_000_000.0), PriceBand::Luxury);
	}

	#[test]
	fn band_names_round_trip() {
		for band in PriceBand::ALL {
			assert_eq!(PriceBand::parse(band.as_str()), Some(band));
		}
		assert_eq!(PriceBand::parse(" move_up "), Some(PriceBand::MoveUp));
		assert_eq!(PriceBand::parse("MID"), None);
	}
}
