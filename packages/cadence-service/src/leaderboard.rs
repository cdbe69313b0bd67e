//! Ranked, filterable leaderboard over the latest snapshots. The database
//! supplies scope-filtered rows; filtering on orientation and price-band
//! participation, ranking, and pagination are pure functions here so their
//! semantics stay reproducible and directly testable.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use cadence_domain::{Orientation, PriceBand, buyer_share_percent, classify};
use cadence_storage::{models::LeaderboardSnapshotRow, snapshots};

use crate::{CadenceService, Result};

pub const MIN_PAGE_LIMIT: u32 = 1;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_LIMIT: u32 = 25;

/// Closed-deal participation for the price-band filter looks back this far.
const BAND_LOOKBACK_DAYS: i64 = 365;

#[derive(Clone, Copy, Debug, Default)]
pub struct LeaderboardParams {
	pub page: u32,
	pub limit: u32,
	pub office_id: Option<Uuid>,
	pub team_id: Option<Uuid>,
	pub orientation: Option<Orientation>,
	pub price_band: Option<PriceBand>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardRow {
	pub agent_id: Uuid,
	pub display_name: String,
	pub overall_score: f64,
	pub band: String,
	pub orientation: Orientation,
	pub buyer_share_percent: u8,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub closed_in_band: Option<u64>,
	pub drivers: Value,
	#[serde(with = "cadence_domain::time_serde")]
	pub scored_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardPage {
	pub model_version: String,
	pub page: u32,
	pub limit: u32,
	/// Size of the FILTERED set, so clients paginate correctly.
	pub total: usize,
	pub items: Vec<LeaderboardRow>,
}

impl CadenceService {
	pub async fn leaderboard(
		&self,
		org_id: Uuid,
		params: LeaderboardParams,
	) -> Result<LeaderboardPage> {
		let rows = snapshots::list_latest_for_org(
			&self.db,
			org_id,
			self.model_version(),
			params.office_id,
			params.team_id,
		)
		.await?;
		let agent_ids: Vec<Uuid> = rows.iter().map(|row| row.agent_id).collect();
		let since = OffsetDateTime::now_utc() - Duration::days(BAND_LOOKBACK_DAYS);
		let mixes = self.source.lead_mix(org_id, &agent_ids, since).await?;
		let prices = if params.price_band.is_some() {
			self.source.closed_prices(org_id, &agent_ids, since).await?
		} else {
			HashMap::new()
		};

		Ok(build_page(self.model_version(), rows, &mixes, &prices, &params))
	}
}

/// Pure assembly of one leaderboard page from fetched rows.
pub fn build_page(
	model_version: &str,
	rows: Vec<LeaderboardSnapshotRow>,
	mixes: &HashMap<Uuid, (u64, u64)>,
	prices: &HashMap<Uuid, Vec<f64>>,
	params: &LeaderboardParams,
) -> LeaderboardPage {
	let limit = params.limit.clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT);
	let page = params.page.max(1);
	let mut filtered: Vec<LeaderboardRow> = rows
		.into_iter()
		.filter_map(|row| {
			let (buyer, seller) = mixes.get(&row.agent_id).copied().unwrap_or((0, 0));
			let orientation = classify::classify_orientation(buyer, seller);

			if let Some(wanted) = params.orientation
				&& orientation != wanted
			{
				return None;
			}

			let closed_in_band = params.price_band.map(|band| {
				prices
					.get(&row.agent_id)
					.map(|agent_prices| {
						agent_prices
							.iter()
							.filter(|price| classify::classify_price(**price) == band)
							.count() as u64
					})
					.unwrap_or(0)
			});

			// The price-band filter requires actual participation in the
			// band over the trailing year.
			if let Some(count) = closed_in_band
				&& count == 0
			{
				return None;
			}

			Some(LeaderboardRow {
				agent_id: row.agent_id,
				display_name: row.display_name,
				overall_score: row.overall_score,
				band: row.band,
				orientation,
				buyer_share_percent: buyer_share_percent(buyer, seller),
				closed_in_band,
				drivers: row.drivers,
				scored_at: row.created_at,
			})
		})
		.collect();

	filtered.sort_by(|a, b| {
		b.overall_score
			.total_cmp(&a.overall_score)
			.then_with(|| a.display_name.cmp(&b.display_name))
	});

	let total = filtered.len();
	let start = ((page - 1) as usize).saturating_mul(limit as usize);
	let items: Vec<LeaderboardRow> =
		filtered.into_iter().skip(start).take(limit as usize).collect();

	LeaderboardPage { model_version: model_version.to_string(), page, limit, total, items }
}
