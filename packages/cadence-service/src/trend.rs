use serde::Serialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use cadence_domain::DimensionScores;
use cadence_storage::{models::PerformanceSnapshotRow, snapshots};

use crate::{CadenceService, Result, indicator};

pub const MIN_TREND_DAYS: i64 = 7;
pub const MAX_TREND_DAYS: i64 = 365;

#[derive(Clone, Debug, Serialize)]
pub struct TrendPoint {
	#[serde(with = "cadence_domain::time_serde")]
	pub created_at: OffsetDateTime,
	pub overall_score: f64,
	pub band: String,
	pub dimensions: DimensionScores,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub feature_summary: Option<Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrendResponse {
	pub agent_id: Uuid,
	pub model_version: String,
	pub points: Vec<TrendPoint>,
}

pub fn clamp_days(days: i64) -> i64 {
	days.clamp(MIN_TREND_DAYS, MAX_TREND_DAYS)
}

impl CadenceService {
	/// Snapshot history over the trailing window, oldest first, reduced to
	/// compact points. Degrades to an empty series when the agent has no
	/// history.
	pub async fn trend(
		&self,
		org_id: Uuid,
		agent_id: Uuid,
		days: i64,
		include_features: bool,
	) -> Result<TrendResponse> {
		let days = clamp_days(days);
		let since = OffsetDateTime::now_utc() - Duration::days(days);
		let rows =
			snapshots::list_history(&self.db, org_id, agent_id, self.model_version(), since)
				.await?;
		let points =
			rows.into_iter().map(|row| point_from_row(row, include_features)).collect();

		Ok(TrendResponse {
			agent_id,
			model_version: self.model_version().to_string(),
			points,
		})
	}
}

fn point_from_row(row: PerformanceSnapshotRow, include_features: bool) -> TrendPoint {
	TrendPoint {
		created_at: row.created_at,
		overall_score: row.overall_score,
		band: row.band,
		dimensions: indicator::dimensions_from_row(
			row.historical_effectiveness,
			row.responsiveness_reliability,
			row.recency_momentum,
			row.opportunity_fit,
			row.capacity_load,
			row.risk_drag_penalty,
		),
		feature_summary: include_features.then_some(row.feature_summary),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn days_clamp_to_supported_window() {
		assert_eq!(clamp_days(0), MIN_TREND_DAYS);
		assert_eq!(clamp_days(6), MIN_TREND_DAYS);
		assert_eq!(clamp_days(7), 7);
		assert_eq!(clamp_days(90), 90);
		assert_eq!(clamp_days(365), 365);
		assert_eq!(clamp_days(10_000), MAX_TREND_DAYS);
	}
}
