use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::DimensionScores;
use cadence_storage::{models::PerformanceSnapshotRow, snapshots};

use crate::{CadenceService, Result};

#[derive(Clone, Debug, Serialize)]
pub struct Indicator {
	pub agent_id: Uuid,
	pub model_version: String,
	pub overall_score: f64,
	pub band: String,
	pub dimensions: DimensionScores,
	pub drivers: Value,
	#[serde(with = "cadence_domain::time_serde")]
	pub period_start: OffsetDateTime,
	#[serde(with = "cadence_domain::time_serde")]
	pub period_end: OffsetDateTime,
	#[serde(with = "cadence_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub feature_summary: Option<Value>,
}

impl CadenceService {
	/// Current indicator via the latest pointer, or None when the agent has
	/// never been scored (or the snapshot schema is absent).
	pub async fn latest_indicator(
		&self,
		org_id: Uuid,
		agent_id: Uuid,
		include_features: bool,
	) -> Result<Option<Indicator>> {
		let row =
			snapshots::get_latest(&self.db, org_id, agent_id, self.model_version()).await?;

		Ok(row.map(|row| indicator_from_row(row, include_features)))
	}
}

pub(crate) fn indicator_from_row(row: PerformanceSnapshotRow, include_features: bool) -> Indicator {
	Indicator {
		agent_id: row.agent_id,
		model_version: row.model_version,
		overall_score: row.overall_score,
		band: row.band,
		dimensions: dimensions_from_row(
			row.historical_effectiveness,
			row.responsiveness_reliability,
			row.recency_momentum,
			row.opportunity_fit,
			row.capacity_load,
			row.risk_drag_penalty,
		),
		drivers: row.drivers,
		period_start: row.period_start,
		period_end: row.period_end,
		created_at: row.created_at,
		feature_summary: include_features.then_some(row.feature_summary),
	}
}

pub(crate) fn dimensions_from_row(
	historical_effectiveness: f64,
	responsiveness_reliability: f64,
	recency_momentum: f64,
	opportunity_fit: f64,
	capacity_load: f64,
	risk_drag_penalty: f64,
) -> DimensionScores {
	DimensionScores {
		historical_effectiveness,
		responsiveness_reliability,
		recency_momentum,
		opportunity_fit,
		capacity_load,
		risk_drag_penalty,
	}
}
