use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::DimensionWeights;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PerformanceSnapshotRow {
	pub snapshot_id: Uuid,
	pub org_id: Uuid,
	pub agent_id: Uuid,
	pub model_version: String,
	pub overall_score: f64,
	pub band: String,
	pub historical_effectiveness: f64,
	pub responsiveness_reliability: f64,
	pub recency_momentum: f64,
	pub opportunity_fit: f64,
	pub capacity_load: f64,
	pub risk_drag_penalty: f64,
	pub drivers: Value,
	pub feature_summary: Value,
	pub period_start: OffsetDateTime,
	pub period_end: OffsetDateTime,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LatestPointerRow {
	pub org_id: Uuid,
	pub agent_id: Uuid,
	pub model_version: String,
	pub snapshot_id: Uuid,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct DimensionWeightsRow {
	pub org_id: Uuid,
	pub model_version: String,
	pub historical_effectiveness: f64,
	pub responsiveness_reliability: f64,
	pub recency_momentum: f64,
	pub opportunity_fit: f64,
	pub capacity_load: f64,
	pub max_risk_drag_penalty: f64,
	pub high_band_threshold: f64,
	pub medium_band_threshold: f64,
	pub updated_at: OffsetDateTime,
}
impl DimensionWeightsRow {
	pub fn weights(&self) -> DimensionWeights {
		DimensionWeights {
			historical_effectiveness: self.historical_effectiveness,
			responsiveness_reliability: self.responsiveness_reliability,
			recency_momentum: self.recency_momentum,
			opportunity_fit: self.opportunity_fit,
			capacity_load: self.capacity_load,
			max_risk_drag_penalty: self.max_risk_drag_penalty,
			high_band_threshold: self.high_band_threshold,
			medium_band_threshold: self.medium_band_threshold,
		}
	}
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ContextFitRow {
	pub org_id: Uuid,
	pub agent_id: Uuid,
	pub model_version: String,
	pub context_key: String,
	pub fit_score: f64,
	pub reasons: Value,
	pub computed_at: OffsetDateTime,
}

/// Roster row from the CRM's agent_profiles table (read-only here).
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AgentProfileRow {
	pub agent_id: Uuid,
	pub org_id: Uuid,
	pub user_id: Uuid,
	pub display_name: String,
	pub office_id: Option<Uuid>,
	pub team_id: Option<Uuid>,
}

/// Latest snapshot joined with the owning agent's profile, as fetched for
/// the leaderboard before filtering and pagination.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LeaderboardSnapshotRow {
	pub agent_id: Uuid,
	pub display_name: String,
	pub office_id: Option<Uuid>,
	pub team_id: Option<Uuid>,
	pub overall_score: f64,
	pub band: String,
	pub drivers: Value,
	pub created_at: OffsetDateTime,
}
