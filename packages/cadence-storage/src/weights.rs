//! Per-organization dimension weights, seeded lazily with the documented
//! defaults the first time an organization is scored.

use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::DimensionWeights;

use crate::{Result, db::Db, models::DimensionWeightsRow};

/// Read the org's weights, inserting the defaults first if no row exists
/// yet. The insert uses ON CONFLICT DO NOTHING and re-selects, so two
/// concurrent first reads settle on one row.
pub async fn fetch_or_seed(
	db: &Db,
	org_id: Uuid,
	model_version: &str,
	now: OffsetDateTime,
) -> Result<DimensionWeightsRow> {
	if let Some(row) = fetch(db, org_id, model_version).await? {
		return Ok(row);
	}

	let defaults = DimensionWeights::default();

	sqlx::query(
		"\
INSERT INTO dimension_weights (
	org_id,
	model_version,
	historical_effectiveness,
	responsiveness_reliability,
	recency_momentum,
	opportunity_fit,
	capacity_load,
	max_risk_drag_penalty,
	high_band_threshold,
	medium_band_threshold,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (org_id, model_version) DO NOTHING",
	)
	.bind(org_id)
	.bind(model_version)
	.bind(defaults.historical_effectiveness)
	.bind(defaults.responsiveness_reliability)
	.bind(defaults.recency_momentum)
	.bind(defaults.opportunity_fit)
	.bind(defaults.capacity_load)
	.bind(defaults.max_risk_drag_penalty)
	.bind(defaults.high_band_threshold)
	.bind(defaults.medium_band_threshold)
	.bind(now)
	.execute(&db.pool)
	.await?;

	let row = fetch(db, org_id, model_version).await?;

	row.ok_or_else(|| {
		crate::Error::NotFound(format!("dimension_weights for org {org_id} after seeding"))
	})
}

async fn fetch(
	db: &Db,
	org_id: Uuid,
	model_version: &str,
) -> Result<Option<DimensionWeightsRow>> {
	let row = sqlx::query_as::<_, DimensionWeightsRow>(
		"SELECT * FROM dimension_weights WHERE org_id = $1 AND model_version = $2",
	)
	.bind(org_id)
	.bind(model_version)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}
