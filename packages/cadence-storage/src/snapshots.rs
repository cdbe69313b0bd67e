//! Append-only snapshot history plus the single-row-per-key latest pointer.
//! The pointer is written in the same transaction as the snapshot insert, so
//! it can never reference a snapshot that is not visible. Latest lookups
//! always go through the pointer; history is never scanned for "current".

use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::ScorePayload;

use crate::{
	Result,
	db::Db,
	error,
	models::{LeaderboardSnapshotRow, PerformanceSnapshotRow},
};

/// Write one immutable snapshot and move the latest pointer to it, as one
/// unit of work. Returns the new snapshot id.
pub async fn record_snapshot(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
	model_version: &str,
	payload: &ScorePayload,
	created_at: OffsetDateTime,
) -> Result<Uuid> {
	let snapshot_id = Uuid::new_v4();
	let drivers = serde_json::to_value(&payload.drivers)
		.map_err(|err| crate::Error::InvalidArgument(format!("Failed to encode drivers: {err}")))?;
	let mut tx = db.pool.begin().await?;

	sqlx::query(
		"\
INSERT INTO performance_snapshots (
	snapshot_id,
	org_id,
	agent_id,
	model_version,
	overall_score,
	band,
	historical_effectiveness,
	responsiveness_reliability,
	recency_momentum,
	opportunity_fit,
	capacity_load,
	risk_drag_penalty,
	drivers,
	feature_summary,
	period_start,
	period_end,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
	)
	.bind(snapshot_id)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.bind(payload.overall_score)
	.bind(payload.band.as_str())
	.bind(payload.dimensions.historical_effectiveness)
	.bind(payload.dimensions.responsiveness_reliability)
	.bind(payload.dimensions.recency_momentum)
	.bind(payload.dimensions.opportunity_fit)
	.bind(payload.dimensions.capacity_load)
	.bind(payload.dimensions.risk_drag_penalty)
	.bind(&drivers)
	.bind(&payload.feature_summary)
	.bind(payload.period_start)
	.bind(payload.period_end)
	.bind(created_at)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"\
INSERT INTO latest_pointers (org_id, agent_id, model_version, snapshot_id, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (org_id, agent_id, model_version) DO UPDATE
SET
	snapshot_id = EXCLUDED.snapshot_id,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.bind(snapshot_id)
	.bind(created_at)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(snapshot_id)
}

/// Current snapshot via the latest pointer, or None. A missing snapshot
/// schema degrades to None so dashboards stay renderable.
pub async fn get_latest(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
	model_version: &str,
) -> Result<Option<PerformanceSnapshotRow>> {
	let result = sqlx::query_as::<_, PerformanceSnapshotRow>(
		"\
SELECT s.*
FROM latest_pointers p
JOIN performance_snapshots s ON s.snapshot_id = p.snapshot_id
WHERE p.org_id = $1 AND p.agent_id = $2 AND p.model_version = $3",
	)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.fetch_optional(&db.pool)
	.await;

	match result {
		Ok(row) => Ok(row),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, %agent_id, "Snapshot schema absent. Returning no indicator.");

			Ok(None)
		},
		Err(err) => Err(err.into()),
	}
}

/// Snapshot history since a cutoff, ordered by creation time ascending.
pub async fn list_history(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
	model_version: &str,
	since: OffsetDateTime,
) -> Result<Vec<PerformanceSnapshotRow>> {
	let result = sqlx::query_as::<_, PerformanceSnapshotRow>(
		"\
SELECT *
FROM performance_snapshots
WHERE org_id = $1 AND agent_id = $2 AND model_version = $3 AND created_at >= $4
ORDER BY created_at ASC",
	)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.bind(since)
	.fetch_all(&db.pool)
	.await;

	match result {
		Ok(rows) => Ok(rows),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, %agent_id, "Snapshot schema absent. Returning empty history.");

			Ok(Vec::new())
		},
		Err(err) => Err(err.into()),
	}
}

/// Latest snapshots for every agent in the org, joined with profile data
/// and optionally scoped to one office or team. Filtering beyond scope,
/// sorting, and pagination happen in the service layer.
pub async fn list_latest_for_org(
	db: &Db,
	org_id: Uuid,
	model_version: &str,
	office_id: Option<Uuid>,
	team_id: Option<Uuid>,
) -> Result<Vec<LeaderboardSnapshotRow>> {
	let result = sqlx::query_as::<_, LeaderboardSnapshotRow>(
		"\
SELECT
	s.agent_id,
	a.display_name,
	a.office_id,
	a.team_id,
	s.overall_score,
	s.band,
	s.drivers,
	s.created_at
FROM latest_pointers p
JOIN performance_snapshots s ON s.snapshot_id = p.snapshot_id
JOIN agent_profiles a ON a.agent_id = p.agent_id AND a.org_id = p.org_id
WHERE p.org_id = $1
	AND p.model_version = $2
	AND ($3::uuid IS NULL OR a.office_id = $3)
	AND ($4::uuid IS NULL OR a.team_id = $4)",
	)
	.bind(org_id)
	.bind(model_version)
	.bind(office_id)
	.bind(team_id)
	.fetch_all(&db.pool)
	.await;

	match result {
		Ok(rows) => Ok(rows),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, "Snapshot or profile schema absent. Returning empty leaderboard.");

			Ok(Vec::new())
		},
		Err(err) => Err(err.into()),
	}
}
