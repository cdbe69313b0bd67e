//! Content-addressable context-fit cache. Rows are write-once per key; a
//! duplicate insert from a racing first request is dropped by ON CONFLICT
//! because both writers computed the same value from the same history.

use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::FitReason;

use crate::{Result, db::Db, error, models::ContextFitRow};

/// Cached fit for one normalized context, or None. Read errors from an
/// unavailable cache table degrade to a miss so the caller falls through
/// to compute.
pub async fn find(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
	model_version: &str,
	context_key: &str,
) -> Result<Option<ContextFitRow>> {
	let result = sqlx::query_as::<_, ContextFitRow>(
		"\
SELECT *
FROM context_fit_records
WHERE org_id = $1 AND agent_id = $2 AND model_version = $3 AND context_key = $4",
	)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.bind(context_key)
	.fetch_optional(&db.pool)
	.await;

	match result {
		Ok(row) => Ok(row),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, %agent_id, "Context cache schema absent. Treating as miss.");

			Ok(None)
		},
		Err(err) => Err(err.into()),
	}
}

pub async fn insert(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
	model_version: &str,
	context_key: &str,
	fit_score: f64,
	reasons: &[FitReason],
	computed_at: OffsetDateTime,
) -> Result<()> {
	let reasons = serde_json::to_value(reasons)
		.map_err(|err| crate::Error::InvalidArgument(format!("Failed to encode reasons: {err}")))?;

	sqlx::query(
		"\
INSERT INTO context_fit_records (
	org_id,
	agent_id,
	model_version,
	context_key,
	fit_score,
	reasons,
	computed_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (org_id, agent_id, model_version, context_key) DO NOTHING",
	)
	.bind(org_id)
	.bind(agent_id)
	.bind(model_version)
	.bind(context_key)
	.bind(fit_score)
	.bind(&reasons)
	.bind(computed_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}
