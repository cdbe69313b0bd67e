//! Full-organization recompute: weights read once, signals pulled in
//! bounded batches, the org market profile derived from the whole batch
//! set, then one pure compose + isolated persist per agent. A single
//! agent's failure never aborts its siblings; pool exhaustion aborts the
//! remaining work and reports a partial run.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::{DimensionWeights, ScoreInputs, ScoringWindow, baseline, compose_score};
use cadence_storage::{snapshots, weights};

use crate::{CadenceService, Result};

#[derive(Clone, Debug, Serialize)]
pub struct RecomputeReport {
	pub org_id: Uuid,
	pub model_version: String,
	pub agents_total: usize,
	pub agents_scored: usize,
	pub agents_failed: usize,
	pub snapshots_skipped: usize,
	/// True when the run stopped early (pool exhaustion) and some agents
	/// were not scored this generation.
	pub partial: bool,
}

impl CadenceService {
	/// Idempotent to re-run: every invocation produces a new snapshot
	/// generation for the organization.
	pub async fn recompute_organization(&self, org_id: Uuid) -> Result<RecomputeReport> {
		let model_version = self.model_version().to_string();
		let now = OffsetDateTime::now_utc();
		let window = ScoringWindow::ending_at(now, self.cfg.scoring.lookback_days);
		let roster = self.source.roster(org_id).await?;
		let mut report = RecomputeReport {
			org_id,
			model_version: model_version.clone(),
			agents_total: roster.len(),
			agents_scored: 0,
			agents_failed: 0,
			snapshots_skipped: 0,
			partial: false,
		};

		if roster.is_empty() {
			tracing::info!(%org_id, "No agents in roster. Nothing to recompute.");

			return Ok(report);
		}

		// Weights are read (and lazily seeded) once per run and passed by
		// value into the pure scorer; mid-run configuration changes are
		// intentionally not observed.
		let weights = match weights::fetch_or_seed(&self.db, org_id, &model_version, now).await {
			Ok(row) => row.weights(),
			Err(cadence_storage::Error::Sqlx(err)) if cadence_storage::is_undefined_table(&err) => {
				tracing::warn!(%org_id, "dimension_weights table absent. Using default weights.");

				DimensionWeights::default()
			},
			Err(err) => return Err(err.into()),
		};
		let agent_ids: Vec<Uuid> = roster.iter().map(|profile| profile.agent_id).collect();
		let mut all_signals = std::collections::HashMap::new();

		for chunk in agent_ids.chunks(self.cfg.scoring.batch_size) {
			match self.source.collect(org_id, chunk, &window).await {
				Ok(batch) => all_signals.extend(batch),
				Err(err) if err.is_exhausted() => {
					tracing::warn!(
						%org_id,
						error = %err,
						"Connection pool exhausted during aggregation. Aborting remaining batches."
					);

					report.partial = true;

					break;
				},
				Err(err) => return Err(err),
			}
		}

		let profile = baseline::market_profile(all_signals.values());
		let mut writes_degraded = false;

		for agent in &roster {
			let Some(signals) = all_signals.get(&agent.agent_id) else {
				// Not aggregated before the run went partial.
				continue;
			};
			let fit = baseline::estimate_baseline_fit(signals, &profile);
			let payload = compose_score(ScoreInputs {
				signals,
				baseline: &fit,
				weights: &weights,
				period_start: window.lookback_start,
				period_end: now,
			});

			if writes_degraded {
				report.snapshots_skipped += 1;

				continue;
			}

			match snapshots::record_snapshot(
				&self.db,
				org_id,
				agent.agent_id,
				&model_version,
				&payload,
				now,
			)
			.await
			{
				Ok(snapshot_id) => {
					tracing::debug!(
						%org_id,
						agent_id = %agent.agent_id,
						%snapshot_id,
						score = payload.overall_score,
						"Recorded performance snapshot."
					);

					report.agents_scored += 1;
				},
				Err(cadence_storage::Error::Sqlx(err))
					if cadence_storage::is_undefined_table(&err) =>
				{
					tracing::warn!(
						%org_id,
						"Snapshot schema absent. Skipping snapshot writes for this organization."
					);

					writes_degraded = true;
					report.snapshots_skipped += 1;
				},
				Err(cadence_storage::Error::Sqlx(err))
					if cadence_storage::is_pool_exhausted(&err) =>
				{
					tracing::warn!(
						%org_id,
						agent_id = %agent.agent_id,
						"Connection pool exhausted during persistence. Returning partial run."
					);

					report.partial = true;

					break;
				},
				Err(err) => {
					tracing::error!(
						%org_id,
						agent_id = %agent.agent_id,
						error = %err,
						"Failed to persist snapshot. Continuing with remaining agents."
					);

					report.agents_failed += 1;
				},
			}
		}

		tracing::info!(
			%org_id,
			scored = report.agents_scored,
			failed = report.agents_failed,
			skipped = report.snapshots_skipped,
			partial = report.partial,
			"Recompute run finished."
		);

		Ok(report)
	}
}
