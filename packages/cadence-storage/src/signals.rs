//! The signal aggregator: grouped counts and aggregates over the CRM's
//! tables for a set of agents and a scoring window. Read-only. Every agent
//! asked about gets an entry in the returned map, zero-defaulted when no
//! rows match. A sub-aggregate whose backing table is absent in an older
//! deployment degrades to its zero default instead of failing the run; any
//! other database error propagates.

use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::{AgentSignals, ClosedDeal, ScoringWindow};

use crate::{Result, db::Db, error, models::AgentProfileRow};

/// The org's agent roster. An absent profiles table degrades to an empty
/// roster (nothing to score).
pub async fn list_profiles(db: &Db, org_id: Uuid) -> Result<Vec<AgentProfileRow>> {
	let result = sqlx::query_as::<_, AgentProfileRow>(
		"\
SELECT agent_id, org_id, user_id, display_name, office_id, team_id
FROM agent_profiles
WHERE org_id = $1
ORDER BY display_name ASC",
	)
	.bind(org_id)
	.fetch_all(&db.pool)
	.await;

	match result {
		Ok(rows) => Ok(rows),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, "agent_profiles table absent. Returning empty roster.");

			Ok(Vec::new())
		},
		Err(err) => Err(err.into()),
	}
}

pub async fn find_profile(
	db: &Db,
	org_id: Uuid,
	agent_id: Uuid,
) -> Result<Option<AgentProfileRow>> {
	let result = sqlx::query_as::<_, AgentProfileRow>(
		"\
SELECT agent_id, org_id, user_id, display_name, office_id, team_id
FROM agent_profiles
WHERE org_id = $1 AND agent_id = $2",
	)
	.bind(org_id)
	.bind(agent_id)
	.fetch_optional(&db.pool)
	.await;

	match result {
		Ok(row) => Ok(row),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, "agent_profiles table absent. Profile lookup degraded.");

			Ok(None)
		},
		Err(err) => Err(err.into()),
	}
}

/// Buyer/seller lead counts per agent over the window, for orientation.
pub async fn lead_mix(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	since: OffsetDateTime,
) -> Result<HashMap<Uuid, (u64, u64)>> {
	let result = sqlx::query_as::<_, (Uuid, i64, i64)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE lead_type = 'buyer'),
	count(*) FILTER (WHERE lead_type = 'seller')
FROM leads
WHERE org_id = $1 AND agent_id = ANY($2) AND created_at >= $3
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(since)
	.fetch_all(&db.pool)
	.await;
	let rows = degrade(result, org_id, "leads")?;

	Ok(rows
		.into_iter()
		.map(|(agent_id, buyer, seller)| (agent_id, (as_count(buyer), as_count(seller))))
		.collect())
}

/// Closed-transaction prices per agent since the cutoff, for price-band
/// participation counts.
pub async fn closed_prices(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	since: OffsetDateTime,
) -> Result<HashMap<Uuid, Vec<f64>>> {
	let result = sqlx::query_as::<_, (Uuid, f64)>(
		"\
SELECT agent_id, close_price
FROM transactions
WHERE org_id = $1
	AND agent_id = ANY($2)
	AND status = 'closed'
	AND closed_at >= $3
	AND close_price IS NOT NULL",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(since)
	.fetch_all(&db.pool)
	.await;
	let rows = degrade(result, org_id, "transactions")?;
	let mut out: HashMap<Uuid, Vec<f64>> = HashMap::new();

	for (agent_id, price) in rows {
		out.entry(agent_id).or_default().push(price);
	}

	Ok(out)
}

/// Pull the full signal bundle for a group of agents. One grouped query per
/// concern; results merge into a map holding a (possibly zero-defaulted)
/// entry for every requested agent.
pub async fn collect_signals(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
) -> Result<HashMap<Uuid, AgentSignals>> {
	let mut out: HashMap<Uuid, AgentSignals> =
		agent_ids.iter().map(|agent_id| (*agent_id, AgentSignals::default())).collect();

	merge_leads(db, org_id, agent_ids, window, &mut out).await?;
	merge_tasks(db, org_id, agent_ids, window, &mut out).await?;
	merge_listings(db, org_id, agent_ids, window, &mut out).await?;
	merge_transactions(db, org_id, agent_ids, window, &mut out).await?;
	merge_first_touch(db, org_id, agent_ids, window, &mut out).await?;
	merge_touchpoints(db, org_id, agent_ids, window, &mut out).await?;
	merge_risk_events(db, org_id, agent_ids, window, &mut out).await?;

	Ok(out)
}

async fn merge_leads(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let result = sqlx::query_as::<_, (Uuid, i64, i64, i64, i64, i64, i64, i64)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE created_at >= $3),
	count(*) FILTER (WHERE converted_at IS NOT NULL AND converted_at >= $3),
	count(*) FILTER (WHERE created_at >= $4),
	count(*) FILTER (
		WHERE status = 'new'
			AND created_at <= $5
			AND (last_activity_at IS NULL OR last_activity_at <= $5)
	),
	count(*) FILTER (WHERE status NOT IN ('closed', 'lost') AND created_at >= $6),
	count(*) FILTER (WHERE lead_type = 'buyer' AND created_at >= $3),
	count(*) FILTER (WHERE lead_type = 'seller' AND created_at >= $3)
FROM leads
WHERE org_id = $1 AND agent_id = ANY($2)
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.lookback_start)
	.bind(window.recent_start)
	.bind(window.stale_cutoff)
	.bind(window.rolling_90_start)
	.fetch_all(&db.pool)
	.await;
	let rows = degrade(result, org_id, "leads")?;

	for (agent_id, worked, converted, created_30d, stale, open_90d, buyer, seller) in rows {
		let Some(signals) = out.get_mut(&agent_id) else {
			continue;
		};

		signals.leads_worked = as_count(worked);
		signals.leads_converted = as_count(converted);
		signals.leads_created_30d = as_count(created_30d);
		signals.stale_new_leads = as_count(stale);
		signals.open_leads_90d = as_count(open_90d);
		signals.buyer_leads = as_count(buyer);
		signals.seller_leads = as_count(seller);
	}

	Ok(())
}

async fn merge_tasks(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let result = sqlx::query_as::<_, (Uuid, i64, i64, i64)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE status = 'completed' AND completed_at >= $3),
	count(*) FILTER (WHERE status = 'completed' AND completed_at >= $4 AND completed_at < $3),
	count(*) FILTER (WHERE status <> 'completed' AND due_at < $5)
FROM workflow_tasks
WHERE org_id = $1 AND agent_id = ANY($2)
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.recent_start)
	.bind(window.prior_start)
	.bind(window.now)
	.fetch_all(&db.pool)
	.await;
	let rows = degrade(result, org_id, "workflow_tasks")?;

	for (agent_id, completed, completed_prior, overdue) in rows {
		let Some(signals) = out.get_mut(&agent_id) else {
			continue;
		};

		signals.tasks_completed_30d = as_count(completed);
		signals.tasks_completed_prior_30d = as_count(completed_prior);
		signals.tasks_overdue_open = as_count(overdue);
	}

	Ok(())
}

async fn merge_listings(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let by_state = sqlx::query_as::<_, (Uuid, String, i64)>(
		"\
SELECT agent_id, upper(trim(state)), count(*)
FROM listings
WHERE org_id = $1 AND agent_id = ANY($2) AND created_at >= $3 AND state IS NOT NULL
GROUP BY agent_id, upper(trim(state))",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.lookback_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, state, count) in degrade(by_state, org_id, "listings")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.listings_by_state.insert(state, as_count(count));
		}
	}

	let by_property = sqlx::query_as::<_, (Uuid, String, i64)>(
		"\
SELECT agent_id, lower(trim(property_type)), count(*)
FROM listings
WHERE org_id = $1 AND agent_id = ANY($2) AND created_at >= $3 AND property_type IS NOT NULL
GROUP BY agent_id, lower(trim(property_type))",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.lookback_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, property_type, count) in degrade(by_property, org_id, "listings")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.listings_by_property_type.insert(property_type, as_count(count));
		}
	}

	let active = sqlx::query_as::<_, (Uuid, i64)>(
		"\
SELECT agent_id, count(*)
FROM listings
WHERE org_id = $1 AND agent_id = ANY($2) AND status = 'active'
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, count) in degrade(active, org_id, "listings")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.active_listings = as_count(count);
		}
	}

	Ok(())
}

async fn merge_transactions(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let active = sqlx::query_as::<_, (Uuid, i64)>(
		"\
SELECT agent_id, count(*)
FROM transactions
WHERE org_id = $1 AND agent_id = ANY($2) AND status IN ('active', 'pending')
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, count) in degrade(active, org_id, "transactions")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.active_transactions = as_count(count);
		}
	}

	let closed = sqlx::query_as::<_, (Uuid, f64, OffsetDateTime)>(
		"\
SELECT agent_id, close_price, closed_at
FROM transactions
WHERE org_id = $1
	AND agent_id = ANY($2)
	AND status = 'closed'
	AND closed_at >= $3
	AND close_price IS NOT NULL",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.lookback_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, price, closed_at) in degrade(closed, org_id, "transactions")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.closed_deals.push(ClosedDeal { price, closed_at });
		}
	}

	let flagged = sqlx::query_as::<_, (Uuid, i64, Option<OffsetDateTime>)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE compliance_flagged_at IS NOT NULL),
	min(compliance_flagged_at)
FROM transactions
WHERE org_id = $1 AND agent_id = ANY($2)
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, count, oldest) in degrade(flagged, org_id, "transactions")? {
		let Some(signals) = out.get_mut(&agent_id) else {
			continue;
		};

		signals.noncompliant_transactions = as_count(count);
		signals.oldest_flag_age_days = oldest
			.map(|flagged_at| (window.now - flagged_at).whole_seconds() as f64 / 86_400.0)
			.filter(|days| *days > 0.0);
	}

	Ok(())
}

async fn merge_first_touch(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let result = sqlx::query_as::<_, (Uuid, i64, i64, Option<f64>)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE satisfied),
	count(*) FILTER (WHERE NOT satisfied),
	percentile_cont(0.5) WITHIN GROUP (ORDER BY resolved_in_minutes)
FROM first_touch_timers
WHERE org_id = $1 AND agent_id = ANY($2) AND created_at >= $3
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.lookback_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, satisfied, breached, median) in degrade(result, org_id, "first_touch_timers")? {
		let Some(signals) = out.get_mut(&agent_id) else {
			continue;
		};

		signals.first_touch_satisfied = as_count(satisfied);
		signals.first_touch_breached = as_count(breached);
		signals.first_touch_median_minutes = median;
	}

	Ok(())
}

async fn merge_touchpoints(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let result = sqlx::query_as::<_, (Uuid, i64, i64)>(
		"\
SELECT
	agent_id,
	count(*) FILTER (WHERE occurred_at >= $3),
	count(*) FILTER (WHERE occurred_at >= $4 AND occurred_at < $3)
FROM touchpoints
WHERE org_id = $1 AND agent_id = ANY($2) AND occurred_at >= $4
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.recent_start)
	.bind(window.prior_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, recent, prior) in degrade(result, org_id, "touchpoints")? {
		let Some(signals) = out.get_mut(&agent_id) else {
			continue;
		};

		signals.touchpoints_30d = as_count(recent);
		signals.touchpoints_prior_30d = as_count(prior);
	}

	Ok(())
}

async fn merge_risk_events(
	db: &Db,
	org_id: Uuid,
	agent_ids: &[Uuid],
	window: &ScoringWindow,
	out: &mut HashMap<Uuid, AgentSignals>,
) -> Result<()> {
	let result = sqlx::query_as::<_, (Uuid, i64)>(
		"\
SELECT agent_id, count(*)
FROM risk_interventions
WHERE org_id = $1 AND agent_id = ANY($2) AND created_at >= $3
GROUP BY agent_id",
	)
	.bind(org_id)
	.bind(agent_ids)
	.bind(window.rolling_90_start)
	.fetch_all(&db.pool)
	.await;

	for (agent_id, count) in degrade(result, org_id, "risk_interventions")? {
		if let Some(signals) = out.get_mut(&agent_id) {
			signals.risk_interventions_90d = as_count(count);
		}
	}

	Ok(())
}

fn degrade<T>(result: sqlx::Result<Vec<T>>, org_id: Uuid, table: &str) -> Result<Vec<T>> {
	match result {
		Ok(rows) => Ok(rows),
		Err(err) if error::is_undefined_table(&err) => {
			tracing::warn!(%org_id, table, "CRM table absent. Sub-aggregate degraded to zero.");

			Ok(Vec::new())
		},
		Err(err) => Err(err.into()),
	}
}

fn as_count(value: i64) -> u64 {
	value.max(0) as u64
}
