//! Read-through context-fit: normalize the requested context, derive its
//! content address, and serve from the cache when a row exists. A cache
//! miss computes the fit from the agent's own history and writes the row
//! back; a failed write is logged and swallowed so the caller still gets
//! the computed value.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use cadence_domain::{FitReason, FitRequestContext, ScoringWindow, context};
use cadence_storage::context_cache;

use crate::{CadenceService, Error, Result};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
	Agent,
	TeamLead,
	Broker,
	Admin,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContextFitRequest {
	pub actor_user_id: Uuid,
	pub actor_role: ActorRole,
	pub context: FitRequestContext,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContextFitResponse {
	pub agent_id: Uuid,
	pub model_version: String,
	pub context_key: String,
	pub fit_score: f64,
	#[serde(with = "cadence_domain::time_serde")]
	pub computed_at: OffsetDateTime,
	pub reasons: Vec<FitReason>,
	pub cached: bool,
}

/// Agents may only look at their own context fit; every other role sees
/// the whole organization. Enforced here at the service boundary, outside
/// the fit math.
pub fn ensure_actor_may_view(
	role: ActorRole,
	actor_user_id: Uuid,
	owner_user_id: Uuid,
) -> Result<()> {
	if role == ActorRole::Agent && actor_user_id != owner_user_id {
		return Err(Error::AccessDenied {
			message: "Agents may only request their own context fit.".to_string(),
		});
	}

	Ok(())
}

impl CadenceService {
	pub async fn context_fit(
		&self,
		org_id: Uuid,
		agent_id: Uuid,
		request: ContextFitRequest,
	) -> Result<ContextFitResponse> {
		let profile = self.source.profile(org_id, agent_id).await?.ok_or_else(|| {
			Error::NotFound { message: format!("Agent {agent_id} in organization {org_id}.") }
		})?;

		ensure_actor_may_view(request.actor_role, request.actor_user_id, profile.user_id)?;

		let normalized = context::normalize_context(&request.context);
		let key = context::context_key(&normalized);
		let model_version = self.model_version().to_string();

		// An unreadable cache degrades to compute-on-every-call.
		let cached = match context_cache::find(&self.db, org_id, agent_id, &model_version, &key)
			.await
		{
			Ok(row) => row,
			Err(err) => {
				tracing::warn!(%org_id, %agent_id, error = %err, "Context cache read failed. Treating as miss.");

				None
			},
		};

		if let Some(row) = cached {
			let reasons: Vec<FitReason> =
				serde_json::from_value(row.reasons).unwrap_or_default();

			return Ok(ContextFitResponse {
				agent_id,
				model_version,
				context_key: row.context_key,
				fit_score: row.fit_score,
				computed_at: row.computed_at,
				reasons,
				cached: true,
			});
		}

		let now = OffsetDateTime::now_utc();
		let window = ScoringWindow::ending_at(now, self.cfg.scoring.lookback_days);
		let agent_ids = [agent_id];
		let signals_map = self.source.collect(org_id, &agent_ids, &window).await?;
		let signals = signals_map.get(&agent_id).cloned().unwrap_or_default();
		let (fit_score, reasons) = context::context_fit_score(&signals, &normalized);

		// Racing first requests compute identical values from the same
		// history, so a lost duplicate insert is benign; a failed write
		// only costs a recompute on the next request.
		if let Err(err) = context_cache::insert(
			&self.db,
			org_id,
			agent_id,
			&model_version,
			&key,
			fit_score,
			&reasons,
			now,
		)
		.await
		{
			tracing::warn!(%org_id, %agent_id, error = %err, "Context cache write failed. Returning computed value.");
		}

		Ok(ContextFitResponse {
			agent_id,
			model_version,
			context_key: key,
			fit_score,
			computed_at: now,
			reasons,
			cached: false,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn agents_may_only_view_their_own_fit() {
		let owner = Uuid::new_v4();
		let stranger = Uuid::new_v4();

		assert!(ensure_actor_may_view(ActorRole::Agent, owner, owner).is_ok());
		assert!(matches!(
			ensure_actor_may_view(ActorRole::Agent, stranger, owner),
			Err(Error::AccessDenied { .. })
		));
	}

	#[test]
	fn elevated_roles_may_view_any_agent() {
		let owner = Uuid::new_v4();
		let actor = Uuid::new_v4();

		for role in [ActorRole::TeamLead, ActorRole::Broker, ActorRole::Admin] {
			assert!(ensure_actor_may_view(role, actor, owner).is_ok());
		}
	}
}
