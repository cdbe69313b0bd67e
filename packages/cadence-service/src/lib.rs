pub mod context_fit;
pub mod indicator;
pub mod leaderboard;
pub mod recompute;
pub mod trend;

mod error;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use cadence_config::Config;
use cadence_domain::{AgentSignals, ScoringWindow};
use cadence_storage::{db::Db, models::AgentProfileRow, signals};

pub use context_fit::{ActorRole, ContextFitRequest, ContextFitResponse};
pub use error::{Error, Result};
pub use indicator::Indicator;
pub use leaderboard::{LeaderboardPage, LeaderboardParams, LeaderboardRow};
pub use recompute::RecomputeReport;
pub use trend::{TrendPoint, TrendResponse};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Seam over the CRM's query/aggregate capability. The engine's read paths
/// and the recompute run go through this trait so the scorer itself only
/// ever sees already-aggregated numbers, and tests can substitute an
/// in-memory source.
pub trait SignalSource
where
	Self: Send + Sync,
{
	fn roster<'a>(&'a self, org_id: Uuid) -> BoxFuture<'a, Result<Vec<AgentProfileRow>>>;

	fn profile<'a>(
		&'a self,
		org_id: Uuid,
		agent_id: Uuid,
	) -> BoxFuture<'a, Result<Option<AgentProfileRow>>>;

	fn collect<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		window: &'a ScoringWindow,
	) -> BoxFuture<'a, Result<HashMap<Uuid, AgentSignals>>>;

	fn lead_mix<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<Uuid, (u64, u64)>>>;

	fn closed_prices<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<Uuid, Vec<f64>>>>;
}

struct DbSignalSource {
	db: Db,
}

impl SignalSource for DbSignalSource {
	fn roster<'a>(&'a self, org_id: Uuid) -> BoxFuture<'a, Result<Vec<AgentProfileRow>>> {
		Box::pin(async move { Ok(signals::list_profiles(&self.db, org_id).await?) })
	}

	fn profile<'a>(
		&'a self,
		org_id: Uuid,
		agent_id: Uuid,
	) -> BoxFuture<'a, Result<Option<AgentProfileRow>>> {
		Box::pin(async move { Ok(signals::find_profile(&self.db, org_id, agent_id).await?) })
	}

	fn collect<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		window: &'a ScoringWindow,
	) -> BoxFuture<'a, Result<HashMap<Uuid, AgentSignals>>> {
		Box::pin(async move {
			Ok(signals::collect_signals(&self.db, org_id, agent_ids, window).await?)
		})
	}

	fn lead_mix<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<Uuid, (u64, u64)>>> {
		Box::pin(async move { Ok(signals::lead_mix(&self.db, org_id, agent_ids, since).await?) })
	}

	fn closed_prices<'a>(
		&'a self,
		org_id: Uuid,
		agent_ids: &'a [Uuid],
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<Uuid, Vec<f64>>>> {
		Box::pin(async move {
			Ok(signals::closed_prices(&self.db, org_id, agent_ids, since).await?)
		})
	}
}

pub struct CadenceService {
	pub cfg: Config,
	pub db: Db,
	pub source: Arc<dyn SignalSource>,
}
impl CadenceService {
	pub fn new(cfg: Config, db: Db) -> Self {
		let source = Arc::new(DbSignalSource { db: db.clone() });

		Self { cfg, db, source }
	}

	pub fn with_source(cfg: Config, db: Db, source: Arc<dyn SignalSource>) -> Self {
		Self { cfg, db, source }
	}

	pub(crate) fn model_version(&self) -> &str {
		&self.cfg.scoring.model_version
	}
}
