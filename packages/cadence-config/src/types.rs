use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub scoring: Scoring,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scoring {
	/// Tag identifying one scoring-formula generation. Changing the formula
	/// requires a new tag; old snapshots are never overwritten.
	#[serde(default = "default_model_version")]
	pub model_version: String,
	/// Agents per concurrent signal read group during a recompute run.
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,
	/// Trailing window for listing/closing history, in days.
	#[serde(default = "default_lookback_days")]
	pub lookback_days: i64,
}

pub(crate) fn default_model_version() -> String {
	"API_v1".to_string()
}

pub(crate) fn default_batch_size() -> usize {
	6
}

pub(crate) fn default_lookback_days() -> i64 {
	365
}
