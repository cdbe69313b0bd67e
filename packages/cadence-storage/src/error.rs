pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
}

/// True when the error is Postgres telling us a relation does not exist
/// (code 42P01), which older deployments hit for CRM tables that have not
/// been rolled out yet. Those sub-aggregates degrade to their zero
/// defaults instead of failing the run.
pub fn is_undefined_table(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("42P01"),
		_ => false,
	}
}

/// Connection-pool exhaustion aborts the remaining recompute batch instead
/// of retrying indefinitely.
pub fn is_pool_exhausted(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::PoolTimedOut)
}
