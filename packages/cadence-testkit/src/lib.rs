mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr};

use sqlx::{
	ConnectOptions, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// Base DSN for DB-backed tests, or None to skip them.
pub fn env_dsn() -> Option<String> {
	env::var("CADENCE_PG_DSN").ok().filter(|value| !value.trim().is_empty())
}

/// A uuid-named throwaway database created from a base DSN and dropped on
/// cleanup, so gated tests never collide or leak state.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options: PgConnectOptions = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse CADENCE_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("cadence_test_{}", Uuid::new_v4().simple());
		let create_sql = format!(r#"CREATE DATABASE "{}""#, name);

		admin_conn
			.execute(create_sql.as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.clone().database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, cleaned: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn cleanup(mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		let mut admin_conn = self
			.admin_options
			.clone()
			.connect()
			.await
			.map_err(|err| Error::Message(format!("Failed to connect for cleanup: {err}.")))?;
		let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, self.name);

		admin_conn
			.execute(drop_sql.as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

		self.cleaned = true;

		Ok(())
	}
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_error = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match options.clone().connect().await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_error = Some(err),
		}
	}

	Err(Error::Message(format!(
		"Failed to connect to an admin database: {}.",
		last_error.map(|err| err.to_string()).unwrap_or_else(|| "no candidates".to_string())
	)))
}
