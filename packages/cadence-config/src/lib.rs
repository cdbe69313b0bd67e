mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Postgres, Scoring, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.scoring.model_version.trim().is_empty() {
		return Err(Error::Validation {
			message: "scoring.model_version must be non-empty.".to_string(),
		});
	}
	if cfg.scoring.batch_size == 0 {
		return Err(Error::Validation {
			message: "scoring.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.scoring.batch_size > 32 {
		return Err(Error::Validation {
			message: "scoring.batch_size must be 32 or less.".to_string(),
		});
	}
	if cfg.scoring.lookback_days < 30 {
		return Err(Error::Validation {
			message: "scoring.lookback_days must be at least 30.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.scoring.model_version = cfg.scoring.model_version.trim().to_string();
}
