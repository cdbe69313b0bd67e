pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Access denied: {message}")]
	AccessDenied { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Resource exhausted: {message}")]
	Exhausted { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub fn is_exhausted(&self) -> bool {
		matches!(self, Self::Exhausted { .. })
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		if cadence_storage::is_pool_exhausted(&err) {
			Self::Exhausted { message: err.to_string() }
		} else {
			Self::Storage { message: err.to_string() }
		}
	}
}

impl From<cadence_storage::Error> for Error {
	fn from(err: cadence_storage::Error) -> Self {
		match err {
			cadence_storage::Error::Sqlx(inner) => inner.into(),
			cadence_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			cadence_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}
