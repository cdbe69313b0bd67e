pub mod context_cache;
pub mod db;
pub mod models;
pub mod schema;
pub mod signals;
pub mod snapshots;
pub mod weights;

mod error;

pub use error::{Error, is_pool_exhausted, is_undefined_table};

pub type Result<T, E = Error> = std::result::Result<T, E>;
