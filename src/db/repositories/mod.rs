//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod campaign;
pub mod user;

pub use campaign::{CampaignRepository, SqlxCampaignRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// The database error underneath an `anyhow` chain, if there is one
fn database_error(err: &anyhow::Error) -> Option<&(dyn sqlx::error::DatabaseError + 'static)> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .and_then(|sqlx_err| match sqlx_err {
            sqlx::Error::Database(db_err) => Some(db_err.as_ref()),
            _ => None,
        })
}

/// Whether a repository error was caused by a unique constraint
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    database_error(err).is_some_and(|db_err| db_err.is_unique_violation())
}

/// Whether a repository error was caused by a foreign key constraint
pub(crate) fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    database_error(err).is_some_and(|db_err| db_err.is_foreign_key_violation())
}
