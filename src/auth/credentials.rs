use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::password;
use crate::db::PgPool;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::schema::users;

#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

/// Credential verification capability. The token service never looks at
/// secrets itself; login goes through this seam so the backing identity
/// source can be swapped without touching auth issuing or validation.
pub trait CredentialStore: Send + Sync {
    /// Returns the verified identity, or `None` when the subject is
    /// unknown or the secret does not match. Only infrastructure failures
    /// surface as errors.
    fn verify(&self, username: &str, password: &str) -> AppResult<Option<UserIdentity>>;
}

/// Verifies credentials against the `users` table with argon2 hashes.
pub struct DbCredentialStore {
    pool: PgPool,
}

impl DbCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for DbCredentialStore {
    fn verify(&self, username: &str, password: &str) -> AppResult<Option<UserIdentity>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|err| AppError::store_unavailable(format!("database pool error: {err}")))?;

        let user: Option<User> = users::table
            .filter(users::username.eq(username))
            .first(&mut conn)
            .optional()?;

        let Some(user) = user else {
            return Ok(None);
        };

        let valid = password::verify_password(password, &user.password_hash)
            .map_err(AppError::internal)?;

        Ok(valid.then(|| UserIdentity {
            id: user.id,
            username: user.username,
            role: user.role,
        }))
    }
}
