//! Identity service
//!
//! Credential lifecycle for users:
//! - registration with an Argon2id password hash (role `user`)
//! - login by email and password
//! - email availability checks
//! - avatar location updates
//!
//! Plaintext passwords never leave this module and are never logged. Session
//! issuance happens outside the core; a successful login only returns the
//! authenticated user.

use crate::db::repositories::{is_unique_violation, UserRepository};
use crate::models::{User, UserRole};
use crate::services::password::{CredentialHasher, PasswordError};
use std::sync::Arc;

/// Error types for identity operations
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// No user with this id
    #[error("User not found: {0}")]
    NotFound(i64),

    /// Unknown email or wrong password; the two are not distinguished
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Another account already owns the email
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Hashing or verification could not run
    #[error("Password hashing failed: {0}")]
    HashingFailure(#[from] PasswordError),

    /// The record store failed
    #[error("Store failure: {0}")]
    StoreFailure(#[from] anyhow::Error),
}

/// Input for registering a user
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub occupation: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        occupation: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            occupation: occupation.into(),
            password: password.into(),
        }
    }
}

/// Input for logging in
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Identity service for user registration and authentication
pub struct IdentityService {
    user_repo: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
}

impl IdentityService {
    /// Create a new identity service
    pub fn new(user_repo: Arc<dyn UserRepository>, hasher: CredentialHasher) -> Self {
        Self { user_repo, hasher }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `EmailTaken` if an account already owns the email, including when a
    ///   concurrent registration wins the race to the unique index
    /// - `HashingFailure` if the password cannot be hashed
    /// - `StoreFailure` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, IdentityError> {
        if self.user_repo.get_by_email(&input.email).await?.is_some() {
            return Err(IdentityError::EmailTaken(input.email));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = User::new(
            input.name,
            input.email.clone(),
            input.occupation,
            password_hash,
            UserRole::User,
        );

        let created = self.user_repo.create(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                IdentityError::EmailTaken(input.email)
            } else {
                IdentityError::StoreFailure(e)
            }
        })?;

        tracing::debug!("Registered user {}", created.id);
        Ok(created)
    }

    /// Authenticate by email and password.
    ///
    /// An unknown email still costs one hash verification, so callers cannot
    /// tell it apart from a wrong password by result or by timing. A stored
    /// hash that cannot be parsed is treated the same way and reported only
    /// through a warning carrying the user id.
    pub async fn login(&self, input: LoginInput) -> Result<User, IdentityError> {
        let Some(user) = self.user_repo.get_by_email(&input.email).await? else {
            self.hasher.verify_dummy(&input.password);
            return Err(IdentityError::InvalidCredentials);
        };

        let verified = match self.hasher.verify(&input.password, &user.password_hash) {
            Ok(verified) => verified,
            Err(PasswordError::MalformedHash(_)) => {
                tracing::warn!("User {} has an unreadable password hash", user.id);
                self.hasher.verify_dummy(&input.password);
                false
            }
            Err(e) => return Err(e.into()),
        };

        if !verified {
            return Err(IdentityError::InvalidCredentials);
        }

        tracing::debug!("User {} logged in", user.id);
        Ok(user)
    }

    /// Whether no account owns `email` yet
    pub async fn is_email_available(&self, email: &str) -> Result<bool, IdentityError> {
        Ok(self.user_repo.get_by_email(email).await?.is_none())
    }

    /// Record where a user's avatar is stored and return the updated user
    pub async fn save_avatar(
        &self,
        user_id: i64,
        location: impl Into<String>,
    ) -> Result<User, IdentityError> {
        let mut user = self.get_by_id(user_id).await?;
        user.avatar_file_name = Some(location.into());

        let updated = self
            .user_repo
            .update(&user)
            .await?
            .ok_or(IdentityError::NotFound(user_id))?;

        tracing::debug!("Saved avatar for user {}", user_id);
        Ok(updated)
    }

    /// Get a user by id
    pub async fn get_by_id(&self, user_id: i64) -> Result<User, IdentityError> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(IdentityError::NotFound(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::password::test_hasher;

    async fn setup_test_service() -> IdentityService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        IdentityService::new(SqlxUserRepository::boxed(pool), test_hasher())
    }

    fn ada() -> RegisterInput {
        RegisterInput::new("Ada", "a@x.com", "Engineer", "secret123")
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = setup_test_service().await;

        let user = service.register(ada()).await.expect("Failed to register");
        assert!(user.id > 0);
        assert_eq!(user.role, UserRole::User);
        assert_ne!(user.password_hash, "secret123");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let logged_in = service
            .login(LoginInput::new("a@x.com", "secret123"))
            .await
            .expect("Failed to login");
        assert_eq!(logged_in.id, user.id);

        let wrong = service.login(LoginInput::new("a@x.com", "wrong")).await;
        assert!(matches!(wrong, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_matches_wrong_password() {
        let service = setup_test_service().await;
        service.register(ada()).await.unwrap();

        let unknown = service
            .login(LoginInput::new("nobody@x.com", "secret123"))
            .await
            .expect_err("Unknown email should fail");
        let wrong = service
            .login(LoginInput::new("a@x.com", "not-it"))
            .await
            .expect_err("Wrong password should fail");

        assert!(matches!(unknown, IdentityError::InvalidCredentials));
        assert!(matches!(wrong, IdentityError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = setup_test_service().await;
        service.register(ada()).await.unwrap();

        let result = service
            .register(RegisterInput::new("Other", "a@x.com", "", "password"))
            .await;

        assert!(matches!(result, Err(IdentityError::EmailTaken(email)) if email == "a@x.com"));
    }

    #[tokio::test]
    async fn test_is_email_available() {
        let service = setup_test_service().await;

        assert!(service.is_email_available("new@x.com").await.unwrap());
        service
            .register(RegisterInput::new("New", "new@x.com", "", "password"))
            .await
            .unwrap();
        assert!(!service.is_email_available("new@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_avatar() {
        let service = setup_test_service().await;
        let user = service.register(ada()).await.unwrap();

        let updated = service
            .save_avatar(user.id, "images/ada.png")
            .await
            .expect("Failed to save avatar");
        assert_eq!(updated.avatar_file_name.as_deref(), Some("images/ada.png"));

        let reloaded = service.get_by_id(user.id).await.unwrap();
        assert_eq!(reloaded.avatar_file_name.as_deref(), Some("images/ada.png"));
    }

    #[tokio::test]
    async fn test_save_avatar_unknown_user() {
        let service = setup_test_service().await;

        let result = service.save_avatar(999, "images/none.png").await;

        assert!(matches!(result, Err(IdentityError::NotFound(999))));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.get_by_id(5).await,
            Err(IdentityError::NotFound(5))
        ));
    }

    #[tokio::test]
    async fn test_login_with_malformed_stored_hash_is_invalid_credentials() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxUserRepository::boxed(pool);
        repo.create(&User::new(
            "Legacy".to_string(),
            "legacy@x.com".to_string(),
            String::new(),
            "not-a-phc-string".to_string(),
            UserRole::User,
        ))
        .await
        .unwrap();
        let service = IdentityService::new(repo, test_hasher());

        let corrupt = service
            .login(LoginInput::new("legacy@x.com", "anything"))
            .await
            .expect_err("Corrupt hash should not log in");
        let unknown = service
            .login(LoginInput::new("nobody@x.com", "anything"))
            .await
            .expect_err("Unknown email should fail");

        assert!(matches!(corrupt, IdentityError::InvalidCredentials));
        assert_eq!(corrupt.to_string(), unknown.to_string());
    }
}
