//! Account operations: registration, login, refresh rotation, logout.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};
use super::refresh::RefreshRotator;
use super::tokens::TokenIssuer;
use crate::models::auth::{DEFAULT_ROLE, NewUser, TokenPair, User};
use crate::store::{Store, StoreError};

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() {
            return Err(AuthError::Validation("username is required".into()));
        }
        if !self.email.contains('@') {
            return Err(AuthError::Validation("email is invalid".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Authentication flows over a shared store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    issuer: TokenIssuer,
    rotator: RefreshRotator,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, keys: JwtKeys) -> Self {
        Self {
            issuer: TokenIssuer::new(store.clone(), keys),
            rotator: RefreshRotator::new(store.clone()),
            store,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        self.issuer.keys()
    }

    pub fn rotator(&self) -> &RefreshRotator {
        &self.rotator
    }

    /// Create an account with the default role.
    pub async fn register(&self, input: Registration) -> Result<User, AuthError> {
        input.validate()?;
        let username = input.username.trim().to_string();

        if self
            .store
            .username_or_email_taken(&username, &input.email)
            .await
            .map_err(AuthError::Lookup)?
        {
            return Err(AuthError::Conflict(
                "username or email already exists".into(),
            ));
        }

        let role = self
            .store
            .find_role_by_name(DEFAULT_ROLE)
            .await
            .map_err(AuthError::Lookup)?;
        let password_hash = hash_password(&input.password)?;
        let new_user = NewUser {
            username,
            email: input.email,
            password_hash,
        };
        let created = match &role {
            Some(role) => self.store.create_user_with_role(new_user, role.id).await,
            None => self.store.create_user(new_user).await,
        };
        let user = created.map_err(|e| match e {
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => AuthError::Persistence(other),
        })?;
        if role.is_none() {
            warn!(user_id = %user.id, "default role missing, user registered without roles");
        }

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Authenticate by username or email and issue a token pair.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller.
    pub async fn login(&self, login: &str, password: &str) -> Result<TokenPair, AuthError> {
        let Some(found) = self
            .store
            .find_user_by_login(login)
            .await
            .map_err(AuthError::Lookup)?
        else {
            debug!("login for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &found.password_hash) {
            debug!(user_id = %found.user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issuer.issue_token_pair(found.user.id).await?;
        info!(user_id = %found.user.id, "user logged in");
        Ok(pair)
    }

    /// Rotate a refresh token: validate, consume, reissue for the owner.
    ///
    /// If reissue fails after the old token was consumed, the old token stays
    /// dead and the client must log in again. A token whose owner is gone is
    /// consumed and reported as not found.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let record = self.rotator.validate(refresh_token).await?;
        if !self.rotator.invalidate(refresh_token).await? {
            // Lost a race with a concurrent rotation of the same token.
            return Err(AuthError::RefreshTokenNotFound);
        }
        let owner = self
            .store
            .find_user(record.user_id)
            .await
            .map_err(AuthError::Lookup)?;
        if owner.is_none() {
            debug!(user_id = %record.user_id, "refresh for deleted user");
            return Err(AuthError::RefreshTokenNotFound);
        }
        match self.issuer.issue_token_pair(record.user_id).await {
            Ok(pair) => {
                debug!(user_id = %record.user_id, "refresh token rotated");
                Ok(pair)
            }
            Err(AuthError::NotFound(_)) => Err(AuthError::RefreshTokenNotFound),
            Err(e) => Err(e),
        }
    }

    /// Invalidate a refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let removed = self.rotator.invalidate(refresh_token).await?;
        debug!(removed, "logout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::verify_access_token;
    use crate::seed::{SeedOptions, seed_defaults};
    use crate::store::{MemoryStore, RefreshTokenStore, RoleStore, UserStore};

    async fn service() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        seed_defaults(store.as_ref(), &SeedOptions::default())
            .await
            .unwrap();
        let svc = AuthService::new(store.clone(), JwtKeys::from_secret(b"svc").unwrap());
        (store, svc)
    }

    fn alice(password: &str) -> Registration {
        Registration {
            username: "alice".into(),
            email: "alice@x.com".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let (_store, svc) = service().await;
        let user = svc.register(alice("secret1")).await.unwrap();

        let pair = svc.login("alice", "secret1").await.unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_eq!(pair.expires_in, 3600);

        let claims = verify_access_token(&pair.access_token, svc.keys()).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.roles, vec!["user".to_string()]);
        assert!(claims.allows("task", "create"));

        // email works as the login name too
        svc.login("alice@x.com", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn wrong_password_issues_nothing() {
        let (store, svc) = service().await;
        svc.register(alice("secret1")).await.unwrap();

        let err = svc.login("alice", "wrongpass").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(matches!(
            svc.login("nobody", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(store.refresh_token_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn password_length_boundary() {
        let (_store, svc) = service().await;
        assert!(matches!(
            svc.register(alice("12345")).await,
            Err(AuthError::Validation(_))
        ));
        svc.register(alice("123456")).await.unwrap();
    }

    #[tokio::test]
    async fn registration_validation_and_conflict() {
        let (_store, svc) = service().await;
        let mut bad = alice("secret1");
        bad.email = "no-at-sign".into();
        assert!(matches!(
            svc.register(bad).await,
            Err(AuthError::Validation(_))
        ));

        svc.register(alice("secret1")).await.unwrap();
        let mut dup_email = alice("secret1");
        dup_email.username = "alice2".into();
        assert!(matches!(
            svc.register(dup_email).await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_single_use() {
        let (store, svc) = service().await;
        svc.register(alice("secret1")).await.unwrap();
        let first = svc.login("alice", "secret1").await.unwrap();

        let second = svc.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(matches!(
            svc.refresh(&first.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        ));
        assert_eq!(store.refresh_token_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_refresh_has_one_winner() {
        let (_store, svc) = service().await;
        svc.register(alice("secret1")).await.unwrap();
        let pair = svc.login("alice", "secret1").await.unwrap();

        let (a, b) = tokio::join!(
            svc.refresh(&pair.refresh_token),
            svc.refresh(&pair.refresh_token)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn malformed_refresh_token() {
        let (_store, svc) = service().await;
        assert!(matches!(
            svc.refresh("abc").await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (store, svc) = service().await;
        svc.register(alice("secret1")).await.unwrap();
        let pair = svc.login("alice", "secret1").await.unwrap();

        svc.logout(&pair.refresh_token).await.unwrap();
        svc.logout(&pair.refresh_token).await.unwrap();
        assert_eq!(store.refresh_token_count().await.unwrap(), 0);
        assert!(svc.refresh(&pair.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_not_found() {
        let (store, svc) = service().await;
        let user = svc.register(alice("secret1")).await.unwrap();
        let pair = svc.login("alice", "secret1").await.unwrap();

        store.soft_delete_user(user.id).await.unwrap();
        assert!(matches!(
            svc.refresh(&pair.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        ));
        assert_eq!(store.refresh_token_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn registration_assigns_default_role_atomically() {
        let (store, svc) = service().await;
        let user = svc.register(alice("secret1")).await.unwrap();
        let roles = store.roles_for_user(user.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, DEFAULT_ROLE);
    }
}
