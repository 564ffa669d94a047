//! Collaborators consulted by the token issuer, and their SeaORM-backed
//! implementations.

use crate::entity::{application_user, oauth2_client, oauth2_token, user_role};
use crate::oauth2::claims::ClaimsPrincipal;
use crate::oauth2::password::verify_password;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use std::future::Future;
use std::sync::Arc;

/// A registered client application, as seen by the token issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientApplication {
    pub client_id: String,
    pub display_name: String,
    /// Argon2 hash of the secret; `None` for public clients
    pub secret_hash: Option<String>,
}

impl ClientApplication {
    /// Public clients accept any (or no) secret; confidential clients need theirs.
    pub fn verify_secret(&self, provided: Option<&str>) -> bool {
        match (&self.secret_hash, provided) {
            (None, _) => true,
            (Some(hash), Some(provided)) => verify_password(provided, hash),
            (Some(_), None) => false,
        }
    }
}

impl From<oauth2_client::Model> for ClientApplication {
    fn from(client: oauth2_client::Model) -> Self {
        Self {
            client_id: client.id,
            display_name: client.display_name,
            secret_hash: client.secret_hash,
        }
    }
}

/// A user account, as seen by the token issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub normalized_user_name: String,
    pub clinic_id: Option<String>,
    pub password_hash: Option<String>,
}

impl From<application_user::Model> for UserAccount {
    fn from(user: application_user::Model) -> Self {
        Self {
            id: user.id,
            normalized_user_name: user.normalized_user_name,
            clinic_id: user.clinic_id,
            password_hash: user.password_hash,
        }
    }
}

/// Outcome of re-authenticating the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthenticateResult {
    Success(ClaimsPrincipal),
    Failure(String),
}

pub trait ApplicationStore: Send + Sync {
    fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<Option<ClientApplication>, DbErr>> + Send;
}

pub trait UserStore: Send + Sync {
    fn find_by_normalized_username(
        &self,
        normalized_user_name: &str,
    ) -> impl Future<Output = Result<Option<UserAccount>, DbErr>> + Send;

    /// Roles of the user, in the order the store keeps them.
    fn get_roles(&self, user_id: &str) -> impl Future<Output = Result<Vec<String>, DbErr>> + Send;

    fn check_password(&self, user: &UserAccount, password: &str) -> bool;
}

/// Request-scoped re-authentication of a presented token.
pub trait AuthenticationContext: Send + Sync {
    fn authenticate(&self, scheme: &str) -> impl Future<Output = AuthenticateResult> + Send;
}

/// Client store backed by the `oauth2_client` table.
#[derive(Clone)]
pub struct DbApplicationStore {
    db: Arc<DatabaseConnection>,
}

impl DbApplicationStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl ApplicationStore for DbApplicationStore {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ClientApplication>, DbErr> {
        Ok(oauth2_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?
            .map(ClientApplication::from))
    }
}

/// User store backed by the `application_user` and `user_role` tables.
#[derive(Clone)]
pub struct DbUserStore {
    db: Arc<DatabaseConnection>,
}

impl DbUserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl UserStore for DbUserStore {
    async fn find_by_normalized_username(
        &self,
        normalized_user_name: &str,
    ) -> Result<Option<UserAccount>, DbErr> {
        Ok(application_user::Entity::find()
            .filter(application_user::Column::NormalizedUserName.eq(normalized_user_name))
            .one(self.db.as_ref())
            .await?
            .map(UserAccount::from))
    }

    async fn get_roles(&self, user_id: &str) -> Result<Vec<String>, DbErr> {
        let roles = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(user_role::Column::Position)
            .all(self.db.as_ref())
            .await?;
        Ok(roles.into_iter().map(|r| r.role).collect())
    }

    fn check_password(&self, user: &UserAccount, password: &str) -> bool {
        user.password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash))
    }
}

/// Re-authenticates the refresh token presented with the current token request.
///
/// One instance per inbound request; it only carries that request's parameters.
pub struct RefreshTokenContext {
    db: Arc<DatabaseConnection>,
    refresh_token: Option<String>,
    client_id: Option<String>,
}

impl RefreshTokenContext {
    pub fn new(
        db: Arc<DatabaseConnection>,
        refresh_token: Option<String>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            db,
            refresh_token,
            client_id,
        }
    }
}

impl AuthenticationContext for RefreshTokenContext {
    #[tracing::instrument(skip(self))]
    async fn authenticate(&self, scheme: &str) -> AuthenticateResult {
        let Some(refresh_token) = self.refresh_token.as_deref() else {
            return AuthenticateResult::Failure("refresh_token is required".into());
        };

        let token = match oauth2_token::Entity::find()
            .filter(oauth2_token::Column::RefreshToken.eq(refresh_token))
            .one(self.db.as_ref())
            .await
        {
            Ok(Some(t)) => t,
            Ok(None) => return AuthenticateResult::Failure("refresh token not found".into()),
            Err(e) => {
                tracing::error!("Database error looking up refresh token: {}", e);
                return AuthenticateResult::Failure("refresh token lookup failed".into());
            }
        };

        if token.is_revoked() || token.is_refresh_token_expired() {
            return AuthenticateResult::Failure("refresh token is revoked or expired".into());
        }

        if let Some(client_id) = self.client_id.as_deref()
            && client_id != token.client_id
        {
            return AuthenticateResult::Failure("refresh token belongs to another client".into());
        }

        match ClaimsPrincipal::from_json(&token.claims) {
            Ok(principal) => AuthenticateResult::Success(principal),
            Err(e) => {
                tracing::error!(token_id = %token.id, "Stored principal is unreadable: {}", e);
                AuthenticateResult::Failure("stored principal is unreadable".into())
            }
        }
    }
}
