//! OAuth2 state management.
//!
//! Holds the token issuer and persists the token pairs minted for the
//! principals it produces.

use crate::config::OAuth2Config;
use crate::entity::oauth2_token;
use crate::oauth2::claims::{CLAIM_SUBJECT, CLAIM_USER_ID, ClaimsPrincipal};
use crate::oauth2::issuer::TokenIssuer;
use crate::oauth2::password::generate_token;
use crate::oauth2::stores::{DbApplicationStore, DbUserStore};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

pub type DbTokenIssuer = TokenIssuer<DbApplicationStore, DbUserStore>;

#[derive(Debug, Error)]
pub enum MintError {
    #[error("Random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
    #[error("Principal could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Principal has no {0} claim")]
    MissingClaim(&'static str),
    #[error("Refresh token was already used or revoked")]
    RefreshTokenConsumed,
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// A freshly stored token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub scope: String,
}

/// OAuth2 state containing all components needed for the token endpoint.
#[derive(Clone)]
pub struct OAuth2State {
    pub issuer: DbTokenIssuer,
    pub db: Arc<DatabaseConnection>,
    /// Base URL for the OAuth2 server (used for issuer in discovery)
    pub issuer_url: String,
    /// Access token lifetime in seconds
    pub access_token_lifetime: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_lifetime: i64,
}

impl OAuth2State {
    pub fn new(db: Arc<DatabaseConnection>, config: &OAuth2Config) -> Self {
        Self {
            issuer: TokenIssuer::new(
                DbApplicationStore::new(db.clone()),
                DbUserStore::new(db.clone()),
            ),
            db,
            issuer_url: config.issuer_url.clone(),
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
        }
    }

    /// Mint and store an access/refresh pair bound to `principal`.
    #[tracing::instrument(skip(self, principal))]
    pub async fn store_tokens(
        &self,
        client_id: &str,
        principal: &ClaimsPrincipal,
    ) -> Result<IssuedTokens, MintError> {
        self.insert_tokens(self.db.as_ref(), client_id, principal)
            .await
    }

    /// Revoke `refresh_token` and store its replacement pair in one transaction.
    ///
    /// Only the request that flips `revoked_at` gets new tokens; concurrent
    /// requests presenting the same refresh token fail with
    /// [`MintError::RefreshTokenConsumed`].
    #[tracing::instrument(skip_all, fields(client_id = %client_id))]
    pub async fn rotate_tokens(
        &self,
        client_id: &str,
        principal: &ClaimsPrincipal,
        refresh_token: &str,
    ) -> Result<IssuedTokens, MintError> {
        let txn = self.db.begin().await?;
        let revoked = oauth2_token::Entity::update_many()
            .col_expr(
                oauth2_token::Column::RevokedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(oauth2_token::Column::RefreshToken.eq(refresh_token))
            .filter(oauth2_token::Column::RevokedAt.is_null())
            .exec(&txn)
            .await?;
        if revoked.rows_affected == 0 {
            txn.rollback().await?;
            return Err(MintError::RefreshTokenConsumed);
        }
        let issued = self.insert_tokens(&txn, client_id, principal).await?;
        txn.commit().await?;
        Ok(issued)
    }

    async fn insert_tokens<C: ConnectionTrait>(
        &self,
        conn: &C,
        client_id: &str,
        principal: &ClaimsPrincipal,
    ) -> Result<IssuedTokens, MintError> {
        let user_id = principal
            .claim(CLAIM_USER_ID)
            .or_else(|| principal.claim(CLAIM_SUBJECT))
            .ok_or(MintError::MissingClaim(CLAIM_USER_ID))?
            .to_string();
        let scope = principal
            .identity
            .scopes()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let now = OffsetDateTime::now_utc();
        let access_token = generate_token()?;
        let refresh_token = generate_token()?;

        let token = oauth2_token::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            access_token: Set(access_token.clone()),
            refresh_token: Set(Some(refresh_token.clone())),
            token_type: Set("Bearer".to_string()),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id),
            scope: Set(scope.clone()),
            claims: Set(principal.to_json()?),
            access_token_expires_at: Set(now + time::Duration::seconds(self.access_token_lifetime)),
            refresh_token_expires_at: Set(Some(
                now + time::Duration::seconds(self.refresh_token_lifetime),
            )),
            created_at: Set(now),
            revoked_at: Set(None),
        };
        token.insert(conn).await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in: self.access_token_lifetime,
            scope,
        })
    }
}
