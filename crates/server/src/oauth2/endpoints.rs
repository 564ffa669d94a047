//! OAuth2 HTTP endpoints.
//!
//! - Token endpoint (password and refresh_token grants)
//! - Token revocation
//! - UserInfo
//! - Discovery document

use crate::entity::oauth2_token;
use crate::error::TokenError;
use crate::oauth2::claims::{
    CLAIM_CLINIC_ID, CLAIM_NAME, CLAIM_ROLE, CLAIM_SUBJECT, CLAIM_USER_ID, ClaimsPrincipal,
    Destination,
};
use crate::oauth2::issuer::{GrantType, TokenRequest};
use crate::oauth2::stores::RefreshTokenContext;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::state::{MintError, OAuth2State};
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .routes(routes!(revoke))
        .routes(routes!(userinfo))
        .with_state(state)
}

/// Discovery lives at the server root, outside the `/oauth2` prefix.
pub fn discovery_router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(openid_configuration))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    pub grant_type: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
}

/// Access-token claims of the bearer.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub revocation_endpoint: String,
    pub grant_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

fn oauth_error(status: StatusCode, error: &str, description: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            error_description: description,
        }),
    )
        .into_response()
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let status = match &self {
            TokenError::InvalidClient => StatusCode::UNAUTHORIZED,
            TokenError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            TokenError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let description = match &self {
            TokenError::Store(_) => None,
            other => Some(other.to_string()),
        };
        oauth_error(status, self.error_code(), description)
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, headers, params), fields(grant_type = %params.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange credentials or a refresh token for an access token",
    description = "Issues an access/refresh token pair.\n\n\
                   **Supported grant types:**\n\
                   - `password`: username and password of a clinic user\n\
                   - `refresh_token`: a previously issued refresh token (rotated on use)\n\n\
                   **Client authentication:** HTTP Basic or `client_id`/`client_secret` in the body. \
                   Public clients only send `client_id`.",
    request_body(
        content = TokenForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid grant or unsupported grant type", body = ErrorResponse),
        (status = 401, description = "Unknown client or bad client credentials", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<TokenForm>,
) -> Response {
    let (client_id, client_secret) = extract_client_credentials(&headers, &params);

    let request = TokenRequest {
        grant_type: GrantType::parse(&params.grant_type),
        client_id,
        client_secret,
        username: params.username,
        password: params.password,
        refresh_token: params.refresh_token,
        scopes: TokenRequest::parse_scopes(params.scope.as_deref()),
    };

    let context = RefreshTokenContext::new(
        state.db.clone(),
        request.refresh_token.clone(),
        request.client_id.clone(),
    );
    // Dropping this future (client gone) cancels the guard's token.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = match state.issuer.issue_token(&request, &context, &cancel).await {
        Ok(result) => result,
        Err(e) => {
            match &e {
                TokenError::Store(db) => tracing::error!("Token request failed: {}", db),
                other => tracing::warn!(error = %other, "Token request rejected"),
            }
            return e.into_response();
        }
    };

    let Some(principal) = result.principal else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            Some(format!(
                "The grant type '{}' is not supported",
                request.grant_type.as_str()
            )),
        );
    };

    // The refresh grant may omit client_id; the issuer has already matched
    // the principal's subject against the authenticated client.
    let Some(client_id) = request
        .client_id
        .clone()
        .or_else(|| principal.claim(CLAIM_SUBJECT).map(str::to_string))
    else {
        return TokenError::InvalidClient.into_response();
    };

    let stored = match (&request.grant_type, request.refresh_token.as_deref()) {
        (GrantType::RefreshToken, Some(presented)) => {
            state.rotate_tokens(&client_id, &principal, presented).await
        }
        _ => state.store_tokens(&client_id, &principal).await,
    };
    let issued = match stored {
        Ok(issued) => issued,
        Err(MintError::RefreshTokenConsumed) => {
            tracing::warn!(client_id = %client_id, "Refresh token replayed");
            return TokenError::InvalidRefreshToken.into_response();
        }
        Err(e) => {
            tracing::error!("Failed to store token: {}", e);
            return oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None);
        }
    };

    tracing::info!(
        client_id = %client_id,
        user_id = principal.claim(CLAIM_USER_ID).unwrap_or_default(),
        "Issued token"
    );

    (
        StatusCode::OK,
        Json(TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            refresh_token: issued.refresh_token,
            scope: issued.scope,
        }),
    )
        .into_response()
}

/// Token revocation endpoint (RFC 7009).
#[tracing::instrument(skip(state, params))]
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke Token",
    summary = "Revoke an access or refresh token",
    description = "Revokes the token pair the given token belongs to. Returns 200 OK even if the token \
                   was already revoked or doesn't exist (RFC 7009).",
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token revocation request"
    ),
    responses(
        (status = 200, description = "Token revoked successfully (or was already invalid)"),
    )
)]
pub async fn revoke(State(state): State<OAuth2State>, Form(params): Form<RevokeRequest>) -> Response {
    use sea_orm::ActiveValue::Set;

    let (first, second) = match params.token_type_hint.as_deref() {
        Some("refresh_token") => (
            oauth2_token::Column::RefreshToken,
            oauth2_token::Column::AccessToken,
        ),
        _ => (
            oauth2_token::Column::AccessToken,
            oauth2_token::Column::RefreshToken,
        ),
    };

    let token = match oauth2_token::Entity::find()
        .filter(first.eq(&params.token))
        .one(state.db.as_ref())
        .await
    {
        Ok(None) => {
            oauth2_token::Entity::find()
                .filter(second.eq(&params.token))
                .one(state.db.as_ref())
                .await
        }
        other => other,
    };

    match token {
        Ok(Some(t)) if !t.is_revoked() => {
            let mut active: oauth2_token::ActiveModel = t.into();
            active.revoked_at = Set(Some(time::OffsetDateTime::now_utc()));
            if let Err(e) = active.update(state.db.as_ref()).await {
                tracing::error!("Failed to revoke token: {}", e);
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Database error during token revocation: {}", e);
        }
    }

    StatusCode::OK.into_response()
}

/// UserInfo endpoint: the access-token claims of the presented bearer token.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/userinfo",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 UserInfo",
    summary = "Get the claims bound to the presented access token",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Claims of the authenticated principal", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
    )
)]
pub async fn userinfo(State(state): State<OAuth2State>, headers: HeaderMap) -> Response {
    let Some(access_token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return oauth_error(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            Some("Missing or invalid Authorization header".to_string()),
        );
    };

    let token = match oauth2_token::Entity::find()
        .filter(oauth2_token::Column::AccessToken.eq(access_token))
        .one(state.db.as_ref())
        .await
    {
        Ok(Some(t)) if t.is_valid() => t,
        _ => return oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", None),
    };

    match ClaimsPrincipal::from_json(&token.claims) {
        Ok(principal) => {
            let claims = principal.identity.for_destination(Destination::AccessToken);
            let claim = |t: &str| claims.get(t).map(|v| v.to_string());
            let response = UserInfoResponse {
                sub: claim(CLAIM_SUBJECT).unwrap_or_default(),
                name: claim(CLAIM_NAME),
                user_id: claim(CLAIM_USER_ID),
                clinic_id: claim(CLAIM_CLINIC_ID),
                role: claim(CLAIM_ROLE),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(token_id = %token.id, "Stored principal is unreadable: {}", e);
            oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
        }
    }
}

/// Discovery document.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Discovery",
    summary = "Authorization server metadata",
    responses(
        (status = 200, description = "Server metadata document", body = OpenIdConfiguration),
    )
)]
pub async fn openid_configuration(State(state): State<OAuth2State>) -> Json<OpenIdConfiguration> {
    Json(OpenIdConfiguration {
        issuer: state.issuer_url.clone(),
        token_endpoint: format!("{}/oauth2/token", state.issuer_url),
        userinfo_endpoint: format!("{}/oauth2/userinfo", state.issuer_url),
        revocation_endpoint: format!("{}/oauth2/revoke", state.issuer_url),
        grant_types_supported: vec!["password".to_string(), "refresh_token".to_string()],
        scopes_supported: vec![
            "openid".to_string(),
            "profile".to_string(),
            "offline_access".to_string(),
        ],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
            "none".to_string(),
        ],
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn extract_client_credentials(
    headers: &HeaderMap,
    params: &TokenForm,
) -> (Option<String>, Option<String>) {
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth)
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    (params.client_id.clone(), params.client_secret.clone())
}
