//! Bearer-token authentication and the JSON error shape shared by the REST API.

use crate::AppResources;
use crate::entity::oauth2_token;
use crate::error::ServiceError;
use crate::oauth2::ClaimsPrincipal;
use crate::oauth2::claims::{CLAIM_CLINIC_ID, CLAIM_ROLE, CLAIM_SUBJECT, CLAIM_USER_ID};
use crate::services::Caller;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity carried by a valid access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub clinic_id: Option<String>,
    pub role: String,
    /// Scopes granted by the token
    pub scopes: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn require_role(&self, role: &str) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Requires the '{role}' role")))
        }
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id.clone(),
            clinic_id: self.clinic_id.clone(),
            role: self.role.clone(),
        }
    }

    fn from_principal(principal: &ClaimsPrincipal, scopes: Vec<String>) -> Option<Self> {
        let user_id = principal
            .claim(CLAIM_USER_ID)
            .or_else(|| principal.claim(CLAIM_SUBJECT))?;
        Some(Self {
            user_id: user_id.to_string(),
            clinic_id: principal.claim(CLAIM_CLINIC_ID).map(str::to_string),
            role: principal.claim(CLAIM_ROLE).unwrap_or_default().to_string(),
            scopes,
        })
    }
}

/// Error body returned by every REST endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code (e.g., "invalid_token", "not_found")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ApiError {
    fn new(error: &str, description: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description,
        }
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new("invalid_token", Some(description.into()))
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::new("forbidden", Some(description.into()))
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new("not_found", Some(description.into()))
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::new("conflict", Some(description.into()))
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::new("bad_request", Some(description.into()))
    }

    pub fn server_error() -> Self {
        Self::new("server_error", None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::PasswordHash(msg) => {
                tracing::error!("Password hashing failed: {}", msg);
                ApiError::server_error()
            }
            ServiceError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::server_error()
            }
        }
    }
}

/// Axum extractor that validates `Authorization: Bearer <token>` against the
/// `oauth2_token` table and restores the identity stored with the token.
///
/// ```ignore
/// async fn handler(OAuth2Auth(user): OAuth2Auth) -> impl IntoResponse {
///     format!("Hello, {}", user.user_id)
/// }
/// ```
pub struct OAuth2Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for OAuth2Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                ApiError::server_error()
            })?;

        let access_token = match parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            Some(header) => header.strip_prefix("Bearer ").ok_or_else(|| {
                ApiError::invalid_token("Authorization header must use Bearer scheme")
            })?,
            None => return Err(ApiError::invalid_token("Missing Authorization header")),
        };

        let token = oauth2_token::Entity::find()
            .filter(oauth2_token::Column::AccessToken.eq(access_token))
            .one(resources.db.as_ref())
            .await
            .map_err(|e| {
                tracing::error!("Database error looking up token: {}", e);
                ApiError::server_error()
            })?
            .ok_or_else(|| ApiError::invalid_token("Token not found"))?;

        if token.is_revoked() {
            return Err(ApiError::invalid_token("Token has been revoked"));
        }
        if token.is_access_token_expired() {
            return Err(ApiError::invalid_token("Token has expired"));
        }

        let principal = ClaimsPrincipal::from_json(&token.claims).map_err(|e| {
            tracing::error!(token_id = %token.id, "Stored principal is unreadable: {}", e);
            ApiError::server_error()
        })?;
        let user = AuthenticatedUser::from_principal(&principal, token.scopes_list())
            .ok_or_else(|| ApiError::invalid_token("Token carries no subject"))?;
        Ok(OAuth2Auth(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::IdentityClaims;

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::invalid_token("t"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("t"), StatusCode::FORBIDDEN),
            (ApiError::not_found("t"), StatusCode::NOT_FOUND),
            (ApiError::conflict("t"), StatusCode::CONFLICT),
            (ApiError::bad_request("t"), StatusCode::BAD_REQUEST),
            (ApiError::server_error(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_service_errors_map_to_api_codes() {
        let err: ApiError = ServiceError::Conflict("taken".into()).into();
        assert_eq!(err.error, "conflict");
        let err: ApiError = ServiceError::Validation("bad".into()).into();
        assert_eq!(err.error, "bad_request");
        let err: ApiError = ServiceError::not_found("shift").into();
        assert_eq!(err.error, "not_found");
        assert_eq!(err.error_description.as_deref(), Some("shift not found"));
    }

    #[test]
    fn test_user_from_principal_prefers_user_id_claim() {
        let mut identity = IdentityClaims::new();
        identity.set_claim(CLAIM_SUBJECT, Some("web-client"));
        identity.set_claim(CLAIM_USER_ID, Some("user-1"));
        identity.set_claim(CLAIM_CLINIC_ID, Some("clinic-1"));
        identity.set_claim(CLAIM_ROLE, Some("Doctor"));
        let principal = ClaimsPrincipal::new("test", identity);

        let user = AuthenticatedUser::from_principal(&principal, vec!["openid".into()])
            .expect("user");
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.clinic_id.as_deref(), Some("clinic-1"));
        assert!(user.has_scope("openid"));
        assert!(user.require_role("Doctor").is_ok());
        assert!(user.require_role("Admin").is_err());
        assert_eq!(user.caller().role, "Doctor");
    }
}
