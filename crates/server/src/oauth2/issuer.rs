//! Token issuance for the password and refresh-token grants.
//!
//! The issuer resolves who is asking and what the resulting identity should
//! carry. Minting, storing and rotating the actual token strings is left to
//! the HTTP endpoint.

use crate::error::TokenError;
use crate::entity::application_user::normalize_user_name;
use crate::oauth2::claims::{
    CLAIM_CLINIC_ID, CLAIM_NAME, CLAIM_ROLE, CLAIM_SUBJECT, CLAIM_USER_ID, ClaimsPrincipal,
    Destination, IdentityClaims,
};
use crate::oauth2::stores::{
    ApplicationStore, AuthenticateResult, AuthenticationContext, UserStore,
};
use tokio_util::sync::CancellationToken;

/// Scheme used to sign in issued principals and to re-authenticate refresh tokens.
pub const DEFAULT_SCHEME: &str = "Hebi.OAuth2.Server";

/// Authentication type stamped on identities built for the password grant.
pub const BEARER_AUTHENTICATION_TYPE: &str = "AuthenticationTypes.Federation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantType {
    Password,
    RefreshToken,
    Other(String),
}

impl GrantType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "password" => GrantType::Password,
            "refresh_token" => GrantType::RefreshToken,
            other => GrantType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Other(other) => other,
        }
    }
}

/// An incoming token request, already decoded from the wire.
#[derive(Clone, Debug)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
}

impl TokenRequest {
    /// Split a space-delimited `scope` parameter, keeping first occurrences in order.
    pub fn parse_scopes(raw: Option<&str>) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        for scope in raw.unwrap_or_default().split_whitespace() {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }
        scopes
    }
}

/// Result of a token request. Both fields are `None` when the grant was not handled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenResult {
    pub principal: Option<ClaimsPrincipal>,
    pub scheme: Option<&'static str>,
}

impl TokenResult {
    fn issued(principal: ClaimsPrincipal) -> Self {
        Self {
            principal: Some(principal),
            scheme: Some(DEFAULT_SCHEME),
        }
    }

    pub fn is_handled(&self) -> bool {
        self.principal.is_some()
    }
}

/// Every claim lands in the access token.
fn claim_destinations(_claim_type: &str, _identity: &IdentityClaims) -> Vec<Destination> {
    vec![Destination::AccessToken]
}

/// Stateless token issuer over a client store and a user store.
#[derive(Clone)]
pub struct TokenIssuer<A, U> {
    applications: A,
    users: U,
}

impl<A, U> TokenIssuer<A, U>
where
    A: ApplicationStore,
    U: UserStore,
{
    pub fn new(applications: A, users: U) -> Self {
        Self {
            applications,
            users,
        }
    }

    /// Resolve a token request into a principal.
    ///
    /// Fails with [`TokenError::Cancelled`] if `cancel` fires first; no partial
    /// identity is ever returned.
    #[tracing::instrument(skip_all, fields(grant_type = request.grant_type.as_str()))]
    pub async fn issue_token<C>(
        &self,
        request: &TokenRequest,
        context: &C,
        cancel: &CancellationToken,
    ) -> Result<TokenResult, TokenError>
    where
        C: AuthenticationContext,
    {
        if cancel.is_cancelled() {
            return Err(TokenError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TokenError::Cancelled),
            result = self.resolve(request, context) => result,
        }
    }

    async fn resolve<C>(&self, request: &TokenRequest, context: &C) -> Result<TokenResult, TokenError>
    where
        C: AuthenticationContext,
    {
        match &request.grant_type {
            GrantType::Password => {
                let identity = self.password_identity(request).await?;
                Ok(TokenResult::issued(ClaimsPrincipal::new(
                    BEARER_AUTHENTICATION_TYPE,
                    identity,
                )))
            }
            GrantType::RefreshToken => match context.authenticate(DEFAULT_SCHEME).await {
                AuthenticateResult::Success(principal) => {
                    self.authenticate_refresh_client(request, &principal).await?;
                    Ok(TokenResult::issued(principal))
                }
                AuthenticateResult::Failure(reason) => {
                    tracing::debug!(%reason, "Refresh token re-authentication failed");
                    Err(TokenError::InvalidRefreshToken)
                }
            },
            GrantType::Other(_) => Ok(TokenResult::default()),
        }
    }

    /// The client a refresh token was issued to must authenticate like it did
    /// for the password grant. `client_id` may be omitted; the principal's
    /// subject names the client then.
    async fn authenticate_refresh_client(
        &self,
        request: &TokenRequest,
        principal: &ClaimsPrincipal,
    ) -> Result<(), TokenError> {
        let issued_to = principal.claim(CLAIM_SUBJECT).ok_or(TokenError::InvalidClient)?;
        if request.client_id.as_deref().is_some_and(|id| id != issued_to) {
            return Err(TokenError::InvalidRefreshToken);
        }
        let application = self
            .applications
            .find_by_client_id(issued_to)
            .await?
            .ok_or(TokenError::InvalidClient)?;
        if !application.verify_secret(request.client_secret.as_deref()) {
            return Err(TokenError::InvalidClient);
        }
        Ok(())
    }

    async fn password_identity(&self, request: &TokenRequest) -> Result<IdentityClaims, TokenError> {
        let client_id = request.client_id.as_deref().ok_or(TokenError::InvalidClient)?;
        let application = self
            .applications
            .find_by_client_id(client_id)
            .await?
            .ok_or(TokenError::InvalidClient)?;
        if !application.verify_secret(request.client_secret.as_deref()) {
            return Err(TokenError::InvalidClient);
        }

        let username = request.username.as_deref().ok_or(TokenError::InvalidUser)?;
        let user = self
            .users
            .find_by_normalized_username(&normalize_user_name(username))
            .await?
            .ok_or(TokenError::InvalidUser)?;

        let password = request.password.as_deref().ok_or(TokenError::InvalidCredentials)?;
        if !self.users.check_password(&user, password) {
            return Err(TokenError::InvalidCredentials);
        }

        let roles = self.users.get_roles(&user.id).await?;
        let role = roles.into_iter().next().ok_or(TokenError::NoRolesAssigned)?;

        let mut identity = IdentityClaims::new();
        identity.set_claim(CLAIM_SUBJECT, Some(application.client_id));
        identity.set_claim(CLAIM_NAME, Some(application.display_name));
        identity.set_claim(CLAIM_USER_ID, Some(user.id));
        identity.set_claim(CLAIM_CLINIC_ID, user.clinic_id);
        identity.set_claim(CLAIM_ROLE, Some(role));

        identity.set_scopes(request.scopes.iter().cloned());
        identity.set_destinations(claim_destinations);

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::password::hash_password;
    use crate::oauth2::stores::{ClientApplication, UserAccount};
    use sea_orm::DbErr;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeApplications {
        clients: HashMap<String, ClientApplication>,
        lookups: Arc<AtomicUsize>,
    }

    impl ApplicationStore for FakeApplications {
        async fn find_by_client_id(
            &self,
            client_id: &str,
        ) -> Result<Option<ClientApplication>, DbErr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.clients.get(client_id).cloned())
        }
    }

    #[derive(Clone, Default)]
    struct FakeUsers {
        users: HashMap<String, UserAccount>,
        roles: HashMap<String, Vec<String>>,
        lookups: Arc<AtomicUsize>,
    }

    impl UserStore for FakeUsers {
        async fn find_by_normalized_username(
            &self,
            normalized_user_name: &str,
        ) -> Result<Option<UserAccount>, DbErr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.users.get(normalized_user_name).cloned())
        }

        async fn get_roles(&self, user_id: &str) -> Result<Vec<String>, DbErr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.roles.get(user_id).cloned().unwrap_or_default())
        }

        fn check_password(&self, user: &UserAccount, password: &str) -> bool {
            user.password_hash.as_deref() == Some(password)
        }
    }

    struct FakeContext {
        result: AuthenticateResult,
        calls: AtomicUsize,
    }

    impl FakeContext {
        fn new(result: AuthenticateResult) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AuthenticationContext for FakeContext {
        async fn authenticate(&self, scheme: &str) -> AuthenticateResult {
            assert_eq!(scheme, DEFAULT_SCHEME);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn failing_context() -> FakeContext {
        FakeContext::new(AuthenticateResult::Failure("no session".into()))
    }

    fn fixtures() -> (FakeApplications, FakeUsers) {
        let mut apps = FakeApplications::default();
        apps.clients.insert(
            "front-desk".into(),
            ClientApplication {
                client_id: "front-desk".into(),
                display_name: "Front Desk".into(),
                secret_hash: None,
            },
        );
        apps.clients.insert(
            "backoffice".into(),
            ClientApplication {
                client_id: "backoffice".into(),
                display_name: "Back office".into(),
                secret_hash: Some(hash_password("right").unwrap()),
            },
        );

        let mut users = FakeUsers::default();
        users.users.insert(
            "DR_HOUSE".into(),
            UserAccount {
                id: "user-1".into(),
                normalized_user_name: "DR_HOUSE".into(),
                clinic_id: Some("clinic-1".into()),
                password_hash: Some("vicodin".into()),
            },
        );
        users
            .roles
            .insert("user-1".into(), vec!["Doctor".into(), "Admin".into()]);
        users.users.insert(
            "NOBODY".into(),
            UserAccount {
                id: "user-2".into(),
                normalized_user_name: "NOBODY".into(),
                clinic_id: None,
                password_hash: Some("pw".into()),
            },
        );
        (apps, users)
    }

    fn password_request(username: &str, password: &str) -> TokenRequest {
        TokenRequest {
            grant_type: GrantType::Password,
            client_id: Some("front-desk".into()),
            client_secret: None,
            username: Some(username.into()),
            password: Some(password.into()),
            refresh_token: None,
            scopes: vec!["openid".into(), "profile".into()],
        }
    }

    #[tokio::test]
    async fn password_grant_uses_first_role() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let result = issuer
            .issue_token(
                &password_request("dr_house", "vicodin"),
                &failing_context(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.scheme, Some(DEFAULT_SCHEME));
        let principal = result.principal.unwrap();
        let roles: Vec<_> = principal
            .identity
            .claims()
            .filter(|(t, _)| *t == CLAIM_ROLE)
            .collect();
        assert_eq!(roles.len(), 1);
        assert_eq!(principal.claim(CLAIM_ROLE), Some("Doctor"));
        assert_eq!(principal.claim(CLAIM_SUBJECT), Some("front-desk"));
        assert_eq!(principal.claim(CLAIM_NAME), Some("Front Desk"));
        assert_eq!(principal.claim(CLAIM_USER_ID), Some("user-1"));
        assert_eq!(principal.claim(CLAIM_CLINIC_ID), Some("clinic-1"));
        assert!(principal.identity.has_scope("profile"));
    }

    #[tokio::test]
    async fn every_claim_reaches_access_token() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let mut request = password_request("dr_house", "vicodin");
        request.scopes = vec![];
        let principal = issuer
            .issue_token(&request, &failing_context(), &CancellationToken::new())
            .await
            .unwrap()
            .principal
            .unwrap();

        let access = principal.identity.for_destination(Destination::AccessToken);
        assert_eq!(access.len(), principal.identity.len());
        assert!(access.contains_key(CLAIM_NAME));
    }

    #[tokio::test]
    async fn missing_clinic_omits_claim() {
        let (apps, mut users) = fixtures();
        users.roles.insert("user-2".into(), vec!["Patient".into()]);
        let issuer = TokenIssuer::new(apps, users);
        let principal = issuer
            .issue_token(
                &password_request("nobody", "pw"),
                &failing_context(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .principal
            .unwrap();
        assert_eq!(principal.claim(CLAIM_CLINIC_ID), None);
    }

    #[tokio::test]
    async fn unknown_client_skips_user_lookup() {
        let (apps, users) = fixtures();
        let user_lookups = users.lookups.clone();
        let issuer = TokenIssuer::new(apps, users);
        let mut request = password_request("dr_house", "vicodin");
        request.client_id = Some("rogue".into());

        let err = issuer
            .issue_token(&request, &failing_context(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClient));
        assert_eq!(user_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confidential_client_with_wrong_secret_is_rejected() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let mut request = password_request("dr_house", "vicodin");
        request.client_id = Some("backoffice".into());
        request.client_secret = Some("wrong".into());

        let err = issuer
            .issue_token(&request, &failing_context(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClient));
    }

    #[tokio::test]
    async fn unknown_user_is_invalid_user() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let err = issuer
            .issue_token(
                &password_request("ghost", "x"),
                &failing_context(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidUser));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let err = issuer
            .issue_token(
                &password_request("dr_house", "aspirin"),
                &failing_context(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidCredentials));
    }

    #[tokio::test]
    async fn roleless_user_is_rejected() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let err = issuer
            .issue_token(
                &password_request("nobody", "pw"),
                &failing_context(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NoRolesAssigned));
    }

    #[tokio::test]
    async fn refresh_failure_is_invalid_refresh_token() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let request = TokenRequest {
            grant_type: GrantType::RefreshToken,
            client_id: Some("front-desk".into()),
            client_secret: None,
            username: None,
            password: None,
            refresh_token: Some("stale".into()),
            scopes: vec![],
        };
        let err = issuer
            .issue_token(&request, &failing_context(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn refresh_success_passes_principal_through() {
        let (apps, users) = fixtures();
        let app_lookups = apps.lookups.clone();
        let issuer = TokenIssuer::new(apps, users);

        let principal = refreshed_principal("front-desk");
        let context = FakeContext::new(AuthenticateResult::Success(principal.clone()));

        let request = TokenRequest {
            grant_type: GrantType::RefreshToken,
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            refresh_token: Some("fresh".into()),
            scopes: vec![],
        };
        let result = issuer
            .issue_token(&request, &context, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.principal, Some(principal));
        assert_eq!(result.scheme, Some(DEFAULT_SCHEME));
        assert_eq!(app_lookups.load(Ordering::SeqCst), 1);
    }

    fn refresh_request(client_id: Option<&str>, client_secret: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: GrantType::RefreshToken,
            client_id: client_id.map(String::from),
            client_secret: client_secret.map(String::from),
            username: None,
            password: None,
            refresh_token: Some("fresh".into()),
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn refresh_for_confidential_client_requires_its_secret() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let principal = refreshed_principal("backoffice");
        let context = FakeContext::new(AuthenticateResult::Success(principal.clone()));
        let cancel = CancellationToken::new();

        for request in [
            refresh_request(Some("backoffice"), None),
            refresh_request(None, None),
            refresh_request(Some("backoffice"), Some("wrong")),
        ] {
            let err = issuer
                .issue_token(&request, &context, &cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, TokenError::InvalidClient));
        }

        let result = issuer
            .issue_token(&refresh_request(None, Some("right")), &context, &cancel)
            .await
            .unwrap();
        assert_eq!(result.principal, Some(principal));
    }

    #[tokio::test]
    async fn refresh_by_another_client_is_rejected() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let context =
            FakeContext::new(AuthenticateResult::Success(refreshed_principal("front-desk")));

        let err = issuer
            .issue_token(
                &refresh_request(Some("backoffice"), Some("right")),
                &context,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidRefreshToken));
    }

    fn refreshed_principal(client_id: &str) -> ClaimsPrincipal {
        let mut identity = IdentityClaims::new();
        identity.set_claim(CLAIM_SUBJECT, Some(client_id));
        identity.set_claim(CLAIM_USER_ID, Some("user-1"));
        identity.set_claim(CLAIM_ROLE, Some("Doctor"));
        identity.set_scopes(["offline_access"]);
        ClaimsPrincipal::new(BEARER_AUTHENTICATION_TYPE, identity)
    }

    #[tokio::test]
    async fn other_grants_are_not_handled() {
        let (apps, users) = fixtures();
        let app_lookups = apps.lookups.clone();
        let user_lookups = users.lookups.clone();
        let issuer = TokenIssuer::new(apps, users);
        let context = failing_context();
        let mut request = password_request("dr_house", "vicodin");
        request.grant_type = GrantType::parse("client_credentials");

        let result = issuer
            .issue_token(&request, &context, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.is_handled());
        assert_eq!(result, TokenResult::default());
        assert_eq!(app_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(user_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(context.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identical_requests_yield_identical_claims() {
        let (apps, users) = fixtures();
        let issuer = TokenIssuer::new(apps, users);
        let request = password_request("Dr_House", "vicodin");
        let cancel = CancellationToken::new();

        let first = issuer
            .issue_token(&request, &failing_context(), &cancel)
            .await
            .unwrap();
        let second = issuer
            .issue_token(&request, &failing_context(), &cancel)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cancelled_request_issues_nothing() {
        let (apps, users) = fixtures();
        let app_lookups = apps.lookups.clone();
        let issuer = TokenIssuer::new(apps, users);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = issuer
            .issue_token(
                &password_request("dr_house", "vicodin"),
                &failing_context(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Cancelled));
        assert_eq!(app_lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scopes_are_deduplicated_in_order() {
        assert_eq!(
            TokenRequest::parse_scopes(Some("openid profile  openid offline_access")),
            vec!["openid", "profile", "offline_access"]
        );
        assert!(TokenRequest::parse_scopes(None).is_empty());
    }
}
