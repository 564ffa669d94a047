//! OAuth2 endpoint tests.
//!
//! Drive the token, revocation, userinfo and discovery endpoints against an
//! in-memory database.

mod common;

use axum::http::StatusCode;
use common::*;
use hebi_api::entity::oauth2_token;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::Value;
use std::future::IntoFuture;

#[tokio::test]
async fn password_grant_issues_token_with_first_role() {
    let db = test_db().await;
    let clinic_id = insert_clinic(&db, "North").await;
    let user_id = insert_user(&db, "dr_house", Some(&clinic_id), &["Doctor", "Admin"]).await;
    let server = test_server(db.clone());

    let tokens = sign_in(&server, "Dr_House").await;
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(tokens.scope, "offline_access openid");
    assert!(!tokens.access_token.is_empty());

    let info = server
        .get("/oauth2/userinfo")
        .authorization_bearer(&tokens.access_token)
        .await;
    info.assert_status_ok();
    let body: Value = info.json();
    assert_eq!(body["sub"], PUBLIC_CLIENT);
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["clinic_id"], clinic_id.as_str());
    assert_eq!(body["role"], "Doctor");

    let row = oauth2_token::Entity::find()
        .filter(oauth2_token::Column::AccessToken.eq(tokens.access_token.as_str()))
        .one(db.as_ref())
        .await
        .expect("query")
        .expect("stored token");
    assert_eq!(row.user_id, user_id);
    assert_eq!(row.client_id, PUBLIC_CLIENT);
}

#[tokio::test]
async fn clinic_claim_is_omitted_for_users_without_clinic() {
    let db = test_db().await;
    insert_user(&db, "owner", None, &["Admin"]).await;
    let server = test_server(db);

    let tokens = sign_in(&server, "owner").await;
    let body: Value = server
        .get("/oauth2/userinfo")
        .authorization_bearer(&tokens.access_token)
        .await
        .json();
    assert!(body.get("clinic_id").is_none());
    assert_eq!(body["role"], "Admin");
}

#[tokio::test]
async fn unknown_client_is_unauthorized() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("client_id", "nope"),
            ("username", "dr_house"),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn confidential_client_requires_its_secret() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    let form = |secret: &'static str| {
        [
            ("grant_type", "password"),
            ("client_id", CONFIDENTIAL_CLIENT),
            ("client_secret", secret),
            ("username", "dr_house"),
            ("password", PASSWORD),
        ]
    };

    server
        .post("/oauth2/token")
        .form(&form("wrong"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/oauth2/token")
        .form(&form(CLIENT_SECRET))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn invalid_user_and_password_are_invalid_grant() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    for (user, password) in [("ghost", PASSWORD), ("dr_house", "wrong password")] {
        let response = server
            .post("/oauth2/token")
            .form(&[
                ("grant_type", "password"),
                ("client_id", PUBLIC_CLIENT),
                ("username", user),
                ("password", password),
            ])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_grant");
    }
}

#[tokio::test]
async fn user_without_roles_is_rejected() {
    let db = test_db().await;
    insert_user(&db, "roleless", None, &[]).await;
    let server = test_server(db);

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("client_id", PUBLIC_CLIENT),
            ("username", "roleless"),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn unsupported_grant_type_is_rejected() {
    let server = test_server(test_db().await);

    let response = server
        .post("/oauth2/token")
        .form(&[("grant_type", "client_credentials"), ("client_id", PUBLIC_CLIENT)])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn refresh_grant_rotates_tokens_and_keeps_claims() {
    let db = test_db().await;
    let clinic_id = insert_clinic(&db, "North").await;
    let user_id = insert_user(&db, "dr_house", Some(&clinic_id), &["Doctor"]).await;
    let server = test_server(db);

    let first = sign_in(&server, "dr_house").await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", PUBLIC_CLIENT),
            ("refresh_token", first.refresh_token.as_str()),
        ])
        .await;
    response.assert_status_ok();
    let second: Tokens = response.json();
    assert_ne!(second.access_token, first.access_token);
    assert_ne!(second.refresh_token, first.refresh_token);

    let body: Value = server
        .get("/oauth2/userinfo")
        .authorization_bearer(&second.access_token)
        .await
        .json();
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["role"], "Doctor");

    // The consumed refresh token can't be replayed.
    let replay = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", first.refresh_token.as_str()),
        ])
        .await;
    replay.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = replay.json();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_grant_without_client_id_uses_original_client() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db.clone());

    let first = sign_in(&server, "dr_house").await;
    let second: Tokens = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", first.refresh_token.as_str()),
        ])
        .await
        .json();

    let row = oauth2_token::Entity::find()
        .filter(oauth2_token::Column::AccessToken.eq(second.access_token.as_str()))
        .one(db.as_ref())
        .await
        .expect("query")
        .expect("stored token");
    assert_eq!(row.client_id, PUBLIC_CLIENT);
}

#[tokio::test]
async fn refresh_token_of_another_client_is_rejected() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    let tokens = sign_in(&server, "dr_house").await;
    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", CONFIDENTIAL_CLIENT),
            ("refresh_token", tokens.refresh_token.as_str()),
        ])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoked_access_token_is_rejected() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    let tokens = sign_in(&server, "dr_house").await;
    server
        .post("/oauth2/revoke")
        .form(&[("token", tokens.access_token.as_str())])
        .await
        .assert_status_ok();

    server
        .get("/oauth2/userinfo")
        .authorization_bearer(&tokens.access_token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Unknown tokens are accepted silently.
    server
        .post("/oauth2/revoke")
        .form(&[("token", "does-not-exist")])
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn userinfo_requires_bearer_token() {
    let server = test_server(test_db().await);
    server
        .get("/oauth2/userinfo")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn discovery_document_lists_supported_grants() {
    let server = test_server(test_db().await);

    let response = server.get("/.well-known/openid-configuration").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["issuer"], "http://localhost:8080");
    assert_eq!(body["token_endpoint"], "http://localhost:8080/oauth2/token");
    let grants: Vec<String> =
        serde_json::from_value(body["grant_types_supported"].clone()).expect("grants");
    assert_eq!(grants, vec!["password", "refresh_token"]);
}

#[tokio::test]
async fn refresh_for_confidential_client_requires_its_secret() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db);

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("client_id", CONFIDENTIAL_CLIENT),
            ("client_secret", CLIENT_SECRET),
            ("username", "dr_house"),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status_ok();
    let tokens: Tokens = response.json();
    let refresh = tokens.refresh_token.as_str();

    let without_secret = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", CONFIDENTIAL_CLIENT),
            ("refresh_token", refresh),
        ])
        .await;
    without_secret.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = without_secret.json();
    assert_eq!(body["error"], "invalid_client");

    server
        .post("/oauth2/token")
        .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Rejected attempts don't consume the refresh token.
    server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", CONFIDENTIAL_CLIENT),
            ("client_secret", CLIENT_SECRET),
            ("refresh_token", refresh),
        ])
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn concurrent_refreshes_with_one_token_issue_one_pair() {
    let db = test_db().await;
    insert_user(&db, "dr_house", None, &["Doctor"]).await;
    let server = test_server(db.clone());

    let tokens = sign_in(&server, "dr_house").await;
    let form = [
        ("grant_type", "refresh_token"),
        ("client_id", PUBLIC_CLIENT),
        ("refresh_token", tokens.refresh_token.as_str()),
    ];
    let (first, second) = tokio::join!(
        server.post("/oauth2/token").form(&form).into_future(),
        server.post("/oauth2/token").form(&form).into_future(),
    );

    let mut statuses = [first.status_code(), second.status_code()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let live = oauth2_token::Entity::find()
        .filter(oauth2_token::Column::RevokedAt.is_null())
        .all(db.as_ref())
        .await
        .expect("query");
    assert_eq!(live.len(), 1);
}
