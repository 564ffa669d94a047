#![allow(dead_code)]

use axum_test::TestServer;
use hebi_api::{
    AppResources,
    api::app,
    config::{AppConfig, OAuth2Config},
    entity::{application_user, clinic, oauth2_client, user_role},
    oauth2::hash_password,
    services::Caller,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;

pub const PUBLIC_CLIENT: &str = "hebi-web";
pub const CONFIDENTIAL_CLIENT: &str = "hebi-backoffice";
pub const CLIENT_SECRET: &str = "backoffice-secret";
pub const PASSWORD: &str = "correct horse battery";

/// In-memory database with the full schema and two registered clients.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");

    for (id, secret) in [(PUBLIC_CLIENT, None), (CONFIDENTIAL_CLIENT, Some(CLIENT_SECRET))] {
        oauth2_client::ActiveModel {
            id: Set(id.to_string()),
            secret_hash: Set(secret.map(|s| hash_password(s).expect("hash secret"))),
            display_name: Set(format!("{id} client")),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(&db)
        .await
        .expect("insert client");
    }

    Arc::new(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".parse().expect("addr"),
        oauth2: OAuth2Config {
            issuer_url: "http://localhost:8080".into(),
            access_token_lifetime: 3600,
            refresh_token_lifetime: 86400,
        },
    }
}

pub fn test_server(db: Arc<DatabaseConnection>) -> TestServer {
    let resources = AppResources {
        db,
        config: Arc::new(test_config()),
    };
    TestServer::new(app(resources)).expect("test server")
}

pub async fn insert_clinic(db: &DatabaseConnection, name: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    clinic::ActiveModel {
        id: Set(id.clone()),
        name: Set(name.to_string()),
        address: Set(None),
        phone_number: Set(None),
        created_at: Set(OffsetDateTime::now_utc()),
        last_modified_at: Set(None),
        is_deleted: Set(false),
    }
    .insert(db)
    .await
    .expect("insert clinic");
    id
}

/// A user with [`PASSWORD`] holding `roles` in the given order.
pub async fn insert_user(
    db: &DatabaseConnection,
    user_name: &str,
    clinic_id: Option<&str>,
    roles: &[&str],
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    application_user::ActiveModel {
        id: Set(id.clone()),
        user_name: Set(user_name.to_string()),
        normalized_user_name: Set(user_name.to_uppercase()),
        first_name: Set("Test".to_string()),
        last_name: Set(user_name.to_string()),
        email: Set(None),
        phone_number: Set(None),
        birth_date: Set(None),
        password_hash: Set(Some(hash_password(PASSWORD).expect("hash"))),
        clinic_id: Set(clinic_id.map(str::to_string)),
        created_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(db)
    .await
    .expect("insert user");

    for (position, role) in roles.iter().enumerate() {
        user_role::ActiveModel {
            user_id: Set(id.clone()),
            role: Set(role.to_string()),
            position: Set(position as i32),
        }
        .insert(db)
        .await
        .expect("insert role");
    }
    id
}

pub fn caller(user_id: &str, clinic_id: &str, role: &str) -> Caller {
    Caller {
        user_id: user_id.to_string(),
        clinic_id: Some(clinic_id.to_string()),
        role: role.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// Password grant through the public client.
pub async fn sign_in(server: &TestServer, user_name: &str) -> Tokens {
    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("client_id", PUBLIC_CLIENT),
            ("username", user_name),
            ("password", PASSWORD),
            ("scope", "openid offline_access"),
        ])
        .await;
    response.assert_status_ok();
    response.json::<Tokens>()
}
