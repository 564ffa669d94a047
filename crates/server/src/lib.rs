//! Clinic management backend.
//!
//! Clinics, staff and patient accounts, patient cards with disease records,
//! appointments and doctor shifts, served over a JSON API that is secured with
//! opaque OAuth2 access tokens issued by the built-in token endpoint.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod services;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
