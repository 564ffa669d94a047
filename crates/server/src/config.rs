use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Settings for the OAuth2 token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Base URL of this server, advertised as the issuer in discovery.
    pub issuer_url: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    pub oauth2: OAuth2Config,
}

/// Upper bound for both token lifetimes, in seconds (one year).
pub const MAX_TOKEN_LIFETIME: i64 = 86400 * 365;

fn default_access_token_lifetime() -> i64 {
    3600
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 14
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl AppConfig {
    /// Reject values that deserialize fine but can't work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database_url must not be empty".into(),
            ));
        }
        if self.oauth2.issuer_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "oauth2.issuer_url must not be empty".into(),
            ));
        }
        if self.oauth2.access_token_lifetime <= 0 {
            return Err(ConfigError::Validation(
                "oauth2.access_token_lifetime must be > 0".into(),
            ));
        }
        if self.oauth2.refresh_token_lifetime > MAX_TOKEN_LIFETIME {
            return Err(ConfigError::Validation(format!(
                "oauth2.refresh_token_lifetime must be at most {MAX_TOKEN_LIFETIME} seconds"
            )));
        }
        if self.oauth2.refresh_token_lifetime < self.oauth2.access_token_lifetime {
            return Err(ConfigError::Validation(
                "oauth2.refresh_token_lifetime must not be shorter than the access token lifetime"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `OAUTH2__ISSUER_URL`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;

    Ok(app)
}
