use config::Config;
use hebi_api::config::{AppConfig, ConfigError};

fn from_yaml(yaml: &str) -> AppConfig {
    Config::builder()
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config")
}

#[test]
fn test_app_config_deserialization_with_defaults() {
    let app_config = from_yaml(
        r#"
database_url: "postgres://localhost/hebi"
oauth2:
  issuer_url: "https://hebi.example.com"
"#,
    );
    assert_eq!(app_config.database_url, "postgres://localhost/hebi");
    assert_eq!(app_config.listen_addr.port(), 8080);
    assert_eq!(app_config.oauth2.issuer_url, "https://hebi.example.com");
    assert_eq!(app_config.oauth2.access_token_lifetime, 3600);
    assert_eq!(app_config.oauth2.refresh_token_lifetime, 86400 * 14);
    assert!(app_config.validate().is_ok());
}

#[test]
fn test_app_config_overrides() {
    let app_config = from_yaml(
        r#"
database_url: "sqlite://hebi.db?mode=rwc"
listen_addr: "127.0.0.1:9000"
oauth2:
  issuer_url: "http://localhost:9000"
  access_token_lifetime: 600
  refresh_token_lifetime: 3600
"#,
    );
    assert_eq!(app_config.listen_addr.to_string(), "127.0.0.1:9000");
    assert_eq!(app_config.oauth2.access_token_lifetime, 600);
    assert!(app_config.validate().is_ok());
}

#[test]
fn test_refresh_lifetime_shorter_than_access_is_rejected() {
    let app_config = from_yaml(
        r#"
database_url: "sqlite::memory:"
oauth2:
  issuer_url: "http://localhost:8080"
  access_token_lifetime: 3600
  refresh_token_lifetime: 60
"#,
    );
    assert!(matches!(
        app_config.validate(),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_missing_oauth2_section_fails() {
    let result = Config::builder()
        .add_source(config::File::from_str(
            r#"database_url: "sqlite::memory:""#,
            config::FileFormat::Yaml,
        ))
        .build()
        .expect("Failed to build config")
        .try_deserialize::<AppConfig>();
    assert!(result.is_err());
}

#[test]
fn test_token_lifetime_beyond_a_year_is_rejected() {
    let app_config = from_yaml(
        r#"
database_url: "sqlite::memory:"
oauth2:
  issuer_url: "http://localhost:8080"
  access_token_lifetime: 9223372036854775807
  refresh_token_lifetime: 9223372036854775807
"#,
    );
    assert!(matches!(
        app_config.validate(),
        Err(ConfigError::Validation(_))
    ));
}
