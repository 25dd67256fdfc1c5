//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatekeeperConfig, ConfigError> {
    let config: GatekeeperConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read a TOML file without semantic checks, for callers that apply
/// overrides before validating.
pub fn read_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use crate::cookies::SameSite;
    use std::io::Write;

    #[test]
    fn test_load_forwarding_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[listener]
bind_address = "127.0.0.1:3128"

[cookies]
domain = "corp.io"
same_site = "Strict"

[oidc]
client_id = "gatekeeper"
token_url = "https://idp.corp.io/realms/main/protocol/openid-connect/token"

[forwarding]
enabled = true
username = "svc"
password = "secret"
domains = ["api.corp.io"]

[observability]
log_format = "json"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.is_forwarding());
        assert_eq!(config.listener.bind_address, "127.0.0.1:3128");
        assert_eq!(config.cookies.same_site, Some(SameSite::Strict));
        assert_eq!(config.cookies.access_name, "kc-access");
        assert_eq!(config.forwarding.domains, vec!["api.corp.io"]);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let err = parse_config("[forwarding]\nenabled = true\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert!(errors.len() >= 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_same_site_rejected() {
        let err = parse_config("[cookies]\nsame_site = \"Loose\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_same_site_omits_attribute() {
        let config: GatekeeperConfig = toml::from_str("[cookies]\nsame_site = \"\"\n").unwrap();
        assert_eq!(config.cookies.same_site, None);

        let config: GatekeeperConfig = toml::from_str("[cookies]\nsecure = false\n").unwrap();
        assert_eq!(config.cookies.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/gatekeeper.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
