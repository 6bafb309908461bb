//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Built-in defaults, held to the same validation as a loaded file.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    let config = GatewayConfig::default();
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load `path` when given, otherwise fall back to [`default_config`].
pub fn load_or_default(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => default_config(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asn-filter.toml");
        fs::write(
            &path,
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [filter]
            disallowed_asns = ["206948"]
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.filter.disallowed_asns, vec!["206948".to_string()]);
    }

    #[test]
    fn test_conflicting_lists_rejected() {
        let err = parse_config(
            r#"
            [filter]
            allowed_asns = ["35236"]
            disallowed_asns = ["206948"]
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn test_defaults_pass_validation() {
        let config = load_or_default(None).unwrap();
        assert_eq!(config.filter.header, "x-real-ip");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_path_takes_precedence_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asn-filter.toml");
        fs::write(&path, "[filter]\nallowed_asns = [\"AS1\"]\n").unwrap();

        assert!(matches!(load_or_default(Some(&path)), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/asn-filter.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(parse_config("[filter"), Err(ConfigError::Parse(_))));
    }
}
