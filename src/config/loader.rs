//! Configuration loading from disk and environment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
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

/// Load a configuration: defaults, then the optional TOML file, then
/// environment overrides. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_with(path, |key| env.get(key).cloned())
}

/// Like [`load_config`], with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: GatewayConfig = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, lookup);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the gateway's environment variables on top of `config`.
///
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = get("USER_SERVICE_ENDPOINT") {
        config.services.user_grpc = v;
    }
    if let Some(v) = get("POST_SERVICE_ENDPOINT") {
        config.services.post_grpc = v;
    }
    if let Some(v) = get("EVENT_SERVICE_ENDPOINT") {
        config.services.event_grpc = v;
    }
    if let Some(v) = get("USER_SERVICE_REST") {
        config.services.user_rest = v;
    }
    if let Some(v) = get("CHAT_SERVICE_ENDPOINT") {
        config.services.chat_endpoint = normalize_chat_endpoint(v);
    }
    if let Some(port) = get("HTTP_PORT") {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
}

/// Deployments set `CHAT_SERVICE_ENDPOINT` as a bare `host:port`.
fn normalize_chat_endpoint(value: String) -> String {
    if value.contains("://") {
        value
    } else {
        format!("ws://{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_services_and_port() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("USER_SERVICE_REST", "http://users:8001"),
                ("CHAT_SERVICE_ENDPOINT", "chat:50064"),
                ("HTTP_PORT", "9000"),
            ]),
        );

        assert_eq!(config.services.user_rest, "http://users:8001");
        assert_eq!(config.services.chat_endpoint, "ws://chat:50064");
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.services.post_grpc, "localhost:50062");
    }

    #[test]
    fn empty_env_value_falls_back() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("USER_SERVICE_REST", "")]));
        assert_eq!(config.services.user_rest, "http://localhost:8001");
    }

    #[test]
    fn loads_toml_file() {
        let dir = std::env::temp_dir().join(format!("room-gateway-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:18080\"").unwrap();

        let config = load_config_with(Some(&path), env(&[])).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:18080");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_invalid_file() {
        let dir = std::env::temp_dir().join(format!("room-gateway-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();

        let err = load_config_with(Some(&path), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("timeouts.request_secs"));

        fs::remove_dir_all(dir).unwrap();
    }
}
