//! Executor settings parsing.
//!
//! ```kdl
//! executor "k8s"
//! api-uri "https://api.example.com"
//! build-timeout 90
//! http {
//!     max-attempts 5
//!     retry-delay-ms 5000
//!     timeout-secs 30
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use sdexec_core::config::DEFAULT_BUILD_TIMEOUT_MINUTES;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings shared by every executor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Name of the executor backend.
    pub name: Option<String>,
    /// Base URI of the pipeline API.
    pub api_uri: Option<String>,
    /// Build timeout in minutes used for token exchange.
    pub build_timeout: f64,
    pub http: HttpSettings,
}

/// HTTP client behavior towards the pipeline API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            name: None,
            api_uri: None,
            build_timeout: DEFAULT_BUILD_TIMEOUT_MINUTES,
            http: HttpSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 5000,
            timeout_secs: 30,
        }
    }
}

impl HttpSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Read and parse executor settings from a file.
pub fn load_settings(path: impl AsRef<Path>) -> ConfigResult<ExecutorSettings> {
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content)
}

/// Parse executor settings from KDL text.
pub fn parse_settings(kdl: &str) -> ConfigResult<ExecutorSettings> {
    let doc: KdlDocument = kdl.parse()?;
    let mut settings = ExecutorSettings::default();
    let mut seen = Vec::new();

    for node in doc.nodes() {
        let name = node.name().value();
        if seen.contains(&name) {
            return Err(ConfigError::Duplicate(name.to_string()));
        }
        seen.push(name);

        match name {
            "executor" => {
                settings.name = Some(
                    get_first_string_arg(node)
                        .ok_or_else(|| ConfigError::MissingField("executor name".to_string()))?,
                );
            }
            "api-uri" => {
                let uri = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("api-uri".to_string()))?;
                url::Url::parse(&uri).map_err(|e| ConfigError::InvalidValue {
                    field: "api-uri".to_string(),
                    message: e.to_string(),
                })?;
                settings.api_uri = Some(uri);
            }
            "build-timeout" => {
                let minutes = get_first_number_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("build-timeout".to_string()))?;
                if !minutes.is_finite() || minutes <= 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "build-timeout".to_string(),
                        message: format!("must be a positive number of minutes, got {}", minutes),
                    });
                }
                settings.build_timeout = minutes;
            }
            "http" => {
                settings.http = parse_http(node)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(settings)
}

fn parse_http(node: &KdlNode) -> ConfigResult<HttpSettings> {
    let mut http = HttpSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "max-attempts" => {
                    http.max_attempts = get_unsigned_arg(child, "max-attempts")?;
                    if http.max_attempts == 0 {
                        return Err(ConfigError::InvalidValue {
                            field: "max-attempts".to_string(),
                            message: "must be at least 1".to_string(),
                        });
                    }
                }
                "retry-delay-ms" => {
                    http.retry_delay_ms = get_unsigned_arg(child, "retry-delay-ms")?;
                }
                "timeout-secs" => {
                    http.timeout_secs = get_unsigned_arg(child, "timeout-secs")?;
                }
                _ => {}
            }
        }
    }

    Ok(http)
}

// Helper functions for extracting values from KDL nodes

fn get_first_arg(node: &KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    get_first_arg(node)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_first_number_arg(node: &KdlNode) -> Option<f64> {
    let value = get_first_arg(node)?;
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn get_unsigned_arg<T: TryFrom<i128>>(node: &KdlNode, field: &str) -> ConfigResult<T> {
    let value = get_first_arg(node)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
    T::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("out of range: {}", value),
    })
}
