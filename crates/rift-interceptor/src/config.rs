//! Configuration types for interceptors.
//!
//! Options can be built in code or loaded from a YAML/JSON file:
//!
//! ```yaml
//! baseUrl: http://localhost:3000/api
//! requestSaving:
//!   enabled: true
//!   safeLimit: 500
//! onUnhandledRequest:
//!   action: reject
//!   log: false
//! ```

use crate::request::parse_absolute_url;
use crate::unhandled::{UnhandledDeclaration, UnhandledRequestStrategy};
use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid base URL '{0}': expected an absolute http(s) URL without query or fragment")]
    InvalidBaseUrl(String),
    #[error("requestSaving.safeLimit must be greater than 0")]
    InvalidSafeLimit,
}

/// Whether handlers keep the requests they serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSaving {
    #[serde(default = "default_saving_enabled")]
    pub enabled: bool,
    /// Number of saved requests per interceptor above which a warning is logged
    #[serde(default = "default_safe_limit")]
    pub safe_limit: usize,
}

fn default_saving_enabled() -> bool {
    true
}

fn default_safe_limit() -> usize {
    1000
}

impl Default for RequestSaving {
    fn default() -> Self {
        Self {
            enabled: default_saving_enabled(),
            safe_limit: default_safe_limit(),
        }
    }
}

/// Options for creating an interceptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorOptions {
    /// Requests are handled only when their URL starts with this base URL
    pub base_url: String,

    #[serde(default)]
    pub request_saving: RequestSaving,

    /// Declared strategy for unhandled requests; the process-wide default
    /// applies when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_unhandled_request: Option<UnhandledDeclaration>,

    /// Strategy set in code, takes precedence over `on_unhandled_request`
    #[serde(skip)]
    pub unhandled_strategy: Option<UnhandledRequestStrategy>,
}

impl InterceptorOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_saving: RequestSaving::default(),
            on_unhandled_request: None,
            unhandled_strategy: None,
        }
    }

    pub fn request_saving(mut self, request_saving: RequestSaving) -> Self {
        self.request_saving = request_saving;
        self
    }

    pub fn on_unhandled_request(mut self, strategy: impl Into<UnhandledRequestStrategy>) -> Self {
        self.unhandled_strategy = Some(strategy.into());
        self
    }

    /// Strategy configured for this interceptor, if any.
    pub fn strategy(&self) -> Option<UnhandledRequestStrategy> {
        self.unhandled_strategy
            .clone()
            .or_else(|| self.on_unhandled_request.map(UnhandledRequestStrategy::from))
    }

    /// Load options from a YAML file (JSON is valid YAML).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let options: InterceptorOptions = serde_yaml::from_str(contents)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let options: InterceptorOptions = serde_json::from_str(contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        if self.request_saving.enabled && self.request_saving.safe_limit == 0 {
            return Err(ConfigError::InvalidSafeLimit);
        }
        Ok(())
    }

    pub(crate) fn parsed_base_url(&self) -> Result<Uri, ConfigError> {
        let uri = parse_absolute_url(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if uri.query().is_some() || self.base_url.contains('#') {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unhandled::UnhandledAction;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = InterceptorOptions::from_yaml_str("baseUrl: http://localhost:3000").unwrap();
        assert_eq!(options.base_url, "http://localhost:3000");
        assert!(options.request_saving.enabled);
        assert_eq!(options.request_saving.safe_limit, 1000);
        assert!(options.strategy().is_none());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
baseUrl: http://localhost:3000/api
requestSaving:
  enabled: false
  safeLimit: 10
onUnhandledRequest:
  action: reject
  log: false
"#;
        let options = InterceptorOptions::from_yaml_str(yaml).unwrap();
        assert!(!options.request_saving.enabled);
        assert_eq!(options.request_saving.safe_limit, 10);
        assert_eq!(
            options.on_unhandled_request,
            Some(UnhandledDeclaration {
                action: UnhandledAction::Reject,
                log: Some(false),
            })
        );
    }

    #[test]
    fn test_json_config() {
        let options = InterceptorOptions::from_json_str(
            r#"{"baseUrl": "https://api.example.com", "onUnhandledRequest": {"action": "bypass"}}"#,
        )
        .unwrap();
        assert_eq!(
            options.on_unhandled_request,
            Some(UnhandledDeclaration::bypass())
        );
    }

    #[test]
    fn test_invalid_base_url() {
        for base_url in ["/relative", "ftp://host", "http://host/api?x=1"] {
            let options = InterceptorOptions::new(base_url);
            assert!(
                matches!(options.validate(), Err(ConfigError::InvalidBaseUrl(_))),
                "{base_url} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_safe_limit_is_rejected() {
        let options = InterceptorOptions::new("http://localhost").request_saving(RequestSaving {
            enabled: true,
            safe_limit: 0,
        });
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidSafeLimit)
        ));
    }

    #[test]
    fn test_programmatic_strategy_wins() {
        let mut options = InterceptorOptions::from_yaml_str(
            "baseUrl: http://localhost\nonUnhandledRequest:\n  action: bypass\n",
        )
        .unwrap();
        options = options.on_unhandled_request(UnhandledDeclaration::reject());
        match options.strategy() {
            Some(UnhandledRequestStrategy::Declared(declaration)) => {
                assert_eq!(declaration.action, UnhandledAction::Reject)
            }
            other => panic!("unexpected strategy: {other:?}"),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "baseUrl: http://localhost:4000").unwrap();
        let options = InterceptorOptions::from_file(file.path()).unwrap();
        assert_eq!(options.base_url, "http://localhost:4000");
    }
}
