//! Runtime configuration.
//!
//! Values are resolved in order: explicit builder value, environment, default.

use crate::error::{Result, StudioError};
use std::env;
use std::time::Duration;

/// Default API host for both Imagen and Gemini calls.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default text-to-image model.
pub const DEFAULT_GENERATION_MODEL: &str = "imagen-4.0-generate-001";
/// Default image editing model.
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "API_KEY"];

/// Connection settings for the image service.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Google AI API key.
    pub api_key: Option<String>,
    /// API host, without a trailing slash.
    pub base_url: String,
    /// Model used for text-to-image.
    pub generation_model: String,
    /// Model used for image editing.
    pub edit_model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            edit_model: DEFAULT_EDIT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl StudioConfig {
    /// Defaults only; the environment is not read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `GOOGLE_API_KEY`/`API_KEY`,
    /// `GENSTUDIO_BASE_URL` and `GENSTUDIO_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()));
        if let Ok(url) = env::var("GENSTUDIO_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = env::var("GENSTUDIO_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the text-to-image model.
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    /// Sets the image editing model.
    pub fn with_edit_model(mut self, model: impl Into<String>) -> Self {
        self.edit_model = model.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the API key or an `Auth` error naming the variables checked.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            StudioError::Auth(format!(
                "{} not set and no API key provided",
                API_KEY_ENV_VARS.join(" / ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::new();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.generation_model, "imagen-4.0-generate-001");
        assert_eq!(config.edit_model, "gemini-2.5-flash-image");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = StudioConfig::new()
            .with_api_key("k")
            .with_base_url("http://localhost:9000")
            .with_edit_model("gemini-3-pro-image-preview")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.require_api_key().unwrap(), "k");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.edit_model, "gemini-3-pro-image-preview");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let err = StudioConfig::new().require_api_key().unwrap_err();
        assert!(matches!(err, StudioError::Auth(_)));
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
