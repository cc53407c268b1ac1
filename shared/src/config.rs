use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::capabilities::{ConfigError, MIN_REFETCH_INTERVAL};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct ModelNames;

impl ModelNames {
    pub const GEMINI_15_FLASH: &'static str = "gemini-1.5-flash";
    pub const GEMINI_20_FLASH_EXP: &'static str = "gemini-2.0-flash-exp";
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoreConfig {
    /// Base of the generative endpoint, without the `/models/...` suffix.
    pub api_base: String,
    pub model: String,
    pub min_credential_refetch: Duration,
    /// `None` lets a hung request stay in `Loading` until cancelled.
    pub request_timeout: Option<Duration>,
    pub remote_config_url: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: ModelNames::GEMINI_15_FLASH.to_string(),
            min_credential_refetch: MIN_REFETCH_INTERVAL,
            request_timeout: None,
            remote_config_url: None,
        }
    }
}

impl CoreConfig {
    /// Defaults overlaid with `TRAVEL_AI_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("TRAVEL_AI_API_BASE") {
            config.api_base = base;
        }
        if let Ok(model) = std::env::var("TRAVEL_AI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(raw) = std::env::var("TRAVEL_AI_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Some(Duration::from_secs(secs)),
                _ => warn!(value = %raw, "Ignoring invalid TRAVEL_AI_TIMEOUT_SECS"),
            }
        }
        if let Ok(url) = std::env::var("TRAVEL_AI_REMOTE_CONFIG_URL") {
            config.remote_config_url = Some(url);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.api_base)
            .map_err(|e| ConfigError::Invalid(format!("api_base: {e}")))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::Invalid(format!(
                "api_base scheme '{}' is not http(s)",
                base.scheme()
            )));
        }
        if self.model.trim().is_empty() || self.model.contains('/') {
            return Err(ConfigError::Invalid(format!("model name '{}'", self.model)));
        }
        if self.min_credential_refetch < MIN_REFETCH_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "min_credential_refetch must be at least {MIN_REFETCH_INTERVAL:?}"
            )));
        }
        if let Some(url) = &self.remote_config_url {
            Url::parse(url).map_err(|e| ConfigError::Invalid(format!("remote_config_url: {e}")))?;
        }
        Ok(())
    }

    /// `{api_base}/models/{model}:generateContent`, credential not included.
    pub fn generate_url(&self) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );
        Url::parse(&raw).map_err(|e| ConfigError::Invalid(format!("{raw}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.generate_url().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let bad_base = CoreConfig {
            api_base: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(matches!(bad_base.validate(), Err(ConfigError::Invalid(_))));

        let fast_refetch = CoreConfig {
            min_credential_refetch: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(fast_refetch.validate().is_err());

        let bad_model = CoreConfig {
            model: "../admin".into(),
            ..Default::default()
        };
        assert!(bad_model.validate().is_err());
    }

    // Only test touching TRAVEL_AI_* variables.
    #[test]
    fn from_env_overlays_defaults() {
        std::env::set_var("TRAVEL_AI_API_BASE", "http://127.0.0.1:9000/v1");
        std::env::set_var("TRAVEL_AI_MODEL", ModelNames::GEMINI_20_FLASH_EXP);
        std::env::set_var("TRAVEL_AI_TIMEOUT_SECS", "15");
        std::env::set_var("TRAVEL_AI_REMOTE_CONFIG_URL", "https://config.example.com/app");

        let config = CoreConfig::from_env();
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1");
        assert_eq!(config.model, "gemini-2.0-flash-exp");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(
            config.remote_config_url.as_deref(),
            Some("https://config.example.com/app")
        );
        assert_eq!(config.min_credential_refetch, MIN_REFETCH_INTERVAL);
        assert!(config.validate().is_ok());

        std::env::set_var("TRAVEL_AI_TIMEOUT_SECS", "soon");
        std::env::set_var("TRAVEL_AI_MODEL", "  ");
        let fallback = CoreConfig::from_env();
        assert_eq!(fallback.request_timeout, None);
        assert_eq!(fallback.model, ModelNames::GEMINI_15_FLASH);

        for var in [
            "TRAVEL_AI_API_BASE",
            "TRAVEL_AI_MODEL",
            "TRAVEL_AI_TIMEOUT_SECS",
            "TRAVEL_AI_REMOTE_CONFIG_URL",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let config = CoreConfig {
            api_base: "http://127.0.0.1:8080/".into(),
            model: ModelNames::GEMINI_20_FLASH_EXP.into(),
            ..Default::default()
        };
        assert_eq!(
            config.generate_url().unwrap().as_str(),
            "http://127.0.0.1:8080/models/gemini-2.0-flash-exp:generateContent"
        );
    }
}
