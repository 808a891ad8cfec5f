//! Per-flavor configuration resolution.
//!
//! A flavor's config arrives as inline JSON text or a remote reference. The
//! resolution never aborts setup: a failed parse or fetch is captured on the
//! [`ConfigResolution`] and the flavor is later disabled fail-closed without
//! affecting its siblings.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::engine::SourceFetcher;
use crate::error::ConfigError;

/// Settings for one flavor.
///
/// Unknown keys are preserved in `extra` rather than rejected, since engines
/// and plugins read their own sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavorConfig {
    /// Packages the engine should make importable before any unit runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,

    /// Files to mirror into the engine's filesystem: URL → destination path.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub files: HashMap<String, String>,

    /// Engine- and plugin-specific sections, passed through untouched.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of resolving a flavor's configuration.
///
/// May carry a resolution error; per the fail-closed policy the flavor's
/// element type is never registered in that case.
#[derive(Debug)]
pub struct ConfigResolution {
    config: FlavorConfig,
    error: Option<ConfigError>,
    source_url: Option<String>,
}

impl ConfigResolution {
    /// Resolves config from inline JSON text.
    #[must_use]
    pub fn from_inline(text: &str) -> Self {
        match serde_json::from_str::<FlavorConfig>(text) {
            Ok(config) => Self {
                config,
                error: None,
                source_url: None,
            },
            Err(err) => Self {
                config: FlavorConfig::default(),
                error: Some(ConfigError::Parse(err)),
                source_url: None,
            },
        }
    }

    /// Resolves config from a remote reference through the fetcher.
    pub async fn from_url(fetcher: &dyn SourceFetcher, url: &str) -> Self {
        match fetcher.fetch(url).await {
            Ok(text) => {
                let mut resolved = Self::from_inline(&text);
                resolved.source_url = Some(url.to_string());
                resolved
            }
            Err(err) => Self {
                config: FlavorConfig::default(),
                error: Some(ConfigError::Fetch(err)),
                source_url: Some(url.to_string()),
            },
        }
    }

    /// An empty, error-free resolution for flavors configured in code.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            config: FlavorConfig::default(),
            error: None,
            source_url: None,
        }
    }

    /// Wraps an already-built config.
    #[must_use]
    pub fn from_config(config: FlavorConfig) -> Self {
        Self {
            config,
            error: None,
            source_url: None,
        }
    }

    /// The resolved config. Meaningful only when [`error`](Self::error) is
    /// `None`.
    #[must_use]
    pub fn config(&self) -> &FlavorConfig {
        &self.config
    }

    /// The resolution error, if any. A flavor carrying one is disabled
    /// fail-closed.
    #[must_use]
    pub fn error(&self) -> Option<&ConfigError> {
        self.error.as_ref()
    }

    /// Where the config came from, when it was fetched.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Deep copy of the config for the process-wide export surface, so
    /// external mutation cannot reach internal state.
    #[must_use]
    pub fn snapshot(&self) -> FlavorConfig {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_config_parses() {
        let resolved = ConfigResolution::from_inline(
            r#"{"packages": ["numpy"], "files": {"https://x/y.txt": "/y.txt"}, "terminal": true}"#,
        );
        assert!(resolved.error().is_none());
        assert_eq!(resolved.config().packages, vec!["numpy"]);
        assert_eq!(
            resolved.config().extra.get("terminal"),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn malformed_inline_config_carries_error() {
        let resolved = ConfigResolution::from_inline("{not json");
        assert!(matches!(resolved.error(), Some(ConfigError::Parse(_))));
        // Fail closed, not fail open: the default config is still present but
        // the error marks the flavor unusable.
        assert_eq!(*resolved.config(), FlavorConfig::default());
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let resolved = ConfigResolution::from_inline(r#"{"packages": ["numpy"]}"#);
        let mut snap = resolved.snapshot();
        snap.packages.push("pandas".into());
        assert_eq!(resolved.config().packages, vec!["numpy"]);
    }

    #[tokio::test]
    async fn remote_fetch_failure_carries_error() {
        use crate::test_support::StaticFetcher;

        let fetcher = StaticFetcher::default();
        let resolved = ConfigResolution::from_url(&fetcher, "https://example.test/cfg.json").await;
        assert!(matches!(resolved.error(), Some(ConfigError::Fetch(_))));
        assert_eq!(resolved.source_url(), Some("https://example.test/cfg.json"));
    }

    #[tokio::test]
    async fn remote_fetch_success_parses_body() {
        use crate::test_support::StaticFetcher;

        let fetcher = StaticFetcher::with_sources([(
            "https://example.test/cfg.json",
            r#"{"packages": ["requests"]}"#,
        )]);
        let resolved = ConfigResolution::from_url(&fetcher, "https://example.test/cfg.json").await;
        assert!(resolved.error().is_none());
        assert_eq!(resolved.config().packages, vec!["requests"]);
    }
}
