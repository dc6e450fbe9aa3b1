use crate::core::{RegistryError, Result};
use serde::{Deserialize, Serialize};

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Registry name, used in log fields
    pub name: String,

    /// Whether a second root context may be constructed while one is live
    ///
    /// Defaults to `false`: `create_root` and `set_instantiated` reject a
    /// second live root with `DuplicateRoot` unless this is turned on. Hosts
    /// that juggle several engines in one process opt in explicitly.
    pub allow_multiple_roots: bool,

    /// Whether the monitoring tab is attached to an engine UI
    pub ui_enabled: bool,
}

impl RegistryConfig {
    pub const KEY_NAME: &'static str = "registry.name";
    pub const KEY_ALLOW_MULTIPLE_ROOTS: &'static str = "registry.allowMultipleRoots";
    pub const KEY_UI_ENABLED: &'static str = "registry.ui.enabled";

    pub const ENV_NAME: &'static str = "SESSIONHUB_NAME";
    pub const ENV_ALLOW_MULTIPLE_ROOTS: &'static str = "SESSIONHUB_ALLOW_MULTIPLE_ROOTS";
    pub const ENV_UI_ENABLED: &'static str = "SESSIONHUB_UI_ENABLED";

    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            name: "default".to_string(),
            allow_multiple_roots: false,
            ui_enabled: true,
        }
    }

    /// Set the registry name
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Allow or forbid multiple live root contexts
    pub fn allow_multiple_roots(mut self, allow: bool) -> Self {
        self.allow_multiple_roots = allow;
        self
    }

    /// Enable or disable the monitoring tab
    pub fn ui_enabled(mut self, enabled: bool) -> Self {
        self.ui_enabled = enabled;
        self
    }

    /// Build from key/value pairs
    ///
    /// Recognized keys are `registry.name`, `registry.allowMultipleRoots` and
    /// `registry.ui.enabled`. Anything else is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sessionhub::RegistryConfig;
    /// let config = RegistryConfig::from_pairs([
    ///     ("registry.allowMultipleRoots", "true"),
    ///     ("engine.executor.cores", "4"),
    /// ])
    /// .unwrap();
    /// assert!(config.allow_multiple_roots);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                Self::KEY_NAME => config.name = value.to_string(),
                Self::KEY_ALLOW_MULTIPLE_ROOTS => {
                    config.allow_multiple_roots = parse_bool(key, value)?
                }
                Self::KEY_UI_ENABLED => config.ui_enabled = parse_bool(key, value)?,
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Build from `SESSIONHUB_*` environment variables
    pub fn from_env() -> Result<Self> {
        let pairs = [
            (Self::ENV_NAME, Self::KEY_NAME),
            (Self::ENV_ALLOW_MULTIPLE_ROOTS, Self::KEY_ALLOW_MULTIPLE_ROOTS),
            (Self::ENV_UI_ENABLED, Self::KEY_UI_ENABLED),
        ]
        .into_iter()
        .filter_map(|(var, key)| std::env::var(var).ok().map(|value| (key, value)));

        Self::from_pairs(pairs)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::Config("Registry name cannot be empty".into()));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(RegistryError::Config(format!(
            "Invalid boolean for '{}': '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.name, "default");
        assert!(!config.allow_multiple_roots);
        assert!(config.ui_enabled);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RegistryConfig::new()
            .name("analytics")
            .allow_multiple_roots(true)
            .ui_enabled(false);

        assert_eq!(config.name, "analytics");
        assert!(config.allow_multiple_roots);
        assert!(!config.ui_enabled);
    }

    #[test]
    fn test_from_pairs() {
        let config = RegistryConfig::from_pairs([
            ("registry.name", "etl"),
            ("registry.allowMultipleRoots", "TRUE"),
            ("registry.ui.enabled", "off"),
            ("unrelated.key", "whatever"),
        ])
        .unwrap();

        assert_eq!(config.name, "etl");
        assert!(config.allow_multiple_roots);
        assert!(!config.ui_enabled);
    }

    #[test]
    fn test_from_pairs_rejects_bad_bool() {
        let err = RegistryConfig::from_pairs([("registry.allowMultipleRoots", "maybe")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn test_from_json() {
        let config = RegistryConfig::from_json(r#"{"allowMultipleRoots": true}"#).unwrap();
        assert!(config.allow_multiple_roots);
        assert_eq!(config.name, "default");

        assert!(RegistryConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(RegistryConfig::new().validate().is_ok());
        assert!(RegistryConfig::new().name("  ").validate().is_err());
    }
}
