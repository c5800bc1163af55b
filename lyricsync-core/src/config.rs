use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricsyncConfig {
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Directory holding `<song name>.lrc` files. Fetched lyrics are saved here.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Lines shown on each side of the current line
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Fetch lyrics that are not found locally
    #[serde(default = "default_true")]
    pub auto_fetch: bool,
    /// Shift line times by the document's `[offset:]` tag
    #[serde(default)]
    pub apply_offset: bool,
}

const fn default_context_lines() -> usize {
    3
}

const fn default_true() -> bool {
    true
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            context_lines: default_context_lines(),
            auto_fetch: true,
            apply_offset: false,
        }
    }
}

impl LyricsConfig {
    /// Configured lyrics directory, or `~/.config/lyricsync/lyrics`
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(crate::paths::lyrics_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Most tracks kept loaded at once; 0 keeps every track
    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,
    /// Stop a running fetch when its track is invalidated
    #[serde(default = "default_true")]
    pub cancel_stale_fetches: bool,
}

const fn default_max_tracks() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_tracks: default_max_tracks(),
            cancel_stale_fetches: true,
        }
    }
}

/// Provider order plus one table per provider.
///
/// Provider crates read their own table with [`ProvidersConfig::get`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Providers are tried in order; first result wins
    #[serde(default = "default_provider_order")]
    pub order: Vec<String>,
    #[serde(flatten)]
    pub settings: HashMap<String, toml::Value>,
}

fn default_provider_order() -> Vec<String> {
    vec!["lrclib".to_string()]
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_provider_order(),
            settings: HashMap::new(),
        }
    }
}

impl ProvidersConfig {
    /// Deserialize the table for provider `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.settings
            .get(name)
            .map(|value| {
                value
                    .clone()
                    .try_into()
                    .map_err(|e: toml::de::Error| CoreError::ConfigInvalid {
                        message: format!("providers.{name}: {e}"),
                    })
            })
            .transpose()
    }

    /// Whether provider `name` is listed in `order`
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.order.iter().any(|provider| provider == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `~/.config/lyricsync/lyricsync.log`
    #[serde(default)]
    pub enabled: bool,
}

impl LyricsyncConfig {
    /// Get the configuration directory path (~/.config/lyricsync/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lyricsync/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// `provider_templates` are appended to the base template so each
    /// provider documents its own table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if
    /// the file cannot be read, parsed or validated.
    pub fn load_or_create(provider_templates: &[&str]) -> Result<Self> {
        Self::load_or_create_at(&Self::config_path(), provider_templates)
    }

    /// Like [`Self::load_or_create`], for a config file at `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if
    /// the file cannot be read, parsed or validated.
    pub fn load_or_create_at(path: &Path, provider_templates: &[&str]) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, build_config_template(provider_templates))?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        Self::load_from(path)
    }

    /// Load and validate the config file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.providers.order.iter().any(|name| name.trim().is_empty()) {
            return Err(CoreError::ConfigInvalid {
                message: "providers.order contains an empty provider name".into(),
            });
        }
        if let Some((name, _)) = self
            .providers
            .settings
            .iter()
            .find(|(_, value)| !value.is_table())
        {
            return Err(CoreError::ConfigInvalid {
                message: format!("providers.{name} must be a table"),
            });
        }
        if self
            .lyrics
            .directory
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(CoreError::ConfigInvalid {
                message: "lyrics.directory must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Base template followed by each provider's own section
#[must_use]
pub fn build_config_template(provider_templates: &[&str]) -> String {
    let mut template = String::from(CONFIG_TEMPLATE);
    for provider in provider_templates {
        template.push('\n');
        template.push_str(provider);
    }
    template
}

pub const CONFIG_TEMPLATE: &str = r#"# Lyricsync Configuration
# ~/.config/lyricsync/config.toml

[lyrics]
# Where <song name>.lrc files live; fetched lyrics are saved here too
# directory = "~/.config/lyricsync/lyrics"
# Lines shown above and below the current line
context_lines = 3
# Fetch lyrics from providers when no local file exists
auto_fetch = true
# Shift line times by the [offset:] tag of each document
apply_offset = false

[cache]
# Most tracks kept in memory; 0 keeps every track
max_tracks = 256
# Stop a running fetch when its track is reloaded
cancel_stale_fetches = true

[logging]
# Also write logs to ~/.config/lyricsync/lyricsync.log
enabled = false

[providers]
# Providers are tried in order; first result wins
order = ["lrclib"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ExampleProvider {
        base_url: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config = LyricsyncConfig::from_toml_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.lyrics.context_lines, 3);
        assert!(config.lyrics.auto_fetch);
        assert!(!config.lyrics.apply_offset);
        assert_eq!(config.cache.max_tracks, 256);
        assert!(config.cache.cancel_stale_fetches);
        assert_eq!(config.providers.order, vec!["lrclib"]);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LyricsyncConfig::from_toml_str("").unwrap();
        assert_eq!(config.lyrics.context_lines, 3);
        assert_eq!(config.cache.max_tracks, 256);
        assert!(config.providers.is_enabled("lrclib"));
        assert_eq!(config.lyrics.directory(), crate::paths::lyrics_dir());
    }

    #[test]
    fn test_provider_tables() {
        let config = LyricsyncConfig::from_toml_str(
            r#"
[providers]
order = ["example"]

[providers.example]
base_url = "http://localhost"
retries = 2
"#,
        )
        .unwrap();

        let example: Option<ExampleProvider> = config.providers.get("example").unwrap();
        assert_eq!(
            example,
            Some(ExampleProvider {
                base_url: "http://localhost".into(),
                retries: 2,
            })
        );
        let missing: Option<ExampleProvider> = config.providers.get("other").unwrap();
        assert!(missing.is_none());
        assert!(!config.providers.is_enabled("lrclib"));
    }

    #[test]
    fn test_provider_table_type_mismatch() {
        let config = LyricsyncConfig::from_toml_str(
            "[providers.example]\nbase_url = 5\n",
        )
        .unwrap();
        let result: Result<Option<ExampleProvider>> = config.providers.get("example");
        assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            LyricsyncConfig::from_toml_str("[providers]\norder = [\"\"]\n"),
            Err(CoreError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            LyricsyncConfig::from_toml_str("[providers]\nlrclib = 3\n"),
            Err(CoreError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            LyricsyncConfig::from_toml_str("[lyrics]\ndirectory = \"\"\n"),
            Err(CoreError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            LyricsyncConfig::from_toml_str("[cache]\nmax_tracks = \"many\"\n"),
            Err(CoreError::ConfigParseError(_))
        ));
    }

    #[test]
    fn test_build_config_template_appends_providers() {
        let template = build_config_template(&["[providers.example]\nbase_url = \"x\"\n"]);
        assert!(template.starts_with(CONFIG_TEMPLATE));
        let config = LyricsyncConfig::from_toml_str(&template).unwrap();
        assert!(config.providers.settings.contains_key("example"));
    }

    #[test]
    fn test_load_or_create_writes_template() {
        let dir = std::env::temp_dir().join(format!("lyricsync-config-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let first = LyricsyncConfig::load_or_create_at(&path, &[]);
        assert!(matches!(first, Err(CoreError::ConfigNotFound { .. })));
        assert!(path.exists());

        let second = LyricsyncConfig::load_or_create_at(&path, &[]).unwrap();
        assert_eq!(second.lyrics.context_lines, 3);

        let _ = fs::remove_dir_all(&dir);
    }
}
