use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub persona: PersonaSelection,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Remote store connection string. `None` runs everything local-only.
    pub database_url: Option<String>,
    pub local_data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub free_habit_limit: usize,
    pub trial_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSelection {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub force_guest_mode: bool,
}

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Config::from_lookup(|_| None).providers
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            local_data_dir: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Config::from_lookup(|_| None).limits
    }
}

impl Default for PersonaSelection {
    fn default() -> Self {
        Self {
            name: "buddy".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            force_guest_mode: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl Config {
    /// Builds a config from a variable lookup. `Default` feeds it the process
    /// environment; tests feed it a fixed table.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            providers: ProvidersConfig {
                gemini_api_key: non_empty(lookup("GEMINI_API_KEY")),
                gemini_model: lookup("GEMINI_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                groq_api_key: non_empty(lookup("GROQ_API_KEY")),
                groq_model: lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                groq_base_url: lookup("GROQ_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
                timeout_secs: parse_or(lookup("AI_TIMEOUT_SECS"), 30),
            },
            storage: StorageConfig {
                database_url: non_empty(lookup("DATABASE_URL")),
                local_data_dir: non_empty(lookup("LOCAL_DATA_DIR")),
            },
            limits: LimitsConfig {
                free_habit_limit: parse_or(lookup("FREE_HABIT_LIMIT"), 3),
                trial_days: parse_or(lookup("TRIAL_DAYS"), 7),
            },
            persona: PersonaSelection {
                name: lookup("PERSONA").unwrap_or_else(|| "buddy".to_string()),
            },
            session: SessionConfig {
                force_guest_mode: parse_or(lookup("FORCE_GUEST_MODE"), false),
            },
        }
    }

    /// Loads `.env`, then the TOML file (explicit path or the platform config
    /// dir), then lets environment variables win over file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        let config_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };

        if let Some(config_path) = config_path {
            if config_path.exists() {
                match std::fs::read_to_string(&config_path) {
                    Ok(contents) => match toml::from_str::<Config>(&contents) {
                        Ok(file_config) => {
                            config = Self::merge_configs(file_config, config, |name| {
                                std::env::var(name).is_ok()
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to parse {}: {}", config_path.display(), e);
                        }
                    },
                    Err(e) => {
                        tracing::error!("Failed to read {}: {}", config_path.display(), e);
                    }
                }
            }
        }

        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("antigravity").join("config.toml"))
    }

    pub fn has_any_provider(&self) -> bool {
        self.providers.gemini_api_key.is_some() || self.providers.groq_api_key.is_some()
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let base = &self.providers.groq_base_url;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            errors.push("Invalid Groq base URL format".to_string());
        }

        if self.providers.timeout_secs == 0 {
            errors.push("AI timeout must be greater than 0".to_string());
        }

        if self.limits.trial_days < 0 {
            errors.push("Trial days must not be negative".to_string());
        }

        if let Some(url) = &self.storage.database_url {
            if !url.starts_with("sqlite:") {
                errors.push("Only sqlite: database URLs are supported".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Environment variables take precedence over file config.
    fn merge_configs<F>(file_config: Config, env_config: Config, is_set: F) -> Config
    where
        F: Fn(&str) -> bool,
    {
        let pick = |name: &str| is_set(name);

        Config {
            providers: ProvidersConfig {
                gemini_api_key: if pick("GEMINI_API_KEY") {
                    env_config.providers.gemini_api_key
                } else {
                    non_empty(file_config.providers.gemini_api_key)
                },
                gemini_model: if pick("GEMINI_MODEL") {
                    env_config.providers.gemini_model
                } else {
                    file_config.providers.gemini_model
                },
                groq_api_key: if pick("GROQ_API_KEY") {
                    env_config.providers.groq_api_key
                } else {
                    non_empty(file_config.providers.groq_api_key)
                },
                groq_model: if pick("GROQ_MODEL") {
                    env_config.providers.groq_model
                } else {
                    file_config.providers.groq_model
                },
                groq_base_url: if pick("GROQ_BASE_URL") {
                    env_config.providers.groq_base_url
                } else {
                    file_config.providers.groq_base_url
                },
                timeout_secs: if pick("AI_TIMEOUT_SECS") {
                    env_config.providers.timeout_secs
                } else {
                    file_config.providers.timeout_secs
                },
            },
            storage: StorageConfig {
                database_url: if pick("DATABASE_URL") {
                    env_config.storage.database_url
                } else {
                    file_config.storage.database_url
                },
                local_data_dir: if pick("LOCAL_DATA_DIR") {
                    env_config.storage.local_data_dir
                } else {
                    file_config.storage.local_data_dir
                },
            },
            limits: LimitsConfig {
                free_habit_limit: if pick("FREE_HABIT_LIMIT") {
                    env_config.limits.free_habit_limit
                } else {
                    file_config.limits.free_habit_limit
                },
                trial_days: if pick("TRIAL_DAYS") {
                    env_config.limits.trial_days
                } else {
                    file_config.limits.trial_days
                },
            },
            persona: if pick("PERSONA") {
                env_config.persona
            } else {
                file_config.persona
            },
            session: if pick("FORCE_GUEST_MODE") {
                env_config.session
            } else {
                file_config.session
            },
        }
    }

    /// Copy safe to print: configured API keys are masked.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***".to_string());
        let mut config = self.clone();
        config.providers.gemini_api_key = mask(&self.providers.gemini_api_key);
        config.providers.groq_api_key = mask(&self.providers.groq_api_key);
        config
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Configuration(format!("Failed to create config dir: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| AppError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| AppError::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| table.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.providers.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.providers.groq_model, "llama-3.3-70b-versatile");
        assert_eq!(config.providers.timeout_secs, 30);
        assert_eq!(config.limits.free_habit_limit, 3);
        assert_eq!(config.limits.trial_days, 7);
        assert_eq!(config.persona.name, "buddy");
        assert!(!config.session.force_guest_mode);
        assert!(!config.has_any_provider());
    }

    #[test]
    fn test_blank_keys_are_missing() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")]));
        assert!(config.providers.gemini_api_key.is_none());
        assert!(!config.has_any_provider());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::from_lookup(|_| None);
        assert!(config.validate().is_ok());

        config.providers.groq_base_url = "invalid-url".to_string();
        assert!(config.validate().is_err());

        config = Config::from_lookup(|_| None);
        config.providers.timeout_secs = 0;
        assert!(config.validate().is_err());

        config = Config::from_lookup(|_| None);
        config.storage.database_url = Some("postgres://nope".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_wins_over_file() {
        let env = Config::from_lookup(lookup_from(&[("GROQ_MODEL", "env-model")]));
        let file: Config = toml::from_str(
            r#"
            [providers]
            groq_model = "file-model"
            gemini_model = "gemini-file"

            [limits]
            free_habit_limit = 5
            "#,
        )
        .unwrap();

        let merged = Config::merge_configs(file, env, |name| name == "GROQ_MODEL");
        assert_eq!(merged.providers.groq_model, "env-model");
        assert_eq!(merged.providers.gemini_model, "gemini-file");
        assert_eq!(merged.limits.free_habit_limit, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::from_lookup(|_| None);
        config.persona.name = "coach".to_string();
        config.save_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let reloaded: Config = toml::from_str(&contents).unwrap();
        assert_eq!(reloaded.persona.name, "coach");
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = Config::default();
        config.providers.gemini_api_key = Some("gm-secret".to_string());
        config.providers.groq_api_key = None;

        let printed = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!printed.contains("gm-secret"));
        assert_eq!(config.redacted().providers.gemini_api_key.as_deref(), Some("***"));
        assert_eq!(config.redacted().providers.groq_api_key, None);
        assert_eq!(config.providers.gemini_api_key.as_deref(), Some("gm-secret"));
    }
}
