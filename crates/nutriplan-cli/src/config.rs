//! Configuration file management for nutriplan.
//!
//! Provides a TOML-based config file at `~/.config/nutriplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nutriplan_core::generator::OpenAiConfig;
use nutriplan_core::generator::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
use nutriplan_core::nutrition::BmrFormula;
use nutriplan_db::config::DbConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub nutrition: NutritionSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_owned(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionSection {
    /// BMR formula for genders without one of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unspecified_gender_formula: Option<BmrFormula>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the nutriplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/nutriplan` or
/// `~/.config/nutriplan`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nutriplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nutriplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file. `Ok(None)` when there is none.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix; the file may hold an API key.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct NutriplanConfig {
    pub db_config: DbConfig,
    pub generator: OpenAiConfig,
    pub unspecified_gender: BmrFormula,
    pub bind: String,
    pub port: u16,
}

/// A set, non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl NutriplanConfig {
    /// Resolve using the config file at the default path.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config()?;
        Ok(Self::resolve_with(cli_db_url, file))
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `NUTRIPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `NUTRIPLAN_OPENAI_API_KEY` > `OPENAI_API_KEY` > `generator.api_key` > none
    /// - Base URL / model: `NUTRIPLAN_OPENAI_BASE_URL` / `NUTRIPLAN_OPENAI_MODEL` > file > default
    pub fn resolve_with(cli_db_url: Option<&str>, file: Option<ConfigFile>) -> Self {
        let file = file.unwrap_or_default();

        let db_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| env_var("NUTRIPLAN_DATABASE_URL"))
            .unwrap_or(file.database.url);
        let mut db_config = DbConfig::from_env();
        db_config.database_url = db_url;

        let generator = OpenAiConfig {
            base_url: env_var("NUTRIPLAN_OPENAI_BASE_URL")
                .or(file.generator.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            api_key: env_var("NUTRIPLAN_OPENAI_API_KEY")
                .or_else(|| env_var("OPENAI_API_KEY"))
                .or(file.generator.api_key),
            model: env_var("NUTRIPLAN_OPENAI_MODEL")
                .or(file.generator.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            timeout: file
                .generator
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        };

        Self {
            db_config,
            generator,
            unspecified_gender: file.nutrition.unspecified_gender_formula.unwrap_or_default(),
            bind: file.server.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            port: file.server.port.unwrap_or(DEFAULT_PORT),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    const ENV_VARS: &[&str] = &[
        "NUTRIPLAN_DATABASE_URL",
        "NUTRIPLAN_OPENAI_API_KEY",
        "OPENAI_API_KEY",
        "NUTRIPLAN_OPENAI_BASE_URL",
        "NUTRIPLAN_OPENAI_MODEL",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            unsafe { std::env::remove_var(name) };
        }
    }

    fn file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_owned(),
            },
            generator: GeneratorSection {
                base_url: Some("http://llm.internal/v1".to_owned()),
                model: Some("gpt-4o-mini".to_owned()),
                api_key: Some("sk-file".to_owned()),
                timeout_secs: Some(30),
            },
            nutrition: NutritionSection {
                unspecified_gender_formula: Some(BmrFormula::Male),
            },
            server: ServerSection {
                bind: Some("0.0.0.0".to_owned()),
                port: Some(8080),
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nutriplan").join("config.toml");

        let original = file();
        save_config_to(&original, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn minimal_file_uses_section_defaults() {
        let loaded: ConfigFile =
            toml::from_str("[database]\nurl = \"postgresql://h/db\"\n").unwrap();
        assert_eq!(loaded.database.url, "postgresql://h/db");
        assert_eq!(loaded.generator, GeneratorSection::default());
        assert_eq!(loaded.nutrition.unspecified_gender_formula, None);
    }

    #[test]
    fn unknown_formula_is_a_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[database]\nurl = \"x\"\n[nutrition]\nunspecified_gender_formula = \"other\"\n",
        )
        .unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&ConfigFile::default(), &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("NUTRIPLAN_DATABASE_URL", "postgresql://env:5432/envdb") };

        let config = NutriplanConfig::resolve_with(Some("postgresql://cli:5432/clidb"), Some(file()));
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        clear_env();
    }

    #[test]
    fn resolve_env_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("NUTRIPLAN_DATABASE_URL", "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-generic") };
        unsafe { std::env::set_var("NUTRIPLAN_OPENAI_MODEL", "gpt-4.1") };

        let config = NutriplanConfig::resolve_with(None, Some(file()));
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.generator.api_key.as_deref(), Some("sk-generic"));
        assert_eq!(config.generator.model, "gpt-4.1");
        assert_eq!(config.generator.base_url, "http://llm.internal/v1");

        // The product-specific key wins over the generic one.
        unsafe { std::env::set_var("NUTRIPLAN_OPENAI_API_KEY", "sk-specific") };
        let config = NutriplanConfig::resolve_with(None, Some(file()));
        assert_eq!(config.generator.api_key.as_deref(), Some("sk-specific"));

        clear_env();
    }

    #[test]
    fn resolve_reads_config_file() {
        let _lock = lock_env();
        clear_env();

        let config = NutriplanConfig::resolve_with(None, Some(file()));
        assert_eq!(config.db_config.database_url, "postgresql://filehost:5432/filedb");
        assert_eq!(config.generator.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.generator.timeout, Duration::from_secs(30));
        assert_eq!(config.unspecified_gender, BmrFormula::Male);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = NutriplanConfig::resolve_with(None, None);
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.generator, OpenAiConfig::default());
        assert_eq!(config.unspecified_gender, BmrFormula::Female);
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn blank_env_vars_are_ignored() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("NUTRIPLAN_OPENAI_API_KEY", "  ") };

        let config = NutriplanConfig::resolve_with(None, Some(file()));
        assert_eq!(config.generator.api_key.as_deref(), Some("sk-file"));

        clear_env();
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("nutriplan/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
