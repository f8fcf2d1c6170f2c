//! Optional user configuration.
//!
//! Read from `config.toml` in the platform config directory, or from an
//! explicit path. Every field has a default, so a missing file, section or
//! key is never an error. Cryptographic parameters are not configurable;
//! they are fixed by the envelope version.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralSection,
    pub tutor: TutorSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// Print narration steps for every operation.
    pub explain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorSection {
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for TutorSection {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("invalid configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given (it must exist), otherwise the default location
    /// if a file is present there, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_file(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tutor.timeout_secs == 0 {
            bail!("tutor.timeout_secs must be >= 1");
        }
        if !self.tutor.base_url.starts_with("http://") && !self.tutor.base_url.starts_with("https://")
        {
            bail!("tutor.base_url must be an http(s) URL");
        }
        if self.tutor.model.trim().is_empty() {
            bail!("tutor.model cannot be empty");
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cipherlab").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [general]
            explain = true

            [tutor]
            model = "gemini-2.5-flash"
            "#,
        )
        .unwrap();

        assert!(config.general.explain);
        assert_eq!(config.tutor.model, "gemini-2.5-flash");
        assert_eq!(config.tutor.timeout_secs, 30);
        assert_eq!(config.tutor.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn invalid_values_fail() {
        assert!(Config::from_toml_str("[tutor]\ntimeout_secs = 0").is_err());
        assert!(Config::from_toml_str("[tutor]\nbase_url = \"ftp://x\"").is_err());
        assert!(Config::from_toml_str("[general]\nexplain = \"yes\"").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[general]\nexplain = true\n").unwrap();

        assert!(Config::load(Some(&path)).unwrap().general.explain);
    }
}
