use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://applymate.ap-south-1.elasticbeanstalk.com/api/";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    token_file: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub token_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    /// Defaults, then the config file, then `api_url_override` (from
    /// `--api-url` / `APPLYMATE_API_URL`).
    pub fn load(config_file: Option<&Path>, api_url_override: Option<&str>) -> Result<Self> {
        let file = match config_file {
            Some(path) => Some(read_file(path)?),
            None => match default_config_path() {
                Some(path) if path.exists() => Some(read_file(&path)?),
                _ => None,
            },
        }
        .unwrap_or_default();

        let data_dir = data_dir();
        let api_url = api_url_override
            .map(str::to_string)
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_url: normalize_base_url(&api_url),
            token_file: file.token_file.unwrap_or_else(|| data_dir.join("token")),
            log_dir: file.log_dir.unwrap_or(data_dir),
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "applymate").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "applymate") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_url = \"http://localhost:5000/api\"\ntoken_file = \"/tmp/am-token\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.api_url, "http://localhost:5000/api/");
        assert_eq!(config.token_file, PathBuf::from("/tmp/am-token"));
    }

    #[test]
    fn test_override_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://localhost:5000/api/\"\n").unwrap();

        let config = Config::load(Some(&path), Some("https://staging.example/api")).unwrap();
        assert_eq!(config.api_url, "https://staging.example/api/");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base = \"oops\"\n").unwrap();
        assert!(Config::load(Some(&path), None).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml")), None).is_err());
    }

    #[test]
    fn test_token_file_defaults_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token_file.file_name().unwrap(), "token");
    }
}
