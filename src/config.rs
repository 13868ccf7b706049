use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const APP_DIR: &str = ".noteporter";

/// Settings required before any network activity. Sourced from a YAML
/// config file with environment-variable overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion_token: String,
    #[serde(default)]
    pub memos_url: String,
    #[serde(default)]
    pub memos_token: String,
}

/// Load configuration from `path` (or the default locations) plus
/// `NOTION_TOKEN` / `MEMOS_URL` / `MEMOS_TOKEN` environment overrides.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    match path {
        Some(p) => {
            builder = builder.add_source(config::File::from(p));
        }
        None => {
            // Default: ~/.noteporter/config.yaml, then ./config.yaml.
            // A missing file is fine as long as the env vars cover it.
            let default = config_path()?;
            builder = builder
                .add_source(config::File::from(default).required(false))
                .add_source(config::File::with_name("config").required(false));
        }
    }

    let settings = builder
        .add_source(config::Environment::default())
        .build()
        .map_err(|e| Error::Config(e.to_string()))?;

    let cfg: Config = settings
        .try_deserialize()
        .map_err(|e| Error::Config(e.to_string()))?;

    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<()> {
    if cfg.notion_token.is_empty() {
        return Err(Error::Config(
            "notion_token is required (set via config file or NOTION_TOKEN env var)".into(),
        ));
    }
    if cfg.memos_url.is_empty() {
        return Err(Error::Config(
            "memos_url is required (set via config file or MEMOS_URL env var)".into(),
        ));
    }
    if cfg.memos_token.is_empty() {
        return Err(Error::Config(
            "memos_token is required (set via config file or MEMOS_TOKEN env var)".into(),
        ));
    }
    Ok(())
}

pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("failed to determine home directory".into()))?;
    Ok(home.join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yaml"))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("state.json"))
}

const CONFIG_TEMPLATE: &str = r#"# noteporter configuration
# Get your Notion token from https://www.notion.so/my-integrations
notion_token: "YOUR_NOTION_TOKEN_HERE"

# Your Memos instance URL (e.g. https://memos.example.com)
memos_url: "YOUR_MEMOS_URL_HERE"

# Get your Memos token from Settings -> Access Tokens in Memos
memos_token: "YOUR_MEMOS_TOKEN_HERE"
"#;

/// Write a config template at the default location. Refuses to overwrite.
pub fn write_template() -> Result<PathBuf> {
    let path = config_path()?;
    if path.exists() {
        return Err(Error::Config(format!(
            "config file already exists at {}",
            path.display()
        )));
    }
    std::fs::create_dir_all(config_dir()?)?;
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_fields() {
        let cfg = Config {
            notion_token: "secret".into(),
            memos_url: String::new(),
            memos_token: "token".into(),
        };
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("memos_url"));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let cfg = Config {
            notion_token: "secret".into(),
            memos_url: "https://memos.example.com".into(),
            memos_token: "token".into(),
        };
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "notion_token: \"nt\"\nmemos_url: \"https://m.example.com\"\nmemos_token: \"mt\"\n",
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.notion_token, "nt");
        assert_eq!(cfg.memos_url, "https://m.example.com");
        assert_eq!(cfg.memos_token, "mt");
    }
}
