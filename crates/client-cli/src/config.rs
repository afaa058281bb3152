use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: Option<String>,
    pub token: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("edu", "vm-guardian", "vmg")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Command line flag, then config file, then the default
    pub fn server_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.remote.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config {
            remote: RemoteConfig {
                server: Some("https://vms.school.edu".to_string()),
                token: Some("abc".to_string()),
            },
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.remote.server.as_deref(), Some("https://vms.school.edu"));
        assert_eq!(parsed.remote.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_empty_file_is_default() {
        let parsed: Config = toml::from_str("").unwrap();
        assert!(parsed.remote.server.is_none());
    }

    #[test]
    fn test_server_url_precedence() {
        let mut config = Config::default();
        assert_eq!(config.server_url(None), DEFAULT_SERVER);

        config.remote.server = Some("https://vms.school.edu/".to_string());
        assert_eq!(config.server_url(None), "https://vms.school.edu");
        assert_eq!(
            config.server_url(Some("http://127.0.0.1:9000".to_string())),
            "http://127.0.0.1:9000"
        );
    }
}
