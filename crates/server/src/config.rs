use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// Mark the session cookie `Secure` (requires HTTPS in front of the server)
    #[serde(default)]
    pub cookie_secure: bool,
    /// Accounts registered with these emails become active administrators
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/vm-guardian.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
                cookie_secure: false,
                admin_emails: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;

        if let Ok(secret) = std::env::var("VMG_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if config.auth.jwt_secret == Self::default().auth.jwt_secret {
            tracing::warn!("Using the default JWT secret, set auth.jwt_secret or VMG_JWT_SECRET");
        }

        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("VMG_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        let default_paths = vec![
            PathBuf::from("vm-guardian.toml"),
            PathBuf::from("config/vm-guardian.toml"),
            PathBuf::from("/etc/vm-guardian/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            path = "/var/lib/vm-guardian/db.sqlite"

            [auth]
            jwt_secret = "s3cret"
            token_expiry_hours = 8
            cookie_secure = true
            admin_emails = ["root@school.edu"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.token_expiry_hours, 8);
        assert!(config.auth.cookie_secure);
        assert!(config.auth.is_admin_email("ROOT@school.edu "));
        assert!(!config.auth.is_admin_email("student@school.edu"));
    }

    #[test]
    fn test_auth_extras_are_optional() {
        let config = Config::parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            path = "db.sqlite"

            [auth]
            jwt_secret = "x"
            token_expiry_hours = 24
            "#,
        )
        .unwrap();

        assert!(!config.auth.cookie_secure);
        assert!(config.auth.admin_emails.is_empty());
    }

    #[test]
    fn test_missing_section_is_an_error() {
        assert!(Config::parse("[server]\nhost = \"x\"\nport = 1\n").is_err());
    }
}
