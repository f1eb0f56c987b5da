use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Length of the random suffix of a generated meeting link.
const MEETING_CODE_LEN: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Runtime configuration for the portal server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalConfig {
    pub host: String,
    pub port: u16,
    /// Path of the SQLite database file
    pub database_path: String,
    /// Default tracing filter directive. `RUST_LOG` takes precedence.
    pub log_filter: String,
    /// Prefix of generated meeting links for online appointments
    pub meeting_link_base: String,
    /// Location given to approved offline appointments
    pub office_location: String,
    /// Admin account created or updated at startup
    pub admin: Option<AdminSeed>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "careerportal.sqlite3".to_string(),
            log_filter: "careerportal=info".to_string(),
            meeting_link_base: "https://meet.careerportal.local/".to_string(),
            office_location: "Counselling Office".to_string(),
            admin: None,
        }
    }
}

impl PortalConfig {
    /// Loads defaults, then the optional JSON file, then `PORTAL_` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `PORTAL_ADMIN__EMAIL`.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(PortalConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed("PORTAL_").split("__")).extract()
    }

    /// A fresh meeting link under `meeting_link_base`.
    pub fn new_meeting_link(&self) -> String {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(MEETING_CODE_LEN)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        format!("{}{code}", self.meeting_link_base)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        figment::Jail::expect_with(|_jail| {
            let config = PortalConfig::load(None)?;
            assert_eq!(config, PortalConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "portal.json",
                r#"{ "port": 9000, "office_location": "Room 4",
                     "admin": { "email": "root@portal.test", "name": "Root", "password": "pw" } }"#,
            )?;
            jail.set_env("PORTAL_PORT", "9100");
            jail.set_env("PORTAL_ADMIN__NAME", "Head Admin");

            let config = PortalConfig::load(Some(Path::new("portal.json")))?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.office_location, "Room 4");
            assert_eq!(config.admin.as_ref().unwrap().name, "Head Admin");
            assert_eq!(config.bind_address(), "127.0.0.1:9100");
            Ok(())
        });
    }

    #[test]
    fn test_meeting_link_shape() {
        let config = PortalConfig::default();
        let link = config.new_meeting_link();
        let code = link.strip_prefix(&config.meeting_link_base).unwrap();
        assert_eq!(code.len(), MEETING_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
