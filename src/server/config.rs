use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to, e.g. "0.0.0.0:8080".
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the identity provider's session API.
    pub identity_api_url: String,
    pub identity_api_key: String,

    /// Base URLs of the spreadsheet metadata provider.
    #[serde(default = "default_drive_api_url")]
    pub drive_api_url: String,
    #[serde(default = "default_sheets_api_url")]
    pub sheets_api_url: String,
    pub spreadsheet_api_key: String,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Lifetime of the session cookie, in days.
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    identity_api_url: Option<String>,
    identity_api_key: Option<String>,
    drive_api_url: Option<String>,
    sheets_api_url: Option<String>,
    spreadsheet_api_key: Option<String>,
    templates_dir: Option<String>,
    log_dir: Option<String>,
    session_ttl_days: Option<i64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_drive_api_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_session_ttl_days() -> i64 {
    7
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                PartialServerConfig::default()
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        let final_config = ServerConfig {
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            identity_api_url: env_config
                .identity_api_url
                .or(file_config.identity_api_url)
                .ok_or("IDENTITY_API_URL is required")?,
            identity_api_key: env_config
                .identity_api_key
                .or(file_config.identity_api_key)
                .ok_or("IDENTITY_API_KEY is required")?,
            drive_api_url: env_config
                .drive_api_url
                .or(file_config.drive_api_url)
                .unwrap_or_else(default_drive_api_url),
            sheets_api_url: env_config
                .sheets_api_url
                .or(file_config.sheets_api_url)
                .unwrap_or_else(default_sheets_api_url),
            spreadsheet_api_key: env_config
                .spreadsheet_api_key
                .or(file_config.spreadsheet_api_key)
                .ok_or("SPREADSHEET_API_KEY is required")?,
            templates_dir: env_config
                .templates_dir
                .or(file_config.templates_dir)
                .unwrap_or_else(default_templates_dir),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            session_ttl_days: env_config
                .session_ttl_days
                .or(file_config.session_ttl_days)
                .unwrap_or_else(default_session_ttl_days),
        };

        Ok(final_config)
    }
}
