use std::path::PathBuf;

use jsontable_core::{AppError, PanelConfig};

pub const DEFAULT_PORT: u16 = 3000;

/// Process-level settings for the server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Panel JSON file. Without one the panel is built from env vars alone.
    pub panel_config: Option<PathBuf>,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `JSONTABLE_SERVER_PORT` (optional, defaults to 3000)
    /// - `JSONTABLE_CONFIG` (optional, path to the panel JSON file)
    /// - `JSONTABLE_ADMIN_TOKEN` (optional, enables `POST /v1/fetch`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match var("JSONTABLE_SERVER_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid JSONTABLE_SERVER_PORT '{raw}': must be a port number"
                ))
            })?,
        };

        let panel_config = var("JSONTABLE_CONFIG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let admin_token = var("JSONTABLE_ADMIN_TOKEN").filter(|t| !t.is_empty());

        Ok(Self {
            port,
            panel_config,
            admin_token,
        })
    }

    /// Load the panel file (if any), overlay env vars and validate.
    pub fn load_panel(&self) -> Result<PanelConfig, AppError> {
        let config = match &self.panel_config {
            Some(path) => PanelConfig::from_file(path)?,
            None => PanelConfig::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }
}
