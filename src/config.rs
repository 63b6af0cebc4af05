//! Configuration types for Apisnare

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::{Result, SnareError};

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// URL the capture session navigates to first
    pub start_url: String,
    /// Path to a browser executable; the system default is used when unset
    #[serde(default)]
    pub browser_path: Option<PathBuf>,
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
    /// Browser viewport size
    #[serde(default)]
    pub viewport: ViewportConfig,
    /// Directory to write exported records into; stdout when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SnareError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SnareError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    ///
    /// # Panics
    ///
    /// Panics if the viewport is zero-sized (programming error)
    pub fn validate(&self) -> Result<()> {
        // Validate start URL
        let parsed = Url::parse(&self.start_url)
            .map_err(|e| SnareError::Config(format!("Invalid start_url: {e}")))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SnareError::Config(format!(
                "start_url must use http or https, got: {}",
                parsed.scheme()
            )));
        }

        // Validate output directory
        if let Some(dir) = &self.output_dir {
            if !dir.exists() {
                return Err(SnareError::Config(format!(
                    "Output directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        // Validate viewport
        assert!(self.viewport.width > 0, "viewport width must be > 0");
        assert!(self.viewport.height > 0, "viewport height must be > 0");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            start_url = "https://api.example.com/topics"
            debug = true
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.start_url, "https://api.example.com/topics");
        assert!(config.debug);
        assert_eq!(config.viewport, ViewportConfig::default());
        assert!(config.browser_path.is_none());
    }

    #[test]
    fn test_config_default_viewport() {
        let viewport = ViewportConfig::default();
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }

    #[test]
    fn test_config_validation() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            start_url = "https://api.example.com/topics"

            [viewport]
            width = 1280
            height = 720
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
    }

    #[test]
    fn test_invalid_config_bad_scheme() {
        let config = Config {
            start_url: "ftp://example.com".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_empty_url() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_missing_output_dir() {
        let config = Config {
            start_url: "https://example.com".to_string(),
            output_dir: Some(PathBuf::from("/nonexistent/apisnare/output")),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }
}
