use crate::config::Strategy;
use crate::utils::error::{CheckInError, Result};
use crate::utils::validation::{validate_positive_number, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML file configuration, for running the same check-in setup repeatedly
/// without retyping flags. Credentials deliberately stay out of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub portal: PortalConfig,
    pub geolocation: Option<GeolocationConfig>,
    pub retry: Option<RetryConfig>,
    pub browser: Option<BrowserConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub url: String,
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub backoff_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: Option<bool>,
    pub settle_delay_seconds: Option<u64>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).map_err(|e| CheckInError::Config {
            message: format!("TOML parse error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Validate for FileConfig {
    fn validate(&self) -> Result<()> {
        validate_url("portal.url", &self.portal.url)?;

        if let Some(retry) = &self.retry {
            if let Some(attempts) = retry.max_attempts {
                validate_positive_number("retry.max_attempts", attempts, 1)?;
            }
        }

        if let Some(geo) = &self.geolocation {
            if !(-90.0..=90.0).contains(&geo.latitude) {
                return Err(CheckInError::InvalidConfigValue {
                    field: "geolocation.latitude".to_string(),
                    value: geo.latitude.to_string(),
                    reason: "Latitude must be between -90 and 90".to_string(),
                });
            }
            if !(-180.0..=180.0).contains(&geo.longitude) {
                return Err(CheckInError::InvalidConfigValue {
                    field: "geolocation.longitude".to_string(),
                    value: geo.longitude.to_string(),
                    reason: "Longitude must be between -180 and 180".to_string(),
                });
            }
        }

        Ok(())
    }
}
