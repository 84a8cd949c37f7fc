use crate::config::Strategy;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_email, validate_password, validate_positive_number, validate_url, Validate,
};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "deysis-checkin")]
#[command(about = "Submits an attendance check-in to the Deysis portal")]
pub struct CliConfig {
    #[arg(long, default_value = "https://deysis.deu.edu.tr")]
    pub portal_url: String,

    #[arg(long, value_enum, default_value = "http")]
    pub strategy: Strategy,

    /// University e-mail used to log in.
    #[arg(long)]
    pub email: String,

    /// Portal password. Prefer the DEYSIS_PASSWORD environment variable over
    /// the flag so the secret stays out of shell history.
    #[arg(long, env = "DEYSIS_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// 6-digit course code announced in the session.
    #[arg(long)]
    pub code: String,

    #[arg(long, default_value = "38.36715")]
    pub anchor_latitude: f64,

    #[arg(long, default_value = "27.203146")]
    pub anchor_longitude: f64,

    #[arg(long, default_value = "3")]
    pub max_attempts: u32,

    #[arg(long, default_value = "3")]
    pub retry_delay_seconds: u64,

    /// Browser strategy only: run Chromium with a visible window.
    #[arg(long)]
    pub headed: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("portal_url", &self.portal_url)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_positive_number("max_attempts", self.max_attempts, 1)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "deysis-checkin",
            "--email",
            "student@ogr.deu.edu.tr",
            "--password",
            "hunter2",
            "--code",
            "123456",
        ]
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::parse_from(base_args());
        assert_eq!(config.portal_url, "https://deysis.deu.edu.tr");
        assert_eq!(config.strategy, Strategy::Http);
        assert_eq!(config.max_attempts, 3);
        assert!(!config.headed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_flag() {
        let mut args = base_args();
        args.extend(["--strategy", "browser"]);
        let config = CliConfig::parse_from(args);
        assert_eq!(config.strategy, Strategy::Browser);
    }

    #[test]
    fn test_validation_rejects_foreign_email() {
        let mut config = CliConfig::parse_from(base_args());
        config.email = "someone@gmail.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = CliConfig::parse_from(base_args());
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
