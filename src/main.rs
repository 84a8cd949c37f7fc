use clap::Parser;
use deysis_checkin::utils::{logger, validation::Validate};
use deysis_checkin::{
    ApiAttendanceClient, BrowserAttendanceClient, BrowserSessionConfig, CheckInEngine, CliConfig,
    Coordinate, Credentials, GeolocationJitter, Outcome, RetryPolicy, Strategy,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting deysis-checkin");
    if config.verbose {
        tracing::debug!(
            "Portal: {}, strategy: {:?}, retries: {}",
            config.portal_url,
            config.strategy,
            config.max_attempts
        );
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let credentials = Credentials::new(config.email.clone(), config.password.clone());
    let anchor = Coordinate::new(config.anchor_latitude, config.anchor_longitude);
    let jitter = GeolocationJitter::new(anchor);
    let retry = RetryPolicy::new(
        config.max_attempts,
        Duration::from_secs(config.retry_delay_seconds),
    );

    let result = match config.strategy {
        Strategy::Http => {
            let client = ApiAttendanceClient::new(config.portal_url.clone(), retry);
            CheckInEngine::new(client, jitter)
                .run(&credentials, &config.code)
                .await
        }
        Strategy::Browser => {
            let mut session = BrowserSessionConfig::new(config.portal_url.clone());
            session.headless = !config.headed;
            session.anchor = anchor;
            session.retry = retry;
            let client = BrowserAttendanceClient::new(session);
            CheckInEngine::new(client, jitter)
                .run(&credentials, &config.code)
                .await
        }
    };

    match result {
        Ok(Outcome::Success { message, .. }) => {
            tracing::info!("✅ Check-in successful");
            println!("✅ Check-in successful: {}", message);
        }
        Ok(Outcome::Failure {
            kind,
            message,
            raw_signal,
            ..
        }) => {
            tracing::warn!("❌ Check-in failed ({:?}): {}", kind, message);
            eprintln!("❌ Check-in failed ({:?}): {}", kind, message);
            if let Some(signal) = raw_signal {
                eprintln!("   Portal said: {}", signal);
            }
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!("❌ Check-in attempt errored: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
