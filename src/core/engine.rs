use crate::core::geo::GeolocationJitter;
use crate::domain::model::{Credentials, Outcome};
use crate::domain::ports::AttendanceClient;
use crate::utils::error::Result;
use crate::utils::validation::validate_course_code;

/// One complete check-in attempt: validate, authenticate, jitter a
/// coordinate, submit, classify. The session is released on every exit
/// path; a client is never reused across two attempts.
pub struct CheckInEngine<C: AttendanceClient> {
    client: C,
    jitter: GeolocationJitter,
}

impl<C: AttendanceClient> CheckInEngine<C> {
    pub fn new(client: C, jitter: GeolocationJitter) -> Self {
        Self { client, jitter }
    }

    pub async fn run(mut self, credentials: &Credentials, raw_code: &str) -> Result<Outcome> {
        // Reject malformed codes before any network traffic.
        let code = validate_course_code(raw_code)?;

        tracing::info!("Starting check-in attempt for code {}", code);

        let result = async {
            self.client.authenticate(credentials).await?;

            let location = self.jitter.next_coordinate();
            tracing::debug!("Using jittered location {}", location);

            self.client.submit_check_in(&code, location).await
        }
        .await;

        // Teardown happens no matter how the attempt went.
        self.client.close().await;

        match &result {
            Ok(outcome) if outcome.is_success() => {
                tracing::info!("Check-in succeeded for code {}", code);
            }
            Ok(outcome) => {
                tracing::warn!("Check-in failed for code {}: {:?}", code, outcome);
            }
            Err(err) => {
                tracing::error!("Check-in attempt errored for code {}: {}", code, err);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Coordinate, CourseCode, FailureKind};
    use crate::utils::error::CheckInError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recording {
        authenticated: AtomicU32,
        submitted: AtomicU32,
        closed: AtomicBool,
    }

    struct FakeClient {
        record: Arc<Recording>,
        auth_result: Option<CheckInError>,
        outcome: Outcome,
    }

    impl FakeClient {
        fn succeeding(record: Arc<Recording>) -> Self {
            Self {
                record,
                auth_result: None,
                outcome: Outcome::success("ok"),
            }
        }

        fn rejecting_auth(record: Arc<Recording>) -> Self {
            Self {
                record,
                auth_result: Some(CheckInError::Auth {
                    status: 401,
                    body: "bad credentials".to_string(),
                }),
                outcome: Outcome::success("unreachable"),
            }
        }
    }

    #[async_trait]
    impl AttendanceClient for FakeClient {
        async fn authenticate(&mut self, _credentials: &Credentials) -> Result<()> {
            self.record.authenticated.fetch_add(1, Ordering::SeqCst);
            match self.auth_result.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn submit_check_in(
            &mut self,
            _code: &CourseCode,
            _location: Coordinate,
        ) -> Result<Outcome> {
            self.record.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }

        async fn close(&mut self) {
            self.record.closed.store(true, Ordering::SeqCst);
        }
    }

    fn creds() -> Credentials {
        Credentials::new("student@ogr.deu.edu.tr", "hunter2")
    }

    #[tokio::test]
    async fn test_happy_path_closes_session() {
        let record = Arc::new(Recording::default());
        let engine = CheckInEngine::new(
            FakeClient::succeeding(record.clone()),
            GeolocationJitter::campus(),
        );

        let outcome = engine.run(&creds(), "123456").await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(record.authenticated.load(Ordering::SeqCst), 1);
        assert_eq!(record.submitted.load(Ordering::SeqCst), 1);
        assert!(record.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_code_makes_no_client_calls() {
        let record = Arc::new(Recording::default());
        let engine = CheckInEngine::new(
            FakeClient::succeeding(record.clone()),
            GeolocationJitter::campus(),
        );

        let err = engine.run(&creds(), "12ab56").await.unwrap_err();

        assert!(matches!(err, CheckInError::Validation { .. }));
        assert_eq!(record.authenticated.load(Ordering::SeqCst), 0);
        assert_eq!(record.submitted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_skips_submission_but_still_closes() {
        let record = Arc::new(Recording::default());
        let engine = CheckInEngine::new(
            FakeClient::rejecting_auth(record.clone()),
            GeolocationJitter::campus(),
        );

        let err = engine.run(&creds(), "123456").await.unwrap_err();

        assert!(matches!(err, CheckInError::Auth { status: 401, .. }));
        assert_eq!(record.submitted.load(Ordering::SeqCst), 0);
        assert!(record.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_classified_failure_is_returned_not_escalated() {
        let record = Arc::new(Recording::default());
        let client = FakeClient {
            record: record.clone(),
            auth_result: None,
            outcome: Outcome::failure(FailureKind::InvalidCode, "not found"),
        };
        let engine = CheckInEngine::new(client, GeolocationJitter::campus());

        let outcome = engine.run(&creds(), "999999").await.unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
        assert!(record.closed.load(Ordering::SeqCst));
    }
}
