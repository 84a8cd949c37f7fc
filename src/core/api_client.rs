use crate::core::classifier::classify_error_text;
use crate::core::cookies::CookieJar;
use crate::core::retry::RetryPolicy;
use crate::domain::model::{Coordinate, CourseCode, Credentials, FailureKind, Outcome};
use crate::domain::ports::AttendanceClient;
use crate::utils::error::{CheckInError, Result};
use async_trait::async_trait;
use reqwest::header;
use serde_json::json;

const LOGIN_PATH: &str = "/api/Login";
const USER_PATH: &str = "/api/User";
const CHECK_IN_PATH: &str = "/api/Ogrenci/YoklamaKatil";
const CHECK_IN_REFERER_PATH: &str = "/ogrenci/yoklama-katil";

/// Wire value for an in-person ("kod") check-in.
const ENTRY_TYPE: &str = "K";

/// Direct HTTP strategy: authenticates against the login endpoint, keeps the
/// session cookies in a hand-rolled jar and calls the JSON check-in endpoint
/// with them. No browser involved.
pub struct ApiAttendanceClient {
    base_url: String,
    client: reqwest::Client,
    jar: CookieJar,
    retry: RetryPolicy,
}

impl ApiAttendanceClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            jar: CookieJar::new(),
            retry,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Headers the portal expects on every API call.
    fn common_headers(&self, referer_path: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("tr-TR,tr;q=0.8"),
        );
        if let Ok(value) = header::HeaderValue::from_str(&self.url(referer_path)) {
            headers.insert(header::REFERER, value);
        }
        if !self.jar.is_empty() {
            if let Ok(value) = header::HeaderValue::from_str(&self.jar.header_value()) {
                headers.insert(header::COOKIE, value);
            }
        }
        headers
    }

    /// The login endpoint only accepts the JSON payload when it is declared
    /// as `text/plain`. This is a quirk of the portal, reproduced verbatim.
    async fn post_login(&self, credentials: &Credentials) -> Result<reqwest::Response> {
        let body = serde_json::to_string(&json!({
            "email": credentials.email,
            "password": credentials.password,
            "rememberMe": true,
        }))?;

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .headers(self.common_headers("/"))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Round-trip the fresh session cookie once before any check-in call.
    async fn verify_session(&mut self) -> Result<()> {
        let response = self
            .client
            .get(self.url(USER_PATH))
            .headers(self.common_headers("/"))
            .send()
            .await?;

        let status = response.status();
        self.jar.store_from_response(&response);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckInError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Session verified, {} cookie(s) in jar", self.jar.len());
        Ok(())
    }

    /// Turn a check-in response into an Outcome. An empty 2xx body is the
    /// portal's normal acknowledgment.
    async fn outcome_from_response(&self, response: reqwest::Response) -> Result<Outcome> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let trimmed = body.trim();

        if status.is_success() {
            if trimmed.is_empty() {
                return Ok(Outcome::success("Check-in accepted"));
            }
            let message = match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(value) => value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or(trimmed)
                    .to_string(),
                Err(_) => trimmed.to_string(),
            };
            return Ok(Outcome::success(message));
        }

        // Error path: prefer a structured message, fall back to raw text.
        let message = match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|m| m.as_str())
                .unwrap_or(trimmed)
                .to_string(),
            Err(_) => trimmed.to_string(),
        };

        if message.is_empty() {
            return Ok(Outcome::failure(
                FailureKind::GeneralError,
                format!("Check-in rejected with status {}", status.as_u16()),
            ));
        }

        let (kind, summary) = classify_error_text("", &message);
        Ok(Outcome::failure_with_signal(kind, summary, message))
    }
}

#[async_trait]
impl AttendanceClient for ApiAttendanceClient {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        tracing::info!("Logging in as {}", credentials.email);

        let retry = self.retry;
        let this: &ApiAttendanceClient = self;
        let response = retry.run("login", |_| this.post_login(credentials)).await?;

        let status = response.status();
        self.jar.store_from_response(&response);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(CheckInError::Auth {
                    status: status.as_u16(),
                    body,
                });
            }
            return Err(CheckInError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if self.jar.is_empty() {
            return Err(CheckInError::Processing {
                message: "Login succeeded but no session cookie was issued".to_string(),
            });
        }

        tracing::debug!(
            "Login ok, cookies: {}",
            self.jar.names().collect::<Vec<_>>().join(", ")
        );

        self.verify_session().await
    }

    async fn submit_check_in(
        &mut self,
        code: &CourseCode,
        location: Coordinate,
    ) -> Result<Outcome> {
        if self.jar.is_empty() {
            return Err(CheckInError::Processing {
                message: "No session cookie; authenticate first".to_string(),
            });
        }

        tracing::info!("Submitting check-in for code {} at {}", code, location);

        let body = json!({
            "GIRIS_TIPI": ENTRY_TYPE,
            "KOD": code.as_str(),
            "KONUM": location.to_string(),
        });

        let response = self
            .client
            .post(self.url(CHECK_IN_PATH))
            .headers(self.common_headers(CHECK_IN_REFERER_PATH))
            .json(&body)
            .send()
            .await?;

        self.jar.store_from_response(&response);
        self.outcome_from_response(response).await
    }

    async fn close(&mut self) {
        // Dropping the cookies is all it takes to end an HTTP session.
        self.jar = CookieJar::new();
    }
}
