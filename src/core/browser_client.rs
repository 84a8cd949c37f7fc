use crate::core::classifier::{ClassifierConfig, OutcomeClassifier};
use crate::core::retry::RetryPolicy;
use crate::core::selectors::{portal, SelectorResolver};
use crate::domain::model::{
    Coordinate, CourseCode, Credentials, FailureKind, Outcome, SelectorCandidate, SelectorKind,
};
use crate::domain::ports::{AttendanceClient, PageProbe};
use crate::utils::error::{CheckInError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetGeolocationOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const CHECK_IN_PAGE_PATH: &str = "/ogrenci/yoklama-katil";

/// The portal is an Angular SPA; fixed desktop identity keeps its rendering
/// predictable.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Inter-keystroke delay while filling the login fields. A raw value
/// assignment does not trigger the portal's change detection.
const KEYSTROKE_DELAY: Duration = Duration::from_millis(100);
/// Delay between the single-character code cells.
const CODE_CELL_DELAY: Duration = Duration::from_millis(200);
/// Bounded wait for consent prompts; their absence is not an error.
const CONSENT_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    pub base_url: String,
    pub headless: bool,
    /// Coordinate the in-page geolocation API is pinned to.
    pub anchor: Coordinate,
    pub retry: RetryPolicy,
    /// Load events alone do not signal SPA readiness; every navigation gets
    /// this extra settle time.
    pub settle_delay: Duration,
    pub classifier: ClassifierConfig,
    pub selector_timeout: Duration,
}

impl BrowserSessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headless: true,
            anchor: crate::core::geo::CAMPUS_ANCHOR,
            retry: RetryPolicy::default(),
            settle_delay: Duration::from_secs(2),
            classifier: ClassifierConfig::default(),
            selector_timeout: Duration::from_secs(3),
        }
    }
}

/// Browser-automation strategy: drives an actual rendered portal page in
/// headless Chromium. Owns the browser, one isolated context and one active
/// page, all released by `close`.
pub struct BrowserAttendanceClient {
    config: BrowserSessionConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    resolver: SelectorResolver,
    logged_in: bool,
}

impl BrowserAttendanceClient {
    pub fn new(config: BrowserSessionConfig) -> Self {
        let resolver = SelectorResolver::new(config.selector_timeout);
        Self {
            config,
            browser: None,
            page: None,
            handler_task: None,
            resolver,
            logged_in: false,
        }
    }

    async fn launch(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        tracing::info!("Launching browser (headless: {})", self.config.headless);

        let args = vec![
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--disable-extensions".to_string(),
            "--disable-plugins".to_string(),
            "--lang=tr-TR".to_string(),
            format!("--user-agent={}", USER_AGENT),
        ];

        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: 1366,
                height: 768,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .args(args);
        if self.config.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(|e| CheckInError::Config {
            message: format!("failed to configure browser: {}", e),
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        self.handler_task = Some(tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        }));

        // Geolocation is granted up front so the portal never has to ask.
        let grant = GrantPermissionsParams {
            permissions: vec![PermissionType::Geolocation],
            origin: Some(self.config.base_url.clone()),
            browser_context_id: None,
        };
        browser.execute(grant).await?;

        self.browser = Some(browser);
        self.new_page().await
    }

    /// Create a fresh page with the context overrides applied. Also used to
    /// replace a wedged page between navigation attempts.
    async fn new_page(&mut self) -> Result<()> {
        let browser = self.browser.as_ref().ok_or_else(|| CheckInError::Config {
            message: "browser not launched".to_string(),
        })?;

        if let Some(old) = self.page.take() {
            let _ = old.close().await;
        }

        let page = browser.new_page("about:blank").await?;

        page.execute(SetTimezoneOverrideParams::new("Europe/Istanbul"))
            .await?;
        page.execute(SetGeolocationOverrideParams {
            latitude: Some(self.config.anchor.latitude),
            longitude: Some(self.config.anchor.longitude),
            accuracy: Some(20.0),
        })
        .await?;

        // Pin the in-page geolocation API to the anchor even for code this
        // pipeline does not control.
        let geolocation_js = format!(
            "navigator.geolocation.getCurrentPosition = (success) => {{ \
                 success({{ coords: {{ latitude: {}, longitude: {}, accuracy: 20 }}, \
                            timestamp: Date.now() }}); \
             }};",
            self.config.anchor.latitude, self.config.anchor.longitude
        );
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(geolocation_js))
            .await?;

        // Capture APIs always reject, preempting prompts that would block
        // the flow.
        let media_js = "if (navigator.mediaDevices) { \
                 navigator.mediaDevices.getUserMedia = \
                     () => Promise.reject(new Error('camera access rejected')); \
                 navigator.mediaDevices.getDisplayMedia = \
                     () => Promise.reject(new Error('screen capture rejected')); \
             }";
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            media_js.to_string(),
        ))
        .await?;

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or_else(|| CheckInError::Config {
            message: "no active page; call authenticate first".to_string(),
        })
    }

    fn probe(&self) -> Result<LivePageProbe> {
        Ok(LivePageProbe {
            page: self.page()?.clone(),
        })
    }

    /// Navigate with bounded retries. Each failed attempt replaces the page
    /// object; each successful one waits for the load plus the settle delay,
    /// because the SPA keeps rendering well after the load event.
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let RetryPolicy {
            max_attempts,
            backoff,
        } = self.config.retry;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts.max(1) {
            tracing::debug!("Navigating to {} (attempt {}/{})", url, attempt, max_attempts);

            let result = async {
                let page = self.page()?;
                page.goto(url).await?;
                page.wait_for_navigation().await?;
                Ok::<(), CheckInError>(())
            }
            .await;

            match result {
                Ok(()) => {
                    tokio::time::sleep(self.config.settle_delay).await;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        "Navigation attempt {}/{} failed: {}",
                        attempt,
                        max_attempts,
                        err
                    );
                    last_error = err.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff).await;
                        if let Err(page_err) = self.new_page().await {
                            tracing::warn!("Page replacement failed: {}", page_err);
                        }
                    }
                }
            }
        }

        Err(CheckInError::Navigation {
            attempts: max_attempts,
            message: last_error,
        })
    }

    async fn find_element(&self, candidate: &SelectorCandidate) -> Result<Element> {
        let page = self.page()?;
        let element = match candidate.kind {
            SelectorKind::Css => page.find_element(candidate.value.as_str()).await?,
            SelectorKind::XPath => page.find_xpath(candidate.value.as_str()).await?,
        };
        Ok(element)
    }

    async fn find_elements(&self, candidate: &SelectorCandidate) -> Result<Vec<Element>> {
        let page = self.page()?;
        let elements = match candidate.kind {
            SelectorKind::Css => page.find_elements(candidate.value.as_str()).await?,
            SelectorKind::XPath => page.find_xpaths(candidate.value.as_str()).await?,
        };
        Ok(elements)
    }

    /// Clear a field, then type its value character by character. The
    /// keystroke pacing is what makes the Angular form accept the input.
    async fn fill_field(&self, element: &Element, value: &str) -> Result<()> {
        element.click().await?;
        element.focus().await?;
        self.page()?
            .evaluate(
                "if (document.activeElement && 'value' in document.activeElement) { \
                     document.activeElement.value = ''; \
                     document.activeElement.dispatchEvent(new Event('input', { bubbles: true })); \
                 }",
            )
            .await?;

        for ch in value.chars() {
            element.type_str(&ch.to_string()).await?;
            tokio::time::sleep(KEYSTROKE_DELAY).await;
        }
        Ok(())
    }

    /// Click the first visible button whose text contains `label`. Returns
    /// whether anything was clicked.
    async fn click_button_with_text(&self, label: &str) -> Result<bool> {
        let js = format!(
            "(() => {{ \
                 const label = {}; \
                 for (const button of document.querySelectorAll('button')) {{ \
                     const text = (button.innerText || button.textContent || '').trim(); \
                     const style = window.getComputedStyle(button); \
                     if (text.includes(label) && style.display !== 'none' && \
                         style.visibility !== 'hidden') {{ \
                         button.click(); \
                         return true; \
                     }} \
                 }} \
                 return false; \
             }})()",
            serde_json::to_string(label)?
        );
        let clicked = self.page()?.evaluate(js).await?.into_value::<bool>().unwrap_or(false);
        Ok(clicked)
    }

    /// Wait up to CONSENT_WAIT for a consent prompt and act on it. Absence
    /// is normal and silent.
    async fn handle_consent_prompt(&self, label: &str, action: &str) {
        let deadline = Instant::now() + CONSENT_WAIT;
        loop {
            match self.click_button_with_text(label).await {
                Ok(true) => {
                    tracing::debug!("Consent prompt '{}' {}", label, action);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!("Consent prompt check failed: {}", err);
                    return;
                }
            }
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Login verdict from URL and page text, in lieu of any status code.
    fn login_succeeded(url: &str, body_text: &str) -> bool {
        let lower_url = url.to_lowercase();
        let lower_body = body_text.to_lowercase();

        const SUCCESS_URL_PARTS: &[&str] = &[
            "dashboard", "home", "main", "panel", "student", "ogrenci", "profile", "yoklama",
        ];
        let has_success_url = SUCCESS_URL_PARTS.iter().any(|p| lower_url.contains(p));

        let still_on_login =
            lower_url.contains("login") || lower_body.contains("giriş yap");

        (has_success_url || lower_url.contains("/ogrenci")) && !still_on_login
    }

    async fn fill_login_form(&mut self, credentials: &Credentials) -> Result<()> {
        let probe = self.probe()?;

        let email_candidates = portal::email_field();
        let email_selector = self
            .resolver
            .resolve(&probe, "email field", &email_candidates)
            .await?;
        let email_element = self.find_element(email_selector).await?;
        self.fill_field(&email_element, &credentials.email).await?;
        tracing::debug!("Email field populated");

        let password_candidates = portal::password_field();
        let password_selector = self
            .resolver
            .resolve(&probe, "password field", &password_candidates)
            .await?;
        let password_element = self.find_element(password_selector).await?;
        self.fill_field(&password_element, &credentials.password)
            .await?;
        tracing::debug!("Password field populated");

        let submit_candidates = portal::submit_button();
        match self
            .resolver
            .resolve(&probe, "submit button", &submit_candidates)
            .await
        {
            Ok(selector) => {
                let button = self.find_element(selector).await?;
                button.click().await?;
                tracing::debug!("Submit button clicked");
            }
            Err(_) => {
                // No recognizable button; the form also submits on Enter.
                tracing::debug!("No submit button resolved, pressing Enter");
                password_element.press_key("Enter").await?;
            }
        }

        let page = self.page()?;
        let _ = page.wait_for_navigation().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(())
    }

    /// Type the course code into the per-character widget and submit it.
    /// Resolver failure here is a classified outcome, not an error: the
    /// portal markup has drifted and nothing was submitted.
    async fn enter_course_code(&mut self, code: &CourseCode) -> Result<Option<Outcome>> {
        let probe = self.probe()?;

        let candidates = portal::code_cells();
        let cells = match self
            .resolver
            .resolve_at_least(&probe, "code cells", &candidates, CourseCode::LENGTH)
            .await
        {
            Ok(selector) => self.find_elements(selector).await?,
            Err(_) => {
                // Fallback: every input on the page, as a last resort.
                let fallback = portal::any_input();
                let all_inputs = self.find_elements(&fallback).await.unwrap_or_default();
                if all_inputs.len() < CourseCode::LENGTH {
                    tracing::warn!(
                        "Code widget not found: {} input(s) on page, need {}",
                        all_inputs.len(),
                        CourseCode::LENGTH
                    );
                    return Ok(Some(Outcome::failure(
                        FailureKind::UiError,
                        "The course code entry widget could not be located; \
                         the portal layout may have changed",
                    )));
                }
                all_inputs
            }
        };

        for (cell, digit) in cells.iter().zip(code.digits()) {
            cell.click().await?;
            self.page()?
                .evaluate(
                    "if (document.activeElement && 'value' in document.activeElement) { \
                         document.activeElement.value = ''; \
                     }",
                )
                .await?;
            cell.type_str(&digit.to_string()).await?;
            tokio::time::sleep(CODE_CELL_DELAY).await;
        }
        tracing::debug!("Course code entered");

        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(last_cell) = cells.get(CourseCode::LENGTH - 1) {
            last_cell.press_key("Enter").await?;
        }
        tracing::debug!("Course code submitted");

        Ok(None)
    }
}

#[async_trait]
impl AttendanceClient for BrowserAttendanceClient {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.launch().await?;

        let base_url = self.config.base_url.clone();
        self.navigate(&base_url).await?;

        self.fill_login_form(credentials).await?;

        // Location consent can pop right after a successful login.
        self.handle_consent_prompt("Siteyi ziyaret ederken izin ver", "accepted")
            .await;

        let page = self.page()?;
        let url = page.url().await?.unwrap_or_default();
        let body_text = self.probe()?.body_text().await.unwrap_or_default();

        if Self::login_succeeded(&url, &body_text) {
            tracing::info!("Login confirmed at {}", url);
            self.logged_in = true;
            Ok(())
        } else {
            tracing::warn!("Login not confirmed, still at {}", url);
            Err(CheckInError::Auth {
                status: 401,
                body: "The portal did not leave the login page; \
                       the credentials are likely wrong"
                    .to_string(),
            })
        }
    }

    async fn submit_check_in(
        &mut self,
        code: &CourseCode,
        location: Coordinate,
    ) -> Result<Outcome> {
        if !self.logged_in {
            return Err(CheckInError::Processing {
                message: "Not logged in; authenticate first".to_string(),
            });
        }

        // The portal reads the location through the geolocation API, so the
        // jittered coordinate goes in through the override.
        let page = self.page()?;
        page.execute(SetGeolocationOverrideParams {
            latitude: Some(location.latitude),
            longitude: Some(location.longitude),
            accuracy: Some(20.0),
        })
        .await?;
        page.evaluate(format!(
            "navigator.geolocation.getCurrentPosition = (success) => {{ \
                 success({{ coords: {{ latitude: {}, longitude: {}, accuracy: 20 }}, \
                            timestamp: Date.now() }}); \
             }};",
            location.latitude, location.longitude
        ))
        .await?;

        let check_in_url = format!("{}{}", self.config.base_url, CHECK_IN_PAGE_PATH);
        self.navigate(&check_in_url).await?;

        self.handle_consent_prompt("İzin Verme", "dismissed").await;

        if let Some(outcome) = self.enter_course_code(code).await? {
            return Ok(outcome);
        }

        let classifier = OutcomeClassifier::new(self.config.classifier);
        let probe = self.probe()?;
        Ok(classifier.classify(&probe).await)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        self.logged_in = false;
        tracing::debug!("Browser session closed");
    }
}

/// `PageProbe` over the live page, backed by script evaluation. Selector
/// values are JSON-escaped before being spliced into the snippets.
pub struct LivePageProbe {
    page: Page,
}

impl LivePageProbe {
    fn selector_js(candidate: &SelectorCandidate) -> Result<(String, String)> {
        let escaped = serde_json::to_string(&candidate.value)?;
        let finder = match candidate.kind {
            SelectorKind::Css => format!(
                "Array.from(document.querySelectorAll({}))",
                escaped
            ),
            SelectorKind::XPath => format!(
                "(() => {{ const out = []; \
                     const snapshot = document.evaluate({}, document, null, \
                         XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                     for (let i = 0; i < snapshot.snapshotLength; i++) \
                         out.push(snapshot.snapshotItem(i)); \
                     return out; }})()",
                escaped
            ),
        };
        Ok((finder, escaped))
    }
}

#[async_trait]
impl PageProbe for LivePageProbe {
    async fn count(&self, candidate: &SelectorCandidate) -> Result<usize> {
        let (finder, _) = Self::selector_js(candidate)?;
        let js = format!("{}.length", finder);
        let count = self.page.evaluate(js).await?.into_value::<usize>().unwrap_or(0);
        Ok(count)
    }

    async fn is_visible(&self, candidate: &SelectorCandidate) -> Result<bool> {
        let (finder, _) = Self::selector_js(candidate)?;
        let js = format!(
            "(() => {{ const el = {}[0]; \
                 if (!el) return false; \
                 const style = window.getComputedStyle(el); \
                 return parseFloat(style.opacity) > 0 && \
                        style.display !== 'none' && \
                        style.visibility !== 'hidden'; }})()",
            finder
        );
        let visible = self.page.evaluate(js).await?.into_value::<bool>().unwrap_or(false);
        Ok(visible)
    }

    async fn text_of(&self, candidate: &SelectorCandidate) -> Result<Option<String>> {
        let (finder, _) = Self::selector_js(candidate)?;
        let js = format!(
            "(() => {{ const el = {}[0]; \
                 if (!el) return null; \
                 return el.getAttribute('aria-label') || el.innerText || \
                        el.textContent || null; }})()",
            finder
        );
        let text = self
            .page
            .evaluate(js)
            .await?
            .into_value::<Option<String>>()
            .unwrap_or(None);
        Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    async fn body_text(&self) -> Result<String> {
        let text = self
            .page
            .evaluate("document.body ? (document.body.innerText || document.body.textContent || '') : ''")
            .await?
            .into_value::<String>()
            .unwrap_or_default();
        Ok(text)
    }
}
