use crate::domain::model::{SelectorCandidate, SelectorKind};
use crate::domain::ports::PageProbe;
use crate::utils::error::{CheckInError, Result};
use std::time::Duration;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves an ordered cascade of locator candidates against a page.
/// Candidates are probed strictly in order; the first one that yields a
/// visible element wins and later candidates are never touched, so
/// resolution is deterministic for a given DOM state.
pub struct SelectorResolver {
    per_candidate_timeout: Duration,
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self {
            per_candidate_timeout: Duration::from_secs(3),
        }
    }
}

impl SelectorResolver {
    pub fn new(per_candidate_timeout: Duration) -> Self {
        Self {
            per_candidate_timeout,
        }
    }

    /// First candidate resolving to a visible element, or `ElementNotFound`
    /// once the cascade is exhausted.
    pub async fn resolve<'a>(
        &self,
        probe: &dyn PageProbe,
        what: &str,
        candidates: &'a [SelectorCandidate],
    ) -> Result<&'a SelectorCandidate> {
        for candidate in candidates {
            tracing::debug!("Trying selector for {}: {}", what, candidate);
            match self.wait_for_visible(probe, candidate).await {
                Ok(true) => {
                    tracing::debug!("Resolved {} via {}", what, candidate);
                    return Ok(candidate);
                }
                Ok(false) => continue,
                Err(err) => {
                    // A probe error on one candidate is not fatal until the
                    // whole cascade has been exhausted.
                    tracing::debug!("Selector {} failed for {}: {}", candidate, what, err);
                    continue;
                }
            }
        }

        Err(CheckInError::ElementNotFound {
            what: what.to_string(),
        })
    }

    /// Variant for the per-character code widget: the winning candidate must
    /// match at least `min_count` elements.
    pub async fn resolve_at_least<'a>(
        &self,
        probe: &dyn PageProbe,
        what: &str,
        candidates: &'a [SelectorCandidate],
        min_count: usize,
    ) -> Result<&'a SelectorCandidate> {
        for candidate in candidates {
            tracing::debug!("Trying selector for {}: {}", what, candidate);
            match self.wait_for_count(probe, candidate, min_count).await {
                Ok(true) => {
                    tracing::debug!("Resolved {} via {}", what, candidate);
                    return Ok(candidate);
                }
                Ok(false) => continue,
                Err(err) => {
                    tracing::debug!("Selector {} failed for {}: {}", candidate, what, err);
                    continue;
                }
            }
        }

        Err(CheckInError::ElementNotFound {
            what: what.to_string(),
        })
    }

    async fn wait_for_visible(
        &self,
        probe: &dyn PageProbe,
        candidate: &SelectorCandidate,
    ) -> Result<bool> {
        let deadline = Instant::now() + self.per_candidate_timeout;
        loop {
            if probe.count(candidate).await? > 0 && probe.is_visible(candidate).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_count(
        &self,
        probe: &dyn PageProbe,
        candidate: &SelectorCandidate,
        min_count: usize,
    ) -> Result<bool> {
        let deadline = Instant::now() + self.per_candidate_timeout;
        loop {
            if probe.count(candidate).await? >= min_count {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// The portal's known locator cascades. The leading XPath entries are the
/// exact paths observed in the rendered Angular Material markup; the CSS
/// entries absorb minor markup drift.
pub mod portal {
    use super::{SelectorCandidate, SelectorKind};

    pub fn email_field() -> Vec<SelectorCandidate> {
        vec![
            SelectorCandidate::xpath(
                "/html/body/app-root/app-login/div/div/div/form/div[1]/div/mat-form-field/div[1]/div/div[3]/input",
            ),
            SelectorCandidate::css("input[formControlName=\"email\"]"),
            SelectorCandidate::css("input[name=\"email\"]"),
            SelectorCandidate::css("input[type=\"email\"]"),
            SelectorCandidate::css("input[name=\"username\"]"),
            SelectorCandidate::css("#email"),
            SelectorCandidate::css("#username"),
            SelectorCandidate::css("mat-form-field input[type=\"text\"]"),
            SelectorCandidate::css("mat-form-field input[type=\"email\"]"),
            SelectorCandidate::css("input[formControlName=\"username\"]"),
        ]
    }

    pub fn password_field() -> Vec<SelectorCandidate> {
        vec![
            SelectorCandidate::xpath(
                "/html/body/app-root/app-login/div/div/div/form/div[2]/div/mat-form-field/div[1]/div/div[3]/input",
            ),
            SelectorCandidate::css("input[formControlName=\"sifre\"]"),
            SelectorCandidate::css("input[name=\"password\"]"),
            SelectorCandidate::css("input[type=\"password\"]"),
            SelectorCandidate::css("#password"),
            SelectorCandidate::css("mat-form-field input[type=\"password\"]"),
            SelectorCandidate::css("input[formControlName=\"password\"]"),
        ]
    }

    pub fn submit_button() -> Vec<SelectorCandidate> {
        vec![
            SelectorCandidate::css("#loginForm > div:nth-child(3) > div > button"),
            SelectorCandidate::css("button[type=\"submit\"]"),
            SelectorCandidate::css("input[type=\"submit\"]"),
            SelectorCandidate::css(".login-btn"),
            SelectorCandidate::css("button[mat-raised-button]"),
            SelectorCandidate::css("button[mat-button]"),
            SelectorCandidate::css("button.mdc-button"),
            SelectorCandidate::css("button[class*=\"mdc-filled-button\"]"),
        ]
    }

    /// The course-code widget is one logical input split into single
    /// character cells, so a winning candidate must match at least
    /// `CourseCode::LENGTH` elements.
    pub fn code_cells() -> Vec<SelectorCandidate> {
        vec![
            SelectorCandidate::css("code-input input[type=\"tel\"]"),
            SelectorCandidate::css("code-input input[autocomplete=\"one-time-code\"]"),
            SelectorCandidate::css("input[type=\"tel\"][inputmode=\"numeric\"]"),
            SelectorCandidate::css("code-input span input"),
            SelectorCandidate::css("input[type=\"tel\"]"),
            SelectorCandidate::css("input[inputmode=\"numeric\"]"),
        ]
    }

    /// Last-resort fallback when no code-cell cascade entry matches: every
    /// input on the page.
    pub fn any_input() -> SelectorCandidate {
        SelectorCandidate {
            kind: SelectorKind::Css,
            value: "input".to_string(),
        }
    }
}
