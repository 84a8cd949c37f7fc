use crate::domain::model::{FailureKind, Outcome, SelectorCandidate};
use crate::domain::ports::PageProbe;
use std::time::Duration;

/// The portal acknowledges a submission only through transient UI: an
/// ngx-toastr error banner, a SweetAlert2 success dialog, or nothing at all.
/// The classifier races watchers for all of them under one shared ceiling
/// and reduces whatever fires to a single `Outcome`.
///
/// Two rules are absolute:
/// - an observed error dominates a simultaneously observed success, and
/// - silence is reported as `ManualCheckRequired`, never as success.
pub struct OutcomeClassifier {
    config: ClassifierConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Shared deadline for the racing watchers.
    pub ceiling: Duration,
    /// Extra delay before the confirmatory error re-check that follows a
    /// success signal. The success icon can render before a late error
    /// replaces it.
    pub confirm_delay: Duration,
    /// Watcher polling interval.
    pub poll_interval: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ceiling: Duration::from_secs(10),
            confirm_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// What fired first during the racing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    ErrorBanner,
    NotFoundText,
    SuccessDialog,
    Ceiling,
}

fn error_toast() -> SelectorCandidate {
    SelectorCandidate::css("#toast-container .toast-error")
}

fn toast_title() -> SelectorCandidate {
    SelectorCandidate::css("#toast-container .toast-error .toast-title")
}

fn toast_message() -> SelectorCandidate {
    SelectorCandidate::css("#toast-container .toast-error .toast-message")
}

fn success_icons() -> Vec<SelectorCandidate> {
    vec![
        SelectorCandidate::css(".swal2-success"),
        SelectorCandidate::css(".swal2-icon-success"),
        SelectorCandidate::css(".swal2-success-ring"),
        SelectorCandidate::css(".swal2-icon.swal2-success"),
    ]
}

fn success_dialog_title() -> SelectorCandidate {
    SelectorCandidate::css(".swal2-popup .swal2-title")
}

fn success_dialog_content() -> SelectorCandidate {
    SelectorCandidate::css(".swal2-popup .swal2-html-container")
}

/// Phrases the portal uses for "this code is not open right now".
const NOT_FOUND_PHRASES: &[&str] = &["yoklama bulunamadı", "yoklama not found"];

/// Heuristic keyword buckets for the text fallbacks. Inferred from observed
/// portal strings, not from any documented contract.
const INVALID_KEYWORDS: &[&str] = &["geçersiz", "invalid"];
const GENERIC_ERROR_KEYWORDS: &[&str] = &["hata", "error", "başarısız"];
const SUCCESS_KEYWORDS: &[&str] = &["başarılı", "success", "tamamlandı"];

impl OutcomeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify the portal's reaction to a submission that was just entered.
    /// Always returns within `ceiling + confirm_delay` plus one poll.
    pub async fn classify(&self, probe: &dyn PageProbe) -> Outcome {
        let signal = self.race(probe).await;
        tracing::debug!("Classifier racing phase ended with {:?}", signal);

        match signal {
            Signal::ErrorBanner | Signal::NotFoundText => self.report_error(probe).await,
            Signal::SuccessDialog => self.confirm_success(probe).await,
            Signal::Ceiling => self.resolve_ambiguous(probe).await,
        }
    }

    /// Racing state: error banner, success dialog and not-found text watched
    /// concurrently under the shared ceiling. `biased` keeps the priority
    /// order stable when several watchers are ready in the same poll: error
    /// beats text-scan beats success.
    async fn race(&self, probe: &dyn PageProbe) -> Signal {
        tokio::select! {
            biased;
            _ = self.watch_error_banner(probe) => Signal::ErrorBanner,
            _ = self.watch_not_found_text(probe) => Signal::NotFoundText,
            _ = self.watch_success_dialog(probe) => Signal::SuccessDialog,
            _ = tokio::time::sleep(self.config.ceiling) => Signal::Ceiling,
        }
    }

    async fn watch_error_banner(&self, probe: &dyn PageProbe) {
        let toast = error_toast();
        loop {
            if let Ok(true) = probe.is_visible(&toast).await {
                return;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn watch_not_found_text(&self, probe: &dyn PageProbe) {
        loop {
            if let Ok(body) = probe.body_text().await {
                let lower = body.to_lowercase();
                if NOT_FOUND_PHRASES.iter().any(|p| lower.contains(p)) {
                    return;
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn watch_success_dialog(&self, probe: &dyn PageProbe) {
        let icons = success_icons();
        loop {
            for icon in &icons {
                if let Ok(true) = probe.is_visible(icon).await {
                    return;
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Terminal: an error indicator was observed. Read and classify its
    /// text; an unreadable banner is still a failure.
    async fn report_error(&self, probe: &dyn PageProbe) -> Outcome {
        let (title, message) = self.read_error_toast(probe).await;
        let full_text = format!("{} {}", title, message).trim().to_string();

        if full_text.is_empty() {
            return Outcome::failure(
                FailureKind::UiError,
                "An error banner appeared but its text could not be read",
            );
        }

        let (kind, message) = classify_error_text(&title, &message);
        Outcome::failure_with_signal(kind, message, full_text)
    }

    /// Title and message of the error toast, falling back to splitting the
    /// toast's own text by line when the structured sub-elements are empty.
    async fn read_error_toast(&self, probe: &dyn PageProbe) -> (String, String) {
        let title = probe
            .text_of(&toast_title())
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
            .trim()
            .to_string();
        let message = probe
            .text_of(&toast_message())
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
            .trim()
            .to_string();

        if !title.is_empty() || !message.is_empty() {
            return (title, message);
        }

        let full = probe
            .text_of(&error_toast())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let mut lines = full.lines().map(str::trim).filter(|l| !l.is_empty());
        let first = lines.next().unwrap_or_default().to_string();
        let rest = lines.collect::<Vec<_>>().join(" ");
        if rest.is_empty() {
            (String::new(), first)
        } else {
            (first, rest)
        }
    }

    /// A success dialog fired and no error has: wait out the confirmation
    /// delay, then re-check the error banner once. A late error downgrades
    /// the verdict.
    async fn confirm_success(&self, probe: &dyn PageProbe) -> Outcome {
        tokio::time::sleep(self.config.confirm_delay).await;

        if let Ok(true) = probe.is_visible(&error_toast()).await {
            tracing::warn!("Success dialog was followed by an error banner, downgrading");
            return self.report_error(probe).await;
        }

        let title = probe
            .text_of(&success_dialog_title())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let content = probe
            .text_of(&success_dialog_content())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let text = format!("{} {}", title.trim(), content.trim())
            .trim()
            .to_string();

        Outcome::success(if text.is_empty() {
            "Check-in confirmed by the portal".to_string()
        } else {
            text
        })
    }

    /// Ceiling expired with no signal. One whole-page keyword scan may still
    /// settle it; otherwise the outcome is ambiguous and reported as a
    /// failure requiring manual verification.
    async fn resolve_ambiguous(&self, probe: &dyn PageProbe) -> Outcome {
        let body = probe.body_text().await.unwrap_or_default().to_lowercase();

        let has_error = GENERIC_ERROR_KEYWORDS.iter().any(|k| body.contains(k))
            || NOT_FOUND_PHRASES.iter().any(|p| body.contains(p));
        let has_success = SUCCESS_KEYWORDS.iter().any(|k| body.contains(k));

        if has_error && !has_success {
            return Outcome::failure(
                FailureKind::GeneralError,
                "No result indicator appeared, but the page text mentions an error",
            );
        }

        Outcome::failure(
            FailureKind::ManualCheckRequired,
            "Neither an error banner nor a success dialog appeared; \
             verify the check-in manually",
        )
    }
}

/// Keyword classification of an observed error text. Shared with the HTTP
/// strategy, which reads the same portal strings out of response bodies.
pub(crate) fn classify_error_text(title: &str, message: &str) -> (FailureKind, String) {
    let lower_title = title.to_lowercase();
    let lower_message = message.to_lowercase();
    let lower_full = format!("{} {}", lower_title, lower_message);

    if NOT_FOUND_PHRASES.iter().any(|p| lower_full.contains(p)) {
        return (
            FailureKind::InvalidCode,
            "Course code not found; no session is open for it right now".to_string(),
        );
    }

    if INVALID_KEYWORDS.iter().any(|k| lower_full.contains(k)) {
        return (
            FailureKind::InvalidCode,
            "The portal rejected the course code as invalid".to_string(),
        );
    }

    if GENERIC_ERROR_KEYWORDS.iter().any(|k| lower_full.contains(k)) {
        let detail = if message.is_empty() { title } else { message };
        return (
            FailureKind::GeneralError,
            format!("The portal reported an error: {}", detail),
        );
    }

    (
        FailureKind::GeneralError,
        format!("Unrecognized error banner: {} {}", title, message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::Result;
    use async_trait::async_trait;
    use std::time::Instant;

    /// Scripted page: signals become visible at fixed offsets from probe
    /// construction, mimicking the portal's render timing.
    struct ScriptedPage {
        started: Instant,
        error_after: Option<Duration>,
        success_after: Option<Duration>,
        toast_title: Option<String>,
        toast_message: Option<String>,
        toast_full_text: Option<String>,
        body: String,
    }

    impl ScriptedPage {
        fn quiet() -> Self {
            Self {
                started: Instant::now(),
                error_after: None,
                success_after: None,
                toast_title: None,
                toast_message: None,
                toast_full_text: None,
                body: String::new(),
            }
        }

        fn error_at(mut self, after: Duration, title: &str, message: &str) -> Self {
            self.error_after = Some(after);
            self.toast_title = Some(title.to_string());
            self.toast_message = Some(message.to_string());
            self
        }

        fn success_at(mut self, after: Duration) -> Self {
            self.success_after = Some(after);
            self
        }

        fn with_body(mut self, body: &str) -> Self {
            self.body = body.to_string();
            self
        }

        fn error_visible(&self) -> bool {
            self.error_after
                .map(|d| self.started.elapsed() >= d)
                .unwrap_or(false)
        }

        fn success_visible(&self) -> bool {
            self.success_after
                .map(|d| self.started.elapsed() >= d)
                .unwrap_or(false)
        }
    }

    #[async_trait]
    impl PageProbe for ScriptedPage {
        async fn count(&self, candidate: &SelectorCandidate) -> Result<usize> {
            Ok(if self.is_visible(candidate).await? { 1 } else { 0 })
        }

        async fn is_visible(&self, candidate: &SelectorCandidate) -> Result<bool> {
            if candidate.value.contains("toast-error") {
                return Ok(self.error_visible());
            }
            if candidate.value.contains("swal2") {
                return Ok(self.success_visible());
            }
            Ok(false)
        }

        async fn text_of(&self, candidate: &SelectorCandidate) -> Result<Option<String>> {
            if candidate.value.ends_with(".toast-title") {
                return Ok(self.toast_title.clone());
            }
            if candidate.value.ends_with(".toast-message") {
                return Ok(self.toast_message.clone());
            }
            if candidate.value == "#toast-container .toast-error" {
                return Ok(self.toast_full_text.clone());
            }
            if candidate.value.contains("swal2-title") {
                return Ok(Some("Başarılı".to_string()));
            }
            Ok(None)
        }

        async fn body_text(&self) -> Result<String> {
            Ok(self.body.clone())
        }
    }

    fn fast_config() -> ClassifierConfig {
        ClassifierConfig {
            ceiling: Duration::from_millis(300),
            confirm_delay: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_silence_is_manual_check_required_never_success() {
        let page = ScriptedPage::quiet();
        let classifier = OutcomeClassifier::new(fast_config());

        let started = Instant::now();
        let outcome = classifier.classify(&page).await;
        let elapsed = started.elapsed();

        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::ManualCheckRequired)
        );
        // Bounded: ceiling plus a little slack, well under ceiling + confirm.
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_error_banner_is_classified_invalid_code() {
        let page = ScriptedPage::quiet().error_at(
            Duration::from_millis(20),
            "Hata",
            "Yoklama Bulunamadı",
        );
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
        match outcome {
            Outcome::Failure { raw_signal, .. } => {
                assert!(raw_signal.unwrap().contains("Yoklama Bulunamadı"));
            }
            Outcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_generic_error_keyword_is_general_error() {
        let page = ScriptedPage::quiet().error_at(
            Duration::from_millis(20),
            "Hata",
            "Sunucu kaynaklı bir hata oluştu",
        );
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::GeneralError));
    }

    #[tokio::test]
    async fn test_success_dialog_alone_is_success() {
        let page = ScriptedPage::quiet().success_at(Duration::from_millis(20));
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert!(outcome.is_success(), "got {:?}", outcome);
    }

    #[tokio::test]
    async fn test_error_dominates_simultaneous_success() {
        let page = ScriptedPage::quiet()
            .success_at(Duration::from_millis(0))
            .error_at(Duration::from_millis(0), "Hata", "Yoklama Bulunamadı");
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
    }

    #[tokio::test]
    async fn test_late_error_downgrades_observed_success() {
        // Success renders immediately; the error appears during the
        // confirmation window.
        let page = ScriptedPage::quiet()
            .success_at(Duration::from_millis(0))
            .error_at(Duration::from_millis(30), "Hata", "Yoklama Bulunamadı");
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
    }

    #[tokio::test]
    async fn test_not_found_body_text_without_banner_is_failure() {
        let page = ScriptedPage::quiet().with_body("Bir sorun oluştu: Yoklama Bulunamadı");
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
    }

    #[tokio::test]
    async fn test_unreadable_banner_is_ui_error() {
        let mut page = ScriptedPage::quiet();
        page.error_after = Some(Duration::from_millis(0));
        // No title, no message, no fallback text.
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::UiError));
    }

    #[tokio::test]
    async fn test_banner_text_fallback_splits_lines() {
        let mut page = ScriptedPage::quiet();
        page.error_after = Some(Duration::from_millis(0));
        page.toast_full_text = Some("Hata\nYoklama Bulunamadı".to_string());
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCode));
    }

    #[tokio::test]
    async fn test_ambiguous_page_with_error_keywords_is_general_error() {
        let page = ScriptedPage::quiet().with_body("İşlem sırasında hata oluştu");
        // Body text has an error keyword but no "yoklama bulunamadı" phrase,
        // so no watcher fires; the post-ceiling scan picks it up.
        let classifier = OutcomeClassifier::new(fast_config());

        let outcome = classifier.classify(&page).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::GeneralError));
    }

    #[test]
    fn test_classify_error_text_buckets() {
        assert_eq!(
            classify_error_text("Hata", "Yoklama Bulunamadı").0,
            FailureKind::InvalidCode
        );
        assert_eq!(
            classify_error_text("", "Geçersiz kod girdiniz").0,
            FailureKind::InvalidCode
        );
        assert_eq!(
            classify_error_text("Hata", "Beklenmeyen bir durum").0,
            FailureKind::GeneralError
        );
        assert_eq!(
            classify_error_text("Uyarı", "Oturum penceresi kapandı").0,
            FailureKind::GeneralError
        );
    }
}
