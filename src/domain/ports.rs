use crate::domain::model::{Coordinate, CourseCode, Credentials, Outcome, SelectorCandidate};
use crate::utils::error::Result;
use async_trait::async_trait;

/// The one capability this crate exposes: authenticate against the portal,
/// submit a check-in, release the session. Two implementations exist (direct
/// HTTP and browser automation); call sites never branch on which one is
/// active.
#[async_trait]
pub trait AttendanceClient: Send {
    /// Establish an authenticated session. Transport flakiness is retried
    /// internally; a definitive credential rejection is not.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()>;

    /// Submit the course code with the given location and classify the
    /// portal's reaction. Always terminates within the classifier ceiling.
    async fn submit_check_in(&mut self, code: &CourseCode, location: Coordinate)
        -> Result<Outcome>;

    /// Release the session (cookie jar or browser). Idempotent; must be
    /// called on every exit path.
    async fn close(&mut self);
}

/// Read-only view of a rendered page, as much of it as the selector
/// resolver and the outcome classifier need. The live Chromium page
/// implements this with script evaluation; tests implement it with
/// scripted fakes.
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// Number of elements the candidate currently matches.
    async fn count(&self, candidate: &SelectorCandidate) -> Result<usize>;

    /// Whether the first match is visible (rendered, opacity > 0,
    /// display != none).
    async fn is_visible(&self, candidate: &SelectorCandidate) -> Result<bool>;

    /// Inner text of the first match, if any.
    async fn text_of(&self, candidate: &SelectorCandidate) -> Result<Option<String>>;

    /// Full visible text of the document body.
    async fn body_text(&self) -> Result<String>;
}
