use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal login credentials. The password is redacted from Debug output so
/// it can never leak through logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// A geolocation as the portal consumes it. Display renders the wire format
/// `"<lat>,<lon>"` with 8 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Straight-line distance to another coordinate in meters (haversine).
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8},{:.8}", self.latitude, self.longitude)
    }
}

/// A validated 6-digit course code. Construction is the only place the
/// format is checked; everything downstream can trust the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCode(String);

impl CourseCode {
    pub const LENGTH: usize = 6;

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == Self::LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digits(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Machine-classified reason attached to a failed check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The portal rejected the course code (not found / invalid).
    InvalidCode,
    /// The portal reported an error the classifier could not narrow down.
    GeneralError,
    /// An error indicator was detected but its text was unreadable, or the
    /// portal markup drifted away from every known selector.
    UiError,
    /// Local failure: navigation, browser, transport.
    SystemError,
    /// No positive signal was observed either way; the user must verify by
    /// hand. Silence is never reported as success.
    ManualCheckRequired,
}

/// Result of one submission attempt as reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    Success {
        message: String,
        observed_at: chrono::DateTime<chrono::Utc>,
    },
    Failure {
        kind: FailureKind,
        message: String,
        /// Raw text the classifier observed, kept for diagnosing failure
        /// modes the keyword heuristics did not anticipate.
        raw_signal: Option<String>,
        observed_at: chrono::DateTime<chrono::Utc>,
    },
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Outcome::Success {
            message: message.into(),
            observed_at: chrono::Utc::now(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
            raw_signal: None,
            observed_at: chrono::Utc::now(),
        }
    }

    pub fn failure_with_signal(
        kind: FailureKind,
        message: impl Into<String>,
        raw_signal: impl Into<String>,
    ) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
            raw_signal: Some(raw_signal.into()),
            observed_at: chrono::Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Failure { kind, .. } => Some(*kind),
            Outcome::Success { .. } => None,
        }
    }
}

/// How a selector candidate addresses the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    Css,
    XPath,
}

/// One entry in a selector cascade. Candidates are tried in order; the
/// first one resolving to a visible element wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub kind: SelectorKind,
    pub value: String,
}

impl SelectorCandidate {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::XPath,
            value: value.into(),
        }
    }
}

impl fmt::Display for SelectorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SelectorKind::Css => write!(f, "css={}", self.value),
            SelectorKind::XPath => write!(f, "xpath={}", self.value),
        }
    }
}
