pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{FileConfig, Strategy};

pub use crate::core::api_client::ApiAttendanceClient;
pub use crate::core::browser_client::{BrowserAttendanceClient, BrowserSessionConfig};
pub use crate::core::classifier::{ClassifierConfig, OutcomeClassifier};
pub use crate::core::engine::CheckInEngine;
pub use crate::core::geo::GeolocationJitter;
pub use crate::core::retry::RetryPolicy;
pub use crate::domain::model::{
    Coordinate, CourseCode, Credentials, FailureKind, Outcome, SelectorCandidate, SelectorKind,
};
pub use crate::domain::ports::{AttendanceClient, PageProbe};
pub use crate::utils::error::{CheckInError, Result};
