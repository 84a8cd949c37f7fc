pub mod api_client;
pub mod browser_client;
pub mod classifier;
pub mod cookies;
pub mod engine;
pub mod geo;
pub mod retry;
pub mod selectors;

pub use crate::domain::model::{
    Coordinate, CourseCode, Credentials, FailureKind, Outcome, SelectorCandidate, SelectorKind,
};
pub use crate::domain::ports::{AttendanceClient, PageProbe};
pub use crate::utils::error::Result;
