#[cfg(feature = "cli")]
pub mod cli;
pub mod file;

use serde::{Deserialize, Serialize};

/// Which AttendanceClient implementation runs the attempt. Call sites never
/// branch on this; it is consumed once at composition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Direct HTTP calls with a hand-rolled cookie session.
    Http,
    /// Headless-browser automation against the rendered portal.
    Browser,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Http
    }
}

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use file::FileConfig;
