//! Caja lifecycle status.

use serde::{Deserialize, Serialize};

/// Status of a caja session.
///
/// ```text
/// Open ──► Closed
/// ```
///
/// Closing is one-way: a new session needs a new caja.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CajaStatus {
    #[default]
    Open,
    Closed,
}

impl CajaStatus {
    pub fn accepts_postings(&self) -> bool {
        matches!(self, CajaStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CajaStatus::Open => "OPEN",
            CajaStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for CajaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
