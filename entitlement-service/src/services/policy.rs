//! What a guard answers when it cannot read the data it needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Deny.
    #[default]
    Closed,
    /// Allow, so a transient outage never locks users out of their work.
    Open,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Closed => "closed",
            FailurePolicy::Open => "open",
        }
    }

    pub fn allows(&self) -> bool {
        *self == FailurePolicy::Open
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(FailurePolicy::Closed),
            "open" => Ok(FailurePolicy::Open),
            other => Err(format!(
                "Invalid failure policy: {}. Must be one of: closed, open",
                other
            )),
        }
    }
}
