use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DocGateError;

/// Width of the rolling window a rate limit is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    #[default]
    Second,
    Minute,
    Hour,
}

impl WindowUnit {
    pub fn duration(self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(60 * 60),
        }
    }
}

impl fmt::Display for WindowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WindowUnit {
    type Err = DocGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Second),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minute),
            "h" | "hr" | "hour" | "hours" => Ok(Self::Hour),
            other => Err(DocGateError::Config(format!(
                "Unsupported window unit: {other:?}"
            ))),
        }
    }
}
