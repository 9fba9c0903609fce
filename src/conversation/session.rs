//! Interview role and session identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Role the candidate is interviewing for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Technical coding interview
    Engineer,
    /// Sales and negotiation
    Sales,
    /// Customer service and retail
    Retail,
}

impl Role {
    /// Every role, in menu order
    pub const ALL: [Self; 3] = [Self::Engineer, Self::Sales, Self::Retail];

    /// Wire identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Engineer => "engineer",
            Self::Sales => "sales",
            Self::Retail => "retail",
        }
    }

    /// Display title
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Engineer => "Software Engineer",
            Self::Sales => "Sales Representative",
            Self::Retail => "Retail Associate",
        }
    }

    /// One-line summary
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Engineer => "Technical coding interviews",
            Self::Sales => "Sales and negotiation skills",
            Self::Retail => "Customer service and retail",
        }
    }

    /// Whether replies should be scanned for coding examples
    #[must_use]
    pub const fn is_coding(self) -> bool {
        matches!(self, Self::Engineer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engineer" => Ok(Self::Engineer),
            "sales" => Ok(Self::Sales),
            "retail" => Ok(Self::Retail),
            other => Err(Error::Config(format!(
                "unknown role '{other}' (expected engineer, sales or retail)"
            ))),
        }
    }
}

/// Generate the per-process session id
#[must_use]
pub fn generate_session_id() -> String {
    format!("session_{}", chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(" Sales ".parse::<Role>().unwrap(), Role::Sales);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "manager".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("manager"));
    }

    #[test]
    fn test_only_engineer_is_coding() {
        assert!(Role::Engineer.is_coding());
        assert!(!Role::Sales.is_coding());
        assert!(!Role::Retail.is_coding());
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        let millis = id.strip_prefix("session_").unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }
}
