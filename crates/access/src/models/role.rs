//! Facility role model.

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// A user's role within one facility.
///
/// Totally ordered by privilege: `Guest < Member < Manager < Owner`. A user
/// holds exactly one role per facility; roles are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Member,
    Manager,
    Owner,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Role; 4] = [Role::Guest, Role::Member, Role::Manager, Role::Owner];

    /// Ordinal privilege level (guest = 1 through owner = 4).
    pub fn level(self) -> u8 {
        match self {
            Self::Guest => 1,
            Self::Member => 2,
            Self::Manager => 3,
            Self::Owner => 4,
        }
    }

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Member => "member",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "member" => Ok(Self::Member),
            "manager" => Ok(Self::Manager),
            "owner" => Ok(Self::Owner),
            _ => Err(AccessError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_ordering() {
        assert_eq!(Role::Guest.level(), 1);
        assert_eq!(Role::Member.level(), 2);
        assert_eq!(Role::Manager.level(), 3);
        assert_eq!(Role::Owner.level(), 4);

        for a in Role::ALL {
            for b in Role::ALL {
                assert_eq!(a >= b, a.level() >= b.level(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(AccessError::UnknownRole(r)) if r == "admin"
        ));
        // Case matters on the wire.
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        let role: Role = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role, Role::Member);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }
}
