use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Privilege tier required to reach a request handler.
///
/// Variants are declared in ascending order of privilege, so the derived
/// `Ord` gives `Anyone < User < Admin`.  A caller may reach a handler when
/// its own group compares greater than or equal to the handler's group.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessGroup {
    /// No authentication required.
    #[default]
    #[serde(alias = "any")]
    Anyone,
    /// Any user listed in the credentials store.
    User,
    /// Administrators only.
    Admin,
}

impl AccessGroup {
    /// Return `true` when a caller in `self` may reach a handler gated by
    /// `required`.
    pub fn satisfies(self, required: AccessGroup) -> bool {
        self >= required
    }
}

impl fmt::Display for AccessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessGroup::Anyone => write!(f, "any"),
            AccessGroup::User => write!(f, "user"),
            AccessGroup::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for AccessGroup {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "anyone" => Ok(AccessGroup::Anyone),
            "user" => Ok(AccessGroup::User),
            "admin" => Ok(AccessGroup::Admin),
            other => Err(BotError::Settings(format!(
                "unknown access group '{other}' (expected any, user or admin)"
            ))),
        }
    }
}

/// The (viewer, operator) group pair used for the whole process lifetime.
///
/// Viewers may watch the video feed and read informational endpoints;
/// operators may drive the motors and change device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectivePolicy {
    pub viewer: AccessGroup,
    pub operator: AccessGroup,
}

impl EffectivePolicy {
    pub fn new(viewer: AccessGroup, operator: AccessGroup) -> Self {
        Self { viewer, operator }
    }
}

impl fmt::Display for EffectivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer={} operator={}", self.viewer, self.operator)
    }
}

/// String-keyed configuration / information surface of a device object.
pub type PropertyMap = BTreeMap<String, String>;

/// Workspace-wide error type spanning device configuration, hardware,
/// persistence and transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotError {
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Invalid value '{value}' for property '{name}'")]
    InvalidProperty { name: String, value: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Persistence Error: {0}")]
    Persistence(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Settings Error: {0}")]
    Settings(String),
}

impl BotError {
    /// Shorthand for [`BotError::InvalidProperty`].
    pub fn invalid(name: &str, value: &str) -> Self {
        BotError::InvalidProperty {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_groups_are_ordered_by_privilege() {
        assert!(AccessGroup::Anyone < AccessGroup::User);
        assert!(AccessGroup::User < AccessGroup::Admin);
        assert!(AccessGroup::Admin.satisfies(AccessGroup::User));
        assert!(!AccessGroup::Anyone.satisfies(AccessGroup::User));
        assert!(AccessGroup::User.satisfies(AccessGroup::User));
    }

    #[test]
    fn access_group_parses_cli_names() {
        assert_eq!("any".parse::<AccessGroup>().unwrap(), AccessGroup::Anyone);
        assert_eq!("User".parse::<AccessGroup>().unwrap(), AccessGroup::User);
        assert_eq!(" admin ".parse::<AccessGroup>().unwrap(), AccessGroup::Admin);
        assert!(matches!(
            "root".parse::<AccessGroup>(),
            Err(BotError::Settings(_))
        ));
    }

    #[test]
    fn access_group_display_matches_parse() {
        for group in [AccessGroup::Anyone, AccessGroup::User, AccessGroup::Admin] {
            assert_eq!(group.to_string().parse::<AccessGroup>().unwrap(), group);
        }
    }

    #[test]
    fn access_group_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AccessGroup::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: AccessGroup = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(back, AccessGroup::User);
        let back: AccessGroup = serde_json::from_str("\"any\"").unwrap();
        assert_eq!(back, AccessGroup::Anyone);
    }

    #[test]
    fn default_policy_is_open() {
        let policy = EffectivePolicy::default();
        assert_eq!(policy.viewer, AccessGroup::Anyone);
        assert_eq!(policy.operator, AccessGroup::Anyone);
        assert_eq!(policy.to_string(), "viewer=any operator=any");
    }

    #[test]
    fn bot_error_display() {
        let err = BotError::invalid("brightness", "300");
        assert!(err.to_string().contains("brightness"));
        assert!(err.to_string().contains("300"));

        let err2 = BotError::HardwareFault {
            component: "left_motor".to_string(),
            details: "driver not responding".to_string(),
        };
        assert!(err2.to_string().contains("left_motor"));
    }
}
