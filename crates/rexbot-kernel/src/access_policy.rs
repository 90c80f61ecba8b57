//! Access policy resolution.
//!
//! The robot exposes two classes of endpoint: *viewer* endpoints (video feed,
//! informational pages) and *operator* endpoints (motor control, device
//! configuration).  [`resolve_policy`] decides, once at startup, which
//! [`AccessGroup`] each class requires.
//!
//! Granting `user` or `admin` only makes sense when there is a credentials
//! store to authenticate against.  Without one, a request for a privileged
//! group is refused outright: both overrides are discarded and a
//! [`PolicyWarning`] is produced, leaving the service open rather than
//! pretending to be protected.

use rexbot_types::{AccessGroup, EffectivePolicy};
use tracing::warn;

/// Everything [`resolve_policy`] needs to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyInputs {
    /// Viewer group used when no credentials store is configured.
    pub default_viewer: AccessGroup,
    /// Operator group used when no credentials store is configured.
    pub default_operator: AccessGroup,
    /// Whether a credentials (users) store has been configured.
    pub has_credentials_store: bool,
    /// Explicit viewer group requested by the administrator, if any.
    pub viewer_override: Option<AccessGroup>,
    /// Explicit operator group requested by the administrator, if any.
    pub operator_override: Option<AccessGroup>,
}

/// Diagnostic produced when requested overrides had to be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyWarning {
    /// A privileged group was requested but there is no credentials store.
    OverridesIgnoredWithoutCredentials {
        viewer: Option<AccessGroup>,
        operator: Option<AccessGroup>,
    },
}

impl std::fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyWarning::OverridesIgnoredWithoutCredentials { .. } => write!(
                f,
                "users file was not specified, so ignoring the specified viewer/operator groups"
            ),
        }
    }
}

/// Result of [`resolve_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyResolution {
    pub policy: EffectivePolicy,
    pub warning: Option<PolicyWarning>,
}

/// Group pair applied when a credentials store is present.
const STORE_DEFAULTS: EffectivePolicy = EffectivePolicy {
    viewer: AccessGroup::User,
    operator: AccessGroup::Admin,
};

/// Resolve the [`EffectivePolicy`] for this run.
///
/// # Example
///
/// ```
/// use rexbot_kernel::access_policy::{resolve_policy, PolicyInputs};
/// use rexbot_types::AccessGroup;
///
/// let resolution = resolve_policy(PolicyInputs {
///     has_credentials_store: true,
///     viewer_override: Some(AccessGroup::Anyone),
///     ..Default::default()
/// });
///
/// assert_eq!(resolution.policy.viewer, AccessGroup::Anyone);
/// assert_eq!(resolution.policy.operator, AccessGroup::Admin);
/// assert!(resolution.warning.is_none());
/// ```
pub fn resolve_policy(inputs: PolicyInputs) -> PolicyResolution {
    let defaults = if inputs.has_credentials_store {
        STORE_DEFAULTS
    } else {
        EffectivePolicy::new(inputs.default_viewer, inputs.default_operator)
    };

    let privileged = |group: Option<AccessGroup>| {
        group.is_some_and(|g| g > AccessGroup::Anyone)
    };

    if !inputs.has_credentials_store
        && (privileged(inputs.viewer_override) || privileged(inputs.operator_override))
    {
        let warning = PolicyWarning::OverridesIgnoredWithoutCredentials {
            viewer: inputs.viewer_override,
            operator: inputs.operator_override,
        };
        warn!(
            viewer = ?inputs.viewer_override,
            operator = ?inputs.operator_override,
            "{warning}"
        );
        return PolicyResolution {
            policy: defaults,
            warning: Some(warning),
        };
    }

    PolicyResolution {
        policy: EffectivePolicy {
            viewer: inputs.viewer_override.unwrap_or(defaults.viewer),
            operator: inputs.operator_override.unwrap_or(defaults.operator),
        },
        warning: None,
    }
}
