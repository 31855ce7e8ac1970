use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::PermissionSet;

/// The schema version this build understands.
pub const SCHEMA_VERSION: u32 = 1;

/// Schema-versioned local permission policy.
///
/// `resolve(user, app)` intersects `local_max` with any per-user and
/// per-app override. Overrides narrow the cap; they can never grant more
/// than `local_max` allows, because [`PermissionSet::intersect`] is
/// elementwise AND.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// Schema version; currently always [`SCHEMA_VERSION`].
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The maximum permission set the operator allows, regardless of what
    /// the control plane grants.
    pub local_max: PermissionSet,
    /// Per-user overrides, intersected with `local_max`.
    #[serde(default)]
    pub by_user: HashMap<String, PermissionSet>,
    /// Per-app overrides, intersected with `local_max`.
    #[serde(default)]
    pub by_app: HashMap<String, PermissionSet>,
}

const fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for PermissionPolicy {
    /// The conservative default: execute and read allowed, write denied.
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            local_max: PermissionSet {
                read: true,
                write: false,
                execute: true,
            },
            by_user: HashMap::new(),
            by_app: HashMap::new(),
        }
    }
}

impl PermissionPolicy {
    /// A policy with every capability allowed to every user and app.
    #[must_use]
    pub fn execute_read_write() -> Self {
        Self {
            local_max: PermissionSet::all(),
            ..Self::default()
        }
    }

    /// A policy that allows read and execute, but never write.
    #[must_use]
    pub fn execute_read() -> Self {
        Self {
            local_max: PermissionSet {
                read: true,
                write: false,
                execute: true,
            },
            ..Self::default()
        }
    }

    /// A policy that allows only read access.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            local_max: PermissionSet {
                read: true,
                write: false,
                execute: false,
            },
            ..Self::default()
        }
    }

    /// Resolve the effective local cap for a `(user, app)` pair.
    ///
    /// `resolve(user, app) = local_max ∩ by_user[user]? ∩ by_app[app]?`.
    /// This is the local cap only — the caller must still intersect the
    /// result with the grant's declared permissions.
    #[must_use]
    pub fn resolve(&self, user: &str, app: &str) -> PermissionSet {
        let mut effective = self.local_max;
        if let Some(user_cap) = self.by_user.get(user) {
            effective = effective.intersect(*user_cap);
        }
        if let Some(app_cap) = self.by_app.get(app) {
            effective = effective.intersect(*app_cap);
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_no_overrides_returns_local_max() {
        let policy = PermissionPolicy::execute_read_write();
        assert_eq!(policy.resolve("alice", "vscode"), PermissionSet::all());
    }

    #[test]
    fn user_override_narrows_cap() {
        let mut policy = PermissionPolicy::execute_read_write();
        policy.by_user.insert(
            "alice".to_string(),
            PermissionSet {
                read: true,
                write: false,
                execute: true,
            },
        );
        let effective = policy.resolve("alice", "vscode");
        assert!(!effective.write);
        assert!(effective.read);
    }

    #[test]
    fn app_override_cannot_exceed_local_max() {
        let mut policy = PermissionPolicy::read_only();
        policy.by_app.insert("terminal".to_string(), PermissionSet::all());
        // local_max has write:false, so even an all-true app override
        // cannot grant write.
        let effective = policy.resolve("bob", "terminal");
        assert!(!effective.write);
        assert!(effective.read);
    }

    #[test]
    fn user_and_app_overrides_both_apply() {
        let mut policy = PermissionPolicy::execute_read_write();
        policy.by_user.insert(
            "alice".to_string(),
            PermissionSet {
                read: true,
                write: true,
                execute: false,
            },
        );
        policy.by_app.insert(
            "terminal".to_string(),
            PermissionSet {
                read: true,
                write: false,
                execute: true,
            },
        );
        let effective = policy.resolve("alice", "terminal");
        assert!(effective.read);
        assert!(!effective.write);
        assert!(!effective.execute);
    }
}
