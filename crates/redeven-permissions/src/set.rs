use serde::{Deserialize, Serialize};

/// A `{read, write, execute}` capability triple.
///
/// Intersection ([`PermissionSet::intersect`]) is elementwise AND: the
/// effective permissions of a live session are always the grant's declared
/// set intersected with the local cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Read access to the virtual filesystem and terminal session list.
    #[serde(default)]
    pub read: bool,
    /// Write/delete access to the virtual filesystem.
    #[serde(default)]
    pub write: bool,
    /// Ability to spawn terminals and query the monitor snapshot.
    #[serde(default)]
    pub execute: bool,
}

impl PermissionSet {
    /// A set with every capability granted.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            read: true,
            write: true,
            execute: true,
        }
    }

    /// A set with every capability denied.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            read: false,
            write: false,
            execute: false,
        }
    }

    /// Elementwise AND of two permission sets.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self {
            read: self.read && other.read,
            write: self.write && other.write,
            execute: self.execute && other.execute,
        }
    }
}

impl std::ops::BitAnd for PermissionSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersect(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_is_elementwise_and() {
        let a = PermissionSet {
            read: true,
            write: true,
            execute: false,
        };
        let b = PermissionSet {
            read: true,
            write: false,
            execute: true,
        };
        let c = a.intersect(b);
        assert!(c.read);
        assert!(!c.write);
        assert!(!c.execute);
    }

    #[test]
    fn all_intersect_none_is_none() {
        assert_eq!(PermissionSet::all().intersect(PermissionSet::none()), PermissionSet::none());
    }

    #[test]
    fn missing_fields_default_to_false() {
        let set: PermissionSet = serde_json::from_str("{}").unwrap();
        assert_eq!(set, PermissionSet::none());
    }
}
