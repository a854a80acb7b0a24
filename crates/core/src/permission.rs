//! Permission strings and the capability check consumed by the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single capability, written as one character in a permission string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Download files and chunks, list metadata (`r`).
    Read,
    /// Upload and delete files (`w`).
    Write,
    /// Manage storages, settings and users (`a`).
    Admin,
}

impl Permission {
    /// Parse from its single-character form.
    pub fn from_char(c: char) -> crate::Result<Self> {
        match c {
            'r' => Ok(Self::Read),
            'w' => Ok(Self::Write),
            'a' => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidPermissions(format!(
                "unknown permission: {c:?}"
            ))),
        }
    }

    /// Get the single-character form.
    pub fn as_char(&self) -> char {
        match self {
            Self::Read => 'r',
            Self::Write => 'w',
            Self::Admin => 'a',
        }
    }

    /// Check if this permission implies another permission.
    pub fn implies(&self, other: &Self) -> bool {
        match self {
            Self::Admin => true, // Admin implies all
            Self::Write => matches!(other, Self::Write),
            Self::Read => matches!(other, Self::Read),
        }
    }
}

/// The set of capabilities granted to a caller, e.g. parsed from `"rw"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Parse a permission string. Duplicate characters are ignored.
    pub fn parse(s: &str) -> crate::Result<Self> {
        s.chars()
            .map(Permission::from_char)
            .collect::<crate::Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// A set with no capabilities.
    pub fn none() -> Self {
        Self::default()
    }

    /// A set with every capability.
    pub fn all() -> Self {
        Self([Permission::Read, Permission::Write, Permission::Admin].into())
    }

    /// Check if the set grants `permission`.
    pub fn has(&self, permission: Permission) -> bool {
        self.0.iter().any(|p| p.implies(&permission))
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, "{}", p.as_char())?;
        }
        Ok(())
    }
}

/// Authorization decision injected into write paths.
///
/// The engine never authenticates anyone; it only asks the caller's
/// collaborator whether a capability is granted.
pub trait Access: Send + Sync {
    fn allows(&self, permission: Permission) -> bool;
}

impl Access for PermissionSet {
    fn allows(&self, permission: Permission) -> bool {
        self.has(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_implies() {
        assert!(Permission::Admin.implies(&Permission::Read));
        assert!(Permission::Admin.implies(&Permission::Write));
        assert!(!Permission::Write.implies(&Permission::Read));
        assert!(!Permission::Read.implies(&Permission::Write));
    }

    #[test]
    fn test_permission_set_parse() {
        let set = PermissionSet::parse("rw").unwrap();
        assert!(set.allows(Permission::Read));
        assert!(set.allows(Permission::Write));
        assert!(!set.allows(Permission::Admin));

        assert_eq!(PermissionSet::parse("awrr").unwrap().to_string(), "rwa");
        assert!(PermissionSet::parse("rx").is_err());
        assert!(!PermissionSet::parse("").unwrap().allows(Permission::Read));
    }

    #[test]
    fn test_admin_grants_everything() {
        let set = PermissionSet::parse("a").unwrap();
        assert!(set.allows(Permission::Read));
        assert!(set.allows(Permission::Write));
        assert_eq!(PermissionSet::all().to_string(), "rwa");
        assert!(!PermissionSet::none().allows(Permission::Read));
    }
}
