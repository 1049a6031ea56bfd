use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed RBAC roles (§glossary). New roles are not created at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Developer,
    Analyst,
    Viewer,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Developer => "developer",
            Role::Analyst => "analyst",
            Role::Viewer => "viewer",
            Role::Auditor => "auditor",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "developer" => Some(Role::Developer),
            "analyst" => Some(Role::Analyst),
            "viewer" => Some(Role::Viewer),
            "auditor" => Some(Role::Auditor),
            _ => None,
        }
    }
}

/// Fixed permission set. `execute:query`/`view:audit` naming in §6's route
/// table maps onto `Permission::Execute`/`Permission::AuditView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Execute,
    AuditView,
    Export,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Execute => "execute:query",
            Permission::AuditView => "view:audit",
            Permission::Export => "export",
        }
    }
}

/// The fixed role → permission table (§glossary): `admin` = all;
/// `developer` = read, write, execute, audit-view, export; `analyst` =
/// read, execute, export; `viewer` = read; `auditor` = read, audit-view.
pub fn permissions_for_role(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::Admin => &[Read, Write, Execute, AuditView, Export],
        Role::Developer => &[Read, Write, Execute, AuditView, Export],
        Role::Analyst => &[Read, Execute, Export],
        Role::Viewer => &[Read],
        Role::Auditor => &[Read, AuditView],
    }
}

/// Union of permissions across every role a user holds.
pub fn get_user_permissions(roles: &[Role]) -> HashSet<Permission> {
    roles.iter().flat_map(|r| permissions_for_role(*r).iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_every_permission() {
        let perms = get_user_permissions(&[Role::Admin]);
        assert!(perms.contains(&Permission::Read));
        assert!(perms.contains(&Permission::Write));
        assert!(perms.contains(&Permission::Execute));
        assert!(perms.contains(&Permission::AuditView));
        assert!(perms.contains(&Permission::Export));
    }

    #[test]
    fn viewer_has_only_read() {
        let perms = get_user_permissions(&[Role::Viewer]);
        assert_eq!(perms.len(), 1);
        assert!(perms.contains(&Permission::Read));
    }

    #[test]
    fn multi_role_union() {
        let perms = get_user_permissions(&[Role::Viewer, Role::Auditor]);
        assert!(perms.contains(&Permission::Read));
        assert!(perms.contains(&Permission::AuditView));
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn role_round_trips_through_parse() {
        for role in [Role::Admin, Role::Developer, Role::Analyst, Role::Viewer, Role::Auditor] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }
}
