//! Pure permission checks over role names.
//!
//! Role and permission arguments are the raw names the rest of the dashboard
//! passes around. Unknown roles hold nothing; unknown permission tokens are
//! only satisfied by the wildcard.

use crate::rbac::pages;
use crate::rbac::permission::Permission;
use crate::rbac::role::grants_for;

pub fn has_permission(role: &str, permission: &str) -> bool {
    let grants = grants_for(role);

    if grants.contains(&Permission::All) {
        return true;
    }

    match permission.parse::<Permission>() {
        Ok(p) => grants.contains(&p),
        Err(_) => false,
    }
}

pub fn has_any<S: AsRef<str>>(role: &str, permissions: &[S]) -> bool {
    permissions.iter().any(|p| has_permission(role, p.as_ref()))
}

/// Vacuously true for an empty list
pub fn has_all<S: AsRef<str>>(role: &str, permissions: &[S]) -> bool {
    permissions.iter().all(|p| has_permission(role, p.as_ref()))
}

/// Effective permissions: the full taxonomy for wildcard roles
pub fn role_permissions(role: &str) -> Vec<Permission> {
    let grants = grants_for(role);

    if grants.contains(&Permission::All) {
        Permission::TAXONOMY.to_vec()
    } else {
        grants.to_vec()
    }
}

pub fn can_access_page(role: &str, path: &str) -> bool {
    if pages::is_account_page(path) {
        return true;
    }

    match pages::required_permission(path) {
        Some(required) => has_permission(role, required.as_str()),
        None => true,
    }
}

pub fn can_export(role: &str) -> bool {
    has_any(role, &[Permission::ReportsExport.as_str(), Permission::All.as_str()])
}

pub fn can_manage_sensors(role: &str) -> bool {
    has_permission(role, Permission::SensorsManage.as_str())
}

pub fn can_manage_alerts(role: &str) -> bool {
    has_permission(role, Permission::AlertsManage.as_str())
}

pub fn can_manage_roles(role: &str) -> bool {
    has_permission(role, Permission::RolesManage.as_str())
}

pub fn can_manage_users(role: &str) -> bool {
    has_any(role, &[Permission::UsersManage.as_str(), Permission::All.as_str()])
}
