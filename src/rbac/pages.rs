use crate::rbac::permission::Permission;

/// "My account" page, open to every authenticated role
pub const ACCOUNT_PAGE: &str = "/admin";

/// Declared routes and the permission each one requires
///
/// Routes not covered here are open to any authenticated role.
pub const PAGE_PERMISSIONS: &[(&str, Permission)] = &[
    ("/", Permission::DashboardView),
    ("/dashboard", Permission::DashboardView),
    ("/analytics", Permission::AnalyticsView),
    ("/map", Permission::MapView),
    ("/sensors", Permission::SensorsView),
    ("/alerts", Permission::AlertsView),
    ("/reports", Permission::ReportsView),
    ("/search", Permission::SearchView),
    ("/users", Permission::UsersView),
    ("/roles", Permission::RolesManage),
    ("/settings", Permission::SettingsManage),
];

/// Strip query string, fragment and trailing slashes
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');

    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn covers(route: &str, path: &str) -> bool {
    if route == "/" {
        return path == "/";
    }

    path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Permission required by the most specific declared route covering `path`
pub fn required_permission(path: &str) -> Option<Permission> {
    let path = normalize_path(path);

    PAGE_PERMISSIONS
        .iter()
        .filter(|(route, _)| covers(route, path))
        .max_by_key(|(route, _)| route.len())
        .map(|(_, permission)| *permission)
}

pub fn is_account_page(path: &str) -> bool {
    covers(ACCOUNT_PAGE, normalize_path(path))
}
