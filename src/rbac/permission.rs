use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Atomic capability token checked independently of any page
///
/// `All` is the synthetic wildcard: a role holding it satisfies every check,
/// including tokens added to the taxonomy later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Permission {
    DashboardView,
    AnalyticsView,
    MapView,
    SensorsView,
    SensorsManage,
    AlertsView,
    AlertsManage,
    AlertsAcknowledge,
    ReportsView,
    ReportsExport,
    SearchView,
    UsersView,
    UsersManage,
    RolesManage,
    SettingsManage,
    All,
}

impl Permission {
    /// Every concrete token, in display order (the wildcard is excluded)
    pub const TAXONOMY: [Permission; 15] = [
        Permission::DashboardView,
        Permission::AnalyticsView,
        Permission::MapView,
        Permission::SensorsView,
        Permission::SensorsManage,
        Permission::AlertsView,
        Permission::AlertsManage,
        Permission::AlertsAcknowledge,
        Permission::ReportsView,
        Permission::ReportsExport,
        Permission::SearchView,
        Permission::UsersView,
        Permission::UsersManage,
        Permission::RolesManage,
        Permission::SettingsManage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::DashboardView => "dashboard.view",
            Permission::AnalyticsView => "analytics.view",
            Permission::MapView => "map.view",
            Permission::SensorsView => "sensors.view",
            Permission::SensorsManage => "sensors.manage",
            Permission::AlertsView => "alerts.view",
            Permission::AlertsManage => "alerts.manage",
            Permission::AlertsAcknowledge => "alerts.acknowledge",
            Permission::ReportsView => "reports.view",
            Permission::ReportsExport => "reports.export",
            Permission::SearchView => "search.view",
            Permission::UsersView => "users.view",
            Permission::UsersManage => "users.manage",
            Permission::RolesManage => "roles.manage",
            Permission::SettingsManage => "settings.manage",
            Permission::All => "all",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission token '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Permission::All.as_str() {
            return Ok(Permission::All);
        }

        Permission::TAXONOMY
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermission;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
