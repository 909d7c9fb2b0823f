use crate::rbac::permission::Permission::{self, *};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of statically configured roles
///
/// Users carry the role *name*; names that do not resolve to a variant get
/// the empty permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Operations Manager")]
    OperationsManager,
    Analyst,
    #[serde(rename = "Field Technician")]
    FieldTechnician,
    Viewer,
}

const ADMIN: &[Permission] = &[All];

const OPERATIONS_MANAGER: &[Permission] = &[
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
];

const ANALYST: &[Permission] = &[
    DashboardView,
    AnalyticsView,
    MapView,
    SensorsView,
    AlertsView,
    ReportsView,
    ReportsExport,
    SearchView,
];

const FIELD_TECHNICIAN: &[Permission] = &[
    DashboardView,
    MapView,
    SensorsView,
    SensorsManage,
    AlertsView,
    AlertsAcknowledge,
    SearchView,
];

const VIEWER: &[Permission] = &[DashboardView, MapView, SensorsView, AlertsView, SearchView];

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::OperationsManager,
        Role::Analyst,
        Role::FieldTechnician,
        Role::Viewer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::OperationsManager => "Operations Manager",
            Role::Analyst => "Analyst",
            Role::FieldTechnician => "Field Technician",
            Role::Viewer => "Viewer",
        }
    }

    /// Exact, case-sensitive lookup by role name
    pub fn from_name(name: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.name() == name)
    }

    /// Explicit grants of this role, in taxonomy order
    pub fn grants(self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN,
            Role::OperationsManager => OPERATIONS_MANAGER,
            Role::Analyst => ANALYST,
            Role::FieldTechnician => FIELD_TECHNICIAN,
            Role::Viewer => VIEWER,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Grants for a role name; unknown names resolve to the empty set
pub fn grants_for(role_name: &str) -> &'static [Permission] {
    Role::from_name(role_name).map(Role::grants).unwrap_or(&[])
}
