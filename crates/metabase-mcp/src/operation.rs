//! The fixed set of Metabase operations.

use std::fmt;

/// One upstream operation exposed as a tool or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListDashboards,
    ListCards,
    ListDatabases,
    ExecuteCard,
    GetDashboardCards,
    ExecuteQuery,
    GetDashboard,
    GetCard,
    GetDatabase,
}

impl Operation {
    /// Stable snake_case name, matching the tool name where one exists.
    pub fn name(self) -> &'static str {
        match self {
            Operation::ListDashboards => "list_dashboards",
            Operation::ListCards => "list_cards",
            Operation::ListDatabases => "list_databases",
            Operation::ExecuteCard => "execute_card",
            Operation::GetDashboardCards => "get_dashboard_cards",
            Operation::ExecuteQuery => "execute_query",
            Operation::GetDashboard => "get_dashboard",
            Operation::GetCard => "get_card",
            Operation::GetDatabase => "get_database",
        }
    }

    /// Human-readable action, used in error messages.
    pub fn describe(self, target: Option<&str>) -> String {
        let action = match self {
            Operation::ListDashboards => "list dashboards",
            Operation::ListCards => "list cards",
            Operation::ListDatabases => "list databases",
            Operation::ExecuteCard => "execute card",
            Operation::GetDashboardCards => "get dashboard cards for",
            Operation::ExecuteQuery => "execute query on database",
            Operation::GetDashboard => "get dashboard",
            Operation::GetCard => "get card",
            Operation::GetDatabase => "get database",
        };
        match target {
            Some(target) => format!("{action} {target}"),
            None => action.trim_end_matches(" for").to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
