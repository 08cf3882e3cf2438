/// Departments of the business portal
///
/// A department is the tenant scope: every user and every project belongs to
/// exactly one, and non-admin users only see data of their own department.
///
/// ```sql
/// CREATE TYPE department AS ENUM (
///     'admin', 'accounts', 'hr', 'business_administration',
///     'digital_marketing', 'project_management', 'secretariat',
///     'executive_assistant'
/// );
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Department (Postgres enum `department`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "department", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Admin,
    Accounts,
    Hr,
    BusinessAdministration,
    DigitalMarketing,
    ProjectManagement,
    Secretariat,
    ExecutiveAssistant,
}

impl Department {
    /// All departments, in dashboard order
    pub const ALL: [Department; 8] = [
        Department::Admin,
        Department::Accounts,
        Department::Hr,
        Department::BusinessAdministration,
        Department::DigitalMarketing,
        Department::ProjectManagement,
        Department::Secretariat,
        Department::ExecutiveAssistant,
    ];

    /// Wire/database name
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Admin => "admin",
            Department::Accounts => "accounts",
            Department::Hr => "hr",
            Department::BusinessAdministration => "business_administration",
            Department::DigitalMarketing => "digital_marketing",
            Department::ProjectManagement => "project_management",
            Department::Secretariat => "secretariat",
            Department::ExecutiveAssistant => "executive_assistant",
        }
    }

    /// Human-readable name shown on dashboards
    pub fn display_name(&self) -> &'static str {
        match self {
            Department::Admin => "Admin",
            Department::Accounts => "Accounts",
            Department::Hr => "Human Resources",
            Department::BusinessAdministration => "Business Administration",
            Department::DigitalMarketing => "Digital Marketing",
            Department::ProjectManagement => "Project Management",
            Department::Secretariat => "Secretariat",
            Department::ExecutiveAssistant => "Executive Assistant",
        }
    }

    /// Name of the real-time room for this department
    pub fn room(&self) -> String {
        format!("department:{}", self.as_str())
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown department name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown department: {0}")]
pub struct UnknownDepartment(pub String);

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDepartment(s.to_string()))
    }
}
