use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role. Every role check in the crate matches on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Staff,
    Driver,
    Admin,
    Authority,
}

/// Which dashboard a role lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Admin,
    Authority,
    Driver,
    Rider,
}

impl Role {
    pub const REGULAR: [Role; 3] = [Role::Student, Role::Faculty, Role::Staff];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Staff => "staff",
            Role::Driver => "driver",
            Role::Admin => "admin",
            Role::Authority => "authority",
        }
    }

    pub fn panel(self) -> Panel {
        match self {
            Role::Admin => Panel::Admin,
            Role::Authority => Panel::Authority,
            Role::Driver => Panel::Driver,
            Role::Student | Role::Faculty | Role::Staff => Panel::Rider,
        }
    }

    /// Students, faculty and staff: riders without operational duties.
    pub fn is_regular(self) -> bool {
        matches!(self.panel(), Panel::Rider)
    }

    /// Admin or authority: may see everything operational.
    pub fn is_management(self) -> bool {
        match self.panel() {
            Panel::Admin | Panel::Authority => true,
            Panel::Driver | Panel::Rider => false,
        }
    }

    /// Roles a visitor may pick when self-registering.
    pub fn is_self_registrable(self) -> bool {
        self.is_regular()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn can_login(self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}
