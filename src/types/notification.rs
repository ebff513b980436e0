use serde::{Deserialize, Serialize};

use super::role::{Panel, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[default]
    Info,
    Warning,
    Danger,
    Success,
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    All,
    Users,
    Drivers,
    Route,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Users => "users",
            Audience::Drivers => "drivers",
            Audience::Route => "route",
        }
    }

    /// Audiences whose notifications show up in a role's public feed.
    /// `None` means unrestricted. Route notifications reach drivers only
    /// through their inbox.
    pub fn visible_to(role: Role) -> Option<&'static [Audience]> {
        match role.panel() {
            Panel::Admin | Panel::Authority => None,
            Panel::Driver => Some(&[Audience::All, Audience::Drivers]),
            Panel::Rider => Some(&[Audience::All, Audience::Users]),
        }
    }

    pub fn reaches(self, role: Role) -> bool {
        match Audience::visible_to(role) {
            None => true,
            Some(list) => list.contains(&self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drivers_and_riders_see_disjoint_targeted_feeds() {
        assert!(Audience::Drivers.reaches(Role::Driver));
        assert!(!Audience::Users.reaches(Role::Driver));
        assert!(Audience::Users.reaches(Role::Student));
        assert!(!Audience::Drivers.reaches(Role::Faculty));
        assert!(Audience::All.reaches(Role::Staff));
    }

    #[test]
    fn management_sees_everything() {
        for audience in [Audience::All, Audience::Users, Audience::Drivers, Audience::Route] {
            assert!(audience.reaches(Role::Admin));
            assert!(audience.reaches(Role::Authority));
        }
        assert!(!Audience::Route.reaches(Role::Driver));
    }
}
