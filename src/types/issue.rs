use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum IssueType {
    Mechanical,
    Traffic,
    Emergency,
    Accident,
    Weather,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Cancelled,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, IssueStatus::Pending | IssueStatus::InProgress)
    }

    /// pending -> in_progress -> resolved, with cancel from any open state
    /// and a direct pending -> resolved. Setting the current status again
    /// is a no-op and allowed.
    pub fn can_transition_to(self, next: IssueStatus) -> bool {
        use IssueStatus::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Pending, _) => true,
            (InProgress, Resolved | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::IssueStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_do_not_reopen() {
        for next in [Pending, InProgress, Cancelled] {
            assert!(!Resolved.can_transition_to(next));
        }
        for next in [Pending, InProgress, Resolved] {
            assert!(!Cancelled.can_transition_to(next));
        }
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn open_states() {
        assert!(Pending.is_open());
        assert!(InProgress.is_open());
        assert!(!Resolved.is_open());
    }
}
