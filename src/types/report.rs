use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Service,
    Timing,
    Cleanliness,
    Driver,
    App,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    #[default]
    Performance,
    Trips,
    Feedback,
}

impl ExportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "performance" => Some(ExportKind::Performance),
            "trips" => Some(ExportKind::Trips),
            "feedback" => Some(ExportKind::Feedback),
            _ => None,
        }
    }
}

/// A trip counts as on time when it left at most this many minutes late.
pub const ON_TIME_TOLERANCE_MINS: i64 = 5;
