//! Closed enums shared by storage, handlers and services. All of them are
//! stored as snake_case TEXT and serialized the same way on the wire.

pub mod fleet;
pub mod issue;
pub mod notification;
pub mod report;
pub mod role;

pub use fleet::{BusType, DayOfWeek, RouteType, ServiceDays, TripType};
pub use issue::{IssuePriority, IssueStatus, IssueType};
pub use notification::{Audience, NotificationPriority};
pub use report::{ExportKind, FeedbackCategory, ON_TIME_TOLERANCE_MINS};
pub use role::{ApprovalStatus, Panel, Role};
