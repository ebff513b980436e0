//! HTTP handlers grouped by resource. Every handler authorizes through the
//! `CurrentUser` extractor and returns `TrackerError` on failure.

pub mod accounts;
pub mod assignments;
pub mod buses;
pub mod dashboard;
pub mod issues;
pub mod locations;
pub mod notifications;
pub mod reports;
pub mod routes;
pub mod users;
