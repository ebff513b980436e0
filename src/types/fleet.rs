use chrono::Weekday;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BusType {
    #[default]
    Long,
    Shuttle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RouteType {
    #[default]
    Shuttle,
    Metro,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DayOfWeek {
    Sat,
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sat,
        DayOfWeek::Sun,
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
    ];

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "sat" => Some(DayOfWeek::Sat),
            "sun" => Some(DayOfWeek::Sun),
            "mon" => Some(DayOfWeek::Mon),
            "tue" => Some(DayOfWeek::Tue),
            "wed" => Some(DayOfWeek::Wed),
            "thu" => Some(DayOfWeek::Thu),
            "fri" => Some(DayOfWeek::Fri),
            _ => None,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Mon,
            Weekday::Tue => DayOfWeek::Tue,
            Weekday::Wed => DayOfWeek::Wed,
            Weekday::Thu => DayOfWeek::Thu,
            Weekday::Fri => DayOfWeek::Fri,
            Weekday::Sat => DayOfWeek::Sat,
            Weekday::Sun => DayOfWeek::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ServiceDays {
    #[default]
    SatThu,
    SunThu,
    MonFri,
    All,
    Custom,
}

impl ServiceDays {
    /// Days a route runs. `custom` reads the comma separated day codes and
    /// falls back to Saturday-Thursday when none parse.
    pub fn days(self, custom: Option<&str>) -> Vec<DayOfWeek> {
        use DayOfWeek::*;
        let fallback = || vec![Sat, Sun, Mon, Tue, Wed, Thu];
        match self {
            ServiceDays::SatThu => fallback(),
            ServiceDays::SunThu => vec![Sun, Mon, Tue, Wed, Thu],
            ServiceDays::MonFri => vec![Mon, Tue, Wed, Thu, Fri],
            ServiceDays::All => DayOfWeek::ALL.to_vec(),
            ServiceDays::Custom => {
                let mut days: Vec<DayOfWeek> = custom
                    .unwrap_or_default()
                    .split(',')
                    .filter_map(DayOfWeek::parse)
                    .collect();
                days.dedup();
                if days.is_empty() { fallback() } else { days }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_service_days_parse_codes() {
        let days = ServiceDays::Custom.days(Some("mon, WED,fri"));
        assert_eq!(days, vec![DayOfWeek::Mon, DayOfWeek::Wed, DayOfWeek::Fri]);
    }

    #[test]
    fn custom_service_days_fall_back_when_empty() {
        assert_eq!(
            ServiceDays::Custom.days(Some("xx")),
            ServiceDays::SatThu.days(None)
        );
        assert_eq!(ServiceDays::All.days(None).len(), 7);
    }
}
