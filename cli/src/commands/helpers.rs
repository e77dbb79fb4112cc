use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};

use nosh_core::catalog::Slot;
use nosh_core::models::{DayLog, History, fold_day_into_history};
use nosh_core::store::{SqliteStore, get_as, set_json};

pub(crate) fn today_str() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// Fetch today's log, folding a stale one into history first. Every command
/// that touches the day log goes through here, so the "local app models
/// today only" rule holds no matter how long the CLI sat unused.
pub(crate) fn current_day_log(store: &SqliteStore) -> DayLog {
    let today = today_str();
    let log: DayLog = get_as(store, Slot::TodayLog);
    if log.date == today {
        return log;
    }
    if !log.date.is_empty() && (!log.is_empty() || log.water > 0) {
        let mut history: History = get_as(store, Slot::History);
        fold_day_into_history(&log, &mut history);
        set_json(store, Slot::History, &history);
    }
    let fresh = DayLog::new(&today);
    set_json(store, Slot::TodayLog, &fresh);
    fresh
}

/// "2m ago" / "3h ago" / "5d ago" for the status line.
pub(crate) fn format_ago(rfc3339: &str) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(rfc3339) else {
        return "unknown".to_string();
    };
    let secs = (Utc::now() - then.with_timezone(&Utc)).num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::models::FoodEntry;

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_current_day_log_rolls_stale_day_into_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut old = DayLog::new("2020-01-01");
        old.entries.push(FoodEntry {
            id: String::new(),
            name: "Toast".to_string(),
            calories: 120.0,
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            serving_g: None,
            meal_type: "breakfast".to_string(),
            logged_at: String::new(),
        });
        set_json(&store, Slot::TodayLog, &old);

        let log = current_day_log(&store);
        assert_eq!(log.date, today_str());
        assert!(log.is_empty());

        let history: History = get_as(&store, Slot::History);
        assert!((history["2020-01-01"].calories - 120.0).abs() < 0.01);
    }

    #[test]
    fn test_current_day_log_keeps_today() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut log = DayLog::new(&today_str());
        log.water = 300;
        set_json(&store, Slot::TodayLog, &log);

        assert_eq!(current_day_log(&store).water, 300);
    }

    #[test]
    fn test_format_ago() {
        assert_eq!(format_ago("garbage"), "unknown");
        let recent = Utc::now().to_rfc3339();
        assert_eq!(format_ago(&recent), "just now");
        let old = (Utc::now() - chrono::Duration::hours(5)).to_rfc3339();
        assert_eq!(format_ago(&old), "5h ago");
    }
}
