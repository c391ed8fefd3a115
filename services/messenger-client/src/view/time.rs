// Label waktu relatif untuk inbox, separator tanggal, dan last seen
use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::Clock;

const WEEK_DAYS: i64 = 7;

// "now", "5m", "14:02", "Yesterday", "Monday", "03/02/2025"
pub fn relative_label(at: DateTime<Utc>, clock: &Clock) -> String {
    let elapsed = clock.now - at;
    if elapsed < Duration::minutes(1) {
        return "now".to_string();
    }
    if elapsed < Duration::hours(1) {
        return format!("{}m", elapsed.num_minutes());
    }

    let local = clock.to_local(at);
    let day = local.date_naive();
    let today = clock.today();

    if day == today {
        local.format("%H:%M").to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else if (today - day).num_days() < WEEK_DAYS {
        local.format("%A").to_string()
    } else {
        local.format("%d/%m/%Y").to_string()
    }
}

pub fn date_separator_label(day: NaiveDate, clock: &Clock) -> String {
    let today = clock.today();
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%A, %-d %B %Y").to_string()
    }
}

pub fn clock_time(at: DateTime<Utc>, clock: &Clock) -> String {
    clock.to_local(at).format("%H:%M").to_string()
}

pub fn last_seen_label(last_seen: Option<DateTime<Utc>>, clock: &Clock) -> String {
    match last_seen {
        Some(at) => format!("last seen {}", relative_label(at, clock)),
        None => "offline".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn clock() -> Clock {
        // Rabu 12 Maret 2025, 10:00 WIB (UTC+7)
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let now = offset
            .with_ymd_and_hms(2025, 3, 12, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        Clock::fixed(now, offset)
    }

    #[test]
    fn test_recent_labels() {
        let clock = clock();
        assert_eq!(relative_label(clock.now - Duration::seconds(20), &clock), "now");
        assert_eq!(relative_label(clock.now + Duration::seconds(5), &clock), "now");
        assert_eq!(relative_label(clock.now - Duration::minutes(12), &clock), "12m");
        assert_eq!(relative_label(clock.now - Duration::hours(3), &clock), "07:00");
    }

    #[test]
    fn test_older_labels() {
        let clock = clock();
        assert_eq!(relative_label(clock.now - Duration::hours(24), &clock), "Yesterday");
        assert_eq!(relative_label(clock.now - Duration::days(3), &clock), "Sunday");
        assert_eq!(relative_label(clock.now - Duration::days(30), &clock), "10/02/2025");
    }

    #[test]
    fn test_day_boundary_uses_local_offset() {
        let clock = clock();
        // 23:30 UTC tanggal 11 = 06:30 WIB tanggal 12 -> masih "hari ini"
        let at = Utc.with_ymd_and_hms(2025, 3, 11, 23, 30, 0).unwrap();
        assert_eq!(relative_label(at, &clock), "06:30");
    }

    #[test]
    fn test_date_separators() {
        let clock = clock();
        let today = clock.today();
        assert_eq!(date_separator_label(today, &clock), "Today");
        assert_eq!(date_separator_label(today.pred_opt().unwrap(), &clock), "Yesterday");
        assert_eq!(
            date_separator_label(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), &clock),
            "Saturday, 1 March 2025"
        );
    }

    #[test]
    fn test_last_seen() {
        let clock = clock();
        assert_eq!(last_seen_label(None, &clock), "offline");
        assert_eq!(
            last_seen_label(Some(clock.now - Duration::minutes(5)), &clock),
            "last seen 5m"
        );
    }
}
