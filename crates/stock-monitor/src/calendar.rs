use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Exchange time zone used for market days and the daily schedule.
pub const MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Weekdays that are not listed holidays.
pub fn is_market_day(date: NaiveDate, holidays: &[NaiveDate]) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

/// Today's date on the exchange calendar.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&MARKET_TZ).date_naive()
}

/// First occurrence of `at` (exchange local time) strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let local_today = now.with_timezone(&MARKET_TZ).date_naive();

    // Skips a local time that falls in a DST gap on that day
    for offset in 0..8 {
        let date = local_today + Duration::days(offset);
        if let Some(candidate) = MARKET_TZ.from_local_datetime(&date.and_time(at)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }

    now + Duration::days(1)
}
