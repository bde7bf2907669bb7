//! Back-off of passive pull request checks.

use std::time::Duration;

use chrono::{DateTime, Utc};

const HOUR: u64 = 60 * 60;

/// Delay before the next passive check of a pull request last updated at
/// `updated_at`. Pull requests nobody touches are polled less and less.
pub fn get_reminder_delay(
    default_delay: Duration,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Duration {
    let idle_days = (now - updated_at).num_days();
    match idle_days {
        d if d >= 30 => Duration::from_secs(12 * HOUR),
        d if d >= 21 => Duration::from_secs(HOUR),
        d if d >= 14 => Duration::from_secs(30 * 60),
        d if d >= 7 => Duration::from_secs(15 * 60),
        _ => default_delay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as Days;

    const DEFAULT: Duration = Duration::from_secs(300);

    fn delay_after(days: i64) -> Duration {
        let now = Utc::now();
        get_reminder_delay(DEFAULT, now - Days::days(days), now)
    }

    #[test]
    fn test_delay_escalates_with_idle_time() {
        assert_eq!(delay_after(0), DEFAULT);
        assert_eq!(delay_after(6), DEFAULT);
        assert_eq!(delay_after(7), Duration::from_secs(15 * 60));
        assert_eq!(delay_after(14), Duration::from_secs(30 * 60));
        assert_eq!(delay_after(21), Duration::from_secs(60 * 60));
        assert_eq!(delay_after(29), Duration::from_secs(60 * 60));
        assert_eq!(delay_after(30), Duration::from_secs(12 * 60 * 60));
        assert_eq!(delay_after(400), Duration::from_secs(12 * 60 * 60));
    }

    #[test]
    fn test_future_update_uses_default() {
        let now = Utc::now();
        assert_eq!(get_reminder_delay(DEFAULT, now + Days::days(3), now), DEFAULT);
    }
}
