use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_WINDOW_DAYS;
use crate::error::AdsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self, AdsError> {
        if since > until {
            return Err(AdsError::Validation(format!(
                "since ({}) must not be after until ({})",
                since, until
            )));
        }
        Ok(Self { since, until })
    }

    /// The `days` calendar days ending on `today`, inclusive.
    pub fn trailing(days: u32, today: NaiveDate) -> Result<Self, AdsError> {
        if days == 0 || days > MAX_WINDOW_DAYS {
            return Err(AdsError::Validation(format!(
                "days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        let since = today - Duration::days(i64::from(days) - 1);
        Ok(Self { since, until: today })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.since <= date && date <= self.until
    }

    pub fn num_days(&self) -> i64 {
        (self.until - self.since).num_days() + 1
    }

    /// Every date of the window in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let since = self.since;
        (0..self.num_days()).map(move |offset| since + Duration::days(offset))
    }
}

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trailing_window_is_inclusive() {
        let range = DateRange::trailing(30, date(2024, 3, 30)).unwrap();
        assert_eq!(range.since, date(2024, 3, 1));
        assert_eq!(range.until, date(2024, 3, 30));
        assert_eq!(range.num_days(), 30);
    }

    #[test]
    fn test_single_day_window() {
        let range = DateRange::trailing(1, date(2024, 1, 1)).unwrap();
        assert_eq!(range.since, range.until);
        assert_eq!(range.dates().collect::<Vec<_>>(), vec![date(2024, 1, 1)]);
    }

    #[test]
    fn test_trailing_rejects_out_of_bounds_days() {
        assert!(matches!(
            DateRange::trailing(0, date(2024, 1, 1)),
            Err(AdsError::Validation(_))
        ));
        assert!(matches!(
            DateRange::trailing(MAX_WINDOW_DAYS + 1, date(2024, 1, 1)),
            Err(AdsError::Validation(_))
        ));
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(DateRange::new(date(2024, 2, 2), date(2024, 2, 1)).is_err());
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 2, 1)).is_ok());
    }

    #[test]
    fn test_dates_cross_month_boundary() {
        let range = DateRange::new(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        let dates: Vec<_> = range.dates().collect();
        assert_eq!(dates, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
        assert!(range.contains(date(2024, 2, 29)));
        assert!(!range.contains(date(2024, 3, 2)));
    }
}
