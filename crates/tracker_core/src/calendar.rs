use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::weekday::WeekDay;

/// The ambient calendar used for every day-granularity decision.
///
/// Instants are stored in UTC and interpreted in `offset` when asking which
/// calendar day they fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
    first_weekday: WeekDay,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn new(offset: FixedOffset, first_weekday: WeekDay) -> Self {
        Self {
            offset,
            first_weekday,
        }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix(), WeekDay::Monday)
    }

    /// Builds a calendar from an offset east of UTC in minutes.
    pub fn with_offset_minutes(minutes: i32, first_weekday: WeekDay) -> Option<Self> {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(Self::new(offset, first_weekday))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn first_weekday(&self) -> WeekDay {
        self.first_weekday
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn weekday_of(&self, instant: DateTime<Utc>) -> WeekDay {
        WeekDay::from_chrono(self.day_of(instant).weekday())
    }

    /// The instant at which `date` begins in this calendar.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let seconds = i64::from(self.offset.local_minus_utc());
        Utc.from_utc_datetime(&(local_midnight - chrono::Duration::seconds(seconds)))
    }

    pub fn is_same_day(&self, a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.day_of(a) == self.day_of(b),
            _ => false,
        }
    }

    pub fn is_after_day(&self, a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.day_of(a) > self.day_of(b),
            _ => false,
        }
    }

    /// Midnight UTC of the calendar day `instant` falls on locally.
    ///
    /// Completion days are keyed by this value so that they do not drift when
    /// the device time zone changes.
    pub fn truncate_to_utc_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        utc_midnight(self.day_of(instant))
    }

    pub fn ordered_weekdays(&self) -> Vec<WeekDay> {
        WeekDay::ordered_from(self.first_weekday)
    }
}

pub(crate) fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
