use time::{Date, Duration, PrimitiveDateTime};

/// One row of `consumption_by_day`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailyConsumption {
    pub device_id: i64,
    pub dt: Date,
    pub value: f64,
}

/// One cumulative intra-day snapshot from `consumption_by_today`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TodayConsumption {
    pub device_id: i64,
    pub dt: PrimitiveDateTime,
    pub value: f64,
}

/// Inclusive range of bucket dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    pub fn single(day: Date) -> Self {
        Self { start: day, end: day }
    }

    /// First day of `day`'s month through `day`.
    pub fn month_to_date(day: Date) -> Self {
        let start = day - Duration::days(i64::from(day.day()) - 1);
        Self { start, end: day }
    }

    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn month_to_date_starts_on_the_first() {
        let r = DateRange::month_to_date(date!(2024 - 03 - 17));
        assert_eq!(r.start, date!(2024 - 03 - 01));
        assert_eq!(r.end, date!(2024 - 03 - 17));

        let first = DateRange::month_to_date(date!(2024 - 02 - 01));
        assert_eq!(first, DateRange::single(date!(2024 - 02 - 01)));
    }

    #[test]
    fn contains_is_inclusive() {
        let r = DateRange::new(date!(2024 - 03 - 01), date!(2024 - 03 - 02));
        assert!(r.contains(date!(2024 - 03 - 01)));
        assert!(r.contains(date!(2024 - 03 - 02)));
        assert!(!r.contains(date!(2024 - 03 - 03)));
        assert!(!r.contains(date!(2024 - 02 - 29)));
    }
}
