use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Time source shared by the timer, the recorder and the reports.
///
/// `Fixed` exists so tests can pin and step time explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that follows the system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock pinned to the given instant.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. No effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// First day of the week containing `date`. Weeks start on Sunday.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = i64::from(date.weekday().num_days_from_sunday());
    date - Duration::days(back)
}

/// Converts whole seconds into minutes kept at two-decimal precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn minutes_from_secs(secs: u64) -> f64 {
    round2(secs as f64 / 60.0)
}

/// Rounds to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z, a Tuesday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` pinned at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn week_starts_on_sunday() {
        let tuesday = fixed_now().date_naive();
        assert_eq!(tuesday.weekday(), Weekday::Tue);
        let start = week_start(tuesday);
        assert_eq!(start.weekday(), Weekday::Sun);
        assert_eq!(tuesday - start, Duration::days(2));
        assert_eq!(week_start(start), start);
    }

    #[test]
    fn minutes_keep_two_decimals() {
        assert!((minutes_from_secs(1800) - 30.0).abs() < f64::EPSILON);
        assert!((minutes_from_secs(1) - 0.02).abs() < f64::EPSILON);
        assert!((minutes_from_secs(100) - 1.67).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));
    }
}
