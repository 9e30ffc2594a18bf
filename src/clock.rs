use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    /// The current calendar day in local time.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen on one day, for simulations and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
    now: DateTime<Local>,
}

impl FixedClock {
    /// Freezes the clock at local noon of `today`.
    pub fn on(today: NaiveDate) -> Self {
        let now = today
            .and_hms_opt(12, 0, 0)
            .and_then(|noon| Local.from_local_datetime(&noon).earliest())
            .unwrap_or_else(Local::now);
        FixedClock { today, now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
