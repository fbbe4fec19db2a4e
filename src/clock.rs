#[cfg(test)]
use std::cell::Cell;
#[cfg(test)]
use std::rc::Rc;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Source of the current time and the offset that defines a "day".
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn offset(&self) -> FixedOffset;

    fn moment(&self) -> Moment {
        Moment::new(self.now(), self.offset())
    }
}

#[cfg(test)]
impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn offset(&self) -> FixedOffset {
        (**self).offset()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
    offset: FixedOffset,
}

#[cfg(test)]
impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
            offset: Utc.fix(),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// A snapshot of "now" together with the calendar it is read in.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl Moment {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn today(&self) -> NaiveDate {
        self.day_of(self.now)
    }

    pub fn day_of(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.offset).date_naive()
    }

    /// Midnight at the start of `day`, as a UTC instant.
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = day.and_time(NaiveTime::default());
        let shift = Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&(local - shift))
    }

    /// Start of the day `days` after today.
    pub fn start_of_day_in(&self, days: i64) -> DateTime<Utc> {
        self.start_of(self.today() + Duration::days(days))
    }

    pub fn is_today(&self, t: DateTime<Utc>) -> bool {
        self.day_of(t) == self.today()
    }
}
