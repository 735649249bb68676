//! Time sources.
//!
//! Record instants are milliseconds since the Unix epoch. [`MonotonicStamp`]
//! guarantees that instants handed out by one process strictly increase even
//! if the wall clock stalls or steps backwards.

use std::cell::Cell;
use std::fmt;

use relief_core::Millis;
use web_time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    fn now_millis(&self) -> Millis;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Millis) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now_millis(&self) -> Millis {
        (**self).now_millis()
    }
}

/// Strictly increasing instants over any [`Clock`].
pub struct MonotonicStamp {
    clock: Box<dyn Clock>,
    last: Cell<Millis>,
}

impl MonotonicStamp {
    #[must_use]
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            last: Cell::new(0),
        }
    }

    /// Next instant: the clock reading, or one past the previous instant
    /// when the clock has not moved forward.
    pub fn next(&self) -> Millis {
        let now = self.clock.now_millis();
        let next = if now > self.last.get() {
            now
        } else {
            self.last.get() + 1
        };
        self.last.set(next);
        next
    }
}

impl Default for MonotonicStamp {
    fn default() -> Self {
        Self::new(Box::new(SystemClock))
    }
}

impl fmt::Debug for MonotonicStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonotonicStamp")
            .field("last", &self.last.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn stalled_clock_still_advances() {
        let clock = Rc::new(ManualClock::new(100));
        let stamp = MonotonicStamp::new(Box::new(Rc::clone(&clock)));
        assert_eq!(stamp.next(), 100);
        assert_eq!(stamp.next(), 101);
        clock.set(50);
        assert_eq!(stamp.next(), 102);
        clock.set(500);
        assert_eq!(stamp.next(), 500);
    }

    proptest::proptest! {
        #[test]
        fn stamps_strictly_increase(readings in proptest::collection::vec(0u64..1_000, 1..64)) {
            let clock = Rc::new(ManualClock::new(0));
            let stamp = MonotonicStamp::new(Box::new(Rc::clone(&clock)));
            let mut last = None;
            for reading in readings {
                clock.set(reading);
                let next = stamp.next();
                proptest::prop_assert!(next >= reading);
                if let Some(prev) = last {
                    proptest::prop_assert!(next > prev);
                }
                last = Some(next);
            }
        }
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
