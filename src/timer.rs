//! Performance measurement tools.

use std::{
    cell::Cell,
    fmt,
    time::{Duration, Instant},
};

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    total: Cell<Duration>,
    count: Cell<usize>,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Cell::new(Duration::ZERO),
            count: Cell::new(0),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = timee();
        self.total.set(self.total.get() + start.elapsed());
        self.count.set(self.count.get() + 1);
        result
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count.get();
        let avg = if count == 0 {
            Duration::ZERO
        } else {
            self.total.get() / count as u32
        };
        self.total.set(Duration::ZERO);
        self.count.set(0);
        write!(f, "{}: {:.1?}", self.name, avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_and_resets() {
        let timer = Timer::new("op");
        let out = timer.time(|| 7);
        assert_eq!(out, 7);
        assert_eq!(timer.count.get(), 1);

        let _ = format!("{timer}");
        assert_eq!(timer.count.get(), 0);
        assert_eq!(timer.total.get(), Duration::ZERO);
    }
}
