use std::cell::Cell;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// Source of "now" for a timer queue.
pub trait Clock: 'static {
    fn now(&self) -> Instant;
}

pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A test clock you can drive deterministically.
///
/// Clones share the same instant, so a test keeps one handle and gives
/// another to `Timers::new`.
#[derive(Clone)]
pub struct TestClock {
    t: Rc<Cell<Instant>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(t: Instant) -> Self {
        Self {
            t: Rc::new(Cell::new(t)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.t.set(self.t.get() + by);
    }

    pub fn set(&self, t: Instant) {
        self.t.set(t);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.t.get()
    }
}
