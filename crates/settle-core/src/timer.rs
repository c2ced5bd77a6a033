//! Single-threaded queue of deferred callbacks.
//!
//! Nothing here runs on its own: the host (an event loop, a frame tick, or a
//! test) calls [`Timers::run_due`], and every callback whose deadline has
//! passed fires on that call. `schedule_after` and `cancel` never block.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use web_time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigurationError;
use crate::spec::delay_from_millis;

new_key_type! {
    /// Generational handle: once a timer fired or was cancelled, its handle
    /// never matches a newer timer.
    pub struct TimerHandle;
}

// deadline used when `now + delay` does not fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

type Callback = Box<dyn FnOnce() -> anyhow::Result<()>>;

struct Entry {
    deadline: Instant,
    seq: u64,
    callback: Callback,
}

#[derive(Default)]
struct Queue {
    entries: SlotMap<TimerHandle, Entry>,
    // (deadline, seq) keeps equal deadlines in scheduling order
    order: BTreeMap<(Instant, u64), TimerHandle>,
    next_seq: u64,
}

impl Queue {
    fn take(&mut self, handle: TimerHandle) -> Option<Callback> {
        let entry = self.entries.remove(handle)?;
        self.order.remove(&(entry.deadline, entry.seq));
        Some(entry.callback)
    }
}

/// Cloneable handle to a timer queue and the clock that drives it.
#[derive(Clone)]
pub struct Timers {
    clock: Rc<dyn Clock>,
    queue: Rc<RefCell<Queue>>,
}

impl Timers {
    pub fn new(clock: impl Clock) -> Self {
        Self {
            clock: Rc::new(clock),
            queue: Rc::new(RefCell::new(Queue::default())),
        }
    }

    pub fn system() -> Self {
        Self::new(SystemClock)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn schedule_after(
        &self,
        delay: Duration,
        callback: impl FnOnce() -> anyhow::Result<()> + 'static,
    ) -> TimerHandle {
        let now = self.clock.now();
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let mut q = self.queue.borrow_mut();
        let seq = q.next_seq;
        q.next_seq += 1;
        let handle = q.entries.insert(Entry {
            deadline,
            seq,
            callback: Box::new(callback),
        });
        q.order.insert((deadline, seq), handle);
        handle
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.queue.borrow_mut().take(handle).is_some()
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.queue.borrow().entries.contains_key(handle)
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().entries.len()
    }

    /// Earliest deadline still queued; a host loop can sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .order
            .first_key_value()
            .map(|((deadline, _), _)| *deadline)
    }

    /// Fires every timer that was due when the pass started.
    ///
    /// Timers scheduled by a callback wait for the next pass. The first
    /// callback error is returned as is and the rest of the batch stays queued.
    pub fn run_due(&self) -> anyhow::Result<usize> {
        let now = self.clock.now();
        let due: SmallVec<[TimerHandle; 8]> = self
            .queue
            .borrow()
            .order
            .range(..=(now, u64::MAX))
            .map(|(_, handle)| *handle)
            .collect();

        let mut fired = 0;
        for handle in due {
            // an earlier callback in this pass may have cancelled it
            let Some(callback) = self.queue.borrow_mut().take(handle) else {
                continue;
            };
            fired += 1;
            callback()?;
        }
        Ok(fired)
    }

    /// One-shot timer that only flips a flag; negative delays are rejected.
    pub fn sleep(&self, ms: i64) -> Result<Sleep, ConfigurationError> {
        let delay = delay_from_millis(ms)?;
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let handle = self.schedule_after(delay, move || {
            flag.set(true);
            Ok(())
        });
        Ok(Sleep { done, handle })
    }
}

pub struct Sleep {
    done: Rc<Cell<bool>>,
    handle: TimerHandle,
}

impl Sleep {
    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle
    }
}

thread_local! {
    static DEFAULT_TIMERS: RefCell<Option<Timers>> = const { RefCell::new(None) };
}

/// The queue hooks schedule on. Falls back to a system-clock queue.
pub fn timers() -> Timers {
    DEFAULT_TIMERS.with(|slot| slot.borrow_mut().get_or_insert_with(Timers::system).clone())
}

/// Install the queue for this thread. Platform loops install theirs; tests
/// install one driven by a `TestClock`.
pub fn set_timers(timers: Timers) {
    DEFAULT_TIMERS.with(|slot| *slot.borrow_mut() = Some(timers));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, Timers, TestClock) {
        let clock = TestClock::new();
        (Rc::new(RefCell::new(Vec::new())), Timers::new(clock.clone()), clock)
    }

    #[test]
    fn test_fires_in_deadline_then_schedule_order() {
        let (log, timers, clock) = recorder();
        for (name, delay) in [("c", 30), ("a", 10), ("b1", 20), ("b2", 20)] {
            let log = log.clone();
            timers.schedule_after(ms(delay), move || {
                log.borrow_mut().push(name);
                Ok(())
            });
        }

        clock.advance(ms(15));
        assert_eq!(timers.run_due().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["a"]);

        clock.advance(ms(100));
        assert_eq!(timers.run_due().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b1", "b2", "c"]);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_cancel_is_noop_after_fire() {
        let (log, timers, clock) = recorder();
        let l = log.clone();
        let h = timers.schedule_after(ms(0), move || {
            l.borrow_mut().push("fired");
            Ok(())
        });
        assert!(timers.is_scheduled(h));
        assert_eq!(timers.run_due().unwrap(), 1);
        assert!(!timers.cancel(h));

        let l = log.clone();
        let h2 = timers.schedule_after(ms(5), move || {
            l.borrow_mut().push("never");
            Ok(())
        });
        assert!(timers.cancel(h2));
        assert!(!timers.cancel(h2));
        clock.advance(ms(10));
        assert_eq!(timers.run_due().unwrap(), 0);
        assert_eq!(*log.borrow(), vec!["fired"]);
    }

    #[test]
    fn test_callback_cancels_later_timer_in_same_pass() {
        let (log, timers, clock) = recorder();
        let victim = Rc::new(Cell::new(None::<TimerHandle>));

        let (t, v, l) = (timers.clone(), victim.clone(), log.clone());
        timers.schedule_after(ms(10), move || {
            l.borrow_mut().push("first");
            if let Some(h) = v.get() {
                t.cancel(h);
            }
            Ok(())
        });
        let l = log.clone();
        victim.set(Some(timers.schedule_after(ms(10), move || {
            l.borrow_mut().push("second");
            Ok(())
        })));

        clock.advance(ms(10));
        assert_eq!(timers.run_due().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_rescheduled_zero_delay_waits_for_next_pass() {
        let (log, timers, _clock) = recorder();
        let (t, l) = (timers.clone(), log.clone());
        timers.schedule_after(ms(0), move || {
            l.borrow_mut().push("outer");
            let l = l.clone();
            t.schedule_after(Duration::ZERO, move || {
                l.borrow_mut().push("inner");
                Ok(())
            });
            Ok(())
        });

        assert_eq!(timers.run_due().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(timers.run_due().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_error_stops_pass_and_keeps_rest_queued() {
        let (log, timers, clock) = recorder();
        timers.schedule_after(ms(1), || Err(anyhow::anyhow!("boom")));
        let l = log.clone();
        timers.schedule_after(ms(2), move || {
            l.borrow_mut().push("after");
            Ok(())
        });

        clock.advance(ms(5));
        let err = timers.run_due().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(timers.pending(), 1);

        assert_eq!(timers.run_due().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn test_next_deadline() {
        let (_log, timers, clock) = recorder();
        assert!(timers.next_deadline().is_none());
        let start = clock.now();
        timers.schedule_after(ms(40), || Ok(()));
        timers.schedule_after(ms(20), || Ok(()));
        assert_eq!(timers.next_deadline(), Some(start + ms(20)));
    }

    #[test]
    fn test_sleep() {
        let (_log, timers, clock) = recorder();
        assert_eq!(
            timers.sleep(-1).err(),
            Some(ConfigurationError::NegativeDelay(-1))
        );

        let s = timers.sleep(300).unwrap();
        clock.advance(ms(299));
        timers.run_due().unwrap();
        assert!(!s.is_done());
        clock.advance(ms(1));
        timers.run_due().unwrap();
        assert!(s.is_done());
        assert!(!timers.is_scheduled(s.handle()));
    }

    #[test]
    fn test_default_timers_can_be_replaced() {
        let clock = TestClock::new();
        let mine = Timers::new(clock.clone());
        set_timers(mine.clone());
        timers().schedule_after(ms(1), || Ok(()));
        assert_eq!(mine.pending(), 1);
    }

    #[test]
    fn test_huge_delay_does_not_overflow() {
        let (log, timers, clock) = recorder();
        let l = log.clone();
        let handle = timers.schedule_after(Duration::MAX, move || {
            l.borrow_mut().push("never");
            Ok(())
        });
        assert!(timers.is_scheduled(handle));
        assert!(timers.next_deadline().is_some());

        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(timers.run_due().unwrap(), 0);
        assert!(log.borrow().is_empty());
        assert!(timers.cancel(handle));
    }
}
