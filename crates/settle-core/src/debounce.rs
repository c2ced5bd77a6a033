//! Trailing-edge debounce over a [`Timers`] queue.
//!
//! A [`DebounceScheduler`] owns one pending slot. Every `trigger` cancels the
//! timer in that slot and schedules a new one, so only the intent captured by
//! the last call of a burst reaches the bound action, `delay` after that call.
//!
//! ```rust
//! use settle_core::*;
//! use std::{cell::Cell, rc::Rc};
//! use web_time::Duration;
//!
//! let clock = TestClock::new();
//! let timers = Timers::new(clock.clone());
//! let total = Rc::new(Cell::new(0));
//!
//! let t = total.clone();
//! let d = DebounceScheduler::new(timers.clone(), 200, move |n: i32| {
//!     t.set(t.get() + n);
//!     Ok(())
//! })
//! .unwrap();
//!
//! for _ in 0..4 {
//!     d.trigger(2);
//! }
//! clock.advance(Duration::from_millis(300));
//! timers.run_due().unwrap();
//! assert_eq!(total.get(), 2);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::error::ConfigurationError;
use crate::spec::{DebounceSpec, delay_from_millis};
use crate::timer::{TimerHandle, Timers};

type ActionFn<I> = Box<dyn FnMut(I) -> anyhow::Result<()>>;

enum Pending<I> {
    Idle,
    Scheduled {
        intent: I,
        handle: TimerHandle,
        // identifies which trigger the timer belongs to
        epoch: u64,
    },
}

struct Inner<I: 'static> {
    timers: Timers,
    delay: Cell<Duration>,
    pending: RefCell<Pending<I>>,
    action: RefCell<Option<ActionFn<I>>>,
    epoch: Cell<u64>,
    disposed: Cell<bool>,
}

impl<I: 'static> Inner<I> {
    fn take_pending(&self) -> Option<(I, TimerHandle)> {
        match self.pending.replace(Pending::Idle) {
            Pending::Idle => None,
            Pending::Scheduled { intent, handle, .. } => Some((intent, handle)),
        }
    }

    fn fire(&self, epoch: u64) -> anyhow::Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        let intent = match self.pending.replace(Pending::Idle) {
            Pending::Scheduled {
                intent, epoch: e, ..
            } if e == epoch => intent,
            other => {
                // superseded by a later trigger
                self.pending.replace(other);
                return Ok(());
            }
        };
        self.commit(intent)?;
        Ok(())
    }

    /// Returns `false` when the action is already running further up the
    /// stack and the intent was dropped.
    fn commit(&self, intent: I) -> anyhow::Result<bool> {
        let taken = self.action.borrow_mut().take();
        let Some(action) = taken else {
            log::warn!("debounce: action is already running; dropping intent");
            return Ok(false);
        };
        log::debug!("debounce: commit");
        let mut running = Running {
            cell: &self.action,
            action: Some(action),
        };
        running.call(intent)?;
        Ok(true)
    }

    fn is_running(&self) -> bool {
        self.action.borrow().is_none()
    }
}

/// Puts the action back into its cell once the call returns or unwinds.
struct Running<'a, I: 'static> {
    cell: &'a RefCell<Option<ActionFn<I>>>,
    action: Option<ActionFn<I>>,
}

impl<I: 'static> Running<'_, I> {
    fn call(&mut self, intent: I) -> anyhow::Result<()> {
        match self.action.as_mut() {
            Some(action) => action(intent),
            None => Ok(()),
        }
    }
}

impl<I: 'static> Drop for Running<'_, I> {
    fn drop(&mut self) {
        // keep a body registered while we were running
        let mut cell = self.cell.borrow_mut();
        if cell.is_none() {
            *cell = self.action.take();
        }
    }
}

impl<I: 'static> Drop for Inner<I> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.take_pending() {
            self.timers.cancel(handle);
        }
    }
}

/// Coalesces bursts of `trigger` calls into one commit of the last intent.
///
/// Clones share the same pending slot. The pending timer is cancelled on
/// [`dispose`](Self::dispose) or when the last clone is dropped.
pub struct DebounceScheduler<I: 'static> {
    inner: Rc<Inner<I>>,
}

impl<I: 'static> Clone for DebounceScheduler<I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I: 'static> DebounceScheduler<I> {
    /// Binds `action` with a delay in milliseconds. Negative delays are a
    /// `ConfigurationError`.
    pub fn new(
        timers: Timers,
        delay_ms: i64,
        action: impl FnMut(I) -> anyhow::Result<()> + 'static,
    ) -> Result<Self, ConfigurationError> {
        let spec = DebounceSpec::from_millis(delay_ms)?;
        Ok(Self::with_spec(timers, spec, action))
    }

    pub fn with_spec(
        timers: Timers,
        spec: DebounceSpec,
        action: impl FnMut(I) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                timers,
                delay: Cell::new(spec.delay),
                pending: RefCell::new(Pending::Idle),
                action: RefCell::new(Some(Box::new(action))),
                epoch: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Cancels the pending timer (if any) and schedules `intent` for `delay`
    /// from now. A no-op after `dispose`.
    pub fn trigger(&self, intent: I) {
        let inner = &self.inner;
        if inner.disposed.get() {
            log::trace!("debounce: trigger after dispose ignored");
            return;
        }
        if let Some((_, handle)) = inner.take_pending() {
            log::trace!("debounce: superseding pending intent");
            inner.timers.cancel(handle);
        }

        let epoch = inner.epoch.get().wrapping_add(1);
        inner.epoch.set(epoch);

        let weak: Weak<Inner<I>> = Rc::downgrade(inner);
        let handle = inner.timers.schedule_after(inner.delay.get(), move || {
            match weak.upgrade() {
                Some(inner) => inner.fire(epoch),
                None => Ok(()),
            }
        });
        *inner.pending.borrow_mut() = Pending::Scheduled {
            intent,
            handle,
            epoch,
        };
    }

    /// Registers a new action body. In-flight intents commit through it.
    pub fn set_action(&self, action: impl FnMut(I) -> anyhow::Result<()> + 'static) {
        *self.inner.action.borrow_mut() = Some(Box::new(action));
    }

    /// Takes effect on the next `trigger`; a scheduled timer keeps its deadline.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.delay.set(delay);
    }

    pub fn set_delay_ms(&self, ms: i64) -> Result<(), ConfigurationError> {
        self.set_delay(delay_from_millis(ms)?);
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay.get()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.pending.borrow(), Pending::Scheduled { .. })
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Drops the pending intent without committing it.
    pub fn cancel(&self) -> bool {
        match self.inner.take_pending() {
            Some((_, handle)) => {
                log::trace!("debounce: cancel");
                self.inner.timers.cancel(handle);
                true
            }
            None => false,
        }
    }

    /// Commits the pending intent now instead of waiting for the timer.
    /// Returns whether anything was committed.
    ///
    /// Called from inside the action itself, this leaves the intent pending
    /// for its timer and returns `false`.
    pub fn flush(&self) -> anyhow::Result<bool> {
        if self.inner.disposed.get() || self.inner.is_running() {
            return Ok(false);
        }
        match self.inner.take_pending() {
            Some((intent, handle)) => {
                self.inner.timers.cancel(handle);
                self.inner.commit(intent)
            }
            None => Ok(false),
        }
    }

    /// Cancels any pending timer. Safe to call any number of times; nothing
    /// commits after the first call returns.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        log::debug!("debounce: dispose");
        if let Some((_, handle)) = self.inner.take_pending() {
            self.inner.timers.cancel(handle);
        }
    }
}
