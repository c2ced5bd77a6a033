//! Debounce hooks on top of [`DebounceScheduler`].
//!
//! The standalone types work anywhere; the `use_*` functions keep one
//! instance per key in the current composition and tie it to that
//! composition's scope.

use std::cell::RefCell;
use std::rc::Rc;

use crate::debounce::DebounceScheduler;
use crate::runtime::remember_with_key;
use crate::scope::{Disposable, current_scope};
use crate::signal::Signal;
use crate::spec::DebounceSpec;
use crate::timer::{Timers, timers};

/// A value that only settles after it stopped changing for `delay`.
#[derive(Clone)]
pub struct DebouncedValue<T: Clone + 'static> {
    settled: Signal<T>,
    scheduler: DebounceScheduler<T>,
}

impl<T: Clone + 'static> DebouncedValue<T> {
    pub fn new(timers: Timers, initial: T, spec: DebounceSpec) -> Self {
        let settled = Signal::new(initial);
        let target = settled.clone();
        let scheduler = DebounceScheduler::with_spec(timers, spec, move |v: T| {
            target.set(v);
            Ok(())
        });
        Self { settled, scheduler }
    }

    pub fn set(&self, value: T) {
        self.scheduler.trigger(value);
    }

    /// The last settled value.
    pub fn get(&self) -> T {
        self.settled.get()
    }

    /// Subscribe here to learn when a new value settles.
    pub fn signal(&self) -> &Signal<T> {
        &self.settled
    }

    pub fn scheduler(&self) -> &DebounceScheduler<T> {
        &self.scheduler
    }
}

impl<T: Clone + 'static> Disposable for DebouncedValue<T> {
    fn dispose(&self) {
        self.scheduler.dispose();
    }
}

/// Debounced wrapper around a callback taking `A` (use a tuple for several
/// arguments). Arguments are captured by value at call time.
pub struct DebouncedCallback<A: 'static> {
    scheduler: DebounceScheduler<A>,
}

impl<A: 'static> Clone for DebouncedCallback<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<A: 'static> DebouncedCallback<A> {
    pub fn new(
        timers: Timers,
        spec: DebounceSpec,
        mut callback: impl FnMut(A) + 'static,
    ) -> Self {
        Self::fallible(timers, spec, move |args| {
            callback(args);
            Ok(())
        })
    }

    /// Errors from `callback` come out of `Timers::run_due` (or `flush`).
    pub fn fallible(
        timers: Timers,
        spec: DebounceSpec,
        callback: impl FnMut(A) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            scheduler: DebounceScheduler::with_spec(timers, spec, callback),
        }
    }

    pub fn call(&self, args: A) {
        self.scheduler.trigger(args);
    }

    /// The next commit goes through `callback`, including one already pending.
    pub fn set_callback(&self, mut callback: impl FnMut(A) + 'static) {
        self.scheduler.set_action(move |args| {
            callback(args);
            Ok(())
        });
    }

    pub fn cancel(&self) -> bool {
        self.scheduler.cancel()
    }

    pub fn flush(&self) -> anyhow::Result<bool> {
        self.scheduler.flush()
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn scheduler(&self) -> &DebounceScheduler<A> {
        &self.scheduler
    }
}

impl<A: 'static> Disposable for DebouncedCallback<A> {
    fn dispose(&self) {
        self.scheduler.dispose();
    }
}

impl<I: 'static> Disposable for DebounceScheduler<I> {
    fn dispose(&self) {
        DebounceScheduler::dispose(self);
    }
}

struct UseDebounce<T: Clone + 'static> {
    debounced: DebouncedValue<T>,
    last_input: RefCell<(T, DebounceSpec)>,
}

/// Returns `value` once it has stopped changing for `spec.delay`.
///
/// The first composition returns `value` itself. Later compositions trigger
/// the scheduler whenever `value` or the delay differ from the previous call;
/// subscribe to [`use_debounce_signal`] to recompose when it settles.
pub fn use_debounce<T: Clone + PartialEq + 'static>(
    key: impl Into<String>,
    value: T,
    spec: DebounceSpec,
) -> T {
    use_debounce_hook(key.into(), value, spec).debounced.get()
}

/// Same as [`use_debounce`] but hands back the settled signal.
pub fn use_debounce_signal<T: Clone + PartialEq + 'static>(
    key: impl Into<String>,
    value: T,
    spec: DebounceSpec,
) -> Signal<T> {
    use_debounce_hook(key.into(), value, spec)
        .debounced
        .signal()
        .clone()
}

fn use_debounce_hook<T: Clone + PartialEq + 'static>(
    key: String,
    value: T,
    spec: DebounceSpec,
) -> Rc<UseDebounce<T>> {
    let hook = remember_with_key(format!("debounce:value:{key}"), || {
        let debounced = DebouncedValue::new(timers(), value.clone(), spec);
        if let Some(scope) = current_scope() {
            scope.own(debounced.clone());
        }
        UseDebounce {
            debounced,
            last_input: RefCell::new((value.clone(), spec)),
        }
    });

    let changed = {
        let last = hook.last_input.borrow();
        last.0 != value || last.1 != spec
    };
    if changed {
        hook.debounced.scheduler().set_delay(spec.delay);
        *hook.last_input.borrow_mut() = (value.clone(), spec);
        hook.debounced.set(value);
    }
    hook
}

/// Debounced version of `callback`. The returned handle is stable across
/// compositions; the callback body is refreshed every time, so a pending call
/// runs the most recent closure.
pub fn use_debounced_callback<A: 'static>(
    key: impl Into<String>,
    spec: DebounceSpec,
    callback: impl FnMut(A) + 'static,
) -> DebouncedCallback<A> {
    let key = key.into();
    let handle = remember_with_key(format!("debounce:callback:{key}"), || {
        let cb = DebouncedCallback::new(timers(), spec, |_: A| {});
        if let Some(scope) = current_scope() {
            scope.own(cb.clone());
        }
        cb
    });
    handle.set_callback(callback);
    handle.scheduler().set_delay(spec.delay);
    DebouncedCallback::clone(&handle)
}
