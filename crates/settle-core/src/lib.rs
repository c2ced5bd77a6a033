//! # Debounce scheduling and state hooks
//!
//! `settle` is a small runtime for UI state that should not react to every
//! single change. There are three layers:
//!
//! - [`Timers`]: a single-threaded queue of deferred callbacks driven by a
//!   [`Clock`]. The host calls [`Timers::run_due`] from its loop.
//! - [`DebounceScheduler`]: one pending slot over that queue. A burst of
//!   `trigger` calls commits once, with the last intent, after the burst has
//!   been quiet for the configured delay.
//! - Hooks: [`use_debounce`], [`use_debounced_callback`], [`use_draft`],
//!   [`use_shallow`] and [`use_worker`], which keep their state in a
//!   [`Composition`] and are disposed with it.
//!
//! ## Debounced callback
//!
//! ```rust
//! use settle_core::*;
//! use std::{cell::RefCell, rc::Rc};
//! use web_time::Duration;
//!
//! let clock = TestClock::new();
//! let timers = Timers::new(clock.clone());
//! let queries = Rc::new(RefCell::new(Vec::new()));
//!
//! let q = queries.clone();
//! let search = DebouncedCallback::new(timers.clone(), DebounceSpec::fast(), move |s: String| {
//!     q.borrow_mut().push(s)
//! });
//! search.call("r".into());
//! search.call("ru".into());
//! search.call("rust".into());
//!
//! clock.advance(Duration::from_millis(150));
//! timers.run_due().unwrap();
//! assert_eq!(*queries.borrow(), vec!["rust".to_string()]);
//! ```
//!
//! ## Hooks and disposal
//!
//! Hooks schedule on the per-thread queue returned by [`timers()`]; install
//! one with [`set_timers`]. Everything a hook creates is owned by the scope of
//! the composition it ran in, so [`Composition::dispose`] cancels pending
//! commits and terminates workers:
//!
//! ```rust
//! use settle_core::*;
//!
//! let clock = TestClock::new();
//! set_timers(Timers::new(clock.clone()));
//!
//! let composition = Composition::new();
//! let shown = composition.compose(|| use_debounce("query", "rust".to_string(), DebounceSpec::default()));
//! assert_eq!(shown, "rust");
//! composition.dispose();
//! ```

pub mod clock;
pub mod debounce;
pub mod draft;
pub mod error;
pub mod hooks;
pub mod prelude;
pub mod runtime;
pub mod scope;
pub mod shallow;
pub mod signal;
pub mod spec;
pub mod timer;
pub mod worker;


pub use prelude::*;
