pub use crate::clock::{Clock, SystemClock, TestClock};
pub use crate::debounce::DebounceScheduler;
pub use crate::draft::{DraftState, use_draft};
pub use crate::error::{ConfigurationError, WorkerError};
pub use crate::hooks::{
    DebouncedCallback, DebouncedValue, use_debounce, use_debounce_signal, use_debounced_callback,
};
pub use crate::runtime::{
    Composition, remember, remember_state, remember_state_with_key, remember_with_key,
};
pub use crate::scope::{Disposable, Scope, current_scope};
pub use crate::shallow::{ShallowEq, ShallowState, use_shallow};
pub use crate::signal::{Signal, SubId, signal};
pub use crate::spec::{DebounceSpec, delay_from_millis};
pub use crate::timer::{Sleep, TimerHandle, Timers, set_timers, timers};
pub use crate::worker::{Worker, WorkerStatus, use_worker};
