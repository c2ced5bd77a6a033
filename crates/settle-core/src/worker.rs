//! Background offload for a single computation.
//!
//! The job runs on its own OS thread and writes its outcome into a shared
//! slot; the owner polls the slot from its own loop. A panicking job is
//! reported as [`WorkerStatus::Failed`] with the panic message.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use web_time::{Duration, Instant};

use crate::error::WorkerError;
use crate::runtime::remember_with_key;
use crate::scope::{Disposable, current_scope};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerStatus<R> {
    Pending,
    Done(R),
    Failed(String),
}

impl<R> WorkerStatus<R> {
    pub fn is_pending(&self) -> bool {
        matches!(self, WorkerStatus::Pending)
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            WorkerStatus::Done(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WorkerStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

struct Slot<R> {
    status: WorkerStatus<R>,
    terminated: bool,
    finished: bool,
}

struct Shared<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

pub struct Worker<R> {
    shared: Arc<Shared<R>>,
}

fn panic_message(err: Box<dyn Any + Send>) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

impl<R: Send + 'static> Worker<R> {
    pub fn spawn<M: Send + 'static>(
        job: impl FnOnce(M) -> R + Send + 'static,
        message: M,
    ) -> Result<Self, WorkerError> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                status: WorkerStatus::Pending,
                terminated: false,
                finished: false,
            }),
            ready: Condvar::new(),
        });

        let remote = shared.clone();
        thread::Builder::new()
            .name("settle-worker".into())
            .spawn(move || {
                let status = match catch_unwind(AssertUnwindSafe(|| job(message))) {
                    Ok(r) => WorkerStatus::Done(r),
                    Err(err) => {
                        let msg = panic_message(err);
                        log::warn!("worker job panicked: {msg}");
                        WorkerStatus::Failed(msg)
                    }
                };
                let mut slot = remote.slot.lock();
                if !slot.terminated {
                    slot.status = status;
                }
                slot.finished = true;
                remote.ready.notify_all();
            })?;

        Ok(Self { shared })
    }
}

impl<R: Clone> Worker<R> {
    pub fn status(&self) -> WorkerStatus<R> {
        self.shared.slot.lock().status.clone()
    }

    /// Blocks up to `timeout` for the job to finish.
    pub fn wait(&self, timeout: Duration) -> WorkerStatus<R> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while slot.status.is_pending() && !slot.terminated {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || self.shared.ready.wait_for(&mut slot, left).timed_out() {
                break;
            }
        }
        slot.status.clone()
    }
}

impl<R> Worker<R> {
    /// The thread keeps running to completion, but its outcome is discarded.
    pub fn terminate(&self) {
        let mut slot = self.shared.slot.lock();
        if !slot.terminated {
            log::debug!("worker: terminate");
            slot.terminated = true;
        }
        self.shared.ready.notify_all();
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.slot.lock().terminated
    }

    /// Whether the job thread has returned, terminated or not.
    pub fn is_finished(&self) -> bool {
        self.shared.slot.lock().finished
    }
}

impl<R> Drop for Worker<R> {
    fn drop(&mut self) {
        self.terminate();
    }
}

struct UseWorker<M, R> {
    current: RefCell<Option<(M, Worker<R>)>>,
}

impl<M, R> Disposable for UseWorker<M, R> {
    fn dispose(&self) {
        if let Some((_, worker)) = self.current.borrow_mut().take() {
            worker.terminate();
        }
    }
}

/// Runs `job(message)` in the background and returns its status.
///
/// The job restarts when `message` changes; the previous run is terminated,
/// as is the current one when the composition is disposed.
pub fn use_worker<M, R>(
    key: impl Into<String>,
    job: impl Fn(M) -> R + Send + 'static,
    message: M,
) -> WorkerStatus<R>
where
    M: Clone + PartialEq + Send + 'static,
    R: Clone + Send + 'static,
{
    let key = key.into();
    let hook = remember_with_key(format!("worker:{key}"), || {
        let hook = Rc::new(UseWorker {
            current: RefCell::new(None),
        });
        if let Some(scope) = current_scope() {
            scope.own(hook.clone());
        }
        hook
    });

    let stale = !matches!(&*hook.current.borrow(), Some((m, _)) if *m == message);
    if stale {
        if let Some((_, old)) = hook.current.borrow_mut().take() {
            old.terminate();
        }
        match Worker::spawn(job, message.clone()) {
            Ok(worker) => {
                *hook.current.borrow_mut() = Some((message, worker));
            }
            Err(err) => {
                log::warn!("use_worker: {err}");
                return WorkerStatus::Failed(err.to_string());
            }
        }
    }

    hook.current
        .borrow()
        .as_ref()
        .map_or(WorkerStatus::Pending, |(_, worker)| worker.status())
}
