use std::rc::Rc;

use crate::runtime::remember_with_key;
use crate::signal::{Signal, SubId};

/// State updated through a mutable draft while every snapshot handed out
/// stays immutable.
///
/// `update` clones the current snapshot, lets the closure edit the copy, and
/// swaps it in only if it differs. A no-op update keeps the very same `Rc`
/// and does not notify.
#[derive(Clone)]
pub struct DraftState<T: Clone + PartialEq + 'static> {
    current: Signal<Rc<T>>,
}

impl<T: Clone + PartialEq + 'static> DraftState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Signal::new(Rc::new(initial)),
        }
    }

    pub fn get(&self) -> Rc<T> {
        self.current.get()
    }

    /// Returns whether a new snapshot was produced.
    pub fn update(&self, recipe: impl FnOnce(&mut T)) -> bool {
        let base = self.current.get();
        let mut draft = T::clone(&base);
        recipe(&mut draft);
        self.commit(&base, draft)
    }

    /// Replacement form: the recipe returns the next value.
    pub fn produce(&self, recipe: impl FnOnce(&T) -> T) -> bool {
        let base = self.current.get();
        let next = recipe(&base);
        self.commit(&base, next)
    }

    pub fn subscribe(&self, f: impl Fn(&Rc<T>) + 'static) -> SubId {
        self.current.subscribe(f)
    }

    fn commit(&self, base: &Rc<T>, next: T) -> bool {
        if **base == next {
            return false;
        }
        self.current.set(Rc::new(next));
        true
    }
}

/// Remembered [`DraftState`] for the current composition.
pub fn use_draft<T: Clone + PartialEq + 'static>(
    key: impl Into<String>,
    init: impl FnOnce() -> T,
) -> DraftState<T> {
    let key = key.into();
    let state = remember_with_key(format!("draft:{key}"), || DraftState::new(init()));
    DraftState::clone(&state)
}
