use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::scope::Scope;

thread_local! {
    // Slots used outside of any composition.
    static DETACHED: Rc<RefCell<Composer>> = Rc::new(RefCell::new(Composer::default()));
    static COMPOSER: RefCell<Option<Rc<RefCell<Composer>>>> = const { RefCell::new(None) };
}

#[derive(Default)]
pub struct Composer {
    pub slots: Vec<Box<dyn Any>>,
    pub cursor: usize,
    pub keyed_slots: HashMap<String, Box<dyn Any>>,
}

impl Composer {
    fn clear(&mut self) {
        self.slots.clear();
        self.keyed_slots.clear();
        self.cursor = 0;
    }
}

fn with_composer<R>(f: impl FnOnce(&mut Composer) -> R) -> R {
    let composer = COMPOSER
        .with(|c| c.borrow().clone())
        .unwrap_or_else(|| DETACHED.with(Rc::clone));
    let mut c = composer.borrow_mut();
    f(&mut c)
}

/// Restores the previously installed composer, also on unwind.
struct ComposeGuard {
    prev: Option<Rc<RefCell<Composer>>>,
}

impl ComposeGuard {
    fn begin(composer: &Rc<RefCell<Composer>>) -> Self {
        composer.borrow_mut().cursor = 0;
        let prev = COMPOSER.with(|c| c.replace(Some(composer.clone())));
        ComposeGuard { prev }
    }
}

impl Drop for ComposeGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        COMPOSER.with(|c| *c.borrow_mut() = prev);
    }
}

/// Owner of remembered hook state across repeated compositions.
///
/// Each composition keeps its own slots. [`compose`](Self::compose) resets
/// the slot cursor and runs the body inside the composition's scope, so hooks
/// created there are disposed (timers cancelled, workers terminated) by
/// [`dispose`](Self::dispose) or when the composition is dropped.
pub struct Composition {
    // dropped first: disposers run while the slots are still alive
    scope: Scope,
    composer: Rc<RefCell<Composer>>,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    pub fn new() -> Self {
        Self {
            scope: Scope::new(),
            composer: Rc::new(RefCell::new(Composer::default())),
        }
    }

    pub fn compose<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = ComposeGuard::begin(&self.composer);
        self.scope.run(body)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn dispose(self) {
        self.scope.dispose();
        self.composer.borrow_mut().clear();
    }
}

/// Slot-based remember (sequential composition only)
pub fn remember<T: 'static>(init: impl FnOnce() -> T) -> Rc<T> {
    let existing = with_composer(|c| {
        let cursor = c.cursor;
        c.cursor += 1;
        match c.slots.get(cursor) {
            Some(slot) => match slot.downcast_ref::<Rc<T>>() {
                Some(rc) => Ok(Some(rc.clone())),
                None => {
                    log::warn!(
                        "remember: slot {} type changed; replacing. \
                         If this is due to conditional composition, prefer remember_with_key.",
                        cursor
                    );
                    Err(cursor)
                }
            },
            None => Ok(None),
        }
    });

    match existing {
        Ok(Some(rc)) => rc,
        // init runs outside the composer borrow so it may remember itself
        Ok(None) => {
            let rc = Rc::new(init());
            with_composer(|c| c.slots.push(Box::new(rc.clone())));
            rc
        }
        Err(cursor) => {
            let rc = Rc::new(init());
            with_composer(|c| c.slots[cursor] = Box::new(rc.clone()));
            rc
        }
    }
}

/// Key-based remember
pub fn remember_with_key<T: 'static>(key: impl Into<String>, init: impl FnOnce() -> T) -> Rc<T> {
    let key = key.into();
    let existing = with_composer(|c| {
        let slot = c.keyed_slots.get(&key)?;
        let rc = slot.downcast_ref::<Rc<T>>();
        if rc.is_none() {
            log::warn!(
                "remember_with_key: key '{}' reused with a different type; replacing.",
                key
            );
        }
        rc.cloned()
    });
    if let Some(rc) = existing {
        return rc;
    }

    let rc: Rc<T> = Rc::new(init());
    with_composer(|c| {
        c.keyed_slots.insert(key, Box::new(rc.clone()));
    });
    rc
}

pub fn remember_state<T: 'static>(init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
    remember(|| RefCell::new(init()))
}

pub fn remember_state_with_key<T: 'static>(
    key: impl Into<String>,
    init: impl FnOnce() -> T,
) -> Rc<RefCell<T>> {
    remember_with_key(key, || RefCell::new(init()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_key_based_remember() {
        let val1 = remember_with_key("test", || 42);
        let val2 = remember_with_key("test", || 100);

        // Should return the same instance
        assert_eq!(*val1, 42);
        assert_eq!(*val2, 42); // Not 100, because key exists
    }

    #[test]
    fn test_slots_survive_recomposition() {
        let composition = Composition::new();
        let body = || {
            let a = remember_state(|| 0);
            let b = remember(|| "b");
            *a.borrow_mut() += 1;
            (*a.borrow(), *b)
        };
        assert_eq!(composition.compose(body), (1, "b"));
        assert_eq!(composition.compose(body), (2, "b"));
        composition.dispose();

        let fresh = Composition::new();
        assert_eq!(fresh.compose(body), (1, "b"));
    }

    #[test]
    fn test_slot_type_change_replaces() {
        let composition = Composition::new();
        composition.compose(|| remember(|| 1u8));
        let s = composition.compose(|| remember(|| "now a str"));
        assert_eq!(*s, "now a str");
    }

    #[test]
    fn test_init_may_remember() {
        let composition = Composition::new();
        let inner_runs = Rc::new(Cell::new(0));
        let runs = inner_runs.clone();
        let outer = composition.compose(move || {
            remember_with_key("outer", || {
                runs.set(runs.get() + 1);
                *remember_with_key("inner", || 7) + 1
            })
        });
        assert_eq!(*outer, 8);
        assert_eq!(inner_runs.get(), 1);
    }

    #[test]
    fn test_dispose_runs_scope() {
        let composition = Composition::new();
        let disposed = Rc::new(Cell::new(false));
        let d = disposed.clone();
        composition.compose(|| {
            crate::scope::current_scope()
                .unwrap()
                .add_disposer(move || d.set(true));
        });
        assert!(!disposed.get());
        composition.dispose();
        assert!(disposed.get());
    }

    #[test]
    fn test_compositions_do_not_share_slots() {
        let a = Composition::new();
        let b = Composition::new();
        let body = |n| move || *remember_with_key("k", || n);
        assert_eq!(a.compose(body(1)), 1);
        assert_eq!(b.compose(body(2)), 2);
        assert_eq!(a.compose(body(3)), 1);

        // nested compose restores the outer composition's slots
        let inner = a.compose(|| {
            let inner = b.compose(body(4));
            (inner, *remember_with_key("k", || 5))
        });
        assert_eq!(inner, (2, 1));
    }
}
