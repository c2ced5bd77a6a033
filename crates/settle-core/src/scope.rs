use std::cell::RefCell;
use std::rc::{Rc, Weak};

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

/// Something with pending work that must stop when its owner goes away.
pub trait Disposable {
    /// Idempotent.
    fn dispose(&self);
}

impl<D: Disposable + ?Sized> Disposable for Rc<D> {
    fn dispose(&self) {
        D::dispose(self)
    }
}

/// Lifetime of an owner (a composition, a screen). Disposing it runs every
/// registered disposer once, children first.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                disposers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_SCOPE.with(|current| {
            let prev = current.replace(Some(Rc::downgrade(&self.inner)));
            let result = f();
            current.replace(prev);
            result
        })
    }

    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) {
        self.inner.disposers.borrow_mut().push(Box::new(disposer));
    }

    /// Ties `item` to this scope: it is disposed together with the scope.
    pub fn own<D: Disposable + 'static>(&self, item: D) {
        self.add_disposer(move || item.dispose());
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        self.inner.children.borrow_mut().push(child.clone());
        child
    }

    pub fn dispose(self) {
        self.inner.run_disposers();
    }
}

impl ScopeInner {
    fn run_disposers(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        // disposers may register more work on the scope; drain until empty
        loop {
            let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
            if disposers.is_empty() {
                break;
            }
            for disposer in disposers {
                disposer();
            }
        }
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade().map(|inner| Scope { inner }))
    })
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.run_disposers();
    }
}
