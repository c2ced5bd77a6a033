use std::cell::RefCell;
use std::rc::Rc;

pub type SubId = usize;

/// Observable value. Hooks publish committed state through one of these so a
/// UI layer can subscribe and schedule its own re-render.
#[derive(Clone)]
pub struct Signal<T: 'static>(Rc<RefCell<Inner<T>>>);

struct Inner<T> {
    value: T,
    subs: Vec<Option<Rc<dyn Fn(&T)>>>,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            value,
            subs: Vec::new(),
        })))
    }
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().value.clone()
    }
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow().value)
    }
    pub fn set(&self, v: T) {
        self.0.borrow_mut().value = v;
        self.notify();
    }
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.borrow_mut().value);
        self.notify();
    }
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        let mut inner = self.0.borrow_mut();
        inner.subs.push(Some(Rc::new(f)));
        inner.subs.len() - 1
    }
    pub fn unsubscribe(&self, id: SubId) {
        if let Some(slot) = self.0.borrow_mut().subs.get_mut(id) {
            *slot = None;
        }
    }

    // Subscribers may read the signal, but writing to it from inside a
    // subscriber panics.
    fn notify(&self) {
        let subs: Vec<Rc<dyn Fn(&T)>> = self.0.borrow().subs.iter().flatten().cloned().collect();
        let inner = self.0.borrow();
        for s in subs {
            s(&inner.value);
        }
    }
}

pub fn signal<T>(t: T) -> Signal<T> {
    Signal::new(t)
}
