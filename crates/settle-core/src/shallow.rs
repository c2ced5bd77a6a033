use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use crate::runtime::remember_with_key;
use crate::signal::{Signal, SubId};

/// One-level equality.
///
/// Plain values compare by value, shared pointers by identity, and
/// containers element-wise. Put nested data behind an `Rc` to get reference
/// semantics for it.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

macro_rules! shallow_by_value {
    ($($t:ty),* $(,)?) => {
        $(impl ShallowEq for $t {
            #[inline]
            fn shallow_eq(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

shallow_by_value!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    str,
    String,
    &'static str,
);

impl<T: ?Sized> ShallowEq for Rc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> ShallowEq for Arc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ShallowEq> ShallowEq for [T] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.shallow_eq(b))
    }
}

impl<T: ShallowEq> ShallowEq for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.as_slice().shallow_eq(other.as_slice())
    }
}

impl<K: Eq + Hash, V: ShallowEq, S: BuildHasher> ShallowEq for HashMap<K, V, S> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v.shallow_eq(o)))
    }
}

impl<K: Ord, V: ShallowEq> ShallowEq for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|((ka, va), (kb, vb))| ka == kb && va.shallow_eq(vb))
    }
}

macro_rules! shallow_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ShallowEq),+> ShallowEq for ($($name,)+) {
            fn shallow_eq(&self, other: &Self) -> bool {
                $(self.$idx.shallow_eq(&other.$idx))&&+
            }
        }
    };
}

shallow_tuple!(A: 0);
shallow_tuple!(A: 0, B: 1);
shallow_tuple!(A: 0, B: 1, C: 2);
shallow_tuple!(A: 0, B: 1, C: 2, D: 3);

/// Implements [`ShallowEq`] for a struct by comparing the listed fields.
///
/// ```rust
/// use settle_core::{ShallowEq, impl_shallow_eq};
///
/// struct User { name: String, age: u32 }
/// impl_shallow_eq!(User { name, age });
///
/// let a = User { name: "John".into(), age: 25 };
/// let b = User { name: "John".into(), age: 25 };
/// assert!(a.shallow_eq(&b));
/// ```
#[macro_export]
macro_rules! impl_shallow_eq {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::shallow::ShallowEq for $ty {
            fn shallow_eq(&self, other: &Self) -> bool {
                $($crate::shallow::ShallowEq::shallow_eq(&self.$field, &other.$field))&&+
            }
        }
    };
}

/// State that ignores writes shallow-equal to what it already holds.
#[derive(Clone)]
pub struct ShallowState<T: Clone + ShallowEq + 'static> {
    current: Signal<T>,
}

impl<T: Clone + ShallowEq + 'static> ShallowState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Signal::new(initial),
        }
    }

    pub fn get(&self) -> T {
        self.current.get()
    }

    /// Returns whether the state changed (and subscribers were notified).
    pub fn set(&self, next: T) -> bool {
        if self.current.with(|cur| cur.shallow_eq(&next)) {
            return false;
        }
        self.current.set(next);
        true
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.current.subscribe(f)
    }
}

/// Remembered [`ShallowState`] for the current composition.
pub fn use_shallow<T: Clone + ShallowEq + 'static>(
    key: impl Into<String>,
    init: impl FnOnce() -> T,
) -> ShallowState<T> {
    let key = key.into();
    let state = remember_with_key(format!("shallow:{key}"), || ShallowState::new(init()));
    ShallowState::clone(&state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Composition;
    use std::cell::Cell;

    #[derive(Clone, Debug, PartialEq)]
    struct Pair {
        a: i32,
        b: i32,
    }
    impl_shallow_eq!(Pair { a, b });

    #[derive(Clone)]
    struct Profile {
        name: String,
        tags: Rc<Vec<String>>,
    }
    impl_shallow_eq!(Profile { name, tags });

    #[test]
    fn test_updates_only_when_not_shallow_equal() {
        let state = ShallowState::new(Pair { a: 1, b: 2 });
        let notified = Rc::new(Cell::new(0));
        let n = notified.clone();
        state.subscribe(move |_| n.set(n.get() + 1));

        assert!(!state.set(Pair { a: 1, b: 2 }));
        assert_eq!(state.get(), Pair { a: 1, b: 2 });
        assert_eq!(notified.get(), 0);

        assert!(state.set(Pair { a: 2, b: 3 }));
        assert_eq!(state.get(), Pair { a: 2, b: 3 });
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn test_nested_rc_compares_by_identity() {
        let tags = Rc::new(vec!["rust".to_string()]);
        let a = Profile {
            name: "ann".into(),
            tags: tags.clone(),
        };
        let same_ref = Profile {
            name: "ann".into(),
            tags,
        };
        let equal_copy = Profile {
            name: "ann".into(),
            tags: Rc::new(vec!["rust".to_string()]),
        };
        assert!(a.shallow_eq(&same_ref));
        assert!(!a.shallow_eq(&equal_copy));
    }

    #[test]
    fn test_containers() {
        assert!(vec![1, 2].shallow_eq(&vec![1, 2]));
        assert!(!vec![1, 2].shallow_eq(&vec![1]));
        assert!(Some("x").shallow_eq(&Some("x")));
        assert!(!None::<i32>.shallow_eq(&Some(1)));
        assert!((1, "a", 2.5).shallow_eq(&(1, "a", 2.5)));

        let m1: HashMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let mut m2 = m1.clone();
        assert!(m1.shallow_eq(&m2));
        m2.insert("b", 3);
        assert!(!m1.shallow_eq(&m2));

        let b1: BTreeMap<i32, char> = [(1, 'x')].into_iter().collect();
        let b2: BTreeMap<i32, char> = [(2, 'x')].into_iter().collect();
        assert!(!b1.shallow_eq(&b2));
    }

    #[test]
    fn test_use_shallow_is_remembered() {
        let composition = Composition::new();
        let first = composition.compose(|| use_shallow("pair", || Pair { a: 1, b: 2 }));
        first.set(Pair { a: 5, b: 6 });
        let again = composition.compose(|| use_shallow("pair", || Pair { a: 1, b: 2 }));
        assert_eq!(again.get(), Pair { a: 5, b: 6 });
    }
}
