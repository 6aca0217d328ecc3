//! Immutable multicast delegates.
//!
//! A [`Delegate`] is an ordered invocation list of `(target, member)`
//! entries. Combining and removing build new lists; a delegate is never
//! changed once built, so delegates can be shared and combined from many
//! threads without coordination.

use std::fmt;
use std::sync::Arc;

use polydispatch_core::{TypeHash, Value};

use crate::closure::ClosureFrame;

/// What an entry is invoked on.
#[derive(Clone)]
pub enum DelegateTarget {
    /// A static member; no receiver.
    None,
    /// An instance member bound to a receiver.
    Instance(Value),
    /// A function value over a captured frame.
    Closure(Arc<ClosureFrame>),
}

impl DelegateTarget {
    /// The receiver passed as `this`, if any.
    pub fn receiver(&self) -> Option<&Value> {
        match self {
            DelegateTarget::Instance(value) => Some(value),
            _ => None,
        }
    }

    /// The captured frame, if any.
    pub fn frame(&self) -> Option<&Arc<ClosureFrame>> {
        match self {
            DelegateTarget::Closure(frame) => Some(frame),
            _ => None,
        }
    }
}

impl PartialEq for DelegateTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DelegateTarget::None, DelegateTarget::None) => true,
            (DelegateTarget::Instance(a), DelegateTarget::Instance(b)) => a == b,
            (DelegateTarget::Closure(a), DelegateTarget::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for DelegateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegateTarget::None => f.write_str("None"),
            DelegateTarget::Instance(value) => f.debug_tuple("Instance").field(value).finish(),
            DelegateTarget::Closure(frame) => f
                .debug_tuple("Closure")
                .field(&Arc::as_ptr(frame))
                .finish(),
        }
    }
}

/// One `(target, member)` pair of an invocation list.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateEntry {
    /// Receiver, captured frame or none.
    pub target: DelegateTarget,
    /// Implementation member to call.
    pub member: TypeHash,
}

/// An immutable, non-empty invocation list.
#[derive(Debug, Clone, PartialEq)]
pub struct Delegate {
    entries: Arc<[DelegateEntry]>,
}

impl Delegate {
    /// Single-entry delegate.
    pub fn new(target: DelegateTarget, member: TypeHash) -> Self {
        Self {
            entries: Arc::from([DelegateEntry { target, member }]),
        }
    }

    /// Delegate over a static member.
    pub fn from_static(member: TypeHash) -> Self {
        Self::new(DelegateTarget::None, member)
    }

    /// The invocation list in call order.
    pub fn entries(&self) -> &[DelegateEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty delegate is represented as `None`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenate `self`'s entries followed by `other`'s.
    pub fn combine(&self, other: &Delegate) -> Delegate {
        let entries: Vec<_> = self
            .entries
            .iter()
            .chain(other.entries.iter())
            .cloned()
            .collect();
        Delegate {
            entries: Arc::from(entries),
        }
    }

    /// Remove the last contiguous occurrence of `other`'s invocation list.
    ///
    /// Returns `self` unchanged when `other` does not occur, and `None` when
    /// nothing is left.
    pub fn remove(&self, other: &Delegate) -> Option<Delegate> {
        let needle = other.entries();
        let haystack = self.entries();
        if needle.len() > haystack.len() {
            return Some(self.clone());
        }

        let Some(start) = (0..=haystack.len() - needle.len())
            .rev()
            .find(|&i| haystack[i..i + needle.len()] == *needle)
        else {
            return Some(self.clone());
        };

        let remaining: Vec<_> = haystack[..start]
            .iter()
            .chain(&haystack[start + needle.len()..])
            .cloned()
            .collect();
        if remaining.is_empty() {
            None
        } else {
            Some(Delegate {
                entries: Arc::from(remaining),
            })
        }
    }
}

/// Combine two optional delegates (`None` is the empty delegate).
pub fn combine(a: Option<&Delegate>, b: Option<&Delegate>) -> Option<Delegate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.combine(b)),
        (Some(d), None) | (None, Some(d)) => Some(d.clone()),
        (None, None) => None,
    }
}

/// Remove `b` from an optional delegate.
pub fn remove(a: Option<&Delegate>, b: Option<&Delegate>) -> Option<Delegate> {
    match (a, b) {
        (Some(a), Some(b)) => a.remove(b),
        (a, None) => a.cloned(),
        (None, Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::Activation;
    use polydispatch_core::ObjectHandle;

    fn member(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn members(d: &Delegate) -> Vec<TypeHash> {
        d.entries().iter().map(|e| e.member).collect()
    }

    #[test]
    fn combine_preserves_order_and_associates() {
        let d1 = Delegate::from_static(member("a"));
        let d2 = Delegate::from_static(member("b"));
        let d3 = Delegate::from_static(member("c"));

        let left = d1.combine(&d2).combine(&d3);
        let right = d1.combine(&d2.combine(&d3));
        assert_eq!(members(&left), vec![member("a"), member("b"), member("c")]);
        assert_eq!(left, right);
    }

    #[test]
    fn combine_leaves_operands_untouched() {
        let d1 = Delegate::from_static(member("a"));
        let d2 = Delegate::from_static(member("b"));
        let _ = d1.combine(&d2);
        assert_eq!(d1.len(), 1);
        assert_eq!(d2.len(), 1);
    }

    #[test]
    fn remove_first_operand_leaves_second() {
        let d1 = Delegate::from_static(member("a"));
        let d2 = Delegate::from_static(member("b"));
        assert_eq!(d1.combine(&d2).remove(&d1), Some(d2));
    }

    #[test]
    fn remove_takes_last_occurrence() {
        let a = Delegate::from_static(member("a"));
        let b = Delegate::from_static(member("b"));
        let list = a.combine(&b).combine(&a);

        let removed = list.remove(&a).unwrap();
        assert_eq!(members(&removed), vec![member("a"), member("b")]);
    }

    #[test]
    fn remove_sublist_and_missing() {
        let a = Delegate::from_static(member("a"));
        let b = Delegate::from_static(member("b"));
        let c = Delegate::from_static(member("c"));
        let list = a.combine(&b).combine(&c);

        let ab = a.combine(&b);
        assert_eq!(members(&list.remove(&ab).unwrap()), vec![member("c")]);
        // Not contiguous
        let ac = a.combine(&c);
        assert_eq!(list.remove(&ac), Some(list.clone()));
        assert_eq!(a.remove(&a), None);
    }

    #[test]
    fn targets_compare_structurally() {
        let handle = Value::Object(ObjectHandle::new(1, 0));
        let bound = Delegate::new(DelegateTarget::Instance(handle.clone()), member("m"));
        let same = Delegate::new(DelegateTarget::Instance(handle), member("m"));
        let other = Delegate::new(
            DelegateTarget::Instance(Value::Object(ObjectHandle::new(2, 0))),
            member("m"),
        );
        assert_eq!(bound, same);
        assert_eq!(bound.combine(&other).remove(&same), Some(other));
    }

    #[test]
    fn closure_targets_compare_by_frame_identity() {
        let mut activation = Activation::new();
        activation.declare("x", Value::Int(1));
        let f1 = activation.capture(&["x"], false).unwrap();
        let f2 = activation.capture(&["x"], false).unwrap();

        let d1 = Delegate::new(DelegateTarget::Closure(Arc::clone(&f1)), member("body"));
        let d1_again = Delegate::new(DelegateTarget::Closure(f1), member("body"));
        let d2 = Delegate::new(DelegateTarget::Closure(f2), member("body"));
        assert_eq!(d1, d1_again);
        assert_ne!(d1, d2);
    }

    #[test]
    fn optional_helpers() {
        let a = Delegate::from_static(member("a"));
        assert_eq!(combine(None, Some(&a)), Some(a.clone()));
        assert_eq!(combine(None, None), None);
        assert_eq!(remove(Some(&a), Some(&a)), None);
        assert_eq!(remove(Some(&a), None), Some(a));
    }
}
