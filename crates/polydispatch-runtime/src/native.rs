//! Native implementation bodies and their call context.

use std::fmt;
use std::sync::Arc;

use polydispatch_core::{RuntimeError, TypeHash, Value};
use rustc_hash::FxHashMap;

use crate::closure::ClosureFrame;
use crate::heap::ObjectHeap;

/// Context for one call into an implementation body.
///
/// Provides the receiver, the already converted arguments, the captured
/// frame for closure bodies and the object heap, and collects the return
/// value.
pub struct CallContext<'rt> {
    this: Option<Value>,
    args: &'rt [Value],
    frame: Option<&'rt Arc<ClosureFrame>>,
    heap: &'rt mut ObjectHeap,
    return_value: Value,
}

impl<'rt> CallContext<'rt> {
    /// Create a call context.
    pub fn new(
        this: Option<Value>,
        args: &'rt [Value],
        frame: Option<&'rt Arc<ClosureFrame>>,
        heap: &'rt mut ObjectHeap,
    ) -> Self {
        Self {
            this,
            args,
            frame,
            heap,
            return_value: Value::Null,
        }
    }

    /// Number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get an argument.
    pub fn arg(&self, index: usize) -> Result<&Value, RuntimeError> {
        self.args.get(index).ok_or(RuntimeError::IndexOutOfBounds {
            index,
            len: self.args.len(),
        })
    }

    /// All arguments.
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// The receiver of an instance call.
    pub fn this(&self) -> Result<&Value, RuntimeError> {
        self.this
            .as_ref()
            .ok_or_else(|| RuntimeError::NullReference("this".to_string()))
    }

    /// The captured frame of a closure body.
    pub fn frame(&self) -> Option<&Arc<ClosureFrame>> {
        self.frame
    }

    /// The object heap.
    pub fn heap(&self) -> &ObjectHeap {
        &*self.heap
    }

    /// The object heap, mutably.
    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut *self.heap
    }

    /// Set the return value.
    pub fn set_return(&mut self, value: impl Into<Value>) {
        self.return_value = value.into();
    }

    /// Take the return value, leaving `Null`.
    pub fn take_return(&mut self) -> Value {
        std::mem::take(&mut self.return_value)
    }
}

/// Trait for callable implementation bodies.
pub trait NativeCallable {
    /// Call this body with the given context.
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), RuntimeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), RuntimeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), RuntimeError> {
        (self)(ctx)
    }
}

/// Type-erased implementation body, cheap to clone.
#[derive(Clone)]
pub struct NativeFn {
    /// The member this body implements.
    pub id: TypeHash,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Wrap a callable as the body of `id`.
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(f),
        }
    }

    /// Call this body.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), RuntimeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Implementation bodies keyed by member hash.
#[derive(Debug, Clone, Default)]
pub struct NativeTable {
    bodies: FxHashMap<TypeHash, NativeFn>,
}

impl NativeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body of a member, replacing any previous one.
    pub fn register<F>(&mut self, member: TypeHash, f: F)
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        self.bodies.insert(member, NativeFn::new(member, f));
    }

    /// Body of a member.
    pub fn get(&self, member: TypeHash) -> Option<&NativeFn> {
        self.bodies.get(&member)
    }

    /// Check if a member has a body.
    pub fn contains(&self, member: TypeHash) -> bool {
        self.bodies.contains_key(&member)
    }

    /// Number of registered bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Check if no bodies are registered.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
