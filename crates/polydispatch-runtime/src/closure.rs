//! Closure frames and activations.
//!
//! A function value that captures locals of its enclosing activation must be
//! able to outlive that activation. Capture hoists each captured local into a
//! shared heap cell, and the activation's own reads and writes of that local
//! are redirected to the same cell from then on, so mutations stay visible on
//! both sides. A [`ClosureFrame`] is kept alive by every delegate built over
//! it; the activation that created it may end first.
//!
//! Slot access is synchronized per slot only. Callers that need several
//! slots to change together coordinate that themselves.

use std::sync::{Arc, PoisonError, RwLock};

use polydispatch_core::{RuntimeError, Value};
use rustc_hash::FxHashMap;

/// Name of the implicit local holding the enclosing instance.
pub const THIS: &str = "this";

/// A captured variable cell, shared by every frame and activation that
/// refers to it.
pub type SharedSlot = Arc<RwLock<Value>>;

fn read(slot: &SharedSlot) -> Value {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write(slot: &SharedSlot, value: Value) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// Heap record of the variables captured by one function value.
#[derive(Debug)]
pub struct ClosureFrame {
    names: Vec<String>,
    slots: Vec<SharedSlot>,
}

impl ClosureFrame {
    /// Number of captured variables.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Captured variable names in slot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Read a captured variable.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.index_of(name)
            .and_then(|i| self.slots.get(i))
            .map(read)
    }

    /// Write a captured variable. Returns false if it was not captured.
    pub fn set(&self, name: &str, value: Value) -> bool {
        match self.index_of(name).and_then(|i| self.slots.get(i)) {
            Some(slot) => {
                write(slot, value);
                true
            }
            None => false,
        }
    }

    /// The captured enclosing instance, if any.
    pub fn this(&self) -> Option<Value> {
        self.get(THIS)
    }

    /// Check if both frames captured the same cell for `name`.
    pub fn shares_slot_with(&self, other: &ClosureFrame, name: &str) -> bool {
        let mine = self.index_of(name).and_then(|i| self.slots.get(i));
        let theirs = other.index_of(name).and_then(|i| other.slots.get(i));
        matches!((mine, theirs), (Some(a), Some(b)) if Arc::ptr_eq(a, b))
    }
}

#[derive(Debug)]
enum Local {
    Stack(Value),
    Hoisted(SharedSlot),
}

/// Locals of one call activation.
#[derive(Debug, Default)]
pub struct Activation {
    locals: Vec<Local>,
    by_name: FxHashMap<String, usize>,
}

impl Activation {
    /// Create an activation with no locals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an activation for an instance method.
    pub fn with_this(this: Value) -> Self {
        let mut activation = Self::new();
        activation.declare(THIS, this);
        activation
    }

    /// Declare a local, replacing any earlier local with the same name.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        let index = self.locals.len();
        self.locals.push(Local::Stack(value));
        self.by_name.insert(name.into(), index);
    }

    fn local(&self, name: &str) -> Result<&Local, RuntimeError> {
        self.by_name
            .get(name)
            .and_then(|&i| self.locals.get(i))
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }

    /// Read a local.
    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        Ok(match self.local(name)? {
            Local::Stack(value) => value.clone(),
            Local::Hoisted(slot) => read(slot),
        })
    }

    /// Write a local.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let local = self
            .by_name
            .get(name)
            .and_then(|&i| self.locals.get_mut(i))
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
        match local {
            Local::Stack(current) => *current = value,
            Local::Hoisted(slot) => write(slot, value),
        }
        Ok(())
    }

    /// Check if a local has been hoisted into a closure frame.
    pub fn is_captured(&self, name: &str) -> bool {
        matches!(self.local(name), Ok(Local::Hoisted(_)))
    }

    /// Capture free variables into a new closure frame.
    ///
    /// Each named local (and `this` when `capture_this` is set) is hoisted
    /// into a shared cell if it is not already; a local captured by an
    /// earlier closure keeps its cell, so both closures see one variable.
    pub fn capture(
        &mut self,
        free_vars: &[&str],
        capture_this: bool,
    ) -> Result<Arc<ClosureFrame>, RuntimeError> {
        let mut names: Vec<&str> = free_vars.to_vec();
        if capture_this && !names.contains(&THIS) {
            names.push(THIS);
        }

        let mut frame = ClosureFrame {
            names: Vec::with_capacity(names.len()),
            slots: Vec::with_capacity(names.len()),
        };
        for name in names {
            let local = self
                .by_name
                .get(name)
                .and_then(|&i| self.locals.get_mut(i))
                .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
            let slot = match local {
                Local::Hoisted(slot) => Arc::clone(slot),
                Local::Stack(value) => {
                    let slot: SharedSlot = Arc::new(RwLock::new(std::mem::take(value)));
                    *local = Local::Hoisted(Arc::clone(&slot));
                    slot
                }
            };
            frame.names.push(name.to_string());
            frame.slots.push(slot);
        }
        Ok(Arc::new(frame))
    }
}
