//! Generational arena for reference-counted heap objects.
//!
//! Class instances, boxed values and arrays all live here. Every object
//! carries its runtime type tag, which is what casts, unboxing and dispatch
//! consult.

use std::fmt;

use polydispatch_core::{ObjectHandle, RuntimeError, TypeHash, Value};
use rustc_hash::FxHashMap;

/// Payload of a heap object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    /// Class instance with named fields.
    Instance {
        /// Field values by name.
        fields: FxHashMap<String, Value>,
    },
    /// A boxed copy of a value-kind payload.
    Boxed(Value),
    /// Array of references or values.
    Array {
        /// Element type the array was created with.
        element_type: TypeHash,
        /// Elements.
        elements: Vec<Value>,
    },
}

/// A heap object with its runtime type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    /// Runtime type (for arrays, the element type is in the body).
    pub tag: TypeHash,
    /// Payload.
    pub body: ObjectBody,
}

impl HeapObject {
    /// An instance with no fields set.
    pub fn instance(tag: TypeHash) -> Self {
        Self {
            tag,
            body: ObjectBody::Instance {
                fields: FxHashMap::default(),
            },
        }
    }

    /// A boxed payload tagged with its value type.
    pub fn boxed(tag: TypeHash, payload: Value) -> Self {
        Self {
            tag,
            body: ObjectBody::Boxed(payload),
        }
    }

    /// An array of `len` null elements.
    pub fn array(tag: TypeHash, element_type: TypeHash, len: usize) -> Self {
        Self {
            tag,
            body: ObjectBody::Array {
                element_type,
                elements: vec![Value::Null; len],
            },
        }
    }
}

/// Heap storage with generational indices.
///
/// Freed slots are reused with a bumped generation, so a handle kept past
/// its object's release is reported as stale instead of aliasing the new
/// occupant.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    object: Option<HeapObject>,
    ref_count: u32,
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate an object with a reference count of one.
    pub fn allocate(&mut self, object: HeapObject) -> ObjectHandle {
        if let Some(index) = self.free_list.pop()
            && let Some(slot) = self.slots.get_mut(index as usize)
        {
            slot.object = Some(object);
            slot.ref_count = 1;
            return ObjectHandle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(HeapSlot {
            generation: 0,
            object: Some(object),
            ref_count: 1,
        });
        ObjectHandle::new(index, 0)
    }

    /// Get an object.
    pub fn get(&self, handle: ObjectHandle) -> Result<&HeapObject, RuntimeError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
            .ok_or_else(|| RuntimeError::StaleHandle(handle.to_string()))
    }

    /// Get an object mutably.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut HeapObject, RuntimeError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
            .ok_or_else(|| RuntimeError::StaleHandle(handle.to_string()))
    }

    /// Runtime type of a value: the inline type, or the tag of the heap
    /// object it references. `None` for null.
    pub fn type_of(&self, value: &Value) -> Result<Option<TypeHash>, RuntimeError> {
        match value {
            Value::Object(handle) => self.get(*handle).map(|o| Some(o.tag)),
            other => Ok(other.inline_type()),
        }
    }

    /// Read a field of a class instance (`Null` when unset).
    pub fn field(&self, handle: ObjectHandle, name: &str) -> Result<Value, RuntimeError> {
        let object = self.get(handle)?;
        match &object.body {
            ObjectBody::Instance { fields } => Ok(fields.get(name).cloned().unwrap_or_default()),
            _ => Err(not_an_instance(object.tag)),
        }
    }

    /// Write a field of a class instance.
    pub fn set_field(
        &mut self,
        handle: ObjectHandle,
        name: impl Into<String>,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let object = self.get_mut(handle)?;
        match &mut object.body {
            ObjectBody::Instance { fields } => {
                fields.insert(name.into(), value);
                Ok(())
            }
            _ => Err(not_an_instance(object.tag)),
        }
    }

    /// Increment the reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.object.is_some()
        {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Decrement the reference count, freeing the object at zero.
    ///
    /// Returns true if the object was freed.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.object.is_some()
        {
            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count == 0 {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(handle.index);
                return true;
            }
        }
        false
    }

    /// Reference count of a live object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation && slot.object.is_some() {
            Some(slot.ref_count)
        } else {
            None
        }
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

fn not_an_instance(tag: TypeHash) -> RuntimeError {
    RuntimeError::InvalidCast {
        from: tag.to_string(),
        to: "class instance".to_string(),
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> TypeHash {
        TypeHash::from_name("Shape")
    }

    #[test]
    fn allocate_and_read() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(HeapObject::instance(tag()));
        assert_eq!(heap.get(h).unwrap().tag, tag());
        assert_eq!(heap.ref_count(h), Some(1));
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn released_handles_are_stale() {
        let mut heap = ObjectHeap::new();
        let old = heap.allocate(HeapObject::instance(tag()));
        assert!(heap.release(old));

        let new = heap.allocate(HeapObject::instance(tag()));
        assert_eq!(new.index, old.index);
        assert_ne!(new.generation, old.generation);
        assert!(matches!(heap.get(old), Err(RuntimeError::StaleHandle(_))));
        assert!(heap.get(new).is_ok());
    }

    #[test]
    fn ref_counting() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(HeapObject::instance(tag()));
        assert!(heap.add_ref(h));
        assert!(!heap.release(h));
        assert!(heap.release(h));
        assert_eq!(heap.ref_count(h), None);
        assert!(!heap.add_ref(h));
    }

    #[test]
    fn fields() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(HeapObject::instance(tag()));
        assert_eq!(heap.field(h, "radius").unwrap(), Value::Null);
        heap.set_field(h, "radius", Value::Double(2.0)).unwrap();
        assert_eq!(heap.field(h, "radius").unwrap(), Value::Double(2.0));
    }

    #[test]
    fn type_of_values() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(HeapObject::instance(tag()));
        assert_eq!(heap.type_of(&Value::Object(h)).unwrap(), Some(tag()));
        assert_eq!(
            heap.type_of(&Value::Int(1)).unwrap(),
            Some(polydispatch_core::primitives::INT)
        );
        assert_eq!(heap.type_of(&Value::Null).unwrap(), None);
    }
}
