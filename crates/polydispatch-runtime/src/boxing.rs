//! Boxing allocator.
//!
//! Boxing copies a value-kind payload into a fresh heap cell tagged with the
//! payload's type. Every call allocates, so boxing two equal payloads yields
//! two distinct handles. Unboxing requires the exact tag.

use polydispatch_core::{ObjectHandle, RuntimeError, TypeHash, TypeLookup, Value};
use tracing::trace;

use crate::heap::{HeapObject, ObjectBody, ObjectHeap};

/// Promote a value-kind payload to a new heap cell.
///
/// Fails with `InvalidCast` for null and for reference values, which are
/// already heap references.
pub fn box_value<L: TypeLookup + ?Sized>(
    heap: &mut ObjectHeap,
    value: Value,
    lookup: &L,
) -> Result<ObjectHandle, RuntimeError> {
    let Some(tag) = value.inline_type().filter(|_| value.is_value_kind()) else {
        let from = match heap.type_of(&value)? {
            Some(tag) => lookup.type_name(tag),
            None => "null".to_string(),
        };
        return Err(RuntimeError::InvalidCast {
            from,
            to: lookup
                .root_type()
                .map_or_else(|| "boxed value".to_string(), |r| lookup.type_name(r)),
        });
    };

    let handle = heap.allocate(HeapObject::boxed(tag, value));
    trace!(type_name = %lookup.type_name(tag), %handle, "boxed value");
    Ok(handle)
}

/// Copy the payload out of a boxed cell.
///
/// Fails with `InvalidCast` unless the cell is a boxed value tagged exactly
/// `expected`.
pub fn unbox<L: TypeLookup + ?Sized>(
    heap: &ObjectHeap,
    handle: ObjectHandle,
    expected: TypeHash,
    lookup: &L,
) -> Result<Value, RuntimeError> {
    let object = heap.get(handle)?;
    match &object.body {
        ObjectBody::Boxed(payload) if object.tag == expected => Ok(payload.clone()),
        _ => Err(RuntimeError::InvalidCast {
            from: lookup.type_name(object.tag),
            to: lookup.type_name(expected),
        }),
    }
}
