//! Runtime casts.
//!
//! An explicit cast whose source is a common ancestor of unrelated types can
//! only be decided against the runtime type of the value. These functions
//! perform that deferred check.

use polydispatch_core::{RuntimeError, TypeHash, TypeLookup, Value, primitives};

use crate::boxing::box_value;
use crate::heap::{ObjectBody, ObjectHeap};

/// Cast a value to `target`, checking its runtime type.
///
/// - References keep their identity when the runtime type is assignable.
/// - Boxed cells unbox to their exact value type.
/// - Inline value payloads box when cast to a reference supertype.
/// - Numeric primitives convert between each other.
///
/// Anything else fails with `InvalidCast`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn cast_value<L: TypeLookup + ?Sized>(
    heap: &mut ObjectHeap,
    value: Value,
    target: TypeHash,
    lookup: &L,
) -> Result<Value, RuntimeError> {
    let target_desc = lookup
        .lookup(target)
        .ok_or_else(|| RuntimeError::UnknownType(target.to_string()))?;
    let invalid = |from: &str| RuntimeError::InvalidCast {
        from: from.to_string(),
        to: target_desc.name.clone(),
    };

    match value {
        Value::Null if target_desc.kind.is_value() => Err(invalid("null")),
        Value::Null => Ok(Value::Null),
        Value::Object(handle) => {
            let object = heap.get(handle)?;
            let tag = object.tag;
            if target_desc.kind.is_value() {
                return match &object.body {
                    ObjectBody::Boxed(payload) if tag == target => Ok(payload.clone()),
                    _ => Err(invalid(&lookup.type_name(tag))),
                };
            }
            if lookup.is_assignable_to(tag, target) {
                Ok(value)
            } else {
                Err(invalid(&lookup.type_name(tag)))
            }
        }
        inline => {
            let Some(source) = inline.inline_type() else {
                return Err(invalid("null"));
            };
            if source == target {
                return Ok(inline);
            }
            if !target_desc.kind.is_value() && lookup.is_assignable_to(source, target) {
                if !inline.is_value_kind() {
                    return Ok(inline);
                }
                return box_value(heap, inline, lookup).map(Value::Object);
            }
            convert_numeric(&inline, target).ok_or_else(|| invalid(&lookup.type_name(source)))
        }
    }
}

/// Convert between numeric primitives (`char`, `int`, `long`, `float`,
/// `double`), truncating toward zero on narrowing.
pub fn convert_numeric(value: &Value, target: TypeHash) -> Option<Value> {
    let (int, float) = match *value {
        Value::Char(c) => (i64::from(u32::from(c)), f64::from(u32::from(c))),
        Value::Int(v) => (i64::from(v), f64::from(v)),
        Value::Long(v) => (v, v as f64),
        Value::Float(v) => (v as i64, f64::from(v)),
        Value::Double(v) => (v as i64, v),
        _ => return None,
    };
    let is_float = matches!(value, Value::Float(_) | Value::Double(_));

    match target {
        t if t == primitives::INT => Some(Value::Int(int as i32)),
        t if t == primitives::LONG => Some(Value::Long(int)),
        t if t == primitives::FLOAT => {
            Some(Value::Float(if is_float { float as f32 } else { int as f32 }))
        }
        t if t == primitives::DOUBLE => {
            Some(Value::Double(if is_float { float } else { int as f64 }))
        }
        t if t == primitives::CHAR => u32::try_from(int)
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char),
        _ => None,
    }
}
