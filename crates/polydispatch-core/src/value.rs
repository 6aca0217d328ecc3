//! Runtime values.

use std::fmt;
use std::sync::Arc;

use crate::{TypeHash, primitives};

/// Handle to an object in the object heap.
///
/// Handles are plain copyable indices; the generation detects use of a slot
/// that has since been freed and reused. Two handles are identity-equal only
/// when both index and generation match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into the heap's slot array.
    pub index: u32,
    /// Generation for use-after-free detection.
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Payload of a user-declared value type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// The value type.
    pub type_hash: TypeHash,
    /// Field values in declaration order.
    pub fields: Vec<Value>,
}

impl StructValue {
    /// Create a struct payload.
    pub fn new(type_hash: TypeHash, fields: Vec<Value>) -> Self {
        Self { type_hash, fields }
    }
}

/// A value held in a local, a frame slot, an array element or a heap cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null reference / no value.
    #[default]
    Null,
    /// `bool`
    Bool(bool),
    /// `char`
    Char(char),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `string` (immutable reference type, shared).
    Str(Arc<str>),
    /// User value type payload.
    Struct(StructValue),
    /// Reference to a heap object (class instance, boxed value, array).
    Object(ObjectHandle),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Type tag known without consulting the heap.
    ///
    /// Returns `None` for `Null` and for heap references, whose runtime type
    /// lives in the heap cell.
    pub fn inline_type(&self) -> Option<TypeHash> {
        match self {
            Value::Null | Value::Object(_) => None,
            Value::Bool(_) => Some(primitives::BOOL),
            Value::Char(_) => Some(primitives::CHAR),
            Value::Int(_) => Some(primitives::INT),
            Value::Long(_) => Some(primitives::LONG),
            Value::Float(_) => Some(primitives::FLOAT),
            Value::Double(_) => Some(primitives::DOUBLE),
            Value::Str(_) => Some(primitives::STRING),
            Value::Struct(s) => Some(s.type_hash),
        }
    }

    /// Check if this is a value-kind payload (copied on assignment).
    pub fn is_value_kind(&self) -> bool {
        !matches!(self, Value::Null | Value::Str(_) | Value::Object(_))
    }

    /// Check if this is the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The heap handle, if this is a heap reference.
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    /// Get an `int` payload.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a `double` payload.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<ObjectHandle> for Value {
    fn from(h: ObjectHandle) -> Self {
        Value::Object(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_types() {
        assert_eq!(Value::Int(1).inline_type(), Some(primitives::INT));
        assert_eq!(Value::string("x").inline_type(), Some(primitives::STRING));
        assert_eq!(Value::Null.inline_type(), None);
        assert_eq!(Value::Object(ObjectHandle::new(0, 0)).inline_type(), None);

        let point = TypeHash::from_name("Point");
        let s = Value::Struct(StructValue::new(point, vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(s.inline_type(), Some(point));
    }

    #[test]
    fn value_kind_classification() {
        assert!(Value::Int(3).is_value_kind());
        assert!(Value::Double(1.5).is_value_kind());
        assert!(!Value::string("s").is_value_kind());
        assert!(!Value::Null.is_value_kind());
        assert!(!Value::Object(ObjectHandle::new(1, 0)).is_value_kind());
    }

    #[test]
    fn handle_identity_includes_generation() {
        assert_ne!(ObjectHandle::new(3, 0), ObjectHandle::new(3, 1));
        assert_eq!(ObjectHandle::new(3, 1), ObjectHandle::new(3, 1));
    }
}
