//! Conversion classification.
//!
//! Determines whether a value of one type can be used as another, how, and at
//! what cost. The cost feeds overload resolution as a tie-breaker after
//! specificity.
//!
//! ## Conversion Priority
//!
//! Conversions are checked in this order (cheapest first):
//! 1. Identity (exact match)
//! 2. Reference widening (derived to base, class to interface, anything to root)
//! 3. Primitive widening (`int` to `double`, ...)
//! 4. User-defined implicit operator, with free widening before and after
//! 5. Boxing (value type to root or to an interface it conforms to)
//! 6. Explicit-only (downcast, unboxing, narrowing, explicit operators)

use polydispatch_core::{ConversionError, TypeHash, TypeLookup};
use tracing::trace;

mod primitive;
mod user_defined;

pub use primitive::{find_primitive_conversion, is_primitive_numeric};
pub use user_defined::find_user_conversion;

/// A conversion with its cost for overload resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The kind of conversion being performed.
    pub kind: ConversionKind,
    /// The cost of this conversion (lower is better).
    pub cost: u32,
    /// Whether this conversion can be applied implicitly.
    pub is_implicit: bool,
}

/// The kind of conversion being performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionKind {
    /// No conversion needed.
    Identity,

    /// Reference to a supertype, interface or the root. Free at runtime.
    ReferenceWidening {
        /// The target type.
        target: TypeHash,
    },

    /// Numeric primitive conversion.
    Primitive {
        /// Source primitive.
        from: TypeHash,
        /// Target primitive.
        to: TypeHash,
    },

    /// Programmer-declared conversion operator.
    UserDefined {
        /// Identity of the operator.
        operator: TypeHash,
        /// Declared input type.
        from: TypeHash,
        /// Declared output type.
        to: TypeHash,
    },

    /// Value type promoted to a heap cell.
    Boxing {
        /// The reference type the boxed value is seen as.
        target: TypeHash,
    },

    /// Reference narrowing; the runtime type is checked at execution time.
    Downcast {
        /// The requested type.
        target: TypeHash,
    },

    /// Heap cell back to a value type; the tag is checked at execution time.
    Unboxing {
        /// The requested value type.
        target: TypeHash,
    },
}

impl Conversion {
    /// Cost for exact match.
    pub const COST_IDENTITY: u32 = 0;
    /// Cost for reference widening.
    pub const COST_REFERENCE_WIDENING: u32 = 1;
    /// Cost for implicit primitive widening.
    pub const COST_PRIMITIVE_WIDENING: u32 = 5;
    /// Base cost for a user-defined implicit conversion (plus one per widening step).
    pub const COST_USER_IMPLICIT: u32 = 10;
    /// Cost for boxing.
    pub const COST_BOXING: u32 = 20;
    /// Cost marker for explicit-only conversions (not usable implicitly).
    pub const COST_EXPLICIT_ONLY: u32 = 100;

    /// Create an identity conversion.
    pub fn identity() -> Self {
        Self {
            kind: ConversionKind::Identity,
            cost: Self::COST_IDENTITY,
            is_implicit: true,
        }
    }

    fn explicit(kind: ConversionKind) -> Self {
        Self {
            kind,
            cost: Self::COST_EXPLICIT_ONLY,
            is_implicit: false,
        }
    }

    /// Check if this is an exact match.
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }

    /// Check if applying this conversion allocates a heap cell.
    pub fn allocates(&self) -> bool {
        matches!(self.kind, ConversionKind::Boxing { .. })
    }

    /// Check if the conversion must be verified against the runtime type.
    pub fn is_checked_at_runtime(&self) -> bool {
        matches!(
            self.kind,
            ConversionKind::Downcast { .. } | ConversionKind::Unboxing { .. }
        )
    }
}

/// Classify the conversion from `source` to `target`.
///
/// Returns the cheapest applicable conversion, which may be explicit-only.
/// Fails with `NoConversion` when no path exists and with
/// `AmbiguousUserConversion` when two user operators tie.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn classify_conversion<L: TypeLookup + ?Sized>(
    source: TypeHash,
    target: TypeHash,
    lookup: &L,
) -> Result<Conversion, ConversionError> {
    let result = find_conversion(source, target, lookup);
    trace!(
        from = %lookup.type_name(source),
        to = %lookup.type_name(target),
        result = ?result.as_ref().map(|c| (&c.kind, c.cost)),
        "classified conversion"
    );
    result
}

fn find_conversion<L: TypeLookup + ?Sized>(
    source: TypeHash,
    target: TypeHash,
    lookup: &L,
) -> Result<Conversion, ConversionError> {
    // 1. Identity
    if source == target {
        return Ok(Conversion::identity());
    }

    // 2. Reference widening
    if lookup.is_reference_assignable(source, target) {
        return Ok(Conversion {
            kind: ConversionKind::ReferenceWidening { target },
            cost: Conversion::COST_REFERENCE_WIDENING,
            is_implicit: true,
        });
    }

    // 3. Primitive conversions (implicit widening or explicit narrowing)
    let primitive = find_primitive_conversion(source, target);
    if let Some(conv) = primitive.as_ref().filter(|c| c.is_implicit) {
        return Ok(conv.clone());
    }

    // 4. User-defined implicit
    if let Some(conv) = find_user_conversion(source, target, lookup, true)? {
        return Ok(conv);
    }

    // 5. Boxing
    if lookup.is_value_type(source) && lookup.is_boxing_target(source, target) {
        return Ok(Conversion {
            kind: ConversionKind::Boxing { target },
            cost: Conversion::COST_BOXING,
            is_implicit: true,
        });
    }

    // 6. Explicit only
    if let Some(conv) = primitive {
        return Ok(conv);
    }
    if let Some(conv) = find_explicit_conversion(source, target, lookup)? {
        return Ok(conv);
    }

    Err(ConversionError::NoConversion {
        from: lookup.type_name(source),
        to: lookup.type_name(target),
    })
}

/// Find an explicit-only conversion: explicit operator, downcast or unboxing.
fn find_explicit_conversion<L: TypeLookup + ?Sized>(
    source: TypeHash,
    target: TypeHash,
    lookup: &L,
) -> Result<Option<Conversion>, ConversionError> {
    if let Some(conv) = find_user_conversion(source, target, lookup, false)? {
        return Ok(Some(conv));
    }

    let (Some(from), Some(to)) = (lookup.lookup(source), lookup.lookup(target)) else {
        return Ok(None);
    };

    if !from.kind.is_value() && to.kind.is_value() {
        // Unboxing: only from a reference type the value type boxes into.
        if lookup.is_boxing_target(target, source) {
            return Ok(Some(Conversion::explicit(ConversionKind::Unboxing { target })));
        }
        return Ok(None);
    }

    if from.kind.is_value() || to.kind.is_value() {
        return Ok(None);
    }

    // Downcast: the target is a subtype of the source.
    if lookup.is_reference_assignable(target, source) {
        return Ok(Some(Conversion::explicit(ConversionKind::Downcast { target })));
    }

    // Interface casts between otherwise unrelated types can succeed at runtime
    // unless the class side is sealed (no subtype could add the interface).
    let crosses_interface = (to.kind.is_interface() && !from.is_sealed())
        || (from.kind.is_interface() && !to.is_sealed());
    if crosses_interface {
        return Ok(Some(Conversion::explicit(ConversionKind::Downcast { target })));
    }

    Ok(None)
}

/// Check if an implicit conversion exists.
pub fn can_implicitly_convert<L: TypeLookup + ?Sized>(
    source: TypeHash,
    target: TypeHash,
    lookup: &L,
) -> bool {
    find_conversion(source, target, lookup).is_ok_and(|c| c.is_implicit)
}
