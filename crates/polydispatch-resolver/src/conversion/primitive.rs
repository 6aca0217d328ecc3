//! Primitive numeric conversions.
//!
//! Widening (`int → long`, `int → double`, `float → double`, ...) is implicit.
//! Every other pair of numeric primitives converts only on explicit request.

use polydispatch_core::{TypeHash, primitives};

use super::{Conversion, ConversionKind};

/// Find a conversion between two numeric primitives.
pub fn find_primitive_conversion(from: TypeHash, to: TypeHash) -> Option<Conversion> {
    if from == to || !is_primitive_numeric(from) || !is_primitive_numeric(to) {
        return None;
    }

    if is_widening(from, to) {
        return Some(Conversion {
            kind: ConversionKind::Primitive { from, to },
            cost: Conversion::COST_PRIMITIVE_WIDENING,
            is_implicit: true,
        });
    }

    Some(Conversion {
        kind: ConversionKind::Primitive { from, to },
        cost: Conversion::COST_EXPLICIT_ONLY,
        is_implicit: false,
    })
}

/// Check if a type is a numeric primitive (`char` counts as numeric).
pub fn is_primitive_numeric(hash: TypeHash) -> bool {
    rank(hash).is_some()
}

/// Widening order: `char < int < long < float < double`.
fn rank(hash: TypeHash) -> Option<u8> {
    match hash {
        h if h == primitives::CHAR => Some(0),
        h if h == primitives::INT => Some(1),
        h if h == primitives::LONG => Some(2),
        h if h == primitives::FLOAT => Some(3),
        h if h == primitives::DOUBLE => Some(4),
        _ => None,
    }
}

fn is_widening(from: TypeHash, to: TypeHash) -> bool {
    matches!((rank(from), rank(to)), (Some(f), Some(t)) if f < t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_implicitly() {
        for to in [primitives::LONG, primitives::FLOAT, primitives::DOUBLE] {
            let conv = find_primitive_conversion(primitives::INT, to).unwrap();
            assert!(conv.is_implicit);
            assert_eq!(conv.cost, Conversion::COST_PRIMITIVE_WIDENING);
        }
    }

    #[test]
    fn char_widens_to_int() {
        let conv = find_primitive_conversion(primitives::CHAR, primitives::INT).unwrap();
        assert!(conv.is_implicit);
    }

    #[test]
    fn narrowing_is_explicit() {
        let conv = find_primitive_conversion(primitives::DOUBLE, primitives::INT).unwrap();
        assert!(!conv.is_implicit);
        assert_eq!(conv.cost, Conversion::COST_EXPLICIT_ONLY);
    }

    #[test]
    fn non_numeric_has_no_primitive_conversion() {
        assert!(find_primitive_conversion(primitives::BOOL, primitives::INT).is_none());
        assert!(find_primitive_conversion(primitives::INT, primitives::STRING).is_none());
        assert!(find_primitive_conversion(primitives::INT, primitives::INT).is_none());
    }
}
