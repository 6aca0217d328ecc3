//! User-defined conversions.
//!
//! At most one programmer-declared operator is applied per conversion. A free
//! reference widening may precede it (the source widens to the operator's
//! declared input) and another may follow it (the operator's output widens to
//! the target).

use polydispatch_core::{ConversionDecl, ConversionError, TypeHash, TypeLookup};

use super::{Conversion, ConversionKind};

/// Find a user-declared conversion from `source` to `target`.
///
/// With `implicit` set only implicit operators are considered; otherwise
/// only explicit ones. Among applicable operators the one needing the fewest
/// widening steps wins; a tie is ambiguous.
pub fn find_user_conversion<L: TypeLookup + ?Sized>(
    source: TypeHash,
    target: TypeHash,
    lookup: &L,
    implicit: bool,
) -> Result<Option<Conversion>, ConversionError> {
    let mut best: Vec<(u32, ConversionDecl)> = Vec::new();

    for (origin, pre_widened) in input_types(source, lookup) {
        for decl in lookup.conversions_from(origin) {
            if decl.implicit != implicit {
                continue;
            }
            let post_widened = if decl.to == target {
                false
            } else if lookup.is_reference_assignable(decl.to, target) {
                true
            } else {
                continue;
            };

            let steps = u32::from(pre_widened) + u32::from(post_widened);
            match best.first() {
                Some(&(current, _)) if steps > current => {}
                Some(&(current, _)) if steps == current => best.push((steps, decl)),
                _ => best = vec![(steps, decl)],
            }
        }
    }

    match best.as_slice() {
        [] => Ok(None),
        [(steps, decl)] => Ok(Some(user_conversion(decl, *steps, implicit))),
        tied => Err(ConversionError::AmbiguousUserConversion {
            from: lookup.type_name(source),
            to: lookup.type_name(target),
            candidates: tied
                .iter()
                .map(|(_, decl)| describe(decl, lookup))
                .collect(),
        }),
    }
}

/// Types whose operators may apply to `source`, flagged when reaching them
/// needs a widening step. Value types only use their own operators.
fn input_types<L: TypeLookup + ?Sized>(source: TypeHash, lookup: &L) -> Vec<(TypeHash, bool)> {
    let mut inputs = vec![(source, false)];
    if lookup.is_value_type(source) {
        return inputs;
    }
    inputs.extend(lookup.ancestors(source).into_iter().map(|h| (h, true)));
    inputs.extend(lookup.interfaces_of(source).into_iter().map(|h| (h, true)));
    inputs
}

fn user_conversion(decl: &ConversionDecl, steps: u32, implicit: bool) -> Conversion {
    let kind = ConversionKind::UserDefined {
        operator: decl.member_hash(),
        from: decl.from,
        to: decl.to,
    };
    if implicit {
        Conversion {
            kind,
            cost: Conversion::COST_USER_IMPLICIT + steps,
            is_implicit: true,
        }
    } else {
        Conversion {
            kind,
            cost: Conversion::COST_EXPLICIT_ONLY,
            is_implicit: false,
        }
    }
}

fn describe<L: TypeLookup + ?Sized>(decl: &ConversionDecl, lookup: &L) -> String {
    let op = if decl.implicit { "implicit" } else { "explicit" };
    format!(
        "{}.{op}({} -> {})",
        lookup.type_name(decl.declaring),
        lookup.type_name(decl.from),
        lookup.type_name(decl.to)
    )
}
