//! Type argument validation.
//!
//! Runs before the instantiation cache is touched, so a rejected argument list
//! never leaves a cache entry behind.

use polydispatch_core::{GenericParam, InstantiationError, KindConstraint, TypeHash, TypeLookup};

/// Validate type arguments against generic parameters.
///
/// Checks arity, that every argument is a known closed type, and (when
/// `enforce_constraints` is set) the kind and capability constraints.
pub fn validate_type_args<L: TypeLookup + ?Sized>(
    owner: &str,
    params: &[GenericParam],
    type_args: &[TypeHash],
    lookup: &L,
    enforce_constraints: bool,
) -> Result<(), InstantiationError> {
    if params.len() != type_args.len() {
        return Err(InstantiationError::ArityMismatch {
            name: owner.to_string(),
            expected: params.len(),
            got: type_args.len(),
        });
    }

    for (param, &arg) in params.iter().zip(type_args) {
        let desc = lookup
            .lookup(arg)
            .ok_or_else(|| InstantiationError::UnknownType(arg.to_string()))?;

        let violation = |constraint: String| InstantiationError::ConstraintViolation {
            parameter: param.qualified_name(owner),
            argument: desc.name.clone(),
            constraint,
        };

        if desc.is_generic() {
            return Err(violation("closed type".to_string()));
        }
        if !enforce_constraints {
            continue;
        }

        match param.kind {
            KindConstraint::Reference if desc.kind.is_value() => {
                return Err(violation("reference type".to_string()));
            }
            KindConstraint::Value if !desc.kind.is_value() => {
                return Err(violation("value type".to_string()));
            }
            _ => {}
        }

        for &constraint in &param.constraints {
            if arg != constraint && !lookup.conforms_to(arg, constraint) {
                return Err(violation(lookup.type_name(constraint)));
            }
        }
    }

    Ok(())
}
