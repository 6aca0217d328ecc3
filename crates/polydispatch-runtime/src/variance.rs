//! Covariant array write guard.
//!
//! A reference-kind array may be accessed through a reference whose element
//! type is a supertype of the array's own element type. Every store through
//! such a reference must check the stored value against the array's actual
//! element type.

use polydispatch_core::{RuntimeError, TypeHash, TypeLookup};

/// Check whether stores through an array reference with this static element
/// type need the covariance check.
///
/// Sealed element types have no subtypes, so the array behind the reference
/// has exactly that element type. Value-kind arrays are never covariant.
pub fn needs_covariance_check<L: TypeLookup + ?Sized>(
    declared_element: TypeHash,
    lookup: &L,
) -> bool {
    lookup
        .lookup(declared_element)
        .is_none_or(|d| !d.is_sealed() && !d.kind.is_value())
}

/// Verify that a value of type `written` may be stored into an array whose
/// actual element type is `actual_element`, accessed through a reference
/// with element type `declared_element`.
pub fn check_covariant_write<L: TypeLookup + ?Sized>(
    declared_element: TypeHash,
    actual_element: TypeHash,
    written: TypeHash,
    lookup: &L,
) -> Result<(), RuntimeError> {
    if lookup.is_assignable_to(written, actual_element) {
        return Ok(());
    }
    Err(RuntimeError::ArrayVarianceViolation {
        declared: lookup.type_name(declared_element),
        actual: lookup.type_name(actual_element),
        written: lookup.type_name(written),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydispatch_catalog::Catalog;
    use polydispatch_core::{TypeDescriptor, primitives};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::with_primitives();
        catalog.register_type(TypeDescriptor::class("Animal")).unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Dog").with_base(TypeHash::from_name("Animal")),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn object_array_backed_by_strings() {
        let catalog = catalog();
        assert!(
            check_covariant_write(
                primitives::OBJECT,
                primitives::STRING,
                primitives::STRING,
                &catalog
            )
            .is_ok()
        );

        let err = check_covariant_write(
            primitives::OBJECT,
            primitives::STRING,
            primitives::INT,
            &catalog,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArrayVarianceViolation {
                declared: "object".into(),
                actual: "string".into(),
                written: "int".into(),
            }
        );
    }

    #[test]
    fn subtypes_may_be_stored() {
        let catalog = catalog();
        let animal = TypeHash::from_name("Animal");
        let dog = TypeHash::from_name("Dog");
        assert!(check_covariant_write(primitives::OBJECT, animal, dog, &catalog).is_ok());
        assert!(check_covariant_write(animal, dog, animal, &catalog).is_err());
    }

    #[test]
    fn sealed_and_value_elements_skip_the_check() {
        let catalog = catalog();
        assert!(!needs_covariance_check(primitives::STRING, &catalog));
        assert!(!needs_covariance_check(primitives::INT, &catalog));
        assert!(needs_covariance_check(primitives::OBJECT, &catalog));
        assert!(needs_covariance_check(TypeHash::from_name("Animal"), &catalog));
    }
}
