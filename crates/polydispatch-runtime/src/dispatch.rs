//! Call target selection.
//!
//! A binding fixes the member and the dispatch mechanism at resolution time;
//! the receiver's runtime type picks the implementation through its tables.

use polydispatch_core::{RuntimeError, TypeHash};
use polydispatch_resolver::{CallKind, DispatchTables};

/// Implementation reached by a call of kind `call_kind` bound to
/// `bound_member`, on a receiver whose runtime type owns `receiver`.
///
/// `name` is only used in error messages.
pub fn select_implementation(
    call_kind: CallKind,
    bound_member: TypeHash,
    receiver: Option<&DispatchTables>,
    name: &str,
) -> Result<TypeHash, RuntimeError> {
    match call_kind {
        CallKind::Direct => Ok(bound_member),
        CallKind::Virtual { slot } => receiver
            .ok_or_else(|| RuntimeError::NullReference(name.to_string()))?
            .resolve_virtual(slot)
            .ok_or_else(|| RuntimeError::MissingImplementation(name.to_string())),
        CallKind::Interface { interface, member } => receiver
            .ok_or_else(|| RuntimeError::NullReference(name.to_string()))?
            .resolve_interface(interface, member)
            .ok_or_else(|| RuntimeError::MissingImplementation(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydispatch_catalog::Catalog;
    use polydispatch_core::{MemberSignature, TypeDescriptor};
    use polydispatch_resolver::{build_dispatch_tables, resolve_call};

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(
                TypeDescriptor::interface("IDrawable")
                    .with_member(MemberSignature::method("draw", vec![])),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Shape")
                    .conforms_to(h("IDrawable"))
                    .with_member(MemberSignature::method("draw", vec![]).as_virtual()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Circle")
                    .with_base(h("Shape"))
                    .with_member(MemberSignature::method("draw", vec![]).as_override()),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn virtual_and_interface_calls_reach_override() {
        let catalog = catalog();
        let circle = build_dispatch_tables(h("Circle"), &catalog).unwrap();
        let circle_draw = MemberSignature::method("draw", vec![])
            .declared_on(h("Circle"))
            .member_hash();

        let through_base = resolve_call(h("Shape"), "draw", &[], &catalog).unwrap();
        let target = select_implementation(
            through_base.call_kind,
            through_base.member.member_hash(),
            Some(&circle),
            "draw",
        )
        .unwrap();
        assert_eq!(target, circle_draw);

        let through_iface = resolve_call(h("IDrawable"), "draw", &[], &catalog).unwrap();
        let target = select_implementation(
            through_iface.call_kind,
            through_iface.member.member_hash(),
            Some(&circle),
            "draw",
        )
        .unwrap();
        assert_eq!(target, circle_draw);
    }

    #[test]
    fn dispatched_call_without_receiver() {
        let catalog = catalog();
        let binding = resolve_call(h("Shape"), "draw", &[], &catalog).unwrap();
        assert!(matches!(
            select_implementation(binding.call_kind, binding.member.member_hash(), None, "draw"),
            Err(RuntimeError::NullReference(_))
        ));
    }

    #[test]
    fn direct_calls_ignore_receiver() {
        let member = h("static_member");
        assert_eq!(
            select_implementation(CallKind::Direct, member, None, "f").unwrap(),
            member
        );
    }
}
