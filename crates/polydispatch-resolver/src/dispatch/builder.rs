//! Dispatch table construction.
//!
//! Walks a concrete type's inheritance chain root-to-leaf. At each level the
//! level's virtual members introduce or override VMT slots, then each
//! conformance record declared at that level builds fresh interface tables
//! against the VMT as it stands, along with the interfaces it extends. A
//! level's own record for an extended interface takes precedence over the
//! derived record. Levels without a record for an interface keep an owned
//! copy of the nearest ancestor's table.

use std::sync::Arc;

use polydispatch_core::{
    ConformanceRecord, DispatchError, MemberSignature, TypeDescriptor, TypeHash, TypeLookup,
    Virtuality,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::{DispatchTables, InterfaceSlot, InterfaceSlotTable, VirtualTable};

/// Build the dispatch tables of a concrete type.
///
/// Fails with `NotConcrete` for interfaces, generic placeholders and open
/// generic definitions, `UnknownType` when the chain references an
/// unregistered type, `MissingOverrideBase` for an override with no slot and
/// `UnresolvedInterfaceSlot` for an unimplemented interface member.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn build_dispatch_tables<L: TypeLookup + ?Sized>(
    type_hash: TypeHash,
    lookup: &L,
) -> Result<DispatchTables, DispatchError> {
    let desc = lookup
        .lookup(type_hash)
        .ok_or_else(|| DispatchError::UnknownType(type_hash.to_string()))?;
    if !desc.kind.has_dispatch_tables() || desc.is_generic() {
        return Err(DispatchError::NotConcrete(desc.name.clone()));
    }

    let chain = inheritance_chain(&desc, lookup)?;
    let mut vmt = VirtualTable::new();
    let mut interfaces: FxHashMap<TypeHash, InterfaceSlotTable> = FxHashMap::default();

    for (depth, level) in chain.iter().enumerate() {
        apply_members(level, &mut vmt)?;

        let levels = &chain[..=depth];
        let declared: FxHashSet<TypeHash> =
            level.conformances.iter().map(|r| r.interface).collect();
        for record in &level.conformances {
            let table = build_interface_table(levels, record, record.interface, &vmt, lookup)?;
            interfaces.insert(record.interface, table);
        }
        // Extended interfaces come from the derived record unless this level
        // declares its own record for them.
        for record in &level.conformances {
            for extended in lookup.interfaces_of(record.interface) {
                if declared.contains(&extended) {
                    continue;
                }
                let table = build_interface_table(levels, record, extended, &vmt, lookup)?;
                interfaces.insert(extended, table);
            }
        }
    }

    debug!(
        type_name = %desc.name,
        slots = vmt.len(),
        interfaces = interfaces.len(),
        "built dispatch tables"
    );

    Ok(DispatchTables {
        type_hash,
        vmt,
        interfaces: interfaces
            .into_iter()
            .map(|(iface, table)| (iface, Arc::new(table)))
            .collect(),
    })
}

/// Root-to-leaf chain of descriptors ending at `desc`.
fn inheritance_chain<L: TypeLookup + ?Sized>(
    desc: &Arc<TypeDescriptor>,
    lookup: &L,
) -> Result<Vec<Arc<TypeDescriptor>>, DispatchError> {
    let mut chain = Vec::new();
    for ancestor in lookup.ancestors(desc.type_hash).into_iter().rev() {
        let level = lookup
            .lookup(ancestor)
            .ok_or_else(|| DispatchError::UnknownType(ancestor.to_string()))?;
        chain.push(level);
    }
    chain.push(Arc::clone(desc));
    Ok(chain)
}

fn apply_members(level: &TypeDescriptor, vmt: &mut VirtualTable) -> Result<(), DispatchError> {
    for member in level.members.iter().filter(|m| !m.is_static) {
        match member.virtuality {
            Virtuality::NonVirtual => {}
            Virtuality::Virtual => {
                vmt.introduce(member.signature_hash(), member.member_hash(), level.type_hash);
            }
            Virtuality::Override => {
                vmt.override_slot(member.signature_hash(), member.member_hash(), level.type_hash)
                    .ok_or_else(|| DispatchError::MissingOverrideBase {
                        type_name: level.name.clone(),
                        member: member.name.clone(),
                    })?;
            }
        }
    }
    Ok(())
}

fn build_interface_table<L: TypeLookup + ?Sized>(
    levels: &[Arc<TypeDescriptor>],
    record: &ConformanceRecord,
    interface: TypeHash,
    vmt: &VirtualTable,
    lookup: &L,
) -> Result<InterfaceSlotTable, DispatchError> {
    let Some(current) = levels.last() else {
        return Err(DispatchError::UnknownType(interface.to_string()));
    };
    let iface = lookup
        .lookup(interface)
        .ok_or_else(|| DispatchError::UnknownType(interface.to_string()))?;

    let mut table = InterfaceSlotTable::new(interface, current.type_hash);
    for required in iface.members.iter().filter(|m| !m.is_static) {
        let unresolved = || DispatchError::UnresolvedInterfaceSlot {
            type_name: current.name.clone(),
            interface: iface.name.clone(),
            member: required.name.clone(),
        };

        let implementation = match record.explicit_implementation(required.member_hash()) {
            Some(mapped) => levels
                .iter()
                .rev()
                .find_map(|level| level.member(mapped))
                .ok_or_else(unresolved)?,
            None => levels
                .iter()
                .rev()
                .find_map(|level| {
                    level
                        .members
                        .iter()
                        .find(|m| !m.is_static && m.same_signature(required))
                })
                .ok_or_else(unresolved)?,
        };

        let slot = if implementation.virtuality.is_dispatched() {
            slot_introducer(implementation, lookup)
                .and_then(|introducer| vmt.index_of(introducer))
                .map(InterfaceSlot::Virtual)
                .ok_or_else(unresolved)?
        } else {
            InterfaceSlot::Direct(implementation.member_hash())
        };
        table.insert(required.member_hash(), slot);
    }
    Ok(table)
}

/// The `Virtual` member that introduced the slot a dispatched member occupies.
///
/// A `Virtual` member introduces its own slot. An `Override` occupies the
/// slot of the nearest `Virtual` member with the same signature above its
/// declaring type. Returns `None` for non-virtual members and orphaned
/// overrides.
pub fn slot_introducer<L: TypeLookup + ?Sized>(
    member: &MemberSignature,
    lookup: &L,
) -> Option<TypeHash> {
    match member.virtuality {
        Virtuality::NonVirtual => None,
        Virtuality::Virtual => Some(member.member_hash()),
        Virtuality::Override => lookup
            .ancestors(member.declaring)
            .into_iter()
            .filter_map(|ancestor| lookup.lookup(ancestor))
            .find_map(|desc| {
                desc.members
                    .iter()
                    .find(|m| {
                        !m.is_static
                            && m.virtuality == Virtuality::Virtual
                            && m.same_signature(member)
                    })
                    .map(MemberSignature::member_hash)
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydispatch_catalog::Catalog;
    use polydispatch_core::{GenericParam, primitives};

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn method(name: &str) -> MemberSignature {
        MemberSignature::method(name, vec![])
    }

    fn hierarchy() -> Catalog {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(
                TypeDescriptor::class("A")
                    .with_member(method("f").as_virtual())
                    .with_member(method("g").as_virtual()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("B")
                    .with_base(h("A"))
                    .with_member(method("f").as_override())
                    .with_member(method("h").as_virtual()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("C")
                    .with_base(h("B"))
                    .with_member(method("g").as_override()),
            )
            .unwrap();
        catalog
    }

    fn member_hash(catalog: &Catalog, ty: &str, name: &str) -> TypeHash {
        catalog
            .get(h(ty))
            .unwrap()
            .declared_members_named(name)
            .next()
            .unwrap()
            .member_hash()
    }

    #[test]
    fn vmt_grows_monotonically_down_the_chain() {
        let catalog = hierarchy();
        let sizes: Vec<_> = ["object", "A", "B", "C"]
            .iter()
            .map(|t| build_dispatch_tables(h(t), &catalog).unwrap().vmt.len())
            .collect();
        assert_eq!(sizes, vec![0, 2, 3, 3]);
    }

    #[test]
    fn overrides_resolve_to_most_derived() {
        let catalog = hierarchy();
        let c = build_dispatch_tables(h("C"), &catalog).unwrap();

        let a_f = member_hash(&catalog, "A", "f");
        let a_g = member_hash(&catalog, "A", "g");
        assert_eq!(c.resolve_virtual(a_f), Some(member_hash(&catalog, "B", "f")));
        assert_eq!(c.resolve_virtual(a_g), Some(member_hash(&catalog, "C", "g")));

        // Slot indices are stable across the hierarchy.
        let a = build_dispatch_tables(h("A"), &catalog).unwrap();
        assert_eq!(a.vmt.index_of(a_f), c.vmt.index_of(a_f));
        assert_eq!(a.resolve_virtual(a_g), Some(a_g));
    }

    #[test]
    fn virtual_on_existing_key_hides() {
        let mut catalog = hierarchy();
        catalog
            .register_type(
                TypeDescriptor::class("D")
                    .with_base(h("C"))
                    .with_member(method("f").as_virtual()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("E")
                    .with_base(h("D"))
                    .with_member(method("f").as_override()),
            )
            .unwrap();

        let e = build_dispatch_tables(h("E"), &catalog).unwrap();
        assert_eq!(e.vmt.len(), 4);
        // The old slot keeps B's override; the new slot holds E's.
        assert_eq!(
            e.resolve_virtual(member_hash(&catalog, "A", "f")),
            Some(member_hash(&catalog, "B", "f"))
        );
        assert_eq!(
            e.resolve_virtual(member_hash(&catalog, "D", "f")),
            Some(member_hash(&catalog, "E", "f"))
        );

        let e_f = catalog.get(h("E")).unwrap().members[0].clone();
        assert_eq!(slot_introducer(&e_f, &catalog), Some(member_hash(&catalog, "D", "f")));
    }

    #[test]
    fn override_without_base_slot_fails() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::class("A").with_member(method("f")))
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("B")
                    .with_base(h("A"))
                    .with_member(method("f").as_override()),
            )
            .unwrap();

        let err = build_dispatch_tables(h("B"), &catalog).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MissingOverrideBase {
                type_name: "B".into(),
                member: "f".into()
            }
        );
    }

    fn drawable() -> Catalog {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::interface("IDrawable").with_member(method("draw")))
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Shape")
                    .conforms_to(h("IDrawable"))
                    .with_member(method("draw").as_virtual()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Circle")
                    .with_base(h("Shape"))
                    .with_member(method("draw").as_override()),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Square")
                    .with_base(h("Shape"))
                    .conforms_to(h("IDrawable"))
                    .with_member(method("draw").as_override()),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn interface_entries_point_at_vmt_slots() {
        let catalog = drawable();
        let iface_draw = member_hash(&catalog, "IDrawable", "draw");
        let circle = build_dispatch_tables(h("Circle"), &catalog).unwrap();

        let table = circle.interface_table(h("IDrawable")).unwrap();
        assert!(matches!(table.get(iface_draw), Some(InterfaceSlot::Virtual(0))));
        assert_eq!(table.declared_at, h("Shape"));
        assert_eq!(
            circle.resolve_interface(h("IDrawable"), iface_draw),
            Some(member_hash(&catalog, "Circle", "draw"))
        );
    }

    #[test]
    fn redeclared_interface_tables_are_equal_but_distinct() {
        let catalog = drawable();
        let shape = build_dispatch_tables(h("Shape"), &catalog).unwrap();
        let square = build_dispatch_tables(h("Square"), &catalog).unwrap();

        let shape_table = shape.interface_table(h("IDrawable")).unwrap();
        let square_table = square.interface_table(h("IDrawable")).unwrap();
        assert_eq!(shape_table, square_table);
        assert!(!Arc::ptr_eq(shape_table, square_table));
        assert_eq!(square_table.declared_at, h("Square"));
    }

    #[test]
    fn inherited_interface_table_is_an_owned_copy() {
        let catalog = drawable();
        let shape = build_dispatch_tables(h("Shape"), &catalog).unwrap();
        let circle = build_dispatch_tables(h("Circle"), &catalog).unwrap();

        let shape_table = shape.interface_table(h("IDrawable")).unwrap();
        let circle_table = circle.interface_table(h("IDrawable")).unwrap();
        assert_eq!(shape_table, circle_table);
        assert!(!Arc::ptr_eq(shape_table, circle_table));
    }

    #[test]
    fn non_virtual_implementation_is_direct() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::interface("IGreeter").with_member(method("greet")))
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Base")
                    .conforms_to(h("IGreeter"))
                    .with_member(method("greet")),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Inherits")
                    .with_base(h("Base"))
                    .with_member(method("greet")),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Reimplements")
                    .with_base(h("Base"))
                    .conforms_to(h("IGreeter"))
                    .with_member(method("greet")),
            )
            .unwrap();

        let greet = member_hash(&catalog, "IGreeter", "greet");
        let inherits = build_dispatch_tables(h("Inherits"), &catalog).unwrap();
        let reimplements = build_dispatch_tables(h("Reimplements"), &catalog).unwrap();

        assert_eq!(
            inherits.resolve_interface(h("IGreeter"), greet),
            Some(member_hash(&catalog, "Base", "greet"))
        );
        assert_eq!(
            reimplements.resolve_interface(h("IGreeter"), greet),
            Some(member_hash(&catalog, "Reimplements", "greet"))
        );
    }

    #[test]
    fn explicit_mapping_wins_over_signature_match() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::interface("IDrawable").with_member(method("draw")))
            .unwrap();
        let iface_draw = member_hash(&catalog, "IDrawable", "draw");
        let render = method("render").declared_on(h("Canvas")).member_hash();
        catalog
            .register_type(
                TypeDescriptor::class("Canvas")
                    .with_conformance(
                        ConformanceRecord::new(h("Canvas"), h("IDrawable"))
                            .with_implementation(iface_draw, render),
                    )
                    .with_member(method("draw"))
                    .with_member(method("render")),
            )
            .unwrap();

        let canvas = build_dispatch_tables(h("Canvas"), &catalog).unwrap();
        assert_eq!(canvas.resolve_interface(h("IDrawable"), iface_draw), Some(render));
    }

    #[test]
    fn unimplemented_member_fails() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(
                TypeDescriptor::interface("IShape")
                    .with_member(method("area").returns(primitives::DOUBLE)),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Blob")
                    .conforms_to(h("IShape"))
                    .with_member(MemberSignature::method("area", vec![primitives::INT])),
            )
            .unwrap();

        let err = build_dispatch_tables(h("Blob"), &catalog).unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnresolvedInterfaceSlot {
                type_name: "Blob".into(),
                interface: "IShape".into(),
                member: "area".into()
            }
        );
    }

    #[test]
    fn extended_interfaces_get_tables() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::interface("IBase").with_member(method("id")))
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::interface("IDerived")
                    .conforms_to(h("IBase"))
                    .with_member(method("name")),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("Thing")
                    .conforms_to(h("IDerived"))
                    .with_member(method("id").as_virtual())
                    .with_member(method("name")),
            )
            .unwrap();

        let thing = build_dispatch_tables(h("Thing"), &catalog).unwrap();
        assert!(thing.interface_table(h("IBase")).is_some());
        assert!(thing.interface_table(h("IDerived")).is_some());
        let id = member_hash(&catalog, "IBase", "id");
        assert_eq!(
            thing.resolve_interface(h("IBase"), id),
            Some(member_hash(&catalog, "Thing", "id"))
        );
    }

    #[test]
    fn own_record_for_extended_interface_is_kept() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::interface("IBase").with_member(method("id")))
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::interface("IDerived")
                    .conforms_to(h("IBase"))
                    .with_member(method("name")),
            )
            .unwrap();
        let id = member_hash(&catalog, "IBase", "id");
        let render = method("render").declared_on(h("Thing")).member_hash();
        catalog
            .register_type(
                TypeDescriptor::class("Thing")
                    .with_conformance(
                        ConformanceRecord::new(h("Thing"), h("IBase"))
                            .with_implementation(id, render),
                    )
                    .conforms_to(h("IDerived"))
                    .with_member(method("render"))
                    .with_member(method("name")),
            )
            .unwrap();

        let thing = build_dispatch_tables(h("Thing"), &catalog).unwrap();
        assert_eq!(thing.resolve_interface(h("IBase"), id), Some(render));
        assert_eq!(
            thing.resolve_interface(h("IDerived"), member_hash(&catalog, "IDerived", "name")),
            Some(member_hash(&catalog, "Thing", "name"))
        );
    }

    #[test]
    fn value_types_get_tables() {
        let mut catalog = drawable();
        catalog
            .register_type(
                TypeDescriptor::value("Sprite")
                    .conforms_to(h("IDrawable"))
                    .with_member(method("draw")),
            )
            .unwrap();
        let sprite = build_dispatch_tables(h("Sprite"), &catalog).unwrap();
        assert!(sprite.vmt.is_empty());
        assert_eq!(sprite.interfaces.len(), 1);
    }

    #[test]
    fn non_concrete_and_unknown_types() {
        let mut catalog = drawable();
        catalog
            .register_type(
                TypeDescriptor::class("Box").with_generic_param(GenericParam::new("Box", "T")),
            )
            .unwrap();
        catalog
            .register_type(TypeDescriptor::class("Orphan").with_base(h("Missing")))
            .unwrap();

        assert!(matches!(
            build_dispatch_tables(h("IDrawable"), &catalog),
            Err(DispatchError::NotConcrete(_))
        ));
        assert!(matches!(
            build_dispatch_tables(h("Box"), &catalog),
            Err(DispatchError::NotConcrete(_))
        ));
        assert!(matches!(
            build_dispatch_tables(h("Orphan"), &catalog),
            Err(DispatchError::UnknownType(_))
        ));
        assert!(matches!(
            build_dispatch_tables(h("Nothing"), &catalog),
            Err(DispatchError::UnknownType(_))
        ));
    }
}
