//! Catalog - registry of type descriptors.
//!
//! # Storage Model
//!
//! - **Types**: `Arc<TypeDescriptor>` by `TypeHash`, plus a name index and the
//!   registration order.
//! - **Conversions**: user-declared conversion operators indexed by source
//!   type, so the conversion engine never scans every descriptor.
//! - **Hierarchy**: a [`HierarchyGraph`] of inheritance, conformance and
//!   interface extension edges, checked for cycles before every insert.
//!
//! # Forward References
//!
//! Descriptors may name a base or interface that is not registered yet.
//! Identity is a name hash, so the edge is recorded immediately and the
//! referenced type is validated against its dependents when it arrives.
//!
//! # Thread Safety
//!
//! The catalog is mutated only during the registration phase. Afterwards it
//! is read-only and shared behind an `Arc`.

use std::sync::Arc;

use polydispatch_core::{
    CatalogError, ConversionDecl, MemberSignature, TypeDescriptor, TypeFlags, TypeHash, TypeKind,
    TypeLookup, primitives,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::hierarchy::{EdgeKind, HierarchyGraph};

/// Registry of every known type.
#[derive(Debug, Default)]
pub struct Catalog {
    types: FxHashMap<TypeHash, Arc<TypeDescriptor>>,
    by_name: FxHashMap<String, TypeHash>,
    order: Vec<TypeHash>,
    conversions_by_source: FxHashMap<TypeHash, Vec<ConversionDecl>>,
    hierarchy: HierarchyGraph,
    root: Option<TypeHash>,
}

impl Catalog {
    /// Create an empty catalog with no root type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the `object` root and the built-in primitives.
    pub fn with_primitives() -> Self {
        let mut catalog = Self::new();
        let root = TypeDescriptor::class("object").with_flags(TypeFlags::ROOT);
        catalog.root = Some(root.type_hash);
        catalog.insert(root, Vec::new());
        catalog.register_primitives();
        catalog
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register the universal root class and make it the implicit base of
    /// every class without an explicit base.
    pub fn register_root(&mut self, name: &str) -> Result<TypeHash, CatalogError> {
        let hash = TypeHash::from_name(name);
        if !self.types.contains_key(&hash) {
            self.register_type(TypeDescriptor::class(name).with_flags(TypeFlags::ROOT))?;
        }
        self.root = Some(hash);
        Ok(hash)
    }

    /// Register the built-in value primitives and the sealed `string` class.
    ///
    /// Primitives that are already registered are skipped.
    pub fn register_primitives(&mut self) {
        let values = ["void", "bool", "char", "int", "long", "float", "double"];
        let builtins = values
            .into_iter()
            .map(TypeDescriptor::value)
            .chain(std::iter::once(TypeDescriptor::class("string").as_sealed()));

        for desc in builtins {
            if self.types.contains_key(&desc.type_hash) {
                continue;
            }
            let desc = desc.with_flags(TypeFlags::PRIMITIVE);
            self.insert(desc, Vec::new());
        }
    }

    /// Register a type.
    ///
    /// Fails if the name is taken, if a base or conformance is invalid for
    /// the kinds involved, if two members share a signature, or if the new
    /// edges would close a cycle. A failed registration leaves the catalog
    /// unchanged.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn register_type(&mut self, desc: TypeDescriptor) -> Result<TypeHash, CatalogError> {
        match self.validate(&desc) {
            Ok(edges) => {
                let hash = desc.type_hash;
                self.register_placeholders(&desc);
                self.insert(desc, edges);
                Ok(hash)
            }
            Err(err) => {
                warn!(type_name = %desc.name, error = %err, "rejected type registration");
                Err(err)
            }
        }
    }

    fn insert(&mut self, desc: TypeDescriptor, edges: Vec<(TypeHash, EdgeKind)>) {
        let hash = desc.type_hash;
        debug!(
            type_name = %desc.name,
            kind = desc.kind.as_str(),
            members = desc.members.len(),
            conformances = desc.conformances.len(),
            "registered type"
        );

        self.hierarchy.add_edges(hash, &edges);
        for conversion in &desc.conversions {
            self.conversions_by_source
                .entry(conversion.from)
                .or_default()
                .push(*conversion);
        }
        self.by_name.insert(desc.name.clone(), hash);
        self.order.push(hash);
        self.types.insert(hash, Arc::new(desc));
    }

    /// Register placeholder descriptors for the generic parameters of an open
    /// type and of its generic methods.
    fn register_placeholders(&mut self, desc: &TypeDescriptor) {
        let type_params = desc
            .generic_params
            .iter()
            .map(|p| TypeDescriptor::generic_parameter(&desc.name, p));
        let method_params = desc.members.iter().flat_map(|m| {
            let owner = format!("{}.{}", desc.name, m.name);
            m.generic_params
                .iter()
                .map(move |p| TypeDescriptor::generic_parameter(&owner, p))
        });

        let placeholders: Vec<_> = type_params.chain(method_params).collect();
        for placeholder in placeholders {
            if self.types.contains_key(&placeholder.type_hash) {
                continue;
            }
            let edges = placeholder
                .declared_interfaces()
                .map(|i| (i, EdgeKind::Conforms))
                .collect();
            self.insert(placeholder, edges);
        }
    }

    fn validate(&self, desc: &TypeDescriptor) -> Result<Vec<(TypeHash, EdgeKind)>, CatalogError> {
        if self.types.contains_key(&desc.type_hash) || self.by_name.contains_key(&desc.name) {
            return Err(CatalogError::DuplicateType(desc.name.clone()));
        }

        self.validate_members(desc)?;
        self.validate_dependents(desc)?;

        let mut edges = Vec::new();
        if let Some(base) = desc.base {
            self.validate_base(desc, base)?;
            edges.push((base, EdgeKind::Inherits));
        }

        let conformance_kind = if desc.kind.is_interface() {
            EdgeKind::Extends
        } else {
            EdgeKind::Conforms
        };
        let mut seen = FxHashSet::default();
        for record in &desc.conformances {
            if record.implementing != desc.type_hash {
                return Err(self.invalid_conformance(desc, record.interface, "record belongs to another type"));
            }
            if !seen.insert(record.interface) {
                return Err(self.invalid_conformance(desc, record.interface, "declared twice at the same level"));
            }
            if let Some(target) = self.types.get(&record.interface)
                && !target.kind.is_interface()
            {
                return Err(self.invalid_conformance(desc, record.interface, "not an interface"));
            }
            edges.push((record.interface, conformance_kind));
        }

        let targets: Vec<_> = edges.iter().map(|&(t, _)| t).collect();
        if let Some(cycle) = self.hierarchy.find_cycle(desc.type_hash, &targets) {
            let cycle = cycle
                .into_iter()
                .map(|h| {
                    if h == desc.type_hash {
                        desc.name.clone()
                    } else {
                        self.type_name(h)
                    }
                })
                .collect();
            return Err(CatalogError::CyclicInheritance { cycle });
        }

        Ok(edges)
    }

    fn validate_members(&self, desc: &TypeDescriptor) -> Result<(), CatalogError> {
        let mut seen = FxHashSet::default();
        for member in &desc.members {
            if !seen.insert(member.signature_hash()) {
                return Err(CatalogError::DuplicateMember {
                    type_name: desc.name.clone(),
                    member: member.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_base(&self, desc: &TypeDescriptor, base: TypeHash) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidBase {
            type_name: desc.name.clone(),
            base: self.type_name(base),
            reason: reason.to_string(),
        };

        if !desc.kind.is_class() {
            return Err(invalid("only classes have a base type"));
        }
        if desc.flags.contains(TypeFlags::ROOT) {
            return Err(invalid("the root type has no base"));
        }
        match self.types.get(&base) {
            Some(base_desc) => Self::check_inheritable(base_desc).map_err(invalid),
            None => Ok(()),
        }
    }

    fn check_inheritable(base: &TypeDescriptor) -> Result<(), &'static str> {
        if !base.kind.is_class() {
            return Err("base must be a class");
        }
        if base.is_sealed() {
            return Err("base is sealed");
        }
        if base.is_generic() {
            return Err("base is an open generic definition");
        }
        Ok(())
    }

    /// Validate a newly arriving type against earlier types that referenced
    /// it before it was registered.
    fn validate_dependents(&self, desc: &TypeDescriptor) -> Result<(), CatalogError> {
        for (dependent, kind) in self.hierarchy.incoming(desc.type_hash) {
            match kind {
                EdgeKind::Inherits => {
                    Self::check_inheritable(desc).map_err(|reason| CatalogError::InvalidBase {
                        type_name: self.type_name(dependent),
                        base: desc.name.clone(),
                        reason: reason.to_string(),
                    })?;
                }
                EdgeKind::Conforms | EdgeKind::Extends => {
                    if !desc.kind.is_interface() {
                        return Err(CatalogError::InvalidConformance {
                            type_name: self.type_name(dependent),
                            target: desc.name.clone(),
                            reason: "not an interface".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn invalid_conformance(
        &self,
        desc: &TypeDescriptor,
        interface: TypeHash,
        reason: &str,
    ) -> CatalogError {
        CatalogError::InvalidConformance {
            type_name: desc.name.clone(),
            target: self.type_name(interface),
            reason: reason.to_string(),
        }
    }

    /// Set the root type explicitly.
    pub fn set_root(&mut self, root: Option<TypeHash>) {
        self.root = root;
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Get a type by hash.
    pub fn get(&self, hash: TypeHash) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(&hash)
    }

    /// Get a type by name.
    pub fn lookup_name(&self, name: &str) -> Result<Arc<TypeDescriptor>, CatalogError> {
        self.by_name
            .get(name)
            .and_then(|h| self.types.get(h))
            .cloned()
            .ok_or_else(|| CatalogError::UnknownType(name.to_string()))
    }

    /// Get a type's hash by name.
    pub fn hash_of(&self, name: &str) -> Option<TypeHash> {
        self.by_name.get(name).copied()
    }

    /// Check if a type is registered.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.types.contains_key(&hash)
    }

    /// Members declared directly on a type, never inherited ones.
    pub fn members_declared_on(&self, hash: TypeHash) -> Result<&[MemberSignature], CatalogError> {
        self.types
            .get(&hash)
            .map(|d| d.members.as_slice())
            .ok_or_else(|| CatalogError::UnknownType(hash.to_string()))
    }

    /// Iterate over all types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.order.iter().filter_map(|h| self.types.get(h))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types ordered so that every base and interface precedes
    /// its dependents. Forward references that were never registered are
    /// omitted.
    pub fn dependency_order(&self) -> Result<Vec<TypeHash>, CatalogError> {
        let order = self.hierarchy.dependency_order().map_err(|h| {
            CatalogError::CyclicInheritance {
                cycle: vec![self.type_name(h), self.type_name(h)],
            }
        })?;
        Ok(order.into_iter().filter(|h| self.contains(*h)).collect())
    }

    /// Bases and interfaces that are referenced but were never registered,
    /// as `(referencing type, missing type)` pairs.
    pub fn unresolved_references(&self) -> Vec<(TypeHash, TypeHash)> {
        let mut missing = Vec::new();
        for &hash in &self.order {
            for (target, _) in self.hierarchy.outgoing(hash) {
                if !self.contains(target) {
                    missing.push((hash, target));
                }
            }
        }
        missing
    }

    /// Check if the type is a built-in primitive.
    pub fn is_primitive(&self, hash: TypeHash) -> bool {
        self.types
            .get(&hash)
            .is_some_and(|d| d.flags.contains(TypeFlags::PRIMITIVE))
    }

    /// Check if the type is the registered `string` primitive.
    pub fn is_string(&self, hash: TypeHash) -> bool {
        hash == primitives::STRING && self.is_primitive(hash)
    }

    /// Kind of a registered type.
    pub fn kind_of(&self, hash: TypeHash) -> Option<TypeKind> {
        self.types.get(&hash).map(|d| d.kind)
    }
}

impl TypeLookup for Catalog {
    fn lookup(&self, type_hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
        self.types.get(&type_hash).cloned()
    }

    fn root_type(&self) -> Option<TypeHash> {
        self.root
    }

    fn conversions_from(&self, type_hash: TypeHash) -> Vec<ConversionDecl> {
        self.conversions_by_source
            .get(&type_hash)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydispatch_core::{ConformanceRecord, GenericParam};

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    #[test]
    fn new_catalog_is_empty() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.root_type(), None);
    }

    #[test]
    fn with_primitives_registers_root_and_builtins() {
        let catalog = Catalog::with_primitives();
        assert_eq!(catalog.root_type(), Some(primitives::OBJECT));
        assert!(catalog.is_primitive(primitives::INT));
        assert!(catalog.is_primitive(primitives::DOUBLE));
        assert!(catalog.is_string(primitives::STRING));
        assert!(catalog.get(primitives::STRING).unwrap().is_sealed());
        assert_eq!(catalog.kind_of(primitives::INT), Some(TypeKind::Value));
        // object + void, bool, char, int, long, float, double + string
        assert_eq!(catalog.len(), 9);
    }

    #[test]
    fn with_primitives_root_matches_register_root() {
        let mut catalog = Catalog::with_primitives();
        let root = catalog.get(primitives::OBJECT).unwrap();
        assert!(root.flags.contains(TypeFlags::ROOT));
        assert_eq!(root.kind, TypeKind::Class);

        assert_eq!(catalog.register_root("object").unwrap(), primitives::OBJECT);
        assert_eq!(catalog.len(), 9);

        catalog.register_type(TypeDescriptor::class("Shape")).unwrap();
        assert!(catalog.is_reference_assignable(h("Shape"), primitives::OBJECT));
    }

    #[test]
    fn lookup_by_name() {
        let mut catalog = Catalog::new();
        catalog.register_type(TypeDescriptor::class("Shape")).unwrap();

        assert_eq!(catalog.lookup_name("Shape").unwrap().type_hash, h("Shape"));
        assert!(matches!(
            catalog.lookup_name("Circle"),
            Err(CatalogError::UnknownType(name)) if name == "Circle"
        ));
    }

    #[test]
    fn duplicate_type_rejected() {
        let mut catalog = Catalog::new();
        catalog.register_type(TypeDescriptor::class("Shape")).unwrap();
        let result = catalog.register_type(TypeDescriptor::interface("Shape"));
        assert_eq!(result, Err(CatalogError::DuplicateType("Shape".into())));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn direct_cycle_rejected_with_path() {
        let mut catalog = Catalog::new();
        catalog
            .register_type(TypeDescriptor::class("A").with_base(h("B")))
            .unwrap();
        let err = catalog
            .register_type(TypeDescriptor::class("B").with_base(h("A")))
            .unwrap_err();

        assert_eq!(
            err,
            CatalogError::CyclicInheritance {
                cycle: vec!["B".into(), "A".into(), "B".into()]
            }
        );
        assert!(!catalog.contains(h("B")));
    }

    #[test]
    fn self_inheritance_rejected() {
        let mut catalog = Catalog::new();
        let err = catalog
            .register_type(TypeDescriptor::class("A").with_base(h("A")))
            .unwrap_err();
        assert!(matches!(err, CatalogError::CyclicInheritance { .. }));
    }

    #[test]
    fn interface_extension_cycle_rejected() {
        let mut catalog = Catalog::new();
        catalog
            .register_type(TypeDescriptor::interface("I1").conforms_to(h("I2")))
            .unwrap();
        let err = catalog
            .register_type(TypeDescriptor::interface("I2").conforms_to(h("I1")))
            .unwrap_err();
        assert!(matches!(err, CatalogError::CyclicInheritance { cycle } if cycle.len() == 3));
    }

    #[test]
    fn members_declared_on_excludes_inherited() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(
                TypeDescriptor::class("A")
                    .with_member(MemberSignature::method("f", vec![primitives::INT])),
            )
            .unwrap();
        catalog
            .register_type(
                TypeDescriptor::class("B")
                    .with_base(h("A"))
                    .with_member(MemberSignature::method("f", vec![primitives::DOUBLE])),
            )
            .unwrap();

        let declared = catalog.members_declared_on(h("B")).unwrap();
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].params, vec![primitives::DOUBLE]);
        assert!(catalog.members_declared_on(h("C")).is_err());
    }

    #[test]
    fn duplicate_member_rejected() {
        let mut catalog = Catalog::new();
        let err = catalog
            .register_type(
                TypeDescriptor::class("A")
                    .with_member(MemberSignature::method("f", vec![primitives::INT]))
                    .with_member(MemberSignature::method("f", vec![primitives::INT]).as_virtual()),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateMember { member, .. } if member == "f"));
    }

    #[test]
    fn overloads_by_arity_are_distinct_members() {
        let mut catalog = Catalog::new();
        catalog
            .register_type(
                TypeDescriptor::class("A")
                    .with_member(MemberSignature::method("f", vec![]))
                    .with_member(MemberSignature::method("f", vec![primitives::INT])),
            )
            .unwrap();
        assert_eq!(catalog.members_declared_on(h("A")).unwrap().len(), 2);
    }

    #[test]
    fn invalid_bases_rejected() {
        let mut catalog = Catalog::with_primitives();
        catalog.register_type(TypeDescriptor::interface("I")).unwrap();
        catalog
            .register_type(TypeDescriptor::class("Leaf").as_sealed())
            .unwrap();

        let from_interface = catalog.register_type(TypeDescriptor::class("A").with_base(h("I")));
        assert!(matches!(from_interface, Err(CatalogError::InvalidBase { .. })));

        let from_sealed = catalog.register_type(TypeDescriptor::class("B").with_base(h("Leaf")));
        assert!(matches!(from_sealed, Err(CatalogError::InvalidBase { reason, .. }) if reason == "base is sealed"));

        let value_with_base =
            catalog.register_type(TypeDescriptor::value("P").with_base(h("object")));
        assert!(matches!(value_with_base, Err(CatalogError::InvalidBase { .. })));
    }

    #[test]
    fn forward_reference_validated_on_arrival() {
        let mut catalog = Catalog::new();
        catalog
            .register_type(TypeDescriptor::class("A").conforms_to(h("Later")))
            .unwrap();
        assert_eq!(catalog.unresolved_references(), vec![(h("A"), h("Later"))]);

        let err = catalog
            .register_type(TypeDescriptor::class("Later"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConformance { .. }));

        catalog
            .register_type(TypeDescriptor::interface("Later"))
            .unwrap();
        assert!(catalog.unresolved_references().is_empty());
    }

    #[test]
    fn foreign_conformance_record_rejected() {
        let mut catalog = Catalog::new();
        catalog.register_type(TypeDescriptor::interface("I")).unwrap();
        let mut desc = TypeDescriptor::class("A");
        desc.conformances
            .push(ConformanceRecord::new(h("Other"), h("I")));
        let err = catalog.register_type(desc).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConformance { .. }));
    }

    #[test]
    fn generic_placeholders_registered() {
        let mut catalog = Catalog::with_primitives();
        catalog.register_type(TypeDescriptor::interface("IComparable")).unwrap();
        let param = GenericParam::new("Sorted", "T").with_constraint(h("IComparable"));
        catalog
            .register_type(TypeDescriptor::class("Sorted").with_generic_param(param.clone()))
            .unwrap();

        let placeholder = catalog.get(param.type_hash).unwrap();
        assert!(placeholder.kind.is_generic_parameter());
        assert!(catalog.conforms_to(param.type_hash, h("IComparable")));
    }

    #[test]
    fn user_conversions_indexed_by_source() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::class("Money").with_conversion(
                primitives::INT,
                h("Money"),
                true,
            ))
            .unwrap();
        let from_int = catalog.conversions_from(primitives::INT);
        assert_eq!(from_int.len(), 1);
        assert_eq!(from_int[0].to, h("Money"));
        assert!(catalog.conversions_from(primitives::DOUBLE).is_empty());
    }

    #[test]
    fn dependency_order_independent_of_registration_order() {
        let mut catalog = Catalog::with_primitives();
        catalog
            .register_type(TypeDescriptor::class("C").with_base(h("B")))
            .unwrap();
        catalog
            .register_type(TypeDescriptor::class("B").with_base(h("A")))
            .unwrap();
        catalog.register_type(TypeDescriptor::class("A")).unwrap();

        let order = catalog.dependency_order().unwrap();
        let pos = |name| order.iter().position(|&x| x == h(name)).unwrap();
        assert!(pos("A") < pos("B"));
        assert!(pos("B") < pos("C"));
        assert_eq!(order.len(), catalog.len());
    }

    #[test]
    fn implicit_root_base() {
        let mut catalog = Catalog::with_primitives();
        catalog.register_type(TypeDescriptor::class("A")).unwrap();
        assert_eq!(catalog.ancestors(h("A")), vec![primitives::OBJECT]);
        assert!(catalog.is_subclass_of(h("A"), primitives::OBJECT));
    }
}
