//! Read-only type lookup shared by every phase.
//!
//! The catalog implements [`TypeLookup`] for registered types; the
//! instantiation manager layers specialized generic descriptors on top. All
//! hierarchy queries (ancestors, interface sets, assignability) are provided
//! methods built on three required lookups, so both layers answer them the
//! same way.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::{ConversionDecl, TypeDescriptor, TypeHash};

/// Lookup of type descriptors by identity.
pub trait TypeLookup {
    /// Get a descriptor by hash.
    fn lookup(&self, type_hash: TypeHash) -> Option<Arc<TypeDescriptor>>;

    /// The universal root reference type, if one is registered.
    fn root_type(&self) -> Option<TypeHash>;

    /// User-declared conversion operators whose source is `type_hash`.
    fn conversions_from(&self, type_hash: TypeHash) -> Vec<ConversionDecl>;

    // === Provided Queries ===

    /// Display name for a hash; falls back to the hash itself.
    fn type_name(&self, type_hash: TypeHash) -> String {
        self.lookup(type_hash)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| type_hash.to_string())
    }

    /// Check if the type is registered and value-kind.
    fn is_value_type(&self, type_hash: TypeHash) -> bool {
        self.lookup(type_hash).is_some_and(|d| d.kind.is_value())
    }

    /// Base type including the implicit root.
    ///
    /// Classes without an explicit base derive from the root type (except the
    /// root itself). Interfaces, value types and generic placeholders have no
    /// base.
    fn effective_base(&self, desc: &TypeDescriptor) -> Option<TypeHash> {
        if desc.base.is_some() {
            return desc.base;
        }
        if !desc.kind.is_class() {
            return None;
        }
        self.root_type().filter(|&root| root != desc.type_hash)
    }

    /// Base chain from the immediate base up to the root (excluding the type).
    fn ancestors(&self, type_hash: TypeHash) -> Vec<TypeHash> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(type_hash);
        let mut current = self.lookup(type_hash);
        while let Some(desc) = current {
            let Some(base) = self.effective_base(&desc) else {
                break;
            };
            if !seen.insert(base) {
                break;
            }
            chain.push(base);
            current = self.lookup(base);
        }
        chain
    }

    /// Check if `derived` strictly inherits from `base`.
    fn is_subclass_of(&self, derived: TypeHash, base: TypeHash) -> bool {
        derived != base && self.ancestors(derived).contains(&base)
    }

    /// Every interface the type conforms to, directly, through its ancestors
    /// or through interface extension. Ordered by first discovery.
    fn interfaces_of(&self, type_hash: TypeHash) -> Vec<TypeHash> {
        let mut result = Vec::new();
        let mut seen = FxHashSet::default();
        let mut pending: Vec<TypeHash> = Vec::new();

        let mut levels = vec![type_hash];
        levels.extend(self.ancestors(type_hash));
        for level in levels {
            if let Some(desc) = self.lookup(level) {
                pending.extend(desc.declared_interfaces());
            }
        }

        pending.reverse();
        while let Some(iface) = pending.pop() {
            if iface == type_hash || !seen.insert(iface) {
                continue;
            }
            result.push(iface);
            if let Some(desc) = self.lookup(iface) {
                let mut extended: Vec<_> = desc.declared_interfaces().collect();
                extended.reverse();
                pending.extend(extended);
            }
        }
        result
    }

    /// Check if the type conforms to an interface.
    fn conforms_to(&self, type_hash: TypeHash, interface: TypeHash) -> bool {
        self.interfaces_of(type_hash).contains(&interface)
    }

    /// Check if a reference to `from` may be used as `to` without any
    /// conversion (identity, base class, interface or root).
    fn is_reference_assignable(&self, from: TypeHash, to: TypeHash) -> bool {
        if from == to {
            return true;
        }
        let Some(desc) = self.lookup(from) else {
            return false;
        };
        if desc.kind.is_value() {
            return false;
        }
        if self.root_type() == Some(to) {
            return true;
        }
        self.is_subclass_of(from, to) || self.conforms_to(from, to)
    }

    /// Check if a value of `from` may be stored where `to` is expected,
    /// boxing value types when the target is a reference supertype.
    fn is_assignable_to(&self, from: TypeHash, to: TypeHash) -> bool {
        if from == to || self.is_reference_assignable(from, to) {
            return true;
        }
        self.is_value_type(from) && self.is_boxing_target(from, to)
    }

    /// Check if `to` is a reference supertype a value of `from` boxes into.
    fn is_boxing_target(&self, from: TypeHash, to: TypeHash) -> bool {
        self.root_type() == Some(to) || self.conforms_to(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;
    use rustc_hash::FxHashMap;

    struct MapLookup {
        types: FxHashMap<TypeHash, Arc<TypeDescriptor>>,
    }

    impl MapLookup {
        fn new(descs: Vec<TypeDescriptor>) -> Self {
            let types = descs
                .into_iter()
                .map(|d| (d.type_hash, Arc::new(d)))
                .collect();
            Self { types }
        }
    }

    impl TypeLookup for MapLookup {
        fn lookup(&self, type_hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
            self.types.get(&type_hash).cloned()
        }

        fn root_type(&self) -> Option<TypeHash> {
            Some(primitives::OBJECT)
        }

        fn conversions_from(&self, _type_hash: TypeHash) -> Vec<ConversionDecl> {
            Vec::new()
        }
    }

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn fixture() -> MapLookup {
        MapLookup::new(vec![
            TypeDescriptor::class("object"),
            TypeDescriptor::interface("IBase"),
            TypeDescriptor::interface("IDerived").conforms_to(h("IBase")),
            TypeDescriptor::class("A").conforms_to(h("IDerived")),
            TypeDescriptor::class("B").with_base(h("A")),
            TypeDescriptor::class("C").with_base(h("B")),
            TypeDescriptor::value("Point").conforms_to(h("IBase")),
        ])
    }

    #[test]
    fn ancestors_include_implicit_root() {
        let lookup = fixture();
        assert_eq!(lookup.ancestors(h("C")), vec![h("B"), h("A"), h("object")]);
        assert!(lookup.ancestors(h("object")).is_empty());
        assert!(lookup.ancestors(h("IBase")).is_empty());
    }

    #[test]
    fn interfaces_are_transitive() {
        let lookup = fixture();
        assert_eq!(lookup.interfaces_of(h("C")), vec![h("IDerived"), h("IBase")]);
        assert_eq!(lookup.interfaces_of(h("IDerived")), vec![h("IBase")]);
        assert!(lookup.conforms_to(h("B"), h("IBase")));
    }

    #[test]
    fn reference_assignability() {
        let lookup = fixture();
        assert!(lookup.is_reference_assignable(h("C"), h("A")));
        assert!(lookup.is_reference_assignable(h("C"), h("IBase")));
        assert!(lookup.is_reference_assignable(h("IBase"), h("object")));
        assert!(!lookup.is_reference_assignable(h("A"), h("C")));
        assert!(!lookup.is_reference_assignable(h("Point"), h("object")));
    }

    #[test]
    fn value_types_box_to_root_and_interfaces() {
        let lookup = fixture();
        assert!(lookup.is_assignable_to(h("Point"), h("object")));
        assert!(lookup.is_assignable_to(h("Point"), h("IBase")));
        assert!(!lookup.is_assignable_to(h("Point"), h("A")));
    }

    #[test]
    fn unknown_type_name_falls_back_to_hash() {
        let lookup = fixture();
        assert_eq!(lookup.type_name(h("A")), "A");
        assert_eq!(lookup.type_name(h("Nope")), h("Nope").to_string());
    }
}
