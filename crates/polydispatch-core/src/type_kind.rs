//! Type kind and descriptor flags.

use bitflags::bitflags;

/// Type kind determines memory semantics and which dispatch machinery applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeKind {
    /// Reference type with single inheritance, owns a virtual slot table.
    #[default]
    Class,
    /// Capability set; never instantiated, only conformed to.
    Interface,
    /// Value type - copied on assignment, promoted to the heap by boxing.
    /// Value types have no base and are implicitly sealed.
    Value,
    /// Placeholder for a type argument inside an open generic definition.
    GenericParameter,
}

impl TypeKind {
    /// Check if values of this kind are accessed through references.
    pub fn is_reference(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::Interface)
    }

    /// Check if this is a value type.
    pub fn is_value(self) -> bool {
        matches!(self, TypeKind::Value)
    }

    /// Check if this is a class.
    pub fn is_class(self) -> bool {
        matches!(self, TypeKind::Class)
    }

    /// Check if this is an interface.
    pub fn is_interface(self) -> bool {
        matches!(self, TypeKind::Interface)
    }

    /// Check if this is a generic parameter placeholder.
    pub fn is_generic_parameter(self) -> bool {
        matches!(self, TypeKind::GenericParameter)
    }

    /// Check if this kind gets its own dispatch tables (concrete runtime types).
    pub fn has_dispatch_tables(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::Value)
    }

    /// Human-readable name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Value => "value type",
            TypeKind::GenericParameter => "generic parameter",
        }
    }
}

bitflags! {
    /// Modifiers carried by a type descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u8 {
        /// No further subtypes may be declared.
        const SEALED = 1 << 0;
        /// Cannot be instantiated directly.
        const ABSTRACT = 1 << 1;
        /// Built-in primitive registered by the catalog.
        const PRIMITIVE = 1 << 2;
        /// Universal root of the reference hierarchy.
        const ROOT = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kinds() {
        assert!(TypeKind::Class.is_reference());
        assert!(TypeKind::Interface.is_reference());
        assert!(!TypeKind::Value.is_reference());
        assert!(!TypeKind::GenericParameter.is_reference());
    }

    #[test]
    fn only_concrete_kinds_get_tables() {
        assert!(TypeKind::Class.has_dispatch_tables());
        assert!(TypeKind::Value.has_dispatch_tables());
        assert!(!TypeKind::Interface.has_dispatch_tables());
        assert!(!TypeKind::GenericParameter.has_dispatch_tables());
    }

    #[test]
    fn flags_combine() {
        let flags = TypeFlags::SEALED | TypeFlags::PRIMITIVE;
        assert!(flags.contains(TypeFlags::SEALED));
        assert!(!flags.contains(TypeFlags::ABSTRACT));
    }
}
