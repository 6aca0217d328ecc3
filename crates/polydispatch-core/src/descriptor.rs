//! Type descriptors.
//!
//! A [`TypeDescriptor`] records one type's kind, base, declared members,
//! conformance records and conversion operators. Descriptors are built with the
//! builder methods below and become immutable once registered in a catalog.

use crate::{
    ConformanceRecord, ConversionDecl, GenericOrigin, GenericParam, KindConstraint,
    MemberSignature, TypeFlags, TypeHash, TypeKind,
};

/// Immutable description of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Type name (`Shape`, `List<int>`).
    pub name: String,
    /// Type hash for identity.
    pub type_hash: TypeHash,
    /// Kind (class, interface, value type, generic parameter).
    pub kind: TypeKind,
    /// Modifiers.
    pub flags: TypeFlags,

    // === Hierarchy ===
    /// Base class (classes only, single inheritance).
    pub base: Option<TypeHash>,
    /// Conformance records declared at this level.
    pub conformances: Vec<ConformanceRecord>,

    // === Members ===
    /// Members declared directly on this type, in declaration order.
    pub members: Vec<MemberSignature>,
    /// Conversion operators declared on this type.
    pub conversions: Vec<ConversionDecl>,

    // === Generics ===
    /// Generic parameters (non-empty = open generic definition).
    pub generic_params: Vec<GenericParam>,
    /// Open definition and arguments, for specialized descriptors.
    pub origin: Option<GenericOrigin>,
    /// Kind restriction, for generic parameter placeholders.
    pub kind_constraint: KindConstraint,
}

impl TypeDescriptor {
    /// Create a descriptor of the given kind.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        let type_hash = TypeHash::from_name(&name);
        let flags = if kind.is_value() {
            TypeFlags::SEALED
        } else {
            TypeFlags::empty()
        };
        Self {
            name,
            type_hash,
            kind,
            flags,
            base: None,
            conformances: Vec::new(),
            members: Vec::new(),
            conversions: Vec::new(),
            generic_params: Vec::new(),
            origin: None,
            kind_constraint: KindConstraint::Any,
        }
    }

    /// Create a class descriptor.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Create an interface descriptor.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Create a value type descriptor (always sealed).
    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value)
    }

    /// Create the placeholder descriptor for a generic parameter of `owner`.
    ///
    /// Constraints become conformance records so that conversions and member
    /// lookup through the placeholder see exactly the declared capabilities.
    pub fn generic_parameter(owner: &str, param: &GenericParam) -> Self {
        let mut desc = Self::new(param.qualified_name(owner), TypeKind::GenericParameter);
        desc.type_hash = param.type_hash;
        desc.kind_constraint = param.kind;
        for &constraint in &param.constraints {
            desc.conformances
                .push(ConformanceRecord::new(param.type_hash, constraint));
        }
        desc
    }

    // === Builder Methods ===

    /// Set the base class.
    pub fn with_base(mut self, base: TypeHash) -> Self {
        self.base = Some(base);
        self
    }

    /// Declare conformance to an interface, matching members by signature.
    pub fn conforms_to(mut self, interface: TypeHash) -> Self {
        self.conformances
            .push(ConformanceRecord::new(self.type_hash, interface));
        self
    }

    /// Add a conformance record (its implementing type is set to this type).
    pub fn with_conformance(mut self, mut record: ConformanceRecord) -> Self {
        record.implementing = self.type_hash;
        self.conformances.push(record);
        self
    }

    /// Add a member (its declaring type is set to this type).
    pub fn with_member(mut self, member: MemberSignature) -> Self {
        self.members.push(member.declared_on(self.type_hash));
        self
    }

    /// Declare a conversion operator from `from` to `to`.
    pub fn with_conversion(mut self, from: TypeHash, to: TypeHash, implicit: bool) -> Self {
        self.conversions.push(ConversionDecl {
            from,
            to,
            implicit,
            declaring: self.type_hash,
        });
        self
    }

    /// Add a generic parameter (makes this an open generic definition).
    pub fn with_generic_param(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Mark as sealed.
    pub fn as_sealed(mut self) -> Self {
        self.flags |= TypeFlags::SEALED;
        self
    }

    /// Mark as abstract.
    pub fn as_abstract(mut self) -> Self {
        self.flags |= TypeFlags::ABSTRACT;
        self
    }

    /// Add arbitrary flags.
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    // === Query Methods ===

    /// Check if no subtypes may exist.
    pub fn is_sealed(&self) -> bool {
        self.kind.is_value() || self.flags.contains(TypeFlags::SEALED)
    }

    /// Check if this type is abstract.
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Check if this is an open generic definition.
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Check if this was produced by instantiating an open generic.
    pub fn is_instance(&self) -> bool {
        self.origin.is_some()
    }

    /// Members declared directly on this type with the given name.
    pub fn declared_members_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a MemberSignature> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }

    /// Find a declared member by its identity hash.
    pub fn member(&self, member_hash: TypeHash) -> Option<&MemberSignature> {
        self.members.iter().find(|m| m.member_hash() == member_hash)
    }

    /// Interfaces named by this level's conformance records.
    pub fn declared_interfaces(&self) -> impl Iterator<Item = TypeHash> + '_ {
        self.conformances.iter().map(|c| c.interface)
    }

    /// The conformance record for an interface at this level, if declared here.
    pub fn conformance_for(&self, interface: TypeHash) -> Option<&ConformanceRecord> {
        self.conformances.iter().find(|c| c.interface == interface)
    }
}
