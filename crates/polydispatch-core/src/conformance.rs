//! Interface conformance records and user-declared conversions.

use rustc_hash::FxHashMap;

use crate::TypeHash;

/// One declaration of interface conformance at one point in a hierarchy.
///
/// A subtype that re-declares conformance to an interface its base already
/// conforms to gets its own record; the base's record is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceRecord {
    /// The type declaring conformance.
    pub implementing: TypeHash,
    /// The interface conformed to.
    pub interface: TypeHash,
    /// Explicit interface member → implementation member mapping.
    ///
    /// Interface members absent from the map are matched by name and
    /// parameter types when dispatch tables are built.
    pub implementations: FxHashMap<TypeHash, TypeHash>,
}

impl ConformanceRecord {
    /// Declare conformance with signature-based matching only.
    pub fn new(implementing: TypeHash, interface: TypeHash) -> Self {
        Self {
            implementing,
            interface,
            implementations: FxHashMap::default(),
        }
    }

    /// Map an interface member to a specific implementation member.
    pub fn with_implementation(mut self, interface_member: TypeHash, implementation: TypeHash) -> Self {
        self.implementations.insert(interface_member, implementation);
        self
    }

    /// Explicit implementation for an interface member, if one was declared.
    pub fn explicit_implementation(&self, interface_member: TypeHash) -> Option<TypeHash> {
        self.implementations.get(&interface_member).copied()
    }
}

/// A programmer-declared conversion operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionDecl {
    /// Source type.
    pub from: TypeHash,
    /// Target type.
    pub to: TypeHash,
    /// Implicit conversions may be applied during overload resolution;
    /// explicit ones only on request.
    pub implicit: bool,
    /// The type that declares the operator.
    pub declaring: TypeHash,
}

impl ConversionDecl {
    /// Identity of the operator as a member.
    pub fn member_hash(&self) -> TypeHash {
        let name = if self.implicit { "op_Implicit" } else { "op_Explicit" };
        TypeHash::from_member(self.declaring, name, &[self.from, self.to])
    }
}
