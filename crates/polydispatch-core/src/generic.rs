//! Generic parameter declarations and instantiation origins.

use crate::TypeHash;

/// Kind constraint on a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KindConstraint {
    /// Any type argument.
    #[default]
    Any,
    /// Only reference-kind arguments (classes and interfaces).
    Reference,
    /// Only value-kind arguments.
    Value,
}

/// A generic parameter declared on an open type or an open member.
///
/// Constraints are explicit capability sets: each entry names an interface the
/// type argument must conform to. Members used through the parameter must be
/// declared on one of these interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParam {
    /// Parameter name (`T`).
    pub name: String,
    /// Identity of the placeholder type (`List::T`).
    pub type_hash: TypeHash,
    /// Interfaces every argument must conform to.
    pub constraints: Vec<TypeHash>,
    /// Reference/value restriction.
    pub kind: KindConstraint,
}

impl GenericParam {
    /// Create an unconstrained parameter owned by `owner` (a type or member name).
    pub fn new(owner: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let type_hash = TypeHash::from_name(&format!("{owner}::{name}"));
        Self {
            name,
            type_hash,
            constraints: Vec::new(),
            kind: KindConstraint::Any,
        }
    }

    /// Require the argument to conform to an interface.
    pub fn with_constraint(mut self, interface: TypeHash) -> Self {
        self.constraints.push(interface);
        self
    }

    /// Restrict the argument kind.
    pub fn with_kind(mut self, kind: KindConstraint) -> Self {
        self.kind = kind;
        self
    }

    /// Qualified placeholder name (`List::T`).
    pub fn qualified_name(&self, owner: &str) -> String {
        format!("{owner}::{}", self.name)
    }
}

/// Where a specialized descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericOrigin {
    /// The open definition.
    pub open: TypeHash,
    /// Concrete type arguments in declaration order.
    pub type_args: Vec<TypeHash>,
}
