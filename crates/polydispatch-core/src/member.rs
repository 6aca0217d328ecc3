//! Member signatures.
//!
//! A member is uniquely identified by `(declaring type, name, parameter type
//! sequence)`; arity and parameter types distinguish overloads sharing a name.

use crate::{GenericParam, TypeHash, primitives};

/// How a member participates in virtual dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Virtuality {
    /// Bound directly; never occupies a virtual slot.
    #[default]
    NonVirtual,
    /// Introduces a new virtual slot.
    Virtual,
    /// Replaces the implementation in an inherited virtual slot.
    Override,
}

impl Virtuality {
    /// Check if calls through this member go through a virtual slot.
    pub fn is_dispatched(self) -> bool {
        !matches!(self, Virtuality::NonVirtual)
    }
}

/// Signature of a method declared on a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSignature {
    /// Member name.
    pub name: String,
    /// Parameter types in order.
    pub params: Vec<TypeHash>,
    /// Return type (`void` when nothing is produced).
    pub return_type: TypeHash,
    /// The type that declares this member.
    pub declaring: TypeHash,
    /// Dispatch flag.
    pub virtuality: Virtuality,
    /// Static members have no receiver.
    pub is_static: bool,
    /// Generic parameters of an open generic method.
    pub generic_params: Vec<GenericParam>,
}

impl MemberSignature {
    /// Create a non-virtual instance method returning `void`.
    ///
    /// The declaring type is filled in when the member is attached to a
    /// descriptor.
    pub fn method(name: impl Into<String>, params: Vec<TypeHash>) -> Self {
        Self {
            name: name.into(),
            params,
            return_type: primitives::VOID,
            declaring: TypeHash::EMPTY,
            virtuality: Virtuality::NonVirtual,
            is_static: false,
            generic_params: Vec::new(),
        }
    }

    /// Set the return type.
    pub fn returns(mut self, return_type: TypeHash) -> Self {
        self.return_type = return_type;
        self
    }

    /// Mark as introducing a virtual slot.
    pub fn as_virtual(mut self) -> Self {
        self.virtuality = Virtuality::Virtual;
        self
    }

    /// Mark as overriding an inherited virtual slot.
    pub fn as_override(mut self) -> Self {
        self.virtuality = Virtuality::Override;
        self
    }

    /// Mark as static.
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Add a generic parameter (makes this an open generic method).
    pub fn with_generic_param(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Set the declaring type.
    pub fn declared_on(mut self, declaring: TypeHash) -> Self {
        self.declaring = declaring;
        self
    }

    /// Unique identity of this member.
    pub fn member_hash(&self) -> TypeHash {
        TypeHash::from_member(self.declaring, &self.name, &self.params)
    }

    /// Owner-free slot key: `(name, parameter types)`.
    pub fn signature_hash(&self) -> TypeHash {
        TypeHash::from_signature(&self.name, &self.params)
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Check if this is an open generic method.
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Check if this member has the same slot key as `other`.
    pub fn same_signature(&self, other: &MemberSignature) -> bool {
        self.name == other.name && self.params == other.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_identity_includes_declaring_type() {
        let a = MemberSignature::method("f", vec![primitives::INT])
            .declared_on(TypeHash::from_name("A"));
        let b = MemberSignature::method("f", vec![primitives::INT])
            .declared_on(TypeHash::from_name("B"));

        assert_ne!(a.member_hash(), b.member_hash());
        assert_eq!(a.signature_hash(), b.signature_hash());
        assert!(a.same_signature(&b));
    }

    #[test]
    fn builder_flags() {
        let m = MemberSignature::method("area", vec![])
            .returns(primitives::DOUBLE)
            .as_virtual();
        assert_eq!(m.virtuality, Virtuality::Virtual);
        assert!(m.virtuality.is_dispatched());
        assert_eq!(m.return_type, primitives::DOUBLE);
        assert_eq!(m.arity(), 0);

        let s = MemberSignature::method("create", vec![]).as_static();
        assert!(s.is_static);
        assert!(!s.virtuality.is_dispatched());
    }
}
