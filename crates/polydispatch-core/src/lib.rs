//! Polydispatch core types.
//!
//! Identities, descriptors and the error taxonomy shared by every crate of the
//! dispatch runtime.
//!
//! ## Modules
//!
//! - [`type_hash`]: Stable xxh64 identities for types, members and instances
//! - [`type_kind`]: Type kinds and modifier flags
//! - [`descriptor`]: Immutable type descriptors
//! - [`member`]: Member signatures and virtuality
//! - [`conformance`]: Interface conformance records and conversion operators
//! - [`generic`]: Generic parameters and instantiation origins
//! - [`value`]: Runtime values and object handles
//! - [`lookup`]: The [`TypeLookup`] trait and hierarchy queries
//! - [`error`]: Errors for every phase

pub mod conformance;
pub mod descriptor;
pub mod error;
pub mod generic;
pub mod lookup;
pub mod member;
pub mod type_hash;
pub mod type_kind;
pub mod value;

pub use conformance::{ConformanceRecord, ConversionDecl};
pub use descriptor::TypeDescriptor;
pub use error::{
    CatalogError, ConversionError, DispatchError, Error, InstantiationError, ResolutionError,
    RuntimeError,
};
pub use generic::{GenericOrigin, GenericParam, KindConstraint};
pub use lookup::TypeLookup;
pub use member::{MemberSignature, Virtuality};
pub use type_hash::{TypeHash, hash_constants, primitives};
pub use type_kind::{TypeFlags, TypeKind};
pub use value::{ObjectHandle, StructValue, Value};

/// Result alias using the top-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
