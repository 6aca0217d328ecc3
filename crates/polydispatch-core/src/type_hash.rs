//! Deterministic hash-based identity for types and members.
//!
//! [`TypeHash`] is a 64-bit hash computed from names and signatures. Because the
//! hash of a type is known before the type is registered, descriptors may refer
//! to bases and interfaces that arrive later, and the outcome of registration
//! never depends on the order in which unrelated types are added.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so that a type, a member
//! and a slot signature sharing a name still produce distinct hashes.
//!
//! # Examples
//!
//! ```
//! use polydispatch_core::TypeHash;
//!
//! let int_hash = TypeHash::from_name("int");
//! assert_eq!(int_hash, TypeHash::from_name("int"));
//!
//! let owner = TypeHash::from_name("Shape");
//! let a = TypeHash::from_member(owner, "scale", &[TypeHash::from_name("int")]);
//! let b = TypeHash::from_member(owner, "scale", &[TypeHash::from_name("double")]);
//! assert_ne!(a, b);
//! ```

use std::fmt;
use xxhash_rust::const_xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant used when folding parameter lists.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for member hashes (owner + name + params).
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for owner-free slot signatures (name + params).
    pub const SIGNATURE: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for generic instantiation hashes.
    pub const INSTANCE: u64 = 0x9a7f3d5e2b8c4601;

    /// Parameter position mixing constants.
    /// Each position gets its own constant so that parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x0f1e2d3c4b5a6978,
    ];
}

/// A deterministic 64-bit hash identifying a type, member or slot signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    ///
    /// This is a `const fn`, so well-known types can be named by constants.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a member hash from the declaring type, member name and parameter types.
    ///
    /// This is the unique identity of a member: `(declaring type, name, parameter
    /// type sequence)`. Parameter order matters.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::MEMBER ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(fold_params(seed, param_hashes))
    }

    /// Create an owner-free signature hash from a member name and parameter types.
    ///
    /// Two members with the same signature hash occupy the same virtual slot key,
    /// which is how an override finds the slot it replaces.
    #[inline]
    pub fn from_signature(name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::SIGNATURE ^ xxh64(name.as_bytes(), 0);
        TypeHash(fold_params(seed, param_hashes))
    }

    /// Create the hash of a generic instantiation from the open definition and
    /// its type arguments. Argument order matters.
    #[inline]
    pub fn from_instance(open: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(fold_params(hash_constants::INSTANCE ^ open.0, args))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

#[inline]
fn fold_params(seed: u64, params: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, param) in params.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the fold order-sensitive (XOR alone would commute)
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Well-known hashes for the built-in types.
pub mod primitives {
    use super::TypeHash;

    /// `void`, used as the return type of members that produce nothing.
    pub const VOID: TypeHash = TypeHash::from_name("void");
    /// `bool`
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    /// `char`
    pub const CHAR: TypeHash = TypeHash::from_name("char");
    /// `int` (32-bit signed integer)
    pub const INT: TypeHash = TypeHash::from_name("int");
    /// `long` (64-bit signed integer)
    pub const LONG: TypeHash = TypeHash::from_name("long");
    /// `float` (32-bit)
    pub const FLOAT: TypeHash = TypeHash::from_name("float");
    /// `double` (64-bit)
    pub const DOUBLE: TypeHash = TypeHash::from_name("double");
    /// `string`, a sealed reference type.
    pub const STRING: TypeHash = TypeHash::from_name("string");
    /// The default universal root reference type.
    pub const OBJECT: TypeHash = TypeHash::from_name("object");
}
