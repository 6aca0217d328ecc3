//! Type substitution for generic instantiation.
//!
//! Replaces generic parameter placeholders with concrete type arguments in
//! member signatures, conformance records and conversion operators.

use polydispatch_core::{
    ConformanceRecord, ConversionDecl, GenericParam, InstantiationError, MemberSignature, TypeHash,
};
use rustc_hash::FxHashMap;

/// Map from placeholder hash to concrete type.
pub type SubstitutionMap = FxHashMap<TypeHash, TypeHash>;

/// Build a substitution map from generic parameters and type arguments.
///
/// # Errors
/// Returns `ArityMismatch` if the number of arguments doesn't match.
pub fn build_substitution_map(
    owner: &str,
    params: &[GenericParam],
    type_args: &[TypeHash],
) -> Result<SubstitutionMap, InstantiationError> {
    if params.len() != type_args.len() {
        return Err(InstantiationError::ArityMismatch {
            name: owner.to_string(),
            expected: params.len(),
            got: type_args.len(),
        });
    }

    Ok(params
        .iter()
        .map(|p| p.type_hash)
        .zip(type_args.iter().copied())
        .collect())
}

/// Substitute a single type.
pub fn substitute_type(hash: TypeHash, map: &SubstitutionMap) -> TypeHash {
    map.get(&hash).copied().unwrap_or(hash)
}

/// Substitute every type in a parameter list.
pub fn substitute_params(params: &[TypeHash], map: &SubstitutionMap) -> Vec<TypeHash> {
    params.iter().map(|&p| substitute_type(p, map)).collect()
}

/// Substitute a member's signature and move it onto `declaring`.
///
/// Generic parameters bound by `map` are removed from the member; its own
/// unbound generic parameters (a generic method inside a generic type) stay.
pub fn substitute_member(
    member: &MemberSignature,
    map: &SubstitutionMap,
    declaring: TypeHash,
) -> MemberSignature {
    MemberSignature {
        name: member.name.clone(),
        params: substitute_params(&member.params, map),
        return_type: substitute_type(member.return_type, map),
        declaring,
        virtuality: member.virtuality,
        is_static: member.is_static,
        generic_params: member
            .generic_params
            .iter()
            .filter(|p| !map.contains_key(&p.type_hash))
            .cloned()
            .collect(),
    }
}

/// Substitute a conformance record and move it onto `implementing`.
///
/// Explicit implementation mappings are keyed by member hash, which changes
/// with the declaring type, so `member_map` translates open member hashes to
/// instance member hashes.
pub fn substitute_conformance(
    record: &ConformanceRecord,
    map: &SubstitutionMap,
    implementing: TypeHash,
    member_map: &FxHashMap<TypeHash, TypeHash>,
) -> ConformanceRecord {
    let mut result = ConformanceRecord::new(implementing, substitute_type(record.interface, map));
    for (&iface_member, &implementation) in &record.implementations {
        let implementation = member_map
            .get(&implementation)
            .copied()
            .unwrap_or(implementation);
        result = result.with_implementation(iface_member, implementation);
    }
    result
}

/// Substitute a conversion operator and move it onto `declaring`.
pub fn substitute_conversion(
    decl: &ConversionDecl,
    map: &SubstitutionMap,
    declaring: TypeHash,
) -> ConversionDecl {
    ConversionDecl {
        from: substitute_type(decl.from, map),
        to: substitute_type(decl.to, map),
        implicit: decl.implicit,
        declaring,
    }
}
