//! Overload resolution.
//!
//! Binds a call site `(context type, name, argument types)` to exactly one
//! member. The binding is fixed at resolution time and never depends on the
//! receiver's runtime type.
//!
//! ## Candidate Search
//!
//! Only members declared directly on the search level are candidates. The
//! search starts at the context type and moves one level up (to the base)
//! only when a level has no member with the right name and arity, so adding
//! an overload to a base never changes what existing subtype call sites bind
//! to. Class searches never look at interfaces. Interface and generic
//! parameter contexts search their interfaces level by level, then the root.
//!
//! ## Ranking
//!
//! See [`ranking`]: specificity first, total conversion cost second.

pub mod ranking;

pub use ranking::{Candidate, Ranking, compare_specificity, rank};

use std::sync::Arc;

use polydispatch_core::{
    MemberSignature, ResolutionError, TypeDescriptor, TypeHash, TypeLookup,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::conversion::{Conversion, classify_conversion};
use crate::dispatch::slot_introducer;
use crate::generic::{SubstitutionMap, substitute_params, validate_type_args};

/// How a bound call reaches its implementation at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Calls the bound member itself (static, non-virtual or generic method).
    Direct,
    /// Indexes the receiver's virtual slot table.
    Virtual {
        /// The member that introduced the slot.
        slot: TypeHash,
    },
    /// Goes through the receiver's interface slot table.
    Interface {
        /// The interface declaring the member.
        interface: TypeHash,
        /// The interface member.
        member: TypeHash,
    },
}

/// Result of resolving a call site.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The static type the call was made through.
    pub context: TypeHash,
    /// The winning member as declared (open, for generic methods).
    pub member: Arc<MemberSignature>,
    /// Parameter types after generic argument inference.
    pub param_types: Vec<TypeHash>,
    /// Inferred method type arguments.
    pub type_args: Vec<TypeHash>,
    /// Conversion applied to each argument.
    pub conversions: Vec<Conversion>,
    /// Sum of the conversion costs.
    pub total_cost: u32,
    /// Dispatch mechanism.
    pub call_kind: CallKind,
}

impl Binding {
    /// Check if the bound member is an open generic method.
    pub fn is_generic_method(&self) -> bool {
        !self.type_args.is_empty()
    }
}

/// Options controlling resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Reject generic method candidates whose inferred arguments violate
    /// their capability or kind constraints.
    pub enforce_generic_constraints: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            enforce_generic_constraints: true,
        }
    }
}

/// Resolve a call with default options.
pub fn resolve_call<L: TypeLookup + ?Sized>(
    context: TypeHash,
    name: &str,
    arg_types: &[TypeHash],
    lookup: &L,
) -> Result<Binding, ResolutionError> {
    resolve_call_with(context, name, arg_types, lookup, ResolveOptions::default())
}

/// Resolve a call.
///
/// Fails with `UnknownType` if the context is not registered,
/// `NoApplicableOverload` if the first level with candidates has none that
/// accept the arguments, and `AmbiguousOverload` if ranking leaves a tie.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve_call_with<L: TypeLookup + ?Sized>(
    context: TypeHash,
    name: &str,
    arg_types: &[TypeHash],
    lookup: &L,
    options: ResolveOptions,
) -> Result<Binding, ResolutionError> {
    let context_desc = lookup
        .lookup(context)
        .ok_or_else(|| ResolutionError::UnknownType(context.to_string()))?;

    let members = collect_candidates(&context_desc, name, arg_types.len(), lookup);
    let candidates: Vec<Candidate> = members
        .iter()
        .filter_map(|m| applicable(m, arg_types, lookup, options))
        .collect();

    if candidates.is_empty() {
        return Err(ResolutionError::NoApplicableOverload {
            context: context_desc.name.clone(),
            name: name.to_string(),
            args: arg_types.iter().map(|&a| lookup.type_name(a)).collect(),
            candidates: members.iter().map(|m| describe(m, lookup)).collect(),
        });
    }

    let winner = match rank(&candidates, lookup) {
        Ranking::Best(index) => index,
        Ranking::Ambiguous(tied) => {
            return Err(ResolutionError::AmbiguousOverload {
                name: name.to_string(),
                candidates: tied
                    .into_iter()
                    .filter_map(|i| candidates.get(i))
                    .map(|c| describe(&c.member, lookup))
                    .collect(),
            });
        }
    };
    let Some(chosen) = candidates.into_iter().nth(winner) else {
        return Err(ResolutionError::UnknownType(name.to_string()));
    };

    let call_kind = call_kind(&chosen, lookup);
    trace!(
        context = %context_desc.name,
        name,
        member = %describe(&chosen.member, lookup),
        cost = chosen.total_cost,
        ?call_kind,
        "resolved call"
    );

    Ok(Binding {
        context,
        member: chosen.member,
        param_types: chosen.param_types,
        type_args: chosen.type_args,
        conversions: chosen.conversions,
        total_cost: chosen.total_cost,
        call_kind,
    })
}

// ============================================================================
// Candidate Collection
// ============================================================================

/// Members declared at the first search level that has any with the right
/// name and arity.
fn collect_candidates<L: TypeLookup + ?Sized>(
    context: &Arc<TypeDescriptor>,
    name: &str,
    arity: usize,
    lookup: &L,
) -> Vec<MemberSignature> {
    let declared = |desc: &TypeDescriptor| -> Vec<MemberSignature> {
        desc.declared_members_named(name)
            .filter(|m| m.arity() == arity)
            .cloned()
            .collect()
    };

    if context.kind.is_class() {
        let found = declared(context.as_ref());
        if !found.is_empty() {
            return found;
        }
        for ancestor in lookup.ancestors(context.type_hash) {
            let Some(desc) = lookup.lookup(ancestor) else {
                break;
            };
            let found = declared(desc.as_ref());
            if !found.is_empty() {
                return found;
            }
        }
        return Vec::new();
    }

    for level in interface_levels(context, lookup) {
        let found: Vec<_> = level
            .iter()
            .filter_map(|&hash| lookup.lookup(hash))
            .flat_map(|desc| declared(desc.as_ref()))
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Search levels for non-class contexts.
///
/// Interfaces start with themselves; generic parameter placeholders and value
/// types start with their declared members, then their constraint or
/// conformance interfaces. Each further level is the set of interfaces the
/// previous level extends. The root type comes last.
fn interface_levels<L: TypeLookup + ?Sized>(
    context: &TypeDescriptor,
    lookup: &L,
) -> Vec<Vec<TypeHash>> {
    let mut levels = vec![vec![context.type_hash]];
    let mut seen: FxHashSet<TypeHash> = FxHashSet::default();
    seen.insert(context.type_hash);

    let mut frontier: Vec<TypeHash> = context.declared_interfaces().collect();
    while !frontier.is_empty() {
        let level: Vec<_> = frontier.into_iter().filter(|&i| seen.insert(i)).collect();
        frontier = level
            .iter()
            .filter_map(|&i| lookup.lookup(i))
            .flat_map(|d| d.declared_interfaces().collect::<Vec<_>>())
            .collect();
        if !level.is_empty() {
            levels.push(level);
        }
    }

    if let Some(root) = lookup.root_type().filter(|r| seen.insert(*r)) {
        levels.push(vec![root]);
    }
    levels
}

// ============================================================================
// Applicability
// ============================================================================

fn applicable<L: TypeLookup + ?Sized>(
    member: &MemberSignature,
    arg_types: &[TypeHash],
    lookup: &L,
    options: ResolveOptions,
) -> Option<Candidate> {
    let (param_types, type_args) = if member.is_generic() {
        infer_type_args(member, arg_types, lookup, options)?
    } else {
        (member.params.clone(), Vec::new())
    };

    let conversions = arg_types
        .iter()
        .zip(&param_types)
        .map(|(&arg, &param)| {
            classify_conversion(arg, param, lookup)
                .ok()
                .filter(|c| c.is_implicit)
        })
        .collect::<Option<Vec<_>>>()?;
    let total_cost = conversions.iter().map(|c| c.cost).sum();

    Some(Candidate {
        member: Arc::new(member.clone()),
        param_types,
        type_args,
        conversions,
        total_cost,
    })
}

/// Bind each method type parameter to the exact type of the argument in the
/// first position that names it.
///
/// Returns `None` when a parameter is bound inconsistently, never bound, or
/// its inferred argument violates the parameter's constraints.
fn infer_type_args<L: TypeLookup + ?Sized>(
    member: &MemberSignature,
    arg_types: &[TypeHash],
    lookup: &L,
    options: ResolveOptions,
) -> Option<(Vec<TypeHash>, Vec<TypeHash>)> {
    let placeholders: FxHashSet<TypeHash> =
        member.generic_params.iter().map(|p| p.type_hash).collect();

    let mut inferred: FxHashMap<TypeHash, TypeHash> = FxHashMap::default();
    for (&param, &arg) in member.params.iter().zip(arg_types) {
        if !placeholders.contains(&param) {
            continue;
        }
        match inferred.get(&param) {
            Some(&bound) if bound != arg => return None,
            Some(_) => {}
            None => {
                inferred.insert(param, arg);
            }
        }
    }

    let type_args = member
        .generic_params
        .iter()
        .map(|p| inferred.get(&p.type_hash).copied())
        .collect::<Option<Vec<_>>>()?;

    let owner = format!("{}.{}", lookup.type_name(member.declaring), member.name);
    validate_type_args(
        &owner,
        &member.generic_params,
        &type_args,
        lookup,
        options.enforce_generic_constraints,
    )
    .ok()?;

    let map: SubstitutionMap = inferred;
    Some((substitute_params(&member.params, &map), type_args))
}

// ============================================================================
// Helpers
// ============================================================================

fn call_kind<L: TypeLookup + ?Sized>(chosen: &Candidate, lookup: &L) -> CallKind {
    let member = &chosen.member;
    if member.is_static || member.is_generic() {
        return CallKind::Direct;
    }
    if lookup
        .lookup(member.declaring)
        .is_some_and(|d| d.kind.is_interface())
    {
        return CallKind::Interface {
            interface: member.declaring,
            member: member.member_hash(),
        };
    }
    match slot_introducer(member, lookup) {
        Some(slot) => CallKind::Virtual { slot },
        None => CallKind::Direct,
    }
}

/// Diagnostic form of a member (`B.f(double)`).
pub fn describe<L: TypeLookup + ?Sized>(member: &MemberSignature, lookup: &L) -> String {
    let params: Vec<_> = member.params.iter().map(|&p| lookup.type_name(p)).collect();
    format!(
        "{}.{}({})",
        lookup.type_name(member.declaring),
        member.name,
        params.join(", ")
    )
}
