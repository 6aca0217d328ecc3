//! Candidate ranking.
//!
//! Specificity is decided per parameter position: one parameter type is
//! narrower than another when it converts implicitly to the other and not the
//! other way round. Specificity always outranks conversion cost; cost only
//! breaks ties between candidates of equal specificity.

use std::cmp::Ordering;
use std::sync::Arc;

use polydispatch_core::{MemberSignature, TypeHash, TypeLookup};

use crate::conversion::{Conversion, can_implicitly_convert};

/// An applicable candidate with the conversions its arguments need.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The member as declared.
    pub member: Arc<MemberSignature>,
    /// Parameter types after generic argument inference.
    pub param_types: Vec<TypeHash>,
    /// Inferred method type arguments (empty for non-generic members).
    pub type_args: Vec<TypeHash>,
    /// One conversion per argument.
    pub conversions: Vec<Conversion>,
    /// Sum of the conversion costs.
    pub total_cost: u32,
}

/// Outcome of ranking a non-empty applicable set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ranking {
    /// Index of the single best candidate.
    Best(usize),
    /// Indices of the candidates that remain tied.
    Ambiguous(Vec<usize>),
}

/// Compare two candidates by specificity.
///
/// Returns `Some(Less)` when `a` is more specific, `Some(Greater)` when `b`
/// is, `Some(Equal)` when neither is narrower at any position and `None` when
/// each is narrower at a different position.
pub fn compare_specificity<L: TypeLookup + ?Sized>(
    a: &[TypeHash],
    b: &[TypeHash],
    lookup: &L,
) -> Option<Ordering> {
    let mut a_wins = false;
    let mut b_wins = false;
    for (&pa, &pb) in a.iter().zip(b) {
        if pa == pb {
            continue;
        }
        let a_to_b = can_implicitly_convert(pa, pb, lookup);
        let b_to_a = can_implicitly_convert(pb, pa, lookup);
        match (a_to_b, b_to_a) {
            (true, false) => a_wins = true,
            (false, true) => b_wins = true,
            _ => {}
        }
    }
    match (a_wins, b_wins) {
        (true, true) => None,
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => Some(Ordering::Equal),
    }
}

/// Pick the best candidate.
pub fn rank<L: TypeLookup + ?Sized>(candidates: &[Candidate], lookup: &L) -> Ranking {
    // Keep every candidate no other candidate is strictly more specific than.
    let undominated: Vec<usize> = (0..candidates.len())
        .filter(|&i| {
            !(0..candidates.len()).any(|j| {
                j != i
                    && compare_specificity(
                        &candidates[j].param_types,
                        &candidates[i].param_types,
                        lookup,
                    ) == Some(Ordering::Less)
            })
        })
        .collect();

    if let [only] = undominated.as_slice() {
        return Ranking::Best(*only);
    }

    // Crossed specificity among survivors cannot be settled by cost.
    for (n, &i) in undominated.iter().enumerate() {
        for &j in &undominated[n + 1..] {
            let order = compare_specificity(
                &candidates[i].param_types,
                &candidates[j].param_types,
                lookup,
            );
            if order.is_none() {
                return Ranking::Ambiguous(undominated);
            }
        }
    }

    let Some(best_cost) = undominated.iter().map(|&i| candidates[i].total_cost).min() else {
        return Ranking::Ambiguous(undominated);
    };
    let cheapest: Vec<usize> = undominated
        .into_iter()
        .filter(|&i| candidates[i].total_cost == best_cost)
        .collect();
    match cheapest.as_slice() {
        [only] => Ranking::Best(*only),
        _ => Ranking::Ambiguous(cheapest),
    }
}
