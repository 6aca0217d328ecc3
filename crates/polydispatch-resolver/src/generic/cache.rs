//! Instantiation cache.
//!
//! Insert-if-absent storage with a winner-runs-initializer discipline: the
//! first caller for a key installs an empty `OnceLock` cell and fills it,
//! concurrent callers for the same key wait on that cell, and later callers
//! only take the read lock.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use polydispatch_core::{ConversionDecl, TypeHash};
use rustc_hash::FxHashMap;

use super::specialization::{Instantiation, Specialization};

/// Cache key: open definition plus ordered type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    /// Open type hash or open member hash.
    pub open: TypeHash,
    /// Concrete type arguments.
    pub type_args: Vec<TypeHash>,
}

impl InstanceKey {
    /// Create a key.
    pub fn new(open: TypeHash, type_args: &[TypeHash]) -> Self {
        Self {
            open,
            type_args: type_args.to_vec(),
        }
    }
}

/// Key of a specialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecKey {
    /// Every all-reference instantiation of an open definition.
    Shared(TypeHash),
    /// One exact argument list containing a value type.
    Exact(InstanceKey),
}

type Cell<T> = Arc<OnceLock<Arc<T>>>;

/// Process-lifetime cache of instantiations and specializations.
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: RwLock<FxHashMap<InstanceKey, Cell<Instantiation>>>,
    specializations: RwLock<FxHashMap<SpecKey, Cell<Specialization>>>,
    by_hash: RwLock<FxHashMap<TypeHash, Arc<Instantiation>>>,
    member_origins: RwLock<FxHashMap<TypeHash, TypeHash>>,
    conversions: RwLock<FxHashMap<TypeHash, Vec<ConversionDecl>>>,
}

impl InstanceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a completed instantiation.
    pub fn get(&self, key: &InstanceKey) -> Option<Arc<Instantiation>> {
        let instances = self.instances.read().unwrap_or_else(PoisonError::into_inner);
        instances.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Get or install the cell for a key.
    pub fn instance_cell(&self, key: &InstanceKey) -> Cell<Instantiation> {
        {
            let instances = self.instances.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = instances.get(key) {
                return Arc::clone(cell);
            }
        }
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(instances.entry(key.clone()).or_default())
    }

    /// Get or install the cell for a specialization.
    pub fn specialization_cell(&self, key: &SpecKey) -> Cell<Specialization> {
        {
            let specs = self
                .specializations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = specs.get(key) {
                return Arc::clone(cell);
            }
        }
        let mut specs = self
            .specializations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(specs.entry(key.clone()).or_default())
    }

    /// Make a freshly created instantiation visible by hash.
    pub fn publish(&self, instance: &Arc<Instantiation>, conversions: &[ConversionDecl]) {
        self.by_hash
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(instance.instance_hash)
            .or_insert_with(|| Arc::clone(instance));

        self.member_origins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(instance.member_origins.iter().map(|(&k, &v)| (k, v)));

        if !conversions.is_empty() {
            let mut by_source = self.conversions.write().unwrap_or_else(PoisonError::into_inner);
            for decl in conversions {
                by_source.entry(decl.from).or_default().push(*decl);
            }
        }
    }

    /// Look up an instantiation by its instance hash.
    pub fn by_hash(&self, hash: TypeHash) -> Option<Arc<Instantiation>> {
        self.by_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hash)
            .cloned()
    }

    /// Open member a specialized member was produced from.
    pub fn member_origin(&self, member: TypeHash) -> Option<TypeHash> {
        self.member_origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&member)
            .copied()
    }

    /// Conversion operators declared on instances, by source type.
    pub fn conversions_from(&self, source: TypeHash) -> Vec<ConversionDecl> {
        self.conversions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of completed instantiations.
    pub fn instance_count(&self) -> usize {
        self.by_hash.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of specializations created.
    pub fn specialization_count(&self) -> usize {
        self.specializations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }
}
