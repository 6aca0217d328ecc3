//! Generic instantiation.
//!
//! Produces and caches specialized descriptors for open generic types and
//! open generic methods.
//!
//! ## Sharing Rules
//!
//! - Every instantiation whose type arguments are all reference types shares
//!   one specialization (one descriptor, one static state block) per open
//!   definition. Each argument list still gets its own [`Instantiation`]
//!   carrying the exact argument bookkeeping.
//! - Any value-type argument makes the full `(open, args)` tuple the key: the
//!   instantiation gets an independent descriptor and static state.
//!
//! ## Components
//!
//! - [`InstanceCache`]: insert-if-absent cache safe under concurrent first use
//! - [`SubstitutionMap`]: maps placeholders to concrete types
//! - [`validate_type_args`]: arity, kind and capability checks
//! - [`Specialization`] / [`StaticState`]: shared code and once-guarded statics
//! - [`Universe`]: catalog plus instances behind one [`TypeLookup`]

mod cache;
mod specialization;
mod substitution;
mod validation;

pub use cache::{InstanceCache, InstanceKey, SpecKey};
pub use specialization::{
    Instantiation, Specialization, Specialized, StaticInitializer, StaticState,
};
pub use substitution::{
    SubstitutionMap, build_substitution_map, substitute_conformance, substitute_conversion,
    substitute_member, substitute_params, substitute_type,
};
pub use validation::validate_type_args;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use polydispatch_catalog::Catalog;
use polydispatch_core::{
    ConversionDecl, GenericOrigin, GenericParam, InstantiationError, MemberSignature,
    TypeDescriptor, TypeHash, TypeLookup,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// What is being instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericTarget {
    /// An open generic type.
    Type(TypeHash),
    /// An open generic method declared on `owner`.
    Method {
        /// The declaring type.
        owner: TypeHash,
        /// The open member's hash.
        member: TypeHash,
    },
}

impl GenericTarget {
    /// Identity of the open definition used in cache keys.
    pub fn open_hash(self) -> TypeHash {
        match self {
            GenericTarget::Type(hash) => hash,
            GenericTarget::Method { member, .. } => member,
        }
    }
}

/// The resolved open definition.
enum OpenDefinition {
    Type(Arc<TypeDescriptor>),
    Method {
        owner: Arc<TypeDescriptor>,
        member: MemberSignature,
    },
}

impl OpenDefinition {
    fn name(&self) -> String {
        match self {
            OpenDefinition::Type(desc) => desc.name.clone(),
            OpenDefinition::Method { owner, member } => format!("{}.{}", owner.name, member.name),
        }
    }

    fn params(&self) -> &[GenericParam] {
        match self {
            OpenDefinition::Type(desc) => &desc.generic_params,
            OpenDefinition::Method { member, .. } => &member.generic_params,
        }
    }
}

/// A built specialized definition plus its bookkeeping.
struct Built {
    specialized: Specialized,
    instance_hash: TypeHash,
    member_origins: FxHashMap<TypeHash, TypeHash>,
    conversions: Vec<ConversionDecl>,
}

/// Creates and caches generic instantiations.
///
/// Shared behind an `Arc` once the build phase is over; every method takes
/// `&self`.
#[derive(Default)]
pub struct InstantiationManager {
    cache: InstanceCache,
    initializers: FxHashMap<TypeHash, StaticInitializer>,
    enforce_constraints: bool,
    created: AtomicUsize,
    next_specialization: AtomicUsize,
}

impl std::fmt::Debug for InstantiationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantiationManager")
            .field("cache", &self.cache)
            .field("initializers", &self.initializers.len())
            .field("enforce_constraints", &self.enforce_constraints)
            .field("created", &self.created)
            .finish()
    }
}

impl InstantiationManager {
    /// Create a manager.
    pub fn new(enforce_constraints: bool) -> Self {
        Self {
            enforce_constraints,
            ..Self::default()
        }
    }

    /// Register the static initializer of an open definition.
    pub fn with_initializer(mut self, open: TypeHash, init: StaticInitializer) -> Self {
        self.initializers.insert(open, init);
        self
    }

    /// Instantiate an open generic type or method.
    ///
    /// Validation (arity, kind and capability constraints) runs before the
    /// cache is touched. The first caller for a key creates the
    /// instantiation; concurrent callers wait for it and then share it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn instantiate<L: TypeLookup + ?Sized>(
        &self,
        target: GenericTarget,
        type_args: &[TypeHash],
        lookup: &L,
    ) -> Result<Arc<Instantiation>, InstantiationError> {
        let key = InstanceKey::new(target.open_hash(), type_args);
        if let Some(existing) = self.cache.get(&key) {
            return Ok(existing);
        }

        let open = resolve_open(target, lookup)?;
        let owner_name = open.name();
        validate_type_args(
            &owner_name,
            open.params(),
            type_args,
            lookup,
            self.enforce_constraints,
        )?;
        let map = build_substitution_map(&owner_name, open.params(), type_args)?;

        let cell = self.cache.instance_cell(&key);
        let instance = cell.get_or_init(|| self.create(&key, &open, &map, lookup));
        Ok(Arc::clone(instance))
    }

    fn create<L: TypeLookup + ?Sized>(
        &self,
        key: &InstanceKey,
        open: &OpenDefinition,
        map: &SubstitutionMap,
        lookup: &L,
    ) -> Arc<Instantiation> {
        let shared = key.type_args.iter().all(|&arg| !lookup.is_value_type(arg));
        let view = build(open, &key.type_args, map, lookup);

        let spec_key = if shared {
            SpecKey::Shared(key.open)
        } else {
            SpecKey::Exact(key.clone())
        };
        let spec_cell = self.cache.specialization_cell(&spec_key);
        let specialization = Arc::clone(spec_cell.get_or_init(|| {
            let specialized = if shared {
                let canonical = canonical_args(open.params(), lookup);
                let canonical_map: SubstitutionMap = open
                    .params()
                    .iter()
                    .map(|p| p.type_hash)
                    .zip(canonical.iter().copied())
                    .collect();
                build(open, &canonical, &canonical_map, lookup).specialized
            } else {
                clone_specialized(&view.specialized)
            };
            Arc::new(Specialization::new(
                self.next_specialization.fetch_add(1, Ordering::Relaxed),
                key.open,
                shared,
                specialized,
                self.initializers.get(&key.open).cloned(),
            ))
        }));

        let instance = Arc::new(Instantiation {
            open: key.open,
            type_args: key.type_args.clone(),
            instance_hash: view.instance_hash,
            view: view.specialized,
            member_origins: view.member_origins,
            specialization,
        });
        self.cache.publish(&instance, &view.conversions);
        self.created.fetch_add(1, Ordering::Relaxed);

        debug!(
            instance = %instance_name(open, &key.type_args, lookup),
            shared,
            specialization = instance.specialization.id,
            "instantiated generic"
        );
        instance
    }

    /// Look up a completed instantiation by instance hash.
    pub fn instance(&self, instance_hash: TypeHash) -> Option<Arc<Instantiation>> {
        self.cache.by_hash(instance_hash)
    }

    /// Open member a specialized member was produced from.
    pub fn member_origin(&self, member: TypeHash) -> Option<TypeHash> {
        self.cache.member_origin(member)
    }

    /// Number of instantiations created so far.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of specializations created so far.
    pub fn specialization_count(&self) -> usize {
        self.cache.specialization_count()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }
}

fn resolve_open<L: TypeLookup + ?Sized>(
    target: GenericTarget,
    lookup: &L,
) -> Result<OpenDefinition, InstantiationError> {
    match target {
        GenericTarget::Type(hash) => {
            let desc = lookup
                .lookup(hash)
                .ok_or_else(|| InstantiationError::UnknownType(hash.to_string()))?;
            if !desc.is_generic() {
                return Err(InstantiationError::NotGeneric(desc.name.clone()));
            }
            Ok(OpenDefinition::Type(desc))
        }
        GenericTarget::Method { owner, member } => {
            let owner_desc = lookup
                .lookup(owner)
                .ok_or_else(|| InstantiationError::UnknownType(owner.to_string()))?;
            let open = owner_desc
                .member(member)
                .cloned()
                .ok_or_else(|| InstantiationError::UnknownType(member.to_string()))?;
            if !open.is_generic() {
                return Err(InstantiationError::NotGeneric(format!(
                    "{}.{}",
                    owner_desc.name, open.name
                )));
            }
            Ok(OpenDefinition::Method {
                owner: owner_desc,
                member: open,
            })
        }
    }
}

fn instance_name<L: TypeLookup + ?Sized>(
    open: &OpenDefinition,
    type_args: &[TypeHash],
    lookup: &L,
) -> String {
    let base = match open {
        OpenDefinition::Type(desc) => desc.name.as_str(),
        OpenDefinition::Method { member, .. } => member.name.as_str(),
    };
    format_instance_name(base, type_args, lookup)
}

/// Format an instance name (`Map<string, int>`).
pub fn format_instance_name<L: TypeLookup + ?Sized>(
    base: &str,
    type_args: &[TypeHash],
    lookup: &L,
) -> String {
    let args: Vec<_> = type_args.iter().map(|&a| lookup.type_name(a)).collect();
    format!("{base}<{}>", args.join(", "))
}

/// Arguments standing in for "any reference type" in the shared specialization.
fn canonical_args<L: TypeLookup + ?Sized>(params: &[GenericParam], lookup: &L) -> Vec<TypeHash> {
    params
        .iter()
        .map(|p| lookup.root_type().unwrap_or(p.type_hash))
        .collect()
}

fn clone_specialized(specialized: &Specialized) -> Specialized {
    match specialized {
        Specialized::Type(desc) => Specialized::Type(Arc::clone(desc)),
        Specialized::Method(member) => Specialized::Method(Arc::clone(member)),
    }
}

fn build<L: TypeLookup + ?Sized>(
    open: &OpenDefinition,
    type_args: &[TypeHash],
    map: &SubstitutionMap,
    lookup: &L,
) -> Built {
    match open {
        OpenDefinition::Type(desc) => build_type(desc, type_args, map, lookup),
        OpenDefinition::Method { owner, member } => {
            build_method(owner, member, type_args, map, lookup)
        }
    }
}

fn build_type<L: TypeLookup + ?Sized>(
    open: &TypeDescriptor,
    type_args: &[TypeHash],
    map: &SubstitutionMap,
    lookup: &L,
) -> Built {
    let instance_hash = TypeHash::from_instance(open.type_hash, type_args);

    let mut member_origins = FxHashMap::default();
    let members: Vec<_> = open
        .members
        .iter()
        .map(|m| {
            let specialized = substitute_member(m, map, instance_hash);
            member_origins.insert(specialized.member_hash(), m.member_hash());
            specialized
        })
        .collect();

    let by_open: FxHashMap<_, _> = member_origins.iter().map(|(&k, &v)| (v, k)).collect();
    let conformances = open
        .conformances
        .iter()
        .map(|r| substitute_conformance(r, map, instance_hash, &by_open))
        .collect();
    let conversions: Vec<_> = open
        .conversions
        .iter()
        .map(|c| substitute_conversion(c, map, instance_hash))
        .collect();

    let desc = TypeDescriptor {
        name: format_instance_name(&open.name, type_args, lookup),
        type_hash: instance_hash,
        kind: open.kind,
        flags: open.flags,
        base: open.base.map(|b| substitute_type(b, map)),
        conformances,
        members,
        conversions: conversions.clone(),
        generic_params: Vec::new(),
        origin: Some(GenericOrigin {
            open: open.type_hash,
            type_args: type_args.to_vec(),
        }),
        kind_constraint: open.kind_constraint,
    };

    Built {
        specialized: Specialized::Type(Arc::new(desc)),
        instance_hash,
        member_origins,
        conversions,
    }
}

fn build_method<L: TypeLookup + ?Sized>(
    owner: &TypeDescriptor,
    open: &MemberSignature,
    type_args: &[TypeHash],
    map: &SubstitutionMap,
    lookup: &L,
) -> Built {
    let open_hash = open.member_hash();
    let mut specialized = substitute_member(open, map, owner.type_hash);
    specialized.name = format_instance_name(&open.name, type_args, lookup);

    let mut member_origins = FxHashMap::default();
    member_origins.insert(specialized.member_hash(), open_hash);

    Built {
        specialized: Specialized::Method(Arc::new(specialized)),
        instance_hash: TypeHash::from_instance(open_hash, type_args),
        member_origins,
        conversions: Vec::new(),
    }
}

// ============================================================================
// Universe
// ============================================================================

/// The catalog plus every instantiated generic type, as one lookup.
#[derive(Debug, Clone, Copy)]
pub struct Universe<'a> {
    catalog: &'a Catalog,
    generics: &'a InstantiationManager,
}

impl<'a> Universe<'a> {
    /// Combine a catalog and an instantiation manager.
    pub fn new(catalog: &'a Catalog, generics: &'a InstantiationManager) -> Self {
        Self { catalog, generics }
    }

    /// The catalog.
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// The instantiation manager.
    pub fn generics(&self) -> &'a InstantiationManager {
        self.generics
    }

    /// Instantiate through this universe.
    pub fn instantiate(
        &self,
        target: GenericTarget,
        type_args: &[TypeHash],
    ) -> Result<Arc<Instantiation>, InstantiationError> {
        self.generics.instantiate(target, type_args, self)
    }
}

impl TypeLookup for Universe<'_> {
    fn lookup(&self, type_hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
        self.catalog.lookup(type_hash).or_else(|| {
            self.generics
                .instance(type_hash)
                .and_then(|i| i.type_view().cloned())
        })
    }

    fn root_type(&self) -> Option<TypeHash> {
        self.catalog.root_type()
    }

    fn conversions_from(&self, type_hash: TypeHash) -> Vec<ConversionDecl> {
        let mut conversions = self.catalog.conversions_from(type_hash);
        conversions.extend(self.generics.cache().conversions_from(type_hash));
        conversions
    }
}
