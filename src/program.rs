//! The sealed, read-only program.
//!
//! A [`Program`] owns the catalog, the dispatch tables of every registered
//! concrete type, the generic instantiation cache and the implementation
//! bodies. Everything except the instantiation cache and the lazily built
//! tables of generic instances is immutable, so one `Arc<Program>` can be
//! shared by any number of execution threads.

use std::sync::{Arc, PoisonError, RwLock};

use polydispatch_catalog::Catalog;
use polydispatch_core::{Result, TypeDescriptor, TypeHash, TypeLookup};
use polydispatch_resolver::{
    Binding, Conversion, DispatchTables, GenericTarget, Instantiation, InstantiationManager,
    ResolveOptions, Universe, build_dispatch_tables, classify_conversion, resolve_call_with,
};
use polydispatch_runtime::NativeTable;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::ContextConfig;

/// Immutable result of [`Context::build`](crate::Context::build).
#[derive(Debug)]
pub struct Program {
    config: ContextConfig,
    catalog: Catalog,
    tables: FxHashMap<TypeHash, Arc<DispatchTables>>,
    instance_tables: RwLock<FxHashMap<TypeHash, Arc<DispatchTables>>>,
    generics: InstantiationManager,
    natives: NativeTable,
}

impl Program {
    pub(crate) fn new(
        config: ContextConfig,
        catalog: Catalog,
        tables: FxHashMap<TypeHash, Arc<DispatchTables>>,
        generics: InstantiationManager,
        natives: NativeTable,
    ) -> Self {
        Self {
            config,
            catalog,
            tables,
            instance_tables: RwLock::new(FxHashMap::default()),
            generics,
            natives,
        }
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    /// The configuration the program was built with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The registered types.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The instantiation manager.
    pub fn generics(&self) -> &InstantiationManager {
        &self.generics
    }

    /// Implementation bodies.
    pub fn natives(&self) -> &NativeTable {
        &self.natives
    }

    /// Catalog plus every instantiated generic type, as one lookup.
    pub fn universe(&self) -> Universe<'_> {
        Universe::new(&self.catalog, &self.generics)
    }

    /// Descriptor of a registered type or generic instance.
    pub fn type_descriptor(&self, type_hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
        self.universe().lookup(type_hash)
    }

    /// Hash of a registered type by name.
    pub fn type_hash(&self, name: &str) -> Result<TypeHash> {
        Ok(self.catalog.lookup_name(name)?.type_hash)
    }

    /// Display name of a type or instance.
    pub fn type_name(&self, type_hash: TypeHash) -> String {
        self.universe().type_name(type_hash)
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            enforce_generic_constraints: self.config.enforce_generic_constraints,
        }
    }

    // ==========================================================================
    // Build-time Queries
    // ==========================================================================

    /// Classify the conversion between two types.
    pub fn classify_conversion(&self, from: TypeHash, to: TypeHash) -> Result<Conversion> {
        Ok(classify_conversion(from, to, &self.universe())?)
    }

    /// Bind a call site.
    ///
    /// A winning generic method is instantiated for the inferred type
    /// arguments before the binding is returned.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve_call(
        &self,
        context: TypeHash,
        name: &str,
        arg_types: &[TypeHash],
    ) -> Result<Binding> {
        let universe = self.universe();
        let binding = resolve_call_with(context, name, arg_types, &universe, self.resolve_options())?;
        if binding.is_generic_method() {
            universe.instantiate(
                GenericTarget::Method {
                    owner: binding.member.declaring,
                    member: binding.member.member_hash(),
                },
                &binding.type_args,
            )?;
        }
        Ok(binding)
    }

    /// Instantiate an open generic type or method.
    pub fn instantiate(
        &self,
        target: GenericTarget,
        type_args: &[TypeHash],
    ) -> Result<Arc<Instantiation>> {
        Ok(self.universe().instantiate(target, type_args)?)
    }

    /// Instantiate an open generic type.
    pub fn instantiate_type(&self, open: TypeHash, type_args: &[TypeHash]) -> Result<Arc<Instantiation>> {
        self.instantiate(GenericTarget::Type(open), type_args)
    }

    /// A completed instantiation by instance hash.
    pub fn instance(&self, instance_hash: TypeHash) -> Option<Arc<Instantiation>> {
        self.generics.instance(instance_hash)
    }

    // ==========================================================================
    // Dispatch Tables
    // ==========================================================================

    /// Dispatch tables of a concrete type.
    ///
    /// Tables of registered types were built when the program was sealed.
    /// Tables of generic instances are built on first request; concurrent
    /// first requests may each build, but only the first insert is kept and
    /// every caller gets that one.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn dispatch_tables(&self, type_hash: TypeHash) -> Result<Arc<DispatchTables>> {
        if let Some(tables) = self.tables.get(&type_hash) {
            return Ok(Arc::clone(tables));
        }
        {
            let cached = self
                .instance_tables
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(tables) = cached.get(&type_hash) {
                return Ok(Arc::clone(tables));
            }
        }

        let built = Arc::new(build_dispatch_tables(type_hash, &self.universe())?);
        let mut cached = self
            .instance_tables
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let tables = cached.entry(type_hash).or_insert_with(|| {
            debug!(type_name = %self.type_name(type_hash), "cached instance dispatch tables");
            built
        });
        Ok(Arc::clone(tables))
    }

    /// Number of generic instance tables built so far.
    pub fn instance_table_count(&self) -> usize {
        self.instance_tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use polydispatch_core::{GenericParam, MemberSignature, primitives};

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn program() -> Program {
        let mut ctx = Context::with_defaults().unwrap();
        let t = GenericParam::new("Box", "T");
        ctx.register_type(
            TypeDescriptor::class("Box")
                .with_generic_param(t.clone())
                .with_member(MemberSignature::method("get", vec![]).returns(t.type_hash).as_virtual()),
        )
        .unwrap();
        ctx.build().unwrap()
    }

    #[test]
    fn instance_tables_are_built_once() {
        let program = program();
        let instance = program.instantiate_type(h("Box"), &[primitives::INT]).unwrap();

        let first = program.dispatch_tables(instance.instance_hash).unwrap();
        let second = program.dispatch_tables(instance.instance_hash).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.vmt.len(), 1);
        assert_eq!(program.instance_table_count(), 1);
    }

    #[test]
    fn open_definition_has_no_tables() {
        let program = program();
        assert!(program.dispatch_tables(h("Box")).is_err());
        assert_eq!(program.instance_table_count(), 0);
    }

    #[test]
    fn names_resolve_through_the_universe() {
        let program = program();
        let instance = program.instantiate_type(h("Box"), &[primitives::STRING]).unwrap();
        assert_eq!(program.type_name(instance.instance_hash), "Box<string>");
        assert_eq!(program.type_hash("Box").unwrap(), h("Box"));
        assert!(program.type_hash("Nope").is_err());
    }
}
