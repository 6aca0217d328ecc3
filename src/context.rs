//! Registration phase.
//!
//! A [`Context`] collects type descriptors, implementation bodies and static
//! initializers. [`Context::build`] validates the whole catalog, builds the
//! dispatch tables of every concrete type and seals everything into an
//! immutable [`Program`].

use std::sync::Arc;

use polydispatch_catalog::Catalog;
use polydispatch_core::{
    CatalogError, Result, RuntimeError, TypeDescriptor, TypeHash, TypeLookup, Value,
};
use polydispatch_resolver::{
    DispatchTables, InstantiationManager, Specialization, StaticInitializer, build_dispatch_tables,
};
use polydispatch_runtime::{CallContext, NativeTable};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::ContextConfig;
use crate::program::Program;

/// The mutable registration phase.
pub struct Context {
    config: ContextConfig,
    catalog: Catalog,
    natives: NativeTable,
    initializers: Vec<(TypeHash, StaticInitializer)>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("types", &self.catalog.len())
            .field("natives", &self.natives.len())
            .field("initializers", &self.initializers.len())
            .finish()
    }
}

impl Context {
    /// Create a context, registering the root type and primitives as
    /// configured.
    pub fn new(config: ContextConfig) -> Result<Self> {
        let mut catalog = Catalog::new();
        if let Some(root) = &config.root_type {
            catalog.register_root(root)?;
        }
        if config.register_primitives {
            catalog.register_primitives();
        }
        Ok(Self {
            config,
            catalog,
            natives: NativeTable::new(),
            initializers: Vec::new(),
        })
    }

    /// Create a context with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ContextConfig::default())
    }

    /// The configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The catalog as registered so far.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Register a type.
    pub fn register_type(&mut self, desc: TypeDescriptor) -> Result<TypeHash> {
        Ok(self.catalog.register_type(desc)?)
    }

    /// Register the body of a member (or of a conversion operator, keyed by
    /// its member hash).
    pub fn implement<F>(&mut self, member: TypeHash, body: F) -> &mut Self
    where
        F: Fn(&mut CallContext<'_>) -> std::result::Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.natives.register(member, body);
        self
    }

    /// Register the static initializer of an open generic definition.
    ///
    /// Runs once per specialization, on first use.
    pub fn with_static_initializer<F>(&mut self, open: TypeHash, init: F) -> &mut Self
    where
        F: Fn(&Specialization) -> FxHashMap<String, Value> + Send + Sync + 'static,
    {
        let init: StaticInitializer = Arc::new(init);
        self.initializers.push((open, init));
        self
    }

    /// Validate the catalog and seal it into a [`Program`].
    ///
    /// Fails with `UnknownType` if any base or interface was referenced but
    /// never registered, or with the first dispatch error of any concrete
    /// type. Nothing is published on failure.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(self) -> Result<Program> {
        if let Some(&(owner, missing)) = self.catalog.unresolved_references().first() {
            return Err(CatalogError::UnknownType(format!(
                "{missing} (referenced by '{}')",
                self.catalog.type_name(owner)
            ))
            .into());
        }

        let mut tables: FxHashMap<TypeHash, Arc<DispatchTables>> = FxHashMap::default();
        for hash in self.catalog.dependency_order()? {
            let Some(desc) = self.catalog.get(hash) else {
                continue;
            };
            if !desc.kind.has_dispatch_tables() || desc.is_generic() {
                continue;
            }
            let built = build_dispatch_tables(hash, &self.catalog)?;
            tables.insert(hash, Arc::new(built));
        }

        let generics = self.initializers.into_iter().fold(
            InstantiationManager::new(self.config.enforce_generic_constraints),
            |manager, (open, init)| manager.with_initializer(open, init),
        );

        debug!(
            types = self.catalog.len(),
            tables = tables.len(),
            natives = self.natives.len(),
            "sealed program"
        );

        Ok(Program::new(
            self.config,
            self.catalog,
            tables,
            generics,
            self.natives,
        ))
    }
}
