//! Specializations and their per-instantiation static state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use polydispatch_core::{MemberSignature, TypeDescriptor, TypeHash, Value};
use rustc_hash::FxHashMap;

/// Initializer run once per specialization, on first real use.
///
/// Receives the specialization being initialized and returns the initial
/// static field values.
pub type StaticInitializer =
    Arc<dyn Fn(&Specialization) -> FxHashMap<String, Value> + Send + Sync>;

/// Static field storage of one specialization, guarded by a once-flag.
#[derive(Debug, Default)]
pub struct StaticState {
    fields: OnceLock<RwLock<FxHashMap<String, Value>>>,
}

impl StaticState {
    /// Check if the once-flag has fired.
    pub fn is_initialized(&self) -> bool {
        self.fields.get().is_some()
    }

    fn initialize(
        &self,
        init: impl FnOnce() -> FxHashMap<String, Value>,
    ) -> &RwLock<FxHashMap<String, Value>> {
        self.fields.get_or_init(|| RwLock::new(init()))
    }

    /// Read a static field. `None` before initialization or for unknown fields.
    pub fn get(&self, name: &str) -> Option<Value> {
        let fields = self.fields.get()?;
        let guard = fields.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(name).cloned()
    }

    /// Write a static field. Returns `false` before initialization.
    pub fn set(&self, name: impl Into<String>, value: Value) -> bool {
        let Some(fields) = self.fields.get() else {
            return false;
        };
        let mut guard = fields.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(name.into(), value);
        true
    }
}

/// The specialized definition shared by one or more instantiations.
///
/// Instantiations whose arguments are all reference types share a single
/// specialization; any value-type argument gets its own.
#[derive(Debug)]
pub enum Specialized {
    /// A specialized type descriptor.
    Type(Arc<TypeDescriptor>),
    /// A specialized generic method.
    Method(Arc<MemberSignature>),
}

/// One piece of generated specialization with its own static state.
pub struct Specialization {
    /// Sequential id, unique per manager.
    pub id: usize,
    /// The open definition.
    pub open: TypeHash,
    /// Whether this is the shared reference-argument specialization.
    pub shared: bool,
    /// The specialized definition.
    pub specialized: Specialized,
    static_state: StaticState,
    initializer: Option<StaticInitializer>,
    initializer_ran: AtomicBool,
}

impl std::fmt::Debug for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Specialization")
            .field("id", &self.id)
            .field("open", &self.open)
            .field("shared", &self.shared)
            .field("specialized", &self.specialized)
            .field("static_state", &self.static_state)
            .field("has_initializer", &self.initializer.is_some())
            .finish()
    }
}

impl Specialization {
    pub(crate) fn new(
        id: usize,
        open: TypeHash,
        shared: bool,
        specialized: Specialized,
        initializer: Option<StaticInitializer>,
    ) -> Self {
        Self {
            id,
            open,
            shared,
            specialized,
            static_state: StaticState::default(),
            initializer,
            initializer_ran: AtomicBool::new(false),
        }
    }

    /// Run the static initializer if this is the first real use.
    ///
    /// Concurrent callers block until the winner has finished; the
    /// initializer runs at most once.
    pub fn ensure_initialized(&self) -> &StaticState {
        self.static_state.initialize(|| {
            self.initializer_ran.store(true, Ordering::Release);
            match &self.initializer {
                Some(init) => init(self),
                None => FxHashMap::default(),
            }
        });
        &self.static_state
    }

    /// Static state without triggering initialization.
    pub fn static_state(&self) -> &StaticState {
        &self.static_state
    }

    /// Check if the once-flag has fired.
    pub fn is_initialized(&self) -> bool {
        self.static_state.is_initialized()
    }

    /// Check if a registered initializer actually ran.
    pub fn initializer_ran(&self) -> bool {
        self.initializer_ran.load(Ordering::Acquire)
    }

    /// The specialized type descriptor, if this specializes a type.
    pub fn type_descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        match &self.specialized {
            Specialized::Type(desc) => Some(desc),
            Specialized::Method(_) => None,
        }
    }
}

/// A cached instantiation: one `(open definition, type arguments)` key.
#[derive(Debug)]
pub struct Instantiation {
    /// The open definition (type hash or member hash).
    pub open: TypeHash,
    /// Concrete type arguments.
    pub type_args: Vec<TypeHash>,
    /// Identity of the instance (`List<int>`).
    pub instance_hash: TypeHash,
    /// Exactly-typed definition for this argument list, used for type
    /// checking and dispatch tables.
    pub view: Specialized,
    /// Instance member hash → open member hash, to find shared bodies.
    pub member_origins: FxHashMap<TypeHash, TypeHash>,
    /// The specialization this instantiation runs on.
    pub specialization: Arc<Specialization>,
}

impl Instantiation {
    /// The specialized descriptor.
    ///
    /// All-reference instantiations of one open type return the same
    /// descriptor; value-type instantiations return their own.
    pub fn descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.specialization.type_descriptor()
    }

    /// The exactly-typed descriptor for this argument list.
    pub fn type_view(&self) -> Option<&Arc<TypeDescriptor>> {
        match &self.view {
            Specialized::Type(desc) => Some(desc),
            Specialized::Method(_) => None,
        }
    }

    /// The exactly-typed method signature, for method instantiations.
    pub fn method(&self) -> Option<&Arc<MemberSignature>> {
        match &self.view {
            Specialized::Method(member) => Some(member),
            Specialized::Type(_) => None,
        }
    }

    /// Open member a specialized member was produced from.
    pub fn origin_of(&self, member: TypeHash) -> Option<TypeHash> {
        self.member_origins.get(&member).copied()
    }
}
