//! Polydispatch: a dispatch and specialization runtime.
//!
//! Binds call sites to members through overload resolution, dispatches them
//! through virtual and interface slot tables, instantiates generic types and
//! methods on demand, and builds closures and multicast delegates.
//!
//! # Phases
//!
//! 1. [`Context`]: register types, implementation bodies and static
//!    initializers.
//! 2. [`Program`]: the sealed, shareable result of [`Context::build`].
//!    Resolves calls, classifies conversions and instantiates generics.
//! 3. [`Runtime`]: executes bindings against an object heap.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use polydispatch::{
//!     Context, MemberSignature, Runtime, TypeDescriptor, TypeHash, Value, primitives,
//! };
//!
//! let mut ctx = Context::with_defaults()?;
//! let area = MemberSignature::method("area", vec![])
//!     .returns(primitives::DOUBLE)
//!     .as_virtual();
//! ctx.register_type(TypeDescriptor::class("Shape").with_member(area))?;
//! let shape = TypeHash::from_name("Shape");
//! ctx.implement(TypeHash::from_member(shape, "area", &[]), |call| {
//!     call.set_return(Value::Double(1.0));
//!     Ok(())
//! });
//!
//! let program = Arc::new(ctx.build()?);
//! let binding = program.resolve_call(shape, "area", &[])?;
//! let mut runtime = Runtime::new(Arc::clone(&program));
//! let receiver = runtime.new_object(shape)?;
//! assert_eq!(runtime.invoke(&binding, Some(receiver), vec![])?, Value::Double(1.0));
//! # Ok::<(), polydispatch::Error>(())
//! ```

pub mod config;
pub mod context;
pub mod logging;
pub mod program;
pub mod runtime;

pub use config::{ConfigError, ContextConfig, LogConfig, LogFormat, LogLevel};
pub use context::Context;
pub use program::Program;
pub use runtime::Runtime;

pub use polydispatch_catalog::Catalog;
pub use polydispatch_core::{
    CatalogError, ConformanceRecord, ConversionDecl, ConversionError, DispatchError, Error,
    GenericOrigin, GenericParam, InstantiationError, KindConstraint, MemberSignature,
    ObjectHandle, ResolutionError, Result, RuntimeError, StructValue, TypeDescriptor, TypeFlags,
    TypeHash, TypeKind, TypeLookup, Value, Virtuality, primitives,
};
pub use polydispatch_resolver::{
    Binding, CallKind, Conversion, ConversionKind, DispatchTables, GenericTarget, Instantiation,
    Specialization, StaticState, Universe,
};
pub use polydispatch_runtime::{
    Activation, CallContext, ClosureFrame, Delegate, DelegateEntry, DelegateTarget, ObjectHeap,
    THIS,
};
