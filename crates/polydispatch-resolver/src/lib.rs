//! Polydispatch resolver.
//!
//! Build-phase analyses over a [`TypeLookup`](polydispatch_core::TypeLookup):
//!
//! - [`conversion`]: classify and rank conversions between two types
//! - [`overload`]: bind a call site to one member
//! - [`dispatch`]: virtual and interface slot tables per concrete type
//! - [`generic`]: instantiate and cache open generic types and methods

pub mod conversion;
pub mod dispatch;
pub mod generic;
pub mod overload;

pub use conversion::{Conversion, ConversionKind, can_implicitly_convert, classify_conversion};
pub use dispatch::{
    DispatchTables, InterfaceSlot, InterfaceSlotTable, VirtualSlot, VirtualTable,
    build_dispatch_tables, slot_introducer,
};
pub use generic::{
    GenericTarget, Instantiation, InstantiationManager, Specialization, StaticInitializer,
    StaticState, Universe,
};
pub use overload::{Binding, CallKind, ResolveOptions, resolve_call, resolve_call_with};
