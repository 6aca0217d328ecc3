//! Polydispatch type catalog.
//!
//! Registration phase storage for type descriptors. Cycles through
//! inheritance, conformance or interface extension are rejected eagerly, when
//! the edge that would close them is registered.

pub mod catalog;
pub mod hierarchy;

pub use catalog::Catalog;
pub use hierarchy::{EdgeKind, HierarchyGraph};
