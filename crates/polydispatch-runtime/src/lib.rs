//! Polydispatch runtime support.
//!
//! Execution-time pieces of the dispatch runtime:
//!
//! - [`heap`]: generational, reference-counted object heap
//! - [`boxing`]: value-to-heap promotion and exact-tag unboxing
//! - [`cast`]: runtime-checked explicit casts
//! - [`variance`]: covariant array write guard
//! - [`closure`]: activations and closure frames
//! - [`delegate`]: immutable multicast delegates
//! - [`native`]: implementation bodies and their call context
//! - [`dispatch`]: selecting the implementation for a bound call

pub mod boxing;
pub mod cast;
pub mod closure;
pub mod delegate;
pub mod dispatch;
pub mod heap;
pub mod native;
pub mod variance;

pub use boxing::{box_value, unbox};
pub use cast::{cast_value, convert_numeric};
pub use closure::{Activation, ClosureFrame, SharedSlot, THIS};
pub use delegate::{Delegate, DelegateEntry, DelegateTarget};
pub use dispatch::select_implementation;
pub use heap::{HeapObject, ObjectBody, ObjectHeap};
pub use native::{CallContext, NativeCallable, NativeFn, NativeTable};
pub use variance::{check_covariant_write, needs_covariance_check};
