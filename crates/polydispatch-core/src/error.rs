//! Error types for every phase of the dispatch runtime.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error (top-level wrapper)
//! ├── CatalogError       - type registration (build-time, fatal)
//! ├── ConversionError    - conversion classification (build-time)
//! ├── ResolutionError    - overload resolution (build-time, fatal)
//! ├── DispatchError      - dispatch table construction (build-time, fatal)
//! ├── InstantiationError - generic instantiation (build-time, fatal)
//! └── RuntimeError       - casts, covariant stores, invocation (recoverable)
//! ```
//!
//! Build-time errors carry the full evidence (cycle path, candidate list) and
//! abort the step that produced them. Runtime errors are ordinary results; the
//! surrounding program may handle them and continue.

use thiserror::Error;

// ============================================================================
// Catalog Errors
// ============================================================================

/// Errors that occur while registering types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A type with this name is already registered.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// Registering the type would close a cycle in the inheritance or
    /// conformance graph.
    #[error("cyclic inheritance: {}", cycle.join(" -> "))]
    CyclicInheritance {
        /// The cycle, starting and ending at the rejected type.
        cycle: Vec<String>,
    },

    /// A referenced type is not registered.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The base type is not something a type of this kind may inherit from.
    #[error("type '{type_name}' cannot inherit from '{base}': {reason}")]
    InvalidBase {
        /// The type being registered.
        type_name: String,
        /// The offending base.
        base: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A conformance record names something that is not an interface, or
    /// belongs to another type.
    #[error("type '{type_name}' cannot conform to '{target}': {reason}")]
    InvalidConformance {
        /// The type being registered.
        type_name: String,
        /// The conformance target.
        target: String,
        /// Why it is invalid.
        reason: String,
    },

    /// Two members on the same type share `(name, parameter types)`.
    #[error("duplicate member '{member}' on '{type_name}'")]
    DuplicateMember {
        /// The declaring type.
        type_name: String,
        /// The member name.
        member: String,
    },
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors from conversion classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// No conversion path exists.
    #[error("no conversion from '{from}' to '{to}'")]
    NoConversion {
        /// Source type name.
        from: String,
        /// Target type name.
        to: String,
    },

    /// More than one user-declared conversion applies with equal preference.
    #[error("ambiguous user conversion from '{from}' to '{to}': {}", candidates.join(", "))]
    AmbiguousUserConversion {
        /// Source type name.
        from: String,
        /// Target type name.
        to: String,
        /// The competing operators.
        candidates: Vec<String>,
    },
}

// ============================================================================
// Resolution Errors
// ============================================================================

/// Errors from overload resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No candidate accepts the argument types.
    #[error(
        "no applicable overload of '{name}({})' on '{context}'; candidates: [{}]",
        args.join(", "),
        candidates.join(", ")
    )]
    NoApplicableOverload {
        /// The static context type searched first.
        context: String,
        /// Member name.
        name: String,
        /// Argument type names.
        args: Vec<String>,
        /// Every candidate that was considered.
        candidates: Vec<String>,
    },

    /// Two or more candidates remain tied after specificity and cost.
    #[error("ambiguous call to '{name}': {}", candidates.join(" vs "))]
    AmbiguousOverload {
        /// Member name.
        name: String,
        /// The tied candidates.
        candidates: Vec<String>,
    },

    /// The context type is not known.
    #[error("unknown type: {0}")]
    UnknownType(String),
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Errors from dispatch table construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// An interface member has no implementation on the conforming type.
    #[error("'{type_name}' does not implement '{interface}.{member}'")]
    UnresolvedInterfaceSlot {
        /// The conforming type.
        type_name: String,
        /// The interface.
        interface: String,
        /// The unimplemented member.
        member: String,
    },

    /// An override has no inherited virtual slot to replace.
    #[error("'{type_name}.{member}' is marked override but no virtual member to override was found")]
    MissingOverrideBase {
        /// The declaring type.
        type_name: String,
        /// The member.
        member: String,
    },

    /// A type in the hierarchy is not registered.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The type has no dispatch tables (interfaces, generic placeholders,
    /// open generic definitions).
    #[error("'{0}' is not a concrete type")]
    NotConcrete(String),
}

// ============================================================================
// Instantiation Errors
// ============================================================================

/// Errors from generic instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiationError {
    /// The definition has no generic parameters.
    #[error("'{0}' is not a generic definition")]
    NotGeneric(String),

    /// Wrong number of type arguments.
    #[error("'{name}' expects {expected} type argument(s), got {got}")]
    ArityMismatch {
        /// The open definition.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// A type argument does not satisfy a parameter's constraints.
    #[error("type argument '{argument}' does not satisfy constraint '{constraint}' on '{parameter}'")]
    ConstraintViolation {
        /// The generic parameter.
        parameter: String,
        /// The supplied argument.
        argument: String,
        /// The unmet constraint.
        constraint: String,
    },

    /// A referenced type is not registered.
    #[error("unknown type: {0}")]
    UnknownType(String),
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Recoverable errors raised at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The runtime type is not compatible with the requested type.
    #[error("invalid cast from '{from}' to '{to}'")]
    InvalidCast {
        /// Runtime type name of the value.
        from: String,
        /// Requested type name.
        to: String,
    },

    /// A covariant array store would put a value of the wrong type into the array.
    #[error(
        "array variance violation: cannot store '{written}' into '{actual}[]' accessed as '{declared}[]'"
    )]
    ArrayVarianceViolation {
        /// Element type of the reference used for the write.
        declared: String,
        /// Element type the array was created with.
        actual: String,
        /// Type of the value being written.
        written: String,
    },

    /// A member was invoked on a null receiver.
    #[error("null reference while calling '{0}'")]
    NullReference(String),

    /// The handle refers to a freed heap slot.
    #[error("stale object handle {0}")]
    StaleHandle(String),

    /// Array index outside the array bounds.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },

    /// No implementation body is registered for a member.
    #[error("no implementation registered for '{0}'")]
    MissingImplementation(String),

    /// Wrong number of arguments passed to an implementation.
    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Member name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// A local variable name is not declared in the activation.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// The handle does not refer to an array.
    #[error("object {0} is not an array")]
    NotAnArray(String),

    /// A type needed at runtime is not known.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// An error raised by a native implementation body.
    #[error("{0}")]
    Native(String),
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error produced by the dispatch runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A registration error.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A conversion error.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// An overload resolution error.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A dispatch table error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A generic instantiation error.
    #[error(transparent)]
    Instantiation(#[from] InstantiationError),

    /// A runtime error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    /// Check if this error was raised during the build phase.
    ///
    /// Build-time errors are fatal for the step that produced them.
    pub fn is_build_time(&self) -> bool {
        !self.is_runtime()
    }

    /// Check if this is a recoverable runtime error.
    pub fn is_runtime(&self) -> bool {
        matches!(self, Error::Runtime(_))
    }
}
