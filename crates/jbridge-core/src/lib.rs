//! JVM interop core.
//!
//! This crate hosts the runtime half of the bridge: the context that
//! owns a JVM instance, class and member resolution with per-context
//! caching, value marshaling across the native ABI, foreign object
//! lifetime tracking, contract-driven dynamic dispatch, and foreign
//! exception translation.

// Error types
mod error;
pub use error::{BridgeError, BridgeResult, MemberNotFoundKind};

// Type descriptors and signatures
mod descriptor;
pub use descriptor::{STRING_CLASS, TypeDescriptor, method_signature};

// Host-side values and typed arguments
mod value;
pub use value::{TypedArg, Value};

// The ABI seam and its native implementation
mod abi;
pub use abi::{JvmAbi, NativeAbi};

// Class and member resolution cache
mod resolve;
pub use resolve::ClassHandle;

// Foreign object lifetime registry
mod registry;
pub use registry::HandleRegistry;

// Runtime context and startup options
mod jvm;
pub use jvm::{BRIDGE_LIBRARY_VAR, JAVA_HOME_VAR, Jvm, JvmOptions};

// Marshaling pipeline
mod marshal;

// Foreign exception translation
mod exception;

// Bound object wrappers
mod object;
pub use object::{BoundObject, Facet};

// Binding contracts and synthesized dispatch
mod contract;
pub use contract::{
    BoundClass, BoundInstance, ClassContract, ContractBuilder, MemberKind, MemberSpec,
};
