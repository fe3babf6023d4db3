pub use jbridge_core as core;
pub use jbridge_sys as sys;

// Re-export main types
pub mod prelude {
    pub use jbridge_core::{
        BRIDGE_LIBRARY_VAR, BoundClass, BoundInstance, BoundObject, BridgeError, BridgeResult,
        ClassContract, ContractBuilder, Facet, JAVA_HOME_VAR, Jvm, JvmAbi, JvmOptions, MemberKind,
        MemberSpec, NativeAbi, TypeDescriptor, TypedArg, Value, method_signature,
    };
    pub use jbridge_sys::{JavaKind, RawHandle, RawValue};
}
