use std::ffi::NulError;
use std::str::Utf8Error;
use thiserror::Error;

pub type BridgeResult<T> = anyhow::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The class path could not be resolved in the JVM.
    #[error("class not found: {class_path}")]
    ClassNotFound { class_path: String },

    /// No member matched the exact generated signature. The signature is
    /// included verbatim so overload-resolution failures are debuggable.
    #[error("{kind} {name}{signature} not found on class {class_path}")]
    MemberNotFound {
        class_path: String,
        name: String,
        signature: String,
        kind: MemberNotFoundKind,
    },

    /// A call was attempted on a runtime context that has been shut down.
    #[error("JVM runtime is not initialized")]
    RuntimeNotInitialized,

    /// An instance operation was invoked through a contract's static facet.
    #[error("instance member {name} invoked on static facet of {class_path}")]
    InstanceOnStatic { class_path: String, name: String },

    /// A wrapper value was used without a declared foreign class path.
    #[error("no class path declared for {what}")]
    MissingClassPath { what: String },

    /// A JVM exception surfaced to the host, already translated.
    #[error("java exception: {message}")]
    Foreign { message: String, stack_trace: String },

    /// A returned object's runtime class has no registered contract and an
    /// exact wrapper was required.
    #[error("no contract registered for runtime class {class_path}")]
    NoClassMapping { class_path: String },

    /// Operation on an object that is unbound or already released.
    #[error("object of class {class_path} is not bound to a live JVM object")]
    NotBound { class_path: String },

    /// JAVA_HOME / installation directory problems during bootstrap.
    #[error("failed to locate JVM installation: {0}")]
    Locate(String),

    /// A host value that has no JVM mapping was passed as an argument.
    #[error("cannot map host value to a JVM type: {what}")]
    Unmappable { what: String },

    #[error("bridge library error: {0}")]
    Load(#[from] jbridge_sys::LoadError),

    #[error("string conversion error: {0}")]
    StringConversion(#[from] NulError),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Conversion(#[from] Utf8Error),
}

/// Distinguishes method from field misses in [`BridgeError::MemberNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberNotFoundKind {
    Method,
    Field,
}

impl std::fmt::Display for MemberNotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberNotFoundKind::Method => write!(f, "method"),
            MemberNotFoundKind::Field => write!(f, "field"),
        }
    }
}

impl BridgeError {
    pub(crate) fn method_not_found(class_path: &str, name: &str, signature: &str) -> Self {
        BridgeError::MemberNotFound {
            class_path: class_path.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
            kind: MemberNotFoundKind::Method,
        }
    }

    pub(crate) fn field_not_found(class_path: &str, name: &str, signature: &str) -> Self {
        BridgeError::MemberNotFound {
            class_path: class_path.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
            kind: MemberNotFoundKind::Field,
        }
    }
}
