//! Mapping between host value types and JVM type signatures.
//!
//! [`TypeDescriptor`] is the single source of truth for signature
//! strings: every other module renders signatures through
//! [`TypeDescriptor::signature`] and [`method_signature`], never by
//! hand.

use jbridge_sys::JavaKind;

/// The JVM's string class, used wherever host strings cross the boundary.
pub const STRING_CLASS: &str = "java/lang/String";

/// Immutable description of a JVM value type.
///
/// Object and array types are separate variants, so the invalid
/// "object with neither class path nor element type" state cannot be
/// expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// A reference type, keyed by its fully-qualified class path.
    Object(String),
    /// An array whose elements are described recursively.
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Object descriptor for a class path; accepts either `.` or `/`
    /// separators and stores the slash form the ABI expects.
    pub fn object(class_path: &str) -> TypeDescriptor {
        TypeDescriptor::Object(class_path.replace('.', "/"))
    }

    /// Array descriptor over an element descriptor.
    pub fn array(element: TypeDescriptor) -> TypeDescriptor {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Descriptor for host strings.
    pub fn string() -> TypeDescriptor {
        TypeDescriptor::Object(STRING_CLASS.to_string())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, TypeDescriptor::Object(path) if path == STRING_CLASS)
    }

    /// The class path for object descriptors, `None` for everything else.
    pub fn class_path(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Object(path) => Some(path),
            _ => None,
        }
    }

    /// The primitive kind code the ABI uses to select the call/return slot.
    pub fn kind(&self) -> JavaKind {
        match self {
            TypeDescriptor::Bool => JavaKind::Bool,
            TypeDescriptor::Byte => JavaKind::Byte,
            TypeDescriptor::Char => JavaKind::Char,
            TypeDescriptor::Short => JavaKind::Short,
            TypeDescriptor::Int => JavaKind::Int,
            TypeDescriptor::Long => JavaKind::Long,
            TypeDescriptor::Float => JavaKind::Float,
            TypeDescriptor::Double => JavaKind::Double,
            TypeDescriptor::Void => JavaKind::Void,
            TypeDescriptor::Object(_) | TypeDescriptor::Array(_) => JavaKind::Object,
        }
    }

    /// Render the JVM signature of this type.
    ///
    /// Primitives use their single-letter codes, objects `L<path>;`,
    /// arrays a `[` prefix per dimension, void `V`.
    pub fn signature(&self) -> String {
        match self {
            TypeDescriptor::Bool => "Z".to_string(),
            TypeDescriptor::Byte => "B".to_string(),
            TypeDescriptor::Char => "C".to_string(),
            TypeDescriptor::Short => "S".to_string(),
            TypeDescriptor::Int => "I".to_string(),
            TypeDescriptor::Long => "J".to_string(),
            TypeDescriptor::Float => "F".to_string(),
            TypeDescriptor::Double => "D".to_string(),
            TypeDescriptor::Void => "V".to_string(),
            TypeDescriptor::Object(path) => format!("L{path};"),
            TypeDescriptor::Array(element) => format!("[{}", element.signature()),
        }
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Compose a method signature from a return descriptor and parameter
/// descriptors: `(<params>)<return>`.
pub fn method_signature(returns: &TypeDescriptor, params: &[TypeDescriptor]) -> String {
    let mut sig = String::with_capacity(2 + params.len() * 2);
    sig.push('(');
    for param in params {
        sig.push_str(&param.signature());
    }
    sig.push(')');
    sig.push_str(&returns.signature());
    sig
}
