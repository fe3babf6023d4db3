//! Host-side value model.
//!
//! [`Value`] is the tagged payload that crosses the marshaling engine in
//! both directions; [`TypedArg`] pairs a value with its resolved
//! [`TypeDescriptor`] so call signatures are built once, not re-derived
//! from raw values at every layer.

use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::object::BoundObject;

/// A host value headed into or out of the JVM.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a void method; never valid as an argument.
    Void,
    /// The JVM null reference.
    Null,
    Bool(bool),
    Byte(i8),
    /// UTF-16 code unit, as the JVM defines `char`.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Arc<BoundObject>),
}

impl Value {
    /// Derive the descriptor for this value.
    ///
    /// `explicit` overrides the class path for references (and supplies
    /// one for `Null` and empty arrays, which carry no type of their
    /// own). A reference value without any declared class path is a
    /// [`BridgeError::MissingClassPath`].
    pub fn descriptor_of(&self, explicit: Option<&str>) -> BridgeResult<TypeDescriptor> {
        match self {
            Value::Void => Ok(TypeDescriptor::Void),
            Value::Null => match explicit {
                Some(path) => Ok(TypeDescriptor::object(path)),
                None => Err(BridgeError::MissingClassPath {
                    what: "null argument".into(),
                }),
            },
            Value::Bool(_) => Ok(TypeDescriptor::Bool),
            Value::Byte(_) => Ok(TypeDescriptor::Byte),
            Value::Char(_) => Ok(TypeDescriptor::Char),
            Value::Short(_) => Ok(TypeDescriptor::Short),
            Value::Int(_) => Ok(TypeDescriptor::Int),
            Value::Long(_) => Ok(TypeDescriptor::Long),
            Value::Float(_) => Ok(TypeDescriptor::Float),
            Value::Double(_) => Ok(TypeDescriptor::Double),
            Value::Str(_) => match explicit {
                Some(path) => Ok(TypeDescriptor::object(path)),
                None => Ok(TypeDescriptor::string()),
            },
            Value::Array(elements) => match elements.first() {
                Some(first) => Ok(TypeDescriptor::array(first.descriptor_of(explicit)?)),
                None => match explicit {
                    Some(path) => Ok(TypeDescriptor::array(TypeDescriptor::object(path))),
                    None => Err(BridgeError::MissingClassPath {
                        what: "empty array argument".into(),
                    }),
                },
            },
            Value::Object(object) => {
                let path = explicit.unwrap_or_else(|| object.class_path());
                Ok(TypeDescriptor::object(path))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<BoundObject>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Char(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Arc<BoundObject>> for Value {
    fn from(v: Arc<BoundObject>) -> Self {
        Value::Object(v)
    }
}

/// A value paired with the descriptor that drives its signature slot.
#[derive(Debug, Clone)]
pub struct TypedArg {
    pub value: Value,
    pub descriptor: TypeDescriptor,
}

impl TypedArg {
    /// Pair a value with its derived descriptor.
    pub fn new(value: Value) -> BridgeResult<TypedArg> {
        let descriptor = value.descriptor_of(None)?;
        Ok(TypedArg { value, descriptor })
    }

    /// Pair a value with an explicit class path, for nulls and for
    /// passing an object where a supertype or interface is declared.
    pub fn with_class(value: Value, class_path: &str) -> BridgeResult<TypedArg> {
        let descriptor = value.descriptor_of(Some(class_path))?;
        Ok(TypedArg { value, descriptor })
    }

    /// Pair a value with a fully explicit descriptor (contract-declared
    /// parameter types take this path).
    pub fn with_descriptor(value: Value, descriptor: TypeDescriptor) -> TypedArg {
        TypedArg { value, descriptor }
    }
}
