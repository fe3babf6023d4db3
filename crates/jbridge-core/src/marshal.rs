//! Argument and return marshaling.
//!
//! Host arguments become a `RawValue` buffer for the ABI; strings and
//! arrays allocate transient foreign objects on the way in, tracked by a
//! [`TransientScope`] whose drop releases them on every exit path,
//! including when the foreign call threw. Results are decoded according
//! to the declared return descriptor; returned objects are wrapped by
//! their *runtime* class, not the statically declared one, so covariant
//! returns stay safe.
//!
//! Booleans cross the boundary as a single byte, `0`/`1`, in both
//! directions.

use std::sync::Arc;

use jbridge_sys::{RawHandle, RawValue};

use crate::abi::JvmAbi;
use crate::descriptor::{TypeDescriptor, method_signature};
use crate::error::{BridgeError, BridgeResult};
use crate::jvm::Jvm;
use crate::object::BoundObject;
use crate::resolve::ClassHandle;
use crate::value::{TypedArg, Value};

/// Transient foreign allocations made while encoding one call's
/// arguments. Dropping the scope releases them unconditionally;
/// failures during that release are ignored, since the scope unwinds
/// error paths and must not mask the primary error.
struct TransientScope<'a> {
    abi: &'a dyn JvmAbi,
    handles: Vec<RawHandle>,
}

impl<'a> TransientScope<'a> {
    fn new(abi: &'a dyn JvmAbi) -> TransientScope<'a> {
        TransientScope {
            abi,
            handles: Vec::new(),
        }
    }

    fn track(&mut self, handle: RawHandle) {
        if !handle.is_null() {
            self.handles.push(handle);
        }
    }
}

impl Drop for TransientScope<'_> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.abi.release(handle);
        }
    }
}

impl Jvm {
    /// Invoke a method through the resolve → encode → call → decode
    /// pipeline. `target` is `None` for static calls.
    pub(crate) fn invoke_method(
        &self,
        class: &Arc<ClassHandle>,
        target: Option<RawHandle>,
        name: &str,
        returns: &TypeDescriptor,
        args: &[TypedArg],
    ) -> BridgeResult<Value> {
        self.ensure_open()?;
        let descriptors: Vec<TypeDescriptor> =
            args.iter().map(|arg| arg.descriptor.clone()).collect();
        let signature = method_signature(returns, &descriptors);
        let is_static = target.is_none();
        let method = class.resolve_method(self.abi(), name, &signature, is_static)?;

        let mut scope = TransientScope::new(self.abi());
        let raw_args = self.encode_args(args, &mut scope)?;
        let resp = self.abi().call(
            target.unwrap_or_else(|| class.raw()),
            method,
            returns.kind(),
            &raw_args,
            is_static,
        );
        drop(scope);

        if resp.is_exception() {
            return Err(self.translate_exception(unsafe { resp.value.l }));
        }
        if returns.is_void() {
            return Ok(Value::Void);
        }
        self.decode(returns, resp.value)
    }

    /// Construct a foreign object, registering the new handle with the
    /// lifetime registry.
    pub(crate) fn construct(
        &self,
        class: &Arc<ClassHandle>,
        args: &[TypedArg],
    ) -> BridgeResult<RawHandle> {
        self.ensure_open()?;
        let descriptors: Vec<TypeDescriptor> =
            args.iter().map(|arg| arg.descriptor.clone()).collect();
        let signature = method_signature(&TypeDescriptor::Void, &descriptors);

        let mut scope = TransientScope::new(self.abi());
        let raw_args = self.encode_args(args, &mut scope)?;
        let handle = self.abi().new_object(class.raw(), &signature, &raw_args)?;
        drop(scope);

        if handle.is_null() {
            let pending = self.abi().pending_exception();
            if !pending.is_null() {
                return Err(self.translate_exception(pending));
            }
            return Err(BridgeError::method_not_found(
                class.class_path(),
                "<init>",
                &signature,
            ));
        }

        self.registry().register(handle);
        Ok(handle)
    }

    /// Read a field, decoding per the declared descriptor.
    pub(crate) fn read_field_value(
        &self,
        class: &Arc<ClassHandle>,
        target: Option<RawHandle>,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> BridgeResult<Value> {
        self.ensure_open()?;
        let is_static = target.is_none();
        let signature = descriptor.signature();
        let field = class.resolve_field(self.abi(), name, &signature, is_static)?;
        let raw = self.abi().read_field(
            target.unwrap_or_else(|| class.raw()),
            field,
            descriptor.kind(),
            is_static,
        );
        self.decode(descriptor, raw)
    }

    /// Write a field, encoding through the same transient discipline as
    /// method arguments.
    pub(crate) fn write_field_value(
        &self,
        class: &Arc<ClassHandle>,
        target: Option<RawHandle>,
        name: &str,
        arg: &TypedArg,
    ) -> BridgeResult<()> {
        self.ensure_open()?;
        let is_static = target.is_none();
        let signature = arg.descriptor.signature();
        let field = class.resolve_field(self.abi(), name, &signature, is_static)?;

        let mut scope = TransientScope::new(self.abi());
        let raw = self.encode_one(arg, &mut scope)?;
        self.abi().write_field(
            target.unwrap_or_else(|| class.raw()),
            field,
            arg.descriptor.kind(),
            raw,
            is_static,
        );
        drop(scope);
        Ok(())
    }

    fn encode_args<'a>(
        &self,
        args: &[TypedArg],
        scope: &mut TransientScope<'a>,
    ) -> BridgeResult<Vec<RawValue>> {
        args.iter().map(|arg| self.encode_one(arg, scope)).collect()
    }

    fn encode_one<'a>(
        &self,
        arg: &TypedArg,
        scope: &mut TransientScope<'a>,
    ) -> BridgeResult<RawValue> {
        match &arg.value {
            Value::Null => Ok(RawValue::object(RawHandle::NULL)),
            Value::Bool(v) => Ok(RawValue { z: u8::from(*v) }),
            Value::Byte(v) => Ok(RawValue { b: *v }),
            Value::Char(v) => Ok(RawValue { c: *v }),
            Value::Short(v) => Ok(RawValue { s: *v }),
            Value::Int(v) => Ok(RawValue { i: *v }),
            Value::Long(v) => Ok(RawValue { j: *v }),
            Value::Float(v) => Ok(RawValue { f: *v }),
            Value::Double(v) => Ok(RawValue { d: *v }),
            Value::Str(text) => {
                let handle = self.abi().new_string(text)?;
                scope.track(handle);
                Ok(RawValue::object(handle))
            }
            Value::Array(elements) => {
                let element_desc = match &arg.descriptor {
                    TypeDescriptor::Array(element) => element.as_ref().clone(),
                    other => {
                        return Err(BridgeError::Unmappable {
                            what: format!("array value declared as {other}"),
                        });
                    }
                };
                let element_class = match element_desc.class_path() {
                    Some(path) => self.resolve_class(path)?.raw(),
                    None => RawHandle::NULL,
                };
                let raw_elements: Vec<RawValue> = elements
                    .iter()
                    .map(|element| {
                        let typed =
                            TypedArg::with_descriptor(element.clone(), element_desc.clone());
                        self.encode_one(&typed, scope)
                    })
                    .collect::<BridgeResult<_>>()?;
                let array = self.abi().new_array(
                    element_desc.kind(),
                    element_class,
                    &raw_elements,
                );
                scope.track(array);
                Ok(RawValue::object(array))
            }
            Value::Object(object) => {
                let handle = object.require_handle()?;
                Ok(RawValue::object(handle))
            }
            Value::Void => Err(BridgeError::Unmappable {
                what: "void used as an argument".into(),
            }),
        }
    }

    /// Decode a raw result slot according to the declared descriptor.
    fn decode(&self, descriptor: &TypeDescriptor, raw: RawValue) -> BridgeResult<Value> {
        match descriptor {
            TypeDescriptor::Bool => Ok(Value::Bool(unsafe { raw.z } != 0)),
            TypeDescriptor::Byte => Ok(Value::Byte(unsafe { raw.b })),
            TypeDescriptor::Char => Ok(Value::Char(unsafe { raw.c })),
            TypeDescriptor::Short => Ok(Value::Short(unsafe { raw.s })),
            TypeDescriptor::Int => Ok(Value::Int(unsafe { raw.i })),
            TypeDescriptor::Long => Ok(Value::Long(unsafe { raw.j })),
            TypeDescriptor::Float => Ok(Value::Float(unsafe { raw.f })),
            TypeDescriptor::Double => Ok(Value::Double(unsafe { raw.d })),
            TypeDescriptor::Void => Ok(Value::Void),
            TypeDescriptor::Object(_) | TypeDescriptor::Array(_) => {
                self.decode_reference(descriptor, unsafe { raw.l })
            }
        }
    }

    fn decode_reference(
        &self,
        descriptor: &TypeDescriptor,
        handle: RawHandle,
    ) -> BridgeResult<Value> {
        if handle.is_null() {
            return Ok(Value::Null);
        }

        if descriptor.is_string() {
            let text = self.abi().string_contents(handle)?;
            self.abi().release(handle);
            return Ok(Value::Str(text));
        }

        if let TypeDescriptor::Array(element) = descriptor {
            let length = self.abi().array_length(handle);
            let decoded: BridgeResult<Vec<Value>> = (0..length)
                .map(|index| {
                    let raw = self.abi().array_element(handle, index, element.kind());
                    self.decode(element, raw)
                })
                .collect();
            // The container itself is never handed to the host.
            self.abi().release(handle);
            return decoded.map(Value::Array);
        }

        // Wrap by the runtime class of the returned object, not the
        // declared return type. Until the handle is registered, failures
        // must release it here or it leaks.
        let class = self
            .runtime_class_path(handle)
            .and_then(|path| self.resolve_class(&path))
            .inspect_err(|_| self.abi().release(handle))?;
        self.registry().register(handle);
        Ok(Value::Object(Arc::new(BoundObject::bound(
            self.clone(),
            class,
            handle,
        ))))
    }

    /// Ask the JVM for an object's class and read its name through
    /// `java.lang.Class.getName`.
    fn runtime_class_path(&self, object: RawHandle) -> BridgeResult<String> {
        let class_object = self.abi().object_class(object);
        if class_object.is_null() {
            return Err(BridgeError::Unmappable {
                what: "object with no resolvable runtime class".into(),
            });
        }
        let class_class = self.resolve_class("java/lang/Class")?;
        let name = self.invoke_method(
            &class_class,
            Some(class_object),
            "getName",
            &TypeDescriptor::string(),
            &[],
        );
        self.abi().release(class_object);
        match name? {
            Value::Str(path) => Ok(path.replace('.', "/")),
            other => Err(BridgeError::Unmappable {
                what: format!("Class.getName returned {other:?}"),
            }),
        }
    }
}
