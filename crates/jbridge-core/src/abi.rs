//! The foreign ABI seam.
//!
//! [`JvmAbi`] is the exact native surface the interop runtime consumes,
//! expressed as a trait so tests can substitute an instrumented fake for
//! the real bridge library. [`NativeAbi`] is the production
//! implementation over `jbridge-sys`.

use std::ffi::{CStr, CString, c_char};
use std::sync::Arc;

use jbridge_sys::{JavaKind, NativeLibrary, RawCallResult, RawHandle, RawInstance, RawValue};

use crate::error::BridgeResult;

/// The fixed native call surface backing the interop runtime.
///
/// # Threading
///
/// The bridge library is not reenter-safe from multiple host threads:
/// JVM embeddings require a per-thread attach handshake this core does
/// not perform. Callers must serialize all access to one logical thread
/// at a time; the runtime adds no locking of its own around these calls.
pub trait JvmAbi: Send + Sync {
    /// Resolve a class by slash-separated path. Zero handle means not
    /// found (a pending exception may be left behind; see
    /// [`JvmAbi::pending_exception`]).
    fn find_class(&self, class_path: &str) -> BridgeResult<RawHandle>;

    /// Class of an arbitrary object instance.
    fn object_class(&self, object: RawHandle) -> RawHandle;

    /// Resolve a method by exact name + signature. Zero handle on miss.
    fn method_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle>;

    /// Resolve a field by name + type signature. Zero handle on miss.
    fn field_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle>;

    /// Construct an object; `signature` selects the constructor
    /// overload. Zero handle means the constructor threw.
    fn new_object(
        &self,
        class: RawHandle,
        signature: &str,
        args: &[RawValue],
    ) -> BridgeResult<RawHandle>;

    /// Invoke a resolved method, requesting the result as `kind`. For
    /// static calls `target` is the class handle.
    fn call(
        &self,
        target: RawHandle,
        method: RawHandle,
        kind: JavaKind,
        args: &[RawValue],
        is_static: bool,
    ) -> RawCallResult;

    /// Read a field value as `kind`. For static fields `target` is the
    /// class handle.
    fn read_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        kind: JavaKind,
        is_static: bool,
    ) -> RawValue;

    /// Write a field value.
    fn write_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        kind: JavaKind,
        value: RawValue,
        is_static: bool,
    );

    /// Allocate a JVM string from host UTF-8.
    fn new_string(&self, text: &str) -> BridgeResult<RawHandle>;

    /// Copy a JVM string's contents into a host string. Does not
    /// release the string object.
    fn string_contents(&self, string: RawHandle) -> BridgeResult<String>;

    /// Allocate an array of `kind` elements. `element_class` is only
    /// consulted for object element kinds.
    fn new_array(&self, kind: JavaKind, element_class: RawHandle, elements: &[RawValue])
    -> RawHandle;

    fn array_length(&self, array: RawHandle) -> i32;

    fn array_element(&self, array: RawHandle, index: i32, kind: JavaKind) -> RawValue;

    /// Check for a pending JVM exception and clear it, returning the
    /// thrown object (zero if none). Resolution failure paths call this
    /// so stale exception state cannot leak into the next call.
    fn pending_exception(&self) -> RawHandle;

    fn instance_of(&self, object: RawHandle, class: RawHandle) -> bool;

    /// Release any foreign handle. Releasing the zero handle is a no-op.
    fn release(&self, handle: RawHandle);

    /// Tear down the foreign runtime instance itself.
    fn destroy(&self);
}

/// Production ABI over the dynamically loaded bridge library.
pub struct NativeAbi {
    lib: Arc<NativeLibrary>,
    env: RawHandle,
    jvm: RawHandle,
}

impl NativeAbi {
    /// Create the JVM instance with the given startup option strings.
    pub fn create(lib: Arc<NativeLibrary>, options: &[String]) -> BridgeResult<NativeAbi> {
        let c_options: Vec<CString> = options
            .iter()
            .map(|opt| CString::new(opt.as_str()))
            .collect::<Result<_, _>>()?;
        let ptrs: Vec<*const c_char> = c_options.iter().map(|opt| opt.as_ptr()).collect();

        let RawInstance { jvm, env } =
            unsafe { (lib.fns.create_instance)(ptrs.as_ptr(), ptrs.len() as i32) };

        Ok(NativeAbi { lib, env, jvm })
    }

    pub fn is_live(&self) -> bool {
        !self.env.is_null()
    }
}

impl JvmAbi for NativeAbi {
    fn find_class(&self, class_path: &str) -> BridgeResult<RawHandle> {
        let path = CString::new(class_path)?;
        Ok(unsafe { (self.lib.fns.find_class)(self.env, path.as_ptr()) })
    }

    fn object_class(&self, object: RawHandle) -> RawHandle {
        unsafe { (self.lib.fns.object_class)(self.env, object) }
    }

    fn method_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let name = CString::new(name)?;
        let signature = CString::new(signature)?;
        let entry = if is_static {
            self.lib.fns.static_method_id
        } else {
            self.lib.fns.method_id
        };
        Ok(unsafe { entry(self.env, class, name.as_ptr(), signature.as_ptr()) })
    }

    fn field_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let name = CString::new(name)?;
        let signature = CString::new(signature)?;
        let entry = if is_static {
            self.lib.fns.static_field_id
        } else {
            self.lib.fns.field_id
        };
        Ok(unsafe { entry(self.env, class, name.as_ptr(), signature.as_ptr()) })
    }

    fn new_object(
        &self,
        class: RawHandle,
        signature: &str,
        args: &[RawValue],
    ) -> BridgeResult<RawHandle> {
        let signature = CString::new(signature)?;
        Ok(unsafe { (self.lib.fns.new_object)(self.env, class, signature.as_ptr(), args.as_ptr()) })
    }

    fn call(
        &self,
        target: RawHandle,
        method: RawHandle,
        kind: JavaKind,
        args: &[RawValue],
        is_static: bool,
    ) -> RawCallResult {
        let entry = if is_static {
            self.lib.fns.call_static_method
        } else {
            self.lib.fns.call_method
        };
        unsafe { entry(self.env, target, method, kind, args.as_ptr()) }
    }

    fn read_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        kind: JavaKind,
        is_static: bool,
    ) -> RawValue {
        let entry = if is_static {
            self.lib.fns.get_static_field
        } else {
            self.lib.fns.get_field
        };
        unsafe { entry(self.env, target, field, kind) }
    }

    fn write_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        kind: JavaKind,
        value: RawValue,
        is_static: bool,
    ) {
        let entry = if is_static {
            self.lib.fns.set_static_field
        } else {
            self.lib.fns.set_field
        };
        unsafe { entry(self.env, target, field, kind, value) }
    }

    fn new_string(&self, text: &str) -> BridgeResult<RawHandle> {
        let text = CString::new(text)?;
        Ok(unsafe { (self.lib.fns.new_string)(self.env, text.as_ptr()) })
    }

    fn string_contents(&self, string: RawHandle) -> BridgeResult<String> {
        unsafe {
            let chars = (self.lib.fns.string_chars)(self.env, string);
            let text = CStr::from_ptr(chars).to_str()?.to_string();
            (self.lib.fns.free)(chars.cast());
            Ok(text)
        }
    }

    fn new_array(
        &self,
        kind: JavaKind,
        element_class: RawHandle,
        elements: &[RawValue],
    ) -> RawHandle {
        unsafe {
            (self.lib.fns.new_array)(
                self.env,
                elements.len() as i32,
                elements.as_ptr(),
                kind,
                element_class,
            )
        }
    }

    fn array_length(&self, array: RawHandle) -> i32 {
        unsafe { (self.lib.fns.array_length)(self.env, array) }
    }

    fn array_element(&self, array: RawHandle, index: i32, kind: JavaKind) -> RawValue {
        unsafe { (self.lib.fns.array_get)(self.env, array, index, kind) }
    }

    fn pending_exception(&self) -> RawHandle {
        unsafe { (self.lib.fns.pending_exception)(self.env) }
    }

    fn instance_of(&self, object: RawHandle, class: RawHandle) -> bool {
        unsafe { (self.lib.fns.instance_of)(self.env, object, class) != 0 }
    }

    fn release(&self, handle: RawHandle) {
        if handle.is_null() {
            return;
        }
        unsafe { (self.lib.fns.release)(self.env, handle) }
    }

    fn destroy(&self) {
        if !self.jvm.is_null() {
            unsafe { (self.lib.fns.destroy_instance)(self.jvm) }
        }
    }
}
