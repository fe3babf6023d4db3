//! Host wrappers around live foreign objects.
//!
//! A [`BoundObject`] associates one host identity with exactly one
//! foreign handle. It moves through Unbound → Bound → Released and is
//! never rebound after release: any call on a released or unbound
//! wrapper fails instead of dereferencing a stale handle.

use std::sync::Arc;

use parking_lot::Mutex;

use jbridge_sys::RawHandle;

use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::jvm::Jvm;
use crate::resolve::ClassHandle;
use crate::value::{TypedArg, Value};

/// Whether a wrapper fronts a single instance or a contract's shared
/// static target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Instance,
    Static,
}

pub struct BoundObject {
    jvm: Jvm,
    class: Arc<ClassHandle>,
    handle: Mutex<RawHandle>,
    facet: Facet,
}

impl BoundObject {
    /// Wrap an already-live foreign handle. The caller has registered
    /// the handle with the lifetime registry.
    pub(crate) fn bound(jvm: Jvm, class: Arc<ClassHandle>, handle: RawHandle) -> BoundObject {
        BoundObject {
            jvm,
            class,
            handle: Mutex::new(handle),
            facet: Facet::Instance,
        }
    }

    /// The shared static target for a class; it holds no instance and
    /// rejects instance operations.
    pub(crate) fn static_facet(jvm: Jvm, class: Arc<ClassHandle>) -> BoundObject {
        BoundObject {
            jvm,
            class,
            handle: Mutex::new(RawHandle::NULL),
            facet: Facet::Static,
        }
    }

    pub fn class_path(&self) -> &str {
        self.class.class_path()
    }

    pub fn facet(&self) -> Facet {
        self.facet
    }

    /// True while the wrapper holds a live foreign handle.
    pub fn is_bound(&self) -> bool {
        !self.handle.lock().is_null()
    }

    pub(crate) fn require_handle(&self) -> BridgeResult<RawHandle> {
        let handle = *self.handle.lock();
        if handle.is_null() {
            return Err(BridgeError::NotBound {
                class_path: self.class_path().to_string(),
            });
        }
        Ok(handle)
    }

    fn reject_on_static_facet(&self, name: &str) -> BridgeResult<()> {
        if self.facet == Facet::Static {
            return Err(BridgeError::InstanceOnStatic {
                class_path: self.class_path().to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Invoke an instance method on the backing object.
    pub fn call(
        &self,
        name: &str,
        returns: &TypeDescriptor,
        args: &[TypedArg],
    ) -> BridgeResult<Value> {
        self.reject_on_static_facet(name)?;
        let handle = self.require_handle()?;
        self.jvm
            .invoke_method(&self.class, Some(handle), name, returns, args)
    }

    /// Invoke a static method on the owning class.
    pub fn call_static(
        &self,
        name: &str,
        returns: &TypeDescriptor,
        args: &[TypedArg],
    ) -> BridgeResult<Value> {
        self.jvm.invoke_method(&self.class, None, name, returns, args)
    }

    /// Read an instance field.
    pub fn get_field(&self, name: &str, descriptor: &TypeDescriptor) -> BridgeResult<Value> {
        self.reject_on_static_facet(name)?;
        let handle = self.require_handle()?;
        self.jvm
            .read_field_value(&self.class, Some(handle), name, descriptor)
    }

    /// Write an instance field.
    pub fn set_field(&self, name: &str, arg: &TypedArg) -> BridgeResult<()> {
        self.reject_on_static_facet(name)?;
        let handle = self.require_handle()?;
        self.jvm
            .write_field_value(&self.class, Some(handle), name, arg)
    }

    pub fn get_static_field(
        &self,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> BridgeResult<Value> {
        self.jvm.read_field_value(&self.class, None, name, descriptor)
    }

    pub fn set_static_field(&self, name: &str, arg: &TypedArg) -> BridgeResult<()> {
        self.jvm.write_field_value(&self.class, None, name, arg)
    }

    /// Instance-of test against a class path.
    pub fn instance_of(&self, class_path: &str) -> BridgeResult<bool> {
        self.reject_on_static_facet("instanceOf")?;
        let handle = self.require_handle()?;
        let class = self.jvm.resolve_class(class_path)?;
        Ok(self.jvm.abi().instance_of(handle, class.raw()))
    }

    /// The foreign `toString` of the backing object; falls back to the
    /// class path when unbound.
    pub fn to_java_string(&self) -> BridgeResult<String> {
        if !self.is_bound() {
            return Ok(self.class_path().to_string());
        }
        match self.call("toString", &TypeDescriptor::string(), &[])? {
            Value::Str(text) => Ok(text),
            _ => Ok(self.class_path().to_string()),
        }
    }

    /// Release the backing foreign handle. Idempotent: the second and
    /// later calls are no-ops, and the wrapper can never be used again.
    pub fn release(&self) {
        let handle = {
            let mut guard = self.handle.lock();
            std::mem::replace(&mut *guard, RawHandle::NULL)
        };
        if !handle.is_null() && self.jvm.is_open() {
            self.jvm.registry().release(self.jvm.abi(), handle);
        }
    }
}

impl PartialEq for BoundObject {
    /// Two wrappers are equal when they front the same foreign handle.
    fn eq(&self, other: &BoundObject) -> bool {
        let own = *self.handle.lock();
        let theirs = *other.handle.lock();
        !own.is_null() && own == theirs
    }
}

impl std::fmt::Debug for BoundObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundObject")
            .field("class_path", &self.class_path())
            .field("handle", &*self.handle.lock())
            .field("facet", &self.facet)
            .finish()
    }
}

/// Safety net only: explicit [`BoundObject::release`] is the primary
/// discipline, drop timing is not guaranteed to be timely.
impl Drop for BoundObject {
    fn drop(&mut self) {
        self.release();
    }
}
