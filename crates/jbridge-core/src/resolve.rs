//! Class and member resolution cache.
//!
//! One [`ClassHandle`] exists per class path per runtime context,
//! created lazily and retained for the context's lifetime (classes are
//! treated as immortal; the JVM does not unload them under this core).
//! Member handles are cached per class under exact
//! (name, signature, static) keys; overload selection is exact-signature
//! match, never arity guessing.
//!
//! Cache population is idempotent: concurrent first-use races resolve
//! the same member twice and the last write wins, which costs a foreign
//! round trip but never correctness.

use dashmap::DashMap;

use jbridge_sys::RawHandle;

use crate::abi::JvmAbi;
use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    name: String,
    signature: String,
    is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FieldKey {
    name: String,
    is_static: bool,
}

/// A resolved JVM class plus its member caches.
pub struct ClassHandle {
    class_path: String,
    raw: RawHandle,
    methods: DashMap<MethodKey, RawHandle>,
    fields: DashMap<FieldKey, RawHandle>,
}

impl ClassHandle {
    pub(crate) fn new(class_path: String, raw: RawHandle) -> ClassHandle {
        ClassHandle {
            class_path,
            raw,
            methods: DashMap::new(),
            fields: DashMap::new(),
        }
    }

    /// Slash-separated fully-qualified class path.
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Look up a method by exact signature, hitting the cache first.
    ///
    /// On a miss the JVM's pending-exception state is drained before the
    /// error is returned, so a bad signature cannot poison the next
    /// unrelated call. Failed lookups are not cached; a later lookup
    /// with a corrected signature resolves normally.
    pub(crate) fn resolve_method(
        &self,
        abi: &dyn JvmAbi,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let key = MethodKey {
            name: name.to_string(),
            signature: signature.to_string(),
            is_static,
        };
        if let Some(cached) = self.methods.get(&key) {
            return Ok(*cached);
        }

        let handle = abi.method_id(self.raw, name, signature, is_static)?;
        if handle.is_null() {
            drain_pending(abi);
            return Err(BridgeError::method_not_found(
                &self.class_path,
                name,
                signature,
            ));
        }

        self.methods.insert(key, handle);
        Ok(handle)
    }

    /// Look up a field id, cached by (name, static).
    pub(crate) fn resolve_field(
        &self,
        abi: &dyn JvmAbi,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let key = FieldKey {
            name: name.to_string(),
            is_static,
        };
        if let Some(cached) = self.fields.get(&key) {
            return Ok(*cached);
        }

        let handle = abi.field_id(self.raw, name, signature, is_static)?;
        if handle.is_null() {
            drain_pending(abi);
            return Err(BridgeError::field_not_found(
                &self.class_path,
                name,
                signature,
            ));
        }

        self.fields.insert(key, handle);
        Ok(handle)
    }

    /// Release every cached member handle and the class handle itself.
    /// Only called from whole-runtime teardown.
    pub(crate) fn release_all(&self, abi: &dyn JvmAbi) {
        for entry in self.methods.iter() {
            abi.release(*entry.value());
        }
        self.methods.clear();
        for entry in self.fields.iter() {
            abi.release(*entry.value());
        }
        self.fields.clear();
        abi.release(self.raw);
    }
}

impl std::fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassHandle")
            .field("class_path", &self.class_path)
            .field("raw", &self.raw)
            .field("methods", &self.methods.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Clear any pending foreign exception left behind by a failed lookup,
/// releasing the thrown object. Failures here are swallowed: this runs
/// on an error path already.
pub(crate) fn drain_pending(abi: &dyn JvmAbi) {
    let pending = abi.pending_exception();
    if !pending.is_null() {
        abi.release(pending);
    }
}
