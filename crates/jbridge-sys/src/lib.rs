//! Raw surface of the native bridge library.
//!
//! This crate defines the `#[repr(C)]` types exchanged with the native
//! shared library (`jbridge_native`) that embeds the JVM, and a loader
//! that resolves its exported symbols at runtime. No interop logic lives
//! here; everything above the symbol table belongs to `jbridge-core`.

use std::ffi::{c_char, c_int, c_void};
use std::fmt;
use std::path::Path;

use libloading::Library;
use thiserror::Error;

/// Primitive kind codes shared with the native library.
///
/// The discriminants are part of the ABI and must not change; they match
/// the `Java_Type` enum compiled into the bridge library.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JavaKind {
    Int = 1,
    Bool,
    Byte,
    Char,
    Short,
    Long,
    Float,
    Double,
    Object,
    Void,
}

/// Opaque reference into the JVM's object space.
///
/// Meaningless to the host except as an argument to ABI calls. The zero
/// handle doubles as the "no object" / "not found" sentinel everywhere.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(*mut c_void);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(std::ptr::null_mut());

    pub fn from_addr(addr: usize) -> Self {
        RawHandle(addr as *mut c_void)
    }

    pub fn addr(self) -> usize {
        self.0 as usize
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.addr())
    }
}

// Handles are plain JVM references; the caller is obliged to serialize
// all foreign-runtime access (see jbridge-core's JvmAbi docs), so moving
// them between host threads is safe in itself.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

/// Mirrors the layout and size of JNI's `jvalue` union.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawValue {
    pub z: u8,
    pub b: i8,
    pub c: u16,
    pub s: i16,
    pub i: i32,
    pub j: i64,
    pub f: f32,
    pub d: f64,
    pub l: RawHandle,
}

impl RawValue {
    pub fn zero() -> Self {
        RawValue { j: 0 }
    }

    pub fn object(handle: RawHandle) -> Self {
        RawValue { l: handle }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::zero()
    }
}

/// Result of a method invocation through the ABI.
///
/// When `is_exception` is nonzero, `value.l` holds the thrown object and
/// the pending-exception state in the JVM has already been cleared by
/// the native side.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RawCallResult {
    pub is_void: u8,
    pub is_exception: u8,
    pub value: RawValue,
}

impl RawCallResult {
    pub fn is_void(&self) -> bool {
        self.is_void != 0
    }

    pub fn is_exception(&self) -> bool {
        self.is_exception != 0
    }
}

/// JVM instance pair returned by `jb_create_instance`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawInstance {
    pub jvm: RawHandle,
    pub env: RawHandle,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load bridge library {path}: {source}")]
    Library {
        path: String,
        source: libloading::Error,
    },

    #[error("bridge library is missing symbol {symbol}: {source}")]
    Symbol {
        symbol: &'static str,
        source: libloading::Error,
    },
}

type CreateInstanceFn = unsafe extern "C" fn(*const *const c_char, c_int) -> RawInstance;
type DestroyInstanceFn = unsafe extern "C" fn(RawHandle);
type FindClassFn = unsafe extern "C" fn(RawHandle, *const c_char) -> RawHandle;
type ObjectClassFn = unsafe extern "C" fn(RawHandle, RawHandle) -> RawHandle;
type MemberIdFn =
    unsafe extern "C" fn(RawHandle, RawHandle, *const c_char, *const c_char) -> RawHandle;
type NewObjectFn =
    unsafe extern "C" fn(RawHandle, RawHandle, *const c_char, *const RawValue) -> RawHandle;
type CallFn = unsafe extern "C" fn(
    RawHandle,
    RawHandle,
    RawHandle,
    JavaKind,
    *const RawValue,
) -> RawCallResult;
type GetFieldFn = unsafe extern "C" fn(RawHandle, RawHandle, RawHandle, JavaKind) -> RawValue;
type SetFieldFn = unsafe extern "C" fn(RawHandle, RawHandle, RawHandle, JavaKind, RawValue);
type NewStringFn = unsafe extern "C" fn(RawHandle, *const c_char) -> RawHandle;
type StringCharsFn = unsafe extern "C" fn(RawHandle, RawHandle) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type NewArrayFn = unsafe extern "C" fn(
    RawHandle,
    c_int,
    *const RawValue,
    JavaKind,
    RawHandle,
) -> RawHandle;
type ArrayLengthFn = unsafe extern "C" fn(RawHandle, RawHandle) -> c_int;
type ArrayGetFn = unsafe extern "C" fn(RawHandle, RawHandle, c_int, JavaKind) -> RawValue;
type PendingExceptionFn = unsafe extern "C" fn(RawHandle) -> RawHandle;
type ReleaseFn = unsafe extern "C" fn(RawHandle, RawHandle);
type InstanceOfFn = unsafe extern "C" fn(RawHandle, RawHandle, RawHandle) -> u8;

/// Resolved entry points of the bridge library.
///
/// Function pointers are copied out of the `Library` at load time and
/// stay valid for as long as the owning [`NativeLibrary`] is alive.
#[derive(Clone, Copy)]
pub struct NativeFns {
    pub create_instance: CreateInstanceFn,
    pub destroy_instance: DestroyInstanceFn,
    pub find_class: FindClassFn,
    pub object_class: ObjectClassFn,
    pub method_id: MemberIdFn,
    pub static_method_id: MemberIdFn,
    pub field_id: MemberIdFn,
    pub static_field_id: MemberIdFn,
    pub new_object: NewObjectFn,
    pub call_method: CallFn,
    pub call_static_method: CallFn,
    pub get_field: GetFieldFn,
    pub set_field: SetFieldFn,
    pub get_static_field: GetFieldFn,
    pub set_static_field: SetFieldFn,
    pub new_string: NewStringFn,
    pub string_chars: StringCharsFn,
    pub free: FreeFn,
    pub new_array: NewArrayFn,
    pub array_length: ArrayLengthFn,
    pub array_get: ArrayGetFn,
    pub pending_exception: PendingExceptionFn,
    pub release: ReleaseFn,
    pub instance_of: InstanceOfFn,
}

/// A loaded bridge library plus its resolved symbol table.
pub struct NativeLibrary {
    // Dropped last; the fn pointers in `fns` point into it.
    _lib: Library,
    pub fns: NativeFns,
}

macro_rules! resolve {
    ($lib:expr, $name:literal) => {
        unsafe {
            *$lib
                .get($name)
                .map_err(|source| LoadError::Symbol {
                    symbol: std::str::from_utf8($name).unwrap_or("?"),
                    source,
                })?
        }
    };
}

impl NativeLibrary {
    /// Load the bridge library from an explicit path and resolve every
    /// exported entry point up front, so a partial install fails here
    /// rather than mid-call.
    pub fn load(path: &Path) -> Result<NativeLibrary, LoadError> {
        let lib = unsafe { Library::new(path) }.map_err(|source| LoadError::Library {
            path: path.display().to_string(),
            source,
        })?;

        let fns = NativeFns {
            create_instance: resolve!(lib, b"jb_create_instance"),
            destroy_instance: resolve!(lib, b"jb_destroy_instance"),
            find_class: resolve!(lib, b"jb_find_class"),
            object_class: resolve!(lib, b"jb_object_class"),
            method_id: resolve!(lib, b"jb_method_id"),
            static_method_id: resolve!(lib, b"jb_static_method_id"),
            field_id: resolve!(lib, b"jb_field_id"),
            static_field_id: resolve!(lib, b"jb_static_field_id"),
            new_object: resolve!(lib, b"jb_new_object"),
            call_method: resolve!(lib, b"jb_call_method"),
            call_static_method: resolve!(lib, b"jb_call_static_method"),
            get_field: resolve!(lib, b"jb_get_field"),
            set_field: resolve!(lib, b"jb_set_field"),
            get_static_field: resolve!(lib, b"jb_get_static_field"),
            set_static_field: resolve!(lib, b"jb_set_static_field"),
            new_string: resolve!(lib, b"jb_new_string"),
            string_chars: resolve!(lib, b"jb_string_chars"),
            free: resolve!(lib, b"jb_free"),
            new_array: resolve!(lib, b"jb_new_array"),
            array_length: resolve!(lib, b"jb_array_length"),
            array_get: resolve!(lib, b"jb_array_get"),
            pending_exception: resolve!(lib, b"jb_pending_exception"),
            release: resolve!(lib, b"jb_release"),
            instance_of: resolve!(lib, b"jb_instance_of"),
        };

        Ok(NativeLibrary { _lib: lib, fns })
    }
}

/// Platform file name of the bridge library.
pub fn default_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "jbridge_native.dll"
    } else if cfg!(target_os = "macos") {
        "libjbridge_native.dylib"
    } else {
        "libjbridge_native.so"
    }
}
