//! Runtime context and process bootstrap.
//!
//! A [`Jvm`] owns the ABI, the class/member resolution caches, the live
//! object registry, and the contract registries. There is no global
//! state: everything hangs off one context value that is cheap to clone
//! and share.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use jbridge_sys::NativeLibrary;

use crate::abi::{JvmAbi, NativeAbi};
use crate::contract::ClassContract;
use crate::error::{BridgeError, BridgeResult};
use crate::exception::ThrowableSupport;
use crate::object::BoundObject;
use crate::registry::HandleRegistry;
use crate::resolve::{ClassHandle, drain_pending};

/// Environment variable naming the JVM installation directory.
pub const JAVA_HOME_VAR: &str = "JAVA_HOME";

/// Environment variable overriding the bridge library location.
pub const BRIDGE_LIBRARY_VAR: &str = "JBRIDGE_LIBRARY";

/// Startup configuration for a native JVM instance.
///
/// The base library archive (`lib/rt.jar` under the installation) is
/// appended to the `-Djava.class.path` option automatically when the
/// caller has not already listed it.
#[derive(Debug, Default, Clone)]
pub struct JvmOptions {
    java_home: Option<PathBuf>,
    bridge_library: Option<PathBuf>,
    args: Vec<String>,
}

impl JvmOptions {
    pub fn new() -> JvmOptions {
        JvmOptions::default()
    }

    /// JVM installation directory; falls back to `JAVA_HOME`.
    pub fn java_home(mut self, path: impl Into<PathBuf>) -> JvmOptions {
        self.java_home = Some(path.into());
        self
    }

    /// Explicit path to the native bridge library; falls back to
    /// `JBRIDGE_LIBRARY`, then the platform library name on the loader
    /// search path.
    pub fn bridge_library(mut self, path: impl Into<PathBuf>) -> JvmOptions {
        self.bridge_library = Some(path.into());
        self
    }

    /// Add a raw JVM startup option string (`-Xmx512m`,
    /// `-Djava.class.path=...`, ...). Blank options are dropped.
    pub fn arg(mut self, option: impl Into<String>) -> JvmOptions {
        let option = option.into();
        if !option.trim().is_empty() {
            self.args.push(option);
        }
        self
    }

    fn resolved_java_home(&self) -> BridgeResult<PathBuf> {
        let home = match &self.java_home {
            Some(path) => path.clone(),
            None => env::var_os(JAVA_HOME_VAR)
                .map(PathBuf::from)
                .ok_or_else(|| {
                    BridgeError::Locate(format!("{JAVA_HOME_VAR} environment variable not set"))
                })?,
        };
        if !home.is_dir() {
            return Err(BridgeError::Locate(format!(
                "JVM installation directory {} does not exist",
                home.display()
            )));
        }
        // Some installs keep the runtime under a jre/ subdirectory.
        let jre = home.join("jre");
        Ok(if jre.is_dir() { jre } else { home })
    }

    /// Final startup option list, with the base archive on the class path.
    pub(crate) fn startup_args(&self) -> BridgeResult<Vec<String>> {
        let home = self.resolved_java_home()?;
        let rt_jar = home.join("lib").join("rt.jar");
        let rt_jar = rt_jar.to_string_lossy().into_owned();

        let separator = if cfg!(windows) { ';' } else { ':' };
        let mut args = self.args.clone();

        match args
            .iter_mut()
            .find(|arg| arg.starts_with("-Djava.class.path="))
        {
            Some(class_path) => {
                let has_rt = class_path
                    .trim_start_matches("-Djava.class.path=")
                    .split(separator)
                    .any(|entry| Path::new(entry).file_name().is_some_and(|f| f == "rt.jar"));
                if !has_rt {
                    class_path.push(separator);
                    class_path.push_str(&rt_jar);
                }
            }
            None => args.push(format!("-Djava.class.path={rt_jar}")),
        }

        Ok(args)
    }

    pub(crate) fn library_path(&self) -> PathBuf {
        self.bridge_library
            .clone()
            .or_else(|| env::var_os(BRIDGE_LIBRARY_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(jbridge_sys::default_library_name()))
    }
}

pub(crate) struct JvmInner {
    pub(crate) abi: Arc<dyn JvmAbi>,
    pub(crate) classes: DashMap<String, Arc<ClassHandle>>,
    pub(crate) registry: HandleRegistry,
    pub(crate) throwable: OnceCell<ThrowableSupport>,
    pub(crate) contracts: DashMap<String, Arc<ClassContract>>,
    pub(crate) statics: DashMap<String, Arc<BoundObject>>,
    pub(crate) open: AtomicBool,
}

/// Handle to a running interop context.
///
/// Cloning is cheap and shares all caches. The context assumes a single
/// logical thread of foreign-runtime access at a time; see [`JvmAbi`]
/// for the serialization obligation.
#[derive(Clone)]
pub struct Jvm {
    pub(crate) inner: Arc<JvmInner>,
}

impl Jvm {
    /// Start a native JVM with the given options.
    pub fn start(options: JvmOptions) -> BridgeResult<Jvm> {
        let args = options.startup_args()?;
        let lib = NativeLibrary::load(&options.library_path())?;
        let abi = NativeAbi::create(Arc::new(lib), &args)?;
        if !abi.is_live() {
            return Err(BridgeError::RuntimeNotInitialized);
        }
        Ok(Jvm::with_abi(Arc::new(abi)))
    }

    /// Build a context over any ABI implementation. This is the seam the
    /// test harness uses to substitute an instrumented fake runtime.
    pub fn with_abi(abi: Arc<dyn JvmAbi>) -> Jvm {
        Jvm {
            inner: Arc::new(JvmInner {
                abi,
                classes: DashMap::new(),
                registry: HandleRegistry::new(),
                throwable: OnceCell::new(),
                contracts: DashMap::new(),
                statics: DashMap::new(),
                open: AtomicBool::new(true),
            }),
        }
    }

    pub(crate) fn abi(&self) -> &dyn JvmAbi {
        self.inner.abi.as_ref()
    }

    pub(crate) fn registry(&self) -> &HandleRegistry {
        &self.inner.registry
    }

    pub(crate) fn ensure_open(&self) -> BridgeResult<()> {
        if self.inner.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BridgeError::RuntimeNotInitialized)
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Number of live registered foreign object handles.
    pub fn live_objects(&self) -> usize {
        self.inner.registry.live_count()
    }

    /// Resolve a class by path (dots or slashes), cached per context.
    ///
    /// A second call with the same path returns the cached handle
    /// without another foreign lookup.
    pub fn resolve_class(&self, class_path: &str) -> BridgeResult<Arc<ClassHandle>> {
        self.ensure_open()?;
        let class_path = class_path.replace('.', "/");
        if let Some(cached) = self.inner.classes.get(&class_path) {
            return Ok(Arc::clone(&cached));
        }

        let raw = self.abi().find_class(&class_path)?;
        if raw.is_null() {
            drain_pending(self.abi());
            return Err(BridgeError::ClassNotFound { class_path });
        }

        let handle = Arc::new(ClassHandle::new(class_path.clone(), raw));
        // Idempotent overwrite: a racing first use may already have
        // inserted; last write wins and the duplicate raw handle is
        // released at teardown with everything else.
        self.inner.classes.insert(class_path, Arc::clone(&handle));
        Ok(handle)
    }

    /// Register a contract so returned objects of its class can be
    /// wrapped by runtime type.
    pub fn register_contract(&self, contract: Arc<ClassContract>) {
        self.inner
            .contracts
            .insert(contract.class_path().to_string(), contract);
    }

    pub(crate) fn contract_for(&self, class_path: &str) -> Option<Arc<ClassContract>> {
        self.inner
            .contracts
            .get(class_path)
            .map(|entry| Arc::clone(&entry))
    }

    /// Tear the runtime down: release every registered object handle,
    /// every cached member handle and class handle, then destroy the
    /// instance. Any call through this context afterwards fails with
    /// [`BridgeError::RuntimeNotInitialized`].
    pub fn shutdown(&self) {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            self.inner.statics.clear();
            self.inner.registry.release_all(self.abi());
            let classes: Vec<Arc<ClassHandle>> = self
                .inner
                .classes
                .iter()
                .map(|entry| Arc::clone(&entry))
                .collect();
            self.inner.classes.clear();
            for class in classes {
                class.release_all(self.abi());
            }
            self.abi().destroy();
        }
    }
}
