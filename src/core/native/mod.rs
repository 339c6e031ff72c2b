//! Purpose: Safe wrappers around the dynamically loaded libyamlscript C ABI.
//! Exports: `NativeLibrary`, `NativeApi`, `IsolateThread`, `Request`.
//! Role: Loads the shared library once per path and performs every raw native call.
//! Invariants: Libraries are cached per path for the process lifetime and never unloaded.
//! Invariants: An `IsolateThread` is consumed by teardown, so a torn-down isolate cannot be reused.
//! Invariants: All FFI interaction is confined to this module + `sys`.
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::core::error::{Error, ErrorKind};

#[cfg(test)]
pub(crate) mod stub;
pub mod sys;

/// Typed entry points resolved from libyamlscript.
///
/// `compile_ys_to_clj` and the two evaluation entry points are optional
/// because different library releases export different subsets; at least one
/// of `eval_ys_to_json`/`load_ys_to_json` must be present.
#[derive(Clone, Copy)]
pub struct NativeApi {
    pub create_isolate: sys::GraalCreateIsolateFn,
    pub tear_down_isolate: sys::GraalTearDownIsolateFn,
    pub compile_ys_to_clj: Option<sys::YsRequestFn>,
    pub eval_ys_to_json: Option<sys::YsRequestFn>,
    pub load_ys_to_json: Option<sys::YsRequestFn>,
}

impl fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeApi")
            .field("compile_ys_to_clj", &self.compile_ys_to_clj.is_some())
            .field("eval_ys_to_json", &self.eval_ys_to_json.is_some())
            .field("load_ys_to_json", &self.load_ys_to_json.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Request {
    Compile,
    Evaluate,
}

impl NativeApi {
    fn entry_point(&self, request: Request) -> Option<(&'static str, sys::YsRequestFn)> {
        match request {
            Request::Compile => self
                .compile_ys_to_clj
                .map(|entry| ("compile_ys_to_clj", entry)),
            Request::Evaluate => self
                .eval_ys_to_json
                .map(|entry| ("eval_ys_to_json", entry))
                .or_else(|| self.load_ys_to_json.map(|entry| ("load_ys_to_json", entry))),
        }
    }
}

/// Native isolate thread handle owned by one session.
#[derive(Debug)]
pub(crate) struct IsolateThread {
    ptr: NonNull<libc::c_void>,
}

// Only moved between threads behind the session mutex, never shared.
unsafe impl Send for IsolateThread {}

impl IsolateThread {
    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

#[derive(Debug)]
pub struct NativeLibrary {
    path: PathBuf,
    api: NativeApi,
    _library: Option<libloading::Library>,
}

impl NativeLibrary {
    /// Load the library at `path`, reusing an earlier load of the same path.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>, Error> {
        let path = path.as_ref();
        let mut loaded = registry().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(library) = loaded.get(path) {
            return Ok(Arc::clone(library));
        }
        let library = Arc::new(Self::load(path)?);
        loaded.insert(path.to_path_buf(), Arc::clone(&library));
        Ok(library)
    }

    /// Wrap entry points that are already linked into the process, such as a
    /// statically linked libyamlscript. `label` is only used in diagnostics.
    ///
    /// # Safety
    ///
    /// Every entry point in `api` must follow the libyamlscript C ABI:
    /// `create_isolate` writes a valid thread handle on success, and each
    /// request entry point returns either NULL or a NUL-terminated string that
    /// stays valid until the next call on the same thread.
    ///
    /// Calling it outside an `unsafe` block does not compile:
    ///
    /// ```compile_fail,E0133
    /// use yamlscript::api::{NativeApi, NativeLibrary};
    ///
    /// fn wrap(api: NativeApi) {
    ///     let _ = NativeLibrary::from_api("linked", api);
    /// }
    /// ```
    pub unsafe fn from_api(label: impl Into<PathBuf>, api: NativeApi) -> Arc<Self> {
        Arc::new(Self {
            path: label.into(),
            api,
            _library: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    fn load(path: &Path) -> Result<Self, Error> {
        tracing::debug!(path = %path.display(), "loading libyamlscript");
        // Loading runs the library's initializers; libyamlscript has none with
        // preconditions beyond being a GraalVM native image.
        let library = unsafe { libloading::Library::new(path) }.map_err(|err| {
            Error::new(ErrorKind::LibraryLoad)
                .with_message("failed to load shared library")
                .with_path(path)
                .with_source(err)
        })?;

        let api = unsafe {
            NativeApi {
                create_isolate: required(&library, path, sys::GRAAL_CREATE_ISOLATE)?,
                tear_down_isolate: required(&library, path, sys::GRAAL_TEAR_DOWN_ISOLATE)?,
                compile_ys_to_clj: optional(&library, sys::COMPILE_YS_TO_CLJ),
                eval_ys_to_json: optional(&library, sys::EVAL_YS_TO_JSON),
                load_ys_to_json: optional(&library, sys::LOAD_YS_TO_JSON),
            }
        };
        if api.eval_ys_to_json.is_none() && api.load_ys_to_json.is_none() {
            return Err(Error::new(ErrorKind::LibraryLoad)
                .with_message("library exports neither eval_ys_to_json nor load_ys_to_json")
                .with_path(path));
        }

        Ok(Self {
            path: path.to_path_buf(),
            api,
            _library: Some(library),
        })
    }

    pub(crate) fn create_isolate(&self) -> Result<IsolateThread, Error> {
        let mut isolate: *mut libc::c_void = ptr::null_mut();
        let mut thread: *mut libc::c_void = ptr::null_mut();
        let rc = unsafe { (self.api.create_isolate)(ptr::null_mut(), &mut isolate, &mut thread) };
        if rc != 0 {
            return Err(Error::new(ErrorKind::IsolateCreationFailed)
                .with_message("failed to create isolate")
                .with_path(&self.path)
                .with_code(rc));
        }
        let ptr = NonNull::new(thread).ok_or_else(|| {
            Error::new(ErrorKind::IsolateCreationFailed)
                .with_message("isolate creation returned a null thread")
                .with_path(&self.path)
        })?;
        tracing::debug!(thread = ptr.as_ptr() as usize, "created isolate");
        Ok(IsolateThread { ptr })
    }

    pub(crate) fn tear_down_isolate(&self, thread: IsolateThread) -> Result<(), Error> {
        let rc = unsafe { (self.api.tear_down_isolate)(thread.ptr.as_ptr()) };
        if rc != 0 {
            return Err(Error::new(ErrorKind::TeardownFailed)
                .with_message("failed to tear down isolate")
                .with_path(&self.path)
                .with_code(rc));
        }
        tracing::debug!(thread = thread.addr(), "tore down isolate");
        Ok(())
    }

    /// Call a request entry point and copy out the JSON text it returns.
    pub(crate) fn request(
        &self,
        request: Request,
        thread: &IsolateThread,
        source: &CStr,
    ) -> Result<String, Error> {
        let (name, entry) = self.api.entry_point(request).ok_or_else(|| {
            Error::new(ErrorKind::LibraryLoad)
                .with_message(format!("library does not export an entry point for {request:?}"))
                .with_path(&self.path)
        })?;
        tracing::debug!(entry = name, bytes = source.to_bytes().len(), "calling libyamlscript");

        let raw = unsafe { entry(thread.ptr.as_ptr(), source.as_ptr()) };
        if raw.is_null() {
            return Err(Error::new(ErrorKind::Protocol)
                .with_message(format!("{name} returned a null pointer")));
        }
        // The buffer stays owned by the native runtime; copy it before the next call.
        let text = unsafe { CStr::from_ptr(raw) }.to_str().map_err(|err| {
            Error::new(ErrorKind::Protocol)
                .with_message(format!("{name} returned invalid UTF-8"))
                .with_source(err)
        })?;
        Ok(text.to_owned())
    }
}

fn registry() -> &'static Mutex<HashMap<PathBuf, Arc<NativeLibrary>>> {
    static LOADED: OnceLock<Mutex<HashMap<PathBuf, Arc<NativeLibrary>>>> = OnceLock::new();
    LOADED.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Resolve a symbol that must exist.
///
/// `T` must be the function pointer type matching the symbol's C signature.
unsafe fn required<T: Copy>(
    library: &libloading::Library,
    path: &Path,
    name: &[u8],
) -> Result<T, Error> {
    let symbol = unsafe { library.get::<T>(name) }.map_err(|err| {
        Error::new(ErrorKind::LibraryLoad)
            .with_message(format!("missing symbol {}", symbol_name(name)))
            .with_path(path)
            .with_source(err)
    })?;
    Ok(*symbol)
}

unsafe fn optional<T: Copy>(library: &libloading::Library, name: &[u8]) -> Option<T> {
    match unsafe { library.get::<T>(name) } {
        Ok(symbol) => Some(*symbol),
        Err(_) => {
            tracing::debug!(symbol = %symbol_name(name), "optional symbol not exported");
            None
        }
    }
}

fn symbol_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name)).into_owned()
}
