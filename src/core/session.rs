//! Purpose: Own one libyamlscript isolate and expose `compile`/`load` over it.
//! Exports: `Session`, `load_once`.
//! Role: The user-facing handle; ties locator, loader, native calls, and envelope decoding together.
//! Invariants: State is `Ready` or `Closed`; `Closed` is terminal and never re-enters native code.
//! Invariants: The state mutex is held across every native call, so calls on one isolate are serialized
//!             and `close` waits for an in-flight call.
//! Invariants: Sources are passed to the native layer byte-for-byte; no trimming or escaping.
use std::ffi::CString;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::envelope::Envelope;
use crate::core::error::{Error, ErrorKind};
use crate::core::locator::Locator;
use crate::core::native::{IsolateThread, NativeLibrary, Request};

/// A YAMLScript engine session backed by one native isolate.
///
/// ```no_run
/// use yamlscript::api::Session;
///
/// let ys = Session::open()?;
/// let data = ys.load("!yamlscript/v0/data\nkey: ! inc(42)\n")?;
/// assert_eq!(data["key"], 43);
/// ys.close()?;
/// # Ok::<(), yamlscript::api::Error>(())
/// ```
///
/// Dropping a session tears its isolate down; call [`Session::close`] to
/// observe teardown failures.
#[derive(Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    library: Arc<NativeLibrary>,
    state: Mutex<State>,
}

#[derive(Debug)]
enum State {
    Ready(IsolateThread),
    Closed,
}

impl Session {
    /// Locate the library from the process environment and open a session.
    pub fn open() -> Result<Self, Error> {
        Self::open_with(&Locator::from_env())
    }

    pub fn open_with(locator: &Locator) -> Result<Self, Error> {
        let path = locator.locate()?;
        Self::from_path(path)
    }

    /// Open a session on the library at `path`, bypassing the locator.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::with_library(NativeLibrary::open(path)?)
    }

    pub fn with_library(library: Arc<NativeLibrary>) -> Result<Self, Error> {
        let thread = library.create_isolate()?;
        Ok(Self {
            inner: Arc::new(SessionInner {
                library,
                state: Mutex::new(State::Ready(thread)),
            }),
        })
    }

    pub fn library(&self) -> &NativeLibrary {
        &self.inner.library
    }

    /// Translate YAMLScript source to Clojure without evaluating it.
    pub fn compile(&self, source: &str) -> Result<String, Error> {
        self.inner.request(Request::Compile, source)?.into_code()
    }

    /// Compile and evaluate YAMLScript source, returning the resulting data.
    pub fn load(&self, source: &str) -> Result<Value, Error> {
        self.inner.request(Request::Evaluate, source)?.into_data()
    }

    pub fn evaluate(&self, source: &str) -> Result<Value, Error> {
        self.load(source)
    }

    /// Like [`Session::load`], deserializing the result into `T`.
    pub fn load_as<T: DeserializeOwned>(&self, source: &str) -> Result<T, Error> {
        let value = self.load(source)?;
        serde_json::from_value(value).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("evaluated data does not match the requested type")
                .with_source(err)
        })
    }

    /// Run `load` on a worker thread, giving up after `timeout`.
    ///
    /// Native calls cannot be interrupted: on timeout the call keeps running
    /// and keeps this session locked until it returns.
    pub fn load_with_timeout(&self, source: &str, timeout: Duration) -> Result<Value, Error> {
        self.request_detached(Request::Evaluate, source, timeout)?
            .into_data()
    }

    pub fn compile_with_timeout(&self, source: &str, timeout: Duration) -> Result<String, Error> {
        self.request_detached(Request::Compile, source, timeout)?
            .into_code()
    }

    /// Tear down the isolate. Later calls fail with `UseAfterClose`.
    ///
    /// Closing twice is a no-op. A teardown failure is reported once and the
    /// session stays closed.
    pub fn close(&self) -> Result<(), Error> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.lock(), State::Closed)
    }

    /// Address of the native isolate thread while the session is ready.
    pub fn handle(&self) -> Option<usize> {
        match &*self.inner.lock() {
            State::Ready(thread) => Some(thread.addr()),
            State::Closed => None,
        }
    }

    fn request_detached(
        &self,
        request: Request,
        source: &str,
        timeout: Duration,
    ) -> Result<Envelope, Error> {
        let inner = Arc::clone(&self.inner);
        let source = source.to_owned();
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("yamlscript-call".to_string())
            .spawn(move || {
                let _ = tx.send(inner.request(request, &source));
            })
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to spawn native call worker")
                    .with_source(err)
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(?request, timeout_ms = timeout.as_millis() as u64, "abandoning native call");
                Err(Error::new(ErrorKind::Timeout)
                    .with_message(format!(
                        "native call did not finish within {} ms",
                        timeout.as_millis()
                    ))
                    .with_hint("The call keeps running and holds the session until it returns."))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::new(ErrorKind::Internal)
                .with_message("native call worker exited without a result")),
        }
    }
}

/// Open a session, load `source` into `T`, and close the session again.
pub fn load_once<T: DeserializeOwned>(source: &str) -> Result<T, Error> {
    load_once_with(Session::open()?, source)
}

fn load_once_with<T: DeserializeOwned>(session: Session, source: &str) -> Result<T, Error> {
    let value = session.load_as(source)?;
    session.close()?;
    Ok(value)
}

impl SessionInner {
    fn request(&self, request: Request, source: &str) -> Result<Envelope, Error> {
        let raw = {
            let state = self.lock();
            let State::Ready(thread) = &*state else {
                return Err(Error::new(ErrorKind::UseAfterClose)
                    .with_message("session is closed")
                    .with_hint("Open a new Session; a closed session cannot be reused."));
            };
            let source = CString::new(source).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("source contains a NUL byte")
                    .with_source(err)
            })?;
            self.library.request(request, thread, &source)?
        };
        Envelope::parse(&raw)
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Ready(thread) => self.library.tear_down_isolate(thread),
            State::Closed => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let State::Ready(thread) = std::mem::replace(state, State::Closed) {
            if let Err(err) = self.library.tear_down_isolate(thread) {
                tracing::warn!(error = %err, "failed to tear down isolate on drop");
            }
        }
    }
}
