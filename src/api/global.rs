//! Purpose: Optional process-wide session behind top-level `compile`/`load` functions.
//! Exports: `init`, `init_with`, `install`, `is_initialized`, `compile`, `load`, `shutdown`.
//! Role: Ergonomic entry point for programs that want one engine for their whole lifetime.
//! Invariants: Nothing is loaded until `init*`/`install` is called; there is no load-time side effect.
//! Invariants: `shutdown` tears the isolate down after any in-flight call returns.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::core::locator::Locator;
use crate::core::session::Session;

static GLOBAL: Mutex<Option<Arc<Session>>> = Mutex::new(None);

/// Initialize the global session from the process environment.
///
/// Calling `init` while a global session exists does nothing.
pub fn init() -> Result<(), Error> {
    init_with(&Locator::from_env())
}

pub fn init_with(locator: &Locator) -> Result<(), Error> {
    let mut global = lock();
    if global.is_none() {
        *global = Some(Arc::new(Session::open_with(locator)?));
    }
    Ok(())
}

/// Install an already opened session as the global one.
pub fn install(session: Session) -> Result<(), Error> {
    let mut global = lock();
    if global.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("global session is already initialized")
            .with_hint("Call shutdown() before installing another session."));
    }
    *global = Some(Arc::new(session));
    Ok(())
}

pub fn is_initialized() -> bool {
    lock().is_some()
}

pub fn compile(source: &str) -> Result<String, Error> {
    current()?.compile(source)
}

pub fn load(source: &str) -> Result<Value, Error> {
    current()?.load(source)
}

/// Close and forget the global session. A no-op when not initialized.
pub fn shutdown() -> Result<(), Error> {
    let session = lock().take();
    match session {
        Some(session) => session.close(),
        None => Ok(()),
    }
}

fn current() -> Result<Arc<Session>, Error> {
    lock().clone().ok_or_else(|| {
        Error::new(ErrorKind::NotInitialized)
            .with_message("global yamlscript session is not initialized")
            .with_hint("Call yamlscript::api::global::init() first.")
    })
}

fn lock() -> MutexGuard<'static, Option<Arc<Session>>> {
    GLOBAL.lock().unwrap_or_else(PoisonError::into_inner)
}
