//! Purpose: Define the public Rust API boundary for the yamlscript binding.
//! Exports: `Session`, `load_once`, `Locator`, `NativeLibrary`, errors, and the explicit `global` session.
//! Role: Public, additive-only surface used by the CLI and downstream crates.
//! Invariants: This module is the only public path to core types.
//! Invariants: Raw native calls stay private; only typed entry points are exposed.

pub mod global;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::locator::{
    LIBRARY_NAME, LIBYAMLSCRIPT_VERSION, Locator, Platform, SEARCH_PATH_ENV, library_filename,
};
pub use crate::core::native::{NativeApi, NativeLibrary, sys};
pub use crate::core::session::{Session, load_once};
