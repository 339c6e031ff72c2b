//! Purpose: Rust binding for the libyamlscript shared library.
//! Exports: `api` (sessions, locator, native library handle, errors, global session).
//! Role: Library crate backing the `yamlscript` CLI and downstream users.
//! Invariants: The YAMLScript engine lives in the native library; this crate only
//!             locates it, calls it, and decodes its JSON replies.
//! Invariants: Binds to exactly one libyamlscript version (`api::LIBYAMLSCRIPT_VERSION`).
pub mod api;
mod core;
