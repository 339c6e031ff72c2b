// Core modules: library discovery, native calls, envelope decoding, sessions, errors.
pub mod envelope;
pub mod error;
pub mod locator;
pub mod native;
pub mod session;
