// Raw C ABI of libyamlscript (GraalVM native-image entry points).
use libc::{c_char, c_int, c_void};

pub type GraalCreateIsolateFn = unsafe extern "C" fn(
    params: *mut c_void,
    isolate: *mut *mut c_void,
    thread: *mut *mut c_void,
) -> c_int;

pub type GraalTearDownIsolateFn = unsafe extern "C" fn(thread: *mut c_void) -> c_int;

/// Shared shape of `compile_ys_to_clj`, `eval_ys_to_json` and `load_ys_to_json`.
/// The returned buffer belongs to the native runtime.
pub type YsRequestFn = unsafe extern "C" fn(thread: *mut c_void, source: *const c_char) -> *mut c_char;

pub const GRAAL_CREATE_ISOLATE: &[u8] = b"graal_create_isolate\0";
pub const GRAAL_TEAR_DOWN_ISOLATE: &[u8] = b"graal_tear_down_isolate\0";
pub const COMPILE_YS_TO_CLJ: &[u8] = b"compile_ys_to_clj\0";
pub const EVAL_YS_TO_JSON: &[u8] = b"eval_ys_to_json\0";
pub const LOAD_YS_TO_JSON: &[u8] = b"load_ys_to_json\0";
