// In-process stand-in for libyamlscript used by unit tests.
//
// Each isolate is a leaked `StubIsolate` whose address doubles as the thread
// handle, so tests can inspect per-isolate call counts without global state.
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libc::{c_char, c_int, c_void};
use serde_json::json;

use super::{NativeApi, NativeLibrary};

#[derive(Default)]
pub(crate) struct StubIsolate {
    compiles: AtomicUsize,
    evals: AtomicUsize,
    loads: AtomicUsize,
    teardowns: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_source: Mutex<Option<String>>,
    response: Mutex<Option<CString>>,
}

impl StubIsolate {
    pub(crate) fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub(crate) fn evals(&self) -> usize {
        self.evals.load(Ordering::SeqCst)
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn native_calls(&self) -> usize {
        self.compiles() + self.evals() + self.loads()
    }

    pub(crate) fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn last_source(&self) -> Option<String> {
        self.last_source.lock().expect("lock").clone()
    }
}

pub(crate) fn api() -> NativeApi {
    NativeApi {
        create_isolate,
        tear_down_isolate,
        compile_ys_to_clj: Some(compile_ys_to_clj),
        eval_ys_to_json: Some(eval_ys_to_json),
        load_ys_to_json: Some(load_ys_to_json),
    }
}

pub(crate) fn library() -> Arc<NativeLibrary> {
    library_with(api())
}

pub(crate) fn library_with(api: NativeApi) -> Arc<NativeLibrary> {
    // The stub entry points return NULL or a string owned by their isolate.
    unsafe { NativeLibrary::from_api("stub/libyamlscript.so", api) }
}

/// Stub state behind a thread handle; stub isolates are never freed.
pub(crate) fn state(handle: usize) -> &'static StubIsolate {
    unsafe { &*(handle as *const StubIsolate) }
}

pub(crate) unsafe extern "C" fn create_isolate(
    _params: *mut c_void,
    isolate: *mut *mut c_void,
    thread: *mut *mut c_void,
) -> c_int {
    let stub = Box::into_raw(Box::new(StubIsolate::default())).cast::<c_void>();
    unsafe {
        *isolate = stub;
        *thread = stub;
    }
    0
}

pub(crate) unsafe extern "C" fn create_isolate_failing(
    _params: *mut c_void,
    _isolate: *mut *mut c_void,
    _thread: *mut *mut c_void,
) -> c_int {
    7
}

pub(crate) unsafe extern "C" fn tear_down_isolate(thread: *mut c_void) -> c_int {
    let stub = unsafe { &*(thread as *const StubIsolate) };
    if stub.teardowns.fetch_add(1, Ordering::SeqCst) == 0 {
        0
    } else {
        99
    }
}

pub(crate) unsafe extern "C" fn tear_down_isolate_failing(thread: *mut c_void) -> c_int {
    let stub = unsafe { &*(thread as *const StubIsolate) };
    stub.teardowns.fetch_add(1, Ordering::SeqCst);
    3
}

unsafe extern "C" fn compile_ys_to_clj(thread: *mut c_void, source: *const c_char) -> *mut c_char {
    let stub = unsafe { &*(thread as *const StubIsolate) };
    stub.compiles.fetch_add(1, Ordering::SeqCst);
    let source = unsafe { CStr::from_ptr(source) }.to_string_lossy().into_owned();
    respond(stub, &source, compile_response)
}

unsafe extern "C" fn eval_ys_to_json(thread: *mut c_void, source: *const c_char) -> *mut c_char {
    let stub = unsafe { &*(thread as *const StubIsolate) };
    stub.evals.fetch_add(1, Ordering::SeqCst);
    let source = unsafe { CStr::from_ptr(source) }.to_string_lossy().into_owned();
    respond(stub, &source, eval_response)
}

pub(crate) unsafe extern "C" fn load_ys_to_json(
    thread: *mut c_void,
    source: *const c_char,
) -> *mut c_char {
    let stub = unsafe { &*(thread as *const StubIsolate) };
    stub.loads.fetch_add(1, Ordering::SeqCst);
    let source = unsafe { CStr::from_ptr(source) }.to_string_lossy().into_owned();
    respond(stub, &source, eval_response)
}

fn respond(stub: &StubIsolate, source: &str, render: fn(&str) -> String) -> *mut c_char {
    let now = stub.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stub.max_in_flight.fetch_max(now, Ordering::SeqCst);
    *stub.last_source.lock().expect("lock") = Some(source.to_string());

    if source.contains("slow") {
        std::thread::sleep(Duration::from_millis(20));
    }
    if source.contains("sleep") {
        std::thread::sleep(Duration::from_millis(300));
    }

    let response = if source.contains("null response") {
        None
    } else if source.contains("invalid utf8") {
        Some(CString::new(vec![0xff, 0xfe, b'{']).expect("cstring"))
    } else {
        Some(CString::new(render(source)).expect("cstring"))
    };

    stub.in_flight.fetch_sub(1, Ordering::SeqCst);
    let mut slot = stub.response.lock().expect("lock");
    *slot = response;
    slot.as_ref()
        .map(|text| text.as_ptr().cast_mut())
        .unwrap_or(std::ptr::null_mut())
}

fn compile_response(source: &str) -> String {
    if let Some(error) = error_response(source) {
        return error;
    }
    if source.contains("malformed") {
        return json!({"status": "ok"}).to_string();
    }
    let code = match source {
        "=> 1 + 1" => "(+ 1 1)".to_string(),
        other => format!("(do {other:?})"),
    };
    json!({ "code": code }).to_string()
}

fn eval_response(source: &str) -> String {
    if let Some(error) = error_response(source) {
        return error;
    }
    if source.contains("malformed") {
        return json!({"status": "ok"}).to_string();
    }
    let data = match source {
        "=> 1 + 1" => json!(2),
        "typed" => json!({"say": "Hello", "key": 43, "baz": [1, 2, 3, 4, 5]}),
        other if other.trim().is_empty() => json!(null),
        other => json!(other),
    };
    json!({ "data": data }).to_string()
}

fn error_response(source: &str) -> Option<String> {
    source.contains("syntax error").then(|| {
        json!({
            "error": {
                "cause": "Unexpected token ':' at line 1",
                "type": "clojure.lang.ExceptionInfo",
                "trace": ["yamlscript.parser/parse"],
            }
        })
        .to_string()
    })
}
