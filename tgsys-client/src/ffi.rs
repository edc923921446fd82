//! The C-style JSON ABI.
//!
//! The single supported binding surface for non-native languages: the
//! multi-client functions (`td_create_client_id`, `td_send`,
//! `td_receive`, `td_execute`) over the global manager, and the legacy
//! per-instance functions (`td_json_client_*`) over an opaque pointer.
//! Returned strings are valid until the next call of the same kind on
//! the same thread.

// Layer 1: Standard library
use std::cell::RefCell;
use std::ffi::{c_char, c_double, c_int, c_void, CStr, CString};
use std::sync::Arc;

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use crate::json::{json_create_client_id, json_execute, json_receive, json_send, ClientJson};
use crate::manager::ClientManager;

thread_local! {
    static CURRENT_OUTPUT: RefCell<CString> = RefCell::new(CString::default());
}

fn store_string(value: String) -> *const c_char {
    // Interior NUL bytes cannot appear in the JSON we produce; fall
    // back to an empty string rather than poisoning the slot.
    let c_string = CString::new(value).unwrap_or_default();
    CURRENT_OUTPUT.with(|output| {
        *output.borrow_mut() = c_string;
        output.borrow().as_ptr()
    })
}

unsafe fn slice_from_ptr<'a>(request: *const c_char) -> &'a str {
    if request.is_null() {
        return "";
    }
    // SAFETY: the caller passes a NUL-terminated string.
    match unsafe { CStr::from_ptr(request) }.to_str() {
        Ok(utf8) => utf8,
        Err(_) => "",
    }
}

/// Log message callback of the C surface.
pub type TdLogMessageCallbackPtr = Option<extern "C" fn(c_int, *const c_char)>;

/// Returns an opaque identifier of a new client instance.
#[no_mangle]
pub extern "C" fn td_create_client_id() -> c_int {
    json_create_client_id()
}

/// Sends a request to the client instance.
///
/// # Safety
///
/// `request` must be null or a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn td_send(client_id: c_int, request: *const c_char) {
    json_send(client_id, unsafe { slice_from_ptr(request) });
}

/// Receives the next response or update of any instance, or null when
/// the timeout expires.
#[no_mangle]
pub extern "C" fn td_receive(timeout: c_double) -> *const c_char {
    match json_receive(timeout) {
        Some(response) => store_string(response),
        None => std::ptr::null(),
    }
}

/// Synchronously executes a request of the documented subset.
///
/// # Safety
///
/// `request` must be null or a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn td_execute(request: *const c_char) -> *const c_char {
    store_string(json_execute(unsafe { slice_from_ptr(request) }))
}

/// Installs (or with a null callback removes) the process-wide log
/// message callback. A message at verbosity level 0 aborts the process
/// after the callback returns.
#[no_mangle]
pub extern "C" fn td_set_log_message_callback(
    max_verbosity_level: c_int,
    callback: TdLogMessageCallbackPtr,
) {
    match callback {
        None => ClientManager::set_log_message_callback(0, None),
        Some(callback) => ClientManager::set_log_message_callback(
            max_verbosity_level,
            Some(Arc::new(move |level, message| {
                let c_message = CString::new(message).unwrap_or_default();
                callback(level, c_message.as_ptr());
            })),
        ),
    }
}

// Legacy per-instance surface.

/// Creates a new instance of the JSON client.
#[no_mangle]
pub extern "C" fn td_json_client_create() -> *mut c_void {
    Box::into_raw(Box::new(ClientJson::new())) as *mut c_void
}

/// Destroys the JSON client instance.
///
/// # Safety
///
/// `client` must be null or a pointer obtained from
/// [`td_json_client_create`] that has not been destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn td_json_client_destroy(client: *mut c_void) {
    if !client.is_null() {
        // SAFETY: ownership returns to the box created in
        // td_json_client_create.
        drop(unsafe { Box::from_raw(client as *mut ClientJson) });
    }
}

/// Sends a request to the JSON client instance.
///
/// # Safety
///
/// `client` as for [`td_json_client_destroy`]; `request` as for
/// [`td_send`].
#[no_mangle]
pub unsafe extern "C" fn td_json_client_send(client: *mut c_void, request: *const c_char) {
    if client.is_null() {
        return;
    }
    let client = unsafe { &*(client as *const ClientJson) };
    client.send(unsafe { slice_from_ptr(request) });
}

/// Receives the instance's next response or update, or null when the
/// timeout expires.
///
/// # Safety
///
/// `client` as for [`td_json_client_destroy`].
#[no_mangle]
pub unsafe extern "C" fn td_json_client_receive(
    client: *mut c_void,
    timeout: c_double,
) -> *const c_char {
    if client.is_null() {
        return std::ptr::null();
    }
    let client = unsafe { &*(client as *const ClientJson) };
    match client.receive(timeout) {
        Some(response) => store_string(response),
        None => std::ptr::null(),
    }
}

/// Synchronously executes a request; the client pointer may be null.
///
/// # Safety
///
/// `request` as for [`td_send`].
#[no_mangle]
pub unsafe extern "C" fn td_json_client_execute(
    _client: *mut c_void,
    request: *const c_char,
) -> *const c_char {
    store_string(ClientJson::execute(unsafe { slice_from_ptr(request) }))
}
