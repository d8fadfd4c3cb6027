//! FFI bindings for the fatigue monitor
//!
//! This module provides C-compatible functions for driving a monitor from
//! other languages. Strings are null-terminated; every returned string is
//! newly allocated and must be freed with `fatigue_free_string`.
//!
//! Ratios are passed as plain doubles: a negative or NaN value means
//! "unavailable this frame".

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::baseline::CalibratedBaselines;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::monitor::FatigueMonitor;
use crate::session::SessionLog;
use crate::types::Sample;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// A null config pointer selects the defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<MonitorConfig, MonitorError> {
    if config_json.is_null() {
        return Ok(MonitorConfig::default());
    }
    let json = cstr_to_string(config_json)
        .ok_or_else(|| MonitorError::ParseError("Invalid config string pointer".to_string()))?;
    MonitorConfig::from_json(&json)
}

/// Opaque handle to a FatigueMonitor
pub struct FatigueMonitorHandle {
    monitor: FatigueMonitor<SessionLog>,
}

fn into_handle(result: Result<FatigueMonitor<SessionLog>, MonitorError>) -> *mut FatigueMonitorHandle {
    match result {
        Ok(monitor) => Box::into_raw(Box::new(FatigueMonitorHandle { monitor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Monitor Lifecycle
// ============================================================================

/// Create a calibrating monitor.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer that must be freed with `fatigue_monitor_free`.
/// - Returns NULL on error; call `fatigue_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_new(
    config_json: *const c_char,
    started_at: f64,
) -> *mut FatigueMonitorHandle {
    clear_last_error();

    let result = config_from_ptr(config_json)
        .and_then(|config| FatigueMonitor::new(config, started_at));
    into_handle(result)
}

/// Create a monitor that skips calibration using previously saved baselines.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - `baselines_json` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `fatigue_monitor_free`.
/// - Returns NULL on error; call `fatigue_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_with_baselines(
    config_json: *const c_char,
    baselines_json: *const c_char,
    started_at: f64,
) -> *mut FatigueMonitorHandle {
    clear_last_error();

    let baselines = match cstr_to_string(baselines_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid baselines string pointer");
            return ptr::null_mut();
        }
    };

    let result = config_from_ptr(config_json).and_then(|config| {
        let baselines = CalibratedBaselines::from_json(&baselines)?;
        FatigueMonitor::with_baselines(config, baselines, SessionLog::with_session(), started_at)
    });
    into_handle(result)
}

/// Free a monitor.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by a `fatigue_monitor_*` constructor.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_free(monitor: *mut FatigueMonitorHandle) {
    if !monitor.is_null() {
        drop(Box::from_raw(monitor));
    }
}

// ============================================================================
// Frame Processing
// ============================================================================

/// Process one frame and return the frame result as JSON.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by a `fatigue_monitor_*` constructor.
/// - Returns a newly allocated string that must be freed with `fatigue_free_string`.
/// - Returns NULL on error; call `fatigue_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_process(
    monitor: *mut FatigueMonitorHandle,
    eye_ratio: f64,
    mouth_ratio: f64,
    now: f64,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *monitor;
    let result = handle.monitor.process(
        Sample::from_ratio(eye_ratio),
        Sample::from_ratio(mouth_ratio),
        now,
    );

    match serde_json::to_string(&result) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save the monitor's baselines to JSON.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by a `fatigue_monitor_*` constructor.
/// - Returns a newly allocated string that must be freed with `fatigue_free_string`.
/// - Returns NULL while still calibrating; call `fatigue_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_save_baselines(
    monitor: *mut FatigueMonitorHandle,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &*monitor;

    match handle.monitor.save_baselines() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Export the monitor's session log (sessions and persisted events) as JSON.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by a `fatigue_monitor_*` constructor.
/// - Returns a newly allocated string that must be freed with `fatigue_free_string`.
/// - Returns NULL on error; call `fatigue_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fatigue_monitor_session_json(
    monitor: *mut FatigueMonitorHandle,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &*monitor;

    match handle.monitor.store().to_json_pretty() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a fatigue monitor function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a fatigue monitor function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fatigue_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next fatigue monitor call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn fatigue_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn fatigue_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
