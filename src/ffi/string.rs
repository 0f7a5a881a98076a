//! Ownership moves for strings and byte buffers crossing the C ABI.
//!
//! Whoever receives a string or buffer through a response record owns it and frees it
//! exactly once, either with the `luau_require_*_free` exports or the `move_*` helpers.

use std::ffi::{c_char, CStr, CString};

/// Builds a `CString`, dropping interior NULs instead of failing.
pub fn c_string(s: impl AsRef<[u8]>) -> CString {
    let bytes: Vec<u8> = s.as_ref().iter().copied().filter(|&b| b != 0).collect();

    CString::new(bytes).unwrap_or_default()
}

/// Moves `s` to the heap as a C string; release it with [`luau_require_string_free`].
pub fn to_c_string(s: impl AsRef<[u8]>) -> *mut c_char {
    c_string(s).into_raw()
}

/// Copies `len` bytes from `s` into a new Rust-owned C string.
///
/// # Safety
/// `s` must be valid for `len` bytes, or null.
#[no_mangle]
pub unsafe extern "C" fn luau_require_string_new(s: *const c_char, len: usize) -> *mut c_char {
    if s.is_null() || len == 0 {
        return to_c_string("");
    }

    let slice = std::slice::from_raw_parts(s.cast::<u8>(), len);
    to_c_string(slice)
}

/// # Safety
/// `ptr` must come from [`luau_require_string_new`] or [`to_c_string`] and not be freed already.
#[no_mangle]
pub unsafe extern "C" fn luau_require_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Takes ownership of a Rust-allocated C string.
///
/// # Safety
/// Same contract as [`luau_require_string_free`]; `ptr` must not be used afterwards.
pub unsafe fn move_string_from_c(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    Some(CString::from_raw(ptr).to_string_lossy().into_owned())
}

/// Reads a borrowed C string, null reads as empty.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string for the duration of the call.
pub unsafe fn borrow_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }

    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// An owned byte buffer, used where contents may contain NULs.
#[repr(C)]
#[derive(Debug)]
pub struct RawBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl RawBytes {
    pub const fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        let ptr = Box::into_raw(bytes.into_boxed_slice()).cast::<u8>();

        Self { ptr, len }
    }

    /// Takes ownership of the buffer back, `None` for an empty record.
    ///
    /// # Safety
    /// The record must come from [`RawBytes::from_vec`] or [`luau_require_bytes_new`].
    pub unsafe fn into_vec(self) -> Option<Vec<u8>> {
        if self.ptr.is_null() {
            return None;
        }

        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr, self.len);
        Some(Box::from_raw(slice).into_vec())
    }
}

/// # Safety
/// `ptr` must be valid for `len` bytes, or null.
#[no_mangle]
pub unsafe extern "C" fn luau_require_bytes_new(ptr: *const u8, len: usize) -> RawBytes {
    if ptr.is_null() {
        return RawBytes::from_vec(Vec::new());
    }

    RawBytes::from_vec(std::slice::from_raw_parts(ptr, len).to_vec())
}

/// # Safety
/// `bytes` must come from [`luau_require_bytes_new`] and not be freed already.
#[no_mangle]
pub unsafe extern "C" fn luau_require_bytes_free(bytes: RawBytes) {
    drop(bytes.into_vec());
}
