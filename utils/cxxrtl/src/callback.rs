//! Call-scoped trampolines for closures handed to the native library.
//!
//! The native side only sees a `void *data` pointer and a monomorphized
//! `extern "C"` function. The closure lives on the caller's stack for exactly
//! one native call; nothing is registered globally.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use crate::capi::{EnumCallback, Object, VcdFilter};

struct Trampoline<F> {
    callback: F,
    panic: Option<Box<dyn Any + Send>>,
}

impl<F> Trampoline<F> {
    fn new(callback: F) -> Self {
        Trampoline {
            callback,
            panic: None,
        }
    }

    fn as_data(&mut self) -> *mut c_void {
        self as *mut Self as *mut c_void
    }

    /// Run `f` unless an earlier invocation already panicked; a panic is
    /// stashed instead of unwinding into the C frame.
    fn guard<R>(&mut self, fallback: R, f: impl FnOnce(&mut F) -> R) -> R {
        if self.panic.is_some() {
            return fallback;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut self.callback))) {
            Ok(result) => result,
            Err(payload) => {
                self.panic = Some(payload);
                fallback
            }
        }
    }

    fn finish(self) {
        if let Some(payload) = self.panic {
            panic::resume_unwind(payload);
        }
    }
}

/// # Safety
///
/// `name` must be null or a valid C string for the duration of the call.
unsafe fn name_of<'a>(name: *const c_char) -> Cow<'a, str> {
    if name.is_null() {
        return Cow::Borrowed("");
    }
    // SAFETY: forwarded to the caller.
    unsafe { CStr::from_ptr(name) }.to_string_lossy()
}

unsafe extern "C" fn enum_trampoline<F>(
    data: *mut c_void,
    name: *const c_char,
    object: *mut Object,
    parts: usize,
) where
    F: FnMut(&str, &[Object]),
{
    // SAFETY: `data` is the `Trampoline<F>` created by `with_enum_callback`,
    // which outlives the native call that invokes us.
    let trampoline = unsafe { &mut *(data as *mut Trampoline<F>) };
    // SAFETY: the native library passes its own name string and part array.
    let name = unsafe { name_of(name) };
    let parts = if object.is_null() || parts == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(object, parts) }
    };
    trampoline.guard((), |callback| callback(&name, parts));
}

unsafe extern "C" fn filter_trampoline<F>(
    data: *mut c_void,
    name: *const c_char,
    object: *const Object,
) -> c_int
where
    F: FnMut(&str, &Object) -> bool,
{
    // SAFETY: see `enum_trampoline`.
    let trampoline = unsafe { &mut *(data as *mut Trampoline<F>) };
    if object.is_null() {
        return 0;
    }
    let name = unsafe { name_of(name) };
    let object = unsafe { &*object };
    trampoline.guard(0, |filter| filter(&name, object) as c_int)
}

/// Pin `callback` for the duration of `call`, which receives the data pointer
/// and trampoline to forward to the native library.
pub(crate) fn with_enum_callback<F, C>(callback: F, call: C)
where
    F: FnMut(&str, &[Object]),
    C: FnOnce(*mut c_void, EnumCallback),
{
    let mut trampoline = Trampoline::new(callback);
    call(trampoline.as_data(), enum_trampoline::<F>);
    trampoline.finish();
}

pub(crate) fn with_vcd_filter<F, C>(filter: F, call: C)
where
    F: FnMut(&str, &Object) -> bool,
    C: FnOnce(*mut c_void, VcdFilter),
{
    let mut trampoline = Trampoline::new(filter);
    call(trampoline.as_data(), filter_trampoline::<F>);
    trampoline.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn enum_trampoline_forwards_name_and_parts() {
        let name = CString::new("top counter").unwrap();
        let mut words = [5u32];
        let mut parts = [Object {
            ty: crate::capi::CXXRTL_VALUE,
            width: 4,
            lsb_at: 0,
            depth: 1,
            zero_at: 0,
            curr: words.as_mut_ptr(),
            next: ptr::null_mut(),
        }];

        let mut seen = Vec::new();
        with_enum_callback(
            |name: &str, parts: &[Object]| seen.push((name.to_owned(), parts.len())),
            |data, callback| unsafe {
                callback(data, name.as_ptr(), parts.as_mut_ptr(), 1);
                callback(data, name.as_ptr(), ptr::null_mut(), 0);
            },
        );
        assert_eq!(
            seen,
            [("top counter".to_owned(), 1), ("top counter".to_owned(), 0)]
        );
    }

    #[test]
    fn filter_trampoline_returns_predicate_result() {
        let name = CString::new("clk").unwrap();
        let mut words = [0u32];
        let object = Object {
            ty: crate::capi::CXXRTL_VALUE,
            width: 1,
            lsb_at: 0,
            depth: 1,
            zero_at: 0,
            curr: words.as_mut_ptr(),
            next: ptr::null_mut(),
        };

        let mut results = Vec::new();
        with_vcd_filter(
            |name: &str, object: &Object| name == "clk" && object.width() == 1,
            |data, filter| unsafe {
                results.push(filter(data, name.as_ptr(), &object));
                results.push(filter(data, name.as_ptr(), ptr::null()));
            },
        );
        assert_eq!(results, [1, 0]);
    }

    #[test]
    #[should_panic(expected = "callback failed")]
    fn panics_resume_after_the_native_call() {
        let mut calls = 0;
        with_enum_callback(
            |_: &str, _: &[Object]| {
                calls += 1;
                assert_eq!(calls, 1, "trampoline invoked the callback after a panic");
                panic!("callback failed");
            },
            |data, callback| unsafe {
                callback(data, ptr::null(), ptr::null_mut(), 0);
                callback(data, ptr::null(), ptr::null_mut(), 0);
            },
        );
    }
}
