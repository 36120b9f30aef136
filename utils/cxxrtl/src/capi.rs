//! Raw CXXRTL C API.
//!
//! Everything in this module mirrors `cxxrtl_capi.h` and `cxxrtl_capi_vcd.h`
//! one-to-one. The field order and widths of [`Object`] are an ABI contract with
//! the native library; do not reorder them.

use std::ffi::{c_char, c_int, c_void};
use std::marker::{PhantomData, PhantomPinned};
use std::path::Path;

use log::trace;

use crate::error::{Error, Result};

macro_rules! opaque {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(C)]
        pub struct $name {
            _data: [u8; 0],
            _marker: PhantomData<(*mut u8, PhantomPinned)>,
        }
    };
}

opaque!(
    /// `struct _cxxrtl_toplevel`, produced by `<design>_create`.
    RawToplevel
);
opaque!(
    /// `struct _cxxrtl_handle`.
    RawHandle
);
opaque!(
    /// `struct _cxxrtl_vcd`.
    RawVcd
);

pub const CXXRTL_VALUE: u32 = 0;
pub const CXXRTL_WIRE: u32 = 1;
pub const CXXRTL_MEMORY: u32 = 2;
pub const CXXRTL_ALIAS: u32 = 3;

/// `struct cxxrtl_object`: one part of a named signal or memory.
///
/// The record is owned by the simulation handle; the word arrays behind `curr`
/// and `next` hold `chunks()` 32-bit words each, least significant word first.
#[repr(C)]
#[derive(Debug)]
pub struct Object {
    pub(crate) ty: u32,
    pub(crate) width: usize,
    pub(crate) lsb_at: usize,
    pub(crate) depth: usize,
    pub(crate) zero_at: usize,
    pub(crate) curr: *mut u32,
    pub(crate) next: *mut u32,
}

const _: () = {
    use std::mem::{align_of, offset_of, size_of};

    assert!(offset_of!(Object, ty) == 0);
    assert!(offset_of!(Object, width) == align_of::<usize>());
    assert!(offset_of!(Object, lsb_at) == offset_of!(Object, width) + size_of::<usize>());
    assert!(offset_of!(Object, depth) == offset_of!(Object, lsb_at) + size_of::<usize>());
    assert!(offset_of!(Object, zero_at) == offset_of!(Object, depth) + size_of::<usize>());
    assert!(offset_of!(Object, curr) == offset_of!(Object, zero_at) + size_of::<usize>());
    assert!(offset_of!(Object, next) == offset_of!(Object, curr) + size_of::<*mut u32>());
    assert!(size_of::<Object>() == offset_of!(Object, next) + size_of::<*mut u32>());
};

/// `void (*callback)(void *data, const char *name, struct cxxrtl_object *object, size_t parts)`
pub type EnumCallback =
    unsafe extern "C" fn(data: *mut c_void, name: *const c_char, object: *mut Object, parts: usize);

/// `int (*filter)(void *data, const char *name, const struct cxxrtl_object *object)`
pub type VcdFilter =
    unsafe extern "C" fn(data: *mut c_void, name: *const c_char, object: *const Object) -> c_int;

/// Entry points resolved from a loaded library.
///
/// The pointers stay valid for as long as the `libloading::Library` they were
/// resolved from is loaded; [`crate::Library`] keeps both together.
#[derive(Clone, Copy)]
pub struct CApi {
    pub design_create: unsafe extern "C" fn() -> *mut RawToplevel,
    pub create: unsafe extern "C" fn(*mut RawToplevel) -> *mut RawHandle,
    pub destroy: unsafe extern "C" fn(*mut RawHandle),
    pub eval: unsafe extern "C" fn(*mut RawHandle) -> c_int,
    pub commit: unsafe extern "C" fn(*mut RawHandle) -> c_int,
    pub step: unsafe extern "C" fn(*mut RawHandle),
    pub get_parts: unsafe extern "C" fn(*mut RawHandle, *const c_char, *mut usize) -> *mut Object,
    pub enumerate: unsafe extern "C" fn(*mut RawHandle, *mut c_void, EnumCallback),

    pub vcd_create: unsafe extern "C" fn() -> *mut RawVcd,
    pub vcd_destroy: unsafe extern "C" fn(*mut RawVcd),
    pub vcd_timescale: Option<unsafe extern "C" fn(*mut RawVcd, c_int, *const c_char)>,
    pub vcd_add: unsafe extern "C" fn(*mut RawVcd, *const c_char, *mut Object),
    pub vcd_add_from: unsafe extern "C" fn(*mut RawVcd, *mut RawHandle),
    pub vcd_add_from_if: unsafe extern "C" fn(*mut RawVcd, *mut RawHandle, *mut c_void, VcdFilter),
    pub vcd_add_from_without_memories: unsafe extern "C" fn(*mut RawVcd, *mut RawHandle),
    pub vcd_sample: unsafe extern "C" fn(*mut RawVcd, u64),
    pub vcd_read: unsafe extern "C" fn(*mut RawVcd, *mut *const c_char, *mut usize),
}

impl CApi {
    /// Resolve every entry point, failing on the first missing required symbol.
    ///
    /// # Safety
    ///
    /// The exported symbols must have the signatures declared on [`CApi`].
    pub unsafe fn resolve(
        library: &libloading::Library,
        path: &Path,
        design_name: &str,
    ) -> Result<Self> {
        let design_create = format!("{design_name}_create");

        // SAFETY: forwarded to the caller.
        unsafe {
            Ok(CApi {
                design_create: required(library, path, &design_create)?,
                create: required(library, path, "cxxrtl_create")?,
                destroy: required(library, path, "cxxrtl_destroy")?,
                eval: required(library, path, "cxxrtl_eval")?,
                commit: required(library, path, "cxxrtl_commit")?,
                step: required(library, path, "cxxrtl_step")?,
                get_parts: required(library, path, "cxxrtl_get_parts")?,
                enumerate: required(library, path, "cxxrtl_enum")?,
                vcd_create: required(library, path, "cxxrtl_vcd_create")?,
                vcd_destroy: required(library, path, "cxxrtl_vcd_destroy")?,
                vcd_timescale: optional(library, "cxxrtl_vcd_timescale"),
                vcd_add: required(library, path, "cxxrtl_vcd_add")?,
                vcd_add_from: required(library, path, "cxxrtl_vcd_add_from")?,
                vcd_add_from_if: required(library, path, "cxxrtl_vcd_add_from_if")?,
                vcd_add_from_without_memories: required(
                    library,
                    path,
                    "cxxrtl_vcd_add_from_without_memories",
                )?,
                vcd_sample: required(library, path, "cxxrtl_vcd_sample")?,
                vcd_read: required(library, path, "cxxrtl_vcd_read")?,
            })
        }
    }
}

unsafe fn required<T: Copy>(library: &libloading::Library, path: &Path, symbol: &str) -> Result<T> {
    // SAFETY: the caller guarantees `T` matches the exported symbol.
    let resolved = unsafe { library.get::<T>(symbol.as_bytes()) }.map_err(|source| {
        Error::MissingSymbol {
            path: path.to_path_buf(),
            symbol: symbol.to_owned(),
            source,
        }
    })?;
    trace!("resolved {symbol}");
    Ok(*resolved)
}

unsafe fn optional<T: Copy>(library: &libloading::Library, symbol: &str) -> Option<T> {
    // SAFETY: the caller guarantees `T` matches the exported symbol.
    match unsafe { library.get::<T>(symbol.as_bytes()) } {
        Ok(resolved) => {
            trace!("resolved {symbol}");
            Some(*resolved)
        }
        Err(_) => {
            trace!("optional symbol {symbol} not exported");
            None
        }
    }
}
