use std::ffi::CString;
use std::ptr::NonNull;
use std::slice;

use log::trace;

use crate::callback::with_enum_callback;
use crate::capi::{Object, RawHandle, RawToplevel};
use crate::error::{Error, Result};
use crate::library::Library;

/// A freshly instantiated design, not yet wrapped into a simulation handle.
///
/// The C API has no way to free a toplevel other than handing it to
/// `cxxrtl_create`; dropping one without calling [`Toplevel::create`] leaks it.
pub struct Toplevel<'lib> {
    raw: NonNull<RawToplevel>,
    library: &'lib Library,
}

impl<'lib> Toplevel<'lib> {
    pub(crate) fn from_raw(library: &'lib Library, raw: NonNull<RawToplevel>) -> Self {
        Toplevel { raw, library }
    }

    /// Hand the design to `cxxrtl_create`, which takes ownership of it.
    pub fn create(self) -> Result<Handle<'lib>> {
        let raw = unsafe { (self.library.api().create)(self.raw.as_ptr()) };
        let raw = NonNull::new(raw).ok_or(Error::NullHandle("cxxrtl_create"))?;
        trace!("created handle {raw:p}");
        Ok(Handle {
            raw,
            library: self.library,
        })
    }
}

/// A running simulation.
///
/// The handle is destroyed exactly once: by [`Handle::destroy`] or on drop.
/// Objects returned by [`Handle::get_parts`] borrow the handle and cannot
/// outlive it.
pub struct Handle<'lib> {
    raw: NonNull<RawHandle>,
    library: &'lib Library,
}

impl<'lib> Handle<'lib> {
    pub fn library(&self) -> &'lib Library {
        self.library
    }

    pub(crate) fn as_ptr(&self) -> *mut RawHandle {
        self.raw.as_ptr()
    }

    /// Settle combinational logic. Nonzero if the design converged.
    pub fn eval(&self) -> i32 {
        unsafe { (self.library.api().eval)(self.as_ptr()) }
    }

    /// Latch next values of all wires. Nonzero if any state changed.
    pub fn commit(&self) -> i32 {
        unsafe { (self.library.api().commit)(self.as_ptr()) }
    }

    /// Alternate `eval` and `commit` until the design is stable.
    pub fn step(&self) {
        unsafe { (self.library.api().step)(self.as_ptr()) }
    }

    /// Parts backing `name`, in order, or `None` if the design has no such
    /// object. Hierarchical names are separated by spaces, e.g. `"cpu pc"`.
    pub fn get_parts(&self, name: &str) -> Result<Option<&[Object]>> {
        let c_name = CString::new(name).map_err(|_| Error::InvalidName(name.to_owned()))?;
        let mut count = 0usize;
        let get_parts = self.library.api().get_parts;
        let parts = unsafe { get_parts(self.as_ptr(), c_name.as_ptr(), &mut count) };
        if parts.is_null() {
            trace!("no object named {name:?}");
            return Ok(None);
        }
        // SAFETY: the parts array is owned by the handle and lives as long as it.
        Ok(Some(unsafe { slice::from_raw_parts(parts, count) }))
    }

    /// The object behind `name` if it consists of exactly one part.
    pub fn get(&self, name: &str) -> Result<Option<&Object>> {
        Ok(match self.get_parts(name)? {
            Some([object]) => Some(object),
            _ => None,
        })
    }

    /// Call `callback` once for every named object in the design.
    ///
    /// The callback runs synchronously, before this method returns.
    pub fn enumerate<F>(&self, callback: F)
    where
        F: FnMut(&str, &[Object]),
    {
        let enumerate = self.library.api().enumerate;
        with_enum_callback(callback, |data, trampoline| unsafe {
            enumerate(self.as_ptr(), data, trampoline)
        });
    }

    /// Names of all objects together with their part counts.
    pub fn objects(&self) -> Vec<(String, usize)> {
        let mut objects = Vec::new();
        self.enumerate(|name, parts| objects.push((name.to_owned(), parts.len())));
        objects
    }

    /// Release the simulation. Equivalent to dropping the handle.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        trace!("destroying handle {:p}", self.raw);
        unsafe { (self.library.api().destroy)(self.as_ptr()) }
    }
}
