use std::ffi::{CString, c_char};
use std::io::Write;
use std::ptr::{self, NonNull};
use std::slice;

use log::{trace, warn};

use crate::callback::with_vcd_filter;
use crate::capi::{Object, RawVcd};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::library::Library;

/// Waveform writer backed by `cxxrtl_vcd`.
///
/// Registered objects and handles are borrowed for `'a`, so the simulation
/// cannot be destroyed while the writer still samples it.
pub struct Vcd<'a> {
    raw: NonNull<RawVcd>,
    library: &'a Library,
    last_sample: Option<u64>,
}

impl<'a> Vcd<'a> {
    pub(crate) fn from_raw(library: &'a Library, raw: NonNull<RawVcd>) -> Self {
        Vcd {
            raw,
            library,
            last_sample: None,
        }
    }

    fn as_ptr(&self) -> *mut RawVcd {
        self.raw.as_ptr()
    }

    /// Set the `$timescale` header, e.g. `timescale(1, "ns")`. Must precede
    /// the first sample.
    pub fn timescale(&mut self, number: i32, unit: &str) -> Result<()> {
        let timescale = self
            .library
            .api()
            .vcd_timescale
            .ok_or(Error::Unsupported("cxxrtl_vcd_timescale"))?;
        let unit = CString::new(unit).map_err(|_| Error::InvalidName(unit.to_owned()))?;
        unsafe { timescale(self.as_ptr(), number, unit.as_ptr()) };
        Ok(())
    }

    /// Register one object under `name`.
    pub fn add(&mut self, name: &str, object: &'a Object) -> Result<()> {
        let c_name = CString::new(name).map_err(|_| Error::InvalidName(name.to_owned()))?;
        // The writer only reads the descriptor; the C signature is not const.
        let object = object as *const Object as *mut Object;
        unsafe { (self.library.api().vcd_add)(self.as_ptr(), c_name.as_ptr(), object) };
        Ok(())
    }

    /// Register every object of `handle`.
    pub fn add_from(&mut self, handle: &'a Handle<'_>) {
        unsafe { (self.library.api().vcd_add_from)(self.as_ptr(), handle.as_ptr()) }
    }

    /// Register the objects of `handle` for which `filter` returns `true`.
    pub fn add_from_if<F>(&mut self, handle: &'a Handle<'_>, filter: F)
    where
        F: FnMut(&str, &Object) -> bool,
    {
        let add_from_if = self.library.api().vcd_add_from_if;
        let vcd = self.as_ptr();
        with_vcd_filter(filter, |data, trampoline| unsafe {
            add_from_if(vcd, handle.as_ptr(), data, trampoline)
        });
    }

    /// Register every object of `handle` except memories.
    pub fn add_from_without_memories(&mut self, handle: &'a Handle<'_>) {
        let add_from_without_memories = self.library.api().vcd_add_from_without_memories;
        unsafe { add_from_without_memories(self.as_ptr(), handle.as_ptr()) }
    }

    /// Record the current value of every registered object at `time`.
    ///
    /// Timestamps must not decrease between calls.
    pub fn sample(&mut self, time: u64) {
        if let Some(last) = record_sample(&mut self.last_sample, time) {
            warn!("VCD sample at {time} precedes previous sample at {last}");
        }
        unsafe { (self.library.api().vcd_sample)(self.as_ptr(), time) }
    }

    /// Timestamp of the most recent [`Vcd::sample`].
    pub fn last_sample(&self) -> Option<u64> {
        self.last_sample
    }

    /// Take the bytes produced since the previous read.
    pub fn read(&mut self) -> Vec<u8> {
        let mut data: *const c_char = ptr::null();
        let mut size = 0usize;
        unsafe { (self.library.api().vcd_read)(self.as_ptr(), &mut data, &mut size) };
        if data.is_null() || size == 0 {
            return Vec::new();
        }
        trace!("read {size} bytes of VCD output");
        // SAFETY: the buffer is valid until the next call on this writer; it
        // is copied before returning.
        unsafe { slice::from_raw_parts(data.cast::<u8>(), size) }.to_vec()
    }

    /// Drain pending output into `writer`, returning the number of bytes.
    pub fn read_into<W: Write>(&mut self, writer: &mut W) -> Result<usize> {
        let bytes = self.read();
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Release the writer. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Vcd<'_> {
    fn drop(&mut self) {
        unsafe { (self.library.api().vcd_destroy)(self.as_ptr()) }
    }
}

/// Record `time` as the latest sample. Returns the previous timestamp when
/// `time` goes backwards.
fn record_sample(last: &mut Option<u64>, time: u64) -> Option<u64> {
    let previous = last.replace(time);
    previous.filter(|previous| time < *previous)
}
