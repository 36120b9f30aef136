use std::slice;

use num_bigint::BigUint;

use crate::capi::{CXXRTL_ALIAS, CXXRTL_MEMORY, CXXRTL_VALUE, CXXRTL_WIRE, Object};
use crate::error::{Error, Result};
use crate::value;

/// Kind of storage behind an [`Object`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectType {
    /// Combinational value, single-buffered.
    Value,
    /// Clocked wire with separate current and next values.
    Wire,
    /// Memory array of `depth` rows.
    Memory,
    /// Name that refers to storage owned by another object.
    Alias,
    /// Discriminant this binding does not know about.
    Unknown(u32),
}

impl From<u32> for ObjectType {
    fn from(ty: u32) -> Self {
        match ty {
            CXXRTL_VALUE => ObjectType::Value,
            CXXRTL_WIRE => ObjectType::Wire,
            CXXRTL_MEMORY => ObjectType::Memory,
            CXXRTL_ALIAS => ObjectType::Alias,
            other => ObjectType::Unknown(other),
        }
    }
}

impl Object {
    pub fn kind(&self) -> ObjectType {
        ObjectType::from(self.ty)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn lsb_at(&self) -> usize {
        self.lsb_at
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn zero_at(&self) -> usize {
        self.zero_at
    }

    /// Number of 32-bit words behind `curr` (and `next`, when present).
    pub fn chunks(&self) -> usize {
        value::chunks(self.width, self.depth)
    }

    pub fn has_next(&self) -> bool {
        !self.next.is_null()
    }

    /// Current value, shifted to `lsb_at`.
    pub fn curr(&self) -> Result<BigUint> {
        value::decode(self.width, self.lsb_at, self.words(self.curr, "curr")?)
    }

    /// Write `value` masked to `width` bits. On a memory the mask leaves only
    /// the first row set; [`Object::set_row`] writes the others.
    pub fn set_curr(&self, value: &BigUint) -> Result<()> {
        value::encode(
            self.width,
            self.lsb_at,
            value,
            self.words_mut(self.curr, "curr")?,
        )
    }

    /// Value that becomes current on the next commit. Only wires have one.
    pub fn next(&self) -> Result<BigUint> {
        value::decode(self.width, self.lsb_at, self.words(self.next, "next")?)
    }

    pub fn set_next(&self, value: &BigUint) -> Result<()> {
        value::encode(
            self.width,
            self.lsb_at,
            value,
            self.words_mut(self.next, "next")?,
        )
    }

    /// Current value of the memory row at `index`.
    ///
    /// Indices are memory addresses, so the first row is `zero_at`.
    pub fn row(&self, index: usize) -> Result<BigUint> {
        let words = self.words(self.curr, "curr")?;
        let range = self.row_range(index)?;
        value::decode(self.width, self.lsb_at, &words[range])
    }

    pub fn set_row(&self, index: usize, value: &BigUint) -> Result<()> {
        let range = self.row_range(index)?;
        let words = self.words_mut(self.curr, "curr")?;
        value::encode(self.width, self.lsb_at, value, &mut words[range])
    }

    fn row_range(&self, index: usize) -> Result<std::ops::Range<usize>> {
        let row = index
            .checked_sub(self.zero_at)
            .filter(|row| *row < self.depth)
            .ok_or(Error::RowOutOfRange {
                index,
                zero_at: self.zero_at,
                depth: self.depth,
            })?;
        let per_row = value::row_chunks(self.width);
        Ok(row * per_row..(row + 1) * per_row)
    }

    fn words(&self, ptr: *mut u32, field: &'static str) -> Result<&[u32]> {
        let len = self.chunks();
        if len == 0 {
            return Ok(&[]);
        }
        if ptr.is_null() {
            return Err(Error::NoValue(field));
        }
        // SAFETY: the native library allocates `chunks()` words for every
        // non-null storage pointer, alive as long as the owning handle, which
        // outlives `self`.
        Ok(unsafe { slice::from_raw_parts(ptr, len) })
    }

    #[allow(clippy::mut_from_ref)]
    fn words_mut(&self, ptr: *mut u32, field: &'static str) -> Result<&mut [u32]> {
        let len = self.chunks();
        if len == 0 {
            return Ok(&mut []);
        }
        if ptr.is_null() {
            return Err(Error::NoValue(field));
        }
        // SAFETY: as in `words`. The storage is native memory reached through
        // a raw pointer, not through `self`, and the slice does not outlive
        // the calling accessor.
        Ok(unsafe { slice::from_raw_parts_mut(ptr, len) })
    }
}
