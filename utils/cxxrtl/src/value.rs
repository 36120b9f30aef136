//! Conversion between packed chunk arrays and arbitrary-width integers.
//!
//! A CXXRTL value of `width` bits is stored as `ceil(width / 32)` 32-bit
//! chunks, least significant chunk first. Memories repeat that layout once per
//! row, so a word slice always holds a whole number of rows (possibly none).

use num_bigint::BigUint;

use crate::error::{Error, Result};

const CHUNK_BITS: usize = u32::BITS as usize;

/// Number of 32-bit chunks backing one row of `width` bits.
pub fn row_chunks(width: usize) -> usize {
    width.div_ceil(CHUNK_BITS)
}

/// Number of 32-bit chunks backing an object of `width` bits and `depth` rows.
pub fn chunks(width: usize, depth: usize) -> usize {
    row_chunks(width) * depth
}

/// Assemble `words` into one integer and move it to bit position `lsb_at`.
///
/// Rows are concatenated at a stride of `row_chunks(width) * 32` bits.
pub fn decode(width: usize, lsb_at: usize, words: &[u32]) -> Result<BigUint> {
    check_shape(width, words.len())?;
    Ok(BigUint::from_slice(words) << lsb_at)
}

/// Inverse of [`decode`]: shift `value` down by `lsb_at`, mask it to `width`
/// bits and split it across `words`. Bits that do not fit are dropped.
///
/// The mask applies to the whole value, so writing a memory through this
/// function only fills its first row; use one call per row to fill the rest.
pub fn encode(width: usize, lsb_at: usize, value: &BigUint, words: &mut [u32]) -> Result<()> {
    check_shape(width, words.len())?;
    let masked = (value >> lsb_at) & mask(width);
    let digits = masked.to_u32_digits();
    for (index, word) in words.iter_mut().enumerate() {
        *word = digits.get(index).copied().unwrap_or(0);
    }
    Ok(())
}

fn mask(width: usize) -> BigUint {
    (BigUint::from(1u32) << width) - 1u32
}

fn check_shape(width: usize, actual: usize) -> Result<()> {
    let per_row = row_chunks(width);
    let whole_rows = match per_row {
        0 => actual == 0,
        _ => actual % per_row == 0,
    };
    if !whole_rows {
        let depth = actual.div_ceil(per_row.max(1));
        return Err(Error::ChunkMismatch {
            width,
            depth,
            expected: per_row * depth,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chunk_counts_round_up_per_row() {
        assert_eq!(chunks(1, 1), 1);
        assert_eq!(chunks(32, 1), 1);
        assert_eq!(chunks(33, 1), 2);
        assert_eq!(chunks(64, 1), 2);
        assert_eq!(chunks(65, 1), 3);
        assert_eq!(chunks(8, 16), 16);
        assert_eq!(chunks(33, 4), 8);
        assert_eq!(chunks(0, 1), 0);
    }

    #[test]
    fn encode_writes_least_significant_chunk_first() {
        let mut words = [0u32; 3];
        let value = (BigUint::from(1u32) << 64) | BigUint::from(0x1234_5678_9abc_def0u64);
        encode(65, 0, &value, &mut words).unwrap();
        assert_eq!(words, [0x9abc_def0, 0x1234_5678, 1]);
        assert_eq!(decode(65, 0, &words).unwrap(), value);
    }

    #[test]
    fn encode_truncates_to_width() {
        let mut words = [0u32; 2];
        encode(33, 0, &BigUint::from(u64::MAX), &mut words).unwrap();
        assert_eq!(words, [u32::MAX, 1]);

        let mut words = [0u32; 1];
        encode(1, 0, &BigUint::from(0b110u32), &mut words).unwrap();
        assert_eq!(words, [0]);
    }

    #[test]
    fn lsb_at_positions_the_value() {
        let mut words = [0u32; 1];
        encode(4, 4, &BigUint::from(0xa5u32), &mut words).unwrap();
        assert_eq!(words, [0xa]);
        assert_eq!(decode(4, 4, &words).unwrap(), BigUint::from(0xa0u32));
    }

    #[test]
    fn whole_memory_writes_mask_to_width() {
        let mut words = [0u32; 4];
        let value = (BigUint::from(1u32) << 32) | BigUint::from(5u32);
        encode(8, 0, &value, &mut words).unwrap();
        assert_eq!(words, [5, 0, 0, 0]);
        assert_eq!(decode(8, 0, &words).unwrap(), BigUint::from(5u32));

        let mut words = [7u32; 3];
        encode(8, 0, &BigUint::from(0x1ffu32), &mut words).unwrap();
        assert_eq!(words, [0xff, 0, 0]);
    }

    #[test]
    fn empty_memories_read_as_zero() {
        assert_eq!(decode(8, 0, &[]).unwrap(), BigUint::from(0u32));
        encode(8, 0, &BigUint::from(1u32), &mut []).unwrap();
        assert_eq!(decode(0, 0, &[]).unwrap(), BigUint::from(0u32));
    }

    #[test]
    fn mismatched_slices_are_rejected() {
        assert!(matches!(
            decode(33, 0, &[0]),
            Err(Error::ChunkMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            decode(33, 0, &[0, 0, 0]),
            Err(Error::ChunkMismatch { actual: 3, .. })
        ));
        assert!(matches!(
            decode(0, 0, &[0]),
            Err(Error::ChunkMismatch { width: 0, actual: 1, .. })
        ));
    }

    proptest! {
        #[test]
        fn write_then_read_is_masked_value(
            width in prop::sample::select(vec![1usize, 32, 33, 64, 65]),
            digits in prop::collection::vec(any::<u32>(), 3),
            lsb_at in 0usize..8,
        ) {
            let value = BigUint::from_slice(&digits);
            let mut words = vec![0u32; chunks(width, 1)];
            encode(width, lsb_at, &value, &mut words).unwrap();
            let expected = ((&value >> lsb_at) & mask(width)) << lsb_at;
            prop_assert_eq!(decode(width, lsb_at, &words).unwrap(), expected);
        }

        #[test]
        fn in_range_values_round_trip_exactly(
            width in prop::sample::select(vec![1usize, 32, 33, 64, 65]),
            digits in prop::collection::vec(any::<u32>(), 3),
        ) {
            let value = BigUint::from_slice(&digits) & mask(width);
            let mut words = vec![0u32; chunks(width, 1)];
            encode(width, 0, &value, &mut words).unwrap();
            prop_assert_eq!(decode(width, 0, &words).unwrap(), value);
        }
    }
}
