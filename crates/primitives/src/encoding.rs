//! State delta encoding.
//!
//! A delta is an unsigned LEB128 varint, bit-compatible with Go's
//! `binary.PutUvarint` / `binary.Uvarint`. The aggregate state is a `u64`
//! whose canonical hash is its decimal ASCII rendering.

#[cfg(test)]
#[path = "tests/encoding.rs"]
mod tests;

use thiserror::Error;

use crate::block::Transaction;

/// Maximum encoded width of a `u64` varint.
pub const MAX_VARINT_LEN64: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum VarintError {
    /// Input ended before a terminating byte was found (zero width consumed).
    #[error("varint is truncated")]
    Truncated,

    /// Value does not fit in 64 bits (negative width consumed).
    #[error("varint overflows 64 bits after {consumed} bytes")]
    Overflow { consumed: usize },
}

/// Decodes a varint from the front of `buf`, returning the value and the
/// number of bytes consumed. Trailing bytes are ignored.
pub fn decode_uvarint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value = 0_u64;
    let mut shift = 0_u32;

    for (idx, &byte) in buf.iter().enumerate() {
        if idx == MAX_VARINT_LEN64 {
            return Err(VarintError::Overflow { consumed: idx + 1 });
        }

        if byte < 0x80 {
            if idx == MAX_VARINT_LEN64 - 1 && byte > 1 {
                return Err(VarintError::Overflow { consumed: idx + 1 });
            }

            return Ok((value | u64::from(byte) << shift, idx + 1));
        }

        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    Err(VarintError::Truncated)
}

/// Encodes `value` into a fixed `MAX_VARINT_LEN64` buffer, zero padded.
#[must_use]
pub fn encode_uvarint(mut value: u64) -> Vec<u8> {
    let mut buf = vec![0; MAX_VARINT_LEN64];
    let mut idx = 0;

    while value >= 0x80 {
        #[expect(clippy::cast_possible_truncation, reason = "masked to 7 bits")]
        let low = (value & 0x7f) as u8;
        buf[idx] = low | 0x80;
        value >>= 7;
        idx += 1;
    }

    #[expect(clippy::cast_possible_truncation, reason = "value < 0x80 here")]
    let last = value as u8;
    buf[idx] = last;

    buf
}

/// Folds every transaction payload into a `MAX_VARINT_LEN64` accumulator,
/// byte `i` of each payload adding (wrapping) into slot `i % 10`.
///
/// The result is both the block-hash payload digest and, for committed
/// batches, the state delta applied to the ledger.
#[must_use]
pub fn fold_payloads<'a, I>(payloads: I) -> [u8; MAX_VARINT_LEN64]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut acc = [0_u8; MAX_VARINT_LEN64];

    for payload in payloads {
        for (idx, byte) in payload.iter().enumerate() {
            let slot = &mut acc[idx % MAX_VARINT_LEN64];
            *slot = slot.wrapping_add(*byte);
        }
    }

    acc
}

/// [`fold_payloads`] over a transaction list.
#[must_use]
pub fn fold_transactions(transactions: &[Transaction]) -> [u8; MAX_VARINT_LEN64] {
    fold_payloads(transactions.iter().map(|tx| tx.payload.as_slice()))
}

/// Canonical, byte-comparable encoding of the aggregate state.
#[must_use]
pub fn encode_state_hash(state: u64) -> Vec<u8> {
    state.to_string().into_bytes()
}
