//! IPv4 address codec for the producer's integer address columns.
//!
//! Addresses arrive as a decimal integer. Non-negative values are the address
//! in network byte order. Negative values come from the producer exporting
//! the little-endian word as a signed 32-bit integer: the value is re-biased
//! into `u32`, written as 8 hex digits, and the digit pairs are reversed
//! before being read back as four octets. Reversing the byte pairs of the
//! big-endian rendering is exactly the little-endian byte order, which is what
//! [`decode`] uses.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Why an integer could not be decoded into an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Zero is the producer's "no address" marker.
    #[error("address is unset (zero)")]
    Unset,

    /// Outside both the signed 32-bit and unsigned 32-bit ranges.
    #[error("value {0} does not fit a 32-bit address")]
    OutOfRange(i64),
}

/// Decodes a stored integer into an IPv4 address.
pub fn decode(value: i64) -> Result<Ipv4Addr, AddressError> {
    match value {
        0 => Err(AddressError::Unset),
        v if v < 0 => {
            if v < i64::from(i32::MIN) {
                return Err(AddressError::OutOfRange(v));
            }
            let rebiased = ((1i64 << 32) + v) as u32;
            Ok(Ipv4Addr::from(rebiased.to_le_bytes()))
        }
        v => u32::try_from(v)
            .map(Ipv4Addr::from)
            .map_err(|_| AddressError::OutOfRange(v)),
    }
}

/// Encodes an address the way the producer writes it in the standard path.
pub fn encode_standard(addr: Ipv4Addr) -> i64 {
    i64::from(u32::from(addr))
}

/// Encodes an address the way the producer writes it in the reversed path.
///
/// The reversed export only yields a negative value when the last octet is
/// 128 or above; for other addresses the producer's output would be read back
/// through the standard path, so `None` is returned.
pub fn encode_reversed(addr: Ipv4Addr) -> Option<i64> {
    let signed = i32::from_le_bytes(addr.octets());
    (signed < 0).then_some(i64::from(signed))
}
