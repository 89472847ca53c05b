//! UTF-8 host strings ⇄ UTF-16LE guest strings.
//!
//! PDFium's wide-string APIs speak UTF-16LE with a terminating zero
//! unit; byte lengths reported by the two-call size queries include
//! that terminator.

use crate::error::{Error, Result};

/// Encodes a host string as UTF-16LE bytes with a terminating zero unit.
pub(crate) fn to_utf16le(text: &str) -> Vec<u8> {
    let mut units: Vec<u16> = text.encode_utf16().collect();
    units.push(0);
    bytemuck::cast_slice::<u16, u8>(&units).to_vec()
}

/// Decodes UTF-16LE guest bytes into a host string.
///
/// A terminating zero unit and anything after it are dropped. Unpaired
/// surrogates are rejected rather than replaced so that corrupted guest
/// output is visible instead of silently lossy.
pub(crate) fn from_utf16le(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::DecodeFailed("UTF-16LE string (odd byte length)"));
    }

    // `pod_collect_to_vec` handles unaligned input; the units come back
    // in native order, which is little-endian on every supported host.
    let mut units: Vec<u16> = bytemuck::pod_collect_to_vec(bytes);
    if let Some(end) = units.iter().position(|&u| u == 0) {
        units.truncate(end);
    }

    String::from_utf16(&units).map_err(|_| Error::DecodeFailed("UTF-16LE string"))
}
