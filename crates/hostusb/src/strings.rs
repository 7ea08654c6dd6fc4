//! String-descriptor decoding
//!
//! USB string descriptors carry UTF-16LE text behind a two-byte header
//! (total length, descriptor type). Decode failures are silent by design:
//! the strings are presentation values, and a device reporting a malformed
//! descriptor should not fail the listing that asked for it.

use crate::backend::HostBackend;

/// Decode a raw string descriptor into UTF-8
///
/// Byte 0 is the total descriptor length, byte 1 the descriptor type, and
/// bytes `2..length` are UTF-16LE code units. Returns an empty string on
/// any malformed input: short buffer, length byte exceeding the buffer,
/// odd payload length, or invalid UTF-16 (unpaired surrogates).
pub fn decode_string_descriptor(raw: &[u8]) -> String {
    if raw.len() < 2 {
        return String::new();
    }
    let total = usize::from(raw[0]);
    if total < 2 || total > raw.len() {
        return String::new();
    }
    let payload = &raw[2..total];
    if payload.len() % 2 != 0 {
        return String::new();
    }

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    // Surrogate pairs must survive transcoding; from_utf16 rejects
    // unpaired surrogates, which maps to the silent-empty policy.
    String::from_utf16(&units).unwrap_or_default()
}

/// Read and decode one string descriptor from an open handle
///
/// Two-step control read: probe the two-byte header for the total length,
/// then fetch the full descriptor. Index 0 means "no string"; any probe or
/// read failure yields an empty string.
pub fn read_string<B: HostBackend>(backend: &B, handle: B::Handle, index: u8) -> String {
    if index == 0 {
        return String::new();
    }

    let mut probe = [0u8; 2];
    let Ok(n) = backend.read_string_descriptor(handle, index, &mut probe) else {
        return String::new();
    };
    if n != 2 || probe[0] == 0 {
        return String::new();
    }

    let mut raw = vec![0u8; usize::from(probe[0])];
    match backend.read_string_descriptor(handle, index, &mut raw) {
        Ok(n) if n == raw.len() => decode_string_descriptor(&raw),
        _ => String::new(),
    }
}

/// Build a raw UTF-16LE string descriptor
///
/// The inverse of [`decode_string_descriptor`]; used by tests and the mock
/// backend to synthesize device strings.
pub fn encode_string_descriptor(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut raw = Vec::with_capacity(2 + units.len() * 2);
    raw.push((2 + units.len() * 2) as u8);
    raw.push(0x03); // string descriptor type
    for unit in units {
        raw.extend_from_slice(&unit.to_le_bytes());
    }
    raw
}
