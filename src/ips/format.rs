// IPS wire-format constants and shared primitives.
//
// The format is binary, big-endian, with no alignment padding:
//
//   Patch       := Header Hunk* Trailer
//   Header      := "PATCH" (5 bytes)
//   Trailer     := "EOF"   (3 bytes)
//   RegularHunk := Offset(3) Length(2, !=0) Payload(Length bytes)
//   RLEHunk     := Offset(3) 0x0000 RunLength(2, !=0) FillByte(1)
//   Offset      := uint24 big-endian, 0..=0xFFFFFF

/// Fixed 5-byte token that begins every patch.
pub const HEADER: [u8; 5] = *b"PATCH";

/// Fixed 3-byte token that terminates the hunk stream.
pub const TRAILER: [u8; 3] = *b"EOF";

/// Maximum addressable hunk offset (the 3-byte field's ceiling).
pub const MAX_OFFSET: u32 = (1 << 24) - 1;

/// Interpret a byte slice as an unsigned big-endian integer.
///
/// Works for any length up to 4 bytes of significance; an empty slice
/// yields 0. Longer inputs shift high bytes out, matching a 32-bit
/// accumulator.
#[inline]
pub fn be_to_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

/// Render an integer as a `0x`-prefixed, zero-padded lowercase hex string
/// of `2 * byte_len` digits. Diagnostic output only, not wire format.
pub fn format_hex(value: u32, byte_len: usize) -> String {
    format!("0x{value:0width$x}", width = 2 * byte_len)
}

/// Render a big-endian byte slice the same way.
pub fn format_hex_bytes(bytes: &[u8], byte_len: usize) -> String {
    format_hex(be_to_u32(bytes), byte_len)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
