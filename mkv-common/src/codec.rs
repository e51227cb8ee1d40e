//! # Meta Command Encoding
//!
//! Purpose: Turn `ms`/`mg` requests into the exact bytes written to the
//! socket, reusing a caller-provided buffer.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: Encoders append to `out` and never allocate on their own.
//! 2. **Byte Lengths**: Sizes are counted in bytes, so multi-byte UTF-8 is safe.
//! 3. **No Escaping**: Keys are written verbatim; they must not contain
//!    whitespace or CRLF.

use crate::flags::GetOptions;

/// Builds the wire key from a table/namespace and an id.
///
/// The two parts are concatenated without a separator, so `("a", "bc")` and
/// `("ab", "c")` address the same item.
pub fn make_key(table: &str, id: &str) -> String {
    let mut key = String::with_capacity(table.len() + id.len());
    key.push_str(table);
    key.push_str(id);
    key
}

/// Encodes `ms <key> <len>\r\n<value>\r\n` into `out`.
pub fn encode_set(key: &[u8], value: &[u8], out: &mut Vec<u8>) {
    out.reserve(key.len() + value.len() + 28);
    out.extend_from_slice(b"ms ");
    out.extend_from_slice(key);
    out.push(b' ');
    push_usize(out, value.len());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

/// Encodes `mg <key> [<flag> ...]\r\n` into `out`.
///
/// No trailing space is written when no flag is enabled.
pub fn encode_get(key: &[u8], options: &GetOptions, out: &mut Vec<u8>) {
    out.reserve(key.len() + 32);
    out.extend_from_slice(b"mg ");
    out.extend_from_slice(key);
    for token in options.tokens() {
        out.push(b' ');
        out.push(token);
    }
    out.extend_from_slice(b"\r\n");
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Digits go through a stack buffer, no intermediate String.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        out.push(b'0');
        return;
    }
    while value > 0 {
        buf[len] = b'0' + (value % 10) as u8;
        value /= 10;
        len += 1;
    }
    buf[..len].reverse();
    out.extend_from_slice(&buf[..len]);
}
