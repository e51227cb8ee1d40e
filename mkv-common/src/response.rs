//! # Meta Response Parsing
//!
//! Purpose: Decode server replies (`HD`, `VA`, `EN`, `NS`, `EX`, `NF`) from
//! the bytes accumulated off the socket.
//!
//! ## Design Principles
//! 1. **Protocol Framing**: A response is complete when its status line CRLF
//!    and, for `VA`, the declared data block plus CRLF are buffered.
//! 2. **Stateless**: Each call inspects the buffer from the front; nothing is
//!    carried between calls.
//! 3. **Raw Flags**: Tokens after the return code are kept as strings and not
//!    interpreted.
//! 4. **Fail Fast**: Unknown return codes surface the raw status line.
//!
//! ## Wire Shapes
//!
//! ```text
//! HD [<flag> ...]\r\n
//! VA <size> [<flag> ...]\r\n<data: size bytes>\r\n
//! EN\r\n
//! NS\r\n | EX\r\n | NF\r\n
//! ```

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};

/// Two-letter status token that starts every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// Success without a data block (`HD`).
    Header,
    /// Value attached (`VA`).
    Value,
    /// Item not found on get (`EN`).
    Miss,
    /// Item not stored (`NS`).
    NotStored,
    /// CAS mismatch (`EX`).
    Exists,
    /// CAS target missing (`NF`).
    NotFound,
}

impl ReturnCode {
    /// Parses a status token.
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"HD" => Some(ReturnCode::Header),
            b"VA" => Some(ReturnCode::Value),
            b"EN" => Some(ReturnCode::Miss),
            b"NS" => Some(ReturnCode::NotStored),
            b"EX" => Some(ReturnCode::Exists),
            b"NF" => Some(ReturnCode::NotFound),
            _ => None,
        }
    }

    /// Wire spelling of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ReturnCode::Header => "HD",
            ReturnCode::Value => "VA",
            ReturnCode::Miss => "EN",
            ReturnCode::NotStored => "NS",
            ReturnCode::Exists => "EX",
            ReturnCode::NotFound => "NF",
        }
    }
}

/// Outcome of an `ms` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// `HD`: value stored.
    Stored,
    /// `NS`: value not stored.
    NotStored,
    /// `EX`: CAS token did not match.
    Exists,
    /// `NF`: CAS target does not exist.
    NotFound,
}

impl StoreStatus {
    /// Maps a set return code, rejecting codes only valid for gets.
    pub fn from_code(code: ReturnCode) -> ProtocolResult<Self> {
        match code {
            ReturnCode::Header => Ok(StoreStatus::Stored),
            ReturnCode::NotStored => Ok(StoreStatus::NotStored),
            ReturnCode::Exists => Ok(StoreStatus::Exists),
            ReturnCode::NotFound => Ok(StoreStatus::NotFound),
            other => Err(ProtocolError::UnexpectedReturnCode(other.as_str())),
        }
    }

    /// True only for `Stored`.
    pub fn is_stored(self) -> bool {
        self == StoreStatus::Stored
    }
}

/// One decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaResponse {
    /// Return code from the status line.
    pub code: ReturnCode,
    /// Raw flag tokens following the code (and the size, for `VA`).
    pub tokens: Vec<String>,
    /// Data block, present only for `VA`.
    pub value: Option<Bytes>,
}

impl MetaResponse {
    /// Consumes the response and returns its data block.
    pub fn into_value(self) -> Option<Bytes> {
        self.value
    }

    /// True when the item was found (`HD` or `VA`).
    pub fn is_hit(&self) -> bool {
        matches!(self.code, ReturnCode::Header | ReturnCode::Value)
    }

    /// Returns the raw token starting with `letter`, without the letter.
    ///
    /// `token('s')` on `HD s5 t-1` yields `Some("5")`.
    pub fn token(&self, letter: char) -> Option<&str> {
        self.tokens.iter().find_map(|token| token.strip_prefix(letter))
    }
}

/// Parses one response off the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched while the response is still
/// incomplete; on success the consumed bytes are removed from `buf`.
pub fn parse_response(buf: &mut BytesMut) -> ProtocolResult<Option<MetaResponse>> {
    let line_end = match find_crlf(buf) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let (code, size, tokens) = parse_status_line(&buf[..line_end])?;
    let header_len = line_end + 2;

    let size = match size {
        Some(size) => size,
        None => {
            buf.advance(header_len);
            return Ok(Some(MetaResponse {
                code,
                tokens,
                value: None,
            }));
        }
    };

    let frame_len = match header_len.checked_add(size).and_then(|len| len.checked_add(2)) {
        Some(len) => len,
        None => return Err(ProtocolError::InvalidSize(lossy(&buf[..line_end]))),
    };
    if buf.len() < frame_len {
        return Ok(None);
    }
    if &buf[frame_len - 2..frame_len] != b"\r\n" {
        return Err(ProtocolError::MissingTerminator);
    }

    let mut frame = buf.split_to(frame_len);
    frame.advance(header_len);
    frame.truncate(size);
    Ok(Some(MetaResponse {
        code,
        tokens,
        value: Some(frame.freeze()),
    }))
}

/// Decodes the value from the complete bytes of a single response.
///
/// `VA` yields its data block; every other known code yields `None`.
pub fn decode_value(data: &[u8]) -> ProtocolResult<Option<Bytes>> {
    let mut buf = BytesMut::from(data);
    match parse_response(&mut buf)? {
        Some(response) => Ok(response.into_value()),
        None => Err(ProtocolError::Incomplete),
    }
}

fn parse_status_line(line: &[u8]) -> ProtocolResult<(ReturnCode, Option<usize>, Vec<String>)> {
    let mut fields = line.split(|&b| b == b' ').filter(|field| !field.is_empty());
    let first = fields.next().ok_or(ProtocolError::EmptyStatusLine)?;
    let code = ReturnCode::from_token(first)
        .ok_or_else(|| ProtocolError::UnknownReturnCode(lossy(line)))?;

    let size = if code == ReturnCode::Value {
        let field = fields
            .next()
            .ok_or_else(|| ProtocolError::InvalidSize(lossy(line)))?;
        Some(parse_usize(field).ok_or_else(|| ProtocolError::InvalidSize(lossy(line)))?)
    } else {
        None
    };

    let tokens = fields.map(lossy).collect();
    Ok((code, size, tokens))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\r\n")
}

fn parse_usize(data: &[u8]) -> Option<usize> {
    if data.is_empty() {
        return None;
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
    }
    Some(value)
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> ProtocolResult<Option<MetaResponse>> {
        let mut buf = BytesMut::from(data);
        parse_response(&mut buf)
    }

    #[test]
    fn parses_header_only() {
        let resp = parse(b"HD\r\n").unwrap().unwrap();
        assert_eq!(resp.code, ReturnCode::Header);
        assert!(resp.tokens.is_empty());
        assert_eq!(resp.value, None);
    }

    #[test]
    fn parses_header_with_tokens() {
        let resp = parse(b"HD s5 t-1\r\n").unwrap().unwrap();
        assert_eq!(resp.tokens, vec!["s5".to_string(), "t-1".to_string()]);
        assert_eq!(resp.token('s'), Some("5"));
        assert_eq!(resp.token('t'), Some("-1"));
        assert_eq!(resp.token('c'), None);
    }

    #[test]
    fn parses_miss() {
        let resp = parse(b"EN\r\n").unwrap().unwrap();
        assert_eq!(resp.code, ReturnCode::Miss);
        assert!(!resp.is_hit());
    }

    #[test]
    fn parses_value_ignoring_flags() {
        let resp = parse(b"VA 5 s5 kkey\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(resp.code, ReturnCode::Value);
        assert_eq!(resp.value, Some(Bytes::from_static(b"hello")));
        assert_eq!(resp.tokens, vec!["s5".to_string(), "kkey".to_string()]);
    }

    #[test]
    fn value_may_contain_crlf() {
        let resp = parse(b"VA 4\r\na\r\nb\r\n").unwrap().unwrap();
        assert_eq!(resp.value, Some(Bytes::from_static(b"a\r\nb")));
    }

    #[test]
    fn parses_empty_value() {
        let resp = parse(b"VA 0\r\n\r\n").unwrap().unwrap();
        assert_eq!(resp.value, Some(Bytes::new()));
    }

    #[test]
    fn incomplete_input_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"VA 10\r\nhel"[..]);
        assert_eq!(parse_response(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"VA 10\r\nhel");

        let mut buf = BytesMut::from(&b"HD"[..]);
        assert_eq!(parse_response(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"HD");
    }

    #[test]
    fn consumes_one_response_at_a_time() {
        let mut buf = BytesMut::from(&b"VA 1\r\nx\r\nEN\r\n"[..]);
        let first = parse_response(&mut buf).unwrap().unwrap();
        assert_eq!(first.value, Some(Bytes::from_static(b"x")));
        assert_eq!(&buf[..], b"EN\r\n");
        let second = parse_response(&mut buf).unwrap().unwrap();
        assert_eq!(second.code, ReturnCode::Miss);
        assert!(buf.is_empty());
    }

    #[test]
    fn parses_store_codes() {
        for (wire, status) in [
            (&b"HD\r\n"[..], StoreStatus::Stored),
            (&b"NS\r\n"[..], StoreStatus::NotStored),
            (&b"EX\r\n"[..], StoreStatus::Exists),
            (&b"NF\r\n"[..], StoreStatus::NotFound),
        ] {
            let resp = parse(wire).unwrap().unwrap();
            assert_eq!(StoreStatus::from_code(resp.code).unwrap(), status);
        }
        assert_eq!(
            StoreStatus::from_code(ReturnCode::Miss),
            Err(ProtocolError::UnexpectedReturnCode("EN"))
        );
    }

    #[test]
    fn rejects_unknown_code_with_raw_line() {
        let err = parse(b"SERVER_ERROR out of memory\r\n").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnknownReturnCode("SERVER_ERROR out of memory".to_string())
        );
    }

    #[test]
    fn rejects_empty_status_line() {
        assert_eq!(parse(b"\r\n").unwrap_err(), ProtocolError::EmptyStatusLine);
    }

    #[test]
    fn rejects_bad_size() {
        assert_eq!(
            parse(b"VA x\r\n").unwrap_err(),
            ProtocolError::InvalidSize("VA x".to_string())
        );
        assert_eq!(
            parse(b"VA\r\n").unwrap_err(),
            ProtocolError::InvalidSize("VA".to_string())
        );
    }

    #[test]
    fn rejects_size_overflowing_frame_length() {
        let max = format!("VA {}\r\nabc", usize::MAX);
        assert_eq!(
            parse(max.as_bytes()).unwrap_err(),
            ProtocolError::InvalidSize(format!("VA {}", usize::MAX))
        );

        let near_max = format!("VA {}\r\n{}", usize::MAX - 1, "x".repeat(36));
        assert_eq!(
            parse(near_max.as_bytes()).unwrap_err(),
            ProtocolError::InvalidSize(format!("VA {}", usize::MAX - 1))
        );
    }

    #[test]
    fn large_size_waits_for_more_data() {
        let mut buf = BytesMut::from(&b"VA 4096 s4096\r\nabc"[..]);
        assert_eq!(parse_response(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 18);
    }

    #[test]
    fn rejects_missing_terminator() {
        assert_eq!(
            parse(b"VA 2\r\nabcd").unwrap_err(),
            ProtocolError::MissingTerminator
        );
    }

    #[test]
    fn decodes_value_from_complete_bytes() {
        assert_eq!(
            decode_value(b"VA 3 s3\r\nabc\r\n").unwrap(),
            Some(Bytes::from_static(b"abc"))
        );
        assert_eq!(decode_value(b"EN\r\n").unwrap(), None);
        assert_eq!(decode_value(b"HD\r\n").unwrap(), None);
        assert_eq!(decode_value(b"VA 3\r\nab").unwrap_err(), ProtocolError::Incomplete);
    }
}
