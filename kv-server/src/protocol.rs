//! # RESP2 Request Parser
//!
//! Purpose: Parse a client command — a RESP2 array of bulk strings — out of
//! a growing read buffer, without consuming bytes until a full command is
//! available. Hand-rolled rather than pulled from a protocol crate, the
//! same way the hand-rolled TCP server this module sits in prefers to own
//! its own wire format instead of a dependency.

use bytes::{Buf, BytesMut};

#[derive(Debug, PartialEq, Eq)]
pub enum RespError {
    Protocol,
}

/// Parses RESP2 command frames out of a buffer fed by the connection
/// handler. Stateless between calls: all progress is recorded by
/// advancing `buf` itself.
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        RespParser
    }

    /// Attempts to parse one full command from `buf`.
    ///
    /// Returns `Ok(Some(args))` and consumes the bytes of exactly one
    /// command on success, `Ok(None)` (consuming nothing) if `buf` holds
    /// an incomplete command, or `Err` on malformed input.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Vec<u8>>>, RespError> {
        let mut cursor = 0usize;

        let count = match read_array_header(buf, &mut cursor)? {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            match read_bulk_string(buf, &mut cursor)? {
                Some(bytes) => args.push(bytes),
                None => return Ok(None),
            }
        }

        buf.advance(cursor);
        Ok(Some(args))
    }
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the next CRLF at or after `buf[start..]`, returning the index of
/// the `\r`. `None` means the line is not yet complete in the buffer.
fn find_crlf(buf: &BytesMut, start: usize) -> Option<usize> {
    let haystack = &buf[start..];
    haystack
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| start + pos)
    // Note: a pathological client could stall progress by never sending
    // CRLF; the caller bounds total buffer growth, not this function.
}

fn read_array_header(buf: &BytesMut, cursor: &mut usize) -> Result<Option<usize>, RespError> {
    if buf.len() <= *cursor {
        return Ok(None);
    }
    if buf[*cursor] != b'*' {
        return Err(RespError::Protocol);
    }
    let line_start = *cursor + 1;
    let Some(crlf) = find_crlf(buf, line_start) else {
        return Ok(None);
    };
    let count: usize = std::str::from_utf8(&buf[line_start..crlf])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(RespError::Protocol)?;
    *cursor = crlf + 2;
    Ok(Some(count))
}

fn read_bulk_string(buf: &BytesMut, cursor: &mut usize) -> Result<Option<Vec<u8>>, RespError> {
    if buf.len() <= *cursor {
        return Ok(None);
    }
    if buf[*cursor] != b'$' {
        return Err(RespError::Protocol);
    }
    let len_start = *cursor + 1;
    let Some(crlf) = find_crlf(buf, len_start) else {
        return Ok(None);
    };
    let len: usize = std::str::from_utf8(&buf[len_start..crlf])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(RespError::Protocol)?;

    let data_start = crlf + 2;
    let data_end = data_start + len;
    let terminator_end = data_end + 2;
    if buf.len() < terminator_end {
        return Ok(None);
    }
    if &buf[data_end..terminator_end] != b"\r\n" {
        return Err(RespError::Protocol);
    }

    *cursor = terminator_end;
    Ok(Some(buf[data_start..data_end].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_command() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"[..]);
        let mut parser = RespParser::new();
        let args = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(args, vec![b"GET".to_vec(), b"k".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn returns_none_without_consuming_on_partial_command() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$1\r\n"[..]);
        let original_len = buf.len();
        let mut parser = RespParser::new();
        let result = parser.parse(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), original_len);
    }

    #[test]
    fn parses_two_commands_back_to_back() {
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n"[..]);
        let mut parser = RespParser::new();
        let first = parser.parse(&mut buf).unwrap().unwrap();
        let second = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(first, vec![b"PING".to_vec()]);
        assert_eq!(second, vec![b"PING".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_a_malformed_prefix() {
        let mut buf = BytesMut::from(&b"@2\r\n"[..]);
        let mut parser = RespParser::new();
        assert_eq!(parser.parse(&mut buf), Err(RespError::Protocol));
    }
}
