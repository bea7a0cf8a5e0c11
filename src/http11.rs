//! RFC 7230 lexical rules: start lines, header blocks, chunk size lines,
//! and the byte classes they are built from.
//!
//! Parsing works on single lines the receive buffer already extracted, so
//! every function here is a linear scan over its input with no backtracking.

use bytes::Bytes;

use crate::error::Error;
use crate::event::{Request, Response};
use crate::headers::{Headers, Lossy};

/// RFC 7230 `tchar`.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

pub(crate) fn is_token(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|&b| is_token_byte(b))
}

/// Header field contents: visible ASCII, obs-text, and inner SP/HTAB. No
/// control bytes, no embedded line breaks.
pub(crate) fn is_field_value(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|&b| b == b'\t' || b == b' ' || (0x21..=0x7e).contains(&b) || b >= 0x80)
}

/// Request targets: visible ASCII only, no whitespace.
pub(crate) fn is_request_target(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x21..=0x7e).contains(&b))
}

/// Reason phrases may additionally contain SP/HTAB and obs-text.
pub(crate) fn is_reason_phrase(bytes: &[u8]) -> bool {
    is_field_value(bytes)
}

/// Strip optional whitespace (SP / HTAB) from both ends.
pub(crate) fn trim_ows(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

fn find(bytes: &[u8], needle: u8) -> Option<usize> {
    bytes.iter().position(|&b| b == needle)
}

/// Parse `HTTP/d.d`, returning the `d.d` part.
fn parse_version(bytes: &Bytes, at: usize) -> Option<Bytes> {
    let v = &bytes[at..];
    if v.len() == 8
        && v.starts_with(b"HTTP/")
        && v[5].is_ascii_digit()
        && v[6] == b'.'
        && v[7].is_ascii_digit()
    {
        Some(bytes.slice(at + 5..at + 8))
    } else {
        None
    }
}

/// Parse `method SP target SP HTTP/d.d`.
pub(crate) fn parse_request_line(line: &Bytes) -> Result<(Bytes, Bytes, Bytes), Error> {
    let bad = || Error::user(format!("illegal request line {:?}", Lossy(line)));

    let sp1 = find(line, b' ').ok_or_else(bad)?;
    let method = line.slice(..sp1);
    if !is_token(&method) {
        return Err(bad());
    }

    let sp2 = find(&line[sp1 + 1..], b' ')
        .map(|i| sp1 + 1 + i)
        .ok_or_else(bad)?;
    let target = line.slice(sp1 + 1..sp2);
    if target.is_empty() || !is_request_target(&target) {
        return Err(bad());
    }

    let http_version = parse_version(line, sp2 + 1).ok_or_else(bad)?;
    Ok((method, target, http_version))
}

/// Parse `HTTP/d.d SP 3-digit-status [SP reason]`. The reason phrase may be
/// missing entirely; it is kept verbatim when present.
pub(crate) fn parse_status_line(line: &Bytes) -> Result<(Bytes, u16, Bytes), Error> {
    let bad = || Error::user(format!("illegal status line {:?}", Lossy(line)));

    let sp1 = find(line, b' ').ok_or_else(bad)?;
    if sp1 != 8 {
        return Err(bad());
    }
    let http_version = parse_version(line, 0).ok_or_else(bad)?;

    let digits = line.get(9..12).ok_or_else(bad)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }
    let status_code = digits
        .iter()
        .fold(0u16, |n, &b| n * 10 + u16::from(b - b'0'));

    let reason = match line.get(12).copied() {
        None => Bytes::new(),
        Some(b' ') => line.slice(13..),
        Some(_) => return Err(bad()),
    };
    if !is_reason_phrase(&reason) {
        return Err(bad());
    }
    Ok((http_version, status_code, reason))
}

/// Turn the lines of a header block (or trailer section) into a validated
/// header list. A line starting with SP/HTAB is obsolete line folding: its
/// content continues the previous header's value, joined by a single space.
pub(crate) fn parse_header_block(lines: &[Bytes]) -> Result<Headers, Error> {
    let mut pairs: Vec<(Bytes, Bytes)> = Vec::with_capacity(lines.len());
    for line in lines {
        if matches!(line.first(), Some(b' ') | Some(b'\t')) {
            let (_, last_value) = pairs
                .last_mut()
                .ok_or_else(|| Error::user("continuation line at start of headers"))?;
            let folded = trim_ows(line);
            let mut joined = Vec::with_capacity(last_value.len() + 1 + folded.len());
            joined.extend_from_slice(last_value);
            joined.push(b' ');
            joined.extend_from_slice(folded);
            *last_value = Bytes::from(joined);
            continue;
        }

        let colon = find(line, b':')
            .ok_or_else(|| Error::user(format!("illegal header line {:?}", Lossy(line))))?;
        let name = line.slice(..colon);
        if !is_token(&name) {
            // Covers whitespace inside the name and between name and colon.
            return Err(Error::user(format!(
                "illegal header line {:?}",
                Lossy(line)
            )));
        }
        let value = trim_ows(&line[colon + 1..]);
        let lead = value.as_ptr() as usize - line.as_ptr() as usize;
        pairs.push((name, line.slice(lead..lead + value.len())));
    }
    Headers::from_wire(pairs)
}

/// Parse a chunk size line: hex size, optional extensions (parsed and
/// discarded), tolerated trailing whitespace.
pub(crate) fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    let bad = || Error::remote(format!("illegal chunk header {:?}", Lossy(line)));

    let without_ext = match find(line, b';') {
        Some(semi) => &line[..semi],
        None => line,
    };
    let digits = trim_ows(without_ext);
    if digits.is_empty() || digits.len() > 16 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(bad());
    }
    let mut size: u64 = 0;
    for &b in digits {
        let d = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(bad()),
        };
        size = size
            .checked_mul(16)
            .and_then(|n| n.checked_add(u64::from(d)))
            .ok_or_else(bad)?;
    }
    Ok(size)
}

pub(crate) fn push_dec(out: &mut Vec<u8>, n: u64) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    let mut n = n;
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[i..]);
}

pub(crate) fn push_hex(out: &mut Vec<u8>, n: u64) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut digits = [0u8; 16];
    let mut i = digits.len();
    let mut n = n;
    loop {
        i -= 1;
        digits[i] = HEX[(n & 0xf) as usize];
        n >>= 4;
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[i..]);
}

/// Write an http/1.1 request head to a buffer.
pub(crate) fn write_request_head(req: &Request, out: &mut Vec<u8>) {
    out.extend_from_slice(&req.method);
    out.push(b' ');
    out.extend_from_slice(&req.target);
    out.extend_from_slice(b" HTTP/1.1\r\n");
    write_headers(&req.headers, out);
    out.extend_from_slice(b"\r\n");
}

/// Write an http/1.1 response head to a buffer. The reason phrase may be
/// empty; the separating space is written either way.
pub(crate) fn write_response_head(res: &Response, out: &mut Vec<u8>) {
    out.extend_from_slice(b"HTTP/1.1 ");
    push_dec(out, u64::from(res.status_code));
    out.push(b' ');
    out.extend_from_slice(&res.reason);
    out.extend_from_slice(b"\r\n");
    write_headers(&res.headers, out);
    out.extend_from_slice(b"\r\n");
}

/// Write header lines with their original casing. Never emits folded lines.
pub(crate) fn write_headers(headers: &Headers, out: &mut Vec<u8>) {
    for (raw_name, value) in headers.raw_iter() {
        out.extend_from_slice(raw_name);
        out.extend_from_slice(b": ");
        out.extend_from_slice(value);
        out.extend_from_slice(b"\r\n");
    }
}
