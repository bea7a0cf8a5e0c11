//! Header lists.
//!
//! Headers are kept as an ordered list, not a map: order matters on the wire
//! and several headers express a preference through it. Each entry stores the
//! name twice, once exactly as received or supplied and once lowercased; the
//! lowercase form is the canonical key for lookups and for equality, the raw
//! form is what the writer puts back on the wire.

use std::fmt;

use bytes::Bytes;

use crate::error::Error;
use crate::http11;

#[derive(Clone)]
struct Entry {
    raw_name: Bytes,
    name: Bytes,
    value: Bytes,
}

/// An ordered list of header fields.
#[derive(Clone, Default)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Build a validated header list from (name, value) pairs.
    ///
    /// Names must be tokens; values get their surrounding whitespace
    /// stripped and may not contain control bytes. The special-header rules
    /// are applied here:
    ///
    /// 1. `Content-Length` must be a decimal integer. Repeats are allowed
    ///    only when every value is identical, and collapse to one entry.
    /// 2. `Transfer-Encoding` may appear once, and `chunked` is the only
    ///    transfer coding understood (anything else rejects with hint 501).
    /// 3. The two must not appear together.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Headers, Error>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let raw = pairs
            .into_iter()
            .map(|(n, v)| {
                let value = http11::trim_ows(v.as_ref());
                (
                    Bytes::copy_from_slice(n.as_ref()),
                    Bytes::copy_from_slice(value),
                )
            })
            .collect();
        Headers::from_wire(raw)
    }

    /// Same validation as [`from_pairs`], for pairs the tokenizer produced.
    /// Values are expected to be OWS-stripped already.
    ///
    /// [`from_pairs`]: Headers::from_pairs
    pub(crate) fn from_wire(pairs: Vec<(Bytes, Bytes)>) -> Result<Headers, Error> {
        let mut entries: Vec<Entry> = Vec::with_capacity(pairs.len());
        let mut content_length: Option<Bytes> = None;
        let mut saw_transfer_encoding = false;

        for (raw_name, mut value) in pairs {
            if raw_name.is_empty() || !http11::is_token(&raw_name) {
                return Err(Error::user(format!(
                    "illegal header name {:?}",
                    Lossy(&raw_name)
                )));
            }
            if !http11::is_field_value(&value) {
                return Err(Error::user(format!(
                    "illegal header value {:?}",
                    Lossy(&value)
                )));
            }
            let name = lowercase(&raw_name);

            if name.as_ref() == b"content-length" {
                if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
                    return Err(Error::user("bad Content-Length"));
                }
                if let Some(prev) = &content_length {
                    // Repeats are collapsed; disagreement is unrecoverable.
                    if *prev == value {
                        continue;
                    }
                    return Err(Error::user("conflicting Content-Length headers"));
                }
                content_length = Some(value.clone());
            } else if name.as_ref() == b"transfer-encoding" {
                // "A server that receives a request message with a transfer
                // coding it does not understand SHOULD respond with 501."
                // https://tools.ietf.org/html/rfc7230#section-3.3.1
                if saw_transfer_encoding {
                    return Err(Error::user_with_status(
                        "multiple Transfer-Encoding headers",
                        501,
                    ));
                }
                // Transfer coding names are case-insensitive.
                value = lowercase(&value);
                for coding in comma_split(&value) {
                    if coding.as_ref() != b"chunked" {
                        return Err(Error::user_with_status(
                            "Only Transfer-Encoding: chunked is supported",
                            501,
                        ));
                    }
                }
                saw_transfer_encoding = true;
            }

            entries.push(Entry {
                raw_name,
                name,
                value,
            });
        }

        if content_length.is_some() && saw_transfer_encoding {
            return Err(Error::user(
                "Transfer-Encoding and Content-Length in the same message",
            ));
        }

        Ok(Headers { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(canonical lowercase name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.entries.iter().map(|e| (e.name.as_ref(), e.value.as_ref()))
    }

    /// Iterate `(raw name, value)` pairs in wire order, for serialization.
    pub fn raw_iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.entries
            .iter()
            .map(|e| (e.raw_name.as_ref(), e.value.as_ref()))
    }

    /// First value for `name` (lowercase), if any.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let name = name.as_bytes();
        self.entries
            .iter()
            .find(|e| e.name.as_ref() == name)
            .map(|e| e.value.as_ref())
    }

    /// Collect the comma-separated tokens of every `name` header, in order.
    /// `lowercase` should be true for case-insensitive headers such as
    /// `Connection` and `Transfer-Encoding`.
    pub fn get_comma(&self, name: &str, lowercase_values: bool) -> Vec<Bytes> {
        let name = name.as_bytes();
        let mut out = Vec::new();
        for e in &self.entries {
            if e.name.as_ref() != name {
                continue;
            }
            let value = if lowercase_values {
                lowercase(&e.value)
            } else {
                e.value.clone()
            };
            for token in comma_split(&value) {
                out.push(token);
            }
        }
        out
    }

    /// Replace every `raw_name` header with one entry per value, appended at
    /// the end. An empty value list just deletes. This is how the engine
    /// inserts its own headers, so `raw_name` should be the titlecased
    /// canonical form.
    pub(crate) fn set_comma(&mut self, raw_name: &str, values: &[&[u8]]) {
        let name = raw_name.to_ascii_lowercase();
        self.entries.retain(|e| e.name.as_ref() != name.as_bytes());
        for value in values {
            self.entries.push(Entry {
                raw_name: Bytes::copy_from_slice(raw_name.as_bytes()),
                name: Bytes::copy_from_slice(name.as_bytes()),
                value: Bytes::copy_from_slice(value),
            });
        }
    }

    /// Does any `name` header carry `token` in its comma-separated value?
    /// Both sides compared case-insensitively.
    pub fn contains_token(&self, name: &str, token: &[u8]) -> bool {
        self.get_comma(name, true)
            .iter()
            .any(|t| t.as_ref() == token)
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        let name = name.as_bytes();
        self.entries.iter().filter(|e| e.name.as_ref() == name).count()
    }

    /// The declared `Content-Length`, if any.
    pub(crate) fn content_length(&self) -> Result<Option<u64>, Error> {
        let value = match self.get("content-length") {
            Some(v) => v,
            None => return Ok(None),
        };
        // Digits were validated on construction; this can only fail on a
        // value too large to represent.
        match std::str::from_utf8(value).ok().and_then(|v| v.parse().ok()) {
            Some(n) => Ok(Some(n)),
            None => Err(Error::user("bad Content-Length")),
        }
    }
}

/// Equality is over the canonical (name, value) pairs; the raw casing a peer
/// happened to use does not make two header lists different.
impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Headers {}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut map = f.debug_map();
        for e in &self.entries {
            map.entry(&Lossy(&e.raw_name), &Lossy(&e.value));
        }
        map.finish()
    }
}

/// Byte strings rendered as text in debug output and error messages.
pub(crate) struct Lossy<'a>(pub &'a [u8]);

impl fmt::Debug for Lossy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.0))
    }
}

fn lowercase(b: &Bytes) -> Bytes {
    if b.iter().any(u8::is_ascii_uppercase) {
        Bytes::from(b.to_ascii_lowercase())
    } else {
        b.clone()
    }
}

/// Split on commas, trimming whitespace and dropping empty items.
fn comma_split(value: &Bytes) -> impl Iterator<Item = Bytes> + '_ {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 0..=value.len() {
        if i == value.len() || value[i] == b',' {
            let trimmed = http11::trim_ows(&value[start..i]);
            if !trimmed.is_empty() {
                let lead = trimmed.as_ptr() as usize - value.as_ptr() as usize;
                out.push(value.slice(lead..lead + trimmed.len()));
            }
            start = i + 1;
        }
    }
    out.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(p: &[(&str, &str)]) -> Headers {
        Headers::from_pairs(p.iter().copied()).unwrap()
    }

    #[test]
    fn preserves_order_and_raw_casing() {
        let h = pairs(&[("X-Foo", "one"), ("x-bar", "two"), ("X-FOO", "three")]);
        let raw: Vec<_> = h.raw_iter().collect();
        assert_eq!(raw[0], (&b"X-Foo"[..], &b"one"[..]));
        assert_eq!(raw[1], (&b"x-bar"[..], &b"two"[..]));
        assert_eq!(raw[2], (&b"X-FOO"[..], &b"three"[..]));
        assert_eq!(h.get("x-foo"), Some(&b"one"[..]));
    }

    #[test]
    fn equality_ignores_casing() {
        assert_eq!(pairs(&[("Host", "a")]), pairs(&[("HOST", "a")]));
        assert_ne!(pairs(&[("Host", "a")]), pairs(&[("Host", "b")]));
    }

    #[test]
    fn strips_value_whitespace() {
        let h = pairs(&[("X-Pad", "  padded value \t")]);
        assert_eq!(h.get("x-pad"), Some(&b"padded value"[..]));
    }

    #[test]
    fn rejects_bad_names_and_values() {
        assert!(Headers::from_pairs([("sp ace", "v")]).is_err());
        assert!(Headers::from_pairs([("", "v")]).is_err());
        assert!(Headers::from_pairs([("ok", "new\nline")]).is_err());
        assert!(Headers::from_pairs([("ok", "nul\0")]).is_err());
    }

    #[test]
    fn content_length_rules() {
        let h = pairs(&[("Content-Length", "10"), ("content-length", "10")]);
        assert_eq!(h.count("content-length"), 1);
        assert_eq!(h.content_length().unwrap(), Some(10));

        assert!(Headers::from_pairs([("Content-Length", "10"), ("Content-Length", "11")]).is_err());
        assert!(Headers::from_pairs([("Content-Length", "4x")]).is_err());
        assert!(Headers::from_pairs([("Content-Length", "")]).is_err());
    }

    #[test]
    fn transfer_encoding_rules() {
        let h = pairs(&[("Transfer-Encoding", "Chunked")]);
        assert_eq!(h.get("transfer-encoding"), Some(&b"chunked"[..]));

        let err = Headers::from_pairs([("Transfer-Encoding", "gzip, chunked")]).unwrap_err();
        assert_eq!(err.status_hint(), 501);

        let err = Headers::from_pairs([
            ("Transfer-Encoding", "chunked"),
            ("Transfer-Encoding", "chunked"),
        ])
        .unwrap_err();
        assert_eq!(err.status_hint(), 501);

        assert!(Headers::from_pairs([
            ("Content-Length", "3"),
            ("Transfer-Encoding", "chunked"),
        ])
        .is_err());
    }

    #[test]
    fn comma_tokens() {
        let h = pairs(&[("Connection", "keep-alive, Upgrade"), ("Connection", "close")]);
        let tokens = h.get_comma("connection", true);
        assert_eq!(tokens.len(), 3);
        assert!(h.contains_token("connection", b"close"));
        assert!(h.contains_token("connection", b"upgrade"));
        assert!(!h.contains_token("connection", b"frob"));
    }

    #[test]
    fn set_comma_replaces_with_titlecased_name() {
        let mut h = pairs(&[("transfer-encoding", "chunked"), ("x-other", "1")]);
        h.set_comma("Transfer-Encoding", &[]);
        assert_eq!(h.get("transfer-encoding"), None);
        h.set_comma("Connection", &[&b"close"[..]]);
        let raw: Vec<_> = h.raw_iter().collect();
        assert_eq!(raw.last().unwrap(), &(&b"Connection"[..], &b"close"[..]));
    }
}
