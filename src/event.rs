//! The event vocabulary.
//!
//! Everything that crosses the engine boundary is one of these types: start
//! lines in, body slices out, and so on. Events validate themselves on
//! construction so a bad event never touches connection state.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Error;
use crate::headers::{Headers, Lossy};
use crate::http11;

/// An embedder-supplied body payload the engine never looks inside.
///
/// Only the length takes part in framing; the handle itself travels through
/// [`Connection::send_with_data_passthrough`] untouched, so it can name a
/// file region for `sendfile` or any other zero-copy primitive.
///
/// [`Connection::send_with_data_passthrough`]: crate::Connection::send_with_data_passthrough
pub trait PayloadHandle: fmt::Debug + Send + Sync {
    fn len(&self) -> u64;
}

/// The body of a [`Data`] event: plain bytes, or an opaque handle.
#[derive(Clone, Debug)]
pub enum Payload {
    Bytes(Bytes),
    Handle(Arc<dyn PayloadHandle>),
}

impl Payload {
    pub fn len(&self) -> u64 {
        match self {
            Payload::Bytes(b) => b.len() as u64,
            Payload::Handle(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Bytes(b) => Some(b),
            Payload::Handle(_) => None,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Bytes(a), Payload::Bytes(b)) => a == b,
            (Payload::Handle(a), Payload::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Payload {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Payload {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Payload {
        Payload::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Payload {
        Payload::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Arc<dyn PayloadHandle>> for Payload {
    fn from(h: Arc<dyn PayloadHandle>) -> Payload {
        Payload::Handle(h)
    }
}

/// Ordered output of a send: framing bytes interleaved with payloads.
///
/// Plain byte runs are merged as they are appended, so a fully-bytes send
/// comes out as a single segment.
#[derive(Debug, Default)]
pub struct Segments {
    parts: Vec<Payload>,
    tail: Vec<u8>,
}

impl Segments {
    pub(crate) fn new() -> Segments {
        Segments::default()
    }

    pub(crate) fn push_slice(&mut self, bytes: &[u8]) {
        self.tail.extend_from_slice(bytes);
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.tail
    }

    pub(crate) fn push_payload(&mut self, payload: Payload) {
        match payload {
            // Small byte payloads just join the current run.
            Payload::Bytes(b) if self.tail.is_empty() => self.parts.push(Payload::Bytes(b)),
            Payload::Bytes(b) => self.tail.extend_from_slice(&b),
            handle => {
                self.flush();
                self.parts.push(handle);
            }
        }
    }

    fn flush(&mut self) {
        if !self.tail.is_empty() {
            let run = std::mem::take(&mut self.tail);
            self.parts.push(Payload::Bytes(Bytes::from(run)));
        }
    }

    /// The segments in send order.
    pub fn into_parts(mut self) -> Vec<Payload> {
        self.flush();
        self.parts
    }

    /// Concatenate everything into one byte string. Fails if any segment is
    /// an opaque handle, since the engine cannot read those.
    pub fn into_bytes(self) -> Result<Bytes, Error> {
        let parts = self.into_parts();
        if parts.len() == 1 {
            if let Payload::Bytes(b) = &parts[0] {
                return Ok(b.clone());
            }
        }
        let mut out = Vec::new();
        for part in &parts {
            match part {
                Payload::Bytes(b) => out.extend_from_slice(b),
                Payload::Handle(_) => {
                    return Err(Error::user(
                        "opaque body payloads require send_with_data_passthrough",
                    ));
                }
            }
        }
        Ok(Bytes::from(out))
    }
}

/// The beginning of an HTTP request.
#[derive(Clone, PartialEq)]
pub struct Request {
    /// Method token, e.g. `GET`.
    pub method: Bytes,
    /// Request target exactly as on the wire, e.g. `/index.html`.
    pub target: Bytes,
    pub headers: Headers,
    /// Two ASCII digits separated by a dot, e.g. `1.1`.
    pub http_version: Bytes,
}

impl Request {
    /// Build a request event. The HTTP version is always 1.1; an HTTP/1.1
    /// request must carry exactly one `Host` header.
    pub fn new<M, T, I, N, V>(method: M, target: T, headers: I) -> Result<Request, Error>
    where
        M: AsRef<[u8]>,
        T: AsRef<[u8]>,
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Request::from_wire(
            Bytes::copy_from_slice(method.as_ref()),
            Bytes::copy_from_slice(target.as_ref()),
            Headers::from_pairs(headers)?,
            Bytes::from_static(b"1.1"),
        )
    }

    pub(crate) fn from_wire(
        method: Bytes,
        target: Bytes,
        headers: Headers,
        http_version: Bytes,
    ) -> Result<Request, Error> {
        if method.is_empty() || !http11::is_token(&method) {
            return Err(Error::user(format!("illegal method {:?}", Lossy(&method))));
        }
        if target.is_empty() || !http11::is_request_target(&target) {
            return Err(Error::user(format!(
                "illegal target characters in {:?}",
                Lossy(&target)
            )));
        }
        // "A server MUST respond with a 400 (Bad Request) status code to any
        // HTTP/1.1 request message that lacks a Host header field and to any
        // request message that contains more than one Host header field"
        // https://tools.ietf.org/html/rfc7230#section-5.4
        let host_count = headers.count("host");
        if http_version.as_ref() == b"1.1" && host_count == 0 {
            return Err(Error::user("Missing mandatory Host: header"));
        }
        if host_count > 1 {
            return Err(Error::user("Found multiple Host: headers"));
        }
        Ok(Request {
            method,
            target,
            headers,
            http_version,
        })
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &Lossy(&self.method))
            .field("target", &Lossy(&self.target))
            .field("headers", &self.headers)
            .field("http_version", &Lossy(&self.http_version))
            .finish()
    }
}

/// The beginning of an HTTP response, informational or final. Which one it
/// is shows in the [`Event`] variant wrapping it.
#[derive(Clone, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub headers: Headers,
    /// Two ASCII digits separated by a dot, e.g. `1.1`.
    pub http_version: Bytes,
    /// Reason phrase, kept verbatim. May be empty.
    pub reason: Bytes,
}

impl Response {
    pub fn new<I, N, V>(status_code: u16, headers: I, reason: &str) -> Result<Response, Error>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let reason = Bytes::copy_from_slice(reason.as_bytes());
        if !http11::is_reason_phrase(&reason) {
            return Err(Error::user("illegal reason phrase"));
        }
        if !(100..=999).contains(&status_code) {
            return Err(Error::user(format!(
                "status code {} out of range [100, 999]",
                status_code
            )));
        }
        Ok(Response {
            status_code,
            headers: Headers::from_pairs(headers)?,
            http_version: Bytes::from_static(b"1.1"),
            reason,
        })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("http_version", &Lossy(&self.http_version))
            .field("reason", &Lossy(&self.reason))
            .finish()
    }
}

/// A slice of a message body.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    pub data: Payload,
    /// Under chunked framing: this is the first slice of a wire chunk.
    pub chunk_start: bool,
    /// Under chunked framing: this is the last slice of a wire chunk.
    pub chunk_end: bool,
}

impl Data {
    pub fn new(data: impl Into<Payload>) -> Data {
        Data {
            data: data.into(),
            chunk_start: false,
            chunk_end: false,
        }
    }
}

/// The end of a message body. Carries trailer headers only under chunked
/// framing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndOfMessage {
    pub headers: Headers,
}

impl EndOfMessage {
    pub fn with_trailers<I, N, V>(headers: I) -> Result<EndOfMessage, Error>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Ok(EndOfMessage {
            headers: Headers::from_pairs(headers)?,
        })
    }
}

/// One protocol event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Request(Request),
    /// A response with a 1xx status code.
    InformationalResponse(Response),
    /// A response with a final (>= 200) status code.
    Response(Response),
    Data(Data),
    EndOfMessage(EndOfMessage),
    /// The half-duplex close signal: whoever it is attributed to will send
    /// no more bytes.
    ConnectionClosed,
}

impl Event {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            Event::Request(_) => EventKind::Request,
            Event::InformationalResponse(_) => EventKind::InformationalResponse,
            Event::Response(_) => EventKind::Response,
            Event::Data(_) => EventKind::Data,
            Event::EndOfMessage(_) => EventKind::EndOfMessage,
            Event::ConnectionClosed => EventKind::ConnectionClosed,
        }
    }
}

impl From<Request> for Event {
    fn from(v: Request) -> Event {
        Event::Request(v)
    }
}

impl From<Data> for Event {
    fn from(v: Data) -> Event {
        Event::Data(v)
    }
}

impl From<EndOfMessage> for Event {
    fn from(v: EndOfMessage) -> Event {
        Event::EndOfMessage(v)
    }
}

/// An [`Event`] without its payload, used in state transitions and error
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Request,
    InformationalResponse,
    Response,
    Data,
    EndOfMessage,
    ConnectionClosed,
}

/// Outcome of [`Connection::next_event`].
///
/// "Need data" and "paused" are control signals, not errors, so they share
/// the channel with real events rather than the error path.
///
/// [`Connection::next_event`]: crate::Connection::next_event
#[derive(Clone, Debug, PartialEq)]
pub enum NextEvent {
    Event(Event),
    /// Not enough buffered bytes to produce the next event.
    NeedData,
    /// Received bytes are not being interpreted right now: either buffered
    /// data belongs to the next cycle, a protocol switch is pending, or the
    /// connection has been handed over.
    Paused,
}
