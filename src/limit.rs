//! Message body framing.
//!
//! Once a start line and its headers are in, each direction picks exactly
//! one way to delimit the body and sticks to it for the rest of the
//! message: a byte count, chunk markers, the connection close, or nothing.

use std::fmt;

use crate::buffer::{Limits, ReceiveBuffer};
use crate::chunked::{ChunkedDecoder, ChunkedEncoder};
use crate::error::Error;
use crate::event::{Data, EndOfMessage, Event, Payload, Segments};
use crate::headers::Headers;

/// How a message body is delimited, computed once per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyMode {
    NoBody,
    ContentLength(u64),
    Chunked,
    ReadUntilClose,
}

/// Framing for a request body.
///
/// 1. `Transfer-Encoding: chunked` means chunked (headers validation already
///    guarantees Content-Length is absent then).
/// 2. `Content-Length: n` means exactly n bytes.
/// 3. Otherwise there is no body; closing the connection cannot delimit a
///    request body, since that leaves no way to send a response.
pub(crate) fn request_body_mode(headers: &Headers) -> Result<BodyMode, Error> {
    let mode = if headers.get("transfer-encoding").is_some() {
        BodyMode::Chunked
    } else if let Some(n) = headers.content_length()? {
        BodyMode::ContentLength(n)
    } else {
        BodyMode::NoBody
    };
    trace!("request body mode: {:?}", mode);
    Ok(mode)
}

/// Framing for a final (>= 200) response body.
///
/// Some responses never have a body no matter what their headers say: any
/// response to HEAD, 204, 304, and a successful response to CONNECT (where
/// the bytes that follow belong to the tunneled protocol). After those,
/// https://tools.ietf.org/html/rfc7230#section-3.3.3 applies: chunked, then
/// Content-Length, then read-until-close.
pub(crate) fn response_body_mode(
    request_method: Option<&[u8]>,
    status_code: u16,
    headers: &Headers,
) -> Result<BodyMode, Error> {
    let mode = if status_code == 204
        || status_code == 304
        || request_method == Some(&b"HEAD"[..])
        || (request_method == Some(&b"CONNECT"[..]) && (200..300).contains(&status_code))
    {
        BodyMode::NoBody
    } else if headers.get("transfer-encoding").is_some() {
        BodyMode::Chunked
    } else if let Some(n) = headers.content_length()? {
        BodyMode::ContentLength(n)
    } else {
        BodyMode::ReadUntilClose
    };
    trace!(
        "response body mode for status {}: {:?}",
        status_code,
        mode
    );
    Ok(mode)
}

/// Limit reading body data per the framing of the incoming message.
pub(crate) enum LimitRead {
    /// Read from a chunked decoder. The decoder knows when there is no more
    /// data to be read.
    ChunkedDecoder(ChunkedDecoder),
    /// Body data is limited by a `content-length` header.
    ContentLength(ContentLengthRead),
    /// Read until the peer closes (unframed HTTP/1.0-style response).
    ReadToEnd(ReadToEnd),
    /// No expected body.
    NoBody,
}

impl LimitRead {
    pub fn from_mode(mode: BodyMode) -> LimitRead {
        match mode {
            BodyMode::Chunked => LimitRead::ChunkedDecoder(ChunkedDecoder::new()),
            BodyMode::ContentLength(n) => LimitRead::ContentLength(ContentLengthRead::new(n)),
            BodyMode::ReadUntilClose => LimitRead::ReadToEnd(ReadToEnd::new()),
            BodyMode::NoBody => LimitRead::NoBody,
        }
    }

    /// Produce the next body event from buffered bytes, or `None` when more
    /// input is needed.
    pub fn read(
        &mut self,
        buf: &mut ReceiveBuffer,
        limits: &Limits,
    ) -> Result<Option<Event>, Error> {
        match self {
            LimitRead::ChunkedDecoder(v) => v.read(buf, limits),
            LimitRead::ContentLength(v) => v.read(buf),
            LimitRead::ReadToEnd(v) => Ok(v.read(buf)),
            LimitRead::NoBody => Ok(Some(Event::EndOfMessage(EndOfMessage::default()))),
        }
    }

    /// The peer signalled EOF while this body was being read.
    pub fn read_eof(&self) -> Result<Event, Error> {
        match self {
            LimitRead::ChunkedDecoder(v) => v.read_eof(),
            LimitRead::ContentLength(v) => v.read_eof(),
            LimitRead::ReadToEnd(_) | LimitRead::NoBody => {
                Ok(Event::EndOfMessage(EndOfMessage::default()))
            }
        }
    }
}

/// Reader limited by a set length.
pub(crate) struct ContentLengthRead {
    limit: u64,
    remaining: u64,
}

impl ContentLengthRead {
    fn new(limit: u64) -> Self {
        ContentLengthRead {
            limit,
            remaining: limit,
        }
    }

    fn read(&mut self, buf: &mut ReceiveBuffer) -> Result<Option<Event>, Error> {
        if self.remaining == 0 {
            return Ok(Some(Event::EndOfMessage(EndOfMessage::default())));
        }
        let window = self.remaining.min(usize::MAX as u64) as usize;
        let data = match buf.take_at_most(window) {
            Some(data) => data,
            None => return Ok(None),
        };
        self.remaining -= data.len() as u64;
        Ok(Some(Event::Data(Data::new(data))))
    }

    fn read_eof(&self) -> Result<Event, Error> {
        // https://tools.ietf.org/html/rfc7230#page-32
        // If the sender closes the connection before the indicated number of
        // octets are received, the recipient MUST consider the message
        // incomplete and close the connection.
        Err(Error::remote(format!(
            "peer closed connection without sending complete message body \
             (received {} bytes, expected {})",
            self.limit - self.remaining,
            self.limit
        )))
    }
}

/// Reader that passes everything through until the peer closes.
pub(crate) struct ReadToEnd;

impl ReadToEnd {
    fn new() -> Self {
        ReadToEnd
    }

    fn read(&mut self, buf: &mut ReceiveBuffer) -> Option<Event> {
        buf.take_all().map(|data| Event::Data(Data::new(data)))
    }
}

/// Limit writing body data by a strategy configured at the time the start
/// line was sent. This ensures we never write more (or less) data than the
/// headers promised.
pub(crate) enum LimitWrite {
    /// Write each payload as one chunk through the chunked encoder.
    Chunked,
    /// Limit the write by the `content-length` header.
    ContentLength(ContentLengthWrite),
    /// Unframed response body; the connection close delimits it.
    CloseDelimited,
    /// There should be no body.
    NoBody,
}

impl LimitWrite {
    pub fn from_mode(mode: BodyMode) -> LimitWrite {
        match mode {
            BodyMode::Chunked => LimitWrite::Chunked,
            BodyMode::ContentLength(n) => LimitWrite::ContentLength(ContentLengthWrite::new(n)),
            BodyMode::ReadUntilClose => LimitWrite::CloseDelimited,
            BodyMode::NoBody => LimitWrite::NoBody,
        }
    }

    /// Write one `Data` payload using this limiter.
    pub fn write_data(&mut self, data: Payload, out: &mut Segments) -> Result<(), Error> {
        match self {
            LimitWrite::Chunked => {
                ChunkedEncoder::write_chunk(data, out);
                Ok(())
            }
            LimitWrite::ContentLength(v) => v.write(data, out),
            LimitWrite::CloseDelimited => {
                out.push_payload(data);
                Ok(())
            }
            LimitWrite::NoBody => {
                if data.is_empty() {
                    Ok(())
                } else {
                    Err(Error::user("Body data is not expected"))
                }
            }
        }
    }

    /// Finish up writing, called once when `EndOfMessage` is sent.
    pub fn finish(&mut self, trailers: &Headers, out: &mut Segments) -> Result<(), Error> {
        if !trailers.is_empty() && !matches!(self, LimitWrite::Chunked) {
            return Err(Error::user("trailers require chunked framing"));
        }
        match self {
            LimitWrite::Chunked => {
                ChunkedEncoder::write_finish(trailers, out);
                Ok(())
            }
            LimitWrite::ContentLength(v) => v.finish(),
            LimitWrite::CloseDelimited | LimitWrite::NoBody => Ok(()),
        }
    }
}

/// Limit write by length.
pub(crate) struct ContentLengthWrite {
    limit: u64,
    total: u64,
}

impl ContentLengthWrite {
    fn new(limit: u64) -> Self {
        ContentLengthWrite { limit, total: 0 }
    }

    fn write(&mut self, data: Payload, out: &mut Segments) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        self.total += data.len();
        if self.total > self.limit {
            return Err(Error::user(format!(
                "Body data longer than content-length header: {} > {}",
                self.total, self.limit
            )));
        }
        out.push_payload(data);
        Ok(())
    }

    fn finish(&self) -> Result<(), Error> {
        if self.total != self.limit {
            return Err(Error::user(format!(
                "Too little data for declared Content-Length: {} < {}",
                self.total, self.limit
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for LimitRead {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LimitRead::ChunkedDecoder(_) => write!(f, "ChunkedDecoder"),
            LimitRead::ContentLength(l) => write!(f, "ContentLength({})", l.limit),
            LimitRead::ReadToEnd(_) => write!(f, "ReadToEnd"),
            LimitRead::NoBody => write!(f, "NoBody"),
        }
    }
}

impl fmt::Debug for LimitWrite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LimitWrite::Chunked => write!(f, "Chunked"),
            LimitWrite::ContentLength(l) => write!(f, "ContentLength({})", l.limit),
            LimitWrite::CloseDelimited => write!(f, "CloseDelimited"),
            LimitWrite::NoBody => write!(f, "NoBody"),
        }
    }
}
