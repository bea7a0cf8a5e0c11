//! Chunked transfer coding.

use crate::buffer::{Limits, ReceiveBuffer};
use crate::error::Error;
use crate::event::{Data, EndOfMessage, Event, Payload, Segments};
use crate::headers::Headers;
use crate::http11;

/// Where the decoder is inside the chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Expecting a chunk size line.
    Size,
    /// Inside a chunk's data. `first` is true until something is emitted.
    Data { remaining: u64, first: bool },
    /// Expecting the CRLF that trails chunk data.
    DataEnd,
    /// Saw the final zero-size chunk; expecting the trailer section.
    Trailers,
}

/// Incremental decoder for a chunked message body.
///
/// Emits `Data` for chunk contents as they arrive; a chunk split over
/// several reads produces several `Data` events, with `chunk_start` on the
/// first and `chunk_end` on the last. Chunk extensions are parsed and
/// discarded. The zero chunk switches to trailer parsing, which produces the
/// final `EndOfMessage`.
#[derive(Debug)]
pub(crate) struct ChunkedDecoder {
    state: ChunkState,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: ChunkState::Size,
        }
    }

    pub fn read(
        &mut self,
        buf: &mut ReceiveBuffer,
        limits: &Limits,
    ) -> Result<Option<Event>, Error> {
        loop {
            match self.state {
                ChunkState::Size => {
                    let line = match buf.extract_line(limits.max_line_len)? {
                        Some(line) => line,
                        None => return Ok(None),
                    };
                    let size = http11::parse_chunk_size(&line)?;
                    trace!("chunk size {}", size);
                    if size == 0 {
                        self.state = ChunkState::Trailers;
                    } else {
                        self.state = ChunkState::Data {
                            remaining: size,
                            first: true,
                        };
                    }
                }
                ChunkState::Data { remaining, first } => {
                    let window = remaining.min(usize::MAX as u64) as usize;
                    let data = match buf.take_at_most(window) {
                        Some(data) => data,
                        None => return Ok(None),
                    };
                    let taken = data.len() as u64;
                    let done = taken == remaining;
                    self.state = if done {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data {
                            remaining: remaining - taken,
                            first: false,
                        }
                    };
                    return Ok(Some(Event::Data(Data {
                        data: Payload::Bytes(data),
                        chunk_start: first,
                        chunk_end: done,
                    })));
                }
                ChunkState::DataEnd => match buf.first() {
                    None => return Ok(None),
                    Some(b'\n') => {
                        buf.take_at_most(1);
                        self.state = ChunkState::Size;
                    }
                    Some(b'\r') => {
                        if buf.len() < 2 {
                            return Ok(None);
                        }
                        if buf[1] != b'\n' {
                            return Err(Error::remote("missing CRLF after chunk data"));
                        }
                        buf.take_at_most(2);
                        self.state = ChunkState::Size;
                    }
                    Some(_) => {
                        return Err(Error::remote("missing CRLF after chunk data"));
                    }
                },
                ChunkState::Trailers => {
                    let lines = match buf.extract_lines(limits.max_headers_len)? {
                        Some(lines) => lines,
                        None => return Ok(None),
                    };
                    let headers = http11::parse_header_block(&lines)?;
                    return Ok(Some(Event::EndOfMessage(EndOfMessage { headers })));
                }
            }
        }
    }

    pub fn read_eof(&self) -> Result<Event, Error> {
        Err(Error::remote(
            "peer closed connection without sending complete message body \
             (incomplete chunked read)",
        ))
    }
}

/// Encoder for a chunked message body. Each `Data` payload becomes exactly
/// one chunk; empty payloads produce nothing, since a zero-size chunk would
/// terminate the body.
pub(crate) struct ChunkedEncoder;

impl ChunkedEncoder {
    pub fn write_chunk(data: Payload, out: &mut Segments) {
        if data.is_empty() {
            return;
        }
        http11::push_hex(out.bytes_mut(), data.len());
        out.push_slice(b"\r\n");
        out.push_payload(data);
        out.push_slice(b"\r\n");
    }

    pub fn write_finish(trailers: &Headers, out: &mut Segments) {
        out.push_slice(b"0\r\n");
        http11::write_headers(trailers, out.bytes_mut());
        out.push_slice(b"\r\n");
    }
}
