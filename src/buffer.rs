use bytes::{Buf, Bytes, BytesMut};

use crate::error::Error;

/// Bounds on how far the receive buffer searches before giving up.
///
/// Crossing a bound is a protocol error (hint 431); an attacker trickling an
/// endless header line would otherwise pin the buffer forever.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Longest accepted single line (start lines, chunk size lines).
    pub max_line_len: usize,
    /// Longest accepted header block, start line included.
    pub max_headers_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_line_len: 16 * 1024,
            max_headers_len: 32 * 1024,
        }
    }
}

/// What the last unfinished search was looking for. Searching for something
/// else restarts from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Line,
    BlankLine,
}

/// Buffer for received bytes with a cheap discard-prefix operation.
///
/// Search operations remember how far they already looked, so feeding data
/// one byte at a time stays O(1) amortized per byte instead of re-scanning
/// the whole buffer on every call.
#[derive(Debug)]
pub(crate) struct ReceiveBuffer {
    data: BytesMut,
    scanned: usize,
    scan_kind: Scan,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        ReceiveBuffer {
            data: BytesMut::new(),
            scanned: 0,
            scan_kind: Scan::Line,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Non-destructive copy of everything buffered, for `trailing_data()`.
    pub fn peek_all(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    /// Hand out up to `count` bytes from the front, or `None` when empty.
    pub fn take_at_most(&mut self, count: usize) -> Option<Bytes> {
        if self.data.is_empty() || count == 0 {
            return None;
        }
        let n = count.min(self.data.len());
        let out = self.data.split_to(n).freeze();
        self.scanned = 0;
        Some(out)
    }

    pub fn take_all(&mut self) -> Option<Bytes> {
        self.take_at_most(usize::MAX)
    }

    fn skip(&mut self, count: usize) {
        self.data.advance(count);
        self.scanned = 0;
    }

    /// Extract the next line, with the terminator (CRLF, or a bare LF)
    /// stripped. `Ok(None)` means no full line is buffered yet.
    pub fn extract_line(&mut self, max_len: usize) -> Result<Option<Bytes>, Error> {
        if self.scan_kind != Scan::Line {
            self.scan_kind = Scan::Line;
            self.scanned = 0;
        }
        match self.data[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(rel) => {
                let nl = self.scanned + rel;
                let line = self.data.split_to(nl + 1).freeze();
                self.scanned = 0;
                let mut end = line.len() - 1;
                if end > 0 && line[end - 1] == b'\r' {
                    end -= 1;
                }
                Ok(Some(line.slice(..end)))
            }
            None => {
                self.scanned = self.data.len();
                if self.data.len() > max_len {
                    return Err(Error::remote_with_status(
                        format!("line longer than the {} byte limit", max_len),
                        431,
                    ));
                }
                Ok(None)
            }
        }
    }

    /// Extract a whole head block (start line plus headers, or a trailer
    /// section): every line up to and including the blank line that ends it.
    /// Lines are returned with terminators stripped; the blank line itself is
    /// not included. `Ok(None)` means the block is still incomplete.
    pub fn extract_lines(&mut self, max_len: usize) -> Result<Option<Vec<Bytes>>, Error> {
        // A blank line straight away is an empty block (e.g. trailers after
        // the final chunk).
        if self.first() == Some(b'\n') {
            self.skip(1);
            return Ok(Some(Vec::new()));
        }
        if self.data.len() >= 2 && &self.data[..2] == b"\r\n" {
            self.skip(2);
            return Ok(Some(Vec::new()));
        }
        if self.data.len() == 1 && self.data[0] == b'\r' {
            return Ok(None);
        }

        let end = match self.find_blank_line(max_len)? {
            Some(end) => end,
            None => return Ok(None),
        };
        let block = self.data.split_to(end).freeze();
        self.scanned = 0;

        let mut lines = Vec::new();
        let mut pos = 0;
        while pos < block.len() {
            // Every line in the block is LF-terminated by construction.
            let nl = match block[pos..].iter().position(|&b| b == b'\n') {
                Some(i) => pos + i,
                None => block.len(),
            };
            let mut line_end = nl;
            if line_end > pos && block[line_end - 1] == b'\r' {
                line_end -= 1;
            }
            lines.push(block.slice(pos..line_end));
            pos = nl + 1;
        }
        // The terminating blank line always leaves one empty entry.
        debug_assert_eq!(lines.last().map(|l| l.len()), Some(0));
        lines.pop();
        Ok(Some(lines))
    }

    /// Find the offset just past the blank line ending a head block: an LF
    /// followed by LF or CRLF. Resumes a little before the last scan position
    /// so a terminator split across two feeds is still found.
    fn find_blank_line(&mut self, max_len: usize) -> Result<Option<usize>, Error> {
        if self.scan_kind != Scan::BlankLine {
            self.scan_kind = Scan::BlankLine;
            self.scanned = 0;
        }
        let data = &self.data[..];
        let mut i = self.scanned.saturating_sub(2);
        while i < data.len() {
            if data[i] == b'\n' {
                if data.get(i + 1) == Some(&b'\n') {
                    return Ok(Some(i + 2));
                }
                if data.get(i + 1) == Some(&b'\r') && data.get(i + 2) == Some(&b'\n') {
                    return Ok(Some(i + 3));
                }
            }
            i += 1;
        }
        self.scanned = data.len();
        if data.len() > max_len {
            return Err(Error::remote_with_status(
                format!("header block longer than the {} byte limit", max_len),
                431,
            ));
        }
        Ok(None)
    }
}

impl std::ops::Deref for ReceiveBuffer {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data[..]
    }
}
