/*
 * chunked.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Sigillo, a mail and certificate infrastructure toolkit.
 *
 * Sigillo is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Sigillo is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Sigillo.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Chunked transfer coding (RFC 7230 §4.1): hex-sized chunks with
//! ignored extensions, then trailer headers, delivered before eof. A
//! clean final boundary gives the connection back for reuse.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

use super::h1::parse_header_line;
use super::Pair;

/// Headers that must not appear in a trailer: message framing, routing,
/// authentication, and payload-interpreting fields.
const FORBIDDEN_TRAILERS: &[&str] = &[
    "transfer-encoding",
    "content-length",
    "trailer",
    "host",
    "connection",
    "upgrade",
    "te",
    "cache-control",
    "expect",
    "max-forwards",
    "pragma",
    "range",
    "retry-after",
    "content-encoding",
    "content-type",
    "content-range",
    "authorization",
    "proxy-authenticate",
    "proxy-authorization",
    "www-authenticate",
    "set-cookie",
    "cookie",
    "age",
    "expires",
    "date",
    "location",
    "vary",
    "warning",
];

const MAX_LINE: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    NeedMore,
    Data(Bytes),
    Trailer(Pair),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data,
    DataCrlf,
    Trailer,
    Done,
}

pub struct ChunkedDecoder {
    state: State,
    chunk_remaining: u64,
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Size,
            chunk_remaining: 0,
        }
    }

    /// True after the terminating chunk and trailer have been consumed;
    /// surplus bytes in the caller's buffer belong to the next message.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn read(&mut self, buf: &mut BytesMut) -> Result<ChunkEvent> {
        match self.state {
            State::Size => {
                let line_end = match find_crlf(buf) {
                    Some(n) => n,
                    None => {
                        if buf.len() > MAX_LINE {
                            return Err(Error::response("chunk header line way too long"));
                        }
                        return Ok(ChunkEvent::NeedMore);
                    }
                };
                let line = buf.split_to(line_end + 2);
                let line = &line[..line_end];
                // hex size, then extensions we ignore
                let size_end = line
                    .iter()
                    .position(|&b| b == b';')
                    .unwrap_or(line.len());
                let digits = std::str::from_utf8(&line[..size_end])
                    .map_err(|_| Error::response("invalid chunk size"))?
                    .trim();
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(Error::response(format!(
                        "invalid chunk size: {:?}",
                        String::from_utf8_lossy(line)
                    )));
                }
                let size = u64::from_str_radix(digits, 16)
                    .map_err(|_| Error::response("chunk size out of range"))?;
                if size == 0 {
                    self.state = State::Trailer;
                } else {
                    self.chunk_remaining = size;
                    self.state = State::Data;
                }
                self.read(buf)
            }
            State::Data => {
                if buf.is_empty() {
                    return Ok(ChunkEvent::NeedMore);
                }
                let take = self.chunk_remaining.min(buf.len() as u64) as usize;
                self.chunk_remaining -= take as u64;
                if self.chunk_remaining == 0 {
                    self.state = State::DataCrlf;
                }
                Ok(ChunkEvent::Data(buf.split_to(take).freeze()))
            }
            State::DataCrlf => {
                if buf.len() < 2 {
                    return Ok(ChunkEvent::NeedMore);
                }
                if &buf[..2] != b"\r\n" {
                    return Err(Error::response("malformed chunk missing crlf"));
                }
                buf.advance(2);
                self.state = State::Size;
                self.read(buf)
            }
            State::Trailer => {
                let line_end = match find_crlf(buf) {
                    Some(n) => n,
                    None => {
                        if buf.len() > MAX_LINE {
                            return Err(Error::response("trailer header line way too long"));
                        }
                        return Ok(ChunkEvent::NeedMore);
                    }
                };
                if line_end == 0 {
                    buf.advance(2);
                    self.state = State::Done;
                    return Ok(ChunkEvent::Done);
                }
                let line = buf.split_to(line_end + 2);
                let pair = parse_header_line(&line[..line_end])?;
                if FORBIDDEN_TRAILERS
                    .iter()
                    .any(|f| pair.key.eq_ignore_ascii_case(f))
                {
                    return Err(Error::response(format!(
                        "forbidden trailer header: {}",
                        pair.key
                    )));
                }
                Ok(ChunkEvent::Trailer(pair))
            }
            State::Done => Ok(ChunkEvent::Done),
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Run {
        payload: Vec<u8>,
        trailers: Vec<Pair>,
        done: bool,
        surplus: Vec<u8>,
    }

    /// Feed `input` to a fresh decoder `step` bytes at a time.
    fn run(input: &[u8], step: usize) -> Result<Run> {
        let mut d = ChunkedDecoder::new();
        let mut buf = BytesMut::new();
        let mut payload = Vec::new();
        let mut trailers = Vec::new();
        let mut offset = 0;
        loop {
            match d.read(&mut buf)? {
                ChunkEvent::NeedMore => {
                    if offset >= input.len() {
                        break;
                    }
                    let end = (offset + step).min(input.len());
                    buf.extend_from_slice(&input[offset..end]);
                    offset = end;
                }
                ChunkEvent::Data(b) => payload.extend_from_slice(&b),
                ChunkEvent::Trailer(p) => trailers.push(p),
                ChunkEvent::Done => {
                    // anything not yet fed plus buffered surplus belongs
                    // to the next message
                    let mut surplus = buf.to_vec();
                    surplus.extend_from_slice(&input[offset..]);
                    return Ok(Run {
                        payload,
                        trailers,
                        done: true,
                        surplus,
                    });
                }
            }
        }
        Ok(Run {
            payload,
            trailers,
            done: d.is_done(),
            surplus: Vec::new(),
        })
    }

    const BODY: &[u8] = b"4\r\nWiki\r\n5\r\npedia\r\nE; ext=ignored\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";

    #[test]
    fn decodes_at_all_granularities() {
        for step in 1..=BODY.len() + 1 {
            let r = run(BODY, step).unwrap();
            assert!(r.done, "step {}", step);
            assert_eq!(&r.payload[..], b"Wikipedia in\r\n\r\nchunks.", "step {}", step);
            assert!(r.trailers.is_empty());
            assert!(r.surplus.is_empty());
        }
    }

    #[test]
    fn trailers_delivered_before_eof() {
        let input = b"3\r\nabc\r\n0\r\nExpires-Checksum: 1234\r\nX-Other: ok\r\n\r\n";
        for step in 1..=input.len() {
            let r = run(input, step).unwrap();
            assert!(r.done);
            assert_eq!(&r.payload[..], b"abc");
            assert_eq!(r.trailers.len(), 2);
            assert_eq!(r.trailers[0].key, "Expires-Checksum");
            assert_eq!(r.trailers[1].value, "ok");
        }
    }

    #[test]
    fn detaches_with_surplus_iff_clean_boundary() {
        let mut input = BODY.to_vec();
        input.extend_from_slice(b"HTTP/1.1 200 OK\r\n");
        let r = run(&input, 7).unwrap();
        assert!(r.done);
        assert_eq!(&r.surplus[..], b"HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn truncated_input_never_completes() {
        for cut in 1..BODY.len() {
            let r = run(&BODY[..cut], 3).unwrap();
            assert!(!r.done, "cut {}", cut);
        }
    }

    #[test]
    fn missing_data_crlf_rejected() {
        let e = run(b"3\r\nabcX\r\n0\r\n\r\n", 100).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }

    #[test]
    fn bad_chunk_size_rejected() {
        assert!(run(b"zz\r\n\r\n", 100).is_err());
        assert!(run(b"\r\n", 100).is_err());
    }

    #[test]
    fn forbidden_trailer_rejected() {
        let e = run(b"0\r\nContent-Length: 4\r\n\r\n", 100).unwrap_err();
        assert!(e.to_string().contains("forbidden trailer"));
    }
}
