/*
 * h1.rs
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

//! HTTP/1.1 response push parser: status line then headers, one event
//! per call over a refillable buffer. Body framing is handled by the
//! limit/chunked decoders, not here.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};

use super::Pair;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: u16,
    pub reason: String,
}

/// One parse step. NeedMore means the caller should read more bytes into
/// the buffer and call again; consumed input has already been released.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadEvent {
    NeedMore,
    Status(StatusLine),
    Header(Pair),
    EndOfHeaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StatusLine,
    Headers,
    Done,
}

pub struct ResponseParser {
    state: State,
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Roughly 80 characters of context around the fault, printable-escaped.
fn context(buf: &[u8]) -> String {
    let end = buf.len().min(80);
    String::from_utf8_lossy(&buf[..end])
        .chars()
        .flat_map(|c| c.escape_debug())
        .collect()
}

fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-'
        | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: State::StatusLine,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::StatusLine;
    }

    pub fn read(&mut self, buf: &mut BytesMut) -> Result<ReadEvent> {
        match self.state {
            State::StatusLine => {
                let line_end = match find_crlf(buf) {
                    Some(n) => n,
                    None => return Ok(ReadEvent::NeedMore),
                };
                let line = buf.split_to(line_end + 2);
                let line = &line[..line_end];
                let status = parse_status_line(line)?;
                self.state = State::Headers;
                Ok(ReadEvent::Status(status))
            }
            State::Headers => {
                let line_end = match find_crlf(buf) {
                    Some(n) => n,
                    None => return Ok(ReadEvent::NeedMore),
                };
                if line_end == 0 {
                    buf.advance(2);
                    self.state = State::Done;
                    return Ok(ReadEvent::EndOfHeaders);
                }
                let line = buf.split_to(line_end + 2);
                let pair = parse_header_line(&line[..line_end])?;
                Ok(ReadEvent::Header(pair))
            }
            State::Done => Ok(ReadEvent::EndOfHeaders),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_status_line(line: &[u8]) -> Result<StatusLine> {
    let text = std::str::from_utf8(line)
        .map_err(|_| Error::response(format!("invalid status line: {}", context(line))))?;
    let mut parts = text.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(Error::response(format!(
            "invalid http version: {}",
            context(line)
        )));
    }
    let code = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|c| (100..=599).contains(c))
        .ok_or_else(|| Error::response(format!("invalid status code: {}", context(line))))?;
    let reason = parts.next().unwrap_or("").to_string();
    Ok(StatusLine { code, reason })
}

pub(crate) fn parse_header_line(line: &[u8]) -> Result<Pair> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| Error::response(format!("invalid header line: {}", context(line))))?;
    let name = &line[..colon];
    if name.is_empty() || !name.iter().all(|&b| is_tchar(b)) {
        return Err(Error::response(format!(
            "invalid header field name: {}",
            context(line)
        )));
    }
    let value = &line[colon + 1..];
    let value = std::str::from_utf8(value)
        .map_err(|_| Error::response(format!("invalid header value: {}", context(line))))?
        .trim_matches([' ', '\t'])
        .to_string();
    Ok(Pair {
        key: String::from_utf8_lossy(name).into_owned(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
Replay-Nonce: abc123\r\n\
Link: <https://a/1>; rel=\"next\"\r\n\
\r\nbodybytes";

    fn drain(parser: &mut ResponseParser, buf: &mut BytesMut) -> Vec<ReadEvent> {
        let mut out = Vec::new();
        loop {
            match parser.read(buf).unwrap() {
                ReadEvent::NeedMore => break,
                ev @ ReadEvent::EndOfHeaders => {
                    out.push(ev);
                    break;
                }
                ev => out.push(ev),
            }
        }
        out
    }

    #[test]
    fn full_parse() {
        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(GOLDEN);
        let events = drain(&mut parser, &mut buf);
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            ReadEvent::Status(StatusLine {
                code: 200,
                reason: "OK".into()
            })
        );
        assert_eq!(events[4], ReadEvent::EndOfHeaders);
        // body bytes stay in the buffer
        assert_eq!(&buf[..], b"bodybytes");
    }

    #[test]
    fn prefix_totality() {
        // reference run on the full input
        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(GOLDEN);
        let expected = drain(&mut parser, &mut buf);

        for i in 0..GOLDEN.len() {
            let mut parser = ResponseParser::new();
            let mut buf = BytesMut::from(&GOLDEN[..i]);
            let mut events = drain(&mut parser, &mut buf);
            if events.last() != Some(&ReadEvent::EndOfHeaders) {
                // refill with the remainder and finish
                buf.extend_from_slice(&GOLDEN[i..]);
                events.extend(drain(&mut parser, &mut buf));
            }
            assert_eq!(events, expected, "split at {}", i);
        }
    }

    #[test]
    fn ows_is_trimmed() {
        let pair = parse_header_line(b"Key:  \t value with spaces \t").unwrap();
        assert_eq!(pair.key, "Key");
        assert_eq!(pair.value, "value with spaces");
    }

    #[test]
    fn syntax_errors_carry_context() {
        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(&b"ICMP/9 hello\r\n"[..]);
        let e = parser.read(&mut buf).unwrap_err();
        assert!(e.to_string().contains("ICMP/9"));

        let e = parse_header_line(b"no colon here").unwrap_err();
        assert!(e.to_string().contains("no colon here"));

        let e = parse_header_line(b"bad name: x").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }
}
