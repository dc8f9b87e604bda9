/*
 * link.rs
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

//! RFC 8288 Link header parsing. ACME uses rel="next" links for order
//! list pagination and rel="up" elsewhere; we parse the general grammar.

use crate::error::{Error, Result};

/// Quoted parameter values unescape into a bounded buffer; a value
/// longer than this fails with a fixed-size error.
const MAX_PARAM_VALUE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParam {
    pub key: String,
    /// Empty for a bare parameter (`; crossorigin`).
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub params: Vec<LinkParam>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ows(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn context(&self) -> String {
        let start = self.pos.saturating_sub(40);
        let end = (self.pos + 40).min(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }
}

fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-'
        | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}

fn parse_token(c: &mut Cursor) -> Result<String> {
    let start = c.pos;
    while c.peek().map(is_tchar).unwrap_or(false) {
        c.pos += 1;
    }
    if c.pos == start {
        return Err(Error::response(format!(
            "invalid link: expected token near \"{}\"",
            c.context()
        )));
    }
    Ok(String::from_utf8_lossy(&c.bytes[start..c.pos]).into_owned())
}

fn parse_quoted(c: &mut Cursor) -> Result<String> {
    // opening DQUOTE already consumed
    let mut out = String::new();
    loop {
        let b = c.bump().ok_or_else(|| {
            Error::response(format!(
                "invalid link: unterminated quoted-string near \"{}\"",
                c.context()
            ))
        })?;
        match b {
            b'"' => return Ok(out),
            b'\\' => {
                let esc = c.bump().ok_or_else(|| {
                    Error::response("invalid link: dangling backslash")
                })?;
                push_bounded(&mut out, esc as char)?;
            }
            _ => push_bounded(&mut out, b as char)?,
        }
    }
}

fn push_bounded(out: &mut String, c: char) -> Result<()> {
    if out.len() >= MAX_PARAM_VALUE {
        return Err(Error::fixed_size("link parameter value too long"));
    }
    out.push(c);
    Ok(())
}

/// Parse a full Link header value into its links, each with its params.
pub fn parse_link_header(text: &str) -> Result<Vec<Link>> {
    let mut c = Cursor {
        bytes: text.as_bytes(),
        pos: 0,
    };
    let mut links = Vec::new();

    loop {
        c.skip_ows();
        // tolerate empty list members per RFC 7230 #rule
        while c.peek() == Some(b',') {
            c.pos += 1;
            c.skip_ows();
        }
        if c.peek().is_none() {
            break;
        }

        if c.bump() != Some(b'<') {
            return Err(Error::response(format!(
                "invalid link: expected '<' near \"{}\"",
                c.context()
            )));
        }
        let start = c.pos;
        while c.peek().map(|b| b != b'>').unwrap_or(false) {
            c.pos += 1;
        }
        if c.bump() != Some(b'>') {
            return Err(Error::response("invalid link: unterminated url"));
        }
        let url = String::from_utf8_lossy(&c.bytes[start..c.pos - 1]).into_owned();

        let mut params = Vec::new();
        loop {
            c.skip_ows();
            match c.peek() {
                Some(b';') => {
                    c.pos += 1;
                    c.skip_ows();
                    let key = parse_token(&mut c)?;
                    c.skip_ows();
                    let value = if c.peek() == Some(b'=') {
                        c.pos += 1;
                        c.skip_ows();
                        if c.peek() == Some(b'"') {
                            c.pos += 1;
                            parse_quoted(&mut c)?
                        } else {
                            parse_token(&mut c)?
                        }
                    } else {
                        String::new()
                    };
                    params.push(LinkParam { key, value });
                }
                Some(b',') => {
                    c.pos += 1;
                    break;
                }
                None => break,
                _ => {
                    return Err(Error::response(format!(
                        "invalid link: junk near \"{}\"",
                        c.context()
                    )))
                }
            }
        }

        links.push(Link { url, params });
    }

    Ok(links)
}

/// Find the target of the first link carrying `rel="<rel>"`.
pub fn find_rel<'a>(links: &'a [Link], rel: &str) -> Option<&'a str> {
    links
        .iter()
        .find(|l| {
            l.params
                .iter()
                .any(|p| p.key.eq_ignore_ascii_case("rel") && p.value == rel)
        })
        .map(|l| l.url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_link() {
        let links =
            parse_link_header("<https://example.com/acme/directory>;rel=\"index\"").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/acme/directory");
        assert_eq!(links[0].params.len(), 1);
        assert_eq!(links[0].params[0].key, "rel");
        assert_eq!(links[0].params[0].value, "index");
    }

    #[test]
    fn multiple_links_mixed_params() {
        let links = parse_link_header(
            "<https://a/1>; rel=next; title=\"page \\\"two\\\"\", <https://a/2>; rel=up",
        )
        .unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].params[0].value, "next");
        assert_eq!(links[0].params[1].value, "page \"two\"");
        assert_eq!(find_rel(&links, "next"), Some("https://a/1"));
        assert_eq!(find_rel(&links, "up"), Some("https://a/2"));
        assert_eq!(find_rel(&links, "prev"), None);
    }

    #[test]
    fn bare_param() {
        let links = parse_link_header("<https://a/x>;foo").unwrap();
        assert_eq!(links[0].params[0].key, "foo");
        assert_eq!(links[0].params[0].value, "");
    }

    #[test]
    fn oversized_quoted_value() {
        let big = "a".repeat(300);
        let hdr = format!("<https://a/x>;rel=\"{}\"", big);
        let e = parse_link_header(&hdr).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::FixedSize);
    }

    #[test]
    fn syntax_errors() {
        assert!(parse_link_header("https://no-angle").is_err());
        assert!(parse_link_header("<https://a/x>; =novalue").is_err());
        assert!(parse_link_header("<https://a/x> junk").is_err());
    }
}
