/*
 * marshal.rs
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

//! Re-entrant HTTP/1.1 request serializer. Each `marshal` pass fills a
//! bounded buffer; when output does not fit, the already-emitted byte
//! count carries over as `skip` and the next pass resumes mid-token.
//! Headers (and form params) emit in reverse declaration order, so the
//! last-declared pair sits closest to the start-line.

use crate::web::url::Url;

use super::Pair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only these methods send a payload, and with it an automatic
    /// Content-Length header.
    pub fn has_payload(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

/// Output-byte accounting for one marshal pass: skip what an earlier
/// pass already emitted, fill what fits, count the rest as `want`.
struct SkipFill<'a> {
    out: &'a mut Vec<u8>,
    cap: usize,
    skip: usize,
    passed: usize,
    want: usize,
}

impl<'a> SkipFill<'a> {
    fn new(out: &'a mut Vec<u8>, cap: usize, skip: usize) -> Self {
        Self {
            out,
            cap,
            skip,
            passed: 0,
            want: 0,
        }
    }

    fn space(&self) -> usize {
        self.cap.saturating_sub(self.out.len())
    }

    fn fill(&mut self, input: &[u8]) {
        if self.want > 0 {
            self.want += input.len();
            return;
        }
        let skip = self.skip.min(input.len());
        self.skip -= skip;
        self.passed += skip;

        let end = (skip + self.space()).min(input.len());
        let append = &input[skip..end];
        self.out.extend_from_slice(append);
        self.passed += append.len();

        if end < input.len() {
            self.want += input.len() - end;
        }
    }

    fn fill_char(&mut self, c: u8) {
        if self.want > 0 {
            self.want += 1;
        } else if self.skip > 0 {
            self.skip -= 1;
            self.passed += 1;
        } else if self.space() > 0 {
            self.out.push(c);
            self.passed += 1;
        } else {
            self.want += 1;
        }
    }

    /// Simplified application/x-www-form-urlencoded encoding algorithm;
    /// input is assumed to be utf8 already. Uppercase hex is required.
    fn fill_urlencoded(&mut self, s: &[u8]) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        for &c in s {
            match c {
                b'*' | b'-' | b'.' | b'_'
                | b'0'..=b'9'
                | b'a'..=b'z'
                | b'A'..=b'Z' => self.fill_char(c),
                b' ' => self.fill_char(b'+'),
                _ => {
                    self.fill_char(b'%');
                    self.fill_char(HEX[(c >> 4) as usize]);
                    self.fill_char(HEX[(c & 0xf) as usize]);
                }
            }
        }
    }
}

/// Marshals one request; reusable via `reset`.
pub struct RequestMarshaler<'a> {
    method: Method,
    url: &'a Url,
    params: &'a [Pair],
    hdrs: &'a [Pair],
    body_len: usize,
    // resumption state
    skip: usize,
    need_amp: bool,
    request_method_url: bool,
    params_rem: usize,
    request_fragment_version: bool,
    host: bool,
    content_length: bool,
    hdrs_rem: usize,
    eoh: bool,
}

impl<'a> RequestMarshaler<'a> {
    pub fn new(
        method: Method,
        url: &'a Url,
        params: &'a [Pair],
        hdrs: &'a [Pair],
        body_len: usize,
    ) -> Self {
        Self {
            method,
            url,
            params,
            hdrs,
            body_len,
            skip: 0,
            need_amp: false,
            request_method_url: false,
            params_rem: params.len(),
            request_fragment_version: false,
            host: false,
            // treat Content-Length as already written when no payload
            content_length: !method.has_payload(),
            hdrs_rem: hdrs.len(),
            eoh: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.method, self.url, self.params, self.hdrs, self.body_len);
    }

    /// Emit as much of the request as fits in `buf` up to `cap` bytes.
    /// Returns true when the request head is completely written.
    pub fn marshal(&mut self, buf: &mut Vec<u8>, cap: usize) -> bool {
        // request-line, before params
        if !self.request_method_url {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            sf.fill(self.method.as_str().as_bytes());
            sf.fill(b" ");
            if self.url.path.is_empty() {
                sf.fill(b"/");
            } else {
                sf.fill(self.url.path.as_bytes());
            }
            let query = self.url.query.as_deref().unwrap_or("");
            if !query.is_empty() || !self.params.is_empty() {
                sf.fill(b"?");
                sf.fill(query.as_bytes());
            }
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            // will user-parameters need a '&' separator?
            self.need_amp = !query.is_empty() && !query.ends_with('&');
            self.request_method_url = true;
            self.skip = 0;
        }

        // every user param, form-urlencoded
        while self.params_rem > 0 {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            if self.need_amp {
                sf.fill(b"&");
            }
            let pair = &self.params[self.params_rem - 1];
            sf.fill_urlencoded(pair.key.as_bytes());
            sf.fill(b"=");
            sf.fill_urlencoded(pair.value.as_bytes());
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.need_amp = true;
            self.params_rem -= 1;
            self.skip = 0;
        }

        // request-line after params
        if !self.request_fragment_version {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            if let Some(fragment) = self.url.fragment.as_deref() {
                if !fragment.is_empty() {
                    sf.fill(b"#");
                    sf.fill(fragment.as_bytes());
                }
            }
            sf.fill(b" HTTP/1.1\r\n");
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.request_fragment_version = true;
            self.skip = 0;
        }

        // Host header
        if !self.host {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            sf.fill(b"Host: ");
            sf.fill(self.url.host_port().as_bytes());
            sf.fill(b"\r\n");
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.host = true;
            self.skip = 0;
        }

        // Content-Length header (pre-marked done for non-payload methods)
        if !self.content_length {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            sf.fill(b"Content-Length: ");
            sf.fill(self.body_len.to_string().as_bytes());
            sf.fill(b"\r\n");
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.content_length = true;
            self.skip = 0;
        }

        // every user header
        while self.hdrs_rem > 0 {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            let pair = &self.hdrs[self.hdrs_rem - 1];
            sf.fill(pair.key.as_bytes());
            sf.fill(b": ");
            sf.fill(pair.value.as_bytes());
            sf.fill(b"\r\n");
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.hdrs_rem -= 1;
            self.skip = 0;
        }

        // final CRLF
        if !self.eoh {
            let mut sf = SkipFill::new(buf, cap, self.skip);
            sf.fill(b"\r\n");
            if sf.want > 0 {
                self.skip = sf.passed;
                return false;
            }
            self.eoh = true;
            self.skip = 0;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<Pair> {
        list.iter().map(|(k, v)| Pair::new(*k, *v)).collect()
    }

    fn single_shot(m: &mut RequestMarshaler<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        assert!(m.marshal(&mut buf, 1 << 20));
        buf
    }

    #[test]
    fn basic_get() {
        let url = Url::parse("http://example.com").unwrap();
        let mut m = RequestMarshaler::new(Method::Get, &url, &[], &[], 0);
        let out = single_shot(&mut m);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn post_with_everything() {
        let url = Url::parse("https://h:8443/p/ath?fixed=1#frag").unwrap();
        let params = pairs(&[("a", "b c"), ("semi;colon", "x*-._~")]);
        let hdrs = pairs(&[("X-One", "1"), ("X-Two", "2")]);
        let mut m = RequestMarshaler::new(Method::Post, &url, &params, &hdrs, 5);
        let out = String::from_utf8(single_shot(&mut m)).unwrap();
        // params in reverse order, urlencoded, space as '+', uppercase hex
        assert_eq!(
            out,
            "POST /p/ath?fixed=1&semi%3Bcolon=x*-._%7E&a=b+c#frag HTTP/1.1\r\n\
             Host: h:8443\r\n\
             Content-Length: 5\r\n\
             X-Two: 2\r\n\
             X-One: 1\r\n\
             \r\n"
        );
    }

    #[test]
    fn head_has_no_content_length() {
        let url = Url::parse("http://h/x").unwrap();
        let mut m = RequestMarshaler::new(Method::Head, &url, &[], &[], 0);
        let out = String::from_utf8(single_shot(&mut m)).unwrap();
        assert!(!out.contains("Content-Length"));
        assert!(out.starts_with("HEAD /x HTTP/1.1\r\n"));
    }

    #[test]
    fn idempotent_at_all_chunk_sizes() {
        let url = Url::parse("https://api.example.com/acme/new-order?x=y").unwrap();
        let params = pairs(&[("access key", "se cr?et")]);
        let hdrs = pairs(&[("Content-Type", "application/jose+json"), ("TE", "trailers")]);

        let mut reference = RequestMarshaler::new(Method::Post, &url, &params, &hdrs, 123);
        let expected = single_shot(&mut reference);

        for cap in 1..expected.len() + 2 {
            let mut m = RequestMarshaler::new(Method::Post, &url, &params, &hdrs, 123);
            let mut total = Vec::new();
            loop {
                let mut buf = Vec::new();
                let done = m.marshal(&mut buf, cap);
                total.extend_from_slice(&buf);
                if done {
                    break;
                }
                assert!(!buf.is_empty(), "no progress at cap {}", cap);
            }
            assert_eq!(total, expected, "mismatch at cap {}", cap);
        }
    }
}
