/*
 * client.rs
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

//! HTTP/1.1 user agent with one reusable connection per origin.
//! Requests through one client are strictly serialized (&mut self);
//! callers needing a queue share the client behind a tokio Mutex.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_rustls::rustls::ClientConfig;

use crate::error::{Error, Result};
use crate::web::url::Url;

use super::connection::{Framing, HttpConnection};
use super::marshal::{Method, RequestMarshaler};
use super::{find_header, header_has_token, Pair};

/// Idle connections expire after this long; the next request redials.
const IDLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct HttpClientConfig {
    pub tls: Arc<ClientConfig>,
    pub idle_timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self {
            tls,
            idle_timeout: IDLE_TIMEOUT,
        }
    }
}

pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a Url,
    pub params: &'a [Pair],
    pub headers: &'a [Pair],
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    pub fn new(method: Method, url: &'a Url) -> Self {
        Self {
            method,
            url,
            params: &[],
            headers: &[],
            body: &[],
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<Pair>,
    pub trailers: Vec<Pair>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

struct ActiveConn {
    tls: bool,
    host: String,
    port: u16,
    conn: HttpConnection,
    idle_deadline: Instant,
}

pub struct HttpClient {
    config: HttpClientConfig,
    active: Option<ActiveConn>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    /// Issue one request and read the whole response. The connection is
    /// kept for the next request to the same origin unless the message
    /// framing or a Connection: close consumed it.
    pub async fn request(&mut self, req: HttpRequest<'_>) -> Result<HttpResponse> {
        let tls = req.url.is_tls()?;
        let port = req.url.port_or_default()?;

        // a connection for another origin, or one that idled out, gets
        // torn down before dialing fresh
        if let Some(active) = &self.active {
            let stale = active.tls != tls
                || active.host != req.url.host
                || active.port != port
                || Instant::now() >= active.idle_deadline;
            if stale {
                log::debug!(
                    "dropping connection to {}:{} before dialing {}:{}",
                    active.host,
                    active.port,
                    req.url.host,
                    port
                );
                self.active = None;
            }
        }

        if self.active.is_none() {
            let conn = HttpConnection::connect(
                &req.url.host,
                port,
                tls.then(|| self.config.tls.clone()),
            )
            .await?;
            self.active = Some(ActiveConn {
                tls,
                host: req.url.host.clone(),
                port,
                conn,
                idle_deadline: Instant::now() + self.config.idle_timeout,
            });
        }
        let Some(active) = self.active.as_mut() else {
            return Err(Error::internal("no active connection after connect"));
        };

        // trailer support is always advertised on non-HEAD requests
        let mut headers = req.headers.to_vec();
        if req.method != Method::Head {
            headers.push(Pair::new("Connection", "TE"));
            headers.push(Pair::new("TE", "trailers"));
        }

        let mut marshaler =
            RequestMarshaler::new(req.method, req.url, req.params, &headers, req.body.len());
        let result = async {
            active.conn.write_request(&mut marshaler, req.body).await?;
            let (status, resp_headers) = active.conn.read_headers().await?;
            let framing = decide_framing(req.method, status.code, &resp_headers)?;
            let conn_close = header_has_token(&resp_headers, "connection", "close");
            let (body, trailers, clean) = active.conn.read_body(framing).await?;
            Ok::<_, Error>((status, resp_headers, body, trailers, clean && !conn_close))
        }
        .await;

        match result {
            Ok((status, resp_headers, body, trailers, reusable)) => {
                if reusable {
                    active.idle_deadline = Instant::now() + self.config.idle_timeout;
                } else {
                    self.active = None;
                }
                log::debug!("{} {} -> {}", req.method.as_str(), req.url, status.code);
                Ok(HttpResponse {
                    status: status.code,
                    reason: status.reason,
                    headers: resp_headers,
                    trailers,
                    body,
                })
            }
            Err(e) => {
                // a failing connection never carries another request
                self.active = None;
                Err(e)
            }
        }
    }
}

/// Framing per RFC 7230 §3.3.3, client side.
fn decide_framing(method: Method, code: u16, headers: &[Pair]) -> Result<Framing> {
    // some responses never have a body, whatever the headers claim
    if method == Method::Head || (100..200).contains(&code) || code == 204 || code == 304 {
        return Ok(Framing::Empty);
    }

    let chunked = header_has_token(headers, "transfer-encoding", "chunked");

    let mut content_length: Option<u64> = None;
    for header in headers.iter().filter(|p| {
        p.key.eq_ignore_ascii_case("content-length")
    }) {
        // a list-form or repeated Content-Length is fine only when every
        // value is identical
        for value in header.value.split(',') {
            let n: u64 = value
                .trim()
                .parse()
                .map_err(|_| Error::response(format!("invalid Content-Length: {}", header.value)))?;
            match content_length {
                None => content_length = Some(n),
                Some(prev) if prev == n => {}
                Some(prev) => {
                    return Err(Error::response(format!(
                        "conflicting Content-Length values: {} and {}",
                        prev, n
                    )))
                }
            }
        }
    }

    if chunked && content_length.is_some() {
        return Err(Error::response(
            "message has both Transfer-Encoding: chunked and Content-Length",
        ));
    }

    if chunked {
        Ok(Framing::Chunked)
    } else {
        match content_length {
            Some(0) => Ok(Framing::Empty),
            Some(n) => Ok(Framing::Length(n)),
            None => Ok(Framing::Close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<Pair> {
        list.iter().map(|(k, v)| Pair::new(*k, *v)).collect()
    }

    #[test]
    fn framing_rules() {
        let none: &[Pair] = &[];
        assert_eq!(
            decide_framing(Method::Get, 200, none).unwrap(),
            Framing::Close
        );
        assert_eq!(
            decide_framing(Method::Head, 200, &pairs(&[("Content-Length", "10")])).unwrap(),
            Framing::Empty
        );
        assert_eq!(decide_framing(Method::Get, 204, none).unwrap(), Framing::Empty);
        assert_eq!(decide_framing(Method::Get, 304, none).unwrap(), Framing::Empty);
        assert_eq!(decide_framing(Method::Get, 101, none).unwrap(), Framing::Empty);
        assert_eq!(
            decide_framing(Method::Get, 200, &pairs(&[("Content-Length", "42")])).unwrap(),
            Framing::Length(42)
        );
        assert_eq!(
            decide_framing(
                Method::Get,
                200,
                &pairs(&[("Transfer-Encoding", "gzip, chunked")])
            )
            .unwrap(),
            Framing::Chunked
        );
    }

    #[test]
    fn duplicate_identical_lengths_accepted() {
        let headers = pairs(&[("Content-Length", "7"), ("Content-Length", "7, 7")]);
        assert_eq!(
            decide_framing(Method::Get, 200, &headers).unwrap(),
            Framing::Length(7)
        );
    }

    #[test]
    fn conflicting_lengths_rejected() {
        let headers = pairs(&[("Content-Length", "7"), ("Content-Length", "8")]);
        assert!(decide_framing(Method::Get, 200, &headers).is_err());
    }

    #[test]
    fn chunked_with_length_rejected() {
        let headers = pairs(&[
            ("Transfer-Encoding", "chunked"),
            ("Content-Length", "7"),
        ]);
        assert!(decide_framing(Method::Get, 200, &headers).is_err());
    }
}
