/*
 * connection.rs
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

//! One HTTP connection: TCP or TLS stream, request writing via the
//! marshaller, response reading via the h1 parser and body decoders.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

use super::chunked::{ChunkEvent, ChunkedDecoder};
use super::h1::{ReadEvent, ResponseParser, StatusLine};
use super::limit::LimitDecoder;
use super::marshal::RequestMarshaler;
use super::Pair;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const WRITE_BUF: usize = 4096;
const READ_CHUNK: usize = 8192;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// How the body ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Empty,
    Length(u64),
    Chunked,
    /// Close-delineated; reading it consumes the connection.
    Close,
}

pub struct HttpConnection {
    stream: HttpStream,
    read_buf: BytesMut,
}

impl HttpConnection {
    /// Dial; with a TLS config the handshake runs immediately.
    pub async fn connect(
        host: &str,
        port: u16,
        tls: Option<Arc<ClientConfig>>,
    ) -> Result<HttpConnection> {
        let addr = format!("{}:{}", host, port);
        let tcp = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::conn(format!("connect to {} timed out", addr)))?
            .map_err(|e| Error::conn(format!("connect to {}: {}", addr, e)))?;

        let stream = match tls {
            Some(config) => {
                let server_name: ServerName<'static> = host
                    .to_string()
                    .try_into()
                    .map_err(|_| Error::param(format!("invalid host name: {}", host)))?;
                let connector = TlsConnector::from(config);
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| Error::conn(format!("tls handshake with {}: {}", addr, e)))?;
                HttpStream::Tls(Box::new(tls))
            }
            None => HttpStream::Plain(tcp),
        };

        Ok(HttpConnection {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
        })
    }

    /// Returns 0 on EOF.
    async fn refill(&mut self) -> Result<usize> {
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut tmp).await?;
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(n)
    }

    /// Write the request head via repeated bounded marshal passes, then
    /// the fixed body.
    pub async fn write_request(
        &mut self,
        marshaler: &mut RequestMarshaler<'_>,
        body: &[u8],
    ) -> Result<()> {
        let mut buf = Vec::with_capacity(WRITE_BUF);
        loop {
            buf.clear();
            let done = marshaler.marshal(&mut buf, WRITE_BUF);
            self.stream.write_all(&buf).await?;
            if done {
                break;
            }
        }
        if !body.is_empty() {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Drive the h1 parser to end-of-headers.
    pub async fn read_headers(&mut self) -> Result<(StatusLine, Vec<Pair>)> {
        let mut parser = ResponseParser::new();
        let mut status = None;
        let mut headers = Vec::new();
        loop {
            match parser.read(&mut self.read_buf)? {
                ReadEvent::NeedMore => {
                    if self.refill().await? == 0 {
                        return Err(Error::conn("connection closed mid-headers"));
                    }
                }
                ReadEvent::Status(s) => status = Some(s),
                ReadEvent::Header(p) => headers.push(p),
                ReadEvent::EndOfHeaders => break,
            }
        }
        match status {
            Some(s) => Ok((s, headers)),
            None => Err(Error::internal("end of headers without a status line")),
        }
    }

    /// Read the whole body per the framing. Returns (body, trailers,
    /// clean): `clean` means the message ended on its own boundary and
    /// the connection may carry another request.
    pub async fn read_body(&mut self, framing: Framing) -> Result<(Vec<u8>, Vec<Pair>, bool)> {
        match framing {
            Framing::Empty => Ok((Vec::new(), Vec::new(), true)),
            Framing::Length(n) => {
                let mut limit = LimitDecoder::new(n);
                let mut body = Vec::new();
                loop {
                    body.extend_from_slice(&limit.read(&mut self.read_buf));
                    if limit.is_done() {
                        break;
                    }
                    if self.refill().await? == 0 {
                        limit.check_eof()?;
                        break;
                    }
                }
                Ok((body, Vec::new(), true))
            }
            Framing::Chunked => {
                let mut chunked = ChunkedDecoder::new();
                let mut body = Vec::new();
                let mut trailers = Vec::new();
                loop {
                    match chunked.read(&mut self.read_buf)? {
                        ChunkEvent::NeedMore => {
                            if self.refill().await? == 0 {
                                return Err(Error::response("incomplete chunked response"));
                            }
                        }
                        ChunkEvent::Data(b) => body.extend_from_slice(&b),
                        ChunkEvent::Trailer(p) => trailers.push(p),
                        ChunkEvent::Done => break,
                    }
                }
                Ok((body, trailers, true))
            }
            Framing::Close => {
                let mut body = self.read_buf.split().to_vec();
                loop {
                    let n = self.refill().await?;
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&self.read_buf.split());
                }
                Ok((body, Vec::new(), false))
            }
        }
    }
}
