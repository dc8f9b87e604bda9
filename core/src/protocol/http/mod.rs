/*
 * mod.rs
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

//! HTTP/1.1 client role: request marshalling, response parsing, body
//! framing (identity, Content-Length, chunked), one reusable connection
//! per origin.

pub mod chunked;
pub mod client;
pub mod connection;
pub mod h1;
pub mod limit;
pub mod marshal;

pub use client::{HttpClient, HttpClientConfig, HttpRequest, HttpResponse};
pub use marshal::{Method, RequestMarshaler};

/// One header or form parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// First header with the given name, case-insensitive.
pub fn find_header<'a>(headers: &'a [Pair], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|p| p.key.eq_ignore_ascii_case(name))
        .map(|p| p.value.as_str())
}

/// True when any header with the given name carries the token in its
/// comma-separated value list.
pub fn header_has_token(headers: &[Pair], name: &str, token: &str) -> bool {
    headers
        .iter()
        .filter(|p| p.key.eq_ignore_ascii_case(name))
        .flat_map(|p| p.value.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}
