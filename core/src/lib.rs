/*
 * lib.rs
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

//! Protocol core: an IMAP client with maildir synchronization, an ACME
//! (RFC 8555) client with JWS signing, and the non-persistent HTTP/1.1
//! user agent the ACME client runs over.

pub mod acme;
pub mod codec;
pub mod error;
pub mod json;
pub mod jws;
pub mod localstorage;
pub mod net;
pub mod protocol;
pub mod sealed;
pub mod web;

pub use error::{Error, ErrorKind, Result};
