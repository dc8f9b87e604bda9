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

//! ACME (RFC 8555) client: accounts, orders, authorizations, challenges
//! and finalization over the HTTP client, with signed JWS POSTs.

mod client;

use std::path::Path;

use crate::error::{Error, Result};
use crate::json::JsonWriter;
use crate::jws::Key;

pub use client::{AcmeClient, AuthzInfo, EabCredentials, NewOrder, OrderInfo};

/// Default directory.
pub const LETSENCRYPT: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// What --pebble points the client at.
pub const PEBBLE_DIRECTORY: &str = "https://localhost:14000/dir";

/// An ACME account: the signing key, the server-issued account URL
/// (the `kid` of every subsequent JWS), and the account's orders URL.
pub struct AcmeAccount {
    pub key: Key,
    pub kid: String,
    pub orders: String,
}

impl AcmeAccount {
    pub fn from_json(text: &str) -> Result<AcmeAccount> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::param(format!("invalid account json: {}", e)))?;
        let jwk = value
            .get("key")
            .ok_or_else(|| Error::param("account json missing key"))?;
        let key = Key::from_jwk(jwk)?;
        let kid = value
            .get("kid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::param("account json missing kid"))?
            .to_string();
        let orders = value
            .get("orders")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::param("account json missing orders"))?
            .to_string();
        Ok(AcmeAccount { key, kid, orders })
    }

    pub fn from_file(path: &Path) -> Result<AcmeAccount> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::fs(format!("reading {}: {}", path.display(), e)))?;
        AcmeAccount::from_json(&text)
            .map_err(|e| e.context(format!("parsing account file {}", path.display())))
    }

    /// The account-file format: `{"key": <jwk>, "kid": ..., "orders": ...}`.
    pub fn to_json(&self) -> String {
        let mut w = JsonWriter::new();
        w.write_start_object();
        w.write_key("key");
        w.write_raw(&self.key.jwk_pvt());
        w.write_key("kid");
        w.write_string(&self.kid);
        w.write_key("orders");
        w.write_string(&self.orders);
        w.write_end_object();
        w.into_string()
    }
}
