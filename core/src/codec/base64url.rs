/*
 * base64url.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Sigillo.
 *
 * Sigillo is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

//! base64url without padding (RFC 4648 §5), the encoding JWS and ACME use
//! everywhere.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::{Error, Result};

pub fn bin2b64url(bin: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bin)
}

/// Decode base64url. `len % 4 == 1` can never be produced by a valid
/// encoder, and characters outside the url-safe alphabet are rejected.
pub fn b64url2bin(text: &str) -> Result<Vec<u8>> {
    if text.len() % 4 == 1 {
        return Err(Error::param("invalid base64url length"));
    }
    URL_SAFE_NO_PAD
        .decode(text.as_bytes())
        .map_err(|e| Error::param(format!("invalid base64url: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        // cover every remainder class of input length
        for len in 0..64usize {
            let x: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let enc = bin2b64url(&x);
            assert!(!enc.contains('='));
            assert_eq!(b64url2bin(&enc).unwrap(), x);
        }
    }

    #[test]
    fn known_vector() {
        assert_eq!(bin2b64url(b"some-special-text"), "c29tZS1zcGVjaWFsLXRleHQ");
    }

    #[test]
    fn invalid_characters_rejected() {
        for bad in ["ab+d", "ab/d", "ab=d", "a b"] {
            let e = b64url2bin(bad).unwrap_err();
            assert_eq!(e.kind(), crate::ErrorKind::Param);
        }
    }

    #[test]
    fn invalid_final_length_rejected() {
        let e = b64url2bin("abcde").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
    }
}
