/*
 * limit.rs
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

//! Content-Length body framing: pass through exactly N bytes, then give
//! the connection back. Transport EOF before the N-th byte is a protocol
//! violation, not a short body.

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

pub struct LimitDecoder {
    limit: u64,
    nread: u64,
}

impl LimitDecoder {
    pub fn new(limit: u64) -> Self {
        Self { limit, nread: 0 }
    }

    /// Take body bytes out of `buf`, up to the remaining budget. Surplus
    /// bytes stay in `buf` for the next message on the connection.
    pub fn read(&mut self, buf: &mut BytesMut) -> Bytes {
        let take = (self.limit - self.nread).min(buf.len() as u64) as usize;
        self.nread += take as u64;
        buf.split_to(take).freeze()
    }

    /// True once the full N bytes have passed; the base connection
    /// detaches cleanly.
    pub fn is_done(&self) -> bool {
        self.nread >= self.limit
    }

    /// Call on transport EOF: EOF short of the limit invalidates the
    /// whole response.
    pub fn check_eof(&self) -> Result<()> {
        if self.is_done() {
            Ok(())
        } else {
            Err(Error::response(format!(
                "unexpected EOF with {} body bytes outstanding",
                self.limit - self.nread
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &[u8] = b"0123456789abcdef";

    #[test]
    fn exact_byte_counts_for_every_limit() {
        for limit in 0..=INPUT.len() {
            let mut d = LimitDecoder::new(limit as u64);
            let mut buf = BytesMut::from(INPUT);
            let mut got = Vec::new();
            got.extend_from_slice(&d.read(&mut buf));
            assert_eq!(got.len(), limit);
            assert_eq!(&got[..], &INPUT[..limit]);
            // limit reached: decoder detaches, surplus stays buffered
            assert!(d.is_done());
            assert!(d.check_eof().is_ok());
            assert_eq!(&buf[..], &INPUT[limit..]);
        }
    }

    #[test]
    fn early_eof_is_response_invalid() {
        let mut d = LimitDecoder::new(INPUT.len() as u64 + 1);
        let mut buf = BytesMut::from(INPUT);
        let got = d.read(&mut buf);
        assert_eq!(got.len(), INPUT.len());
        assert!(!d.is_done());
        let e = d.check_eof().unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }

    #[test]
    fn incremental_reads() {
        let mut d = LimitDecoder::new(10);
        let mut got = Vec::new();
        for chunk in INPUT.chunks(3) {
            let mut buf = BytesMut::from(chunk);
            got.extend_from_slice(&d.read(&mut buf));
            if d.is_done() {
                break;
            }
        }
        assert_eq!(&got[..], &INPUT[..10]);
    }
}
