/*
 * retry.rs
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

//! Retry-After: either delay-seconds or an IMF-fixdate, resolved to an
//! absolute unix time.

use chrono::DateTime;

use crate::error::{Error, Result};

/// `now` is unix seconds; the result is the absolute retry time.
pub fn parse_retry_after(text: &str, now: i64) -> Result<i64> {
    let text = text.trim();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = text
            .parse()
            .map_err(|_| Error::param(format!("invalid retry-after: {}", text)))?;
        return Ok(now + secs);
    }
    let dt = DateTime::parse_from_rfc2822(text)
        .map_err(|_| Error::param(format!("invalid retry-after: {}", text)))?;
    Ok(dt.timestamp())
}
