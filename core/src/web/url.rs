/*
 * url.rs
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

//! RFC 3986 URL parsing into its eight parts, plus the simpler
//! `scheme://host:port` addrspec used for dial strings. Text is sliced,
//! never percent-decoded; the wire form is what goes back out.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// Includes the leading slash when present; empty means "no path".
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

fn valid_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

impl Url {
    pub fn parse(text: &str) -> Result<Url> {
        let (scheme, rest) = text
            .split_once("://")
            .ok_or_else(|| Error::param(format!("url missing scheme: {}", text)))?;
        if !valid_scheme(scheme) {
            return Err(Error::param(format!("invalid url scheme: {}", scheme)));
        }

        let authority_end = rest
            .find(|c| c == '/' || c == '?' || c == '#')
            .unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        let rest = &rest[authority_end..];

        let (userinfo, hostport) = match authority.rfind('@') {
            Some(i) => (Some(&authority[..i]), &authority[i + 1..]),
            None => (None, authority),
        };
        let (user, pass) = match userinfo {
            Some(ui) => match ui.split_once(':') {
                Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
                None => (Some(ui.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = parse_hostport(hostport)?;
        if host.is_empty() {
            return Err(Error::param(format!("url missing host: {}", text)));
        }

        let path_end = rest
            .find(|c| c == '?' || c == '#')
            .unwrap_or(rest.len());
        let path = rest[..path_end].to_string();
        let rest = &rest[path_end..];

        let (query, fragment) = if let Some(q) = rest.strip_prefix('?') {
            match q.split_once('#') {
                Some((q, f)) => (Some(q.to_string()), Some(f.to_string())),
                None => (Some(q.to_string()), None),
            }
        } else if let Some(f) = rest.strip_prefix('#') {
            (None, Some(f.to_string()))
        } else {
            (None, None)
        };

        Ok(Url {
            scheme: scheme.to_string(),
            user,
            pass,
            host,
            port,
            path,
            query,
            fragment,
        })
    }

    /// True for https, false for http; anything else is not dialable here.
    pub fn is_tls(&self) -> Result<bool> {
        if self.scheme.eq_ignore_ascii_case("https") {
            Ok(true)
        } else if self.scheme.eq_ignore_ascii_case("http") {
            Ok(false)
        } else {
            Err(Error::param(format!("unsupported scheme: {}", self.scheme)))
        }
    }

    pub fn port_or_default(&self) -> Result<u16> {
        match self.port {
            Some(p) => Ok(p),
            None => {
                if self.is_tls()? {
                    Ok(443)
                } else {
                    Ok(80)
                }
            }
        }
    }

    /// Value for the Host header: the explicit port stays, a defaulted
    /// port does not.
    pub fn host_port(&self) -> String {
        match self.port {
            Some(p) => format!("{}:{}", self.host, p),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}", user)?;
            if let Some(pass) = &self.pass {
                write!(f, ":{}", pass)?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(p) = self.port {
            write!(f, ":{}", p)?;
        }
        write!(f, "{}", self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{}", q)?;
        }
        if let Some(fr) = &self.fragment {
            write!(f, "#{}", fr)?;
        }
        Ok(())
    }
}

fn parse_hostport(hostport: &str) -> Result<(String, Option<u16>)> {
    if let Some(rest) = hostport.strip_prefix('[') {
        // IPv6 literal
        let end = rest
            .find(']')
            .ok_or_else(|| Error::param("unterminated IPv6 literal in url"))?;
        let host = rest[..end].to_string();
        let after = &rest[end + 1..];
        if after.is_empty() {
            return Ok((host, None));
        }
        let digits = after
            .strip_prefix(':')
            .ok_or_else(|| Error::param("junk after IPv6 literal in url"))?;
        return Ok((host, Some(parse_port(digits)?)));
    }
    match hostport.rsplit_once(':') {
        Some((host, digits)) => Ok((host.to_string(), Some(parse_port(digits)?))),
        None => Ok((hostport.to_string(), None)),
    }
}

fn parse_port(digits: &str) -> Result<u16> {
    digits
        .parse::<u16>()
        .map_err(|_| Error::param(format!("invalid url port: {}", digits)))
}

/// `scheme://host:port` with nothing else; used for listen/dial strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrSpec {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl AddrSpec {
    pub fn parse(text: &str) -> Result<AddrSpec> {
        let url = Url::parse(text)?;
        if url.user.is_some()
            || !url.path.is_empty()
            || url.query.is_some()
            || url.fragment.is_some()
        {
            return Err(Error::param(format!("not a plain addrspec: {}", text)));
        }
        let port = url
            .port
            .ok_or_else(|| Error::param(format!("addrspec missing port: {}", text)))?;
        Ok(AddrSpec {
            scheme: url.scheme,
            host: url.host,
            port,
        })
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
