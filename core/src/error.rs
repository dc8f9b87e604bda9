/*
 * error.rs
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

//! Error carrier shared by every fallible operation: a kind plus an
//! append-only context trace that propagation points extend.

use std::fmt;
use std::io;

/// What failed. Kinds, not types: handlers match on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A fixed-size buffer overflowed.
    FixedSize,
    /// Programmer mistake (invalid value fed to an internal API).
    Value,
    /// User-supplied input is invalid.
    Param,
    /// An internal invariant was violated; always fatal to a session.
    Internal,
    /// Filesystem failure.
    Fs,
    /// Connection-level failure (dial, read, write, unexpected close).
    Conn,
    /// Cryptography failure.
    Crypto,
    /// The peer violated the protocol.
    Response,
    /// The operation was canceled.
    Canceled,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FixedSize => "fixed-size",
            ErrorKind::Value => "value",
            ErrorKind::Param => "param",
            ErrorKind::Internal => "internal",
            ErrorKind::Fs => "fs",
            ErrorKind::Conn => "conn",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Response => "response",
            ErrorKind::Canceled => "canceled",
        }
    }
}

/// Error value: kind, original message, and the trace accumulated while
/// propagating toward the handler that renders it.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    trace: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            trace: Vec::new(),
        }
    }

    pub fn param(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Param, msg)
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    pub fn response(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Response, msg)
    }

    pub fn conn(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conn, msg)
    }

    pub fn fs(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fs, msg)
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Crypto, msg)
    }

    pub fn fixed_size(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::FixedSize, msg)
    }

    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "canceled")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Append a propagation-point note and pass the error along.
    pub fn context(mut self, note: impl Into<String>) -> Self {
        self.trace.push(note.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)?;
        for note in &self.trace {
            write!(f, "\n  while {}", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Conn, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Context helper for results, so call sites read
/// `op().ctx("fetching directory urls")?`.
pub trait Context<T> {
    fn ctx(self, note: &str) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn ctx(self, note: &str) -> Result<T> {
        self.map_err(|e| e.context(note))
    }
}
