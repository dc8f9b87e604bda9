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

//! IMAP4rev1 client role (RFC 3501) with the UIDPLUS, ENABLE, CONDSTORE
//! and QRESYNC extensions: typed command/response tree, re-entrant
//! wire writer, response reader, and the session state machine.

pub mod client;
pub mod extension;
pub mod read;
pub mod types;
pub mod write;

pub use client::{ImapClient, ImapClientSpec, ImapController};
pub use extension::{Extension, ExtensionState, Extensions};
pub use read::ResponseReader;
pub use types::*;
