/*
 * mod.rs
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

//! JSON output. Parsing is serde_json's job; this module only emits, for
//! the places where member order is semantic (JWK thumbprint input, JWS
//! protected headers, account files).

mod writer;

pub use writer::JsonWriter;
