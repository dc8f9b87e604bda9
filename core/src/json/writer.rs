/*
 * writer.rs
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

//! Streaming JSON writer: build compact JSON via write_* methods, output
//! in a BytesMut (bytes crate). Members appear exactly in call order.

use bytes::{BufMut, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,       // before first value
    AfterValue, // after a value, next value needs a comma
    AfterKey,   // after key + colon, a value follows without separator
}

/// JSON writer that appends to a BytesMut.
pub struct JsonWriter {
    buf: BytesMut,
    state: State,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
            state: State::Init,
        }
    }

    /// Access the buffer (e.g. to append to another writer).
    pub fn buffer(&self) -> &BytesMut {
        &self.buf
    }

    /// Take the buffer, leaving the writer empty (for reuse).
    pub fn take_buffer(&mut self) -> BytesMut {
        self.state = State::Init;
        std::mem::take(&mut self.buf)
    }

    pub fn into_string(mut self) -> String {
        let buf = self.take_buffer();
        // the writer only ever emits valid UTF-8
        String::from_utf8(buf.to_vec()).unwrap_or_default()
    }

    fn value_separator(&mut self) {
        if self.state == State::AfterValue {
            self.buf.put_u8(b',');
        }
    }

    pub fn write_start_object(&mut self) {
        self.value_separator();
        self.buf.put_u8(b'{');
        self.state = State::Init;
    }

    pub fn write_end_object(&mut self) {
        self.buf.put_u8(b'}');
        self.state = State::AfterValue;
    }

    pub fn write_start_array(&mut self) {
        self.value_separator();
        self.buf.put_u8(b'[');
        self.state = State::Init;
    }

    pub fn write_end_array(&mut self) {
        self.buf.put_u8(b']');
        self.state = State::AfterValue;
    }

    pub fn write_key(&mut self, key: &str) {
        self.value_separator();
        escape_into(&mut self.buf, key);
        self.buf.put_u8(b':');
        self.state = State::AfterKey;
    }

    pub fn write_string(&mut self, s: &str) {
        self.value_separator();
        escape_into(&mut self.buf, s);
        self.state = State::AfterValue;
    }

    pub fn write_bool(&mut self, b: bool) {
        self.value_separator();
        self.buf.put_slice(if b { b"true" } else { b"false" });
        self.state = State::AfterValue;
    }

    pub fn write_u64(&mut self, n: u64) {
        self.value_separator();
        self.buf.put_slice(n.to_string().as_bytes());
        self.state = State::AfterValue;
    }

    /// Paste pre-rendered JSON: either a complete value, or (inside an
    /// object) a `"key":value[,...]` snippet. The caller owns validity.
    pub fn write_raw(&mut self, raw: &str) {
        self.value_separator();
        self.buf.put_slice(raw.as_bytes());
        self.state = State::AfterValue;
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(buf: &mut BytesMut, s: &str) {
    buf.put_u8(b'"');
    for c in s.chars() {
        match c {
            '"' => buf.put_slice(b"\\\""),
            '\\' => buf.put_slice(b"\\\\"),
            '\n' => buf.put_slice(b"\\n"),
            '\r' => buf.put_slice(b"\\r"),
            '\t' => buf.put_slice(b"\\t"),
            '\x08' => buf.put_slice(b"\\b"),
            '\x0c' => buf.put_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                buf.put_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut tmp = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
    buf.put_u8(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_member_order_is_call_order() {
        let mut w = JsonWriter::new();
        w.write_start_object();
        w.write_key("crv");
        w.write_string("Ed25519");
        w.write_key("kty");
        w.write_string("OKP");
        w.write_key("x");
        w.write_string("abc");
        w.write_end_object();
        assert_eq!(
            w.into_string(),
            r#"{"crv":"Ed25519","kty":"OKP","x":"abc"}"#
        );
    }

    #[test]
    fn nested_arrays_and_raw_snippets() {
        let mut w = JsonWriter::new();
        w.write_start_object();
        w.write_raw("\"alg\":\"EdDSA\",\"crv\":\"Ed25519\"");
        w.write_key("contact");
        w.write_start_array();
        w.write_string("mailto:a@b.c");
        w.write_end_array();
        w.write_key("termsOfServiceAgreed");
        w.write_bool(true);
        w.write_end_object();
        assert_eq!(
            w.into_string(),
            r#"{"alg":"EdDSA","crv":"Ed25519","contact":["mailto:a@b.c"],"termsOfServiceAgreed":true}"#
        );
    }

    #[test]
    fn escapes() {
        let mut w = JsonWriter::new();
        w.write_string("a\"b\\c\nd\x01");
        assert_eq!(w.into_string(), "\"a\\\"b\\\\c\\nd\\u0001\"");
    }
}
