/*
 * read.rs
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

//! Response reader, client role: frames complete responses out of the
//! byte stream (lines plus any {N} literals they announce) and parses
//! them into the expression tree.

use bytes::BytesMut;

use crate::error::{Error, Result};

use super::extension::{Extension, Extensions};
use super::types::*;

/// Upper bound on one announced literal; a server asking for more is
/// hostile.
const MAX_LITERAL: usize = 64 * 1024 * 1024;

pub struct ResponseReader {
    buf: BytesMut,
}

impl ResponseReader {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Feed wire bytes; every completed response is appended to `out`.
    /// Extension triggers fire as extension-marked syntax is parsed.
    pub fn feed(
        &mut self,
        data: &[u8],
        exts: &mut Extensions,
        out: &mut Vec<Resp>,
    ) -> Result<()> {
        self.buf.extend_from_slice(data);
        while let Some(end) = frame(&self.buf)? {
            let unit = self.buf.split_to(end);
            out.push(parse_unit(&unit[..unit.len() - 2], exts)?);
        }
        Ok(())
    }
}

impl Default for ResponseReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Does this line end with a literal announcement `{N}`?
fn literal_size(line: &[u8]) -> Result<Option<usize>> {
    if !line.ends_with(b"}") {
        return Ok(None);
    }
    let Some(open) = line.iter().rposition(|&b| b == b'{') else {
        return Ok(None);
    };
    let digits = &line[open + 1..line.len() - 1];
    if digits.is_empty() || !digits.iter().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let text = std::str::from_utf8(digits).unwrap_or("");
    let n: usize = text
        .parse()
        .map_err(|_| Error::response(format!("unreasonable literal size {{{}}}", text)))?;
    if n > MAX_LITERAL {
        return Err(Error::response(format!("literal too large: {{{}}}", n)));
    }
    Ok(Some(n))
}

/// Find the end of one complete response unit (its final CRLF included),
/// or None if more bytes are needed.
fn frame(buf: &[u8]) -> Result<Option<usize>> {
    let mut pos = 0;
    loop {
        let Some(rel) = find_crlf(&buf[pos..]) else {
            return Ok(None);
        };
        let line_end = pos + rel;
        match literal_size(&buf[pos..line_end])? {
            Some(n) => {
                let continue_at = line_end + 2 + n;
                if buf.len() < continue_at {
                    return Ok(None);
                }
                pos = continue_at;
            }
            None => return Ok(Some(line_end + 2)),
        }
    }
}

struct Lexer<'a> {
    b: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(b: &'a [u8]) -> Self {
        Self { b, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.b.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {:?}", c as char)))
        }
    }

    fn err(&self, what: &str) -> Error {
        let start = self.pos.saturating_sub(40);
        let end = (self.pos + 40).min(self.b.len());
        Error::response(format!(
            "bad imap response: {} near {:?}",
            what,
            String::from_utf8_lossy(&self.b[start..end])
        ))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.b.len()
    }

    /// A run of atom-ish characters; stops at structural delimiters.
    fn atom(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b' ' | b'(' | b')' | b'[' | b']' | b'"' | b'{' | b'\r' | b'\n') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected atom"));
        }
        std::str::from_utf8(&self.b[start..self.pos]).map_err(|_| self.err("non-ascii atom"))
    }

    fn number(&mut self) -> Result<u32> {
        let atom = self.atom()?;
        atom.parse()
            .map_err(|_| self.err(&format!("expected number, got {:?}", atom)))
    }

    fn number64(&mut self) -> Result<u64> {
        let atom = self.atom()?;
        atom.parse()
            .map_err(|_| self.err(&format!("expected number, got {:?}", atom)))
    }

    fn quoted(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.err("unterminated quoted string"));
            };
            self.pos += 1;
            match c {
                b'"' => return Ok(out),
                b'\\' => {
                    let Some(esc) = self.peek() else {
                        return Err(self.err("dangling backslash"));
                    };
                    self.pos += 1;
                    out.push(esc as char);
                }
                _ => out.push(c as char),
            }
        }
    }

    fn literal(&mut self) -> Result<&'a [u8]> {
        self.expect(b'{')?;
        let start = self.pos;
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.b[start..self.pos]).unwrap_or("");
        let n: usize = digits.parse().map_err(|_| self.err("bad literal size"))?;
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;
        if self.b.len() - self.pos < n {
            return Err(self.err("literal truncated"));
        }
        let bytes = &self.b[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// quoted | literal | atom, as raw bytes.
    fn astring(&mut self) -> Result<Vec<u8>> {
        match self.peek() {
            Some(b'"') => Ok(self.quoted()?.into_bytes()),
            Some(b'{') => Ok(self.literal()?.to_vec()),
            _ => Ok(self.atom()?.as_bytes().to_vec()),
        }
    }

    fn sp(&mut self) -> Result<()> {
        self.expect(b' ')
    }

    /// Everything left, as text.
    fn rest(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.b[self.pos..]).into_owned();
        self.pos = self.b.len();
        out
    }
}

/// Parse `n1[:n2]` specs separated by commas, `*` encoding 0.
pub fn parse_seq_set(text: &str) -> Result<SeqSet> {
    if text.is_empty() {
        return Err(Error::response("empty sequence set"));
    }
    let mut specs = Vec::new();
    for part in text.split(',') {
        let parse_num = |s: &str| -> Result<u32> {
            if s == "*" {
                Ok(0)
            } else {
                s.parse()
                    .map_err(|_| Error::response(format!("bad sequence number {:?}", s)))
            }
        };
        let spec = match part.split_once(':') {
            Some((a, b)) => SeqSpec::range(parse_num(a)?, parse_num(b)?),
            None => SeqSpec::num(parse_num(part)?),
        };
        specs.push(spec);
    }
    Ok(SeqSet(specs))
}

/// Render a sequence set back to wire form.
pub fn format_seq_set(set: &SeqSet) -> String {
    let mut out = String::new();
    for (i, spec) in set.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let fmt_num = |n: u32| {
            if n == 0 {
                "*".to_string()
            } else {
                n.to_string()
            }
        };
        out.push_str(&fmt_num(spec.n1));
        if spec.n1 != spec.n2 {
            out.push(':');
            out.push_str(&fmt_num(spec.n2));
        }
    }
    out
}

fn month_number(name: &str) -> Result<u32> {
    let n = match name {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return Err(Error::response(format!("bad month {:?}", name))),
    };
    Ok(n)
}

/// `DD-Mon-YYYY HH:MM:SS +HHMM`, with the day possibly space-padded.
fn parse_time(text: &str) -> Result<ImapTime> {
    let text = text.trim_start();
    let bad = || Error::response(format!("bad internal date {:?}", text));
    let mut parts = text.split(' ');
    let date = parts.next().ok_or_else(bad)?;
    let clock = parts.next().ok_or_else(bad)?;
    let zone = parts.next().ok_or_else(bad)?;

    let mut date_parts = date.split('-');
    let day: u32 = date_parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let month = month_number(date_parts.next().ok_or_else(bad)?)?;
    let year: i32 = date_parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;

    let mut clock_parts = clock.split(':');
    let hour: u32 = clock_parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let min: u32 = clock_parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let sec: u32 = clock_parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;

    let (z_plus, zdigits) = match zone.as_bytes().first() {
        Some(b'+') => (true, &zone[1..]),
        Some(b'-') => (false, &zone[1..]),
        _ => return Err(bad()),
    };
    if zdigits.len() != 4 || !zdigits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let z_hour: u32 = zdigits[..2].parse().map_err(|_| bad())?;
    let z_min: u32 = zdigits[2..].parse().map_err(|_| bad())?;

    Ok(ImapTime {
        year,
        month,
        day,
        hour,
        min,
        sec,
        z_plus,
        z_hour,
        z_min,
    })
}

fn parse_unit(unit: &[u8], exts: &mut Extensions) -> Result<Resp> {
    let mut lx = Lexer::new(unit);

    if lx.eat(b'+') {
        lx.eat(b' ');
        return Ok(Resp::Plus(lx.rest()));
    }

    if lx.eat(b'*') {
        lx.sp()?;
        if lx.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            let n = lx.number()?;
            lx.sp()?;
            let word = lx.atom()?;
            return match word {
                "EXISTS" => Ok(Resp::Exists(n)),
                "RECENT" => Ok(Resp::Recent(n)),
                "EXPUNGE" => Ok(Resp::Expunge(n)),
                "FETCH" => parse_fetch(&mut lx, n, exts),
                other => Err(lx.err(&format!("unknown numeric response {:?}", other))),
            };
        }
        let word = lx.atom()?;
        return match word {
            "OK" => parse_status(&mut lx, None, Status::Ok, exts),
            "NO" => parse_status(&mut lx, None, Status::No, exts),
            "BAD" => parse_status(&mut lx, None, Status::Bad, exts),
            "PREAUTH" => parse_status(&mut lx, None, Status::Preauth, exts),
            "BYE" => parse_status(&mut lx, None, Status::Bye, exts),
            "CAPABILITY" => Ok(Resp::Capability(parse_atoms(&mut lx)?)),
            "ENABLED" => {
                let caps = parse_atoms(&mut lx)?;
                for cap in &caps {
                    match cap.to_ascii_uppercase().as_str() {
                        "CONDSTORE" => exts.trigger(Extension::Condstore)?,
                        "QRESYNC" => exts.trigger(Extension::Qresync)?,
                        _ => {}
                    }
                }
                Ok(Resp::Enabled(caps))
            }
            "LIST" => Ok(Resp::List(parse_list(&mut lx)?)),
            "LSUB" => Ok(Resp::Lsub(parse_list(&mut lx)?)),
            "STATUS" => parse_status_data(&mut lx, exts),
            "FLAGS" => {
                lx.sp()?;
                let words = parse_paren_atoms(&mut lx)?;
                Ok(Resp::Flags(build_flags(&words)?))
            }
            "SEARCH" => {
                let mut nums = Vec::new();
                while !lx.at_end() {
                    lx.sp()?;
                    nums.push(lx.number()?);
                }
                Ok(Resp::Search(nums))
            }
            other => Err(lx.err(&format!("unknown response type {:?}", other))),
        };
    }

    // tagged status-type response
    let tag = lx.atom()?.to_string();
    lx.sp()?;
    let word = lx.atom()?;
    let status = match word {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        // not all responses are allowed to be tagged
        other => return Err(lx.err(&format!("invalid tagged {:?} response", other))),
    };
    parse_status(&mut lx, Some(tag), status, exts)
}

fn parse_atoms(lx: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    while !lx.at_end() {
        lx.sp()?;
        out.push(lx.atom()?.to_string());
    }
    Ok(out)
}

fn parse_paren_atoms(lx: &mut Lexer<'_>) -> Result<Vec<String>> {
    lx.expect(b'(')?;
    let mut out = Vec::new();
    loop {
        if lx.eat(b')') {
            return Ok(out);
        }
        if !out.is_empty() {
            lx.sp()?;
        }
        if lx.eat(b')') {
            return Ok(out);
        }
        // a permflags list may contain `\*`
        if lx.eat(b'\\') {
            if lx.eat(b'*') {
                out.push("\\*".to_string());
            } else {
                out.push(format!("\\{}", lx.atom()?));
            }
        } else {
            out.push(lx.atom()?.to_string());
        }
    }
}

fn build_flags(words: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    for word in words {
        match word.strip_prefix('\\') {
            Some(rest) => match rest.to_ascii_lowercase().as_str() {
                "answered" => flags.answered = true,
                "flagged" => flags.flagged = true,
                "deleted" => flags.deleted = true,
                "seen" => flags.seen = true,
                "draft" => flags.draft = true,
                _ => flags.extensions.push(rest.to_string()),
            },
            None => flags.keywords.push(word.clone()),
        }
    }
    Ok(flags)
}

fn build_fetch_flags(words: &[String]) -> Result<FetchFlags> {
    let mut flags = FetchFlags::default();
    for word in words {
        match word.strip_prefix('\\') {
            Some(rest) => match rest.to_ascii_lowercase().as_str() {
                "answered" => flags.answered = true,
                "flagged" => flags.flagged = true,
                "deleted" => flags.deleted = true,
                "seen" => flags.seen = true,
                "draft" => flags.draft = true,
                "recent" => flags.recent = true,
                _ => flags.extensions.push(rest.to_string()),
            },
            None => flags.keywords.push(word.clone()),
        }
    }
    Ok(flags)
}

fn build_perm_flags(words: &[String]) -> Result<PermFlags> {
    let mut flags = PermFlags::default();
    for word in words {
        match word.strip_prefix('\\') {
            Some("*") => flags.asterisk = true,
            Some(rest) => match rest.to_ascii_lowercase().as_str() {
                "answered" => flags.answered = true,
                "flagged" => flags.flagged = true,
                "deleted" => flags.deleted = true,
                "seen" => flags.seen = true,
                "draft" => flags.draft = true,
                _ => flags.extensions.push(rest.to_string()),
            },
            None => flags.keywords.push(word.clone()),
        }
    }
    Ok(flags)
}

fn parse_status(
    lx: &mut Lexer<'_>,
    tag: Option<String>,
    status: Status,
    exts: &mut Extensions,
) -> Result<Resp> {
    let mut code = None;
    if !lx.at_end() {
        lx.sp()?;
        if lx.peek() == Some(b'[') {
            code = Some(parse_code(lx, exts)?);
            lx.eat(b' ');
        }
    }
    let text = lx.rest();
    Ok(Resp::StatusType(StatusResp {
        tag,
        status,
        code,
        text,
    }))
}

fn parse_code(lx: &mut Lexer<'_>, exts: &mut Extensions) -> Result<StatusCode> {
    lx.expect(b'[')?;
    let name = lx.atom()?.to_string();
    let code = match name.as_str() {
        "ALERT" => StatusCode::Alert,
        "PARSE" => StatusCode::Parse,
        "READ-ONLY" => StatusCode::ReadOnly,
        "READ-WRITE" => StatusCode::ReadWrite,
        "TRYCREATE" => StatusCode::TryCreate,
        "CAPABILITY" => {
            let mut caps = Vec::new();
            while lx.peek() == Some(b' ') {
                lx.sp()?;
                caps.push(lx.atom()?.to_string());
            }
            StatusCode::Capability(caps)
        }
        "PERMANENTFLAGS" => {
            lx.sp()?;
            let words = parse_paren_atoms(lx)?;
            StatusCode::PermanentFlags(build_perm_flags(&words)?)
        }
        "UIDNEXT" => {
            lx.sp()?;
            StatusCode::UidNext(lx.number()?)
        }
        "UIDVALIDITY" => {
            lx.sp()?;
            StatusCode::UidValidity(lx.number()?)
        }
        "UNSEEN" => {
            lx.sp()?;
            StatusCode::Unseen(lx.number()?)
        }
        "NOMODSEQ" => {
            exts.trigger(Extension::Condstore)?;
            StatusCode::NoModSeq
        }
        "HIGHESTMODSEQ" => {
            exts.trigger(Extension::Condstore)?;
            lx.sp()?;
            StatusCode::HiModSeq(lx.number64()?)
        }
        "MODIFIED" => {
            exts.trigger(Extension::Condstore)?;
            lx.sp()?;
            StatusCode::Modified(parse_seq_set(lx.atom()?)?)
        }
        "APPENDUID" => {
            exts.trigger(Extension::UidPlus)?;
            lx.sp()?;
            let uidvld = lx.number()?;
            lx.sp()?;
            let uid = lx.number()?;
            StatusCode::AppendUid { uidvld, uid }
        }
        "COPYUID" => {
            exts.trigger(Extension::UidPlus)?;
            lx.sp()?;
            let uidvld = lx.number()?;
            lx.sp()?;
            let src = parse_seq_set(lx.atom()?)?;
            lx.sp()?;
            let dst = parse_seq_set(lx.atom()?)?;
            StatusCode::CopyUid { uidvld, src, dst }
        }
        "UIDNOTSTICKY" => {
            exts.trigger(Extension::UidPlus)?;
            StatusCode::UidNotSticky
        }
        _ => {
            // unrecognized atom code with optional argument text
            let mut arg = String::new();
            while lx.peek().map(|c| c != b']').unwrap_or(false) {
                arg.push(lx.peek().map(|c| c as char).unwrap_or(' '));
                lx.pos += 1;
            }
            let arg = arg.trim().to_string();
            let arg = if arg.is_empty() { None } else { Some(arg) };
            StatusCode::Atom { name, arg }
        }
    };
    lx.expect(b']')?;
    Ok(code)
}

fn parse_list(lx: &mut Lexer<'_>) -> Result<ListResp> {
    lx.sp()?;
    let words = parse_paren_atoms(lx)?;
    let mut mflags = MailboxFlags::default();
    for word in &words {
        match word.strip_prefix('\\') {
            Some(rest) => match rest.to_ascii_lowercase().as_str() {
                "noinferiors" => mflags.noinferiors = true,
                "noselect" => mflags.selectable = Selectable::NoSelect,
                "marked" => mflags.selectable = Selectable::Marked,
                "unmarked" => mflags.selectable = Selectable::Unmarked,
                _ => mflags.extensions.push(rest.to_string()),
            },
            None => return Err(lx.err("bare atom in mailbox flags")),
        }
    }

    lx.sp()?;
    let sep = if lx.peek() == Some(b'"') {
        let q = lx.quoted()?;
        q.chars().next()
    } else {
        let word = lx.atom()?;
        if !word.eq_ignore_ascii_case("NIL") {
            return Err(lx.err("bad hierarchy delimiter"));
        }
        None
    };

    lx.sp()?;
    let name_bytes = lx.astring()?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    Ok(ListResp {
        mflags,
        sep,
        mailbox: Mailbox::new(name),
    })
}

fn parse_status_data(lx: &mut Lexer<'_>, _exts: &mut Extensions) -> Result<Resp> {
    lx.sp()?;
    let name_bytes = lx.astring()?;
    let mailbox = Mailbox::new(String::from_utf8_lossy(&name_bytes).into_owned());
    lx.sp()?;
    lx.expect(b'(')?;
    let mut values = StatusValues::default();
    loop {
        if lx.eat(b')') {
            break;
        }
        if lx.peek() == Some(b' ') {
            lx.sp()?;
        }
        if lx.eat(b')') {
            break;
        }
        let attr = lx.atom()?.to_string();
        lx.sp()?;
        match attr.as_str() {
            "MESSAGES" => values.messages = Some(lx.number()?),
            "RECENT" => values.recent = Some(lx.number()?),
            "UIDNEXT" => values.uidnext = Some(lx.number()?),
            "UIDVALIDITY" => values.uidvld = Some(lx.number()?),
            "UNSEEN" => values.unseen = Some(lx.number()?),
            "HIGHESTMODSEQ" => values.himodseq = Some(lx.number64()?),
            other => return Err(lx.err(&format!("unknown status attribute {:?}", other))),
        }
    }
    Ok(Resp::Status(StatusData { mailbox, values }))
}

fn parse_fetch(lx: &mut Lexer<'_>, seq: u32, exts: &mut Extensions) -> Result<Resp> {
    lx.sp()?;
    lx.expect(b'(')?;
    let mut fetch = FetchResp {
        seq,
        ..Default::default()
    };
    loop {
        if lx.eat(b')') {
            break;
        }
        if lx.peek() == Some(b' ') {
            lx.sp()?;
        }
        if lx.eat(b')') {
            break;
        }
        let item = lx.atom()?.to_string();
        match item.as_str() {
            "FLAGS" => {
                lx.sp()?;
                let words = parse_paren_atoms(lx)?;
                fetch.flags = Some(build_fetch_flags(&words)?);
            }
            "UID" => {
                lx.sp()?;
                fetch.uid = Some(lx.number()?);
            }
            "INTERNALDATE" => {
                lx.sp()?;
                let quoted = lx.quoted()?;
                fetch.intdate = Some(parse_time(&quoted)?);
            }
            "RFC822.SIZE" => {
                lx.sp()?;
                fetch.size = Some(lx.number()?);
            }
            "RFC822" => {
                lx.sp()?;
                fetch.rfc822 = Some(lx.astring()?);
            }
            "MODSEQ" => {
                exts.trigger(Extension::Condstore)?;
                lx.sp()?;
                lx.expect(b'(')?;
                fetch.modseq = Some(lx.number64()?);
                lx.expect(b')')?;
            }
            "BODY" => {
                // BODY[section]<partial> content; the section itself is
                // not retained, only the payload
                lx.expect(b'[')?;
                while lx.peek().map(|c| c != b']').unwrap_or(false) {
                    lx.pos += 1;
                }
                lx.expect(b']')?;
                if lx.eat(b'<') {
                    while lx.peek().map(|c| c != b'>').unwrap_or(false) {
                        lx.pos += 1;
                    }
                    lx.expect(b'>')?;
                }
                lx.sp()?;
                fetch.body = Some(lx.astring()?);
            }
            other => return Err(lx.err(&format!("unknown fetch item {:?}", other))),
        }
    }
    Ok(Resp::Fetch(fetch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(input: &[u8]) -> Result<Vec<Resp>> {
        let mut reader = ResponseReader::new();
        let mut exts = Extensions {
            uidplus: crate::protocol::imap::extension::ExtensionState::Off,
            enable: crate::protocol::imap::extension::ExtensionState::Off,
            condstore: crate::protocol::imap::extension::ExtensionState::Off,
            qresync: crate::protocol::imap::extension::ExtensionState::Off,
        };
        let mut out = Vec::new();
        reader.feed(input, &mut exts, &mut out)?;
        Ok(out)
    }

    #[test]
    fn greeting_with_capability_code() {
        let out = feed_all(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] server ready\r\n").unwrap();
        assert_eq!(out.len(), 1);
        let Resp::StatusType(st) = &out[0] else {
            panic!("not a status response");
        };
        assert_eq!(st.tag, None);
        assert_eq!(st.status, Status::Ok);
        assert_eq!(
            st.code,
            Some(StatusCode::Capability(vec![
                "IMAP4rev1".into(),
                "UIDPLUS".into()
            ]))
        );
        assert_eq!(st.text, "server ready");
    }

    #[test]
    fn tagged_no_with_atom_code() {
        let out = feed_all(b"t3 NO [NOPERM] not allowed\r\n").unwrap();
        let Resp::StatusType(st) = &out[0] else {
            panic!()
        };
        assert_eq!(st.tag.as_deref(), Some("t3"));
        assert_eq!(st.status, Status::No);
        assert_eq!(
            st.code,
            Some(StatusCode::Atom {
                name: "NOPERM".into(),
                arg: None
            })
        );
    }

    #[test]
    fn list_responses() {
        let out = feed_all(
            b"* LIST (\\Noselect \\HasChildren) \"/\" ~/Mail/foo\r\n\
              * LIST () NIL {11}\r\nfunny\"quote\r\n",
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        let Resp::List(first) = &out[0] else { panic!() };
        assert_eq!(first.mflags.selectable, Selectable::NoSelect);
        assert_eq!(first.mflags.extensions, vec!["HasChildren".to_string()]);
        assert_eq!(first.sep, Some('/'));
        assert_eq!(first.mailbox.name(), "~/Mail/foo");
        let Resp::List(second) = &out[1] else { panic!() };
        assert_eq!(second.sep, None);
        assert_eq!(second.mailbox.name(), "funny\"quote");
    }

    #[test]
    fn seq_set_round_trip() {
        for text in ["1", "*", "1:*", "4,5:7,9,*:12", "3:1"] {
            let set = parse_seq_set(text).unwrap();
            assert_eq!(format_seq_set(&set), text, "round-trip {}", text);
        }
        assert!(parse_seq_set("").is_err());
        assert!(parse_seq_set("1,,2").is_err());
        assert!(parse_seq_set("a:b").is_err());
    }

    #[test]
    fn fetch_with_literal_split_arbitrarily() {
        let input: &[u8] = b"* 12 FETCH (UID 457 FLAGS (\\Seen custom) RFC822.SIZE 17 \
INTERNALDATE \"05-Jan-2026 10:20:30 +0100\" BODY[] {17}\r\nSubject: x\r\n\r\nhey)\r\n";
        for split in 1..input.len() {
            let mut reader = ResponseReader::new();
            let mut exts = Extensions::default();
            let mut out = Vec::new();
            reader.feed(&input[..split], &mut exts, &mut out).unwrap();
            reader.feed(&input[split..], &mut exts, &mut out).unwrap();
            assert_eq!(out.len(), 1, "split at {}", split);
            let Resp::Fetch(f) = &out[0] else { panic!() };
            assert_eq!(f.seq, 12);
            assert_eq!(f.uid, Some(457));
            assert_eq!(f.size, Some(17));
            let flags = f.flags.as_ref().unwrap();
            assert!(flags.seen);
            assert_eq!(flags.keywords, vec!["custom".to_string()]);
            let date = f.intdate.unwrap();
            assert_eq!((date.day, date.month, date.year), (5, 1, 2026));
            assert!(date.z_plus);
            assert_eq!(f.body.as_deref(), Some(&b"Subject: x\r\n\r\nhey"[..]));
        }
    }

    #[test]
    fn numeric_untagged() {
        let out = feed_all(b"* 23 EXISTS\r\n* 1 RECENT\r\n* 4 EXPUNGE\r\n").unwrap();
        assert_eq!(
            out,
            vec![Resp::Exists(23), Resp::Recent(1), Resp::Expunge(4)]
        );
    }

    #[test]
    fn search_and_status() {
        let out = feed_all(
            b"* SEARCH 2 3 5\r\n* STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292)\r\n",
        )
        .unwrap();
        assert_eq!(out[0], Resp::Search(vec![2, 3, 5]));
        let Resp::Status(st) = &out[1] else { panic!() };
        assert_eq!(st.mailbox.name(), "blurdybloop");
        assert_eq!(st.values.messages, Some(231));
        assert_eq!(st.values.uidnext, Some(44292));
        assert_eq!(st.values.unseen, None);
    }

    #[test]
    fn extension_codes_trigger() {
        let mut reader = ResponseReader::new();
        let mut exts = Extensions::default();
        exts.condstore = crate::protocol::imap::extension::ExtensionState::Off;
        let mut out = Vec::new();
        reader
            .feed(
                b"* OK [HIGHESTMODSEQ 715194045007] ok\r\n",
                &mut exts,
                &mut out,
            )
            .unwrap();
        assert_eq!(
            exts.condstore,
            crate::protocol::imap::extension::ExtensionState::On
        );
        // disabled extension syntax is rejected outright
        let mut disabled = Extensions::default();
        let e = reader
            .feed(b"* OK [NOMODSEQ] ok\r\n", &mut disabled, &mut out)
            .unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
    }

    #[test]
    fn continuation_and_bad_tagged_word() {
        let out = feed_all(b"+ go ahead\r\n").unwrap();
        assert_eq!(out[0], Resp::Plus("go ahead".into()));
        assert!(feed_all(b"t1 FETCH nope\r\n").is_err());
    }
}
