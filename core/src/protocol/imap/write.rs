/*
 * write.rs
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

//! Re-entrant command marshaller. Unlike the HTTP request serializer,
//! `skip` here counts *input* bytes: every pass re-walks the tree and
//! skips what an earlier pass already emitted, so a command of any size
//! can be written through fixed-size buffers.

use crate::error::{Error, Result};

use super::extension::{Extension, Extensions};
use super::types::*;

/// Marshal one pass of the command into `out`, bounded by `cap`.
/// `skip` carries resumption state between passes: it must start at 0
/// and be reset to 0 once the returned `want` reaches 0.
pub fn write_cmd(
    cmd: &Cmd,
    out: &mut Vec<u8>,
    cap: usize,
    skip: &mut usize,
    exts: &Extensions,
) -> Result<usize> {
    let mut sf = SkipFill {
        out,
        cap,
        skip: *skip,
        passed: 0,
        want: 0,
        exts,
    };
    sf.cmd(cmd)?;
    if sf.want > 0 && sf.passed == *skip {
        return Err(Error::internal(format!(
            "failed to print anything from {} command at skip={}",
            cmd.arg.name(),
            skip
        )));
    }
    *skip = sf.passed;
    Ok(sf.want)
}

struct SkipFill<'a> {
    out: &'a mut Vec<u8>,
    cap: usize,
    skip: usize,
    passed: usize,
    want: usize,
    exts: &'a Extensions,
}

#[derive(PartialEq, Eq)]
enum StringForm {
    Raw,
    Quoted,
    Literal,
}

fn classify_astring(val: &[u8]) -> StringForm {
    // long strings become literals
    if val.len() > 72 {
        return StringForm::Literal;
    }
    // empty strings become qstrings
    if val.is_empty() {
        return StringForm::Quoted;
    }
    let mut maybe_atom = true;
    for &c in val {
        match c {
            // anything with non-quotable chars must immediately be literal
            b'\r' | b'\n' | b'\0' => return StringForm::Literal,
            // anything with non-atom chars must be a quoted string
            b'(' | b')' | b'{' | b' ' | b'%' | b'*' | b'"' | b'\\' => maybe_atom = false,
            // resp-specials ']' is allowed in ASTRING-CHAR
            _ => {
                if c < 32 || c == 127 {
                    maybe_atom = false;
                }
            }
        }
    }
    if maybe_atom {
        StringForm::Raw
    } else {
        StringForm::Quoted
    }
}

#[allow(dead_code)]
fn classify_string(val: &[u8]) -> StringForm {
    if val.len() > 72 {
        return StringForm::Literal;
    }
    if val.iter().any(|&c| matches!(c, b'\r' | b'\n' | b'\0')) {
        return StringForm::Literal;
    }
    StringForm::Quoted
}

impl<'a> SkipFill<'a> {
    fn space(&self) -> usize {
        self.cap.saturating_sub(self.out.len())
    }

    /// The base skip_fill: skip input bytes already passed, then fill
    /// the buffer with what remains.
    fn raw(&mut self, input: &[u8]) {
        if self.want > 0 {
            self.want += input.len();
            return;
        }
        let skip = self.skip.min(input.len());
        self.skip -= skip;
        self.passed += skip;

        let end = (skip + self.space()).min(input.len());
        self.out.extend_from_slice(&input[skip..end]);
        self.passed += end - skip;

        if end < input.len() {
            self.want += input.len() - end;
        }
    }

    /// Quoted-string body with escapes; escape pairs never split across
    /// buffers. Validation happens in the classifiers.
    fn quote_esc(&mut self, input: &[u8]) {
        let skip = self.skip.min(input.len());
        self.skip -= skip;
        self.passed += skip;

        for &c in &input[skip..] {
            match c {
                b'\\' | b'"' => {
                    if self.want > 0 || self.out.len() + 2 > self.cap {
                        self.want += 2;
                    } else {
                        self.out.push(b'\\');
                        self.out.push(c);
                        self.passed += 1;
                    }
                }
                _ => {
                    if self.want > 0 || self.out.len() >= self.cap {
                        self.want += 1;
                    } else {
                        self.out.push(c);
                        self.passed += 1;
                    }
                }
            }
        }
    }

    fn quoted(&mut self, input: &[u8]) {
        self.raw(b"\"");
        self.quote_esc(input);
        self.raw(b"\"");
    }

    fn literal(&mut self, input: &[u8]) {
        let header = format!("{{{}}}\r\n", input.len());
        self.raw(header.as_bytes());
        self.raw(input);
    }

    fn astring(&mut self, input: &[u8]) {
        match classify_astring(input) {
            StringForm::Raw => self.raw(input),
            StringForm::Quoted => self.quoted(input),
            StringForm::Literal => self.literal(input),
        }
    }

    /// Like astring but never bare; kept for the forms that require a
    /// real string even when the content would pass as an atom.
    #[allow(dead_code)]
    fn string(&mut self, input: &[u8]) {
        match classify_string(input) {
            StringForm::Quoted => self.quoted(input),
            _ => self.literal(input),
        }
    }

    fn mailbox(&mut self, m: &Mailbox) {
        if m.inbox {
            self.raw(b"INBOX");
        } else {
            self.astring(m.name.as_bytes());
        }
    }

    fn atom_check(input: &[u8], what: &str, extra_invalid: &[u8]) -> Result<()> {
        for &c in input {
            let invalid = matches!(c, b'(' | b')' | b'{' | b' ' | b'%' | b'*' | b'"' | b'\\' | b']')
                || extra_invalid.contains(&c)
                || c < 32
                || c == 127;
            if invalid {
                return Err(Error::param(format!(
                    "unable to print {:?} in {}",
                    c as char, what
                )));
            }
        }
        if input.is_empty() {
            return Err(Error::param(format!("empty {}", what)));
        }
        Ok(())
    }

    fn tag(&mut self, input: &[u8]) -> Result<()> {
        Self::atom_check(input, "tag", b"+")?;
        self.raw(input);
        Ok(())
    }

    fn atom(&mut self, input: &[u8]) -> Result<()> {
        Self::atom_check(input, "atom", b"")?;
        self.raw(input);
        Ok(())
    }

    fn num(&mut self, n: u32) {
        self.raw(n.to_string().as_bytes());
    }

    fn nznum(&mut self, n: u32) -> Result<()> {
        if n == 0 {
            return Err(Error::param("invalid zero in non-zero number"));
        }
        self.num(n);
        Ok(())
    }

    fn modseqnum(&mut self, n: u64) -> Result<()> {
        // 63-bit number
        if n > 0x7fff_ffff_ffff_ffff {
            return Err(Error::param("modseqnum too big"));
        }
        self.raw(n.to_string().as_bytes());
        Ok(())
    }

    fn nzmodseqnum(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(Error::param("invalid zero in non-zero number"));
        }
        self.modseqnum(n)
    }

    fn seq_set(&mut self, set: &SeqSet) -> Result<()> {
        if set.0.is_empty() {
            return Err(Error::param("empty sequence set"));
        }
        for (i, spec) in set.0.iter().enumerate() {
            if i > 0 {
                self.raw(b",");
            }
            if spec.n1 == 0 {
                self.raw(b"*");
            } else {
                self.num(spec.n1);
            }
            if spec.n1 != spec.n2 {
                self.raw(b":");
                if spec.n2 == 0 {
                    self.raw(b"*");
                } else {
                    self.num(spec.n2);
                }
            }
        }
        Ok(())
    }

    fn validate_date(t: &ImapTime) -> Result<()> {
        let pass = (999..=9999).contains(&t.year)
            && (1..=12).contains(&t.month)
            && (1..=31).contains(&t.day);
        if !pass {
            return Err(Error::param("invalid imap date"));
        }
        Ok(())
    }

    fn validate_time(t: &ImapTime) -> Result<()> {
        Self::validate_date(t)?;
        let pass = t.hour <= 23 && t.min <= 59 && t.sec <= 59 && t.z_hour <= 24 && t.z_min <= 59;
        if !pass {
            return Err(Error::param("invalid imap time"));
        }
        Ok(())
    }

    fn time(&mut self, t: &ImapTime) -> Result<()> {
        Self::validate_time(t)?;
        let buffer = format!(
            "\"{:>2}-{}-{} {:02}:{:02}:{:02} {}{:02}{:02}\"",
            t.day,
            month_name(t.month),
            t.year,
            t.hour,
            t.min,
            t.sec,
            if t.z_plus { "+" } else { "-" },
            t.z_hour,
            t.z_min,
        );
        self.raw(buffer.as_bytes());
        Ok(())
    }

    fn search_date(&mut self, t: &ImapTime) -> Result<()> {
        Self::validate_date(t)?;
        let buffer = format!("{}-{}-{}", t.day, month_name(t.month), t.year);
        self.raw(buffer.as_bytes());
        Ok(())
    }

    fn flags(&mut self, flags: &Flags) -> Result<()> {
        let mut sp = Lead::new();
        if flags.answered {
            sp.sep(self);
            self.raw(b"\\Answered");
        }
        if flags.flagged {
            sp.sep(self);
            self.raw(b"\\Flagged");
        }
        if flags.deleted {
            sp.sep(self);
            self.raw(b"\\Deleted");
        }
        if flags.seen {
            sp.sep(self);
            self.raw(b"\\Seen");
        }
        if flags.draft {
            sp.sep(self);
            self.raw(b"\\Draft");
        }
        for kw in &flags.keywords {
            sp.sep(self);
            self.atom(kw.as_bytes())?;
        }
        for ext in &flags.extensions {
            sp.sep(self);
            self.raw(b"\\");
            self.atom(ext.as_bytes())?;
        }
        Ok(())
    }

    fn select_params(&mut self, params: &[SelectParam]) -> Result<()> {
        if params.is_empty() {
            return Ok(());
        }
        self.raw(b" (");
        let mut sp = Lead::new();
        for p in params {
            sp.sep(self);
            match p {
                SelectParam::Condstore => {
                    self.exts.assert_on(Extension::Condstore)?;
                    self.raw(b"CONDSTORE");
                }
                SelectParam::Qresync { uidvld, modseq, seq } => {
                    self.exts.assert_on(Extension::Qresync)?;
                    self.raw(b"QRESYNC (");
                    self.nznum(*uidvld)?;
                    self.raw(b" ");
                    self.nzmodseqnum(*modseq)?;
                    if let Some(seq) = seq {
                        self.raw(b" ");
                        self.seq_set(seq)?;
                    }
                    self.raw(b")");
                }
            }
        }
        self.raw(b")");
        Ok(())
    }

    fn status_cmd(&mut self, mailbox: &Mailbox, attrs: &StatusAttrs) -> Result<()> {
        self.raw(b"STATUS ");
        self.mailbox(mailbox);
        self.raw(b" (");
        let mut sp = Lead::new();
        if attrs.messages {
            sp.sep(self);
            self.raw(b"MESSAGES");
        }
        if attrs.recent {
            sp.sep(self);
            self.raw(b"RECENT");
        }
        if attrs.uidnext {
            sp.sep(self);
            self.raw(b"UIDNEXT");
        }
        if attrs.uidvld {
            sp.sep(self);
            self.raw(b"UIDVALIDITY");
        }
        if attrs.unseen {
            sp.sep(self);
            self.raw(b"UNSEEN");
        }
        if attrs.himodseq {
            self.exts.assert_on(Extension::Condstore)?;
            sp.sep(self);
            self.raw(b"HIGHESTMODSEQ");
        }
        self.raw(b")");
        Ok(())
    }

    fn search_key(&mut self, key: &SearchKey) -> Result<()> {
        match key {
            SearchKey::All => self.raw(b"ALL"),
            SearchKey::Answered => self.raw(b"ANSWERED"),
            SearchKey::Deleted => self.raw(b"DELETED"),
            SearchKey::Flagged => self.raw(b"FLAGGED"),
            SearchKey::New => self.raw(b"NEW"),
            SearchKey::Old => self.raw(b"OLD"),
            SearchKey::Recent => self.raw(b"RECENT"),
            SearchKey::Seen => self.raw(b"SEEN"),
            SearchKey::Draft => self.raw(b"DRAFT"),
            SearchKey::Unanswered => self.raw(b"UNANSWERED"),
            SearchKey::Undeleted => self.raw(b"UNDELETED"),
            SearchKey::Unflagged => self.raw(b"UNFLAGGED"),
            SearchKey::Unseen => self.raw(b"UNSEEN"),
            SearchKey::Undraft => self.raw(b"UNDRAFT"),
            SearchKey::Subject(s) => {
                self.raw(b"SUBJECT ");
                self.astring(s.as_bytes());
            }
            SearchKey::Bcc(s) => {
                self.raw(b"BCC ");
                self.astring(s.as_bytes());
            }
            SearchKey::Body(s) => {
                self.raw(b"BODY ");
                self.astring(s.as_bytes());
            }
            SearchKey::Cc(s) => {
                self.raw(b"CC ");
                self.astring(s.as_bytes());
            }
            SearchKey::From(s) => {
                self.raw(b"FROM ");
                self.astring(s.as_bytes());
            }
            SearchKey::To(s) => {
                self.raw(b"TO ");
                self.astring(s.as_bytes());
            }
            SearchKey::Text(s) => {
                self.raw(b"TEXT ");
                self.astring(s.as_bytes());
            }
            SearchKey::Keyword(s) => {
                self.raw(b"KEYWORD ");
                self.atom(s.as_bytes())?;
            }
            SearchKey::Unkeyword(s) => {
                self.raw(b"UNKEYWORD ");
                self.atom(s.as_bytes())?;
            }
            SearchKey::Header(name, value) => {
                self.raw(b"HEADER ");
                self.astring(name.as_bytes());
                self.raw(b" ");
                self.astring(value.as_bytes());
            }
            SearchKey::Before(t) => {
                self.raw(b"BEFORE ");
                self.search_date(t)?;
            }
            SearchKey::On(t) => {
                self.raw(b"ON ");
                self.search_date(t)?;
            }
            SearchKey::Since(t) => {
                self.raw(b"SINCE ");
                self.search_date(t)?;
            }
            SearchKey::SentBefore(t) => {
                self.raw(b"SENTBEFORE ");
                self.search_date(t)?;
            }
            SearchKey::SentOn(t) => {
                self.raw(b"SENTON ");
                self.search_date(t)?;
            }
            SearchKey::SentSince(t) => {
                self.raw(b"SENTSINCE ");
                self.search_date(t)?;
            }
            SearchKey::Larger(n) => {
                self.raw(b"LARGER ");
                self.num(*n);
            }
            SearchKey::Smaller(n) => {
                self.raw(b"SMALLER ");
                self.num(*n);
            }
            SearchKey::Uid(set) => {
                self.raw(b"UID ");
                self.seq_set(set)?;
            }
            SearchKey::Seq(set) => self.seq_set(set)?,
            SearchKey::Not(k) => {
                self.raw(b"NOT ");
                self.search_key(k)?;
            }
            SearchKey::Group(k) => {
                self.raw(b"(");
                self.search_key(k)?;
                self.raw(b")");
            }
            SearchKey::Or(a, b) => {
                self.raw(b"OR ");
                self.search_key(a)?;
                self.raw(b" ");
                self.search_key(b)?;
            }
            SearchKey::And(a, b) => {
                self.search_key(a)?;
                self.raw(b" ");
                self.search_key(b)?;
            }
            SearchKey::ModSeq(n) => {
                self.exts.assert_on(Extension::Condstore)?;
                self.raw(b"MODSEQ ");
                self.modseqnum(*n)?;
            }
        }
        Ok(())
    }

    fn section(&mut self, sect: &Section) -> Result<()> {
        let mut dot = false;
        for part in &sect.part {
            if dot {
                self.raw(b".");
            }
            self.nznum(*part)?;
            dot = true;
        }
        if let Some(text) = &sect.text {
            if dot {
                self.raw(b".");
            }
            match text {
                SectionText::Mime => self.raw(b"MIME"),
                SectionText::Text => self.raw(b"TEXT"),
                SectionText::Header => self.raw(b"HEADER"),
                SectionText::HeaderFields(fields) => {
                    self.raw(b"HEADER.FIELDS (");
                    let mut sp = Lead::new();
                    for f in fields {
                        sp.sep(self);
                        self.astring(f.as_bytes());
                    }
                    self.raw(b")");
                }
                SectionText::HeaderFieldsNot(fields) => {
                    self.raw(b"HEADER.FIELDS.NOT (");
                    let mut sp = Lead::new();
                    for f in fields {
                        sp.sep(self);
                        self.astring(f.as_bytes());
                    }
                    self.raw(b")");
                }
            }
        }
        Ok(())
    }

    fn fetch_attrs(&mut self, attrs: &FetchAttrs) -> Result<()> {
        self.raw(b"(");
        let mut sp = Lead::new();
        if attrs.envelope {
            sp.sep(self);
            self.raw(b"ENVELOPE");
        }
        if attrs.flags {
            sp.sep(self);
            self.raw(b"FLAGS");
        }
        if attrs.intdate {
            sp.sep(self);
            self.raw(b"INTERNALDATE");
        }
        if attrs.uid {
            sp.sep(self);
            self.raw(b"UID");
        }
        if attrs.rfc822 {
            sp.sep(self);
            self.raw(b"RFC822");
        }
        if attrs.rfc822_header {
            sp.sep(self);
            self.raw(b"RFC822.HEADER");
        }
        if attrs.rfc822_size {
            sp.sep(self);
            self.raw(b"RFC822.SIZE");
        }
        if attrs.rfc822_text {
            sp.sep(self);
            self.raw(b"RFC822.TEXT");
        }
        if attrs.body {
            sp.sep(self);
            self.raw(b"BODY");
        }
        if attrs.bodystruct {
            sp.sep(self);
            self.raw(b"BODYSTRUCTURE");
        }
        if attrs.modseq {
            self.exts.assert_on(Extension::Condstore)?;
            sp.sep(self);
            self.raw(b"MODSEQ");
        }
        for extra in &attrs.extras {
            sp.sep(self);
            if extra.peek {
                self.raw(b"BODY.PEEK[");
            } else {
                self.raw(b"BODY[");
            }
            if let Some(sect) = &extra.sect {
                self.section(sect)?;
            }
            self.raw(b"]");
            if let Some((start, len)) = extra.partial {
                let partial = format!("<{}.{}>", start, len);
                self.raw(partial.as_bytes());
            }
        }
        self.raw(b")");
        Ok(())
    }

    fn fetch_mods(&mut self, mods: &[FetchMod]) -> Result<()> {
        self.raw(b"(");
        let mut sp = Lead::new();
        for m in mods {
            sp.sep(self);
            match m {
                FetchMod::ChangedSince(n) => {
                    self.exts.assert_on(Extension::Condstore)?;
                    self.raw(b"CHANGEDSINCE ");
                    self.nzmodseqnum(*n)?;
                }
                FetchMod::Vanished => {
                    self.exts.assert_on(Extension::Qresync)?;
                    self.raw(b"VANISHED");
                }
            }
        }
        self.raw(b")");
        Ok(())
    }

    fn store_mods(&mut self, mods: &[StoreMod]) -> Result<()> {
        self.raw(b"(");
        let mut sp = Lead::new();
        for m in mods {
            sp.sep(self);
            match m {
                StoreMod::UnchangedSince(n) => {
                    self.exts.assert_on(Extension::Condstore)?;
                    self.raw(b"UNCHANGEDSINCE ");
                    self.nzmodseqnum(*n)?;
                }
            }
        }
        self.raw(b")");
        Ok(())
    }

    fn cmd(&mut self, cmd: &Cmd) -> Result<()> {
        self.tag(cmd.tag.as_bytes())?;
        self.raw(b" ");

        match &cmd.arg {
            CmdArg::Capa => self.raw(b"CAPABILITY"),
            CmdArg::Starttls => self.raw(b"STARTTLS"),
            CmdArg::Auth(mech) => {
                self.raw(b"AUTHENTICATE ");
                self.atom(mech.as_bytes())?;
            }
            CmdArg::Login { user, pass } => {
                self.raw(b"LOGIN ");
                self.astring(user.as_bytes());
                self.raw(b" ");
                self.astring(pass.as_bytes());
            }
            CmdArg::Select { mailbox, params } => {
                self.raw(b"SELECT ");
                self.mailbox(mailbox);
                self.select_params(params)?;
            }
            CmdArg::Examine { mailbox, params } => {
                self.raw(b"EXAMINE ");
                self.mailbox(mailbox);
                self.select_params(params)?;
            }
            CmdArg::Create(m) => {
                self.raw(b"CREATE ");
                self.mailbox(m);
            }
            CmdArg::Delete(m) => {
                self.raw(b"DELETE ");
                self.mailbox(m);
            }
            CmdArg::Rename { old, new } => {
                self.raw(b"RENAME ");
                self.mailbox(old);
                self.raw(b" ");
                self.mailbox(new);
            }
            CmdArg::Sub(m) => {
                self.raw(b"SUBSCRIBE ");
                self.mailbox(m);
            }
            CmdArg::Unsub(m) => {
                self.raw(b"UNSUBSCRIBE ");
                self.mailbox(m);
            }
            CmdArg::List { mailbox, pattern } => {
                self.raw(b"LIST ");
                self.mailbox(mailbox);
                self.raw(b" ");
                self.astring(pattern.as_bytes());
            }
            CmdArg::Lsub { mailbox, pattern } => {
                self.raw(b"LSUB ");
                self.mailbox(mailbox);
                self.raw(b" ");
                self.astring(pattern.as_bytes());
            }
            CmdArg::Status { mailbox, attrs } => {
                self.status_cmd(mailbox, attrs)?;
            }
            CmdArg::Append {
                mailbox,
                flags,
                time,
                content,
            } => {
                self.raw(b"APPEND ");
                self.mailbox(mailbox);
                self.raw(b" (");
                self.flags(flags)?;
                self.raw(b") ");
                if let Some(t) = time {
                    self.time(t)?;
                    self.raw(b" ");
                }
                self.literal(content);
            }
            CmdArg::Check => self.raw(b"CHECK"),
            CmdArg::Close => self.raw(b"CLOSE"),
            CmdArg::Expunge => self.raw(b"EXPUNGE"),
            CmdArg::Search { uid, charset, key } => {
                if *uid {
                    self.raw(b"UID ");
                }
                self.raw(b"SEARCH ");
                if let Some(charset) = charset {
                    self.raw(b"CHARSET ");
                    self.astring(charset.as_bytes());
                    self.raw(b" ");
                }
                self.search_key(key)?;
            }
            CmdArg::Fetch {
                uid,
                seq,
                attrs,
                mods,
            } => {
                if *uid {
                    self.raw(b"UID ");
                }
                self.raw(b"FETCH ");
                self.seq_set(seq)?;
                self.raw(b" ");
                self.fetch_attrs(attrs)?;
                if !mods.is_empty() {
                    self.raw(b" ");
                    self.fetch_mods(mods)?;
                }
            }
            CmdArg::Store {
                uid,
                seq,
                mods,
                sign,
                silent,
                flags,
            } => {
                if *uid {
                    self.raw(b"UID ");
                }
                self.raw(b"STORE ");
                self.seq_set(seq)?;
                if !mods.is_empty() {
                    self.raw(b" ");
                    self.store_mods(mods)?;
                }
                self.raw(b" ");
                if *sign > 0 {
                    self.raw(b"+");
                } else if *sign < 0 {
                    self.raw(b"-");
                }
                self.raw(b"FLAGS");
                if *silent {
                    self.raw(b".SILENT");
                }
                self.raw(b" (");
                self.flags(flags)?;
                self.raw(b")");
            }
            CmdArg::Copy { uid, seq, mailbox } => {
                if *uid {
                    self.raw(b"UID ");
                }
                self.raw(b"COPY ");
                self.seq_set(seq)?;
                self.raw(b" ");
                self.mailbox(mailbox);
            }
            CmdArg::Enable(caps) => {
                self.exts.assert_on(Extension::Enable)?;
                self.raw(b"ENABLE");
                for cap in caps {
                    self.raw(b" ");
                    self.atom(cap.as_bytes())?;
                }
            }
        }

        self.raw(b"\r\n");
        Ok(())
    }
}

/// Space separation inside parenthesized lists.
struct Lead {
    started: bool,
}

impl Lead {
    fn new() -> Self {
        Self { started: false }
    }

    fn sep(&mut self, sf: &mut SkipFill<'_>) {
        if self.started {
            sf.raw(b" ");
        }
        self.started = true;
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        _ => "Dec",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::imap::extension::ExtensionState;

    fn write_full(cmd: &Cmd, exts: &Extensions) -> Result<String> {
        let mut out = Vec::new();
        let mut skip = 0;
        let want = write_cmd(cmd, &mut out, 1 << 20, &mut skip, exts)?;
        assert_eq!(want, 0);
        Ok(String::from_utf8(out).unwrap())
    }

    fn exts_all_on() -> Extensions {
        Extensions {
            uidplus: ExtensionState::On,
            enable: ExtensionState::On,
            condstore: ExtensionState::On,
            qresync: ExtensionState::On,
        }
    }

    #[test]
    fn login_with_quoting() {
        let cmd = Cmd::new(
            "t1",
            CmdArg::Login {
                user: "user".into(),
                pass: "pa\"ss\\word".into(),
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t1 LOGIN user \"pa\\\"ss\\\\word\"\r\n");
    }

    #[test]
    fn astring_forms() {
        // empty pattern becomes a quoted string
        let cmd = Cmd::new(
            "t1",
            CmdArg::List {
                mailbox: Mailbox::noninbox(""),
                pattern: "*".into(),
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t1 LIST \"\" *\r\n");

        // CR forces a literal
        let cmd = Cmd::new("t2", CmdArg::Create(Mailbox::new("bad\rname")));
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t2 CREATE {8}\r\nbad\rname\r\n");

        // over-72-byte names force a literal
        let long = "x".repeat(73);
        let cmd = Cmd::new("t3", CmdArg::Create(Mailbox::new(long.clone())));
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, format!("t3 CREATE {{73}}\r\n{}\r\n", long));
    }

    #[test]
    fn inbox_is_never_quoted() {
        let cmd = Cmd::new("t1", CmdArg::Select {
            mailbox: Mailbox::new("inbox"),
            params: vec![],
        });
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t1 SELECT INBOX\r\n");
    }

    #[test]
    fn bad_tag_rejected() {
        let cmd = Cmd::new("t+1", CmdArg::Capa);
        let e = write_full(&cmd, &Extensions::default()).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
    }

    #[test]
    fn seq_sets() {
        let cmd = Cmd::new(
            "t1",
            CmdArg::Fetch {
                uid: false,
                seq: SeqSet(vec![
                    SeqSpec::num(1),
                    SeqSpec::range(3, 5),
                    SeqSpec::range(7, 0),
                ]),
                attrs: FetchAttrs {
                    flags: true,
                    uid: true,
                    ..Default::default()
                },
                mods: vec![],
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t1 FETCH 1,3:5,7:* (FLAGS UID)\r\n");
    }

    #[test]
    fn append_with_time() {
        let cmd = Cmd::new(
            "t1",
            CmdArg::Append {
                mailbox: Mailbox::new("Sent"),
                flags: Flags {
                    seen: true,
                    ..Default::default()
                },
                time: Some(ImapTime {
                    year: 2020,
                    month: 3,
                    day: 5,
                    hour: 1,
                    min: 2,
                    sec: 3,
                    z_plus: true,
                    z_hour: 0,
                    z_min: 0,
                }),
                content: b"Subject: hi\r\n\r\nbody".to_vec(),
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(
            out,
            "t1 APPEND Sent (\\Seen) \" 5-Mar-2020 01:02:03 +0000\" {19}\r\nSubject: hi\r\n\r\nbody\r\n"
        );
    }

    #[test]
    fn search_keys() {
        let cmd = Cmd::new(
            "t1",
            CmdArg::Search {
                uid: true,
                charset: None,
                key: SearchKey::Or(
                    Box::new(SearchKey::From("a b".into())),
                    Box::new(SearchKey::Group(Box::new(SearchKey::And(
                        Box::new(SearchKey::Unseen),
                        Box::new(SearchKey::Since(ImapTime {
                            year: 2020,
                            month: 12,
                            day: 9,
                            hour: 0,
                            min: 0,
                            sec: 0,
                            z_plus: true,
                            z_hour: 0,
                            z_min: 0,
                        })),
                    )))),
                ),
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(out, "t1 UID SEARCH OR FROM \"a b\" (UNSEEN SINCE 9-Dec-2020)\r\n");
    }

    #[test]
    fn extension_gating() {
        // CONDSTORE select param requires the extension to be ON
        let cmd = Cmd::new(
            "t1",
            CmdArg::Select {
                mailbox: Mailbox::new("INBOX"),
                params: vec![SelectParam::Condstore],
            },
        );
        let e = write_full(&cmd, &Extensions::default()).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
        let out = write_full(&cmd, &exts_all_on()).unwrap();
        assert_eq!(out, "t1 SELECT INBOX (CONDSTORE)\r\n");

        // ENABLE requires ENABLE
        let cmd = Cmd::new("t2", CmdArg::Enable(vec!["QRESYNC".into()]));
        assert!(write_full(&cmd, &Extensions::default()).is_err());
        assert_eq!(
            write_full(&cmd, &exts_all_on()).unwrap(),
            "t2 ENABLE QRESYNC\r\n"
        );

        // CHANGEDSINCE requires CONDSTORE, VANISHED requires QRESYNC
        let cmd = Cmd::new(
            "t3",
            CmdArg::Fetch {
                uid: true,
                seq: SeqSet::range(1, 0),
                attrs: FetchAttrs {
                    flags: true,
                    ..Default::default()
                },
                mods: vec![FetchMod::ChangedSince(12345), FetchMod::Vanished],
            },
        );
        assert!(write_full(&cmd, &Extensions::default()).is_err());
        assert_eq!(
            write_full(&cmd, &exts_all_on()).unwrap(),
            "t3 UID FETCH 1:* (FLAGS) (CHANGEDSINCE 12345 VANISHED)\r\n"
        );
    }

    #[test]
    fn idempotent_at_all_buffer_sizes() {
        let cmd = Cmd::new(
            "t42",
            CmdArg::Append {
                mailbox: Mailbox::new("folder with space"),
                flags: Flags {
                    answered: true,
                    keywords: vec!["custom".into()],
                    ..Default::default()
                },
                time: None,
                content: b"a literal\r\nbody that needs escap\"ing none".to_vec(),
            },
        );
        let exts = Extensions::default();
        let mut expected = Vec::new();
        let mut skip = 0;
        assert_eq!(
            write_cmd(&cmd, &mut expected, 1 << 20, &mut skip, &exts).unwrap(),
            0
        );

        for cap in 1..expected.len() + 2 {
            let mut total = Vec::new();
            let mut skip = 0;
            loop {
                let mut buf = Vec::new();
                let want = write_cmd(&cmd, &mut buf, cap, &mut skip, &exts).unwrap();
                total.extend_from_slice(&buf);
                if want == 0 {
                    break;
                }
            }
            assert_eq!(total, expected, "mismatch at cap {}", cap);
        }
    }

    #[test]
    fn string_is_never_bare() {
        let exts = Extensions::default();
        let mut out = Vec::new();
        let mut sf = SkipFill {
            out: &mut out,
            cap: 1 << 20,
            skip: 0,
            passed: 0,
            want: 0,
            exts: &exts,
        };
        sf.string(b"atomsafe");
        sf.string(b"has\rcr");
        assert_eq!(&out[..], b"\"atomsafe\"{6}\r\nhas\rcr");
    }

    #[test]
    fn fetch_section_extras() {
        let cmd = Cmd::new(
            "t1",
            CmdArg::Fetch {
                uid: true,
                seq: SeqSet::num(7),
                attrs: FetchAttrs {
                    uid: true,
                    extras: vec![FetchExtra {
                        peek: true,
                        sect: Some(Section {
                            part: vec![1, 2],
                            text: Some(SectionText::HeaderFields(vec![
                                "FROM".into(),
                                "SUBJECT".into(),
                            ])),
                        }),
                        partial: Some((0, 1024)),
                    }],
                    ..Default::default()
                },
                mods: vec![],
            },
        );
        let out = write_full(&cmd, &Extensions::default()).unwrap();
        assert_eq!(
            out,
            "t1 UID FETCH 7 (UID BODY.PEEK[1.2.HEADER.FIELDS (FROM SUBJECT)]<0.1024>)\r\n"
        );
    }
}
