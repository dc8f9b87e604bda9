/*
 * types.rs
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

//! The IMAP expression tree: commands and responses as owned values.
//! Wire-format validation (alphabets, quoting, extension gates) happens
//! in the writer, so trees can be built freely and fail loudly when
//! marshalled.

/// One spec in a sequence set; 0 encodes `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpec {
    pub n1: u32,
    pub n2: u32,
}

impl SeqSpec {
    pub fn num(n: u32) -> Self {
        Self { n1: n, n2: n }
    }

    pub fn range(n1: u32, n2: u32) -> Self {
        Self { n1, n2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeqSet(pub Vec<SeqSpec>);

impl SeqSet {
    pub fn num(n: u32) -> Self {
        Self(vec![SeqSpec::num(n)])
    }

    pub fn range(n1: u32, n2: u32) -> Self {
        Self(vec![SeqSpec::range(n1, n2)])
    }
}

/// INBOX is special-cased everywhere in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub inbox: bool,
    pub name: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self {
                inbox: true,
                name: String::new(),
            }
        } else {
            Self { inbox: false, name }
        }
    }

    /// A mailbox that is never INBOX, e.g. a LIST reference name.
    pub fn noninbox(name: impl Into<String>) -> Self {
        Self {
            inbox: false,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        if self.inbox {
            "INBOX"
        } else {
            &self.name
        }
    }
}

/// System + keyword flags on messages (APPEND, STORE).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Flags {
    pub answered: bool,
    pub flagged: bool,
    pub deleted: bool,
    pub seen: bool,
    pub draft: bool,
    pub keywords: Vec<String>,
    pub extensions: Vec<String>,
}

/// FETCH-side flags additionally allow \Recent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchFlags {
    pub answered: bool,
    pub flagged: bool,
    pub deleted: bool,
    pub seen: bool,
    pub draft: bool,
    pub recent: bool,
    pub keywords: Vec<String>,
    pub extensions: Vec<String>,
}

/// PERMANENTFLAGS additionally allow `\*`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermFlags {
    pub asterisk: bool,
    pub answered: bool,
    pub flagged: bool,
    pub deleted: bool,
    pub seen: bool,
    pub draft: bool,
    pub keywords: Vec<String>,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selectable {
    #[default]
    None,
    NoSelect,
    Marked,
    Unmarked,
}

/// Mailbox attributes in LIST/LSUB responses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailboxFlags {
    pub noinferiors: bool,
    pub selectable: Selectable,
    pub extensions: Vec<String>,
}

/// Which attributes a STATUS command requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusAttrs {
    pub messages: bool,
    pub recent: bool,
    pub uidnext: bool,
    pub uidvld: bool,
    pub unseen: bool,
    pub himodseq: bool,
}

/// Attribute values in a STATUS response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusValues {
    pub messages: Option<u32>,
    pub recent: Option<u32>,
    pub uidnext: Option<u32>,
    pub uidvld: Option<u32>,
    pub unseen: Option<u32>,
    pub himodseq: Option<u64>,
}

/// IMAP date-time. Month is 1-12; the zone is a signed HHMM offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImapTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
    pub z_plus: bool,
    pub z_hour: u32,
    pub z_min: u32,
}

/// SEARCH keys; the algebra (AND/OR/NOT/group) is recursive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    All,
    Answered,
    Deleted,
    Flagged,
    New,
    Old,
    Recent,
    Seen,
    Draft,
    Unanswered,
    Undeleted,
    Unflagged,
    Unseen,
    Undraft,
    Subject(String),
    Bcc(String),
    Body(String),
    Cc(String),
    From(String),
    To(String),
    Text(String),
    Keyword(String),
    Unkeyword(String),
    Header(String, String),
    Before(ImapTime),
    On(ImapTime),
    Since(ImapTime),
    SentBefore(ImapTime),
    SentOn(ImapTime),
    SentSince(ImapTime),
    Larger(u32),
    Smaller(u32),
    Uid(SeqSet),
    Seq(SeqSet),
    Not(Box<SearchKey>),
    Group(Box<SearchKey>),
    Or(Box<SearchKey>, Box<SearchKey>),
    And(Box<SearchKey>, Box<SearchKey>),
    /// CONDSTORE: MODSEQ search criterion.
    ModSeq(u64),
}

/// `BODY[...]` section specifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub part: Vec<u32>,
    pub text: Option<SectionText>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionText {
    Mime,
    Text,
    Header,
    HeaderFields(Vec<String>),
    HeaderFieldsNot(Vec<String>),
}

/// One `BODY[section]<partial>` (or `BODY.PEEK[...]`) fetch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchExtra {
    pub peek: bool,
    pub sect: Option<Section>,
    pub partial: Option<(u32, u32)>,
}

/// The fixed fetch attributes plus any number of BODY[] extras.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchAttrs {
    pub envelope: bool,
    pub flags: bool,
    pub intdate: bool,
    pub uid: bool,
    pub rfc822: bool,
    pub rfc822_header: bool,
    pub rfc822_size: bool,
    pub rfc822_text: bool,
    pub body: bool,
    pub bodystruct: bool,
    pub modseq: bool,
    pub extras: Vec<FetchExtra>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMod {
    ChangedSince(u64),
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMod {
    UnchangedSince(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectParam {
    Condstore,
    Qresync {
        uidvld: u32,
        modseq: u64,
        seq: Option<SeqSet>,
    },
}

/// Status-type response codes (the `[...]` after OK/NO/BAD/...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    Alert,
    Parse,
    ReadOnly,
    ReadWrite,
    TryCreate,
    NoModSeq,
    UidNotSticky,
    Capability(Vec<String>),
    PermanentFlags(PermFlags),
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
    HiModSeq(u64),
    Modified(SeqSet),
    AppendUid { uidvld: u32, uid: u32 },
    CopyUid { uidvld: u32, src: SeqSet, dst: SeqSet },
    /// An unrecognized atom code, with any trailing argument text.
    Atom { name: String, arg: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
    Preauth,
    Bye,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bad => "BAD",
            Status::Preauth => "PREAUTH",
            Status::Bye => "BYE",
        }
    }
}

/// A status-type response, tagged or untagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResp {
    pub tag: Option<String>,
    pub status: Status,
    pub code: Option<StatusCode>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResp {
    pub mflags: MailboxFlags,
    pub sep: Option<char>,
    pub mailbox: Mailbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusData {
    pub mailbox: Mailbox,
    pub values: StatusValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResp {
    pub seq: u32,
    pub uid: Option<u32>,
    pub flags: Option<FetchFlags>,
    pub intdate: Option<ImapTime>,
    pub modseq: Option<u64>,
    pub size: Option<u32>,
    pub rfc822: Option<Vec<u8>>,
    pub body: Option<Vec<u8>>,
}

/// Every response the reader can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resp {
    StatusType(StatusResp),
    Capability(Vec<String>),
    List(ListResp),
    Lsub(ListResp),
    Status(StatusData),
    Flags(Flags),
    Search(Vec<u32>),
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Fetch(FetchResp),
    Enabled(Vec<String>),
    /// A `+ ...` continuation request.
    Plus(String),
}

/// A complete command: tag plus argument form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub tag: String,
    pub arg: CmdArg,
}

impl Cmd {
    pub fn new(tag: impl Into<String>, arg: CmdArg) -> Self {
        Self {
            tag: tag.into(),
            arg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdArg {
    Capa,
    Starttls,
    Auth(String),
    Login {
        user: String,
        pass: String,
    },
    Select {
        mailbox: Mailbox,
        params: Vec<SelectParam>,
    },
    Examine {
        mailbox: Mailbox,
        params: Vec<SelectParam>,
    },
    Create(Mailbox),
    Delete(Mailbox),
    Rename {
        old: Mailbox,
        new: Mailbox,
    },
    Sub(Mailbox),
    Unsub(Mailbox),
    List {
        mailbox: Mailbox,
        pattern: String,
    },
    Lsub {
        mailbox: Mailbox,
        pattern: String,
    },
    Status {
        mailbox: Mailbox,
        attrs: StatusAttrs,
    },
    Append {
        mailbox: Mailbox,
        flags: Flags,
        time: Option<ImapTime>,
        content: Vec<u8>,
    },
    Check,
    Close,
    Expunge,
    Search {
        uid: bool,
        charset: Option<String>,
        key: SearchKey,
    },
    Fetch {
        uid: bool,
        seq: SeqSet,
        attrs: FetchAttrs,
        mods: Vec<FetchMod>,
    },
    Store {
        uid: bool,
        seq: SeqSet,
        mods: Vec<StoreMod>,
        sign: i8,
        silent: bool,
        flags: Flags,
    },
    Copy {
        uid: bool,
        seq: SeqSet,
        mailbox: Mailbox,
    },
    Enable(Vec<String>),
}

impl CmdArg {
    pub fn name(&self) -> &'static str {
        match self {
            CmdArg::Capa => "CAPABILITY",
            CmdArg::Starttls => "STARTTLS",
            CmdArg::Auth(_) => "AUTHENTICATE",
            CmdArg::Login { .. } => "LOGIN",
            CmdArg::Select { .. } => "SELECT",
            CmdArg::Examine { .. } => "EXAMINE",
            CmdArg::Create(_) => "CREATE",
            CmdArg::Delete(_) => "DELETE",
            CmdArg::Rename { .. } => "RENAME",
            CmdArg::Sub(_) => "SUBSCRIBE",
            CmdArg::Unsub(_) => "UNSUBSCRIBE",
            CmdArg::List { .. } => "LIST",
            CmdArg::Lsub { .. } => "LSUB",
            CmdArg::Status { .. } => "STATUS",
            CmdArg::Append { .. } => "APPEND",
            CmdArg::Check => "CHECK",
            CmdArg::Close => "CLOSE",
            CmdArg::Expunge => "EXPUNGE",
            CmdArg::Search { .. } => "SEARCH",
            CmdArg::Fetch { .. } => "FETCH",
            CmdArg::Store { .. } => "STORE",
            CmdArg::Copy { .. } => "COPY",
            CmdArg::Enable(_) => "ENABLE",
        }
    }
}
