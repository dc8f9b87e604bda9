/*
 * client.rs
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

//! IMAP session state machine, client role: greeting, CAPABILITY,
//! LOGIN, then goal-driven work (LIST accumulation, folder selection).
//! Tagged responses must answer commands in the order they were sent;
//! a tag mismatch is a protocol error that kills the session.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::extension::{Extension, Extensions};
use super::read::ResponseReader;
use super::types::*;
use super::write::write_cmd;

const WRITE_BUF: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapState {
    Pregreet,
    Precapa,
    Preauth,
    Authenticated,
    Listing,
    Preselect,
    Selected,
    Preclose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    None,
    Login,
    List,
    Sync,
}

/// Commands the controller can issue once the session is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCmd {
    ListFolders,
    SetFolder(String),
    Close,
}

/// Upward notifications out of the session.
pub trait ImapController: Send {
    fn logged_in(&self);
    /// Receives the accumulated LIST tree; ownership stays with the
    /// session, which frees it after the call.
    fn folders(&self, folders: &BTreeMap<String, ListResp>);
    fn uptodate(&self);
}

pub struct ImapClientSpec {
    pub user: String,
    pub pass: String,
    /// Tolerate a server that never answers CAPABILITY with one.
    pub relaxed_capas: bool,
}

/// Completion hook for a tagged OK, named rather than dynamic: every
/// command the session sends has exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmdDone {
    Capa,
    Login,
    List,
    #[allow(dead_code)]
    Check,
}

struct PendingCmd {
    cmd: Cmd,
    done: CmdDone,
}

pub struct ImapClient {
    spec: ImapClientSpec,
    controller: Box<dyn ImapController>,
    reader: ResponseReader,
    exts: Extensions,
    state: ImapState,
    goal: Goal,
    saw_capas: bool,
    next_tag: u32,
    unhandled: VecDeque<Resp>,
    unwritten: VecDeque<PendingCmd>,
    unresponded: VecDeque<PendingCmd>,
    write_skip: usize,
    folders: BTreeMap<String, ListResp>,
    closed: bool,
}

impl ImapClient {
    pub fn new(spec: ImapClientSpec, controller: Box<dyn ImapController>) -> Self {
        Self {
            spec,
            controller,
            reader: ResponseReader::new(),
            exts: Extensions::default(),
            state: ImapState::Pregreet,
            goal: Goal::Login,
            saw_capas: false,
            next_tag: 1,
            unhandled: VecDeque::new(),
            unwritten: VecDeque::new(),
            unresponded: VecDeque::new(),
            write_skip: 0,
            folders: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn state(&self) -> ImapState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn take_tag(&mut self) -> String {
        let tag = format!("t{}", self.next_tag);
        self.next_tag += 1;
        tag
    }

    fn enqueue(&mut self, arg: CmdArg, done: CmdDone) {
        let tag = self.take_tag();
        self.unwritten.push_back(PendingCmd {
            cmd: Cmd::new(tag, arg),
            done,
        });
    }

    /// Incoming wire bytes (EV_READ). Zero-length means the peer hung up.
    pub fn feed_read(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::conn("received unexpected EOF"));
        }
        let mut parsed = Vec::new();
        self.reader.feed(data, &mut self.exts, &mut parsed)?;
        self.unhandled.extend(parsed);
        self.process_all_unhandled()
    }

    /// Controller command (EV_COMMAND).
    pub fn command(&mut self, cmd: ClientCmd) -> Result<()> {
        if self.goal != Goal::None && !matches!(cmd, ClientCmd::Close) {
            return Err(Error::internal(format!(
                "unable to accept {:?} while another goal is active",
                cmd
            )));
        }
        match cmd {
            ClientCmd::ListFolders => {
                self.goal = Goal::List;
                self.send_list();
            }
            ClientCmd::SetFolder(folder) => {
                self.goal = Goal::Sync;
                log::info!("setting folder to {}", folder);
                self.state = ImapState::Preselect;
                // no server side to sync against yet; report uptodate
                self.state = ImapState::Selected;
                self.goal = Goal::None;
                self.controller.uptodate();
            }
            ClientCmd::Close => {
                self.state = ImapState::Preclose;
                self.closed = true;
            }
        }
        Ok(())
    }

    /// True when there is a queued command still being written.
    pub fn wants_write(&self) -> bool {
        !self.unwritten.is_empty()
    }

    /// Marshal (part of) the head unwritten command into `buf`. When the
    /// command completes it moves to the unresponded queue.
    pub fn write_into(&mut self, buf: &mut Vec<u8>, cap: usize) -> Result<bool> {
        let Some(head) = self.unwritten.front() else {
            return Ok(false);
        };
        let want = write_cmd(&head.cmd, buf, cap, &mut self.write_skip, &self.exts)?;
        if want == 0 {
            self.write_skip = 0;
            if let Some(pending) = self.unwritten.pop_front() {
                self.unresponded.push_back(pending);
            }
        }
        Ok(true)
    }

    fn process_all_unhandled(&mut self) -> Result<()> {
        while let Some(resp) = self.unhandled.pop_front() {
            self.process_one(resp)?;
        }
        Ok(())
    }

    fn process_one(&mut self, resp: Resp) -> Result<()> {
        match resp {
            Resp::StatusType(st) => self.status_type(st),
            Resp::Capability(caps) => self.check_capas(&caps),
            Resp::List(list) => {
                self.folders
                    .insert(list.mailbox.name().to_string(), list);
                Ok(())
            }
            Resp::Plus(_) => Err(Error::response("unexpected continuation request")),
            Resp::Lsub(_) => Err(Error::value("got LSUB response")),
            Resp::Status(_) => Err(Error::value("got STATUS response")),
            Resp::Flags(_) => Err(Error::value("got FLAGS response")),
            Resp::Search(_) => Err(Error::value("got SEARCH response")),
            Resp::Exists(_) => Err(Error::value("got EXISTS response")),
            Resp::Recent(_) => Err(Error::value("got RECENT response")),
            Resp::Expunge(_) => Err(Error::value("got EXPUNGE response")),
            Resp::Fetch(_) => Err(Error::value("got FETCH response")),
            Resp::Enabled(_) => Err(Error::value("got ENABLED response")),
        }
    }

    fn status_type(&mut self, st: StatusResp) -> Result<()> {
        let Some(tag) = &st.tag else {
            return self.untagged_status(&st);
        };

        // the head of unresponded must match the incoming tag
        let Some(pending) = self.unresponded.front() else {
            return Err(Error::response(format!(
                "got tag {} with no commands in flight",
                tag
            )));
        };
        if &pending.cmd.tag != tag {
            return Err(Error::response(format!(
                "got tag {} but expected {}",
                tag, pending.cmd.tag
            )));
        }
        let Some(pending) = self.unresponded.pop_front() else {
            return Err(Error::internal("unresponded queue emptied underneath us"));
        };

        match st.status {
            Status::Ok => self.on_done(pending.done, &st),
            Status::No | Status::Bad => Err(Error::internal(format!(
                "{} command with tag {:?} failed: {} {}",
                pending.cmd.arg.name(),
                pending.cmd.tag,
                st.status.as_str(),
                st.text,
            ))),
            Status::Preauth | Status::Bye => Err(Error::response(format!(
                "invalid tagged {} response",
                st.status.as_str()
            ))),
        }
    }

    fn untagged_status(&mut self, st: &StatusResp) -> Result<()> {
        match st.status {
            Status::Ok => self.untagged_ok(st),
            Status::No => {
                log::warn!("server warning: {}", st.text);
                Ok(())
            }
            Status::Bad => {
                log::warn!("server error: {}", st.text);
                Ok(())
            }
            Status::Preauth => Err(Error::response("unexpected PREAUTH greeting")),
            Status::Bye => {
                log::info!("server BYE: {}", st.text);
                Ok(())
            }
        }
    }

    fn untagged_ok(&mut self, st: &StatusResp) -> Result<()> {
        // the very first message is the greeting
        if self.state == ImapState::Pregreet {
            if let Some(StatusCode::Capability(caps)) = &st.code {
                let caps = caps.clone();
                self.check_capas(&caps)?;
                self.send_login();
            } else {
                self.send_capas();
            }
            return Ok(());
        }

        // codes that are independent of state
        if let Some(StatusCode::Alert) = &st.code {
            log::error!("server ALERT message: {}", st.text);
        }
        Ok(())
    }

    /// Puke if a needed capability is missing; remember which extensions
    /// the server offers.
    fn check_capas(&mut self, caps: &[String]) -> Result<()> {
        let mut found_imap4rev1 = false;
        for capa in caps {
            if capa.eq_ignore_ascii_case("imap4rev1") {
                found_imap4rev1 = true;
            } else if capa.eq_ignore_ascii_case("uidplus") {
                self.exts.set_available(Extension::UidPlus);
            } else if capa.eq_ignore_ascii_case("enable") {
                self.exts.set_available(Extension::Enable);
            } else if capa.eq_ignore_ascii_case("condstore") {
                self.exts.set_available(Extension::Condstore);
            } else if capa.eq_ignore_ascii_case("qresync") {
                self.exts.set_available(Extension::Qresync);
            }
        }
        if !found_imap4rev1 {
            return Err(Error::response("IMAP server is missing capabilities"));
        }
        self.saw_capas = true;
        Ok(())
    }

    fn on_done(&mut self, done: CmdDone, _st: &StatusResp) -> Result<()> {
        match done {
            CmdDone::Capa => {
                if !self.saw_capas && !self.spec.relaxed_capas {
                    return Err(Error::response("never saw capabilities"));
                }
                self.send_login();
                Ok(())
            }
            CmdDone::Login => {
                if self.state != ImapState::Preauth {
                    return Err(Error::internal("arrived at login done out of PREAUTH state"));
                }
                self.state = ImapState::Authenticated;
                if self.goal != Goal::Login {
                    return Err(Error::internal("arrived at login done without LOGIN goal"));
                }
                self.goal = Goal::None;
                self.controller.logged_in();
                Ok(())
            }
            CmdDone::List => {
                if self.state != ImapState::Listing {
                    return Err(Error::internal("arrived at list done out of LISTING state"));
                }
                self.state = ImapState::Authenticated;
                if self.goal != Goal::List {
                    return Err(Error::internal("arrived at list done without LIST goal"));
                }
                self.goal = Goal::None;
                self.controller.folders(&self.folders);
                self.folders.clear();
                Ok(())
            }
            CmdDone::Check => Ok(()),
        }
    }

    fn send_capas(&mut self) {
        self.state = ImapState::Precapa;
        self.saw_capas = false;
        self.enqueue(CmdArg::Capa, CmdDone::Capa);
    }

    fn send_login(&mut self) {
        self.state = ImapState::Preauth;
        let user = self.spec.user.clone();
        let pass = self.spec.pass.clone();
        self.enqueue(CmdArg::Login { user, pass }, CmdDone::Login);
    }

    fn send_list(&mut self) {
        self.state = ImapState::Listing;
        self.enqueue(
            CmdArg::List {
                mailbox: Mailbox::noninbox(""),
                pattern: "*".into(),
            },
            CmdDone::List,
        );
    }
}

/// Run the session over a duplex stream: parse and dispatch reads,
/// accept controller commands, and drain queued writes after every
/// event. The teacher of this shape is a plain select loop, no threads.
pub async fn run_session<S>(
    stream: S,
    spec: ImapClientSpec,
    controller: Box<dyn ImapController>,
    mut commands: mpsc::UnboundedReceiver<ClientCmd>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut client = ImapClient::new(spec, controller);
    let mut rbuf = [0u8; WRITE_BUF];

    loop {
        // drain queued writes before waiting on anything
        while client.wants_write() {
            let mut buf = Vec::with_capacity(WRITE_BUF);
            client.write_into(&mut buf, WRITE_BUF)?;
            if !buf.is_empty() {
                log::debug!("send: {}", String::from_utf8_lossy(&buf).trim_end());
                writer.write_all(&buf).await?;
            }
        }
        writer.flush().await?;

        if client.is_closed() {
            return Ok(());
        }

        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(cmd) => client.command(cmd)?,
                    None => {
                        client.command(ClientCmd::Close)?;
                    }
                }
            }
            n = reader.read(&mut rbuf) => {
                let n = n?;
                client.feed_read(&rbuf[..n])?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingController {
        logged_in: AtomicBool,
        uptodate: AtomicBool,
        folder_calls: AtomicUsize,
        folders: Mutex<Vec<String>>,
    }

    impl ImapController for Arc<RecordingController> {
        fn logged_in(&self) {
            self.as_ref().logged_in.store(true, Ordering::SeqCst);
        }
        fn folders(&self, folders: &BTreeMap<String, ListResp>) {
            self.as_ref().folder_calls.fetch_add(1, Ordering::SeqCst);
            let mut names = self.as_ref().folders.lock().unwrap();
            *names = folders.keys().cloned().collect();
        }
        fn uptodate(&self) {
            self.as_ref().uptodate.store(true, Ordering::SeqCst);
        }
    }

    fn new_client() -> (ImapClient, Arc<RecordingController>) {
        let controller = Arc::new(RecordingController::default());
        let client = ImapClient::new(
            ImapClientSpec {
                user: "user".into(),
                pass: "pass".into(),
                relaxed_capas: false,
            },
            Box::new(controller.clone()),
        );
        (client, controller)
    }

    fn drain_writes(client: &mut ImapClient) -> String {
        let mut total = Vec::new();
        while client.wants_write() {
            let mut buf = Vec::new();
            client.write_into(&mut buf, 4096).unwrap();
            total.extend_from_slice(&buf);
        }
        String::from_utf8(total).unwrap()
    }

    #[test]
    fn greeting_with_capability_goes_straight_to_login() {
        let (mut client, controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        let sent = drain_writes(&mut client);
        assert_eq!(sent, "t1 LOGIN user pass\r\n");
        assert_eq!(client.state(), ImapState::Preauth);

        client.feed_read(b"t1 OK logged in\r\n").unwrap();
        assert!(controller.logged_in.load(Ordering::SeqCst));
        assert_eq!(client.state(), ImapState::Authenticated);
    }

    #[test]
    fn greeting_without_capability_sends_capability_first() {
        let (mut client, controller) = new_client();
        client.feed_read(b"* OK ready\r\n").unwrap();
        let sent = drain_writes(&mut client);
        assert_eq!(sent, "t1 CAPABILITY\r\n");
        assert_eq!(client.state(), ImapState::Precapa);

        client
            .feed_read(b"* CAPABILITY IMAP4rev1 UIDPLUS\r\nt1 OK done\r\n")
            .unwrap();
        let sent = drain_writes(&mut client);
        assert_eq!(sent, "t2 LOGIN user pass\r\n");
        client.feed_read(b"t2 OK welcome\r\n").unwrap();
        assert!(controller.logged_in.load(Ordering::SeqCst));
    }

    #[test]
    fn strict_capability_check() {
        let (mut client, _controller) = new_client();
        client.feed_read(b"* OK ready\r\n").unwrap();
        drain_writes(&mut client);
        // tagged OK arrives but no CAPABILITY response was ever seen
        let e = client.feed_read(b"t1 OK done\r\n").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }

    #[test]
    fn missing_imap4rev1_is_fatal() {
        let (mut client, _controller) = new_client();
        let e = client
            .feed_read(b"* OK [CAPABILITY IMAP9] hi\r\n")
            .unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }

    #[test]
    fn list_accumulates_then_notifies() {
        let (mut client, controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        drain_writes(&mut client);
        client.feed_read(b"t1 OK in\r\n").unwrap();

        client.command(ClientCmd::ListFolders).unwrap();
        let sent = drain_writes(&mut client);
        assert_eq!(sent, "t2 LIST \"\" *\r\n");
        assert_eq!(client.state(), ImapState::Listing);

        client
            .feed_read(b"* LIST () \"/\" INBOX\r\n* LIST () \"/\" Sent\r\n")
            .unwrap();
        assert_eq!(controller.folder_calls.load(Ordering::SeqCst), 0);
        client.feed_read(b"t2 OK list complete\r\n").unwrap();
        assert_eq!(controller.folder_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *controller.folders.lock().unwrap(),
            vec!["INBOX".to_string(), "Sent".to_string()]
        );
        assert_eq!(client.state(), ImapState::Authenticated);
        // the tree is freed after the controller call
        assert!(client.folders.is_empty());
    }

    #[test]
    fn out_of_order_tagged_response_is_protocol_error() {
        let (mut client, _controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        drain_writes(&mut client);
        client.feed_read(b"t1 OK in\r\n").unwrap();

        // three commands in flight: t2, t3, t4
        client.enqueue(CmdArg::Check, CmdDone::Check);
        client.enqueue(CmdArg::Check, CmdDone::Check);
        client.enqueue(CmdArg::Check, CmdDone::Check);
        let sent = drain_writes(&mut client);
        assert_eq!(sent, "t2 CHECK\r\nt3 CHECK\r\nt4 CHECK\r\n");

        // answering t3 before t2 violates the ordering contract
        let e = client.feed_read(b"t3 OK check\r\n").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
        assert!(e.to_string().contains("expected t2"));
    }

    #[test]
    fn tag_with_nothing_in_flight_is_protocol_error() {
        let (mut client, _controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        drain_writes(&mut client);
        client.feed_read(b"t1 OK in\r\n").unwrap();
        let e = client.feed_read(b"t9 OK surprise\r\n").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Response);
    }

    #[test]
    fn set_folder_reports_uptodate() {
        let (mut client, controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        drain_writes(&mut client);
        client.feed_read(b"t1 OK in\r\n").unwrap();
        client
            .command(ClientCmd::SetFolder("INBOX".into()))
            .unwrap();
        assert!(controller.uptodate.load(Ordering::SeqCst));
        assert_eq!(client.state(), ImapState::Selected);
    }

    #[test]
    fn no_without_hook_is_fatal() {
        let (mut client, _controller) = new_client();
        client
            .feed_read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .unwrap();
        drain_writes(&mut client);
        let e = client.feed_read(b"t1 NO go away\r\n").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Internal);
    }

    #[tokio::test]
    async fn run_session_over_duplex() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let controller = Arc::new(RecordingController::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let session = tokio::spawn(run_session(
            ours,
            ImapClientSpec {
                user: "u".into(),
                pass: "p".into(),
                relaxed_capas: false,
            },
            Box::new(controller.clone()),
            cmd_rx,
        ));

        // scripted server
        let (mut srv_read, mut srv_write) = tokio::io::split(theirs);
        srv_write
            .write_all(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 1024];
        let n = srv_read.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"t1 LOGIN u p\r\n");
        srv_write.write_all(b"t1 OK in\r\n").await.unwrap();

        cmd_tx.send(ClientCmd::ListFolders).unwrap();
        let n = srv_read.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"t2 LIST \"\" *\r\n");
        srv_write
            .write_all(b"* LIST () \"/\" INBOX\r\nt2 OK done\r\n")
            .await
            .unwrap();

        // poll until the notification lands, then close
        for _ in 0..100 {
            if controller.folder_calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(controller.folder_calls.load(Ordering::SeqCst), 1);
        cmd_tx.send(ClientCmd::Close).unwrap();
        session.await.unwrap().unwrap();
    }
}
