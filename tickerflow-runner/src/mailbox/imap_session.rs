//! IMAP over TLS implementation of the mailbox collaborator.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use mailparse::{MailHeaderMap, ParsedMail};
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, warn};

use super::{AlertFilter, AlertMessage, MailError, MailboxConnector, MailboxSession};

/// Account credentials. The password is never logged.
#[derive(Clone)]
pub struct ImapCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ImapCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connects to an IMAP server over implicit TLS with socket timeouts.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    host: String,
    port: u16,
    folder: String,
    archive_folder: String,
    credentials: ImapCredentials,
    socket_timeout: Duration,
}

impl ImapConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        folder: impl Into<String>,
        archive_folder: impl Into<String>,
        credentials: ImapCredentials,
        socket_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            folder: folder.into(),
            archive_folder: archive_folder.into(),
            credentials,
            socket_timeout,
        }
    }

    fn connect_err(&self, message: impl ToString) -> MailError {
        MailError::Connect {
            host: self.host.clone(),
            message: message.to_string(),
        }
    }

    fn open_stream(&self) -> Result<TlsStream<TcpStream>, MailError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_err(e))?
            .next()
            .ok_or_else(|| self.connect_err("host resolved to no addresses"))?;

        let tcp = TcpStream::connect_timeout(&addr, self.socket_timeout)
            .map_err(|e| self.connect_err(e))?;
        tcp.set_read_timeout(Some(self.socket_timeout))
            .map_err(|e| self.connect_err(e))?;
        tcp.set_write_timeout(Some(self.socket_timeout))
            .map_err(|e| self.connect_err(e))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| self.connect_err(e))?;
        tls.connect(&self.host, tcp).map_err(|e| self.connect_err(e))
    }
}

impl MailboxConnector for ImapConnector {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, MailError> {
        let stream = self.open_stream()?;
        let mut client = ::imap::Client::new(stream);
        client.read_greeting().map_err(|e| self.connect_err(e))?;

        let mut session = client
            .login(&self.credentials.username, &self.credentials.password)
            .map_err(|(e, _)| MailError::Login {
                username: self.credentials.username.clone(),
                message: e.to_string(),
            })?;

        session.select(&self.folder).map_err(protocol)?;
        debug!(host = %self.host, folder = %self.folder, "mailbox session opened");

        Ok(Box::new(ImapSession {
            session,
            archive_folder: self.archive_folder.clone(),
        }))
    }
}

fn protocol(e: ::imap::Error) -> MailError {
    MailError::Protocol(e.to_string())
}

struct ImapSession {
    session: ::imap::Session<TlsStream<TcpStream>>,
    archive_folder: String,
}

impl MailboxSession for ImapSession {
    fn fetch_unseen(&mut self, filter: &AlertFilter) -> Result<Vec<AlertMessage>, MailError> {
        let mut uids: Vec<u32> = self
            .session
            .uid_search(filter.imap_query())
            .map_err(protocol)?
            .into_iter()
            .collect();
        uids.sort_unstable();
        debug!(matches = uids.len(), "alert search complete");

        let mut messages = Vec::with_capacity(uids.len());
        for uid in uids {
            // PEEK keeps the message unseen until it has been handled
            let fetches = self
                .session
                .uid_fetch(uid.to_string(), "BODY.PEEK[]")
                .map_err(protocol)?;
            let Some(raw) = fetches.iter().find_map(|f| f.body()) else {
                warn!(uid, "alert message has no body");
                continue;
            };
            match parse_message(uid, raw) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(uid, error = %e, "skipping unparseable alert message"),
            }
        }
        Ok(messages)
    }

    fn mark_seen(&mut self, id: u32) -> Result<(), MailError> {
        self.session
            .uid_store(id.to_string(), "+FLAGS (\\Seen)")
            .map_err(protocol)?;
        Ok(())
    }

    fn archive(&mut self, id: u32) -> Result<(), MailError> {
        self.session
            .uid_mv(id.to_string(), &self.archive_folder)
            .map_err(protocol)
    }

    fn close(mut self: Box<Self>) {
        if let Err(e) = self.session.logout() {
            debug!(error = %e, "mailbox logout failed");
        }
    }
}

/// Subject plus the first text/plain part (or the whole body of a single-part message).
fn parse_message(id: u32, raw: &[u8]) -> Result<AlertMessage, MailError> {
    let parse_err = |e: mailparse::MailParseError| MailError::Parse {
        id,
        message: e.to_string(),
    };
    let parsed = mailparse::parse_mail(raw).map_err(parse_err)?;
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let body = match find_text_part(&parsed) {
        Some(part) => part.get_body().map_err(parse_err)?,
        None => String::new(),
    };
    Ok(AlertMessage { id, subject, body })
}

fn find_text_part<'a>(mail: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        return mail
            .ctype
            .mimetype
            .starts_with("text/")
            .then_some(mail);
    }
    mail.subparts
        .iter()
        .find(|part| part.ctype.mimetype == "text/plain" && part.subparts.is_empty())
        .or_else(|| mail.subparts.iter().find_map(find_text_part))
}
