//! Mailbox collaborator: fetch unseen alert messages, mark them seen, archive them.
//!
//! The pipeline only talks to the [`MailboxConnector`] / [`MailboxSession`]
//! traits. One session is opened per fetch stage and closed at its end.

mod imap_session;

use chrono::NaiveDate;
use thiserror::Error;

pub use imap_session::{ImapConnector, ImapCredentials};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("connect to {host}: {message}")]
    Connect { host: String, message: String },

    #[error("login rejected for {username}: {message}")]
    Login { username: String, message: String },

    #[error("mailbox protocol error: {0}")]
    Protocol(String),

    #[error("malformed message {id}: {message}")]
    Parse { id: u32, message: String },
}

/// Server-side search criteria for alert messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFilter {
    pub from_address: String,
    pub subject_contains: String,
    /// Earliest delivery date, inclusive.
    pub since: NaiveDate,
}

impl AlertFilter {
    /// IMAP SEARCH query: unseen, from the sender, subject substring, since date.
    pub fn imap_query(&self) -> String {
        format!(
            "UNSEEN FROM {} SUBJECT {} SINCE {}",
            quote(&self.from_address),
            quote(&self.subject_contains),
            self.since.format("%d-%b-%Y")
        )
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// One alert message, identified by its mailbox UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub id: u32,
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Subject and body joined, as fed to ticker extraction.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// An open, authenticated mailbox with the alert folder selected.
pub trait MailboxSession: Send {
    /// Messages matching `filter` that have not been seen. Fetching does not mark them seen.
    fn fetch_unseen(&mut self, filter: &AlertFilter) -> Result<Vec<AlertMessage>, MailError>;

    fn mark_seen(&mut self, id: u32) -> Result<(), MailError>;

    /// Move a processed message out of the alert folder.
    fn archive(&mut self, id: u32) -> Result<(), MailError>;

    /// Log out. Errors here are not interesting to the caller.
    fn close(self: Box<Self>);
}

/// Opens mailbox sessions.
pub trait MailboxConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, MailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_quotes_values_and_formats_date() {
        let filter = AlertFilter {
            from_address: "alerts@thinkorswim.com".into(),
            subject_contains: "BBAuto".into(),
            since: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        };
        assert_eq!(
            filter.imap_query(),
            r#"UNSEEN FROM "alerts@thinkorswim.com" SUBJECT "BBAuto" SINCE 07-Mar-2024"#
        );
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn full_text_joins_subject_and_body() {
        let msg = AlertMessage {
            id: 1,
            subject: "Alert: BBAuto".into(),
            body: "AAPL".into(),
        };
        assert_eq!(msg.full_text(), "Alert: BBAuto AAPL");
    }
}
