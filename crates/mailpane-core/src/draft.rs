//! Compose state for a message being written.

use crate::error::{Error, Result};
use crate::model::{Identity, MailMessage, MessageId, NewMessage};

/// Subject used when a new message is sent without one.
pub const DEFAULT_SUBJECT: &str = "New Message";

const REPLY_PREFIX: &str = "Re: ";

/// Where a draft is in its send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendStatus {
    /// Being edited.
    #[default]
    Idle,
    /// Handed to the mail store; edits are ignored.
    Sending,
    /// The store accepted the message. Reported by [`Draft::complete`]; the
    /// draft itself is reset to [`SendStatus::Idle`].
    Sent,
    /// The last send attempt failed; content is kept for a retry.
    Failed,
}

/// A message being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    recipient: String,
    subject: String,
    body: String,
    in_reply_to: Option<MessageId>,
    status: SendStatus,
    last_error: Option<Error>,
}

impl Draft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reply to `message`, addressed to its sender.
    #[must_use]
    pub fn reply_to(message: &MailMessage) -> Self {
        let subject = if message
            .subject
            .get(..REPLY_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(REPLY_PREFIX))
        {
            message.subject.clone()
        } else {
            format!("{REPLY_PREFIX}{}", message.subject)
        };
        Self {
            recipient: message.sender_email.clone(),
            subject,
            in_reply_to: Some(message.id),
            ..Self::default()
        }
    }

    /// Recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The message this draft replies to, if any.
    #[must_use]
    pub const fn in_reply_to(&self) -> Option<MessageId> {
        self.in_reply_to
    }

    /// Current send status.
    #[must_use]
    pub const fn status(&self) -> SendStatus {
        self.status
    }

    /// Returns whether a send is in progress.
    #[must_use]
    pub const fn is_sending(&self) -> bool {
        matches!(self.status, SendStatus::Sending)
    }

    /// Error from the last failed send attempt.
    #[must_use]
    pub const fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Returns whether the draft has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipient.is_empty() && self.subject.is_empty() && self.body.is_empty()
    }

    /// Sets the recipient. Returns `false` if the edit was ignored.
    pub fn set_recipient(&mut self, recipient: impl Into<String>) -> bool {
        if !self.edit() {
            return false;
        }
        self.recipient = recipient.into();
        true
    }

    /// Sets the subject. Returns `false` if the edit was ignored.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> bool {
        if !self.edit() {
            return false;
        }
        self.subject = subject.into();
        true
    }

    /// Sets the body. Returns `false` if the edit was ignored.
    pub fn set_body(&mut self, body: impl Into<String>) -> bool {
        if !self.edit() {
            return false;
        }
        self.body = body.into();
        true
    }

    /// Starts a send attempt and returns the message to hand to the store.
    ///
    /// Allowed from [`SendStatus::Idle`] and, as a retry, from
    /// [`SendStatus::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a send is already in progress, the body
    /// is blank or there is no recipient. The draft is left unchanged.
    pub fn begin_send(&mut self, identity: &Identity) -> Result<NewMessage> {
        if self.is_sending() {
            return Err(Error::validation("message is already being sent"));
        }
        if self.body.trim().is_empty() {
            return Err(Error::validation("message body is empty"));
        }
        let recipient = self.recipient.trim();
        if recipient.is_empty() {
            return Err(Error::validation("message has no recipient"));
        }

        let subject = match self.subject.trim() {
            "" => DEFAULT_SUBJECT.to_string(),
            subject => subject.to_string(),
        };
        let message = NewMessage {
            sender_name: identity.name.clone(),
            sender_email: identity.email.clone(),
            recipient: recipient.to_string(),
            subject,
            body: self.body.clone(),
        };
        self.status = SendStatus::Sending;
        self.last_error = None;
        Ok(message)
    }

    /// Records the outcome of the send started by [`begin_send`](Self::begin_send)
    /// and returns the resulting status.
    ///
    /// On success the draft is cleared and becomes idle again. Outcomes that
    /// arrive while no send is in progress are ignored.
    pub fn complete(&mut self, outcome: &Result<MessageId>) -> SendStatus {
        if !self.is_sending() {
            return self.status;
        }
        match outcome {
            Ok(_) => {
                *self = Self::default();
                SendStatus::Sent
            }
            Err(err) => {
                self.status = SendStatus::Failed;
                self.last_error = Some(err.clone());
                SendStatus::Failed
            }
        }
    }

    fn edit(&mut self) -> bool {
        match self.status {
            SendStatus::Sending => false,
            SendStatus::Idle => true,
            SendStatus::Sent | SendStatus::Failed => {
                self.status = SendStatus::Idle;
                self.last_error = None;
                true
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::error::ErrorKind;

    fn me() -> Identity {
        Identity::new("Richard Brown", "richard.brown@business.com")
    }

    fn original(subject: &str) -> MailMessage {
        MailMessage {
            id: MessageId(7),
            sender_name: "Michael Lee".into(),
            sender_email: "michael.lee@business.com".into(),
            recipient: "richard.brown@business.com".into(),
            subject: subject.into(),
            body: "Can we meet?".into(),
            preview: "Can we meet?".into(),
            created_at: Utc::now(),
            is_read: true,
            archived: false,
            attachments: Vec::new(),
        }
    }

    fn filled() -> Draft {
        let mut draft = Draft::new();
        draft.set_recipient("jane@example.com");
        draft.set_body("Hello Jane");
        draft
    }

    #[test]
    fn test_reply_prefills_recipient_and_subject() {
        let draft = Draft::reply_to(&original("Meeting"));
        assert_eq!(draft.recipient(), "michael.lee@business.com");
        assert_eq!(draft.subject(), "Re: Meeting");
        assert_eq!(draft.in_reply_to(), Some(MessageId(7)));

        let again = Draft::reply_to(&original("RE: Meeting"));
        assert_eq!(again.subject(), "RE: Meeting");
    }

    #[test]
    fn test_begin_send_builds_message_from_identity() {
        let mut draft = filled();
        let message = draft.begin_send(&me()).unwrap();

        assert_eq!(message.sender_name, "Richard Brown");
        assert_eq!(message.sender_email, "richard.brown@business.com");
        assert_eq!(message.subject, DEFAULT_SUBJECT);
        assert_eq!(draft.status(), SendStatus::Sending);
    }

    #[test]
    fn test_blank_body_is_rejected() {
        let mut draft = Draft::new();
        draft.set_recipient("jane@example.com");
        draft.set_body("   ");

        let err = draft.begin_send(&me()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(draft.status(), SendStatus::Idle);
    }

    #[test]
    fn test_missing_recipient_is_rejected() {
        let mut draft = Draft::new();
        draft.set_body("Hi");
        assert!(draft.begin_send(&me()).is_err());
    }

    #[test]
    fn test_second_send_while_sending_is_rejected() {
        let mut draft = filled();
        draft.begin_send(&me()).unwrap();
        assert!(draft.begin_send(&me()).is_err());
        assert!(!draft.set_body("changed"));
        assert_eq!(draft.body(), "Hello Jane");
    }

    #[test]
    fn test_success_resets_draft() {
        let mut draft = filled();
        draft.begin_send(&me()).unwrap();

        assert_eq!(draft.complete(&Ok(MessageId(9))), SendStatus::Sent);
        assert!(draft.is_empty());
        assert_eq!(draft.status(), SendStatus::Idle);
    }

    #[test]
    fn test_failure_keeps_content_until_edit() {
        let mut draft = filled();
        draft.begin_send(&me()).unwrap();

        let outcome = Err(Error::network("connection refused"));
        assert_eq!(draft.complete(&outcome), SendStatus::Failed);
        assert_eq!(draft.body(), "Hello Jane");
        assert_eq!(
            draft.last_error().map(Error::kind),
            Some(ErrorKind::NetworkFailure)
        );

        assert!(draft.set_body("Hello Jane, again"));
        assert_eq!(draft.status(), SendStatus::Idle);
        assert!(draft.last_error().is_none());
    }

    #[test]
    fn test_retry_from_failed() {
        let mut draft = filled();
        draft.begin_send(&me()).unwrap();
        draft.complete(&Err(Error::network("timeout")));

        draft.begin_send(&me()).unwrap();
        assert_eq!(draft.status(), SendStatus::Sending);
        assert_eq!(draft.complete(&Ok(MessageId(3))), SendStatus::Sent);
    }

    #[test]
    fn test_late_outcome_is_ignored() {
        let mut draft = filled();
        assert_eq!(draft.complete(&Ok(MessageId(1))), SendStatus::Idle);
        assert_eq!(draft.body(), "Hello Jane");
    }
}
