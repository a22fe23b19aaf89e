//! Application state and event handling.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use mailpane_core::{
    CacheKey, Draft, Filter, Identity, MailAuthority, MailClient, MessageId, Subscription,
    ViewData, ViewState,
};

use crate::message::Message;

/// What the composer pane shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composer {
    /// No composer.
    #[default]
    Hidden,
    /// Replying to the selected message, below its detail.
    Reply,
    /// Writing a new message in place of the detail pane.
    New,
}

/// Whether the event loop keeps running after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading commands.
    Continue,
    /// Leave the application.
    Quit,
}

/// Main application state.
pub struct App<A> {
    /// Cached views and mutations.
    client: MailClient<A>,
    /// Sender of outgoing mail.
    identity: Identity,
    /// Mailbox shown in the list pane.
    filter: Filter,
    /// Message shown in the detail pane.
    selected: Option<MessageId>,
    /// Whether the sidebar is collapsed.
    sidebar_collapsed: bool,
    /// Composer mode.
    composer: Composer,
    /// Message being written.
    draft: Draft,
    /// One-line feedback for the last command.
    status: Option<String>,
    /// Whether to show the command summary.
    show_help: bool,
    /// Redraw requests from subscription callbacks.
    redraw: UnboundedSender<CacheKey>,
    list_subscription: Subscription,
    detail_subscription: Option<Subscription>,
}

impl<A: MailAuthority> App<A> {
    /// Creates the app showing the inbox, with nothing selected.
    pub fn new(client: MailClient<A>, identity: Identity, redraw: UnboundedSender<CacheKey>) -> Self {
        let list_subscription = watch(&client, &redraw, CacheKey::List(Filter::All));
        Self {
            client,
            identity,
            filter: Filter::All,
            selected: None,
            sidebar_collapsed: false,
            composer: Composer::Hidden,
            draft: Draft::new(),
            status: None,
            show_help: false,
            redraw,
            list_subscription,
            detail_subscription: None,
        }
    }

    /// Handles one event.
    pub async fn update(&mut self, message: Message) -> Flow {
        debug!(?message, "update");
        self.status = None;
        self.show_help = false;

        match message {
            Message::ShowList(filter) => self.show_list(filter),
            Message::Open(id) => self.open(id).await,
            Message::ToggleSidebar => {
                self.sidebar_collapsed = !self.sidebar_collapsed;
            }
            Message::Refresh => {
                self.client.refresh(CacheKey::List(self.filter));
                if let Some(id) = self.selected {
                    self.client.refresh(CacheKey::Detail(id));
                }
            }
            Message::ToggleArchive(id) => {
                if let Some(id) = self.target(id) {
                    self.toggle_archive(id).await;
                }
            }
            Message::Delete(id) => {
                if let Some(id) = self.target(id) {
                    self.delete(id).await;
                }
            }
            Message::MarkUnread(id) => {
                if let Some(id) = self.target(id)
                    && let Err(e) = self.client.mark_unread(id).await
                {
                    self.status = Some(format!("Could not mark message {id} unread: {e}"));
                }
            }
            Message::ComposeNew => {
                self.draft = Draft::new();
                self.composer = Composer::New;
            }
            Message::Reply => self.reply(),
            Message::SetRecipient(recipient) => self.edit(|draft| draft.set_recipient(recipient)),
            Message::SetSubject(subject) => self.edit(|draft| draft.set_subject(subject)),
            Message::SetBody(body) => self.edit(|draft| draft.set_body(body)),
            Message::Send => self.send().await,
            Message::Help => self.show_help = true,
            Message::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn show_list(&mut self, filter: Filter) {
        if filter != self.filter {
            self.filter = filter;
            self.list_subscription = watch(&self.client, &self.redraw, CacheKey::List(filter));
        }
    }

    async fn open(&mut self, id: MessageId) {
        if self.selected != Some(id) {
            self.selected = Some(id);
            self.detail_subscription = Some(watch(&self.client, &self.redraw, CacheKey::Detail(id)));
            if self.composer == Composer::Reply {
                self.composer = Composer::Hidden;
                self.draft = Draft::new();
            }
        }
        if self.composer == Composer::New {
            self.composer = Composer::Hidden;
        }

        match self.client.load(CacheKey::Detail(id)).await {
            Ok(ViewData::Message(message)) if !message.is_read => {
                if let Err(e) = self.client.mark_read(id).await {
                    warn!(%id, error = %e, "Failed to mark message read");
                    self.status = Some(format!("Could not mark message {id} read: {e}"));
                }
            }
            Ok(_) => {}
            Err(e) => self.status = Some(format!("Could not open message {id}: {e}")),
        }
    }

    async fn toggle_archive(&mut self, id: MessageId) {
        let result = if self.is_archived(id) {
            self.client.unarchive(id).await
        } else {
            self.client.archive(id).await
        };
        self.status = Some(match result {
            Ok(message) if message.archived => format!("Archived message {id}"),
            Ok(_) => format!("Moved message {id} to the inbox"),
            Err(e) => format!("Could not archive message {id}: {e}"),
        });
    }

    async fn delete(&mut self, id: MessageId) {
        match self.client.delete(id).await {
            Ok(()) => {
                if self.selected == Some(id) {
                    self.selected = None;
                    self.detail_subscription = None;
                    if self.composer == Composer::Reply {
                        self.composer = Composer::Hidden;
                        self.draft = Draft::new();
                    }
                }
                self.status = Some(format!("Deleted message {id}"));
            }
            Err(e) => self.status = Some(format!("Could not delete message {id}: {e}")),
        }
    }

    fn reply(&mut self) {
        let state = self.selected.map(|id| self.client.read(CacheKey::Detail(id)));
        match state.as_ref().and_then(ViewState::message) {
            Some(message) => {
                self.draft = Draft::reply_to(message);
                self.composer = Composer::Reply;
            }
            None => self.status = Some("Open a message to reply to it".to_string()),
        }
    }

    fn edit(&mut self, apply: impl FnOnce(&mut Draft) -> bool) {
        if self.composer == Composer::Hidden {
            self.status = Some("No draft open; use `new` or `reply`".to_string());
        } else if !apply(&mut self.draft) {
            self.status = Some("The draft is being sent".to_string());
        }
    }

    async fn send(&mut self) {
        if self.composer == Composer::Hidden {
            self.status = Some("No draft open; use `new` or `reply`".to_string());
            return;
        }
        match self.client.send_draft(&mut self.draft, &self.identity).await {
            Ok(id) => {
                info!(%id, "Sent message");
                self.composer = Composer::Hidden;
                self.status = Some("Message sent".to_string());
            }
            Err(e) => self.status = Some(format!("Send failed: {e}")),
        }
    }

    /// Resolves an optional command argument to the selected message.
    fn target(&mut self, id: Option<MessageId>) -> Option<MessageId> {
        let target = id.or(self.selected);
        if target.is_none() {
            self.status = Some("No message selected".to_string());
        }
        target
    }

    fn is_archived(&self, id: MessageId) -> bool {
        let cache = self.client.cache();
        if let Some(state) = cache.peek(CacheKey::Detail(id))
            && let Some(message) = state.message()
        {
            return message.archived;
        }
        if let Some(state) = cache.peek(CacheKey::List(self.filter))
            && let Some(entry) = state.list().and_then(|list| list.iter().find(|e| e.id == id))
        {
            return entry.archived;
        }
        self.filter == Filter::Archive
    }

    /// Returns the mail client.
    pub const fn client(&self) -> &MailClient<A> {
        &self.client
    }

    /// Returns the active filter.
    pub const fn filter(&self) -> Filter {
        self.filter
    }

    /// Returns the selected message id.
    pub const fn selected(&self) -> Option<MessageId> {
        self.selected
    }

    /// Returns whether the sidebar is collapsed.
    pub const fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    /// Returns the composer mode.
    pub const fn composer(&self) -> Composer {
        self.composer
    }

    /// Returns the draft.
    pub const fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Returns the sender identity.
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the feedback line for the last command.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Returns whether the command summary should be shown.
    pub const fn show_help(&self) -> bool {
        self.show_help
    }

    /// Returns the key of the list subscription.
    pub const fn list_key(&self) -> CacheKey {
        self.list_subscription.key()
    }
}

/// Subscribes to `key`, turning every change into a redraw request.
fn watch<A: MailAuthority>(
    client: &MailClient<A>,
    redraw: &UnboundedSender<CacheKey>,
    key: CacheKey,
) -> Subscription {
    let redraw = redraw.clone();
    client.subscribe(key, move |_| {
        // The receiver is gone only while shutting down.
        redraw.send(key).ok();
    })
}
