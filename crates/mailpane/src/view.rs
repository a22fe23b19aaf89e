//! Text rendering of the application state.
//!
//! Rendering only peeks at the cache: drawing a screen never starts a fetch.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use mailpane_core::{
    CacheKey, ErrorKind, Filter, ListEntry, MailAuthority, MailMessage, MessageId, SendStatus,
    ViewState,
};

use crate::app::{App, Composer};
use crate::display::{avatar_color, format_full_date, format_list_date, initials, truncate};
use crate::message::HELP;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RULE: &str = "────────────────────────────────────────────────────────────";

/// Renders the whole screen.
pub fn render<A: MailAuthority>(app: &App<A>, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    if !app.sidebar_collapsed() {
        render_sidebar(&mut out, app);
    }
    render_list(&mut out, app, now);

    match (app.composer(), app.selected()) {
        (Composer::New, _) => render_composer(&mut out, app, "New Message"),
        (_, Some(id)) => {
            render_detail(&mut out, app, id);
            if app.composer() == Composer::Reply {
                render_composer(&mut out, app, "Reply");
            }
        }
        (_, None) => {
            let _ = writeln!(out, "{DIM}No message selected{RESET}");
        }
    }

    if app.show_help() {
        let _ = writeln!(out, "{HELP}");
    }
    if let Some(status) = app.status() {
        let _ = writeln!(out, "{BOLD}{status}{RESET}");
    }
    out
}

fn render_sidebar<A: MailAuthority>(out: &mut String, app: &App<A>) {
    let identity = app.identity();
    let _ = writeln!(out, "{BOLD}{}{RESET} <{}>", identity.name, identity.email);
    let tabs: Vec<String> = Filter::ALL
        .iter()
        .map(|&filter| {
            let label = filter.as_str();
            let count = app
                .client()
                .cache()
                .peek(CacheKey::List(filter))
                .and_then(|state| state.list().map(<[ListEntry]>::len));
            let label = count.map_or_else(|| label.to_string(), |n| format!("{label} ({n})"));
            if filter == app.filter() {
                format!("{BOLD}[{label}]{RESET}")
            } else {
                format!(" {label} ")
            }
        })
        .collect();
    let _ = writeln!(out, "{}", tabs.join("  "));
    let _ = writeln!(out, "{RULE}");
}

fn render_list<A: MailAuthority>(out: &mut String, app: &App<A>, now: DateTime<Utc>) {
    let state = app.client().cache().peek(app.list_key()).unwrap_or_else(ViewState::loading);

    match state.list() {
        Some([]) => {
            let _ = writeln!(out, "{DIM}No messages{RESET}");
        }
        Some(entries) => {
            for entry in entries {
                render_row(out, entry, app.selected() == Some(entry.id), now);
            }
        }
        None if state.is_loading() => {
            let _ = writeln!(out, "{DIM}Loading...{RESET}");
        }
        None => {}
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "{BOLD}Could not load messages: {error}{RESET}");
    }
    let _ = writeln!(out, "{RULE}");
}

fn render_row(out: &mut String, entry: &ListEntry, selected: bool, now: DateTime<Utc>) {
    let marker = if selected { '>' } else { ' ' };
    let unread = if entry.is_read { ' ' } else { '*' };
    let weight = if entry.is_read { "" } else { BOLD };
    let _ = writeln!(
        out,
        "{marker}{unread} {:>4} {}{:^4}{RESET} {weight}{:<20}{RESET} {:<32} {DIM}{}{RESET}",
        entry.id,
        avatar_color(&entry.sender_name).ansi(),
        initials(&entry.sender_name),
        truncate(&entry.sender_name, 20),
        truncate(&entry.subject, 32),
        format_list_date(entry.created_at, now),
    );
    let _ = writeln!(out, "           {DIM}{}{RESET}", truncate(&entry.preview, 60));
}

fn render_detail<A: MailAuthority>(out: &mut String, app: &App<A>, id: MessageId) {
    let state = app
        .client()
        .cache()
        .peek(CacheKey::Detail(id))
        .unwrap_or_else(ViewState::loading);

    if state.is_removed() {
        let _ = writeln!(out, "{DIM}Message {id} was deleted{RESET}");
        return;
    }
    match state.message() {
        Some(message) => render_message(out, message),
        None if state.is_loading() => {
            let _ = writeln!(out, "{DIM}Loading message {id}...{RESET}");
        }
        None => {}
    }
    if let Some(error) = &state.error
        && error.kind() != ErrorKind::NotFound
    {
        let _ = writeln!(out, "{BOLD}Could not load message {id}: {error}{RESET}");
    }
}

fn render_message(out: &mut String, message: &MailMessage) {
    let archived = if message.archived { " [archived]" } else { "" };
    let _ = writeln!(out, "{BOLD}{}{RESET}{archived}", message.subject);
    let _ = writeln!(
        out,
        "{}{:^4}{RESET} {} <{}>",
        avatar_color(&message.sender_name).ansi(),
        initials(&message.sender_name),
        message.sender_name,
        message.sender_email,
    );
    let _ = writeln!(out, "     to {}", message.recipient);
    let _ = writeln!(out, "     {DIM}{}{RESET}", format_full_date(message.created_at));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", message.body);
    for attachment in &message.attachments {
        let _ = writeln!(out, "  [{}] {} ({})", attachment.name, attachment.url, attachment.size);
    }
    let _ = writeln!(out, "{RULE}");
}

fn render_composer<A: MailAuthority>(out: &mut String, app: &App<A>, title: &str) {
    let draft = app.draft();
    let _ = writeln!(out, "{BOLD}{title}{RESET}");
    let _ = writeln!(out, "  To:      {}", draft.recipient());
    let _ = writeln!(out, "  Subject: {}", draft.subject());
    let _ = writeln!(out, "  {}", draft.body());
    match draft.status() {
        SendStatus::Sending => {
            let _ = writeln!(out, "{DIM}Sending...{RESET}");
        }
        SendStatus::Failed => {
            if let Some(error) = draft.last_error() {
                let _ = writeln!(out, "{BOLD}Not sent: {error}{RESET}");
            }
        }
        SendStatus::Idle | SendStatus::Sent => {}
    }
    let _ = writeln!(out, "{RULE}");
}
