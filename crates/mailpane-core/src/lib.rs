//! # mailpane-core
//!
//! Client-side state for the `MailPane` email client.
//!
//! ## Features
//!
//! - **Keyed view cache**: one entry per list filter and per message, read
//!   synchronously and refreshed in the background
//! - **Fetch deduplication**: concurrent requests for one key share a single
//!   call to the mail store
//! - **Mutation coordination**: read, archive, delete and send acknowledged by
//!   the store before the cache is touched, followed by targeted invalidation
//! - **View subscriptions**: callbacks fire once per change of value or error
//! - **Compose state**: drafts with an explicit send cycle
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpane_core::{CacheKey, Filter, InMemoryAuthority, MailClient};
//!
//! #[tokio::main]
//! async fn main() -> mailpane_core::Result<()> {
//!     let client = MailClient::new(InMemoryAuthority::new());
//!
//!     let _inbox = client.subscribe(CacheKey::List(Filter::All), |state| {
//!         if let Some(entries) = state.list() {
//!             println!("{} messages", entries.len());
//!         }
//!     });
//!
//!     let unread = client.load(CacheKey::List(Filter::Unread)).await?;
//!     println!("{unread:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod authority;
pub mod cache;
pub mod client;
pub mod coalesce;
pub mod draft;
mod error;
pub mod key;
pub mod model;
pub mod mutation;
pub mod registry;

pub use authority::{CallCounts, InMemoryAuthority, MailAuthority};
pub use cache::MailCache;
pub use client::MailClient;
pub use coalesce::{Abandoned, FetchCoalescer};
pub use draft::{DEFAULT_SUBJECT, Draft, SendStatus};
pub use error::{Error, ErrorKind, Result};
pub use key::{CacheKey, Freshness, ParseKeyError, ViewData, ViewState};
pub use model::{
    Attachment, Filter, Identity, ListEntry, MailMessage, MessageId, MessageUpdate, NewMessage,
    ParseFilterError, PREVIEW_CHARS, preview_of,
};
pub use mutation::MutationCoordinator;
pub use registry::{Callback, Subscription, SubscriptionId, SubscriptionRegistry};
