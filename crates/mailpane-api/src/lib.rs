//! # mailpane-api
//!
//! HTTP binding between `mailpane-core` and the mail store's REST API.
//!
//! ## Endpoints
//!
//! - `GET /emails?filter=all|unread|archive` returns `{"emails": [...]}`
//! - `GET /emails/{id}`, `PUT /emails/{id}` (partial flags), `DELETE /emails/{id}`
//! - `POST /emails` creates a message
//!
//! A 404 for a message id is reported as not found; every other failure is a
//! network failure as far as the cache is concerned.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpane_api::{ApiClient, Config};
//! use mailpane_core::{CacheKey, Filter, MailClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder("http://localhost:8000")
//!         .request_timeout(std::time::Duration::from_secs(10))
//!         .build()?;
//!     let client = MailClient::new(ApiClient::new(config)?);
//!
//!     let inbox = client.load(CacheKey::List(Filter::All)).await?;
//!     println!("{inbox:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::ApiClient;
pub use config::{Config, ConfigBuilder, DEFAULT_BASE_URL};
pub use error::{ApiError, Result};
