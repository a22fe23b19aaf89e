//! HTTP client for the mail store's REST API.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use mailpane_core::{
    Filter, ListEntry, MailAuthority, MailMessage, MessageId, MessageUpdate, NewMessage,
};

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::wire::{ErrorResponse, ListResponse};

/// Mail store reached over HTTP.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Config,
    http_client: Client,
}

impl ApiClient {
    /// Creates a client for the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Lists messages matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self, filter: Filter) -> Result<Vec<ListEntry>> {
        let mut url = self.config.emails_url()?;
        url.query_pairs_mut().append_pair("filter", filter.as_str());
        debug!(%url, "GET");

        let response = self.http_client.get(url).send().await?;
        let body: ListResponse = parse(check(response, None).await?).await?;
        Ok(body.emails)
    }

    /// Fetches one message.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the server does not know `id`.
    pub async fn get(&self, id: MessageId) -> Result<MailMessage> {
        let url = self.config.email_url(id)?;
        debug!(%url, "GET");

        let response = self.http_client.get(url).send().await?;
        parse(check(response, Some(id)).await?).await
    }

    /// Applies a partial flag update.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the server does not know `id`.
    pub async fn update(&self, id: MessageId, update: MessageUpdate) -> Result<MailMessage> {
        let url = self.config.email_url(id)?;
        debug!(%url, ?update, "PUT");

        let response = self.http_client.put(url).json(&update).send().await?;
        parse(check(response, Some(id)).await?).await
    }

    /// Deletes a message.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the server does not know `id`.
    pub async fn delete(&self, id: MessageId) -> Result<()> {
        let url = self.config.email_url(id)?;
        debug!(%url, "DELETE");

        let response = self.http_client.delete(url).send().await?;
        check(response, Some(id)).await?;
        Ok(())
    }

    /// Creates a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create(&self, message: &NewMessage) -> Result<MailMessage> {
        let url = self.config.emails_url()?;
        debug!(%url, recipient = %message.recipient, "POST");

        let response = self.http_client.post(url).json(message).send().await?;
        parse(check(response, None).await?).await
    }
}

/// Turns non-success statuses into errors. A 404 for a known id becomes
/// [`ApiError::NotFound`].
async fn check(response: Response, id: Option<MessageId>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(ApiError::NotFound(id));
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.detail)
        .unwrap_or(body);
    Err(ApiError::status(status.as_u16(), detail))
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl MailAuthority for ApiClient {
    async fn list_messages(&self, filter: Filter) -> mailpane_core::Result<Vec<ListEntry>> {
        Ok(self.list(filter).await?)
    }

    async fn get_message(&self, id: MessageId) -> mailpane_core::Result<MailMessage> {
        Ok(self.get(id).await?)
    }

    async fn update_message(
        &self,
        id: MessageId,
        update: MessageUpdate,
    ) -> mailpane_core::Result<MailMessage> {
        Ok(self.update(id, update).await?)
    }

    async fn delete_message(&self, id: MessageId) -> mailpane_core::Result<()> {
        Ok(self.delete(id).await?)
    }

    async fn create_message(&self, message: NewMessage) -> mailpane_core::Result<MailMessage> {
        Ok(self.create(&message).await?)
    }
}
