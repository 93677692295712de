use http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};

use super::types::{BotMessage, MessageId, ParseOutcome, SoftDeleted, TrashedMessage};
use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::types::{Payload, UserId};

/// Header telling the server which channel a bot message arrived through.
pub const MESSAGE_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-message-source");

#[derive(Serialize)]
struct MessageRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
}

/// Message listings come as `{"messages": [...]}` or as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageListing {
    Wrapped { messages: Vec<BotMessage> },
    Listed(Vec<BotMessage>),
}

impl Default for MessageListing {
    fn default() -> Self {
        Self::Listed(Vec::new())
    }
}

impl MessageListing {
    fn into_messages(self) -> Vec<BotMessage> {
        match self {
            Self::Wrapped { messages } | Self::Listed(messages) => messages,
        }
    }
}

/// The bot ingestion channel: messages whose links the server parses and
/// files as collections.
///
/// Deleting a message only moves it to the trash. The server decides how
/// long it stays there; [`Bot::delete`] reports that as `expires_in_days`.
#[derive(Debug, Clone, Copy)]
pub struct Bot<'a> {
    client: &'a ApiClient,
}

impl<'a> Bot<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Most recent messages first, at most `limit` of them.
    pub async fn messages(&self, limit: u32) -> Result<Vec<BotMessage>, Error> {
        let listing = self
            .client
            .request::<Payload<MessageListing>>(
                Method::GET,
                "/bot/messages",
                None,
                RequestOptions::new().with_query("limit", limit),
            )
            .await?;
        Ok(listing.into_data_or_default().into_messages())
    }

    /// Submit `message` for link extraction, tagged with `source`.
    ///
    /// A message with no recognizable link comes back as
    /// [`Error::RequestFailed`] carrying the server's explanation.
    pub async fn parse(&self, message: &str, source: &str) -> Result<ParseOutcome, Error> {
        let source = match HeaderValue::from_str(source) {
            Ok(value) => value,
            Err(e) => {
                return Err(self
                    .client
                    .report(Error::Config(format!("message source: {e}"))));
            }
        };
        let body = MessageRequest {
            message,
            user_id: self.client.session().identity().map(|identity| identity.id),
        };
        let options = RequestOptions::new().with_header(MESSAGE_SOURCE_HEADER, source);
        self.client
            .submit(Method::POST, "/bot/message", &body, options)
            .await
    }

    /// Move a message to the trash.
    pub async fn delete(&self, id: MessageId) -> Result<SoftDeleted, Error> {
        self.client
            .fetch(Method::DELETE, &path(id), RequestOptions::default())
            .await
    }

    pub async fn trash(&self) -> Result<Vec<TrashedMessage>, Error> {
        self.client
            .fetch_list("/bot/messages/trash", RequestOptions::default())
            .await
    }

    pub async fn restore(&self, id: MessageId) -> Result<(), Error> {
        self.client
            .perform(Method::POST, &format!("{}/restore", path(id)))
            .await
    }

    /// Delete a trashed message for good.
    pub async fn purge(&self, id: MessageId) -> Result<(), Error> {
        self.client
            .perform(Method::DELETE, &format!("{}/purge", path(id)))
            .await
    }
}

fn path(id: MessageId) -> String {
    format!("/bot/messages/{id}")
}
