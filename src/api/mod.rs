//! Typed wrappers over the Linkstash REST endpoints.
//!
//! Each wrapper borrows an [`ApiClient`], so every call goes through the
//! same session, refresh coordinator and notifier as the raw verbs.

mod auth;
mod bot;
mod categories;
mod collections;
pub mod types;

use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use self::auth::{Auth, ProfileUpdate, Registration};
pub use self::bot::{Bot, MESSAGE_SOURCE_HEADER};
pub use self::categories::Categories;
pub use self::collections::Collections;
pub use self::types::*;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::types::Payload;

impl ApiClient {
    #[must_use]
    pub fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    #[must_use]
    pub fn collections(&self) -> Collections<'_> {
        Collections::new(self)
    }

    #[must_use]
    pub fn categories(&self) -> Categories<'_> {
        Categories::new(self)
    }

    #[must_use]
    pub fn bot(&self) -> Bot<'_> {
        Bot::new(self)
    }

    /// Bodyless call whose payload may or may not be enveloped.
    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, Error> {
        self.request::<Payload<T>>(method, path, None, options)
            .await?
            .into_data()
            .map_err(|e| self.report(e))
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Vec<T>, Error> {
        Ok(self
            .request::<Payload<Vec<T>>>(Method::GET, path, None, options)
            .await?
            .into_data_or_default())
    }

    async fn submit<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_body::<B, Payload<T>>(method, path, body, options)
            .await?
            .into_data()
            .map_err(|e| self.report(e))
    }

    /// Call for its effect only; any successful body is discarded.
    async fn perform(&self, method: Method, path: &str) -> Result<(), Error> {
        let _: serde_json::Value = self
            .request(method, path, None, RequestOptions::default())
            .await?;
        Ok(())
    }
}
