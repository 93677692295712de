#![doc = include_str!("../README.md")]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
mod interceptor;
pub mod notify;
mod refresh;
mod retry;
pub mod session;
pub mod storage;
#[cfg(test)]
mod testing;
pub mod transport;
pub mod types;

// Re-exports for convenient access
pub use api::{
    Auth, Bot, Categories, Category, CategoryDraft, CategoryId, Collection, CollectionDraft,
    CollectionId, CollectionQuery, Collections, MessageId, ProfileUpdate, Registration,
};
pub use client::{ApiClient, RequestOptions};
pub use config::ClientConfig;
pub use error::Error;
pub use notify::{Notifier, TracingNotifier};
pub use refresh::RefreshState;
pub use session::SessionStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
#[cfg(feature = "http-transport")]
pub use transport::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, Transport};
pub use types::{ApiEnvelope, Credential, Identity, TokenResponse, UserId};
