//! Session state: the current credential and the cached user identity.
//!
//! [`SessionStore`] is the single writer of the credential. It caches the
//! durable values in memory on first read, so lookups never touch storage
//! twice.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::{Credential, Identity};

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const IDENTITY_KEY: &str = "user";

/// Shared handle to the session. Cloning is cheap and clones observe the same
/// state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Box<dyn KeyValueStore>,
    cache: Mutex<Option<Cached>>,
}

#[derive(Clone, Default)]
struct Cached {
    credential: Option<Credential>,
    identity: Option<Identity>,
}

impl SessionStore {
    /// Session backed by `storage`. Nothing is read until first access.
    #[must_use]
    pub fn new(storage: impl KeyValueStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage: Box::new(storage),
                cache: Mutex::new(None),
            }),
        }
    }

    /// Session that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Current credential, if signed in.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.with_cache(|cached| cached.credential.clone())
    }

    /// Cached user profile, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.with_cache(|cached| cached.identity.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.with_cache(|cached| cached.credential.is_some())
    }

    /// Replace the current credential.
    ///
    /// The in-memory value is replaced before this returns, even when the
    /// durable write fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the durable write failed.
    pub fn set_credential(&self, credential: Credential) -> Result<(), Error> {
        let storage = &self.inner.storage;
        self.with_cache(|cached| {
            let persisted = storage
                .set(ACCESS_TOKEN_KEY, &credential.access_token)
                .and_then(|()| match &credential.refresh_token {
                    Some(token) => storage.set(REFRESH_TOKEN_KEY, token),
                    None => storage.remove(REFRESH_TOKEN_KEY),
                });
            cached.credential = Some(credential);
            persisted
        })
    }

    /// Replace the cached user profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the durable write failed.
    pub fn set_identity(&self, identity: Identity) -> Result<(), Error> {
        self.with_cache(|cached| {
            let persisted = serde_json::to_string(&identity)
                .map_err(Error::from)
                .and_then(|json| self.inner.storage.set(IDENTITY_KEY, &json));
            cached.identity = Some(identity);
            persisted
        })
    }

    /// Forget the credential and the identity. Safe to call when already
    /// signed out.
    pub fn clear(&self) {
        self.with_cache(|cached| {
            *cached = Cached::default();
            for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, IDENTITY_KEY] {
                if let Err(e) = self.inner.storage.remove(key) {
                    tracing::warn!(key, error = %e, "Failed to remove session key");
                }
            }
        });
    }

    /// Storage writes happen under this lock so memory and storage agree.
    fn with_cache<R>(&self, f: impl FnOnce(&mut Cached) -> R) -> R {
        let mut guard = self.inner.cache.lock();
        let cached = guard.get_or_insert_with(|| self.load());
        f(cached)
    }

    fn load(&self) -> Cached {
        let credential = self.read(ACCESS_TOKEN_KEY).map(|access_token| Credential {
            access_token,
            refresh_token: self.read(REFRESH_TOKEN_KEY),
        });

        let identity = self
            .read(IDENTITY_KEY)
            .and_then(|raw| match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding corrupt cached identity");
                    let _ = self.inner.storage.remove(IDENTITY_KEY);
                    None
                }
            });

        Cached {
            credential,
            identity,
        }
    }

    /// Reads a key, treating failures and blank values as absence.
    fn read(&self, key: &str) -> Option<String> {
        match self.inner.storage.get(key) {
            Ok(Some(value)) if !value.trim().is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Session storage read failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
