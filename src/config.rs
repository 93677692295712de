use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Linkstash client configuration.
///
/// Required field (`base_url`) is a constructor parameter. Everything else has
/// a default and can be overridden with `with_*` methods.
///
/// ```rust,ignore
/// use linkstash_client::ClientConfig;
///
/// let config = ClientConfig::new("https://stash.example.com/api/v1".parse()?)
///     .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) session_dir: Option<PathBuf>,
    pub(crate) user_agent: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            session_dir: None,
            user_agent: concat!("linkstash-client/", env!("CARGO_PKG_VERSION")).into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `LINKSTASH_API_URL`: API base URL including the prefix, e.g.
    ///   `https://stash.example.com/api/v1`
    ///
    /// # Optional env vars
    /// - `LINKSTASH_TIMEOUT_SECS`: Per-request timeout (default 10)
    /// - `LINKSTASH_SESSION_DIR`: Directory holding the persisted session
    /// - `LINKSTASH_USER_AGENT`: Override the `User-Agent` header
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values
    /// are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url_str = std::env::var("LINKSTASH_API_URL")
            .map_err(|_| Error::Config("LINKSTASH_API_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("LINKSTASH_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(secs) = std::env::var("LINKSTASH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("LINKSTASH_TIMEOUT_SECS: {e}")))?;
            if secs == 0 {
                return Err(Error::Config("LINKSTASH_TIMEOUT_SECS must be positive".into()));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var("LINKSTASH_SESSION_DIR") {
            config = config.with_session_dir(dir);
        }
        if let Ok(agent) = std::env::var("LINKSTASH_USER_AGENT") {
            config = config.with_user_agent(agent);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// API base URL; request paths are joined under it.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Directory for the persisted session.
    ///
    /// Falls back to the platform data directory (for example
    /// `~/.local/share/linkstash/session` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no override is set and the platform has no
    /// home directory.
    pub fn session_dir(&self) -> Result<PathBuf, Error> {
        if let Some(dir) = &self.session_dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("", "", "linkstash")
            .map(|dirs| dirs.data_dir().join("session"))
            .ok_or_else(|| Error::Config("no home directory for session storage".into()))
    }
}
