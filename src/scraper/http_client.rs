use crate::config::IntranetConfig;
use crate::error::{Error, Result, SiteError};
use crate::models::Credentials;
use crate::scraper::auth::Authenticator;
use reqwest::StatusCode;
use std::fmt;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{FixedInterval, jitter};
use tracing::{debug, warn};
use url::Url;

/// Login page path, relative to the intranet root. The site answers with and
/// without the `/Specialisation/Sgdf` prefix; we always use the prefixed form.
pub const LOGIN_PATH: &str = "/Specialisation/Sgdf/Default.aspx";

// ── Requests and pages ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One concrete HTTP request. Built per navigation step, never mutated after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the configured base URL.
    pub target: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl PageRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            target: target.into(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post(target: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            target: target.into(),
            query: Vec::new(),
            form,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A fetched page: where we ended up after redirects, and what it said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl RawPage {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            body: body.into(),
        }
    }

    fn path_endswith(&self, suffix: &str) -> bool {
        self.url.path().to_lowercase().ends_with(suffix)
    }

    pub fn is_login_page(&self) -> bool {
        self.path_endswith("/default.aspx")
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Expired,
    Closed,
}

/// Server-side login state, held through the client's cookie jar.
///
/// Not meant to be shared: all navigation through one session must be
/// serialised by its owner.
pub struct Session {
    inner: Option<reqwest::Client>,
    base_url: Url,
    config: IntranetConfig,
    state: SessionState,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build an anonymous session with an empty cookie jar.
    pub fn new(config: &IntranetConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            inner: Some(inner),
            base_url: config.base_url()?,
            config: config.clone(),
            state: SessionState::Anonymous,
        })
    }

    /// Log in and return an authenticated session.
    pub async fn open(config: &IntranetConfig, credentials: Credentials) -> Result<Self> {
        Authenticator::new(config.clone(), credentials).login().await
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub(crate) fn mark_authenticated(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Authenticated;
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resolve(&self, target: &str) -> Result<Url> {
        self.base_url
            .join(target)
            .map_err(|e| Error::Config(format!("cannot resolve {:?}: {}", target, e)))
    }

    /// Authenticated request: like `send`, but landing on the login page
    /// means the server forgot us.
    pub async fn request(&mut self, req: &PageRequest) -> Result<RawPage> {
        let page = self.send(req).await?;

        let bounced = page.is_login_page() && !req.target.to_lowercase().ends_with("/default.aspx");
        if bounced || page.status == 401 || page.status == 440 {
            warn!("Session expired (landed on {})", page.url);
            if self.state != SessionState::Closed {
                self.state = SessionState::Expired;
            }
            return Err(Error::SessionExpired);
        }

        Ok(page)
    }

    /// Perform the call with retry on transient failures. No expiry check.
    pub async fn send(&self, req: &PageRequest) -> Result<RawPage> {
        let client = self.inner.as_ref().ok_or(Error::Closed)?;
        let url = self.resolve(&req.target)?;

        let strategy = FixedInterval::from_millis(self.config.retry_backoff_ms.max(1))
            .map(jitter)
            .take(self.config.max_retries);

        let mut attempt = 0u32;
        RetryIf::start(
            strategy,
            || {
                attempt += 1;
                self.send_once(client, &url, req, attempt)
            },
            |e: &Error| {
                let retry = e.is_transient();
                if retry {
                    warn!("Transient failure, retrying: {}", e);
                }
                retry
            },
        )
        .await
    }

    async fn send_once(
        &self,
        client: &reqwest::Client,
        url: &Url,
        req: &PageRequest,
        attempt: u32,
    ) -> Result<RawPage> {
        debug!("{:?} {} (attempt {})", req.method, url, attempt);

        let builder = match req.method {
            Method::Get => client.get(url.clone()),
            Method::Post => client.post(url.clone()).form(&req.form),
        };
        let builder = if req.query.is_empty() {
            builder
        } else {
            builder.query(&req.query)
        };

        let resp = builder.send().await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        let final_url = resp.url().clone();
        check_error_redirect(url, &final_url)?;

        if status.is_server_error() || (status.is_client_error() && !is_auth_status(status)) {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.text().await.map_err(|source| Error::Network {
            url: final_url.to_string(),
            source,
        })?;

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }

    /// Forget the server-side state locally. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            debug!("Closing session on {}", self.base_url);
        }
        self.inner = None;
        self.state = SessionState::Closed;
    }
}

fn is_auth_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 440)
}

/// The intranet redirects failures to a handful of static error pages.
fn check_error_redirect(requested: &Url, landed: &Url) -> Result<()> {
    let path = landed.path().to_lowercase();
    let from = requested.to_string();

    if path.ends_with("/erreurs/erreur.aspx") {
        Err(SiteError::Unavailable(from).into())
    } else if path.ends_with("/erreurs/404.aspx") {
        Err(SiteError::NotFound(from).into())
    } else if path.ends_with("/erreurs/interdit.aspx") {
        Err(SiteError::Forbidden(from).into())
    } else {
        Ok(())
    }
}
