pub mod auth;
pub mod cleaner;
pub mod forms;
pub mod http_client;
pub mod navigator;
pub mod parsers;
pub mod schemas;

use crate::config::IntranetConfig;
use crate::error::Result;
use crate::models::{Collection, Credentials, Person};
use crate::pipeline::{self, FetchOptions};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use self::auth::Authenticator;
use self::http_client::{PageRequest, Session, SessionState};
use self::navigator::{HOME_PATH, Navigator, Target};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable source of member records.
#[async_trait]
pub trait PersonSource: Send + Sync {
    /// The logged-in member.
    async fn fetch_profile(&self) -> Result<Person>;
    async fn fetch_person(&self, iid: &str) -> Result<Person>;
    /// Every member visible from the account, with per-page diagnostics.
    async fn fetch_roster(&self, options: &FetchOptions) -> Result<Collection<Person>>;
}

// ── Intranet client ───────────────────────────────────────────────────────────

/// One credential set, one session. Fetches through the same client are
/// serialised on the session lock; separate clients share nothing.
#[derive(Debug)]
pub struct IntranetClient {
    auth: Authenticator,
    session: Mutex<Session>,
    config: IntranetConfig,
}

impl IntranetClient {
    /// Log in and keep the session for later fetches.
    pub async fn connect(config: IntranetConfig, credentials: Credentials) -> Result<Self> {
        let auth = Authenticator::new(config.clone(), credentials);
        let session = auth.login().await?;
        Ok(Self {
            auth,
            session: Mutex::new(session),
            config,
        })
    }

    /// Probe the home page; returns the logged-in member's id.
    pub async fn check_login(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if session.state() == SessionState::Expired {
            self.auth.refresh(&mut session).await?;
        }

        let home = self.auth.request(&mut session, &PageRequest::get(HOME_PATH)).await?;
        let iid = navigator::own_iid(&home)?;
        info!("Logged in as {} (member {})", self.auth.identifier(), iid);
        Ok(iid)
    }

    /// Run a logical fetch to completion under the session lock.
    pub async fn fetch(
        &self,
        target: Target,
        options: &FetchOptions,
    ) -> Result<Collection<Person>> {
        let max_pages = options.max_pages.unwrap_or(self.config.max_pages);
        let mut session = self.session.lock().await;

        if session.state() == SessionState::Expired {
            debug!("Session expired since last fetch");
            self.auth.refresh(&mut session).await?;
        }

        let pages = Navigator::fetch(&mut session, &self.auth, target, max_pages)?;
        pipeline::collect(pages, options).await
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.try_lock().ok().map(|s| s.state())
    }

    /// Drop the session. Idempotent; later fetches fail with `Closed`.
    pub async fn close(&self) {
        self.session.lock().await.close();
    }
}

#[async_trait]
impl PersonSource for IntranetClient {
    async fn fetch_profile(&self) -> Result<Person> {
        let c = self.fetch(Target::CurrentProfile, &FetchOptions::default()).await?;
        pipeline::single(c)
    }

    async fn fetch_person(&self, iid: &str) -> Result<Person> {
        let target = Target::Person { iid: iid.to_string() };
        let c = self.fetch(target, &FetchOptions::default()).await?;
        pipeline::single(c)
    }

    async fn fetch_roster(&self, options: &FetchOptions) -> Result<Collection<Person>> {
        self.fetch(Target::Roster, options).await
    }
}
