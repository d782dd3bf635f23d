//! Login handshake.
//!
//! `Default.aspx` is a WebForms page: GET it for the hidden state fields, fill
//! `login` / `password`, submit through `_btnValider`. A successful answer is
//! any logged-in page (it carries the link to the member's own record); a
//! rejected one is the login page again, with a red label saying why.

use crate::config::IntranetConfig;
use crate::error::{AuthError, Error, Result};
use crate::models::Credentials;
use crate::scraper::forms::AspForm;
use crate::scraper::http_client::{LOGIN_PATH, PageRequest, RawPage, Session};
use crate::scraper::parsers;
use crate::utils::fold;
use tracing::{debug, info, warn};

const LOGIN_FIELD: &str = "login";
const PASSWORD_FIELD: &str = "password";
const SUBMIT_BUTTON: &str = "_btnValider";

/// Present on every page once logged in.
const AUTH_MARKER: &str = r#"a[id$="_hlVoirFicherAdherentLogo"]"#;
const ERROR_LABEL: &str = r#"span[id$="_lblErreur"]"#;
const LOGIN_INPUT: &str = r#"input[name="login"], input[name$="$login"]"#;

/// Turns credentials into sessions. Keeps the credentials for re-authentication.
#[derive(Debug)]
pub struct Authenticator {
    credentials: Credentials,
    config: IntranetConfig,
}

impl Authenticator {
    pub fn new(config: IntranetConfig, credentials: Credentials) -> Self {
        Self { credentials, config }
    }

    pub fn identifier(&self) -> &str {
        self.credentials.identifier()
    }

    /// Open a fresh session and log it in.
    pub async fn login(&self) -> Result<Session> {
        if !self.credentials.is_well_formed() {
            return Err(AuthError::MissingCredentials.into());
        }

        let mut session = Session::new(&self.config)?;
        info!("Logging in as {} on {}", self.identifier(), session.base_url());

        let login_page = session.send(&PageRequest::get(LOGIN_PATH)).await?;
        let submit = login_request(&login_page, &self.credentials)?;

        let answer = session.send(&submit).await?;
        classify(&answer, self.identifier())?;

        session.mark_authenticated();
        info!("Logged in as {}", self.identifier());
        Ok(session)
    }

    /// The same session if still logged in, otherwise a new one.
    pub async fn ensure_valid(&self, session: Session) -> Result<Session> {
        if session.is_authenticated() {
            return Ok(session);
        }
        debug!("Session is {:?}, logging in again", session.state());
        let mut stale = session;
        stale.close();
        self.login().await
    }

    /// Replace `session` in place with a freshly logged-in one.
    pub async fn refresh(&self, session: &mut Session) -> Result<()> {
        warn!("Re-authenticating {}", self.identifier());
        session.close();
        *session = self.login().await?;
        Ok(())
    }

    /// `Session::request`, logging in again and retrying once if the server
    /// forgot the session. A second expiry surfaces.
    pub async fn request(&self, session: &mut Session, req: &PageRequest) -> Result<RawPage> {
        match session.request(req).await {
            Err(Error::SessionExpired) => {
                warn!("Session expired on {}, retrying once after login", req.target);
                self.refresh(session).await?;
                session.request(req).await
            }
            other => other,
        }
    }
}

/// Fill and submit the login form found on `page`.
fn login_request(page: &RawPage, credentials: &Credentials) -> Result<PageRequest> {
    let mut form = AspForm::from_page(page)?;

    let login = form
        .field_name(LOGIN_FIELD)
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol(format!("no login field on {}", page.url)))?;
    let password = form
        .field_name(PASSWORD_FIELD)
        .map(str::to_string)
        .unwrap_or_else(|| PASSWORD_FIELD.to_string());

    form.set(&login, credentials.identifier());
    form.set(&password, credentials.secret());
    form.click(SUBMIT_BUTTON)
}

/// Decide what the answer to a login submit means.
fn classify(page: &RawPage, identifier: &str) -> Result<()> {
    if parsers::has_match(page, AUTH_MARKER) {
        return Ok(());
    }

    if let Some(message) = parsers::first_text(page, ERROR_LABEL) {
        return Err(rejection(&message, identifier).into());
    }

    if parsers::has_match(page, LOGIN_INPUT) {
        Err(Error::Protocol(format!(
            "login form came back from {} without an error message",
            page.url
        )))
    } else {
        Err(Error::Protocol(format!("no logged-in marker on {}", page.url)))
    }
}

fn rejection(message: &str, identifier: &str) -> AuthError {
    let m = fold(message);
    if m.contains("identifiant invalide") {
        AuthError::UnknownUser(identifier.to_string())
    } else if m.contains("passe invalide") {
        AuthError::InvalidPassword(identifier.to_string())
    } else if m.contains("pas le droit") {
        AuthError::Unauthorized(identifier.to_string())
    } else {
        AuthError::Rejected(message.to_string())
    }
}
