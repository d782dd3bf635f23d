use crate::error::{Error, Result};
use crate::models::field;
use crate::scraper::auth::Authenticator;
use crate::scraper::forms::AspForm;
use crate::scraper::http_client::{PageRequest, RawPage, Session, SessionState};
use crate::scraper::parsers;
use crate::scraper::schemas::{self, Schema};
use tracing::{debug, info, warn};

pub const HOME_PATH: &str = "/Specialisation/Sgdf/Accueil.aspx";
pub const ADHERENT_PATH: &str = "/Specialisation/Sgdf/adherents/ResumeAdherent.aspx";
pub const ROSTER_PATH: &str = "/Specialisation/Sgdf/adherents/RechercherAdherent.aspx";

pub const ROSTER_GRID: &str = "ctl00$MainContent$_recherche$_gvResultats";
pub const ROSTER_SEARCH_BUTTON: &str = "ctl00$MainContent$_recherche$_btnRechercher";
pub const ROSTER_STRUCTURE_SELECT: &str = "ctl00$MainContent$_recherche$_selecteur$_ddStructure";
/// "All structures I can see" in the structure drop-down.
const ALL_STRUCTURES: &str = "0";

/// What the caller wants, before it is turned into requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The logged-in member's own record.
    CurrentProfile,
    /// A member record by its intranet id.
    Person { iid: String },
    /// Every member visible from the logged-in account, as a paged grid.
    Roster,
}

impl Target {
    /// Schema that reads the pages this target yields.
    pub fn schema(&self) -> &'static Schema {
        match self {
            Target::CurrentProfile | Target::Person { .. } => &schemas::ADHERENT_SUMMARY,
            Target::Roster => &schemas::ROSTER,
        }
    }

    fn is_paged(&self) -> bool {
        matches!(self, Target::Roster)
    }
}

pub struct Navigator;

impl Navigator {
    /// Start a fetch. Nothing is requested until the first `Pages::next`.
    pub fn fetch<'a>(
        session: &'a mut Session,
        auth: &'a Authenticator,
        target: Target,
        max_pages: usize,
    ) -> Result<Pages<'a>> {
        if session.state() == SessionState::Closed {
            return Err(Error::Closed);
        }
        debug!("Fetching {:?} (at most {} pages)", target, max_pages);
        Ok(Pages {
            session,
            auth,
            target,
            max_pages,
            served: 0,
            bound_reached: false,
            step: Step::Start,
        })
    }
}

enum Step {
    Start,
    /// Next grid page is read from the pager of the previous one.
    After(RawPage),
    Finished,
}

/// Ordered pages of one fetch. Not restartable: a new fetch re-requests everything.
pub struct Pages<'a> {
    session: &'a mut Session,
    auth: &'a Authenticator,
    target: Target,
    max_pages: usize,
    served: usize,
    bound_reached: bool,
    step: Step,
}

impl Pages<'_> {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Pages yielded so far.
    pub fn served(&self) -> usize {
        self.served
    }

    /// Whether the sequence ended on the page bound rather than on the last page.
    pub fn bound_reached(&self) -> bool {
        self.bound_reached
    }

    /// Next page, `None` at the end of the listing. After an error the
    /// sequence is over.
    pub async fn next(&mut self) -> Option<Result<RawPage>> {
        match self.advance().await {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => None,
            Err(e) => {
                self.step = Step::Finished;
                Some(Err(e))
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<RawPage>> {
        match std::mem::replace(&mut self.step, Step::Finished) {
            Step::Finished => Ok(None),
            Step::Start => match self.target.clone() {
                Target::CurrentProfile => {
                    let home = self.request(&PageRequest::get(HOME_PATH)).await?;
                    let iid = own_iid(&home)?;
                    debug!("Logged-in member is {}", iid);
                    self.serve(summary_request(&iid)).await
                }
                Target::Person { iid } => self.serve(summary_request(&iid)).await,
                Target::Roster => {
                    let search = self.request(&PageRequest::get(ROSTER_PATH)).await?;
                    self.serve(search_request(&search)?).await
                }
            },
            Step::After(previous) => {
                let Some(pager) = parsers::parse_pager(&previous, ROSTER_GRID) else {
                    debug!("No pager on {}, single page listing", previous.url);
                    return Ok(None);
                };
                let Some(n) = pager.next() else {
                    debug!("Reached last page ({})", pager.last);
                    return Ok(None);
                };
                let req =
                    AspForm::from_page(&previous)?.postback(ROSTER_GRID, &format!("Page${}", n));
                self.serve(req).await
            }
        }
    }

    /// Request a page the caller will see, within the page bound.
    async fn serve(&mut self, req: PageRequest) -> Result<Option<RawPage>> {
        if self.served >= self.max_pages {
            warn!("Page bound of {} reached for {:?}", self.max_pages, self.target);
            self.bound_reached = true;
            return Err(Error::Protocol(format!(
                "{:?} has more than {} pages",
                self.target, self.max_pages
            )));
        }

        let page = self.request(&req).await?;
        self.served += 1;
        info!("Fetched page {} ({})", self.served, page.url);

        if self.target.is_paged() {
            self.step = Step::After(page.clone());
        }
        Ok(Some(page))
    }

    async fn request(&mut self, req: &PageRequest) -> Result<RawPage> {
        self.auth.request(&mut *self.session, req).await
    }
}

fn summary_request(iid: &str) -> PageRequest {
    PageRequest::get(ADHERENT_PATH).with_query("id", iid)
}

/// Search for everyone in every visible structure.
fn search_request(page: &RawPage) -> Result<PageRequest> {
    let mut form = AspForm::from_page(page)?;
    if !form.has_field(ROSTER_STRUCTURE_SELECT) {
        return Err(Error::Protocol(format!("no structure selector on {}", page.url)));
    }
    form.set(ROSTER_STRUCTURE_SELECT, ALL_STRUCTURES);
    Ok(form.postback(ROSTER_SEARCH_BUTTON, ""))
}

/// Id of the logged-in member, from the "my record" link on any page.
pub fn own_iid(page: &RawPage) -> Result<String> {
    parsers::extract(page, &schemas::HOME)
        .fragments
        .first()
        .and_then(|f| f.get(field::IID))
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol(format!("no link to own record on {}", page.url)))
}
