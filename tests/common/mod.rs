//! Fake intranet: page fixtures and wiremock mounts.

#![allow(dead_code)]

use sgdf_intranet::IntranetConfig;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN: &str = "/Specialisation/Sgdf/Default.aspx";
pub const HOME: &str = "/Specialisation/Sgdf/Accueil.aspx";
pub const SUMMARY: &str = "/Specialisation/Sgdf/adherents/ResumeAdherent.aspx";
pub const ROSTER: &str = "/Specialisation/Sgdf/adherents/RechercherAdherent.aspx";

pub const CODE: &str = "123456789";
pub const PASSWORD: &str = "s3cret";
pub const OWN_IID: &str = "me42";

/// `ctl00$MainContent$_recherche$_btnRechercher`, form-encoded.
pub const SEARCH_POSTBACK: &str = "__EVENTTARGET=ctl00%24MainContent%24_recherche%24_btnRechercher";

pub fn config(server: &MockServer) -> IntranetConfig {
    IntranetConfig {
        retry_backoff_ms: 10,
        timeout_secs: 5,
        ..IntranetConfig::with_base_url(server.uri())
    }
}

pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

/// `__EVENTARGUMENT` of a grid pager postback, form-encoded.
pub fn page_postback(n: u32) -> String {
    format!("__EVENTARGUMENT=Page%24{}", n)
}

// ── Pages ─────────────────────────────────────────────────────────────────────

pub fn login_page(error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<span id="ctl00_MainContent__lblErreur" class="erreur">{}</span>"#, e))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><body>
        <form method="post" action="./Default.aspx" id="aspnetForm">
          <input type="hidden" name="__EVENTTARGET" id="__EVENTTARGET" value="" />
          <input type="hidden" name="__EVENTARGUMENT" id="__EVENTARGUMENT" value="" />
          <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="/wEPDwULLTE2" />
          <input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="/wEdAAR" />
          <input name="login" type="text" id="login" />
          <input name="password" type="password" id="password" />
          <input type="submit" name="_btnValider" value="Valider" id="_btnValider" />
          {error}
        </form></body></html>"#
    )
}

/// Any logged-in page carries the "my record" logo link.
pub fn home_page(iid: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><body>
        <form method="post" action="./Accueil.aspx" id="aspnetForm">
          <a id="ctl00__hlVoirFicherAdherentLogo" href="adherents/ResumeAdherent.aspx?id={iid}">Ma fiche</a>
          <h1>Bienvenue</h1>
        </form></body></html>"#
    )
}

pub fn summary_page(iid: &str, full_name: &str) -> String {
    let prefix =
        "ctl00_ctl00_MainContent_TabsContent_TabContainerResumeAdherent__tabResume__resume_";
    format!(
        r#"<!DOCTYPE html><html><body>
        <form method="post" action="./ResumeAdherent.aspx?id={iid}" id="aspnetForm">
          <a id="ctl00__hlVoirFicherAdherentLogo" href="ResumeAdherent.aspx?id={OWN_IID}">Ma fiche</a>
          <span id="ctl00_ctl00__divTitre">{full_name}</span>
          <span id="{prefix}_lblCodeAdherent">100000042</span>
          <span id="{prefix}_lblTypeInscription">Adh&eacute;rent</span>
          <a id="{prefix}_hlStructure" href="../structures/ResumeStructure.aspx?id=s1">GROUPE DE&nbsp;YERRES</a>
          <span id="{prefix}_lblFonction">CHEF / CHEFTAINE</span>
          <span id="{prefix}_lblDebutFonction">01/09/2025</span>
          <span id="{prefix}_lblFinFonction">31/08/2026</span>
        </form></body></html>"#
    )
}

pub fn search_page() -> String {
    r#"<!DOCTYPE html><html><body>
    <form method="post" action="./RechercherAdherent.aspx" id="aspnetForm">
      <input type="hidden" name="__EVENTTARGET" value="" />
      <input type="hidden" name="__VIEWSTATE" value="search-state" />
      <select name="ctl00$MainContent$_recherche$_selecteur$_ddStructure">
        <option selected="selected" value="100">GROUPE DE YERRES</option>
        <option value="0">Toutes les structures</option>
      </select>
      <input type="submit" name="ctl00$MainContent$_recherche$_btnRechercher" value="Rechercher" />
    </form></body></html>"#
        .to_string()
}

/// A roster row; `iid: None` leaves the name cell without its record link.
pub fn row(iid: Option<&str>, name: &str) -> String {
    let cell = match iid {
        Some(iid) => format!(r#"<a href="ResumeAdherent.aspx?id={iid}">{name}</a>"#),
        None => name.to_string(),
    };
    format!(
        r#"<tr class="ligne1"><td>{cell}</td><td>1000</td><td>CHEF</td><td>GROUPE DE YERRES</td>
        <td>31/08/2026</td><td>91330</td><td>YERRES</td><td>30/09/2026</td></tr>"#
    )
}

/// `n` identified rows for grid page `page`.
pub fn rows(page: u32, n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| row(Some(&format!("p{page}r{i}")), &format!("M. MEMBRE{page} Numero{i}")))
        .collect()
}

/// Results grid at `page` of `last`. `last == 0` renders no pager at all.
pub fn results_page(page: u32, last: u32, rows: &[String]) -> String {
    let grid = "ctl00$MainContent$_recherche$_gvResultats";
    let pager = if last == 0 {
        String::new()
    } else {
        let cells: String = (1..=last)
            .map(|n| {
                if n == page {
                    format!("<td><span>{n}</span></td>")
                } else {
                    format!(
                        r#"<td><a href="javascript:__doPostBack('{grid}','Page${n}')">{n}</a></td>"#
                    )
                }
            })
            .collect();
        format!(
            r#"<tr class="pagination"><td colspan="8"><table><tr>{cells}</tr></table></td></tr>"#
        )
    };

    format!(
        r#"<!DOCTYPE html><html><body>
        <form method="post" action="./RechercherAdherent.aspx" id="aspnetForm">
          <input type="hidden" name="__EVENTTARGET" value="" />
          <input type="hidden" name="__EVENTARGUMENT" value="" />
          <input type="hidden" name="__VIEWSTATE" value="grid-state-{page}" />
          <table id="ctl00_MainContent__recherche__gvResultats">
            <tr class="entete"><th>Nom, Prénom</th><th>N° Adhérent</th><th>Fonction</th>
              <th>Structure</th><th>Fin Fonction</th><th>CP</th><th>Ville</th><th>Fin Adhésion</th></tr>
            {rows}
            {pager}
          </table>
        </form></body></html>"#,
        rows = rows.join("\n")
    )
}

// ── Mounts ────────────────────────────────────────────────────────────────────

/// Login page plus a submit that succeeds, expected `logins` times.
pub async fn mount_login(server: &MockServer, logins: u64) {
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(html(login_page(None)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains(format!("login={}", CODE)))
        .and(body_string_contains(format!("password={}", PASSWORD)))
        .respond_with(html(home_page(OWN_IID)))
        .expect(logins)
        .mount(server)
        .await;
}

/// Search page and the search postback answering with grid page 1.
pub async fn mount_search(server: &MockServer, first_page: String) {
    Mock::given(method("GET"))
        .and(path(ROSTER))
        .respond_with(html(search_page()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(body_string_contains(SEARCH_POSTBACK))
        .respond_with(html(first_page))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_grid_page(server: &MockServer, n: u32, body: String) {
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(body_string_contains(page_postback(n)))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}
