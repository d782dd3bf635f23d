//! End-to-end behaviour against a fake intranet.
//!
//! Covers the login handshake, session expiry recovery, retry on 5xx, grid
//! pagination with its safety bound, per-record diagnostics and cancellation.

mod common;

use common::*;
use sgdf_intranet::scraper::auth::Authenticator;
use sgdf_intranet::scraper::http_client::{PageRequest, Session, SessionState};
use sgdf_intranet::{
    AuthError, CancelToken, Civility, Credentials, DiagnosticKind, Error, FetchOptions,
    IntranetClient, PersonSource, PersonStatus,
};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials::new(CODE, PASSWORD)
}

async fn connect(server: &MockServer) -> IntranetClient {
    assert_ok!(IntranetClient::connect(config(server), credentials()).await)
}

async fn mount_summary(server: &MockServer, iid: &str, full_name: &str) {
    Mock::given(method("GET"))
        .and(path(SUMMARY))
        .and(query_param("id", iid))
        .respond_with(html(summary_page(iid, full_name)))
        .mount(server)
        .await;
}

// ── Login ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_then_ensure_valid_keeps_session() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(html(home_page(OWN_IID)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(config(&server), credentials());
    let session = assert_ok!(auth.login().await);
    assert!(session.is_authenticated());

    // still valid: no second login
    let mut session = assert_ok!(auth.ensure_valid(session).await);
    let home = assert_ok!(session.request(&PageRequest::get(HOME)).await);
    assert!(home.body.contains("Bienvenue"));
}

#[tokio::test]
async fn test_ensure_valid_replaces_closed_session() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;

    let auth = Authenticator::new(config(&server), credentials());
    let mut session = assert_ok!(Session::open(&config(&server), credentials()).await);
    session.close();

    let session = assert_ok!(auth.ensure_valid(session).await);
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(html(login_page(None)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(html(login_page(Some("Mot de passe invalide"))))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::new(CODE, "nope");
    let err = assert_err!(IntranetClient::connect(config(&server), creds).await);
    match err {
        Error::Auth(AuthError::InvalidPassword(code)) => assert_eq!(code, CODE),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_credentials_send_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(login_page(None)))
        .expect(0)
        .mount(&server)
        .await;

    let creds = Credentials::new(CODE, "");
    let err = assert_err!(IntranetClient::connect(config(&server), creds).await);
    assert!(matches!(err, Error::Auth(AuthError::MissingCredentials)));
}

#[tokio::test]
async fn test_login_page_without_form_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(html("<html><body><h1>Maintenance en cours</h1></body></html>"))
        .mount(&server)
        .await;

    let err = assert_err!(IntranetClient::connect(config(&server), credentials()).await);
    assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
}

#[tokio::test]
async fn test_check_login_returns_own_id() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(html(home_page(OWN_IID)))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert_eq!(assert_ok!(client.check_login().await), OWN_IID);
}

// ── Single records ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_profile() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(html(home_page(OWN_IID)))
        .expect(1)
        .mount(&server)
        .await;
    mount_summary(&server, OWN_IID, "  Mme.  LE   GOFF marie-claire (DURAND) ").await;

    let client = connect(&server).await;
    let me = assert_ok!(client.fetch_profile().await);

    assert_eq!(me.iid, OWN_IID);
    assert_eq!(me.civility, Civility::Madame);
    assert_eq!(me.last_name, "Le Goff");
    assert_eq!(me.first_name, "Marie-Claire");
    assert_eq!(me.birth_name.as_deref(), Some("Durand"));
    assert_eq!(me.code.as_deref(), Some("100000042"));
    assert_eq!(me.status, Some(PersonStatus::Adherent));
    assert_eq!(me.group.as_deref(), Some("GROUPE DE YERRES"));
    assert_eq!(me.function.as_deref(), Some("CHEF / CHEFTAINE"));
    assert_eq!(me.function_start.map(|d| d.to_string()).as_deref(), Some("2025-09-01"));
    assert_eq!(me.function_end.map(|d| d.to_string()).as_deref(), Some("2026-08-31"));
    // the summary tab does not show the address
    assert_eq!(me.city, None);
}

#[tokio::test]
async fn test_unknown_civility_is_not_an_error() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_summary(&server, "x1", "Dr. MARTIN Paul").await;

    let client = connect(&server).await;
    let p = assert_ok!(client.fetch_person("x1").await);
    assert_eq!(p.civility, Civility::Unknown);
    assert_eq!(p.last_name, "Martin");
    assert_eq!(p.first_name, "Paul");
}

// ── Session expiry ────────────────────────────────────────────────────────────

fn bounce_to_login() -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", LOGIN)
}

#[tokio::test]
async fn test_expired_session_logs_in_again_once() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path(SUMMARY))
        .respond_with(bounce_to_login())
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_summary(&server, "x1", "M. DUPONT Jean").await;

    let client = connect(&server).await;
    let p = assert_ok!(client.fetch_person("x1").await);
    assert_eq!(p.last_name, "Dupont");
}

#[tokio::test]
async fn test_check_login_logs_in_again_once() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(bounce_to_login())
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(html(home_page(OWN_IID)))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert_eq!(assert_ok!(client.check_login().await), OWN_IID);
    assert_eq!(client.state(), Some(SessionState::Authenticated));
}

#[tokio::test]
async fn test_roster_expiry_mid_listing_replays_page() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    mount_search(&server, results_page(1, 2, &rows(1, 10))).await;
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(wiremock::matchers::body_string_contains(page_postback(2)))
        .respond_with(bounce_to_login())
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_grid_page(&server, 2, results_page(2, 2, &rows(2, 10))).await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&FetchOptions::default()).await);

    assert_eq!(roster.records.len(), 20);
    assert!(roster.complete);
    assert!(roster.diagnostics.is_empty(), "{:?}", roster.diagnostics);
    assert_eq!(roster.records[10].iid, "p2r1");
}

#[tokio::test]
async fn test_repeated_expiry_surfaces() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(SUMMARY))
        .respond_with(bounce_to_login())
        .expect(2)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = assert_err!(client.fetch_person("x1").await);
    assert!(matches!(err, Error::SessionExpired), "{:?}", err);
}

// ── Transient failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(SUMMARY))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_summary(&server, "x1", "M. DUPONT Jean").await;

    let client = connect(&server).await;
    assert_ok!(client.fetch_person("x1").await);
}

#[tokio::test]
async fn test_persistent_server_error_gives_up() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(SUMMARY))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    match assert_err!(client.fetch_person("x1").await) {
        Error::Status { status, .. } => assert_eq!(status.as_u16(), 503),
        other => panic!("unexpected {:?}", other),
    }
}

// ── Roster ────────────────────────────────────────────────────────────────────

async fn mount_three_pages(server: &MockServer) {
    mount_search(server, results_page(1, 3, &rows(1, 10))).await;
    mount_grid_page(server, 2, results_page(2, 3, &rows(2, 10))).await;
}

#[tokio::test]
async fn test_roster_follows_pager_to_the_end() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_three_pages(&server).await;
    mount_grid_page(&server, 3, results_page(3, 3, &rows(3, 10))).await;
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(wiremock::matchers::body_string_contains(page_postback(4)))
        .respond_with(html(results_page(4, 4, &rows(4, 10))))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&FetchOptions::default()).await);

    assert_eq!(roster.records.len(), 30);
    assert!(roster.complete);
    assert!(roster.diagnostics.is_empty(), "{:?}", roster.diagnostics);

    let ids: Vec<&str> = roster.records.iter().map(|p| p.iid.as_str()).collect();
    assert_eq!(ids[0], "p1r1");
    assert_eq!(ids[10], "p2r1");
    assert_eq!(ids[29], "p3r10");
    assert_eq!(roster.records[0].last_name, "Membre1");
    assert_eq!(roster.records[0].first_name, "Numero1");
    assert_eq!(roster.records[0].postcode.as_deref(), Some("91330"));
    assert_eq!(roster.records[0].city.as_deref(), Some("YERRES"));
    assert_eq!(
        roster.records[0].membership_end.map(|d| d.to_string()).as_deref(),
        Some("2026-09-30")
    );
}

#[tokio::test]
async fn test_roster_keeps_identified_rows() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    let rows = vec![
        row(Some("a"), "M. MARTIN Paul"),
        row(None, "Mme. DURAND Alice"),
        row(Some("c"), "LEROY Marc"),
    ];
    mount_search(&server, results_page(1, 0, &rows)).await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&FetchOptions::default()).await);

    assert_eq!(roster.records.len(), 2);
    assert!(roster.complete);
    assert_eq!(roster.diagnostics.len(), 1);
    let d = &roster.diagnostics[0];
    assert_eq!(d.kind, DiagnosticKind::Protocol);
    assert_eq!(d.page, Some(1));
    assert!(d.message.contains("#2"), "{}", d.message);
}

#[tokio::test]
async fn test_roster_page_bound() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_three_pages(&server).await;
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(wiremock::matchers::body_string_contains(page_postback(3)))
        .respond_with(html(results_page(3, 3, &rows(3, 10))))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&FetchOptions::default().with_max_pages(2)).await);

    assert_eq!(roster.records.len(), 20);
    assert!(!roster.complete);
    assert_eq!(roster.diagnostics.len(), 1);
    assert_eq!(roster.diagnostics[0].kind, DiagnosticKind::Incomplete);
}

#[tokio::test]
async fn test_search_page_drift_is_protocol_diagnostic() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(ROSTER))
        .respond_with(html(search_page().replace("_ddStructure", "_ddUnite")))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&FetchOptions::default()).await);

    assert!(roster.records.is_empty());
    assert!(!roster.complete);
    assert_eq!(roster.diagnostics.len(), 1);
    assert_eq!(roster.diagnostics[0].kind, DiagnosticKind::Protocol);
    assert!(roster.diagnostics[0].message.contains("structure selector"));
}

/// Serves a grid page and cancels the fetch while doing so.
struct CancelWhileServing {
    token: CancelToken,
    body: String,
}

impl Respond for CancelWhileServing {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.token.cancel();
        html(self.body.clone())
    }
}

async fn mount_cancelling_roster(server: &MockServer, options: &FetchOptions) {
    mount_search(server, results_page(1, 3, &rows(1, 10))).await;
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(wiremock::matchers::body_string_contains(page_postback(2)))
        .respond_with(CancelWhileServing {
            token: options.cancel.clone(),
            body: results_page(2, 3, &rows(2, 10)),
        })
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(ROSTER))
        .and(wiremock::matchers::body_string_contains(page_postback(3)))
        .respond_with(html(results_page(3, 3, &rows(3, 10))))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cancel_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    let options = FetchOptions::default().keep_partial();
    mount_cancelling_roster(&server, &options).await;

    let client = connect(&server).await;
    let roster = assert_ok!(client.fetch_roster(&options).await);

    assert_eq!(roster.records.len(), 20);
    assert!(!roster.complete);
    assert_eq!(roster.diagnostics.last().map(|d| d.kind), Some(DiagnosticKind::Incomplete));
}

#[tokio::test]
async fn test_cancel_discards_partial_results() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    let options = FetchOptions::default();
    mount_cancelling_roster(&server, &options).await;

    let client = connect(&server).await;
    let err = assert_err!(client.fetch_roster(&options).await);
    assert!(matches!(err, Error::Cancelled));
}

// ── Close ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let client = connect(&server).await;
    client.close().await;
    client.close().await;
    assert_eq!(client.state(), Some(SessionState::Closed));

    let err = assert_err!(client.fetch_profile().await);
    assert!(matches!(err, Error::Closed));
}
