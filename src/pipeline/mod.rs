//! Pages → records.
//!
//! `collect()` drains a navigator cursor page by page:
//!   1. extract raw fragments with the target's schema
//!   2. map every fragment to a `Person`
//!   3. file per-page problems as diagnostics stamped with page number and URL
//!
//! Only session-level failures (auth, network, repeated expiry) abort the
//! whole fetch. Markup drift and the page bound keep what was read and mark
//! the collection incomplete.

use crate::error::{Error, Result};
use crate::models::{Collection, Diagnostic, DiagnosticKind, Person};
use crate::scraper::cleaner;
use crate::scraper::navigator::Pages;
use crate::scraper::parsers;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Shared flag to stop a multi-page fetch at the next page boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to do with records already read when a fetch is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialPolicy {
    /// Drop them and fail with `Error::Cancelled`.
    #[default]
    Discard,
    /// Return them, with `complete = false` and an `Incomplete` diagnostic.
    Keep,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the configured pagination bound.
    pub max_pages: Option<usize>,
    pub cancel: CancelToken,
    pub on_cancel: PartialPolicy,
}

impl FetchOptions {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn keep_partial(mut self) -> Self {
        self.on_cancel = PartialPolicy::Keep;
        self
    }
}

/// Drain `pages` into a collection of people.
pub async fn collect(mut pages: Pages<'_>, options: &FetchOptions) -> Result<Collection<Person>> {
    let schema = pages.target().schema();
    let mut out = Collection::default();

    loop {
        if options.cancel.is_cancelled() {
            match options.on_cancel {
                PartialPolicy::Discard => {
                    info!(
                        "Fetch cancelled after {} pages, discarding {} records",
                        pages.served(),
                        out.records.len()
                    );
                    return Err(Error::Cancelled);
                }
                PartialPolicy::Keep => {
                    info!(
                        "Fetch cancelled after {} pages, keeping {} records",
                        pages.served(),
                        out.records.len()
                    );
                    out.complete = false;
                    out.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Incomplete,
                        format!("cancelled after {} pages", pages.served()),
                    ));
                    break;
                }
            }
        }

        let page = match pages.next().await {
            None => break,
            Some(Ok(page)) => page,
            Some(Err(e)) if e.is_session_level() => return Err(e),
            Some(Err(e)) => {
                warn!("Stopping {}: {}", schema.name, e);
                let (kind, message) = match e {
                    Error::Protocol(m) if pages.bound_reached() => (DiagnosticKind::Incomplete, m),
                    Error::Protocol(m) => (DiagnosticKind::Protocol, m),
                    Error::Validation(m) => (DiagnosticKind::Validation, m),
                    other => (DiagnosticKind::Protocol, other.to_string()),
                };
                out.complete = false;
                out.diagnostics.push(Diagnostic::new(kind, message));
                break;
            }
        };

        let n = pages.served();
        let url = page.url.to_string();
        let extraction = parsers::extract(&page, schema);

        out.diagnostics
            .extend(extraction.diagnostics.into_iter().map(|d| d.at(n, url.as_str())));

        let before = out.records.len();
        for fragment in &extraction.fragments {
            match cleaner::map(fragment) {
                Ok(person) => out.records.push(person),
                Err(Error::Validation(message)) => {
                    warn!("Page {}: {}", n, message);
                    out.diagnostics.push(
                        Diagnostic::new(DiagnosticKind::Validation, message).at(n, url.as_str()),
                    );
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Page {}: {} records", n, out.records.len() - before);
    }

    info!(
        "{}: {} records from {} pages, {} diagnostics{}",
        schema.name,
        out.records.len(),
        pages.served(),
        out.diagnostics.len(),
        if out.complete { "" } else { " (incomplete)" }
    );
    Ok(out)
}

/// The one record of a single-record fetch.
pub fn single(collection: Collection<Person>) -> Result<Person> {
    let Collection {
        records,
        diagnostics,
        ..
    } = collection;

    records.into_iter().next().ok_or_else(|| {
        let why: Vec<String> = diagnostics.iter().map(|d| d.message.clone()).collect();
        if why.is_empty() {
            Error::Protocol("page held no record".to_string())
        } else {
            Error::Protocol(why.join("; "))
        }
    })
}
