use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Credentials ───────────────────────────────────────────────────────────────

/// Adherent code + password. The secret never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_well_formed(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ── Raw fragment ──────────────────────────────────────────────────────────────

/// Field names shared by the page schemas and the record mapper.
pub mod field {
    pub const IID: &str = "iid";
    pub const FULL_NAME: &str = "full_name";
    pub const CODE: &str = "code";
    pub const STATUS: &str = "status";
    pub const GROUP: &str = "group";
    pub const FUNCTION: &str = "function";
    pub const FUNCTION_START: &str = "function_start";
    pub const FUNCTION_END: &str = "function_end";
    pub const POSTCODE: &str = "postcode";
    pub const CITY: &str = "city";
    pub const MEMBERSHIP_END: &str = "membership_end";
}

/// Normalised, still untyped values lifted from one record region of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFragment {
    fields: BTreeMap<String, String>,
}

impl RawFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

// ── Person ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Civility {
    Monsieur,
    Madame,
    Monseigneur,
    Pere,
    Soeur,
    Frere,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonStatus {
    Preinscrit,
    Inscrit,
    Adherent,
    Invite,
    AQuitteLAssociation,
    Decede,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Intranet identifier, as found in `?id=` links. Unique per person.
    pub iid: String,
    /// Adherent number.
    pub code: Option<String>,
    pub civility: Civility,
    pub first_name: String,
    pub last_name: String,
    pub birth_name: Option<String>,
    pub status: Option<PersonStatus>,
    /// Structure (group) the primary function is held in.
    pub group: Option<String>,
    pub function: Option<String>,
    pub function_start: Option<NaiveDate>,
    pub function_end: Option<NaiveDate>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    /// Last day the membership fee covers. Only listed in the roster grid.
    pub membership_end: Option<NaiveDate>,
}

// ── Collection results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Markup no longer matches the expected structure.
    Protocol,
    /// A fragment reached the mapper without usable data.
    Validation,
    /// The fetch stopped before the end of the listing.
    Incomplete,
}

/// A per-page problem reported next to the records instead of failing the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based position of the page in the fetch, when known.
    pub page: Option<usize>,
    pub url: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            page: None,
            url: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, page: usize, url: impl Into<String>) -> Self {
        self.page = Some(page);
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.page, &self.url) {
            (Some(p), Some(u)) => {
                write!(f, "[{:?}] page {} ({}): {}", self.kind, p, u, self.message)
            }
            _ => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

/// Records plus whatever went wrong on individual pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
    pub records: Vec<T>,
    pub diagnostics: Vec<Diagnostic>,
    /// False when the listing was cut short (cancellation, page bound).
    pub complete: bool,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            diagnostics: Vec::new(),
            complete: true,
        }
    }
}
