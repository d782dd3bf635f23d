//! Client for the SGDF member intranet: logs in, walks the WebForms pages and
//! turns them into typed `Person` records.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scraper;
pub mod utils;

pub use config::{AppConfig, IntranetConfig};
pub use error::{AuthError, Error, Result, SiteError};
pub use models::{
    Civility, Collection, Credentials, Diagnostic, DiagnosticKind, Person, PersonStatus,
};
pub use pipeline::{CancelToken, FetchOptions, PartialPolicy};
pub use scraper::navigator::Target;
pub use scraper::{IntranetClient, PersonSource};
