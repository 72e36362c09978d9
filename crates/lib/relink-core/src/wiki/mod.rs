//! Wiki access: the `WikiApi` seam and the MediaWiki action API client.
//!
//! The control plane only talks to `WikiApi`, so batch runs can be driven by
//! an in-memory fake in tests.

use std::future::Future;

use relink_store::PageRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mediawiki;

pub use mediawiki::{MediaWikiClient, MediaWikiConfig};

#[derive(Debug, Error)]
pub enum WikiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },
    #[error("login failed: {0}")]
    Login(String),
    #[error("wiki credentials are not configured")]
    MissingCredentials,
    #[error("{0} is missing")]
    MissingPage(PageRef),
    #[error("no revisions for {0}")]
    NoRevisions(PageRef),
    #[error("empty or missing content for {0}")]
    EmptyContent(PageRef),
    #[error("missing base timestamp for {0}")]
    MissingTimestamp(PageRef),
    #[error("edit conflict on {0}")]
    EditConflict(PageRef),
    #[error("server still lagged after {0} attempts")]
    MaxlagExhausted(u32),
    #[error("invalid edit: {0}")]
    InvalidEdit(String),
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),
}

pub type WikiResult<T> = Result<T, WikiError>;

/// Current wikitext of a page plus the timestamp used to detect edit conflicts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRevision {
    pub pageid: u64,
    pub title: String,
    pub text: String,
    pub basetimestamp: String,
}

/// A full-text replacement of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEdit {
    pub page: PageRef,
    pub text: String,
    pub summary: String,
    pub basetimestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Saved { newrevid: Option<u64> },
    NoChange,
}

/// A page returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PageHit {
    pub pageid: u64,
    pub title: String,
}

/// Full-text search (`list=search`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub namespace: i32,
    /// Overall cap on unique results.
    pub limit: usize,
}

/// External link search (`list=exturlusage`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtUrlQuery {
    /// Link target without protocol, e.g. `www.delpher.nl/nl/kranten/view`.
    pub query: String,
    pub protocol: Option<String>,
    pub namespace: Option<i32>,
    pub limit: usize,
}

/// The operations batch runs need from a wiki.
pub trait WikiApi: Send + Sync {
    fn fetch_page(&self, page: &PageRef) -> impl Future<Output = WikiResult<PageRevision>> + Send;

    fn save_page(&self, edit: &PageEdit) -> impl Future<Output = WikiResult<EditOutcome>> + Send;

    fn search_pages(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = WikiResult<Vec<PageHit>>> + Send;

    fn pages_with_external_link(
        &self,
        query: &ExtUrlQuery,
    ) -> impl Future<Output = WikiResult<Vec<PageHit>>> + Send;
}
