//! Collaborators that reach the web on the agent's behalf.
pub mod firecrawl;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// One hit returned by a search collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Full page content, when the collaborator was asked to fetch it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Fetches a single page and returns it as markdown
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String, FetchError>;
}

/// Runs a web search, asking for full page content of each hit
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, FetchError>;
}
