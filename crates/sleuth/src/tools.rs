//! Tool declarations exposed to the model and the executors behind them.
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::completion::CompletionClient;
use crate::context::ResearchContext;
use crate::data_points::DataPointUpdate;
use crate::errors::{CompletionFailure, FetchError};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;
use crate::web::{Scraper, Searcher};

pub const SCRAPE: &str = "scrape";
pub const SEARCH: &str = "search";
pub const UPDATE_DATA: &str = "update_data";

fn scrape_tool() -> Tool {
    Tool::new(
        SCRAPE,
        "Scrape a URL for information",
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "the url of the website to scrape",
                },
            },
            "required": ["url"],
        }),
    )
}

fn search_tool() -> Tool {
    Tool::new(
        SEARCH,
        "Search the internet for information",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "the search query",
                },
            },
            "required": ["query"],
        }),
    )
}

fn update_data_tool() -> Tool {
    Tool::new(
        UPDATE_DATA,
        "Save data points found for later retrieval",
        json!({
            "type": "object",
            "properties": {
                "datas_update": {
                    "type": "array",
                    "description": "the data points to update",
                    "items": {
                        "type": "object",
                        "description": "the data point to update, should follow specific json format: {name: xxx, value: yyy, reference: zzz}",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "the name of the data point",
                            },
                            "value": {
                                "type": "string",
                                "description": "the value of the data point",
                            },
                            "reference": {
                                "type": "string",
                                "description": "the reference URL for the data point",
                            },
                        },
                    },
                },
            },
            "required": ["datas_update"],
        }),
    )
}

/// Tools declared to the model. `search` is only offered when enabled.
pub fn research_tools(expose_search: bool) -> Vec<Tool> {
    let mut tools = vec![scrape_tool()];
    if expose_search {
        tools.push(search_tool());
    }
    tools.push(update_data_tool());
    tools
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Scrape,
    Search,
    UpdateData,
    Unknown(String),
}

impl ToolKind {
    pub fn from_name(name: &str, expose_search: bool) -> Self {
        match name {
            SCRAPE => ToolKind::Scrape,
            SEARCH if expose_search => ToolKind::Search,
            UPDATE_DATA => ToolKind::UpdateData,
            other => ToolKind::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeArgs {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDataArgs {
    pub datas_update: Vec<DataPointUpdate>,
}

/// JSON shape requested from the search extraction completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchExtraction {
    #[serde(default)]
    pub related_urls_to_scrape_further: Vec<String>,
    #[serde(default)]
    pub info_found: Vec<Map<String, Value>>,
}

impl SearchExtraction {
    /// Parse a completion that should hold the extraction JSON. Markdown fences and
    /// text around the outermost object are tolerated.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim();
        let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        };
        serde_json::from_str(candidate)
    }
}

/// The observation handed back to the model for a search. The raw extraction text is
/// always passed through; a note is added when it is not the requested JSON.
pub fn search_observation(raw: String) -> String {
    match SearchExtraction::parse(&raw) {
        Ok(_) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "search extraction was not valid JSON");
            format!(
                "{}\n\nNote: the extracted result above is not valid JSON ({}).",
                raw, e
            )
        }
    }
}

/// Runs the agent's tools against the web collaborators
pub struct ToolExecutor {
    scraper: Box<dyn Scraper>,
    searcher: Box<dyn Searcher>,
    expose_search: bool,
}

impl ToolExecutor {
    pub fn new(scraper: Box<dyn Scraper>, searcher: Box<dyn Searcher>) -> Self {
        Self {
            scraper,
            searcher,
            expose_search: false,
        }
    }

    pub fn with_search(mut self, expose_search: bool) -> Self {
        self.expose_search = expose_search;
        self
    }

    pub fn search_exposed(&self) -> bool {
        self.expose_search
    }

    pub fn tools(&self) -> Vec<Tool> {
        research_tools(self.expose_search)
    }

    pub fn kind_of(&self, name: &str) -> ToolKind {
        ToolKind::from_name(name, self.expose_search)
    }

    /// Scrape `url`. The link is recorded only when the scrape succeeds.
    pub async fn fetch_page(
        &self,
        context: &mut ResearchContext,
        url: &str,
    ) -> Result<String, FetchError> {
        tracing::info!(url, "scraping");
        let markdown = self.scraper.scrape(url).await?;
        context.links_scraped.push(url);
        tracing::info!(url, bytes = markdown.len(), "scraped");
        Ok(markdown)
    }

    /// Search the web and have the model extract any still-missing data points from
    /// the results. Returns the raw completion text.
    pub async fn search_and_extract(
        &self,
        client: &CompletionClient,
        context: &ResearchContext,
        query: &str,
    ) -> Result<String, SearchError> {
        tracing::info!(query, "searching");
        let results = self.searcher.search(query).await?;
        let search_results = serde_json::to_string_pretty(&results)
            .map_err(|e| SearchError::Prompt(e.to_string()))?;

        let mut prompt_context: HashMap<&str, Value> = HashMap::new();
        prompt_context.insert("search_results", Value::String(search_results));
        prompt_context.insert("query", Value::String(query.to_string()));
        prompt_context.insert("entity_name", Value::String(context.entity_name.clone()));
        prompt_context.insert("data_points", json!(context.data_points.pending_names()));
        let prompt = load_prompt_file("search_extract.md", &prompt_context)
            .map_err(|e| SearchError::Prompt(e.to_string()))?;

        Ok(client.complete_text(&prompt).await?)
    }

    pub fn apply_updates(&self, context: &mut ResearchContext, updates: &[DataPointUpdate]) -> String {
        context.data_points.apply_updates(updates)
    }
}

/// Failure of the search-and-extract tool
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Completion(#[from] CompletionFailure),

    #[error("Could not build extraction prompt: {0}")]
    Prompt(String),
}
