use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{Scraper, SearchResult, Searcher};
use crate::errors::FetchError;

pub const FIRECRAWL_HOST: &str = "https://api.firecrawl.dev";

const SERVICE: &str = "Firecrawl";

#[derive(Debug, Clone)]
pub struct FirecrawlConfig {
    pub host: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl FirecrawlConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: FIRECRAWL_HOST.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Firecrawl client serving as both the scraping and the search collaborator
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    client: Client,
    config: FirecrawlConfig,
}

impl FirecrawlClient {
    pub fn new(config: FirecrawlConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn post(&self, endpoint: &str, payload: Value) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.config.host.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request was not successful");
            return Err(FetchError::InvalidResponse(reason.to_string()));
        }
        Ok(body)
    }
}

fn search_result_from(item: &Value) -> Option<SearchResult> {
    let metadata = item.get("metadata").unwrap_or(&Value::Null);
    let url = item
        .get("url")
        .or_else(|| metadata.get("sourceURL"))
        .and_then(Value::as_str)?;
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

    Some(SearchResult {
        url: url.to_string(),
        title: text(item.get("title").or_else(|| metadata.get("title"))),
        snippet: text(item.get("description").or_else(|| metadata.get("description"))),
        content: text(item.get("markdown").or_else(|| item.get("content"))),
    })
}

#[async_trait]
impl Scraper for FirecrawlClient {
    async fn scrape(&self, url: &str) -> Result<String, FetchError> {
        Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let body = self.post("v0/scrape", json!({ "url": url })).await?;
        body.pointer("/data/markdown")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::InvalidResponse(format!("no markdown returned for {}", url)))
    }
}

#[async_trait]
impl Searcher for FirecrawlClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, FetchError> {
        let payload = json!({
            "query": query,
            "pageOptions": { "fetchPageContent": true },
        });
        let body = self.post("v0/search", payload).await?;
        let items = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::InvalidResponse("search response has no data".to_string()))?;

        Ok(items.iter().filter_map(search_result_from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> FirecrawlClient {
        FirecrawlClient::new(FirecrawlConfig {
            host: server.uri(),
            ..FirecrawlConfig::new("fc-test")
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_scrape_returns_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v0/scrape"))
            .and(header("Authorization", "Bearer fc-test"))
            .and(body_partial_json(json!({"url": "https://acme.example/about"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"markdown": "# About Acme", "metadata": {"title": "About"}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client.scrape("https://acme.example/about").await.unwrap();
        assert_eq!(page, "# About Acme");
    }

    #[tokio::test]
    async fn test_scrape_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v0/scrape"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client.scrape("https://acme.example").await.unwrap_err();
        assert!(matches!(error, FetchError::Status { status: 500, .. }));
        assert!(error.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_scrape_rejects_invalid_url() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let error = client.scrape("not a url").await.unwrap_err();
        assert!(matches!(error, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v0/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Page blocked"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client.scrape("https://acme.example").await.unwrap_err();
        assert_eq!(error.to_string(), "Unexpected response: Page blocked");
    }

    #[tokio::test]
    async fn test_search_requests_page_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v0/search"))
            .and(body_partial_json(json!({
                "query": "acme headquarters",
                "pageOptions": {"fetchPageContent": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [
                    {
                        "url": "https://news.example/acme",
                        "markdown": "Acme is based in Springfield",
                        "metadata": {"title": "Acme news", "description": "All about Acme"}
                    },
                    {"metadata": {"title": "no url"}}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let results = client.search("acme headquarters").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://news.example/acme");
        assert_eq!(results[0].title.as_deref(), Some("Acme news"));
        assert_eq!(results[0].snippet.as_deref(), Some("All about Acme"));
        assert_eq!(results[0].content.as_deref(), Some("Acme is based in Springfield"));
    }
}
