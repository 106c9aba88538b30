use serde::Serialize;

use crate::data_points::DataPointStore;

/// URLs fetched so far, in fetch order. Append-only; repeats are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScrapedLinks(Vec<String>);

impl ScrapedLinks {
    pub fn push<S: Into<String>>(&mut self, url: S) {
        self.0.push(url.into());
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|link| link == url)
    }
}

/// Everything a single research run mutates. Each run owns exactly one.
#[derive(Debug, Clone)]
pub struct ResearchContext {
    pub entity_name: String,
    pub website: String,
    pub data_points: DataPointStore,
    pub links_scraped: ScrapedLinks,
}

impl ResearchContext {
    pub fn new<E: Into<String>, W: Into<String>>(entity_name: E, website: W) -> Self {
        Self {
            entity_name: entity_name.into(),
            website: website.into(),
            data_points: DataPointStore::default(),
            links_scraped: ScrapedLinks::default(),
        }
    }

    pub fn with_data_points(mut self, data_points: DataPointStore) -> Self {
        self.data_points = data_points;
        self
    }
}
