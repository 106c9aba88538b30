//! Entry point for researching one entity.
use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::agent::{Agent, Termination};
use crate::context::{ResearchContext, ScrapedLinks};
use crate::data_points::DataPoint;
use crate::prompt_template::load_prompt_file;

pub const ALL_FOUND: &str = "All data points have been found.";

/// What a run found, plus how the agent loop ended
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub entity_name: String,
    pub website: String,
    pub data_points: Vec<DataPoint>,
    pub links_scraped: ScrapedLinks,
    pub summary: String,
    /// `None` when nothing was left to look for and the agent never ran
    pub termination: Option<Termination>,
}

pub struct WebResearcher {
    agent: Agent,
    context: ResearchContext,
    last_termination: Option<Termination>,
}

impl WebResearcher {
    pub fn new(agent: Agent, context: ResearchContext) -> Self {
        Self {
            agent,
            context,
            last_termination: None,
        }
    }

    pub fn context(&self) -> &ResearchContext {
        &self.context
    }

    /// Run the agent over the data points that are still missing and return its final
    /// text, or [`ALL_FOUND`] without calling the model when there are none.
    pub async fn website_search(&mut self) -> Result<String> {
        let pending = self.context.data_points.pending_names();
        if pending.is_empty() {
            tracing::info!(entity = %self.context.entity_name, "nothing left to research");
            return Ok(ALL_FOUND.to_string());
        }

        let system_prompt = load_prompt_file("system.md", &HashMap::<String, String>::new())?;
        let prompt = load_prompt_file(
            "research.md",
            &json!({
                "entity_name": self.context.entity_name,
                "website": self.context.website,
                "links_scraped": self.context.links_scraped,
                "data_points": pending,
            }),
        )?;

        tracing::info!(
            entity = %self.context.entity_name,
            pending = pending.len(),
            "starting research"
        );
        let reply = self
            .agent
            .call_agent(&mut self.context, system_prompt.trim(), prompt.trim())
            .await;
        tracing::info!(termination = ?reply.termination, "research finished");

        self.last_termination = Some(reply.termination);
        Ok(reply.content)
    }

    pub async fn run(mut self) -> Result<ResearchReport> {
        let summary = self.website_search().await?;
        let ResearchContext {
            entity_name,
            website,
            data_points,
            links_scraped,
        } = self.context;

        Ok(ResearchReport {
            entity_name,
            website,
            data_points: data_points.points().to_vec(),
            links_scraped,
            summary,
            termination: self.last_termination,
        })
    }
}
