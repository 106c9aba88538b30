mod configuration;
mod error;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sleuth::agent::{Agent, AgentSettings};
use sleuth::completion::CompletionClient;
use sleuth::context::ResearchContext;
use sleuth::data_points::DataPointStore;
use sleuth::memory::MemoryManager;
use sleuth::providers::openai::OpenAiProvider;
use sleuth::researcher::WebResearcher;
use sleuth::token_counter::TokenCounter;
use sleuth::tools::ToolExecutor;
use sleuth::web::firecrawl::FirecrawlClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name of the company or organisation to research
    entity: String,

    /// Website to start from
    website: String,

    /// TOML configuration file (SLEUTH_* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ask the model for a plan before it starts calling tools
    #[arg(long)]
    plan: bool,

    /// Offer the search tool to the model
    #[arg(long)]
    search: bool,

    /// Stop after this many model turns
    #[arg(long)]
    max_turns: Option<usize>,

    /// Data points to look for, comma separated
    #[arg(long, value_delimiter = ',')]
    data_points: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sleuth=info,sleuth_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    let researcher = build_researcher(&cli, settings)?;

    let report = researcher.run().await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&report));
    }
    Ok(())
}

fn build_researcher(cli: &Cli, settings: Settings) -> Result<WebResearcher> {
    let agent_settings = settings.agent;
    let model = settings.provider.model.clone();

    let provider = OpenAiProvider::new(settings.provider.into_config())?;
    tracing::info!(model = provider.model(), "using chat completions provider");
    let client =
        CompletionClient::new(Box::new(provider)).with_retry_policy(agent_settings.retry_policy());

    let web = FirecrawlClient::new(settings.firecrawl.into_config())?;
    let executor = ToolExecutor::new(Box::new(web.clone()), Box::new(web))
        .with_search(cli.search || agent_settings.expose_search);

    let counter = match &agent_settings.tokenizer_path {
        Some(path) => TokenCounter::from_file(path)
            .with_context(|| format!("loading tokenizer from {}", path.display()))?,
        None => TokenCounter::for_model(&model),
    };
    let memory = MemoryManager::new(counter)
        .with_max_messages(agent_settings.max_messages)
        .with_keep_latest(agent_settings.keep_latest)
        .with_token_budget(agent_settings.token_budget);

    let agent = Agent::new(client, executor)
        .with_memory(memory)
        .with_settings(AgentSettings {
            plan: cli.plan || agent_settings.plan,
            max_turns: cli.max_turns.or(agent_settings.max_turns),
        });

    let mut context = ResearchContext::new(&cli.entity, &cli.website);
    if !cli.data_points.is_empty() {
        context = context.with_data_points(DataPointStore::with_schema(cli.data_points.clone()));
    }
    Ok(WebResearcher::new(agent, context))
}
